pub mod config;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod stages;
pub mod tools;
pub mod validation;

pub use config::RecompressConfig;
pub use error::RecompressError;
pub use pipeline::{PipelineExecutor, PipelineResult};
pub use tools::{SystemRunner, ToolRunner};
