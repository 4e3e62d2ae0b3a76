use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised while running the recompression pipeline.
///
/// Every variant aborts the run; the temporary workspace is removed before
/// the error reaches the caller.
#[derive(Debug, Error)]
pub enum RecompressError {
    #[error("input PDF not found: '{}'", path.display())]
    InputNotFound { path: PathBuf },

    /// The external program could not be spawned at all.
    #[error("{stage}: required tool '{tool}' could not be started: {reason}")]
    ToolNotFound {
        stage: &'static str,
        tool: String,
        reason: String,
    },

    #[error("extraction failed at extract: {tool} exited with {}", ToolStatus(*code))]
    ExtractionFailed { tool: String, code: Option<i32> },

    #[error(
        "conversion failed at bilevel for {} image(s): {}",
        failures.len(),
        summarize(failures)
    )]
    ConversionFailed { failures: Vec<ConversionFailure> },

    /// Nothing left to assemble once small and unsupported images are dropped.
    #[error(
        "{stage}: no qualifying images extracted from '{}' (minimum size {min_bytes} bytes)",
        input.display()
    )]
    NoQualifyingImages {
        stage: &'static str,
        input: PathBuf,
        min_bytes: u64,
    },

    #[error("assembly failed at {stage}: {tool} exited with {}", ToolStatus(*code))]
    AssemblyFailed {
        stage: &'static str,
        tool: String,
        code: Option<i32>,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl RecompressError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Name of the pipeline stage the error belongs to, when there is one.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::ExtractionFailed { .. } => Some("extract"),
            Self::ConversionFailed { .. } => Some("bilevel"),
            Self::ToolNotFound { stage, .. }
            | Self::NoQualifyingImages { stage, .. }
            | Self::AssemblyFailed { stage, .. } => Some(*stage),
            Self::InputNotFound { .. } | Self::Io { .. } => None,
        }
    }

    /// Process exit code to report for this error.
    ///
    /// A failing tool's own status is propagated when it fits in a shell exit
    /// code; everything else maps to 1.
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            Self::ExtractionFailed { code, .. } | Self::AssemblyFailed { code, .. } => *code,
            Self::ConversionFailed { failures } => failures.first().and_then(|f| f.code),
            _ => None,
        };
        match code {
            Some(code @ 1..=255) => code,
            _ => 1,
        }
    }
}

/// One image that the bilevel conversion tool failed to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFailure {
    pub file: PathBuf,
    pub tool: String,
    pub code: Option<i32>,
    pub reason: String,
}

impl fmt::Display for ConversionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} exited with {}",
            self.file.display(),
            self.tool,
            ToolStatus(self.code)
        )?;
        if !self.reason.is_empty() {
            write!(f, ": {}", self.reason)?;
        }
        write!(f, ")")
    }
}

struct ToolStatus(Option<i32>);

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "status {code}"),
            None => write!(f, "no status (terminated by signal)"),
        }
    }
}

fn summarize(failures: &[ConversionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
