use tracing::{debug, info};

use crate::error::RecompressError;
use crate::pipeline::{Job, PipelineContext, Stage};
use crate::tools::{ToolInvocation, ToolOutcome};

/// File name prefix handed to `pdfimages`; images land as `a-NNN.<ext>`.
pub const EXTRACT_PREFIX: &str = "a";

/// Dumps every embedded image of the input PDF into the working directory.
pub struct ExtractStage;

impl ExtractStage {
    pub fn invocation(job: &Job, ctx: &PipelineContext<'_>) -> ToolInvocation {
        let mut invocation = ToolInvocation::new("pdfimages", &ctx.config.tools.pdfimages);
        if ctx.config.extraction.preserve_jpeg {
            invocation = invocation.arg("-j");
        }
        invocation
            .arg(&job.input)
            .arg(job.workdir.join(EXTRACT_PREFIX))
    }
}

impl Stage for ExtractStage {
    fn name(&self) -> &'static str {
        "extract"
    }

    fn run(&self, job: &mut Job, ctx: &PipelineContext<'_>) -> Result<(), RecompressError> {
        let invocation = Self::invocation(job, ctx);
        match ctx.invoke(&invocation)? {
            ToolOutcome::Success => {}
            ToolOutcome::Failed { code, .. } => {
                return Err(RecompressError::ExtractionFailed {
                    tool: invocation.tool.to_string(),
                    code,
                });
            }
        }

        let extracted = super::sorted_files(&job.workdir)?;
        for file in &extracted {
            debug!(file = %file.display(), "Extracted image");
        }
        info!(count = extracted.len(), "Images extracted");
        Ok(())
    }
}
