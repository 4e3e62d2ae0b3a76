use std::path::PathBuf;

use tracing::info;

use crate::error::RecompressError;
use crate::pipeline::{Job, PipelineContext, Stage};
use crate::tools::{ToolInvocation, ToolOutcome};

/// Multi-page TIFF produced by concatenation, inside the working directory.
pub const COMBINED_TIFF: &str = "all.tiff";

/// Joins the converted pages into one multi-page TIFF.
pub struct ConcatenateStage;

impl ConcatenateStage {
    /// Every `*.tiff` in the working directory except the combined file,
    /// sorted by file name.
    pub fn collect_pages(job: &Job) -> Result<Vec<PathBuf>, RecompressError> {
        let pages = super::sorted_files(&job.workdir)?
            .into_iter()
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("tiff"))
                    && path.file_name().is_some_and(|name| name != COMBINED_TIFF)
            })
            .collect();
        Ok(pages)
    }
}

impl Stage for ConcatenateStage {
    fn name(&self) -> &'static str {
        "concatenate"
    }

    fn run(&self, job: &mut Job, ctx: &PipelineContext<'_>) -> Result<(), RecompressError> {
        let pages = Self::collect_pages(job)?;
        if pages.is_empty() {
            return Err(RecompressError::NoQualifyingImages {
                stage: self.name(),
                input: job.input.clone(),
                min_bytes: ctx.config.min_image_bytes,
            });
        }

        let combined = job.workdir.join(COMBINED_TIFF);
        let invocation = ToolInvocation::new("tiffcp", &ctx.config.tools.tiffcp)
            .args(ctx.config.compression.tiffcp_args().iter().copied())
            .args(pages.iter())
            .arg(&combined);

        if let ToolOutcome::Failed { code, .. } = ctx.invoke(&invocation)? {
            return Err(RecompressError::AssemblyFailed {
                stage: self.name(),
                tool: invocation.tool.to_string(),
                code,
            });
        }

        info!(pages = pages.len(), combined = %combined.display(), "Pages concatenated");
        job.pages = pages;
        job.combined = Some(combined);
        Ok(())
    }
}

/// Wraps the combined TIFF into the output PDF.
pub struct WrapStage;

impl Stage for WrapStage {
    fn name(&self) -> &'static str {
        "wrap"
    }

    fn run(&self, job: &mut Job, ctx: &PipelineContext<'_>) -> Result<(), RecompressError> {
        let combined = job
            .combined
            .clone()
            .unwrap_or_else(|| job.workdir.join(COMBINED_TIFF));

        let invocation = ToolInvocation::new("tiff2pdf", &ctx.config.tools.tiff2pdf)
            .arg("-o")
            .arg(&job.output)
            .arg(&combined);

        if let ToolOutcome::Failed { code, .. } = ctx.invoke(&invocation)? {
            return Err(RecompressError::AssemblyFailed {
                stage: self.name(),
                tool: invocation.tool.to_string(),
                code,
            });
        }

        info!(output = %job.output.display(), "PDF written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn job_in(workdir: PathBuf) -> Job {
        Job {
            input: PathBuf::from("scan.pdf"),
            output: PathBuf::from("out.pdf"),
            workdir,
            pages: Vec::new(),
            skipped: Vec::new(),
            combined: None,
        }
    }

    #[test]
    fn pages_exclude_sources_and_combined_file() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["a-1.tiff", "a-0.tiff", "a-0.ppm", COMBINED_TIFF] {
            fs::write(temp.path().join(name), b"page").unwrap();
        }

        let pages = ConcatenateStage::collect_pages(&job_in(temp.path().to_path_buf())).unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|page| page.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a-0.tiff", "a-1.tiff"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn pages_are_found_under_non_utf8_workdir() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempfile::tempdir().unwrap();
        let workdir = temp.path().join(OsStr::from_bytes(b"tmp-\xff"));
        fs::create_dir(&workdir).unwrap();
        for name in ["a-0.tiff", "a-1.tiff", COMBINED_TIFF] {
            fs::write(workdir.join(name), b"page").unwrap();
        }

        let pages = ConcatenateStage::collect_pages(&job_in(workdir.clone())).unwrap();
        assert_eq!(pages, vec![workdir.join("a-0.tiff"), workdir.join("a-1.tiff")]);
    }
}
