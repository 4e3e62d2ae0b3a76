use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConversionFailure, RecompressError};
use crate::pipeline::{Job, PipelineContext, SkipReason, SkippedImage, Stage};
use crate::tools::{ToolInvocation, ToolOutcome};

/// Converts each qualifying extracted image into a one-bit TIFF page.
pub struct BilevelStage;

impl BilevelStage {
    /// The conversion command for `name`, run from inside the working directory.
    pub fn invocation(name: &str, workdir: &Path, ctx: &PipelineContext<'_>) -> ToolInvocation {
        ToolInvocation::new("econvert", &ctx.config.tools.econvert)
            .args(["-i", name])
            .args(["--brightness", ctx.config.brightness.as_str()])
            .args(["--colorspace", "bilevel"])
            .args(["-o", tiff_name(name).as_str()])
            .current_dir(workdir)
    }

    fn classify(
        path: &Path,
        ctx: &PipelineContext<'_>,
    ) -> Result<Option<SkippedImage>, RecompressError> {
        let size_bytes = fs::metadata(path)
            .map_err(|err| RecompressError::io(format!("Failed to stat {}", path.display()), err))?
            .len();
        let reason = if !ctx.config.accepts_extension(path) {
            SkipReason::UnsupportedExtension
        } else if size_bytes < ctx.config.min_image_bytes {
            SkipReason::BelowSizeThreshold {
                min_bytes: ctx.config.min_image_bytes,
            }
        } else {
            return Ok(None);
        };
        Ok(Some(SkippedImage {
            file: file_name(path),
            size_bytes,
            reason,
        }))
    }
}

impl Stage for BilevelStage {
    fn name(&self) -> &'static str {
        "bilevel"
    }

    fn run(&self, job: &mut Job, ctx: &PipelineContext<'_>) -> Result<(), RecompressError> {
        let mut failures = Vec::new();
        let mut pages = Vec::new();

        for path in super::sorted_files(&job.workdir)? {
            if let Some(skipped) = Self::classify(&path, ctx)? {
                match skipped.reason {
                    SkipReason::BelowSizeThreshold { min_bytes } => warn!(
                        file = skipped.file.as_str(),
                        size_bytes = skipped.size_bytes,
                        min_bytes,
                        "Skipping small image"
                    ),
                    SkipReason::UnsupportedExtension => debug!(
                        file = skipped.file.as_str(),
                        "Skipping file with unsupported extension"
                    ),
                }
                ctx.metrics.record_skipped();
                job.skipped.push(skipped);
                continue;
            }

            let name = file_name(&path);
            let invocation = Self::invocation(&name, &job.workdir, ctx);
            let target = job.workdir.join(tiff_name(&name));

            match ctx.invoke(&invocation)? {
                ToolOutcome::Success if target.is_file() => {
                    debug!(file = name.as_str(), "Converted to bilevel TIFF");
                    ctx.metrics.record_converted();
                    pages.push(target);
                }
                ToolOutcome::Success => failures.push(ConversionFailure {
                    file: PathBuf::from(&name),
                    tool: invocation.tool.to_string(),
                    code: Some(0),
                    reason: "no output produced".into(),
                }),
                ToolOutcome::Failed { code, stderr } => {
                    warn!(file = name.as_str(), ?code, "Conversion failed");
                    failures.push(ConversionFailure {
                        file: PathBuf::from(&name),
                        tool: invocation.tool.to_string(),
                        code,
                        reason: first_line(&stderr),
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(RecompressError::ConversionFailed { failures });
        }
        if pages.is_empty() {
            return Err(RecompressError::NoQualifyingImages {
                stage: self.name(),
                input: job.input.clone(),
                min_bytes: ctx.config.min_image_bytes,
            });
        }

        info!(
            converted = pages.len(),
            skipped = job.skipped.len(),
            brightness = ctx.config.brightness.as_str(),
            "Bilevel conversion complete"
        );
        job.pages = pages;
        Ok(())
    }
}

fn tiff_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    format!("{stem}.tiff")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiff_name_keeps_stem() {
        assert_eq!(tiff_name("a-000.ppm"), "a-000.tiff");
        assert_eq!(tiff_name("a-002.jpg"), "a-002.tiff");
        assert_eq!(tiff_name("scan.page.pbm"), "scan.page.tiff");
    }

    #[test]
    fn first_line_trims_multiline_stderr() {
        assert_eq!(first_line("  bad header \nmore"), "bad header");
        assert_eq!(first_line(""), "");
    }
}
