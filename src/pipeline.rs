use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tempfile::{Builder, TempDir};
use tracing::{info, instrument};

use crate::config::RecompressConfig;
use crate::error::RecompressError;
use crate::observability::MetricsCollector;
use crate::stages;
use crate::tools::{self, ToolInvocation, ToolOutcome, ToolRunner};

const WORKDIR_PREFIX: &str = "pdf-recompress-";

/// Mutable state of a single run, handed from stage to stage.
#[derive(Debug)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Scratch directory owned by this run; removed when the run ends.
    pub workdir: PathBuf,
    /// Converted page TIFFs, in the order they will be concatenated.
    pub pages: Vec<PathBuf>,
    pub skipped: Vec<SkippedImage>,
    pub combined: Option<PathBuf>,
}

impl Job {
    fn new(input: &Path, output: &Path, workdir: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            workdir: workdir.to_path_buf(),
            pages: Vec::new(),
            skipped: Vec::new(),
            combined: None,
        }
    }
}

/// An extracted image left out of the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedImage {
    pub file: String,
    pub size_bytes: u64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnsupportedExtension,
    BelowSizeThreshold { min_bytes: u64 },
}

/// Read-only services handed to the stage currently running.
pub struct PipelineContext<'a> {
    pub config: &'a RecompressConfig,
    pub metrics: &'a MetricsCollector,
    runner: &'a dyn ToolRunner,
    stage: &'static str,
}

impl PipelineContext<'_> {
    /// Run an external tool on behalf of the current stage.
    pub fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolOutcome, RecompressError> {
        self.metrics.record_tool_invocation(self.stage);
        self.runner
            .run(invocation)
            .map_err(|err| RecompressError::ToolNotFound {
                stage: self.stage,
                tool: invocation.tool.to_string(),
                reason: tools::start_failure_reason(&invocation.program, &err),
            })
    }
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, job: &mut Job, ctx: &PipelineContext<'_>) -> Result<(), RecompressError>;
}

pub struct PipelineExecutor {
    stages: Vec<Box<dyn Stage>>,
    config: RecompressConfig,
    runner: Box<dyn ToolRunner>,
    metrics: MetricsCollector,
}

impl PipelineExecutor {
    /// Executor running the standard extract, bilevel, concatenate, wrap sequence.
    pub fn new(config: RecompressConfig, runner: Box<dyn ToolRunner>) -> Self {
        Self::with_stages(stages::default_stages(), config, runner)
    }

    pub fn with_stages(
        stages: Vec<Box<dyn Stage>>,
        config: RecompressConfig,
        runner: Box<dyn ToolRunner>,
    ) -> Self {
        Self {
            stages,
            config,
            runner,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn config(&self) -> &RecompressConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsCollector {
        self.metrics.clone()
    }

    #[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
    pub fn execute(&self, input: &Path, output: &Path) -> Result<PipelineResult, RecompressError> {
        self.metrics.reset();
        let total_start = Instant::now();

        if !input.is_file() {
            return Err(RecompressError::InputNotFound {
                path: input.to_path_buf(),
            });
        }
        prepare_output_parent(output)?;

        let workspace = self.create_workspace()?;
        let mut job = Job::new(input, output, workspace.path());

        // An early return drops `workspace`, which removes the directory.
        for stage in &self.stages {
            let span = tracing::span!(tracing::Level::INFO, "stage", stage = stage.name());
            let _span_guard = span.enter();
            let _timer = self.metrics.start_stage(stage.name());
            let ctx = PipelineContext {
                config: &self.config,
                metrics: &self.metrics,
                runner: self.runner.as_ref(),
                stage: stage.name(),
            };
            stage.run(&mut job, &ctx)?;
        }

        let workdir = job.workdir.clone();
        workspace.close().map_err(|err| {
            RecompressError::io(
                format!("Failed to remove working directory {}", workdir.display()),
                err,
            )
        })?;

        self.metrics.record_total_duration(total_start.elapsed());
        info!(
            pages = job.pages.len(),
            skipped = job.skipped.len(),
            "Recompression finished"
        );

        Ok(PipelineResult {
            input: job.input,
            output: job.output,
            pages: job.pages.iter().map(|page| file_stem(page)).collect(),
            skipped: job.skipped,
            workdir,
        })
    }

    fn create_workspace(&self) -> Result<TempDir, RecompressError> {
        let mut builder = Builder::new();
        builder.prefix(WORKDIR_PREFIX);
        let created = match &self.config.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        created.map_err(|err| RecompressError::io("Failed to create working directory", err))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Page stems in output order.
    pub pages: Vec<String>,
    pub skipped: Vec<SkippedImage>,
    /// Location of the (now removed) working directory.
    pub workdir: PathBuf,
}

fn prepare_output_parent(output: &Path) -> Result<(), RecompressError> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| {
            RecompressError::io(
                format!("Failed to create output directory {}", parent.display()),
                err,
            )
        })?;
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
