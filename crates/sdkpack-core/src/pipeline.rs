//! Pipeline driver.
//!
//! The pipeline is an ordered list of named [`Stage`]s. Each stage reports a
//! [`StageOutcome`]; the driver looks at the stage's [`FailurePolicy`] to
//! decide whether a failure ends the run:
//!
//! | Policy | On `Failed` |
//! |--------|-------------|
//! | `Fatal` | pipeline moves to [`PipelineState::Failed`], later stages never run |
//! | `Tolerated` | logged as a warning, pipeline continues |
//! | `Unchecked` | logged as a warning, pipeline continues |
//!
//! Errors (`Err(PipelineError)`) are not outcomes: they propagate to the
//! caller unchanged.
//!
//! The standard pipeline is:
//!
//! ```text
//! Start → checkout → sync → patch → configure → build → package → Done
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, warn};

use crate::package::PackageOptions;
use crate::profile::SdkProfile;
use crate::stages::{BuildStage, CheckoutStage, ConfigureStage, PackageStage, PatchStage, SyncStage};
use crate::tools::ToolRunner;
use crate::types::{
    BuildScheme, FailurePolicy, PackageLocation, PipelineError, Platform, StageOutcome,
};

/// Everything a pipeline run needs to know up front.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the source checkout (the directory `gclient sync` runs in).
    pub src_root: PathBuf,
    /// SDK checkout below the source root (default `owt`).
    pub sdk_subdir: PathBuf,
    /// Directory receiving `<revision>/` and `<revision>.zip`.
    pub package_dir: PathBuf,
    pub profile: SdkProfile,
    /// Schemes in build order.
    pub schemes: Vec<BuildScheme>,
    pub platform: Platform,
    /// Reference to fetch and check out before syncing.
    pub checkout_ref: Option<String>,
    /// Template for `gclient_args.gni`; the bundled one is used when unset.
    pub args_template: Option<PathBuf>,
    /// Build and run the profile's test targets.
    pub run_tests: bool,
    pub package: PackageOptions,
    pub dry_run: bool,
}

impl PipelineConfig {
    /// Creates a config with the default layout for `src_root`:
    /// SDK in `owt/`, packages next to the source root in `packages/`.
    pub fn new(src_root: impl Into<PathBuf>, profile: SdkProfile) -> Self {
        let src_root = src_root.into();
        let package_dir = src_root
            .parent()
            .map(|parent| parent.join("packages"))
            .unwrap_or_else(|| src_root.join("packages"));
        Self {
            src_root,
            sdk_subdir: PathBuf::from("owt"),
            package_dir,
            profile,
            schemes: BuildScheme::defaults(),
            platform: Platform::host(),
            checkout_ref: None,
            args_template: None,
            run_tests: true,
            package: PackageOptions::default(),
            dry_run: false,
        }
    }

    pub fn sdk_dir(&self) -> PathBuf {
        self.src_root.join(&self.sdk_subdir)
    }

    /// Build output directory for a scheme.
    pub fn out_dir(&self, scheme: &str) -> PathBuf {
        self.src_root.join("out").join(scheme)
    }

    /// Generator arguments file consumed by `gn`.
    pub fn args_file(&self) -> PathBuf {
        self.src_root
            .join("build")
            .join("config")
            .join("gclient_args.gni")
    }

    pub fn buildtools_dir(&self) -> PathBuf {
        self.src_root.join("buildtools")
    }

    pub fn patches_dir(&self) -> PathBuf {
        self.sdk_dir().join(self.profile.patches_dir())
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        BuildScheme::validate_all(&self.schemes)?;
        self.profile.validate()?;
        // Tools run with the source root as cwd and also receive paths below it.
        if self.src_root.is_relative() {
            return Err(PipelineError::Config(format!(
                "Source root must be an absolute path, got: {}",
                self.src_root.display()
            )));
        }
        if !self.dry_run && !self.src_root.is_dir() {
            return Err(PipelineError::Config(format!(
                "Source root does not exist or is not a directory: {}\n\n\
                 Pass --src-root or set project.src_root in sdkpack.toml.",
                self.src_root.display()
            )));
        }
        Ok(())
    }
}

/// Mutable state shared by the stages of one run.
pub struct PipelineContext<'a> {
    pub config: &'a PipelineConfig,
    pub runner: &'a dyn ToolRunner,
    /// Environment handed to build tool child processes.
    pub tool_env: Vec<(OsString, OsString)>,
    /// Revision hash naming the package.
    pub content_id: Option<String>,
    pub package: Option<PackageLocation>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(config: &'a PipelineConfig, runner: &'a dyn ToolRunner) -> Self {
        Self {
            config,
            runner,
            tool_env: Vec::new(),
            content_id: None,
            package: None,
        }
    }

    /// Resolves a depot_tools style tool name for the configured platform.
    pub fn tool(&self, name: &str) -> String {
        self.config.platform.tool(name)
    }
}

/// One named step of the pipeline.
pub trait Stage {
    fn name(&self) -> &'static str;

    fn policy(&self) -> FailurePolicy;

    /// State the pipeline is in once this stage has run without a fatal failure.
    fn reaches(&self) -> PipelineState;

    fn run(&self, ctx: &mut PipelineContext<'_>) -> Result<StageOutcome, PipelineError>;
}

/// Progress of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    CheckedOut,
    Synced,
    Patched,
    Configured,
    BuiltAndTested,
    Packaged,
    Done,
    Failed,
}

/// What happened in a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub policy: FailurePolicy,
    pub outcome: StageOutcome,
    pub duration_ms: u64,
}

/// Summary of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub profile: String,
    pub platform: Platform,
    pub sdkpack_version: String,
    /// Start time in RFC3339 format.
    pub started_at: String,
    pub state: PipelineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,
    pub stages: Vec<StageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageLocation>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Done
    }

    /// Process exit code for this run: 0 when done, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.succeeded() { 0 } else { 1 }
    }

    pub fn outcome_of(&self, stage: &str) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|record| record.name == stage)
            .map(|record| &record.outcome)
    }

    /// Writes the report as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<(), PipelineError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// An ordered list of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// checkout → sync → patch → configure → build → package.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(CheckoutStage),
            Box::new(SyncStage),
            Box::new(PatchStage),
            Box::new(ConfigureStage),
            Box::new(BuildStage),
            Box::new(PackageStage),
        ])
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Runs every stage in order.
    ///
    /// Returns `Ok` with a [`PipelineState::Failed`] report when a fatal stage
    /// fails, and `Err` when a stage could not run at all.
    pub fn run(
        &self,
        config: &PipelineConfig,
        runner: &dyn ToolRunner,
    ) -> Result<PipelineReport, PipelineError> {
        config.validate()?;

        let started_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let mut ctx = PipelineContext::new(config, runner);
        let mut records = Vec::with_capacity(self.stages.len());
        let mut state = PipelineState::Start;
        let mut failed_stage = None;

        info!(
            profile = %config.profile.name,
            platform = config.platform.as_str(),
            src_root = %config.src_root.display(),
            "starting pipeline"
        );

        for stage in &self.stages {
            info!(stage = stage.name(), "running stage");
            let started = Instant::now();
            let outcome = stage.run(&mut ctx)?;
            let duration_ms = started.elapsed().as_millis() as u64;

            match (&outcome, stage.policy()) {
                (StageOutcome::Failed { reason }, FailurePolicy::Fatal) => {
                    error!(stage = stage.name(), %reason, "stage failed, aborting pipeline");
                    state = PipelineState::Failed;
                    failed_stage = Some(stage.name().to_string());
                }
                (StageOutcome::Failed { reason }, policy) => {
                    warn!(stage = stage.name(), ?policy, %reason, "stage failed, continuing");
                    state = stage.reaches();
                }
                (StageOutcome::Skipped { reason }, _) => {
                    info!(stage = stage.name(), %reason, "stage skipped");
                    state = stage.reaches();
                }
                (StageOutcome::Success, _) => {
                    info!(stage = stage.name(), duration_ms, "stage finished");
                    state = stage.reaches();
                }
            }

            records.push(StageRecord {
                name: stage.name().to_string(),
                policy: stage.policy(),
                outcome,
                duration_ms,
            });

            if state == PipelineState::Failed {
                break;
            }
        }

        if state != PipelineState::Failed {
            state = PipelineState::Done;
        }

        Ok(PipelineReport {
            profile: config.profile.name.clone(),
            platform: config.platform,
            sdkpack_version: crate::VERSION.to_string(),
            started_at,
            state,
            failed_stage,
            stages: records,
            content_id: ctx.content_id,
            package: ctx.package,
        })
    }
}
