//! Generator arguments and build tool environment.

use std::fs;

use tracing::{debug, info};

use crate::pipeline::{PipelineContext, PipelineState, Stage};
use crate::types::{FailurePolicy, PipelineError, StageOutcome};

/// Environment variable pointing `gn` at the checkout's build tools.
pub const BUILDTOOLS_ENV: &str = "CHROMIUM_BUILDTOOLS_PATH";

/// `gclient_args.gni` used when the checkout has none and no template is configured.
pub const BUNDLED_ARGS_TEMPLATE: &str = include_str!("../../templates/gclient_args.gni");

/// Ensures `build/config/gclient_args.gni` exists and prepares the build
/// tool environment.
///
/// An existing args file is left untouched. The environment is stored on the
/// pipeline context and handed to `gn` and `ninja` child processes; the
/// orchestrator's own environment is not modified.
pub struct ConfigureStage;

impl Stage for ConfigureStage {
    fn name(&self) -> &'static str {
        "configure"
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }

    fn reaches(&self) -> PipelineState {
        PipelineState::Configured
    }

    fn run(&self, ctx: &mut PipelineContext<'_>) -> Result<StageOutcome, PipelineError> {
        let config = ctx.config;
        let args_file = config.args_file();

        if args_file.exists() {
            debug!(path = %args_file.display(), "generator args file already present");
        } else if config.dry_run {
            info!("[dry-run] would create {}", args_file.display());
        } else {
            if let Some(parent) = args_file.parent() {
                fs::create_dir_all(parent)?;
            }
            match &config.args_template {
                Some(template) => {
                    fs::copy(template, &args_file).map_err(|e| {
                        PipelineError::Config(format!(
                            "Failed to copy args template {} to {}: {}",
                            template.display(),
                            args_file.display(),
                            e
                        ))
                    })?;
                }
                None => fs::write(&args_file, BUNDLED_ARGS_TEMPLATE)?,
            }
            info!(path = %args_file.display(), "created generator args file");
        }

        ctx.tool_env = vec![(BUILDTOOLS_ENV.into(), config.buildtools_dir().into())];
        Ok(StageOutcome::Success)
    }
}
