//! Packaging of the built SDK.

use tracing::info;

use crate::package::PackageManifest;
use crate::pipeline::{PipelineContext, PipelineState, Stage};
use crate::tools::ToolCommand;
use crate::types::{FailurePolicy, PipelineError, StageOutcome};

/// Names the package after the SDK checkout's `HEAD` revision and
/// assembles it.
///
/// Failures here are errors rather than outcomes: a missing header tree or
/// binary means the build produced something unexpected and the run should
/// surface the underlying cause.
pub struct PackageStage;

impl Stage for PackageStage {
    fn name(&self) -> &'static str {
        "package"
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }

    fn reaches(&self) -> PipelineState {
        PipelineState::Packaged
    }

    fn run(&self, ctx: &mut PipelineContext<'_>) -> Result<StageOutcome, PipelineError> {
        let config = ctx.config;

        let rev_parse = ToolCommand::new(ctx.tool("git"))
            .args(["rev-parse", "HEAD"])
            .current_dir(config.sdk_dir());

        if config.dry_run {
            ctx.runner.capture(&rev_parse)?;
            let manifest = PackageManifest::plan(config, "<revision>");
            info!(
                "[dry-run] would package {} header tree and {} scheme(s) into {}",
                manifest.headers.display(),
                manifest.binaries.len(),
                manifest.root().display()
            );
            return Ok(StageOutcome::skipped("dry run"));
        }

        let id = ctx.runner.capture(&rev_parse)?;
        if id.is_empty() {
            return Err(PipelineError::Tool(format!(
                "`{}` printed no revision for {}",
                rev_parse,
                config.sdk_dir().display()
            )));
        }
        info!(revision = %id, "packaging SDK");

        let manifest = PackageManifest::plan(config, &id);
        let location = manifest.package(&config.package)?;

        ctx.content_id = Some(id);
        ctx.package = Some(location);
        Ok(StageOutcome::Success)
    }
}
