//! Dependency synchronization.

use crate::pipeline::{PipelineContext, PipelineState, Stage};
use crate::tools::ToolCommand;
use crate::types::{FailurePolicy, PipelineError, StageOutcome};

/// Runs `gclient` with the profile's sync arguments at the source root.
///
/// A failed sync ends the run before any patch or build touches the tree.
pub struct SyncStage;

impl Stage for SyncStage {
    fn name(&self) -> &'static str {
        "sync"
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }

    fn reaches(&self) -> PipelineState {
        PipelineState::Synced
    }

    fn run(&self, ctx: &mut PipelineContext<'_>) -> Result<StageOutcome, PipelineError> {
        let cmd = ToolCommand::new(ctx.tool("gclient"))
            .args(&ctx.config.profile.sync_args)
            .current_dir(&ctx.config.src_root);
        let status = ctx.runner.run(&cmd)?;
        if status.success() {
            Ok(StageOutcome::Success)
        } else {
            Ok(StageOutcome::failed(format!("`{}` returned {}", cmd, status)))
        }
    }
}
