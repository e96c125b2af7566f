//! Local patch application.

use tracing::{info, warn};

use crate::pipeline::{PipelineContext, PipelineState, Stage};
use crate::tools::ToolCommand;
use crate::types::{FailurePolicy, PipelineError, StageOutcome};

/// Applies the profile's patches in order with `git am`.
///
/// A patch that does not apply (usually because a persistent checkout
/// already carries it) is dropped with `git am --skip` so the next patch
/// starts from a clean mailbox. The stage reports `Failed` when any patch
/// was skipped, which the driver tolerates.
pub struct PatchStage;

impl Stage for PatchStage {
    fn name(&self) -> &'static str {
        "patch"
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Tolerated
    }

    fn reaches(&self) -> PipelineState {
        PipelineState::Patched
    }

    fn run(&self, ctx: &mut PipelineContext<'_>) -> Result<StageOutcome, PipelineError> {
        let patches = &ctx.config.profile.patches;
        if patches.is_empty() {
            return Ok(StageOutcome::skipped("profile declares no patches"));
        }

        let git = ctx.tool("git");
        let patches_dir = ctx.config.patches_dir();
        let mut skipped = Vec::new();

        for entry in patches {
            let patch_path = patches_dir.join(&entry.file);
            let target_dir = ctx.config.src_root.join(&entry.target);

            let apply = ToolCommand::new(&git)
                .arg("am")
                .arg(&patch_path)
                .current_dir(&target_dir);
            let status = ctx.runner.run(&apply)?;
            if status.success() {
                info!(patch = %entry.file, "applied patch");
                continue;
            }

            warn!(patch = %entry.file, %status, "patch did not apply, skipping");
            let skip = ToolCommand::new(&git)
                .args(["am", "--skip"])
                .current_dir(&target_dir);
            let skip_status = ctx.runner.run(&skip)?;
            if !skip_status.success() {
                warn!(patch = %entry.file, status = %skip_status, "`git am --skip` failed");
            }
            skipped.push(entry.file.clone());
        }

        if skipped.is_empty() {
            Ok(StageOutcome::Success)
        } else {
            Ok(StageOutcome::failed(format!(
                "skipped {} of {} patches: {}",
                skipped.len(),
                patches.len(),
                skipped.join(", ")
            )))
        }
    }
}
