//! Optional checkout of a requested reference into the SDK checkout.

use tracing::info;

use crate::pipeline::{PipelineContext, PipelineState, Stage};
use crate::tools::ToolCommand;
use crate::types::{FailurePolicy, PipelineError, StageOutcome};

/// Fetches `--ref` from `origin` and checks out `FETCH_HEAD`.
///
/// Exit codes are reported but never stop the pipeline; a bad reference
/// shows up later as a build against the old tree.
pub struct CheckoutStage;

impl Stage for CheckoutStage {
    fn name(&self) -> &'static str {
        "checkout"
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Unchecked
    }

    fn reaches(&self) -> PipelineState {
        PipelineState::CheckedOut
    }

    fn run(&self, ctx: &mut PipelineContext<'_>) -> Result<StageOutcome, PipelineError> {
        let Some(reference) = ctx.config.checkout_ref.as_deref() else {
            return Ok(StageOutcome::skipped("no reference requested"));
        };

        let git = ctx.tool("git");
        let sdk_dir = ctx.config.sdk_dir();
        info!(reference, sdk_dir = %sdk_dir.display(), "checking out reference");

        let fetch = ToolCommand::new(&git)
            .args(["fetch", "origin", reference])
            .current_dir(&sdk_dir);
        let status = ctx.runner.run(&fetch)?;
        if !status.success() {
            return Ok(StageOutcome::failed(format!("`{}` returned {}", fetch, status)));
        }

        let checkout = ToolCommand::new(&git)
            .args(["checkout", "FETCH_HEAD"])
            .current_dir(&sdk_dir);
        let status = ctx.runner.run(&checkout)?;
        if !status.success() {
            return Ok(StageOutcome::failed(format!("`{}` returned {}", checkout, status)));
        }

        Ok(StageOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedRunner, fake_source_tree};
    use tempfile::TempDir;

    #[test]
    fn skipped_without_reference() {
        let dir = TempDir::new().unwrap();
        let config = fake_source_tree(dir.path());
        let runner = ScriptedRunner::new();
        let mut ctx = PipelineContext::new(&config, &runner);

        let outcome = CheckoutStage.run(&mut ctx).unwrap();
        assert!(matches!(outcome, StageOutcome::Skipped { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn fetches_then_checks_out_in_sdk_dir() {
        let dir = TempDir::new().unwrap();
        let mut config = fake_source_tree(dir.path());
        config.checkout_ref = Some("refs/pull/42/head".to_string());
        let runner = ScriptedRunner::new();
        let mut ctx = PipelineContext::new(&config, &runner);

        assert_eq!(CheckoutStage.run(&mut ctx).unwrap(), StageOutcome::Success);
        assert_eq!(
            runner.lines(),
            vec!["git fetch origin refs/pull/42/head", "git checkout FETCH_HEAD"]
        );
        assert!(runner.calls().iter().all(|c| c.cwd == Some(config.sdk_dir())));
    }

    #[test]
    fn failed_fetch_skips_checkout() {
        let dir = TempDir::new().unwrap();
        let mut config = fake_source_tree(dir.path());
        config.checkout_ref = Some("missing".to_string());
        let runner = ScriptedRunner::new().exit_with("git fetch", 128);
        let mut ctx = PipelineContext::new(&config, &runner);

        assert!(CheckoutStage.run(&mut ctx).unwrap().is_failed());
        assert!(!runner.ran("checkout FETCH_HEAD"));
    }
}
