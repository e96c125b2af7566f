//! Scheme builds and test execution.

use tracing::{info, warn};

use crate::pipeline::{PipelineContext, PipelineState, Stage};
use crate::tools::ToolCommand;
use crate::types::{FailurePolicy, PipelineError, StageOutcome};

/// Generates and builds every scheme in order, running the test binaries
/// after each build.
///
/// For each scheme:
/// 1. `gn gen out/<scheme> --args=<args>` - exit code logged, not checked
/// 2. `ninja -C out/<scheme> <sdk targets> <test targets>` - must succeed
/// 3. every test binary on this platform, no arguments, stdout discarded -
///    must exit 0
///
/// The first failure ends the stage; later schemes are not built.
pub struct BuildStage;

impl Stage for BuildStage {
    fn name(&self) -> &'static str {
        "build"
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }

    fn reaches(&self) -> PipelineState {
        PipelineState::BuiltAndTested
    }

    fn run(&self, ctx: &mut PipelineContext<'_>) -> Result<StageOutcome, PipelineError> {
        let config = ctx.config;
        let platform = config.platform;
        let targets = config.profile.targets.ninja_targets(platform, config.run_tests);
        let tests = if config.run_tests {
            config.profile.targets.tests_for(platform)
        } else {
            Vec::new()
        };

        for scheme in &config.schemes {
            let out_dir = config.out_dir(&scheme.name);
            info!(scheme = %scheme.name, out_dir = %out_dir.display(), "building scheme");

            let gen_cmd = ToolCommand::new(ctx.tool("gn"))
                .arg("gen")
                .arg(&out_dir)
                .arg(format!("--args={}", scheme.args))
                .current_dir(&config.src_root)
                .envs(ctx.tool_env.iter().cloned());
            let status = ctx.runner.run(&gen_cmd)?;
            if !status.success() {
                // Left unchecked: a broken configuration surfaces in the ninja step.
                warn!(scheme = %scheme.name, %status, "gn gen returned non-zero");
            }

            let ninja = ToolCommand::new(ctx.tool("ninja"))
                .arg("-C")
                .arg(&out_dir)
                .args(&targets)
                .current_dir(&config.src_root)
                .envs(ctx.tool_env.iter().cloned());
            let status = ctx.runner.run(&ninja)?;
            if !status.success() {
                return Ok(StageOutcome::failed(format!(
                    "ninja failed for scheme '{}' ({})",
                    scheme.name, status
                )));
            }

            for test in &tests {
                let binary = out_dir.join(platform.executable(test));
                info!(scheme = %scheme.name, test = %test, "running test binary");
                let status = ctx
                    .runner
                    .run(&ToolCommand::new(&binary).discard_stdout())?;
                if !status.success() {
                    return Ok(StageOutcome::failed(format!(
                        "test '{}' failed for scheme '{}' ({})",
                        test, scheme.name, status
                    )));
                }
            }
        }

        Ok(StageOutcome::Success)
    }
}
