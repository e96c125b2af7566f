//! Scripted tool runner for unit tests.

use std::cell::RefCell;

use crate::tools::{ToolCommand, ToolRunner, ToolStatus};
use crate::types::PipelineError;

type Matcher = Box<dyn Fn(&ToolCommand) -> bool>;

/// Records every command and answers with scripted exit codes.
///
/// Commands succeed unless a rule added with [`ScriptedRunner::exit_with`]
/// matches their display string. `capture` returns `abc123` unless
/// overridden.
pub struct ScriptedRunner {
    rules: Vec<(Matcher, i32)>,
    capture_output: String,
    calls: RefCell<Vec<ToolCommand>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            capture_output: "abc123".to_string(),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Commands whose display string contains `needle` exit with `code`.
    pub fn exit_with(mut self, needle: &str, code: i32) -> Self {
        let needle = needle.to_string();
        self.rules
            .push((Box::new(move |cmd| cmd.to_string().contains(&needle)), code));
        self
    }

    pub fn capture_output(mut self, output: &str) -> Self {
        self.capture_output = output.to_string();
        self
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.borrow().clone()
    }

    /// Display strings of every recorded command, in order.
    pub fn lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToString::to_string).collect()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, cmd: &ToolCommand) -> Result<ToolStatus, PipelineError> {
        self.calls.borrow_mut().push(cmd.clone());
        let code = self
            .rules
            .iter()
            .find(|(matches, _)| matches(cmd))
            .map(|(_, code)| *code)
            .unwrap_or(0);
        Ok(ToolStatus::from_code(code))
    }

    fn capture(&self, cmd: &ToolCommand) -> Result<String, PipelineError> {
        self.calls.borrow_mut().push(cmd.clone());
        Ok(self.capture_output.clone())
    }
}

/// Lays out a minimal source checkout below `root` and returns a config
/// for it, pinned to Linux so binary names are predictable.
///
/// The tree has headers, a license file and build outputs for the default
/// schemes, as if every tool had already run.
pub fn fake_source_tree(root: &std::path::Path) -> crate::pipeline::PipelineConfig {
    use std::fs;

    use crate::pipeline::PipelineConfig;
    use crate::profile::SdkProfile;
    use crate::types::Platform;

    let src = root.join("src");
    let sdk = src.join("owt");
    fs::create_dir_all(src.join("build/config")).unwrap();
    fs::create_dir_all(src.join("buildtools")).unwrap();
    fs::create_dir_all(sdk.join("web_transport/sdk/api/owt/quic")).unwrap();
    fs::create_dir_all(sdk.join("web_transport/docs")).unwrap();
    fs::create_dir_all(sdk.join("web_transport/patches")).unwrap();
    fs::write(
        sdk.join("web_transport/sdk/api/owt/quic/web_transport_factory.h"),
        "#pragma once\n",
    )
    .unwrap();
    fs::write(
        sdk.join("web_transport/sdk/api/owt/quic/logging.h"),
        "#pragma once\n",
    )
    .unwrap();
    fs::write(
        sdk.join("web_transport/docs/third_party_licenses.txt"),
        "licenses\n",
    )
    .unwrap();

    let mut config = PipelineConfig::new(&src, SdkProfile::web_transport());
    config.platform = Platform::Linux;
    for scheme in &config.schemes {
        let out = config.out_dir(&scheme.name);
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("libowt_web_transport.so"), scheme.name.as_bytes()).unwrap();
    }
    config
}
