//! Core types for sdkpack-core.
//!
//! This module defines the fundamental types used throughout the pipeline:
//!
//! - [`PipelineError`] - Error types for stage execution and packaging
//! - [`Platform`] - Host platform selection (tool names, binary names)
//! - [`BuildScheme`] - Named build configuration with its `gn` arguments
//! - [`StageOutcome`] / [`FailurePolicy`] - Typed stage results and how the
//!   driver treats a failure

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Error types for sdkpack-core operations.
///
/// These are the failures that cannot be expressed as a stage outcome:
/// a tool that cannot be spawned, a file that cannot be copied, an archive
/// that cannot be written. A non-zero exit from an external tool is *not* an
/// error; it becomes a [`StageOutcome::Failed`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An I/O error occurred.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),

    /// An external tool could not be started or produced unusable output.
    #[error("tool error: {0}")]
    Tool(String),

    /// Invalid profile, scheme or path configuration.
    #[error("configuration error: {0}. Check sdkpack.toml or CLI flags")]
    Config(String),

    /// Assembling the package directory failed.
    #[error("package error: {0}")]
    Package(String),

    /// Writing the package archive failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Walking the package directory failed.
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// JSON serialization of the run report failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Host platform the pipeline runs on.
///
/// The platform decides which wrapper scripts are invoked (`git.bat` vs
/// `git`), which suffix test executables carry and which binary files an
/// SDK target produces.
///
/// # Example
///
/// ```
/// use sdkpack_core::Platform;
///
/// assert_eq!(Platform::Linux.binary_files("owt_web_transport"), vec!["libowt_web_transport.so"]);
/// assert_eq!(Platform::Windows.executable("owt_tests"), "owt_tests.exe");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    #[serde(rename = "macos")]
    MacOs,
}

impl Platform {
    /// Detects the platform this binary was compiled for.
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
        }
    }

    /// Resolves the name of a depot_tools style tool.
    ///
    /// On Windows `git`, `gclient` and `gn` are batch wrappers; `ninja` ships
    /// as a real executable and keeps its plain name.
    pub fn tool(&self, name: &str) -> String {
        match self {
            Platform::Windows if name != "ninja" => format!("{}.bat", name),
            _ => name.to_string(),
        }
    }

    /// File name of a test executable built for `target`.
    pub fn executable(&self, target: &str) -> String {
        match self {
            Platform::Windows => format!("{}.exe", target),
            _ => target.to_string(),
        }
    }

    /// Files an SDK target produces in a build output directory.
    pub fn binary_files(&self, target: &str) -> Vec<String> {
        match self {
            Platform::Windows => vec![format!("{}.dll", target), format!("{}.dll.lib", target)],
            Platform::Linux => vec![format!("lib{}.so", target)],
            Platform::MacOs => vec![format!("lib{}.dylib", target)],
        }
    }
}

/// A named build configuration.
///
/// The name doubles as the output directory below `out/` and as the
/// directory below `bin/` in the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildScheme {
    /// Scheme name (e.g. "debug").
    pub name: String,
    /// Arguments handed to `gn gen --args=...`.
    pub args: String,
}

impl BuildScheme {
    pub fn new(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: args.into(),
        }
    }

    /// The default scheme list: debug first, then release.
    pub fn defaults() -> Vec<BuildScheme> {
        vec![
            BuildScheme::new(
                "debug",
                "is_debug=true is_component_build=false symbol_level=1",
            ),
            BuildScheme::new("release", "is_debug=false is_component_build=false"),
        ]
    }

    /// Checks a scheme list for empty or duplicate names.
    pub fn validate_all(schemes: &[BuildScheme]) -> Result<(), PipelineError> {
        if schemes.is_empty() {
            return Err(PipelineError::Config(
                "at least one build scheme is required".to_string(),
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for scheme in schemes {
            let name = scheme.name.trim();
            let mut components = Path::new(&scheme.name).components();
            let single_dir = matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            );
            if name.is_empty() || !single_dir || name.contains(['/', '\\']) {
                return Err(PipelineError::Config(format!(
                    "invalid build scheme name '{}': names are used as directory names",
                    scheme.name
                )));
            }
            if !seen.insert(name) {
                return Err(PipelineError::Config(format!(
                    "duplicate build scheme '{}'",
                    scheme.name
                )));
            }
        }
        Ok(())
    }
}

/// Result of running one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StageOutcome {
    Success,
    Failed { reason: String },
    Skipped { reason: String },
}

impl StageOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        StageOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        StageOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. })
    }
}

/// How the pipeline driver treats a [`StageOutcome::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Failure aborts the pipeline.
    Fatal,
    /// Failure is expected in normal operation (e.g. a patch that is
    /// already applied) and is logged.
    Tolerated,
    /// The exit code is not inspected; a failure only surfaces through
    /// a later stage.
    Unchecked,
}

/// Where the finished package ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum PackageLocation {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl PackageLocation {
    pub fn path(&self) -> &std::path::Path {
        match self {
            PackageLocation::Directory(path) | PackageLocation::Archive(path) => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_binaries_include_import_library() {
        let files = Platform::Windows.binary_files("owt_quic_transport");
        assert_eq!(files, vec!["owt_quic_transport.dll", "owt_quic_transport.dll.lib"]);
    }

    #[test]
    fn windows_tools_use_batch_wrappers_except_ninja() {
        assert_eq!(Platform::Windows.tool("gclient"), "gclient.bat");
        assert_eq!(Platform::Windows.tool("ninja"), "ninja");
        assert_eq!(Platform::Linux.tool("git"), "git");
    }

    #[test]
    fn default_schemes_build_debug_before_release() {
        let names: Vec<_> = BuildScheme::defaults().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["debug", "release"]);
    }

    #[test]
    fn rejects_duplicate_and_empty_schemes() {
        let dup = vec![BuildScheme::new("debug", ""), BuildScheme::new("debug", "x")];
        assert!(matches!(BuildScheme::validate_all(&dup), Err(PipelineError::Config(_))));
        assert!(BuildScheme::validate_all(&[]).is_err());
        assert!(BuildScheme::validate_all(&[BuildScheme::new("out/x", "")]).is_err());
        assert!(BuildScheme::validate_all(&[BuildScheme::new("..", "")]).is_err());
        assert!(BuildScheme::validate_all(&[BuildScheme::new(".", "")]).is_err());
        assert!(BuildScheme::validate_all(&[BuildScheme::new("   ", "")]).is_err());
        assert!(BuildScheme::validate_all(&BuildScheme::defaults()).is_ok());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_string(&StageOutcome::failed("exit 1")).unwrap();
        assert_eq!(json, r#"{"status":"failed","reason":"exit 1"}"#);
    }
}
