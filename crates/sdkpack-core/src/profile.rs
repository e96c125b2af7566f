//! SDK profiles.
//!
//! A profile bundles everything that differs between the SDKs built from
//! the same checkout: which component directory they live in, which ninja
//! targets make up the SDK, which test binaries gate the package, where the
//! public headers are and which patches must be applied first.
//!
//! Two profiles are built in:
//!
//! | Profile | Component | Headers |
//! |---------|-----------|---------|
//! | `owt_web_transport` | `web_transport` | `web_transport/sdk/api` |
//! | `owt_quic_transport` | `quic_transport` | `quic_transport/api` |

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{PipelineError, Platform};

/// Name of the profile used when none is selected.
pub const DEFAULT_PROFILE: &str = "owt_web_transport";

/// One patch and the directory it is applied in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEntry {
    /// Patch file name, relative to the profile's patches directory.
    pub file: String,
    /// Directory `git am` runs in, relative to the source root.
    #[serde(default = "default_patch_target")]
    pub target: PathBuf,
}

fn default_patch_target() -> PathBuf {
    PathBuf::from(".")
}

/// Build outputs and test binaries for one build invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSet {
    /// Ninja targets producing the SDK binaries.
    pub sdk: Vec<String>,
    /// Test executables run after every scheme build.
    pub tests: Vec<String>,
    /// Test executables that only exist on Windows builds.
    pub windows_tests: Vec<String>,
}

impl TargetSet {
    /// Test targets that apply on `platform`, in execution order.
    pub fn tests_for(&self, platform: Platform) -> Vec<String> {
        let mut tests = self.tests.clone();
        if platform == Platform::Windows {
            tests.extend(self.windows_tests.iter().cloned());
        }
        tests
    }

    /// Everything ninja is asked to build on `platform`.
    pub fn ninja_targets(&self, platform: Platform, include_tests: bool) -> Vec<String> {
        let mut targets = self.sdk.clone();
        if include_tests {
            targets.extend(self.tests_for(platform));
        }
        targets
    }
}

/// Per-SDK settings for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkProfile {
    /// Profile name, also the default SDK target name.
    pub name: String,
    /// Component directory inside the SDK checkout (e.g. `web_transport`).
    pub component: String,
    pub targets: TargetSet,
    /// Header directory relative to the SDK checkout.
    pub headers: PathBuf,
    /// Third-party license file relative to the SDK checkout.
    #[serde(default)]
    pub license: Option<PathBuf>,
    /// Patches directory relative to the SDK checkout.
    /// Defaults to `<component>/patches`.
    #[serde(default)]
    pub patches_dir: Option<PathBuf>,
    #[serde(default)]
    pub patches: Vec<PatchEntry>,
    /// Arguments for the dependency sync tool.
    #[serde(default = "default_sync_args")]
    pub sync_args: Vec<String>,
}

fn default_sync_args() -> Vec<String> {
    vec!["sync".to_string(), "--reset".to_string()]
}

impl SdkProfile {
    /// The WebTransport SDK profile.
    pub fn web_transport() -> Self {
        Self {
            name: "owt_web_transport".to_string(),
            component: "web_transport".to_string(),
            targets: TargetSet {
                sdk: vec!["owt_web_transport".to_string()],
                tests: vec!["owt_web_transport_tests".to_string()],
                windows_tests: vec!["owt_web_transport_dll_tests".to_string()],
            },
            headers: PathBuf::from("web_transport/sdk/api"),
            license: Some(PathBuf::from("web_transport/docs/third_party_licenses.txt")),
            patches_dir: None,
            patches: vec![PatchEntry {
                file: "0001-Add-owt_web_transport-to-BUILD.gn.patch".to_string(),
                target: default_patch_target(),
            }],
            sync_args: default_sync_args(),
        }
    }

    /// The QUIC transport SDK profile.
    pub fn quic_transport() -> Self {
        Self {
            name: "owt_quic_transport".to_string(),
            component: "quic_transport".to_string(),
            targets: TargetSet {
                sdk: vec!["owt_quic_transport".to_string()],
                tests: Vec::new(),
                windows_tests: Vec::new(),
            },
            headers: PathBuf::from("quic_transport/api"),
            license: None,
            patches_dir: None,
            patches: vec![PatchEntry {
                file: "0001-Add-owt_quic_transport-to-BUILD.gn.patch".to_string(),
                target: default_patch_target(),
            }],
            sync_args: vec!["sync".to_string()],
        }
    }

    /// All built-in profiles.
    pub fn builtin() -> Vec<SdkProfile> {
        vec![Self::web_transport(), Self::quic_transport()]
    }

    /// Looks up a profile by name in `extra` first, then in the built-ins.
    pub fn resolve(name: &str, extra: &[SdkProfile]) -> Result<SdkProfile, PipelineError> {
        extra
            .iter()
            .cloned()
            .chain(Self::builtin())
            .find(|profile| profile.name == name)
            .ok_or_else(|| {
                let mut known: Vec<String> = extra.iter().map(|p| p.name.clone()).collect();
                known.extend(Self::builtin().into_iter().map(|p| p.name));
                PipelineError::Config(format!(
                    "unknown SDK profile '{}'. Available profiles: {}",
                    name,
                    known.join(", ")
                ))
            })
    }

    /// Patches directory relative to the SDK checkout.
    pub fn patches_dir(&self) -> PathBuf {
        self.patches_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.component).join("patches"))
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.targets.sdk.is_empty() {
            return Err(PipelineError::Config(format!(
                "profile '{}' declares no SDK targets",
                self.name
            )));
        }
        if self.sync_args.is_empty() {
            return Err(PipelineError::Config(format!(
                "profile '{}' has empty sync_args",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_adds_dll_tests() {
        let targets = SdkProfile::web_transport().targets;
        assert_eq!(targets.tests_for(Platform::Linux), vec!["owt_web_transport_tests"]);
        assert_eq!(
            targets.tests_for(Platform::Windows),
            vec!["owt_web_transport_tests", "owt_web_transport_dll_tests"]
        );
    }

    #[test]
    fn ninja_targets_put_sdk_first() {
        let targets = SdkProfile::web_transport().targets;
        assert_eq!(
            targets.ninja_targets(Platform::Linux, true),
            vec!["owt_web_transport", "owt_web_transport_tests"]
        );
        assert_eq!(targets.ninja_targets(Platform::Linux, false), vec!["owt_web_transport"]);
    }

    #[test]
    fn resolve_prefers_configured_profiles() {
        let mut custom = SdkProfile::quic_transport();
        custom.headers = PathBuf::from("custom/api");
        let resolved = SdkProfile::resolve("owt_quic_transport", &[custom]).unwrap();
        assert_eq!(resolved.headers, PathBuf::from("custom/api"));
    }

    #[test]
    fn resolve_unknown_lists_available() {
        let err = SdkProfile::resolve("nope", &[]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("owt_web_transport"));
        assert!(msg.contains("owt_quic_transport"));
    }

    #[test]
    fn patches_dir_defaults_to_component() {
        assert_eq!(
            SdkProfile::quic_transport().patches_dir(),
            PathBuf::from("quic_transport/patches")
        );
    }

    #[test]
    fn profile_without_sdk_targets_is_invalid() {
        let mut profile = SdkProfile::web_transport();
        profile.targets.sdk.clear();
        assert!(profile.validate().is_err());
    }
}
