//! Build pipeline for native transport SDKs.
//!
//! `sdkpack-core` drives the CI build of an SDK that lives inside a larger
//! gclient checkout. A run syncs dependencies, applies local patches, builds
//! every scheme with `gn` and `ninja`, runs the test binaries and packages
//! headers and binaries into an archive named after the SDK revision.
//!
//! # Quick Start
//!
//! ```ignore
//! use sdkpack_core::{Pipeline, PipelineConfig, SdkProfile, SystemRunner};
//!
//! let mut config = PipelineConfig::new("/work/src", SdkProfile::web_transport());
//! config.checkout_ref = Some("main".to_string());
//!
//! let report = Pipeline::standard().run(&config, &SystemRunner)?;
//! if let Some(package) = &report.package {
//!     println!("Package: {}", package.path().display());
//! }
//! std::process::exit(report.exit_code());
//! # Ok::<(), sdkpack_core::PipelineError>(())
//! ```
//!
//! # Architecture
//!
//! - **Profiles** ([`profile`]): per-SDK targets, headers, patches
//! - **Tools** ([`tools`]): the [`ToolRunner`] seam every external process goes through
//! - **Stages** ([`stages`]): checkout, sync, patch, configure, build, package
//! - **Pipeline** ([`pipeline`]): ordered stages, failure policies, run report
//! - **Package** ([`package`]): package layout and zip archive

pub mod package;
pub mod pipeline;
pub mod profile;
pub mod stages;
pub mod tools;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use package::{PackageManifest, PackageOptions, zip_dir};
pub use pipeline::{
    Pipeline, PipelineConfig, PipelineContext, PipelineReport, PipelineState, Stage, StageRecord,
};
pub use profile::{DEFAULT_PROFILE, PatchEntry, SdkProfile, TargetSet};
pub use tools::{DryRunRunner, SystemRunner, ToolCommand, ToolRunner, ToolStatus};
pub use types::{
    BuildScheme, FailurePolicy, PackageLocation, PipelineError, Platform, StageOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedRunner, fake_source_tree};
    use tempfile::TempDir;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn full_run_produces_zip_named_by_revision() {
        let dir = TempDir::new().unwrap();
        let config = fake_source_tree(dir.path());
        let runner = ScriptedRunner::new().capture_output("abc123");

        let report = Pipeline::standard().run(&config, &runner).unwrap();

        assert_eq!(report.state, PipelineState::Done);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.content_id.as_deref(), Some("abc123"));
        let packages = dir.path().join("packages");
        assert!(packages.join("abc123.zip").is_file());
        assert!(!packages.join("abc123").exists());
        assert!(matches!(
            report.outcome_of("checkout"),
            Some(StageOutcome::Skipped { .. })
        ));

        let file = std::fs::File::open(packages.join("abc123.zip")).unwrap();
        let archive = zip::ZipArchive::new(file).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.iter().any(|n| n.starts_with("include/")));
        assert!(names.iter().any(|n| n.starts_with("bin/debug/")));
        assert!(names.iter().any(|n| n.starts_with("bin/release/")));
    }

    #[test]
    fn full_run_keeps_directory_layout_when_asked() {
        let dir = TempDir::new().unwrap();
        let mut config = fake_source_tree(dir.path());
        config.package.keep_dir = true;
        let runner = ScriptedRunner::new().capture_output("abc123");

        Pipeline::standard().run(&config, &runner).unwrap();

        let root = dir.path().join("packages/abc123");
        assert!(root.join("include").is_dir());
        assert!(root.join("bin/debug").is_dir());
        assert!(root.join("bin/release").is_dir());
        assert!(root.join("docs/third_party_licenses.txt").is_file());
    }

    #[test]
    fn sync_failure_exits_before_patching_or_building() {
        let dir = TempDir::new().unwrap();
        let config = fake_source_tree(dir.path());
        let runner = ScriptedRunner::new().exit_with("gclient sync", 1);

        let report = Pipeline::standard().run(&config, &runner).unwrap();

        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failed_stage.as_deref(), Some("sync"));
        assert!(!runner.ran("git am"));
        assert!(!runner.ran("ninja"));
        assert!(!dir.path().join("packages").exists());
    }

    #[test]
    fn already_applied_patch_does_not_abort() {
        let dir = TempDir::new().unwrap();
        let config = fake_source_tree(dir.path());
        let runner = ScriptedRunner::new().exit_with("BUILD.gn.patch", 128);

        let report = Pipeline::standard().run(&config, &runner).unwrap();

        assert_eq!(report.state, PipelineState::Done);
        assert!(report.outcome_of("patch").unwrap().is_failed());
        assert!(runner.ran("git am --skip"));
        assert!(runner.ran("ninja"));
    }

    #[test]
    fn build_failure_skips_packaging() {
        let dir = TempDir::new().unwrap();
        let config = fake_source_tree(dir.path());
        let runner = ScriptedRunner::new().exit_with("ninja", 1);

        let report = Pipeline::standard().run(&config, &runner).unwrap();

        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failed_stage.as_deref(), Some("build"));
        assert!(report.outcome_of("package").is_none());
        assert!(!runner.ran("rev-parse"));
        assert!(!dir.path().join("packages").exists());
    }

    #[test]
    fn failing_test_binary_skips_packaging() {
        let dir = TempDir::new().unwrap();
        let config = fake_source_tree(dir.path());
        let test_binary = config
            .out_dir("release")
            .join("owt_web_transport_tests")
            .display()
            .to_string();
        let runner = ScriptedRunner::new().exit_with(&test_binary, 1);

        let report = Pipeline::standard().run(&config, &runner).unwrap();

        assert_eq!(report.state, PipelineState::Failed);
        assert!(report.package.is_none());
        assert!(!dir.path().join("packages").exists());
    }

    #[test]
    fn checkout_failure_is_unchecked() {
        let dir = TempDir::new().unwrap();
        let mut config = fake_source_tree(dir.path());
        config.checkout_ref = Some("feature".to_string());
        let runner = ScriptedRunner::new().exit_with("git fetch", 1);

        let report = Pipeline::standard().run(&config, &runner).unwrap();

        assert_eq!(report.state, PipelineState::Done);
        assert!(report.outcome_of("checkout").unwrap().is_failed());
    }

    #[test]
    fn dry_run_spawns_nothing_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = fake_source_tree(dir.path());
        config.dry_run = true;

        let report = Pipeline::standard().run(&config, &DryRunRunner).unwrap();

        assert_eq!(report.state, PipelineState::Done);
        assert!(!config.args_file().exists());
        assert!(!dir.path().join("packages").exists());
    }
}
