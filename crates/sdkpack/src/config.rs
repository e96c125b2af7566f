//! Configuration file support for sdkpack.
//!
//! This module provides support for `sdkpack.toml` configuration files that
//! pin the checkout layout, build schemes and packaging switches of a CI
//! machine so the pipeline can run without flags.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. The path given with `--config`
//! 2. Current working directory (`./sdkpack.toml`)
//! 3. Parent directories (up to the repository root or filesystem root)
//!
//! Relative paths inside the file are resolved against the directory the
//! file lives in.
//!
//! ## Example Configuration
//!
//! ```toml
//! [project]
//! src_root = "src"
//! profile = "owt_web_transport"
//!
//! [build]
//! run_tests = true
//!
//! [[build.schemes]]
//! name = "debug"
//! args = "is_debug=true is_component_build=false symbol_level=1"
//!
//! [package]
//! zip = true
//! ```

use anyhow::{Context, Result};
use sdkpack_core::{BuildScheme, SdkProfile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "sdkpack.toml";

/// Root configuration structure for `sdkpack.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkpackConfig {
    /// Checkout layout and profile selection.
    pub project: ProjectConfig,

    /// Build schemes and test switches.
    pub build: BuildConfig,

    /// Packaging switches.
    pub package: PackageConfig,

    /// Additional SDK profiles. A profile with a built-in name replaces it.
    pub profiles: Vec<SdkProfile>,
}

/// Checkout layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Root of the gclient source checkout.
    ///
    /// If not specified, sdkpack looks for the nearest ancestor of the
    /// current directory containing `build/config` and `buildtools`.
    pub src_root: Option<PathBuf>,

    /// SDK checkout relative to the source root. Defaults to `owt`.
    pub sdk_dir: Option<PathBuf>,

    /// Where packages are written. Defaults to `<src_root>/../packages`.
    pub package_dir: Option<PathBuf>,

    /// Profile to build. Defaults to `owt_web_transport`.
    pub profile: Option<String>,

    /// Template copied to `build/config/gclient_args.gni` when missing.
    pub args_template: Option<PathBuf>,
}

/// Build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build schemes in build order. Defaults to debug, release.
    pub schemes: Vec<BuildScheme>,

    /// Build and run the profile's test binaries.
    pub run_tests: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            schemes: BuildScheme::defaults(),
            run_tests: true,
        }
    }
}

/// Packaging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Compress the package into `<revision>.zip`.
    pub zip: bool,

    /// Keep the package directory after zipping.
    pub keep_dir: bool,

    /// Include the third-party license file in `docs/`.
    pub licenses: bool,

    /// URL prefix under which CI publishes packages, printed with the
    /// revision appended.
    pub publish_url: Option<String>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            zip: true,
            keep_dir: false,
            licenses: true,
            publish_url: None,
        }
    }
}

impl SdkpackConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: SdkpackConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration starting from the specified directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Generates a starter configuration file as a formatted TOML string.
    ///
    /// This includes comments explaining each option.
    pub fn generate_starter_toml(profile: &str) -> String {
        let schemes = BuildScheme::defaults();
        let scheme_tables: String = schemes
            .iter()
            .map(|scheme| {
                format!(
                    "[[build.schemes]]\nname = \"{}\"\nargs = \"{}\"\n",
                    scheme.name, scheme.args
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"# sdkpack configuration file
# CLI flags override these settings when provided.

[project]
# Root of the gclient source checkout (default: auto-detect from the
# current directory)
# src_root = "src"

# SDK checkout relative to the source root (default: owt)
# sdk_dir = "owt"

# Output directory for packages (default: <src_root>/../packages)
# package_dir = "packages"

# SDK profile to build
profile = "{profile}"

# Template for build/config/gclient_args.gni (default: bundled template)
# args_template = "gclient_args.gni"

[build]
# Build and run the profile's test binaries after each scheme
run_tests = true

# Schemes are built in the order listed
{scheme_tables}
[package]
# Compress the package into <revision>.zip
zip = true

# Keep the package directory next to the archive
keep_dir = false

# Copy the third-party license file into docs/
licenses = true

# Print <publish_url>/<revision> after a successful run
# publish_url = "https://example.com/packages"

# Additional profiles
# [[profiles]]
# name = "my_sdk"
# component = "my_sdk"
# headers = "my_sdk/api"
# license = "my_sdk/docs/third_party_licenses.txt"
# sync_args = ["sync", "--reset"]
# patches = [{{ file = "0001-Add-my_sdk-to-BUILD.gn.patch", target = "." }}]
#
# [profiles.targets]
# sdk = ["my_sdk"]
# tests = ["my_sdk_tests"]
# windows_tests = []
"#,
            profile = profile,
            scheme_tables = scheme_tables,
        )
    }
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<SdkpackConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Loads the file given with `--config`, or discovers one from `cwd`.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            let config = SdkpackConfig::load_from_file(path)?;
            return Ok(Self {
                config: Some(config),
                config_path: Some(path.to_path_buf()),
            });
        }
        match SdkpackConfig::discover_from(cwd)? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Directory relative config paths are resolved against.
    fn base_dir(&self) -> Option<&Path> {
        self.config_path.as_deref().and_then(Path::parent)
    }

    /// Resolves a path from the config file against the file's directory.
    pub fn config_relative(&self, path: &Path) -> PathBuf {
        match self.base_dir() {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn project(&self) -> Option<&ProjectConfig> {
        self.config.as_ref().map(|c| &c.project)
    }

    pub fn src_root(&self) -> Option<PathBuf> {
        self.project()
            .and_then(|p| p.src_root.as_deref())
            .map(|p| self.config_relative(p))
    }

    pub fn args_template(&self) -> Option<PathBuf> {
        self.project()
            .and_then(|p| p.args_template.as_deref())
            .map(|p| self.config_relative(p))
    }

    /// Profiles declared in the config file.
    pub fn profiles(&self) -> Vec<SdkProfile> {
        self.config
            .as_ref()
            .map(|c| c.profiles.clone())
            .unwrap_or_default()
    }

    pub fn build(&self) -> BuildConfig {
        self.config
            .as_ref()
            .map(|c| c.build.clone())
            .unwrap_or_default()
    }

    pub fn package(&self) -> PackageConfig {
        self.config
            .as_ref()
            .map(|c| c.package.clone())
            .unwrap_or_default()
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// # Returns
    ///
    /// The resolved value, preferring CLI over config over default.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&SdkpackConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SdkpackConfig::default();
        assert!(config.package.zip);
        assert!(!config.package.keep_dir);
        assert!(config.build.run_tests);
        assert_eq!(config.build.schemes, BuildScheme::defaults());
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);

        let toml_content = r#"
[project]
src_root = "chromium/src"
profile = "owt_quic_transport"

[build]
run_tests = false

[[build.schemes]]
name = "release"
args = "is_debug=false"

[package]
zip = false
publish_url = "https://example.com/packages"

[[profiles]]
name = "owt_quic_transport"
component = "quic_transport"
headers = "quic_transport/sdk/api"
sync_args = ["sync"]

[profiles.targets]
sdk = ["owt_quic_transport"]
tests = ["owt_quic_transport_tests"]
"#;
        std::fs::write(&config_path, toml_content).unwrap();

        let config = SdkpackConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.project.profile.as_deref(), Some("owt_quic_transport"));
        assert!(!config.build.run_tests);
        assert_eq!(config.build.schemes, vec![BuildScheme::new("release", "is_debug=false")]);
        assert!(!config.package.zip);
        assert!(config.package.licenses);
        assert_eq!(config.profiles.len(), 1);
        assert_eq!(
            config.profiles[0].targets.tests,
            vec!["owt_quic_transport_tests"]
        );
        assert!(config.profiles[0].targets.windows_tests.is_empty());
        assert!(config.profiles[0].patches.is_empty());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[project\nsrc_root = ").unwrap();

        let err = SdkpackConfig::load_from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_discover_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[project]\nprofile = \"owt_web_transport\"\n",
        )
        .unwrap();
        let nested = temp_dir.path().join("src/owt");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, path) = SdkpackConfig::discover_from(&nested).unwrap().unwrap();
        assert_eq!(path, temp_dir.path().join(CONFIG_FILE_NAME));
        assert_eq!(config.project.profile.as_deref(), Some("owt_web_transport"));
    }

    #[test]
    fn test_discover_no_config() {
        let temp_dir = TempDir::new().unwrap();
        // Create a .git directory to stop the search
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();

        let result = SdkpackConfig::discover_from(temp_dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &config_path,
            "[project]\nsrc_root = \"src\"\npackage_dir = \"/abs/packages\"\n",
        )
        .unwrap();

        let resolver = ConfigResolver::load(Some(&config_path), Path::new("/")).unwrap();
        assert_eq!(resolver.src_root(), Some(temp_dir.path().join("src")));
        assert_eq!(
            resolver.config_relative(Path::new("/abs/packages")),
            PathBuf::from("/abs/packages")
        );
    }

    #[test]
    fn test_config_resolver() {
        let resolver = ConfigResolver {
            config: Some(SdkpackConfig {
                project: ProjectConfig {
                    profile: Some("owt_quic_transport".to_string()),
                    ..ProjectConfig::default()
                },
                ..SdkpackConfig::default()
            }),
            config_path: None,
        };

        // CLI value takes precedence
        let result = resolver.resolve(
            Some("cli".to_string()),
            |c| c.project.profile.clone(),
            "default".to_string(),
        );
        assert_eq!(result, "cli");

        // Config value used when CLI is None
        let result = resolver.resolve(None, |c| c.project.profile.clone(), "default".to_string());
        assert_eq!(result, "owt_quic_transport");

        // Default used when neither provides one
        let empty = ConfigResolver::default();
        let result = empty.resolve(None, |c| c.project.profile.clone(), "default".to_string());
        assert_eq!(result, "default");
        assert!(empty.package().zip);
    }

    #[test]
    fn test_generate_starter_toml_parses() {
        let toml = SdkpackConfig::generate_starter_toml("owt_web_transport");
        assert!(toml.contains("profile = \"owt_web_transport\""));
        assert!(toml.contains("symbol_level=1"));

        let config: SdkpackConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config.project.profile.as_deref(), Some("owt_web_transport"));
        assert_eq!(config.build.schemes, BuildScheme::defaults());
        assert!(config.package.zip);
    }
}
