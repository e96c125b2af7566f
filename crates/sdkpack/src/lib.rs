//! # sdkpack
//!
//! Command-line driver for the native transport SDK build pipeline.
//!
//! A CI job runs `sdkpack run` from anywhere inside a gclient checkout. The
//! tool locates the source root, syncs dependencies, applies the SDK's
//! patches, builds every scheme, runs the tests and packages headers and
//! binaries into `<revision>.zip`.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Run the full pipeline |
//! | `init` | Write a starter `sdkpack.toml` |
//! | `profiles` | List the SDK profiles that can be built |
//!
//! ## Global Flags
//!
//! - `--dry-run` - Log every command instead of running it
//! - `-v, --verbose` - Debug logging (`RUST_LOG` takes precedence)
//!
//! ## Exit Codes
//!
//! `0` when the pipeline reached `Done`, `1` when a fatal stage failed or
//! the run could not start.
//!
//! ## Modules
//!
//! - [`config`] - Configuration file support for `sdkpack.toml`

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use sdkpack_core::{
    DEFAULT_PROFILE, DryRunRunner, PackageLocation, PackageOptions, Pipeline, PipelineConfig,
    PipelineReport, SdkProfile, SystemRunner, ToolRunner,
};
use std::env;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, prelude::*};

pub mod config;

use config::{CONFIG_FILE_NAME, ConfigResolver, SdkpackConfig};

/// CI orchestrator that builds, tests and packages native transport SDKs.
#[derive(Parser, Debug)]
#[command(name = "sdkpack", author, version, about = "Build, test and package native transport SDKs", long_about = None)]
struct Cli {
    /// Print what would be done without actually doing it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print verbose output including all commands
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync, patch, build, test and package the SDK.
    Run(RunArgs),
    /// Scaffold a starter sdkpack.toml.
    Init {
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        output: PathBuf,
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,
    },
    /// List built-in and configured SDK profiles.
    Profiles {
        #[arg(long, help = "Optional path to config file")]
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    #[arg(long = "ref", help = "SDK reference to fetch and check out before syncing")]
    checkout_ref: Option<String>,
    #[arg(long, help = "SDK profile to build")]
    profile: Option<String>,
    #[arg(long, help = "Root of the gclient source checkout")]
    src_root: Option<PathBuf>,
    #[arg(long, help = "SDK directory relative to the source root")]
    sdk_dir: Option<PathBuf>,
    #[arg(long, help = "Output directory for packages")]
    package_dir: Option<PathBuf>,
    #[arg(long, help = "Optional path to config file")]
    config: Option<PathBuf>,
    #[arg(long, help = "Leave the package as a directory instead of a zip")]
    no_zip: bool,
    #[arg(long, help = "Keep the package directory next to the zip")]
    keep_dir: bool,
    #[arg(long, help = "Build without test targets and skip running tests")]
    skip_tests: bool,
    #[arg(long, help = "Do not copy the third-party license file")]
    no_licenses: bool,
    #[arg(long, help = "URL prefix the package is published under")]
    publish_url: Option<String>,
    #[arg(long, help = "Optional output path for JSON run report")]
    report: Option<PathBuf>,
}

/// Parses the command line, runs the selected command and returns the
/// process exit code.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    configure_tracing(cli.verbose)?;

    match cli.command {
        Command::Run(args) => {
            let cwd = env::current_dir().context("resolving current directory")?;
            let resolver = ConfigResolver::load(args.config.as_deref(), &cwd)?;
            if let Some(path) = &resolver.config_path {
                debug!("using config {}", path.display());
            }
            let config = build_pipeline_config(&args, &resolver, &cwd, cli.dry_run)?;
            let runner: Box<dyn ToolRunner> = if cli.dry_run {
                Box::new(DryRunRunner)
            } else {
                Box::new(SystemRunner)
            };

            let report = Pipeline::standard().run(&config, runner.as_ref())?;

            if let Some(path) = &args.report {
                report
                    .write_json(path)
                    .with_context(|| format!("writing run report {:?}", path))?;
                info!("wrote run report to {}", path.display());
            }

            let publish_url = args.publish_url.or(resolver.package().publish_url);
            print_summary(&report, publish_url.as_deref());
            Ok(ExitCode::from(report.exit_code() as u8))
        }
        Command::Init { output, profile } => {
            let cwd = env::current_dir().context("resolving current directory")?;
            let resolver = ConfigResolver::load(None, &cwd)?;
            SdkProfile::resolve(&profile, &resolver.profiles())?;
            if cli.dry_run {
                println!("[dry-run] would write {}", output.display());
                return Ok(ExitCode::SUCCESS);
            }
            ensure_can_write(&output)?;
            fs::write(&output, SdkpackConfig::generate_starter_toml(&profile))
                .with_context(|| format!("writing config {:?}", output))?;
            println!("Wrote starter config to {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Profiles { config } => {
            let cwd = env::current_dir().context("resolving current directory")?;
            let resolver = ConfigResolver::load(config.as_deref(), &cwd)?;
            for profile in list_profiles(&resolver.profiles()) {
                println!("{}", profile);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn configure_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))
}

/// Merges CLI flags, `sdkpack.toml` and defaults into a pipeline config.
fn build_pipeline_config(
    args: &RunArgs,
    resolver: &ConfigResolver,
    cwd: &Path,
    dry_run: bool,
) -> Result<PipelineConfig> {
    let profile_name = resolver.resolve(
        args.profile.clone(),
        |c| c.project.profile.clone(),
        DEFAULT_PROFILE.to_string(),
    );
    let profile = SdkProfile::resolve(&profile_name, &resolver.profiles())?;

    let src_root = match args.src_root.clone().or_else(|| resolver.src_root()) {
        Some(path) => absolutize(cwd, path),
        None => find_src_root(cwd)?,
    };

    let mut config = PipelineConfig::new(src_root, profile);
    config.sdk_subdir = resolver.resolve(
        args.sdk_dir.clone(),
        |c| c.project.sdk_dir.clone(),
        config.sdk_subdir.clone(),
    );
    config.package_dir = resolver.resolve(
        args.package_dir.clone().map(|path| absolutize(cwd, path)),
        |c| {
            c.project
                .package_dir
                .as_deref()
                .map(|path| resolver.config_relative(path))
        },
        config.package_dir.clone(),
    );
    config.args_template = resolver.args_template();

    let build = resolver.build();
    config.schemes = build.schemes;
    config.run_tests = build.run_tests && !args.skip_tests;

    let package = resolver.package();
    config.package = PackageOptions {
        zip: package.zip && !args.no_zip,
        keep_dir: package.keep_dir || args.keep_dir,
        licenses: package.licenses && !args.no_licenses,
    };

    config.checkout_ref = args.checkout_ref.clone();
    config.dry_run = dry_run;
    Ok(config)
}

fn absolutize(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

/// Finds the nearest ancestor of `start` that looks like a gclient source
/// root: it has both `build/config` and `buildtools`.
fn find_src_root(start: &Path) -> Result<PathBuf> {
    for dir in start.ancestors() {
        if dir.join("build").join("config").is_dir() && dir.join("buildtools").is_dir() {
            return Ok(dir.to_path_buf());
        }
    }
    bail!(
        "could not locate the source root from {:?}; pass --src-root or set project.src_root in {}",
        start,
        CONFIG_FILE_NAME
    )
}

fn list_profiles(extra: &[SdkProfile]) -> Vec<String> {
    let mut names: Vec<String> = SdkProfile::builtin()
        .into_iter()
        .map(|profile| profile.name)
        .collect();
    for profile in extra {
        if !names.contains(&profile.name) {
            names.push(profile.name.clone());
        }
    }
    names
}

fn print_summary(report: &PipelineReport, publish_url: Option<&str>) {
    if !report.succeeded() {
        return;
    }
    match &report.package {
        Some(PackageLocation::Archive(path)) => println!("Package ready: {}", path.display()),
        Some(PackageLocation::Directory(path)) => {
            println!("Package directory ready: {}", path.display())
        }
        None => return,
    }
    if let (Some(url), Some(id)) = (publish_url, report.content_id.as_deref()) {
        println!(
            "Please find the package in {}/{}",
            url.trim_end_matches('/'),
            id
        );
    }
}

fn ensure_can_write(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing file: {:?}", path);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory {:?}", parent))?;
    }
    Ok(())
}
