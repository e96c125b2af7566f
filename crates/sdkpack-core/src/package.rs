//! SDK package assembly.
//!
//! A package is named by the SDK revision it was built from and has a fixed
//! layout:
//!
//! ```text
//! packages/<revision>/
//! ├── include/            # public API headers, copied verbatim
//! ├── bin/<scheme>/       # SDK binaries of every build scheme
//! └── docs/               # third-party licenses (optional)
//! ```
//!
//! By default the directory is then compressed into `packages/<revision>.zip`
//! and removed.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::pipeline::PipelineConfig;
use crate::types::{PackageLocation, PipelineError};

/// Packaging switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageOptions {
    /// Compress the package directory into `<revision>.zip`.
    pub zip: bool,
    /// Keep the package directory after zipping.
    pub keep_dir: bool,
    /// Copy the profile's third-party license file into `docs/`.
    pub licenses: bool,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            zip: true,
            keep_dir: false,
            licenses: true,
        }
    }
}

/// Binaries of one build scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeBinaries {
    pub scheme: String,
    /// Files inside the scheme's build output directory.
    pub files: Vec<PathBuf>,
}

/// The files that make up one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    /// Content identifier (revision hash).
    pub id: String,
    /// Directory receiving the package and its archive.
    pub package_dir: PathBuf,
    /// Header tree copied to `include/`.
    pub headers: PathBuf,
    pub binaries: Vec<SchemeBinaries>,
    /// License file copied to `docs/`.
    pub license: Option<PathBuf>,
}

impl PackageManifest {
    /// Works out what a package for revision `id` contains.
    pub fn plan(config: &PipelineConfig, id: &str) -> Self {
        let sdk_dir = config.sdk_dir();
        let binaries = config
            .schemes
            .iter()
            .map(|scheme| {
                let out_dir = config.out_dir(&scheme.name);
                let files = config
                    .profile
                    .targets
                    .sdk
                    .iter()
                    .flat_map(|target| config.platform.binary_files(target))
                    .map(|file| out_dir.join(file))
                    .collect();
                SchemeBinaries {
                    scheme: scheme.name.clone(),
                    files,
                }
            })
            .collect();
        let license = if config.package.licenses {
            config.profile.license.as_ref().map(|path| sdk_dir.join(path))
        } else {
            None
        };

        Self {
            id: id.to_string(),
            package_dir: config.package_dir.clone(),
            headers: sdk_dir.join(&config.profile.headers),
            binaries,
            license,
        }
    }

    /// `<package_dir>/<id>`
    pub fn root(&self) -> PathBuf {
        self.package_dir.join(&self.id)
    }

    /// `<package_dir>/<id>.zip`
    pub fn archive_path(&self) -> PathBuf {
        self.package_dir.join(format!("{}.zip", self.id))
    }

    /// Builds the package directory from scratch.
    ///
    /// A directory left over from an earlier run with the same identifier is
    /// removed first.
    pub fn assemble(&self) -> Result<PathBuf, PipelineError> {
        let root = self.root();
        if root.exists() {
            debug!(path = %root.display(), "removing previous package directory");
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;

        if !self.headers.is_dir() {
            return Err(PipelineError::Package(format!(
                "Header directory not found: {}\n\n\
                 Check the profile's `headers` path.",
                self.headers.display()
            )));
        }
        copy_dir_recursive(&self.headers, &root.join("include"))?;

        for scheme in &self.binaries {
            let bin_dir = root.join("bin").join(&scheme.scheme);
            fs::create_dir_all(&bin_dir)?;
            for file in &scheme.files {
                let file_name = file.file_name().ok_or_else(|| {
                    PipelineError::Package(format!("Invalid binary path {}", file.display()))
                })?;
                fs::copy(file, bin_dir.join(file_name)).map_err(|e| {
                    PipelineError::Package(format!(
                        "Failed to copy build output {}: {}\n\n\
                         Ensure the '{}' scheme was built for this platform.",
                        file.display(),
                        e,
                        scheme.scheme
                    ))
                })?;
            }
        }

        if let Some(license) = &self.license {
            let docs = root.join("docs");
            fs::create_dir_all(&docs)?;
            let file_name = license.file_name().ok_or_else(|| {
                PipelineError::Package(format!("Invalid license path {}", license.display()))
            })?;
            fs::copy(license, docs.join(file_name)).map_err(|e| {
                PipelineError::Package(format!(
                    "Failed to copy license file {}: {}",
                    license.display(),
                    e
                ))
            })?;
        }

        Ok(root)
    }

    /// Assembles the package and, depending on `options`, zips it.
    pub fn package(&self, options: &PackageOptions) -> Result<PackageLocation, PipelineError> {
        let root = self.assemble()?;
        info!(path = %root.display(), "assembled package directory");

        if !options.zip {
            return Ok(PackageLocation::Directory(root));
        }

        let archive = self.archive_path();
        zip_dir(&root, &archive)?;
        info!(path = %archive.display(), "wrote package archive");

        if !options.keep_dir {
            fs::remove_dir_all(&root)?;
        }
        Ok(PackageLocation::Archive(archive))
    }
}

/// Copies a directory tree, creating `dest` as needed.
///
/// Symlinks are followed, so a linked directory is copied as a directory.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(dest)?;
    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).map_err(|_| {
            PipelineError::Package(format!(
                "{} is outside of {}",
                entry.path().display(),
                src.display()
            ))
        })?;
        let dest_path = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}

/// Compresses every file below `src` into a deflate zip at `archive`.
///
/// Entry names are paths relative to `src` with `/` separators. An existing
/// archive is replaced.
pub fn zip_dir(src: &Path, archive: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(File::create(archive)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(src).map_err(|_| {
            PipelineError::Package(format!(
                "{} is outside of {}",
                entry.path().display(),
                src.display()
            ))
        })?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        writer.start_file(name, options)?;
        let mut file = File::open(entry.path())?;
        io::copy(&mut file, &mut writer)?;
    }

    writer.finish()?;
    Ok(())
}
