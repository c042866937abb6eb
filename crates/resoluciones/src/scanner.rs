//! Intake discovery: copies candidate PDFs from the network share into the
//! local staging directory and records what was copied in a manifest.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::storage::filesystem::copy_preserving_mtime;

pub const MANIFEST_FILENAME: &str = "last_run_manifest.json";

/// Prefix of the staging subdirectories holding same-named share files.
pub const DUPLICATE_DIR_PREFIX: &str = "duplicado_";

/// Files this run is responsible for, in copy order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<PathBuf>,
}

impl Manifest {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug)]
pub struct CopyFailure {
    pub source_path: PathBuf,
    pub error: std::io::Error,
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
    pub failures: Vec<CopyFailure>,
}

/// Candidate documents are matched on a case-sensitive `.pdf` extension.
pub fn is_candidate(path: &Path) -> bool {
    path.extension() == Some(OsStr::new("pdf"))
}

pub fn manifest_path(processed_dir: &Path) -> PathBuf {
    processed_dir.join(MANIFEST_FILENAME)
}

pub struct DirectoryScanner {
    source_directory: PathBuf,
    staging_directory: PathBuf,
}

impl DirectoryScanner {
    pub fn new<P: AsRef<Path>>(source_directory: P, staging_directory: P) -> Self {
        Self {
            source_directory: source_directory.as_ref().to_path_buf(),
            staging_directory: staging_directory.as_ref().to_path_buf(),
        }
    }

    pub fn source_directory(&self) -> &Path {
        &self.source_directory
    }

    /// Copies every candidate under the source tree into staging and writes
    /// the manifest to `manifest_path`, overwriting the previous run's.
    ///
    /// A missing source tree yields an empty manifest. Individual copy
    /// failures are recorded and skipped.
    pub fn scan(&self, manifest_path: &Path) -> Result<ScanOutcome, ScanError> {
        create_dir(&self.staging_directory)?;
        if let Some(parent) = manifest_path.parent() {
            create_dir(parent)?;
        }

        prune_duplicate_dirs(&self.staging_directory);

        let mut manifest = Manifest::default();
        let mut failures = Vec::new();
        let mut claimed: HashSet<PathBuf> = HashSet::new();

        if self.source_directory.exists() {
            info!("Scanning {} for documents", self.source_directory.display());
            for entry in WalkDir::new(&self.source_directory)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| match e {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        warn!("Skipping unreadable entry: {}", err);
                        None
                    }
                })
                .filter(|e| e.file_type().is_file() && is_candidate(e.path()))
            {
                let source = entry.path();
                let staged = staging_path(&self.staging_directory, entry.file_name(), &claimed);
                debug!("Copying {} -> {}", source.display(), staged.display());

                let copied = match staged.parent() {
                    Some(parent) if parent != self.staging_directory => {
                        std::fs::create_dir_all(parent)
                            .and_then(|_| copy_preserving_mtime(source, &staged))
                    }
                    _ => copy_preserving_mtime(source, &staged),
                };
                match copied {
                    Ok(_) => {
                        manifest.entries.push(absolutize(&staged));
                        claimed.insert(staged);
                    }
                    Err(error) => {
                        warn!("Could not copy {}: {}", source.display(), error);
                        failures.push(CopyFailure {
                            source_path: source.to_path_buf(),
                            error,
                        });
                    }
                }
            }
        } else {
            warn!(
                "Source directory does not exist: {}",
                self.source_directory.display()
            );
        }

        write_manifest(manifest_path, &manifest)?;
        info!(
            "Staged {} documents, manifest at {}",
            manifest.len(),
            manifest_path.display()
        );

        Ok(ScanOutcome {
            manifest,
            manifest_path: manifest_path.to_path_buf(),
            failures,
        })
    }
}

pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<(), ScanError> {
    let paths: Vec<String> = manifest
        .entries
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let json = serde_json::to_string_pretty(&paths).map_err(|e| ScanError::WriteManifest {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    std::fs::write(path, json).map_err(|e| ScanError::WriteManifest {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Reads a manifest back. A manifest that was never written is empty.
pub fn load_manifest(path: &Path) -> Result<Manifest, ScanError> {
    if !path.exists() {
        info!("No manifest at {}", path.display());
        return Ok(Manifest::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ScanError::ReadManifest {
        path: path.to_path_buf(),
        source: e,
    })?;
    let paths: Vec<String> =
        serde_json::from_str(&content).map_err(|e| ScanError::ParseManifest {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(Manifest {
        entries: paths.into_iter().map(PathBuf::from).collect(),
    })
}

/// Where a share file named `name` is staged. The first file of a name gets
/// the flat `staging/<name>`; later ones in the same scan go to
/// `staging/duplicado_<n>/<name>` so every copy keeps its original filename.
fn staging_path(staging: &Path, name: &OsStr, claimed: &HashSet<PathBuf>) -> PathBuf {
    let flat = staging.join(name);
    if !claimed.contains(&flat) {
        return flat;
    }

    (1u64..)
        .map(|n| {
            staging
                .join(format!("{}{}", DUPLICATE_DIR_PREFIX, n))
                .join(name)
        })
        .find(|candidate| !claimed.contains(candidate))
        .unwrap_or(flat)
}

/// Removes empty duplicate subdirectories left by earlier runs. Nothing else
/// in the staging directory is touched.
fn prune_duplicate_dirs(staging: &Path) {
    let Ok(entries) = std::fs::read_dir(staging) else {
        return;
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let ours = entry
            .file_name()
            .to_string_lossy()
            .starts_with(DUPLICATE_DIR_PREFIX);
        if !ours || !path.is_dir() {
            continue;
        }
        let is_empty = std::fs::read_dir(&path)
            .map(|mut it| it.next().is_none())
            .unwrap_or(false);
        if is_empty {
            match std::fs::remove_dir(&path) {
                Ok(()) => debug!("Removed empty {}", path.display()),
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}

fn create_dir(path: &Path) -> Result<(), ScanError> {
    std::fs::create_dir_all(path).map_err(|e| ScanError::CreateDirectory {
        path: path.to_path_buf(),
        source: e,
    })
}

pub(crate) fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
