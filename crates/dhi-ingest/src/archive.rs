//! Archive extraction and target-file selection.
//!
//! Labs ship monthly results as zip archives holding several report tables.
//! Only one of them is the per-animal result table: the first file in walk
//! order carrying one of the target names, with a fallback to the first
//! spreadsheet-like file.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use dhi_model::{ArchiveConfig, DhiError, Result};

use crate::reader::{decode_bytes, is_readable};

/// An archive extracted into a temporary directory.
///
/// The directory is removed when this value is dropped.
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
    pub target: PathBuf,
}

impl ExtractedArchive {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// True when `path` names a zip archive.
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Extracts `archive` and selects its target table.
pub fn open_archive(archive: &Path, config: &ArchiveConfig) -> Result<ExtractedArchive> {
    let dir = tempfile::tempdir().map_err(|e| DhiError::io(archive, e))?;
    extract_zip(archive, dir.path())?;
    let target = select_target(dir.path(), config).map_err(|err| match err {
        DhiError::NoTargetFile { targets, found, .. } => DhiError::NoTargetFile {
            path: archive.to_path_buf(),
            targets,
            found,
        },
        other => other,
    })?;
    info!(archive = %archive.display(), target = %target.display(), "selected archive target");
    Ok(ExtractedArchive { dir, target })
}

/// Extracts every entry of a zip file under `dest`.
///
/// Entry names that are not UTF-8 are decoded as GBK. Entries that would
/// escape `dest` are skipped.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let corrupt = |message: String| DhiError::CorruptArchive {
        path: archive.to_path_buf(),
        message,
    };
    let file = File::open(archive).map_err(|e| DhiError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| corrupt(e.to_string()))?;
        let name = decode_bytes(entry.name_raw()).into_owned();
        let Some(relative) = safe_relative_path(&name) else {
            warn!(entry = %name, "skipping archive entry with unsafe path");
            continue;
        };
        let out_path = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| DhiError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| DhiError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| DhiError::io(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| corrupt(format!("{name}: {e}")))?;
        debug!(entry = %name, "extracted");
    }
    Ok(())
}

fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!path.as_os_str().is_empty()).then_some(path)
}

/// Files under `root`, each directory's files (sorted by name) before its
/// subdirectories.
fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(root)
        .map_err(|e| DhiError::io(root, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    let (dirs, files): (Vec<PathBuf>, Vec<PathBuf>) = entries.into_iter().partition(|p| p.is_dir());
    let mut out = files;
    for dir in dirs {
        out.extend(walk_files(&dir)?);
    }
    Ok(out)
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

/// Picks the target table under `root`.
///
/// The first file in walk order whose name is one of the target names
/// wins. Otherwise the first file with a configured extension whose name
/// does not start with `~` is used. Excluded names and files the reader
/// cannot parse are never picked.
pub fn select_target(root: &Path, config: &ArchiveConfig) -> Result<PathBuf> {
    let files = walk_files(root)?;
    let usable = |path: &Path| {
        is_readable(path) && !config.excluded_files.iter().any(|name| name == file_name(path))
    };

    if let Some(hit) = files
        .iter()
        .find(|path| usable(path.as_path()) && config.target_files.iter().any(|t| t == file_name(path)))
    {
        return Ok(hit.clone());
    }

    let fallback = files.iter().find(|path| {
        let extension_ok = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| config.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
        extension_ok && !file_name(path).starts_with('~') && usable(path.as_path())
    });
    if let Some(hit) = fallback {
        warn!(file = %file_name(hit), "no preferred target in archive; using first spreadsheet");
        return Ok(hit.clone());
    }

    Err(DhiError::NoTargetFile {
        path: root.to_path_buf(),
        targets: config.target_files.clone(),
        found: files.iter().map(|p| file_name(p).to_string()).collect(),
    })
}
