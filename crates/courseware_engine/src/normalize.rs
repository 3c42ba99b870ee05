//! Moves downloads into unit folders, unpacks archives and removes transient
//! files.
//!
//! Every archive handed to [`Normalizer::extract_archive`] is consumed once:
//! it is either extracted and deleted, or left exactly where it is (oversized
//! or unreadable archives).

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use courseware_core::{ArchiveDecision, ArchivePolicy};
use engine_logging::{engine_debug, engine_info, engine_warn};

/// Default sentinel of auto-generated listing pages.
pub const DEFAULT_MARKER: &str = "Table of Contents";

/// Extensions the browser leaves in the download folder for a unit.
pub const DOWNLOAD_EXTENSIONS: &[&str] = &["zip", "html"];

const ARCHIVE_EXTENSION: &str = "zip";

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("archive {0} does not exist")]
    Missing(PathBuf),
    #[error("archive {archive} could not be read: {reason}")]
    Malformed { archive: PathBuf, reason: String },
    #[error("extraction of {archive} failed: {reason}")]
    Extraction { archive: PathBuf, reason: String },
    #[error("io error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl NormalizeError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    pub archive: PathBuf,
    pub decision: ArchiveDecision,
    /// Files written, in archive order.
    pub extracted: Vec<PathBuf>,
    pub archive_removed: bool,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    policy: ArchivePolicy,
    marker: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(ArchivePolicy::default(), DEFAULT_MARKER)
    }
}

impl Normalizer {
    pub fn new(policy: ArchivePolicy, marker: impl Into<String>) -> Self {
        Self {
            policy,
            marker: marker.into(),
        }
    }

    pub fn policy(&self) -> &ArchivePolicy {
        &self.policy
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Moves files directly under `source` with one of `extensions` into
    /// `dest`, overwriting existing files.
    ///
    /// With a name filter only files whose name contains one of the
    /// substrings move (compared case-insensitively, and again on letters and
    /// digits only so that characters the browser replaced in a file name do
    /// not matter). A filter that matches nothing moves nothing.
    pub fn move_matching(
        &self,
        source: &Path,
        dest: &Path,
        extensions: &[&str],
        name_filter: Option<&[String]>,
    ) -> Result<Vec<PathBuf>, NormalizeError> {
        let candidates = files_with_extensions(source, extensions)?;
        let selected: Vec<PathBuf> = match name_filter {
            None => candidates,
            Some(filter) => candidates
                .into_iter()
                .filter(|path| name_matches(path, filter))
                .collect(),
        };

        if selected.is_empty() {
            if name_filter.is_some() {
                engine_warn!(
                    "No file in {:?} matched {:?}; leaving the download folder as is",
                    source,
                    name_filter.unwrap_or_default()
                );
            }
            return Ok(Vec::new());
        }

        fs::create_dir_all(dest).map_err(|e| NormalizeError::io(dest, e))?;
        let mut moved = Vec::with_capacity(selected.len());
        for path in selected {
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let target = dest.join(file_name);
            move_file(&path, &target)?;
            engine_debug!("Moved {:?} to {:?}", path, target);
            moved.push(target);
        }
        Ok(moved)
    }

    /// Lists, classifies and extracts one archive into `dest`, flat or in a
    /// subfolder named after the archive.
    pub fn extract_archive(
        &self,
        path: &Path,
        dest: &Path,
    ) -> Result<ExtractionReport, NormalizeError> {
        if !path.is_file() {
            return Err(NormalizeError::Missing(path.to_path_buf()));
        }

        let malformed = |reason: String| NormalizeError::Malformed {
            archive: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| malformed(e.to_string()))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| malformed(e.to_string()))?;
        let members = member_names(&mut archive).map_err(|e| malformed(e.to_string()))?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let decision = self.policy.classify(&stem, &members);

        let target = match &decision {
            ArchiveDecision::Skip => {
                engine_info!(
                    "Leaving {:?} unextracted ({} members exceeds cap of {})",
                    path,
                    members.len(),
                    self.policy.max_members
                );
                return Ok(ExtractionReport {
                    archive: path.to_path_buf(),
                    decision,
                    extracted: Vec::new(),
                    archive_removed: false,
                });
            }
            ArchiveDecision::ExtractFlat => dest.to_path_buf(),
            ArchiveDecision::ExtractNested(name) => dest.join(name),
        };

        engine_debug!("Extracting {:?} into {:?}", path, target);
        let outcome = extract_members(&mut archive, path, &target);
        drop(archive);

        // The archive goes even when extraction broke part way; a rerun
        // downloads it again.
        fs::remove_file(path).map_err(|e| NormalizeError::io(path, e))?;

        let extracted = outcome.map_err(|reason| NormalizeError::Extraction {
            archive: path.to_path_buf(),
            reason,
        })?;
        engine_info!(
            "Extracted {} file(s) from {:?}",
            extracted.len(),
            path.file_name().unwrap_or_default()
        );
        Ok(ExtractionReport {
            archive: path.to_path_buf(),
            decision,
            extracted,
            archive_removed: true,
        })
    }

    /// Extracts every archive directly under `folder`, in name order.
    pub fn extract_all(
        &self,
        folder: &Path,
    ) -> Result<Vec<Result<ExtractionReport, NormalizeError>>, NormalizeError> {
        let archives = files_with_extensions(folder, &[ARCHIVE_EXTENSION])?;
        Ok(archives
            .iter()
            .map(|archive| self.extract_archive(archive, folder))
            .collect())
    }

    /// Deletes generated listing pages (names containing the marker) with one
    /// of `extensions` directly under `folder`.
    pub fn prune_marker_files(
        &self,
        folder: &Path,
        extensions: &[&str],
    ) -> Result<Vec<PathBuf>, NormalizeError> {
        let mut removed = Vec::new();
        for path in files_with_extensions(folder, extensions)? {
            let is_marker = path
                .file_name()
                .map(|name| name.to_string_lossy().contains(self.marker.as_str()))
                .unwrap_or(false);
            if is_marker {
                remove_if_present(&path)?;
                engine_debug!("Pruned marker page {:?}", path);
                removed.push(path);
            }
        }
        Ok(removed)
    }

    /// Deletes every file with one of `extensions` directly under `folder`.
    /// A missing folder counts as clean.
    pub fn cleanup(&self, folder: &Path, extensions: &[&str]) -> Result<usize, NormalizeError> {
        let mut removed = 0;
        for path in files_with_extensions(folder, extensions)? {
            if remove_if_present(&path)? {
                removed += 1;
            }
        }
        if removed > 0 {
            engine_info!("Cleaned up {} leftover file(s) in {:?}", removed, folder);
        }
        Ok(removed)
    }
}

/// Regular files directly under `folder` whose extension is listed, sorted by
/// name. A missing folder yields nothing.
fn files_with_extensions(folder: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, NormalizeError> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(NormalizeError::io(folder, err)),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| has_extension(path, extensions))
        .collect();
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .map(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(&ext)))
        .unwrap_or(false)
}

/// A filter entry matches when its letters and digits appear in the file
/// name in order, ignoring case and separators, and are not directly
/// followed by another letter or digit. "Week 1" matches "Week 1 (2).zip"
/// but not "Week 10.zip".
fn name_matches(path: &Path, filter: &[String]) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return false;
    };
    let name_key = alphanumeric_key(&name);
    filter.iter().any(|wanted| {
        let wanted_key: Vec<char> = alphanumeric_key(wanted)
            .into_iter()
            .map(|(c, _)| c)
            .collect();
        !wanted_key.is_empty()
            && name_key.windows(wanted_key.len()).enumerate().any(|(start, window)| {
                window.iter().map(|(c, _)| *c).eq(wanted_key.iter().copied())
                    && ends_at_boundary(&name_key, start + wanted_key.len())
            })
    })
}

/// Lowercased letters and digits of `text`, each with the index of the
/// character it came from.
fn alphanumeric_key(text: &str) -> Vec<(char, usize)> {
    text.chars()
        .enumerate()
        .filter(|(_, c)| c.is_alphanumeric())
        .flat_map(|(index, c)| c.to_lowercase().map(move |lower| (lower, index)))
        .collect()
}

/// True when the key character at `end` is absent or was separated from the
/// one before it in the original text.
fn ends_at_boundary(key: &[(char, usize)], end: usize) -> bool {
    match (key.get(end), end.checked_sub(1).and_then(|last| key.get(last))) {
        (None, _) => true,
        (Some((_, next)), Some((_, last))) => *next > *last + 1,
        (Some(_), None) => false,
    }
}

fn move_file(from: &Path, to: &Path) -> Result<(), NormalizeError> {
    if to.is_file() {
        fs::remove_file(to).map_err(|e| NormalizeError::io(to, e))?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Rename fails across filesystems; fall back to copy + delete.
        Err(_) => {
            fs::copy(from, to).map_err(|e| NormalizeError::io(to, e))?;
            fs::remove_file(from).map_err(|e| NormalizeError::io(from, e))
        }
    }
}

fn remove_if_present(path: &Path) -> Result<bool, NormalizeError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(NormalizeError::io(path, err)),
    }
}

fn member_names(archive: &mut zip::ZipArchive<File>) -> zip::result::ZipResult<Vec<String>> {
    (0..archive.len())
        .map(|index| archive.by_index(index).map(|entry| entry.name().to_string()))
        .collect()
}

fn extract_members(
    archive: &mut zip::ZipArchive<File>,
    archive_path: &Path,
    target: &Path,
) -> Result<Vec<PathBuf>, String> {
    fs::create_dir_all(target).map_err(|e| format!("failed to create {}: {e}", target.display()))?;

    let mut extracted = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| format!("failed to read entry {index}: {e}"))?;
        let Some(relative) = entry.enclosed_name() else {
            engine_warn!("Skipping archive entry with unsafe path {:?}", entry.name());
            continue;
        };
        let out_path = target.join(relative);
        // Writing over the archive would corrupt the members still unread.
        if is_same_file(&out_path, archive_path) {
            engine_warn!("Skipping archive entry {:?} that would replace the archive", entry.name());
            continue;
        }

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| format!("failed to create {}: {e}", out_path.display()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
        }
        let mut outfile = File::create(&out_path)
            .map_err(|e| format!("failed to create {}: {e}", out_path.display()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|e| format!("failed to write {}: {e}", out_path.display()))?;
        extracted.push(out_path);
    }
    Ok(extracted)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
