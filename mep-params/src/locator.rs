//! Session manifest discovery and study directory resolution
//!
//! A session folder holds numbered study directories (`study3`, `study4`,
//! ...) next to a `<session>.studies.txt` manifest. Each manifest line is
//! `study_number <ignored> modality_name <ignored>`.

use crate::header::{sorted_files, HeaderReader};
use crate::matcher::{select_best, Candidate, ModalityMatcher};
use mep_common::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File name suffix identifying a session manifest
pub const MANIFEST_SUFFIX: &str = ".studies.txt";

/// Find session manifests under `root`
///
/// Depth-first, children visited in name order. A directory that directly
/// contains a manifest yields that one manifest (first by name) and is not
/// descended into. `max_depth` bounds how many directory levels below
/// `root` are searched; 0 looks at `root` only.
pub fn find_manifest_files(root: &Path, max_depth: usize) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::NotFound(format!("search root {}", root.display())));
    }

    let mut found = Vec::new();
    search_manifests(root, max_depth, &mut found);
    debug!(root = %root.display(), count = found.len(), "Manifest search complete");
    Ok(found)
}

fn search_manifests(dir: &Path, depth_left: usize, found: &mut Vec<PathBuf>) {
    let mut subdirs = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file() && is_manifest(entry.path()) {
            found.push(entry.into_path());
            return;
        }
        if entry.file_type().is_dir() {
            subdirs.push(entry.into_path());
        }
    }

    if depth_left == 0 {
        return;
    }
    for subdir in subdirs {
        search_manifests(&subdir, depth_left - 1, found);
    }
}

fn is_manifest(path: &Path) -> bool {
    path.file_name()
        .map_or(false, |n| n.to_string_lossy().ends_with(MANIFEST_SUFFIX))
}

/// One usable manifest line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub study_number: u32,
    pub modality: String,
}

/// Parsed `<session>.studies.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionManifest {
    /// Session label (manifest file name without the suffix)
    pub session: String,
    /// Directory holding the manifest and its study directories
    pub session_dir: PathBuf,
    pub entries: Vec<ManifestEntry>,
}

impl SessionManifest {
    /// Read and parse a manifest
    ///
    /// A missing manifest gives an empty entry list rather than an error.
    pub fn parse(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Manifest not found, session has no studies");
                String::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self::from_text(path, &text))
    }

    /// Parse manifest text; `path` only supplies the session label and folder
    pub fn from_text(path: &Path, text: &str) -> Self {
        let session = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .map(|n| n.strip_suffix(MANIFEST_SUFFIX).unwrap_or(&n).to_string())
            .unwrap_or_default();
        let session_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut entries = Vec::new();
        for (number, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line) {
                Some(entry) => entries.push(entry),
                None => warn!(
                    session = %session,
                    line = number + 1,
                    "Error parsing studies text file line: {:?}",
                    line
                ),
            }
        }

        Self {
            session,
            session_dir,
            entries,
        }
    }

    /// `session_dir/study{N}`
    pub fn study_dir(&self, study_number: u32) -> PathBuf {
        self.session_dir.join(format!("study{}", study_number))
    }

    /// Study directory for `entry`, which must exist on disk
    fn existing_study_dir(&self, entry: &ManifestEntry) -> Result<PathBuf> {
        let dir = self.study_dir(entry.study_number);
        if !dir.is_dir() {
            return Err(Error::StudyNotFound(dir));
        }
        Ok(dir)
    }
}

fn parse_line(line: &str) -> Option<ManifestEntry> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [number, _, modality, _] => Some(ManifestEntry {
            study_number: number.parse().ok()?,
            modality: modality.to_string(),
        }),
        _ => None,
    }
}

/// How resolved study paths are expressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStyle {
    Absolute,
    /// Relative to this root; paths outside it stay as they are
    RelativeTo(PathBuf),
}

impl PathStyle {
    pub fn apply(&self, path: &Path) -> PathBuf {
        match self {
            PathStyle::Absolute => {
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    std::env::current_dir()
                        .map(|cwd| cwd.join(path))
                        .unwrap_or_else(|_| path.to_path_buf())
                }
            }
            PathStyle::RelativeTo(root) => path
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.to_path_buf()),
        }
    }
}

/// One acquisition series as found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub study_number: u32,
    pub directory: PathBuf,
    /// Modality name from the manifest line
    pub modality: String,
    pub image_type: Vec<String>,
    pub series_description: String,
    pub protocol_name: String,
    pub frame_count: usize,
}

impl ScanRecord {
    /// Best free-text description: series description, protocol name,
    /// then the manifest's modality name
    pub fn description(&self) -> &str {
        [&self.series_description, &self.protocol_name, &self.modality]
            .into_iter()
            .find(|s| !s.is_empty())
            .map_or("", String::as_str)
    }
}

/// Select the best study directories of one modality in a session
///
/// Lines whose modality name matches `matcher` become candidates tagged with
/// their representative file's ImageType; `select_best` over `patterns` picks
/// the winners.
pub fn resolve_session(
    manifest: &SessionManifest,
    matcher: &ModalityMatcher,
    patterns: &[&[&str]],
    reader: &dyn HeaderReader,
    style: &PathStyle,
) -> Result<Vec<PathBuf>> {
    let mut candidates = Vec::new();

    for entry in manifest.entries.iter().filter(|e| matcher.is_match(&e.modality)) {
        let dir = manifest.existing_study_dir(entry)?;
        let file = reader.representative_file(&dir)?;
        let header = reader.read_header(&file)?;
        debug!(
            study = entry.study_number,
            modality = %entry.modality,
            tags = ?header.image_type,
            "Candidate study"
        );
        candidates.push(Candidate::new(style.apply(&dir), header.image_type));
    }

    let selected = select_best(patterns, &candidates);
    info!(
        session = %manifest.session,
        candidates = candidates.len(),
        selected = selected.len(),
        "Resolved session studies"
    );
    Ok(selected)
}

/// Every study of a session, in manifest order
pub fn scan_session(manifest: &SessionManifest, reader: &dyn HeaderReader) -> Result<Vec<ScanRecord>> {
    manifest
        .entries
        .iter()
        .map(|entry| {
            let dir = manifest.existing_study_dir(entry)?;
            let file = reader.representative_file(&dir)?;
            let header = reader.read_header(&file)?;
            let frame_count = match header.frame_count {
                Some(count) => count,
                None => sorted_files(&dir)?.len(),
            };

            Ok(ScanRecord {
                study_number: entry.study_number,
                directory: dir,
                modality: entry.modality.clone(),
                image_type: header.image_type,
                series_description: header.series_description,
                protocol_name: header.protocol_name,
                frame_count,
            })
        })
        .collect()
}
