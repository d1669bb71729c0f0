//! Anatomical path resolution
//!
//! Picks the best T1w and T2w acquisitions of every session of a subject.
//! Candidates are ranked by their ImageType tags with
//! [`STRUCTURAL_PRIORITY`]: NORM+MEAN first, then MEAN, then NORM, then
//! anything.

use crate::bids::BidsLayout;
use crate::header::HeaderReader;
use crate::locator::{find_manifest_files, resolve_session, PathStyle, SessionManifest};
use crate::matcher::{ModalityMatcher, STRUCTURAL_PRIORITY};
use mep_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Selected structural acquisitions of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnatomicalSelection {
    pub session: String,
    pub t1w: Vec<PathBuf>,
    pub t2w: Vec<PathBuf>,
}

/// Resolve structural studies for every DICOM session under `subject_dir`
///
/// Sessions without T2w are kept (logged). It is an error when no session
/// has a T1w, since structural params cannot be written without one.
pub fn resolve_anatomicals(
    subject_dir: &Path,
    max_depth: usize,
    reader: &dyn HeaderReader,
    style: &PathStyle,
) -> Result<Vec<AnatomicalSelection>> {
    let t1w = ModalityMatcher::t1w()?;
    let t2w = ModalityMatcher::t2w()?;

    let mut selections = Vec::new();
    for manifest_path in find_manifest_files(subject_dir, max_depth)? {
        let manifest = SessionManifest::parse(&manifest_path)?;
        let selection = AnatomicalSelection {
            t1w: resolve_session(&manifest, t1w, STRUCTURAL_PRIORITY, reader, style)?,
            t2w: resolve_session(&manifest, t2w, STRUCTURAL_PRIORITY, reader, style)?,
            session: manifest.session,
        };
        log_selection(&selection);
        selections.push(selection);
    }

    require_t1w(subject_dir, selections)
}

/// Resolve structural images for every session of `subject` in a BIDS dataset
///
/// Single-session datasets yield one selection named after the subject.
pub fn resolve_bids_anatomicals(layout: &BidsLayout, subject: &str) -> Result<Vec<AnatomicalSelection>> {
    let sessions = layout.sessions(subject);
    let sessions: Vec<Option<&str>> = if sessions.is_empty() {
        vec![None]
    } else {
        sessions.iter().map(|s| Some(s.as_str())).collect()
    };

    let mut selections = Vec::new();
    for session in sessions {
        let selection = AnatomicalSelection {
            session: session.unwrap_or(subject).to_string(),
            t1w: layout.select_anatomicals(subject, session, "T1w")?,
            t2w: layout.select_anatomicals(subject, session, "T2w")?,
        };
        log_selection(&selection);
        selections.push(selection);
    }

    require_t1w(&layout.root().join(format!("sub-{}", subject)), selections)
}

/// All selected T1w and T2w paths, session order preserved
pub fn flatten_selections(selections: &[AnatomicalSelection]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let t1w = selections.iter().flat_map(|s| s.t1w.iter().cloned()).collect();
    let t2w = selections.iter().flat_map(|s| s.t2w.iter().cloned()).collect();
    (t1w, t2w)
}

fn log_selection(selection: &AnatomicalSelection) {
    if selection.t2w.is_empty() {
        info!(session = %selection.session, "No T2w found in session");
    }
    info!(
        session = %selection.session,
        t1w = selection.t1w.len(),
        t2w = selection.t2w.len(),
        "Selected anatomicals"
    );
}

fn require_t1w(subject: &Path, selections: Vec<AnatomicalSelection>) -> Result<Vec<AnatomicalSelection>> {
    if selections.iter().all(|s| s.t1w.is_empty()) {
        return Err(Error::NotFound(format!("T1w acquisition for {}", subject.display())));
    }
    Ok(selections)
}
