//! Functional run discovery for unconverted DICOM sessions
//!
//! Study numbers follow acquisition order, so pairing is inferred from
//! adjacency: a multi-echo BOLD magnitude study `N` is run `study{N}`, study
//! `N + 1` is its phase when it carries phase tags, and its field map is the
//! most recent AP/PA pair acquired before it (or the first pair after it
//! when none precedes).

use crate::locator::ScanRecord;
use crate::matcher::{classify_series, ScanClass};
use crate::runs::{RunFile, RunSource};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A completed AP/PA field-map pair
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldMapPair {
    /// Study number of the later of the two scans
    position: u32,
    ap: PathBuf,
    pa: PathBuf,
}

/// Runs and field-map signatures of one DICOM session
///
/// Returned runs are in study-number order; signatures are `[AP, PA]` study
/// directories keyed by run key. Runs with no field-map pair anywhere in the
/// session get no signature.
pub fn group_dicom_session(records: &[ScanRecord]) -> (Vec<RunSource>, HashMap<String, Vec<PathBuf>>) {
    let mut ordered: Vec<&ScanRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.study_number);

    let classes: Vec<ScanClass> = ordered
        .iter()
        .map(|r| classify_series(r.description(), &r.image_type))
        .collect();

    let pairs = fieldmap_pairs(&ordered, &classes);

    let mut runs = Vec::new();
    let mut signatures = HashMap::new();

    for (index, record) in ordered.iter().enumerate() {
        let ScanClass::BoldMag(task) = classes[index] else {
            continue;
        };

        let key = format!("study{}", record.study_number);
        let mut files = vec![RunFile::mag(&record.directory)];

        match ordered.get(index + 1) {
            Some(next)
                if next.study_number == record.study_number + 1
                    && matches!(classes[index + 1], ScanClass::BoldPhase(_)) =>
            {
                files.push(RunFile::phase(&next.directory));
            }
            _ => warn!(run = %key, "No phase study follows magnitude study"),
        }

        if let Some(pair) = nearest_pair(&pairs, record.study_number) {
            signatures.insert(key.clone(), vec![pair.ap.clone(), pair.pa.clone()]);
        }

        debug!(run = %key, task, frames = record.frame_count, "Found BOLD run");
        runs.push(RunSource {
            key,
            task: task.to_string(),
            files,
            frame_count: record.frame_count,
        });
    }

    (runs, signatures)
}

fn fieldmap_pairs(ordered: &[&ScanRecord], classes: &[ScanClass]) -> Vec<FieldMapPair> {
    let mut pairs = Vec::new();
    let mut ap: Option<&ScanRecord> = None;
    let mut pa: Option<&ScanRecord> = None;

    for (record, class) in ordered.iter().zip(classes) {
        match class {
            ScanClass::FieldMapAp => ap = Some(*record),
            ScanClass::FieldMapPa => pa = Some(*record),
            _ => continue,
        }

        if let (Some(a), Some(p)) = (ap, pa) {
            pairs.push(FieldMapPair {
                position: record.study_number,
                ap: a.directory.clone(),
                pa: p.directory.clone(),
            });
            ap = None;
            pa = None;
        }
    }
    pairs
}

fn nearest_pair(pairs: &[FieldMapPair], study_number: u32) -> Option<&FieldMapPair> {
    pairs
        .iter()
        .rev()
        .find(|p| p.position < study_number)
        .or_else(|| pairs.iter().find(|p| p.position > study_number))
}
