//! Functional run grouping
//!
//! Runs pass through collect → filter → identify → group:
//! - runs with too few frames are dropped entirely
//! - survivors get dense 1-based IDs in input order
//! - IDs are grouped by shared field-map signature, or one group per run in
//!   MEDIC mode where every run carries its own field map
//!
//! A [`RunMap`] can be re-derived from a user override of the magnitude and
//! phase file lists with [`RunMap::update`].

use mep_common::params::Params;
use mep_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Task label of resting-state runs; these feed functional connectivity
pub const REST_TASK: &str = "rest";

/// Multi-echo image part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Part {
    Mag,
    Phase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFile {
    pub path: PathBuf,
    pub part: Part,
}

impl RunFile {
    pub fn mag(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            part: Part::Mag,
        }
    }

    pub fn phase(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            part: Part::Phase,
        }
    }
}

/// A functional run as discovered, before filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSource {
    /// Natural key: `{task}{run}` for BIDS, `study{N}` for DICOM
    pub key: String,
    pub task: String,
    pub files: Vec<RunFile>,
    /// Longest time series among the run's magnitude files
    pub frame_count: usize,
}

impl RunSource {
    pub fn files_of(&self, part: Part) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|f| f.part == part)
            .map(|f| f.path.clone())
            .collect()
    }
}

/// Drop runs that have no files or no more than `min_frames` frames
pub fn filter_runs(sources: Vec<RunSource>, min_frames: usize) -> Vec<RunSource> {
    sources
        .into_iter()
        .filter(|run| {
            let keep = run.frame_count > min_frames && !run.files.is_empty();
            if !keep {
                info!(
                    run = %run.key,
                    frames = run.frame_count,
                    min_frames,
                    "Dropping run"
                );
            }
            keep
        })
        .collect()
}

/// Grouping options, normally taken from the instructions params
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMapOptions {
    pub min_frames: usize,
    pub medic: bool,
}

impl Default for RunMapOptions {
    fn default() -> Self {
        Self {
            min_frames: 50,
            medic: true,
        }
    }
}

impl RunMapOptions {
    /// `min_frames` and `medic` from instructions; missing values keep defaults
    pub fn from_instructions(instructions: &Params) -> Self {
        let defaults = Self::default();
        Self {
            min_frames: instructions
                .get_int("min_frames")
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(defaults.min_frames),
            medic: instructions.get_bool("medic").unwrap_or(defaults.medic),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Run {
    id: u32,
    key: String,
    task: String,
    frame_count: usize,
    mag: Vec<PathBuf>,
    phase: Vec<PathBuf>,
    fieldmap: Vec<PathBuf>,
}

/// Audit record written next to the functional params
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunsManifest {
    pub mag: BTreeMap<u32, Vec<PathBuf>>,
    pub phase: BTreeMap<u32, Vec<PathBuf>>,
}

impl RunsManifest {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        debug!(path = %path.display(), "Wrote runs manifest");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Surviving runs, their IDs and their field-map groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMap {
    runs: Vec<Run>,
    groups: Vec<Vec<u32>>,
    signatures: Vec<Vec<PathBuf>>,
    medic: bool,
}

impl RunMap {
    /// Filter, identify and group `sources`
    ///
    /// `fieldmaps` maps run keys to field-map signatures and is ignored in
    /// MEDIC mode. Outside MEDIC mode every surviving run needs a non-empty
    /// signature.
    pub fn build(
        sources: Vec<RunSource>,
        fieldmaps: &HashMap<String, Vec<PathBuf>>,
        options: &RunMapOptions,
    ) -> Result<Self> {
        let survivors = filter_runs(sources, options.min_frames);

        let mut runs = Vec::with_capacity(survivors.len());
        for (index, source) in survivors.into_iter().enumerate() {
            let mag = source.files_of(Part::Mag);
            let phase = source.files_of(Part::Phase);

            let fieldmap = if options.medic {
                mag.clone()
            } else {
                match fieldmaps.get(&source.key) {
                    Some(signature) if !signature.is_empty() => signature.clone(),
                    _ => return Err(Error::MissingFieldMap(source.key)),
                }
            };

            runs.push(Run {
                id: dense_id(index),
                key: source.key,
                task: source.task,
                frame_count: source.frame_count,
                mag,
                phase,
                fieldmap,
            });
        }

        let mut map = Self {
            runs,
            groups: Vec::new(),
            signatures: Vec::new(),
            medic: options.medic,
        };
        map.regroup();

        info!(
            runs = map.runs.len(),
            groups = map.groups.len(),
            medic = map.medic,
            "Built run map"
        );
        Ok(map)
    }

    fn regroup(&mut self) {
        self.groups.clear();
        self.signatures.clear();

        for run in &self.runs {
            let existing = if self.medic {
                None
            } else {
                self.signatures.iter().position(|s| *s == run.fieldmap)
            };

            match existing {
                Some(index) => self.groups[index].push(run.id),
                None => {
                    self.groups.push(vec![run.id]);
                    self.signatures.push(run.fieldmap.clone());
                }
            }
        }
    }

    /// Run IDs grouped by field map, groups in first-seen signature order
    pub fn groups(&self) -> &[Vec<u32>] {
        &self.groups
    }

    /// One signature per group, index-aligned with [`RunMap::groups`]
    pub fn fieldmap_signatures(&self) -> &[Vec<PathBuf>] {
        &self.signatures
    }

    pub fn run_ids(&self) -> Vec<u32> {
        self.runs.iter().map(|r| r.id).collect()
    }

    /// IDs of resting-state runs
    pub fn fc_run_ids(&self) -> Vec<u32> {
        self.runs
            .iter()
            .filter(|r| r.task == REST_TASK)
            .map(|r| r.id)
            .collect()
    }

    pub fn mag(&self) -> BTreeMap<u32, Vec<PathBuf>> {
        self.runs.iter().map(|r| (r.id, r.mag.clone())).collect()
    }

    pub fn phase(&self) -> BTreeMap<u32, Vec<PathBuf>> {
        self.runs.iter().map(|r| (r.id, r.phase.clone())).collect()
    }

    pub fn manifest(&self) -> RunsManifest {
        RunsManifest {
            mag: self.mag(),
            phase: self.phase(),
        }
    }

    pub fn id_of(&self, key: &str) -> Option<u32> {
        self.runs.iter().find(|r| r.key == key).map(|r| r.id)
    }

    pub fn key_of(&self, id: u32) -> Option<&str> {
        self.runs.iter().find(|r| r.id == id).map(|r| r.key.as_str())
    }

    pub fn frame_count(&self, id: u32) -> Option<usize> {
        self.runs.iter().find(|r| r.id == id).map(|r| r.frame_count)
    }

    pub fn is_medic(&self) -> bool {
        self.medic
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Replace the magnitude/phase file lists with a user override
    ///
    /// Both maps must have the same run IDs. Runs are re-identified densely
    /// in ascending override-ID order and regrouped. A run already in the
    /// map keeps its key, task, frame count and (outside MEDIC mode) field
    /// map. IDs the map does not know are accepted only in MEDIC mode, where
    /// the run's own magnitude files are its field map. On error nothing
    /// changes.
    pub fn update(
        &mut self,
        mag: &BTreeMap<u32, Vec<PathBuf>>,
        phase: &BTreeMap<u32, Vec<PathBuf>>,
    ) -> Result<()> {
        if !mag.keys().eq(phase.keys()) {
            return Err(Error::RunMapMismatch {
                mag: mag.keys().copied().collect(),
                phase: phase.keys().copied().collect(),
            });
        }

        let mut runs = Vec::with_capacity(mag.len());
        for (index, (old_id, mag_files)) in mag.iter().enumerate() {
            let phase_files = phase.get(old_id).cloned().unwrap_or_default();
            let existing = self.runs.iter().find(|r| r.id == *old_id);

            let (key, task, frame_count, fieldmap) = match existing {
                Some(run) if self.medic => {
                    (run.key.clone(), run.task.clone(), run.frame_count, mag_files.clone())
                }
                Some(run) => (run.key.clone(), run.task.clone(), run.frame_count, run.fieldmap.clone()),
                None if self.medic => {
                    warn!(run = old_id, "Override adds a run not found on disk");
                    (format!("override{}", old_id), String::new(), 0, mag_files.clone())
                }
                None => return Err(Error::UnknownRun(*old_id)),
            };

            runs.push(Run {
                id: dense_id(index),
                key,
                task,
                frame_count,
                mag: mag_files.clone(),
                phase: phase_files,
                fieldmap,
            });
        }

        self.runs = runs;
        self.regroup();
        info!(runs = self.runs.len(), groups = self.groups.len(), "Applied run override");
        Ok(())
    }

    /// Check that every field-map signature entry exists and is non-empty
    ///
    /// A file must have non-zero length; a directory must hold at least one
    /// entry.
    pub fn verify_fieldmaps(&self) -> Result<()> {
        for path in self.signatures.iter().flatten() {
            let fail = |reason: &str| Error::FieldMap {
                path: path.clone(),
                reason: reason.to_string(),
            };

            let meta = fs::metadata(path).map_err(|e| fail(&e.to_string()))?;
            if meta.is_dir() {
                if fs::read_dir(path)?.next().is_none() {
                    return Err(fail("empty directory"));
                }
            } else if meta.len() == 0 {
                return Err(fail("empty file"));
            }
        }
        Ok(())
    }
}

fn dense_id(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source(key: &str, task: &str, frames: usize) -> RunSource {
        RunSource {
            key: key.to_string(),
            task: task.to_string(),
            files: vec![
                RunFile::mag(format!("{}_e1_mag.nii.gz", key)),
                RunFile::phase(format!("{}_e1_phase.nii.gz", key)),
            ],
            frame_count: frames,
        }
    }

    fn no_fieldmaps() -> HashMap<String, Vec<PathBuf>> {
        HashMap::new()
    }

    #[test]
    fn test_filter_threshold_is_exclusive() {
        let kept = filter_runs(
            vec![source("rest1", "rest", 50), source("rest2", "rest", 51)],
            50,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].key, "rest2");
    }

    #[test]
    fn test_filter_drops_fileless_runs() {
        let mut empty = source("rest1", "rest", 200);
        empty.files.clear();
        assert!(filter_runs(vec![empty], 50).is_empty());
    }

    #[test]
    fn test_medic_groups_are_singletons() {
        let map = RunMap::build(
            vec![source("rest1", "rest", 100), source("rest2", "rest", 100)],
            &no_fieldmaps(),
            &RunMapOptions::default(),
        )
        .unwrap();

        assert_eq!(map.groups(), &[vec![1], vec![2]]);
        assert_eq!(
            map.fieldmap_signatures()[1],
            vec![PathBuf::from("rest2_e1_mag.nii.gz")]
        );
    }

    #[test]
    fn test_shared_fieldmap_groups() {
        let fm_a = vec![PathBuf::from("ap1"), PathBuf::from("pa1")];
        let fm_b = vec![PathBuf::from("ap2"), PathBuf::from("pa2")];
        let fieldmaps: HashMap<_, _> = [
            ("rest1".to_string(), fm_a.clone()),
            ("VoiceHCP1".to_string(), fm_b.clone()),
            ("rest2".to_string(), fm_a.clone()),
        ]
        .into_iter()
        .collect();

        let map = RunMap::build(
            vec![
                source("rest1", "rest", 100),
                source("VoiceHCP1", "VoiceHCP", 100),
                source("rest2", "rest", 100),
            ],
            &fieldmaps,
            &RunMapOptions { min_frames: 50, medic: false },
        )
        .unwrap();

        assert_eq!(map.groups(), &[vec![1, 3], vec![2]]);
        assert_eq!(map.fieldmap_signatures(), &[fm_a, fm_b]);
        assert_eq!(map.fc_run_ids(), vec![1, 3]);
        assert_eq!(map.id_of("VoiceHCP1"), Some(2));
    }

    #[test]
    fn test_signature_order_matters() {
        let fieldmaps: HashMap<_, _> = [
            ("a".to_string(), vec![PathBuf::from("ap"), PathBuf::from("pa")]),
            ("b".to_string(), vec![PathBuf::from("pa"), PathBuf::from("ap")]),
        ]
        .into_iter()
        .collect();

        let map = RunMap::build(
            vec![source("a", "rest", 100), source("b", "rest", 100)],
            &fieldmaps,
            &RunMapOptions { min_frames: 50, medic: false },
        )
        .unwrap();
        assert_eq!(map.groups().len(), 2);
    }

    #[test]
    fn test_missing_fieldmap_outside_medic() {
        let result = RunMap::build(
            vec![source("rest1", "rest", 100)],
            &no_fieldmaps(),
            &RunMapOptions { min_frames: 50, medic: false },
        );
        assert!(matches!(result, Err(Error::MissingFieldMap(key)) if key == "rest1"));
    }

    #[test]
    fn test_filtered_run_needs_no_fieldmap() {
        let map = RunMap::build(
            vec![source("rest1", "rest", 10)],
            &no_fieldmaps(),
            &RunMapOptions { min_frames: 50, medic: false },
        )
        .unwrap();
        assert!(map.is_empty());
        assert!(map.groups().is_empty());
    }

    #[test]
    fn test_update_reidentifies_in_ascending_order() {
        let mut map = RunMap::build(
            vec![
                source("rest1", "rest", 100),
                source("rest2", "rest", 120),
                source("rest3", "rest", 140),
            ],
            &no_fieldmaps(),
            &RunMapOptions::default(),
        )
        .unwrap();

        let mag: BTreeMap<u32, Vec<PathBuf>> = [
            (3, vec![PathBuf::from("c_mag.nii.gz")]),
            (1, vec![PathBuf::from("a_mag.nii.gz")]),
        ]
        .into_iter()
        .collect();
        let phase: BTreeMap<u32, Vec<PathBuf>> = [
            (1, vec![PathBuf::from("a_phase.nii.gz")]),
            (3, vec![PathBuf::from("c_phase.nii.gz")]),
        ]
        .into_iter()
        .collect();

        map.update(&mag, &phase).unwrap();

        assert_eq!(map.run_ids(), vec![1, 2]);
        assert_eq!(map.key_of(2), Some("rest3"));
        assert_eq!(map.frame_count(2), Some(140));
        assert_eq!(map.mag()[&2], vec![PathBuf::from("c_mag.nii.gz")]);
        assert_eq!(map.phase()[&1], vec![PathBuf::from("a_phase.nii.gz")]);
        assert_eq!(map.groups(), &[vec![1], vec![2]]);
    }

    #[test]
    fn test_update_unknown_run() {
        let options = RunMapOptions { min_frames: 50, medic: false };
        let fieldmaps: HashMap<_, _> =
            [("rest1".to_string(), vec![PathBuf::from("ap")])].into_iter().collect();
        let mut map = RunMap::build(vec![source("rest1", "rest", 100)], &fieldmaps, &options).unwrap();

        let files: BTreeMap<u32, Vec<PathBuf>> = [(7, vec![PathBuf::from("x")])].into_iter().collect();
        assert!(matches!(map.update(&files, &files), Err(Error::UnknownRun(7))));
        assert_eq!(map.key_of(1), Some("rest1"));

        let mut medic =
            RunMap::build(vec![source("rest1", "rest", 100)], &no_fieldmaps(), &RunMapOptions::default())
                .unwrap();
        medic.update(&files, &files).unwrap();
        assert_eq!(medic.key_of(1), Some("override7"));
    }

    #[test]
    fn test_manifest_json_shape() {
        let map = RunMap::build(vec![source("rest1", "rest", 100)], &no_fieldmaps(), &RunMapOptions::default())
            .unwrap();
        let json = serde_json::to_value(map.manifest()).unwrap();
        assert_eq!(json["mag"]["1"][0], "rest1_e1_mag.nii.gz");
        assert_eq!(json["phase"]["1"][0], "rest1_e1_phase.nii.gz");
    }

    #[test]
    fn test_verify_fieldmaps() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("ap.nii.gz");
        let empty = dir.path().join("pa.nii.gz");
        fs::write(&good, b"data").unwrap();
        fs::write(&empty, b"").unwrap();

        let options = RunMapOptions { min_frames: 50, medic: false };
        let ok: HashMap<_, _> = [("r".to_string(), vec![good.clone()])].into_iter().collect();
        let map = RunMap::build(vec![source("r", "rest", 100)], &ok, &options).unwrap();
        map.verify_fieldmaps().unwrap();

        let bad: HashMap<_, _> = [("r".to_string(), vec![good, empty.clone()])].into_iter().collect();
        let map = RunMap::build(vec![source("r", "rest", 100)], &bad, &options).unwrap();
        assert!(matches!(map.verify_fieldmaps(), Err(Error::FieldMap { path, .. }) if path == empty));

        let missing: HashMap<_, _> =
            [("r".to_string(), vec![dir.path().join("gone.nii.gz")])].into_iter().collect();
        let map = RunMap::build(vec![source("r", "rest", 100)], &missing, &options).unwrap();
        assert!(matches!(map.verify_fieldmaps(), Err(Error::FieldMap { .. })));

        let empty_dir = dir.path().join("study9");
        fs::create_dir(&empty_dir).unwrap();
        let in_dir: HashMap<_, _> = [("r".to_string(), vec![empty_dir])].into_iter().collect();
        let map = RunMap::build(vec![source("r", "rest", 100)], &in_dir, &options).unwrap();
        assert!(matches!(map.verify_fieldmaps(), Err(Error::FieldMap { .. })));
    }

    #[test]
    fn test_options_from_instructions() {
        let mut instructions = Params::new(mep_common::ParamsKind::Instructions);
        instructions.set("min_frames", 30i64).unwrap();
        instructions.set("medic", false).unwrap();

        let options = RunMapOptions::from_instructions(&instructions);
        assert_eq!(options, RunMapOptions { min_frames: 30, medic: false });
    }
}
