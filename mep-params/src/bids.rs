//! BIDS dataset index and queries
//!
//! The dataset is indexed once by walking the tree and parsing entity
//! filenames (`sub-01_ses-1_task-rest_run-01_echo-1_part-mag_bold.nii.gz`).
//! Queries filter on entities, suffix, extension and datatype. Only what
//! the run grouping needs is implemented: subjects, sessions, tasks and runs,
//! plus field-map lookup through the `IntendedFor` sidecar field.

use crate::header::{HeaderReader, SidecarHeaderReader};
use crate::matcher::{select_best, Candidate, STRUCTURAL_PRIORITY};
use crate::runs::{Part, RunFile, RunSource};
use mep_common::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Top-level folders that are not part of the raw dataset
const SKIPPED_DIRS: &[&str] = &["derivatives", "sourcedata", "code"];

/// One file of the dataset with its parsed name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsFile {
    pub path: PathBuf,
    /// Parent folder name: `anat`, `func`, `fmap`, ...
    pub datatype: String,
    pub suffix: String,
    /// Everything after the first dot, e.g. `nii.gz`
    pub extension: String,
    pub entities: BTreeMap<String, String>,
}

impl BidsFile {
    /// Parse a dataset path; `None` for files that do not follow the naming
    /// scheme
    pub fn parse(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if !name.starts_with("sub-") {
            return None;
        }

        let (stem, extension) = name.split_once('.')?;
        let mut parts: Vec<&str> = stem.split('_').collect();
        let suffix = parts.pop()?;
        if suffix.contains('-') {
            return None;
        }

        let entities = parts
            .into_iter()
            .map(|part| part.split_once('-').map(|(k, v)| (k.to_string(), v.to_string())))
            .collect::<Option<BTreeMap<_, _>>>()?;

        let datatype = path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Some(Self {
            path: path.to_path_buf(),
            datatype,
            suffix: suffix.to_string(),
            extension: extension.to_string(),
            entities,
        })
    }

    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities.get(key).map(String::as_str)
    }

    /// Run number with leading zeros dropped (`01` → 1)
    pub fn run(&self) -> Option<u32> {
        self.entity("run").and_then(|r| r.parse().ok())
    }

    pub fn part(&self) -> Part {
        match self.entity("part") {
            Some("phase") => Part::Phase,
            _ => Part::Mag,
        }
    }
}

/// Filter over indexed files; unset fields match anything
#[derive(Debug, Clone, Default)]
pub struct BidsQuery<'a> {
    pub subject: Option<&'a str>,
    pub session: Option<&'a str>,
    pub task: Option<&'a str>,
    pub run: Option<u32>,
    pub suffix: Option<&'a str>,
    pub extension: Option<&'a str>,
    pub part: Option<&'a str>,
    pub echo: Option<&'a str>,
    pub direction: Option<&'a str>,
    pub datatype: Option<&'a str>,
}

impl<'a> BidsQuery<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(mut self, v: &'a str) -> Self {
        self.subject = Some(v);
        self
    }

    /// `None` leaves the session unconstrained
    pub fn session(mut self, v: Option<&'a str>) -> Self {
        self.session = v;
        self
    }

    pub fn task(mut self, v: &'a str) -> Self {
        self.task = Some(v);
        self
    }

    pub fn run(mut self, v: u32) -> Self {
        self.run = Some(v);
        self
    }

    pub fn suffix(mut self, v: &'a str) -> Self {
        self.suffix = Some(v);
        self
    }

    pub fn extension(mut self, v: &'a str) -> Self {
        self.extension = Some(v);
        self
    }

    pub fn part(mut self, v: &'a str) -> Self {
        self.part = Some(v);
        self
    }

    pub fn echo(mut self, v: &'a str) -> Self {
        self.echo = Some(v);
        self
    }

    pub fn direction(mut self, v: &'a str) -> Self {
        self.direction = Some(v);
        self
    }

    pub fn datatype(mut self, v: &'a str) -> Self {
        self.datatype = Some(v);
        self
    }

    pub fn matches(&self, file: &BidsFile) -> bool {
        let entity = |key: &str, want: Option<&str>| want.map_or(true, |w| file.entity(key) == Some(w));

        entity("sub", self.subject)
            && entity("ses", self.session)
            && entity("task", self.task)
            && entity("part", self.part)
            && entity("echo", self.echo)
            && entity("dir", self.direction)
            && self.run.map_or(true, |r| file.run() == Some(r))
            && self.suffix.map_or(true, |s| file.suffix == s)
            && self.extension.map_or(true, |e| file.extension == e)
            && self.datatype.map_or(true, |d| file.datatype == d)
    }
}

/// Number of time points in an image
pub trait FrameCounter {
    fn frame_count(&self, path: &Path) -> Result<usize>;
}

/// Frame counts from the NIfTI header: `dim[4]` for 4D images, else 1
#[derive(Debug, Clone, Copy, Default)]
pub struct NiftiFrameCounter;

impl FrameCounter for NiftiFrameCounter {
    fn frame_count(&self, path: &Path) -> Result<usize> {
        let header = nifti::NiftiHeader::from_file(path).map_err(|e| Error::Header {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let dim = header.dim;
        if dim[0] >= 4 {
            Ok(usize::from(dim[4].max(1)))
        } else {
            Ok(1)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IntendedFor {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct FieldMapSidecar {
    #[serde(rename = "IntendedFor")]
    intended_for: Option<IntendedFor>,
}

/// Natural key of a BIDS functional run
///
/// BIDS labels are alphanumeric, so the `_run-` separator keeps task
/// `rest1` run 1 apart from task `rest` run 11.
pub fn run_key(task: &str, run: u32) -> String {
    format!("{}_run-{}", task, run)
}

/// Indexed BIDS dataset
#[derive(Debug, Clone)]
pub struct BidsLayout {
    root: PathBuf,
    files: Vec<BidsFile>,
}

impl BidsLayout {
    /// Walk `root` and index every file that follows the naming scheme
    pub fn index(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::NotFound(format!("BIDS dataset {}", root.display())));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped(e));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if let Some(file) = BidsFile::parse(entry.path()) {
                        files.push(file);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Error accessing entry: {}", e),
            }
        }

        info!(root = %root.display(), files = files.len(), "Indexed BIDS dataset");
        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Matching files in path order
    pub fn get(&self, query: &BidsQuery<'_>) -> Vec<&BidsFile> {
        self.files.iter().filter(|f| query.matches(f)).collect()
    }

    fn distinct<T: Ord>(&self, query: &BidsQuery<'_>, value: impl Fn(&BidsFile) -> Option<T>) -> Vec<T> {
        self.get(query)
            .into_iter()
            .filter_map(value)
            .collect::<BTreeSet<T>>()
            .into_iter()
            .collect()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.distinct(&BidsQuery::new(), |f| f.entity("sub").map(str::to_string))
    }

    /// Sessions of `subject`; empty for single-session datasets
    pub fn sessions(&self, subject: &str) -> Vec<String> {
        self.distinct(&BidsQuery::new().subject(subject), |f| {
            f.entity("ses").map(str::to_string)
        })
    }

    pub fn tasks(&self, subject: &str, session: Option<&str>) -> Vec<String> {
        self.distinct(&BidsQuery::new().subject(subject).session(session), |f| {
            f.entity("task").map(str::to_string)
        })
    }

    pub fn runs(&self, subject: &str, session: Option<&str>, task: &str) -> Vec<u32> {
        let query = BidsQuery::new().subject(subject).session(session).task(task);
        self.distinct(&query, BidsFile::run)
    }

    /// Field-map images whose sidecar lists `image` in `IntendedFor`
    ///
    /// `IntendedFor` entries are subject-relative paths or `bids::` URIs.
    pub fn get_fieldmap(&self, image: &Path) -> Result<Vec<PathBuf>> {
        let Some(target) = self.files.iter().find(|f| f.path == image) else {
            return Ok(Vec::new());
        };
        let subject = target.entity("sub").unwrap_or_default();
        let query = BidsQuery::new()
            .subject(subject)
            .session(target.entity("ses"))
            .datatype("fmap")
            .extension("json");

        let mut found = Vec::new();
        for sidecar in self.get(&query) {
            let content = fs::read_to_string(&sidecar.path)?;
            let parsed: FieldMapSidecar = serde_json::from_str(&content)?;
            let intended = match parsed.intended_for {
                Some(IntendedFor::One(one)) => vec![one],
                Some(IntendedFor::Many(many)) => many,
                None => continue,
            };

            let wanted = intended.iter().any(|entry| {
                let entry = entry.trim_start_matches("bids::");
                !entry.is_empty() && image.ends_with(entry)
            });
            if wanted {
                let nifti = self
                    .get(
                        &BidsQuery::new()
                            .subject(subject)
                            .session(target.entity("ses"))
                            .datatype("fmap")
                            .extension("nii.gz"),
                    )
                    .into_iter()
                    .find(|f| same_stem(&f.path, &sidecar.path));
                if let Some(nifti) = nifti {
                    found.push(nifti.path.clone());
                }
            }
        }
        Ok(found)
    }

    /// Functional runs of one session, keyed by [`run_key`]
    ///
    /// A run's frame count is the maximum over its magnitude files.
    pub fn functional_runs(
        &self,
        subject: &str,
        session: Option<&str>,
        counter: &dyn FrameCounter,
    ) -> Result<Vec<RunSource>> {
        let mut runs = Vec::new();

        for task in self.tasks(subject, session) {
            for run in self.runs(subject, session, &task) {
                let query = BidsQuery::new()
                    .subject(subject)
                    .session(session)
                    .task(&task)
                    .run(run)
                    .suffix("bold")
                    .extension("nii.gz");
                let files = self.get(&query);
                if files.is_empty() {
                    continue;
                }

                let mut frame_count = 0;
                for file in files.iter().filter(|f| f.part() == Part::Mag) {
                    frame_count = frame_count.max(counter.frame_count(&file.path)?);
                }

                let key = run_key(&task, run);
                debug!(run = %key, files = files.len(), frames = frame_count, "Found BOLD run");
                runs.push(RunSource {
                    key,
                    task: task.clone(),
                    files: files
                        .iter()
                        .map(|f| RunFile {
                            path: f.path.clone(),
                            part: f.part(),
                        })
                        .collect(),
                    frame_count,
                });
            }
        }
        Ok(runs)
    }

    /// `[AP, PA]` field maps for every functional run of a session
    ///
    /// Uses the run's first-echo magnitude image to look up `IntendedFor`;
    /// falls back to the session's first AP and first PA field map. Runs
    /// with neither get no entry.
    pub fn fieldmap_signatures(
        &self,
        subject: &str,
        session: Option<&str>,
    ) -> Result<HashMap<String, Vec<PathBuf>>> {
        let first_fmap = |direction: &str| {
            self.get(
                &BidsQuery::new()
                    .subject(subject)
                    .session(session)
                    .datatype("fmap")
                    .direction(direction)
                    .extension("nii.gz"),
            )
            .first()
            .map(|f| f.path.clone())
        };
        let fallback = first_fmap("AP").zip(first_fmap("PA"));

        let mut signatures = HashMap::new();
        for task in self.tasks(subject, session) {
            for run in self.runs(subject, session, &task) {
                let query = BidsQuery::new()
                    .subject(subject)
                    .session(session)
                    .task(&task)
                    .run(run)
                    .suffix("bold")
                    .extension("nii.gz")
                    .part("mag");
                let mut mags = self.get(&query.clone().echo("1"));
                if mags.is_empty() {
                    mags = self.get(&query);
                }
                let Some(first) = mags.first().map(|f| f.path.clone()) else {
                    continue;
                };

                let listed = self.get_fieldmap(&first)?;
                let direction = |d: &str| {
                    listed
                        .iter()
                        .find(|p| p.to_string_lossy().contains(&format!("dir-{}", d)))
                        .cloned()
                };

                let key = run_key(&task, run);
                match (direction("AP"), direction("PA")) {
                    (Some(ap), Some(pa)) => {
                        signatures.insert(key, vec![ap, pa]);
                    }
                    _ => match &fallback {
                        Some((ap, pa)) => {
                            debug!(run = %key, "No IntendedFor field map, using first AP/PA of session");
                            signatures.insert(key, vec![ap.clone(), pa.clone()]);
                        }
                        None => warn!(run = %key, "No field map found"),
                    },
                }
            }
        }
        Ok(signatures)
    }

    /// Structural candidates of one session and modality, tagged from their
    /// sidecar ImageType (no sidecar: no tags)
    pub fn anatomical_candidates(
        &self,
        subject: &str,
        session: Option<&str>,
        suffix: &str,
    ) -> Result<Vec<Candidate>> {
        let query = BidsQuery::new()
            .subject(subject)
            .session(session)
            .suffix(suffix)
            .extension("nii.gz");

        let reader = SidecarHeaderReader;
        self.get(&query)
            .into_iter()
            .map(|file| -> Result<Candidate> {
                let sidecar = SidecarHeaderReader::sidecar_for(&file.path);
                let tags = if sidecar.is_file() {
                    reader.read_header(&sidecar)?.image_type
                } else {
                    Vec::new()
                };
                Ok(Candidate::new(file.path.clone(), tags))
            })
            .collect()
    }

    /// Best structural images of one session and modality
    pub fn select_anatomicals(
        &self,
        subject: &str,
        session: Option<&str>,
        suffix: &str,
    ) -> Result<Vec<PathBuf>> {
        let candidates = self.anatomical_candidates(subject, session, suffix)?;
        Ok(select_best(STRUCTURAL_PRIORITY, &candidates))
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.depth() > 0
        && entry.file_type().is_dir()
        && (name.starts_with('.') || (entry.depth() == 1 && SKIPPED_DIRS.iter().any(|d| *d == name)))
}

fn same_stem(a: &Path, b: &Path) -> bool {
    let stem = |p: &Path| {
        p.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split_once('.'))
            .map(|(s, _)| s.to_string())
    };
    a.parent() == b.parent() && stem(a).is_some() && stem(a) == stem(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Frame counts by file name, recording every lookup
    struct FixedFrames {
        frames: HashMap<String, usize>,
        seen: RefCell<Vec<PathBuf>>,
    }

    impl FrameCounter for FixedFrames {
        fn frame_count(&self, path: &Path) -> Result<usize> {
            self.seen.borrow_mut().push(path.to_path_buf());
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            Ok(*self.frames.get(&name).unwrap_or(&0))
        }
    }

    fn touch(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_entities() {
        let file = BidsFile::parse(Path::new(
            "/d/sub-01/ses-1/func/sub-01_ses-1_task-rest_run-02_echo-1_part-phase_bold.nii.gz",
        ))
        .unwrap();

        assert_eq!(file.entity("sub"), Some("01"));
        assert_eq!(file.entity("task"), Some("rest"));
        assert_eq!(file.run(), Some(2));
        assert_eq!(file.part(), Part::Phase);
        assert_eq!(file.suffix, "bold");
        assert_eq!(file.extension, "nii.gz");
        assert_eq!(file.datatype, "func");

        assert!(BidsFile::parse(Path::new("/d/dataset_description.json")).is_none());
        assert!(BidsFile::parse(Path::new("/d/sub-01/anat/sub-01_T1w")).is_none());
    }

    #[test]
    fn test_layout_queries() {
        let root = TempDir::new().unwrap();
        let r = root.path();
        touch(r, "dataset_description.json", "{}");
        touch(r, "sub-01/ses-1/anat/sub-01_ses-1_run-01_T1w.nii.gz", "");
        touch(r, "sub-01/ses-2/func/sub-01_ses-2_task-rest_run-01_echo-1_part-mag_bold.nii.gz", "");
        touch(r, "sub-01/ses-2/func/sub-01_ses-2_task-rest_run-02_echo-1_part-mag_bold.nii.gz", "");
        touch(r, "sub-02/ses-1/func/sub-02_ses-1_task-VoiceHCP_run-01_echo-1_part-mag_bold.nii.gz", "");
        touch(r, "derivatives/sub-01/anat/sub-01_T1w.nii.gz", "");

        let layout = BidsLayout::index(r).unwrap();
        assert_eq!(layout.subjects(), vec!["01", "02"]);
        assert_eq!(layout.sessions("01"), vec!["1", "2"]);
        assert_eq!(layout.tasks("01", Some("2")), vec!["rest"]);
        assert_eq!(layout.runs("01", Some("2"), "rest"), vec![1, 2]);

        let t1 = layout.get(&BidsQuery::new().subject("01").suffix("T1w"));
        assert_eq!(t1.len(), 1);
        assert!(t1[0].path.starts_with(r.join("sub-01")));
    }

    #[test]
    fn test_functional_runs_and_fieldmaps() {
        let root = TempDir::new().unwrap();
        let r = root.path();
        let func = "sub-01/ses-1/func/sub-01_ses-1_task-rest_run-01";
        touch(r, &format!("{}_echo-1_part-mag_bold.nii.gz", func), "");
        touch(r, &format!("{}_echo-2_part-mag_bold.nii.gz", func), "");
        touch(r, &format!("{}_echo-1_part-phase_bold.nii.gz", func), "");
        let ap = touch(r, "sub-01/ses-1/fmap/sub-01_ses-1_acq-SE_dir-AP_run-01_epi.nii.gz", "x");
        let pa = touch(r, "sub-01/ses-1/fmap/sub-01_ses-1_acq-SE_dir-PA_run-01_epi.nii.gz", "x");
        let intended =
            r#"{"IntendedFor": ["ses-1/func/sub-01_ses-1_task-rest_run-01_echo-1_part-mag_bold.nii.gz"]}"#;
        touch(r, "sub-01/ses-1/fmap/sub-01_ses-1_acq-SE_dir-AP_run-01_epi.json", intended);
        touch(r, "sub-01/ses-1/fmap/sub-01_ses-1_acq-SE_dir-PA_run-01_epi.json", intended);

        let counter = FixedFrames {
            frames: [
                ("sub-01_ses-1_task-rest_run-01_echo-1_part-mag_bold.nii.gz".to_string(), 120),
                ("sub-01_ses-1_task-rest_run-01_echo-2_part-mag_bold.nii.gz".to_string(), 130),
            ]
            .into_iter()
            .collect(),
            seen: RefCell::new(Vec::new()),
        };

        let layout = BidsLayout::index(r).unwrap();
        let runs = layout.functional_runs("01", Some("1"), &counter).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].key, "rest_run-1");
        assert_eq!(runs[0].frame_count, 130);
        assert_eq!(runs[0].files_of(Part::Mag).len(), 2);
        assert_eq!(runs[0].files_of(Part::Phase).len(), 1);
        // Phase images are never opened for frame counts
        assert_eq!(counter.seen.borrow().len(), 2);

        let signatures = layout.fieldmap_signatures("01", Some("1")).unwrap();
        assert_eq!(signatures["rest_run-1"], vec![ap, pa]);
    }

    #[test]
    fn test_fieldmap_fallback_without_intended_for() {
        let root = TempDir::new().unwrap();
        let r = root.path();
        touch(r, "sub-01/func/sub-01_task-rest_run-01_echo-1_part-mag_bold.nii.gz", "");
        let ap1 = touch(r, "sub-01/fmap/sub-01_dir-AP_run-01_epi.nii.gz", "x");
        touch(r, "sub-01/fmap/sub-01_dir-AP_run-02_epi.nii.gz", "x");
        let pa1 = touch(r, "sub-01/fmap/sub-01_dir-PA_run-01_epi.nii.gz", "x");
        touch(r, "sub-01/fmap/sub-01_dir-AP_run-01_epi.json", "{}");

        let layout = BidsLayout::index(r).unwrap();
        assert!(layout.sessions("01").is_empty());

        let signatures = layout.fieldmap_signatures("01", None).unwrap();
        assert_eq!(signatures["rest_run-1"], vec![ap1, pa1]);
    }

    #[test]
    fn test_run_keys_do_not_collide() {
        let root = TempDir::new().unwrap();
        let r = root.path();
        touch(r, "sub-01/func/sub-01_task-rest1_run-1_echo-1_part-mag_bold.nii.gz", "");
        touch(r, "sub-01/func/sub-01_task-rest_run-11_echo-1_part-mag_bold.nii.gz", "");
        let counter = FixedFrames {
            frames: HashMap::new(),
            seen: RefCell::new(Vec::new()),
        };

        let layout = BidsLayout::index(r).unwrap();
        let runs = layout.functional_runs("01", None, &counter).unwrap();
        let mut keys: Vec<&str> = runs.iter().map(|run| run.key.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["rest1_run-1", "rest_run-11"]);
    }

    #[test]
    fn test_select_anatomicals_by_sidecar_tags() {
        let root = TempDir::new().unwrap();
        let r = root.path();
        touch(r, "sub-01/ses-1/anat/sub-01_ses-1_run-01_T1w.nii.gz", "");
        touch(
            r,
            "sub-01/ses-1/anat/sub-01_ses-1_run-01_T1w.json",
            r#"{"ImageType": ["ORIGINAL", "PRIMARY", "M", "ND"]}"#,
        );
        let best = touch(r, "sub-01/ses-1/anat/sub-01_ses-1_run-02_T1w.nii.gz", "");
        touch(
            r,
            "sub-01/ses-1/anat/sub-01_ses-1_run-02_T1w.json",
            r#"{"ImageType": ["ORIGINAL", "PRIMARY", "M", "ND", "NORM"]}"#,
        );

        let layout = BidsLayout::index(r).unwrap();
        let selected = layout.select_anatomicals("01", Some("1"), "T1w").unwrap();
        assert_eq!(selected, vec![best]);
        assert!(layout.select_anatomicals("01", Some("1"), "T2w").unwrap().is_empty());
    }

    #[test]
    fn test_nifti_frame_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bold.nii");

        // Minimal little-endian NIfTI-1 header: 64x64x10 volume, 137 frames
        let mut header = vec![0u8; 352];
        header[0..4].copy_from_slice(&348i32.to_le_bytes());
        let dims: [i16; 8] = [4, 64, 64, 10, 137, 1, 1, 1];
        for (i, d) in dims.iter().enumerate() {
            header[40 + 2 * i..42 + 2 * i].copy_from_slice(&d.to_le_bytes());
        }
        header[70..72].copy_from_slice(&2i16.to_le_bytes());
        header[72..74].copy_from_slice(&8i16.to_le_bytes());
        header[108..112].copy_from_slice(&352f32.to_le_bytes());
        header[344..348].copy_from_slice(b"n+1\0");
        fs::write(&path, &header).unwrap();

        assert_eq!(NiftiFrameCounter.frame_count(&path).unwrap(), 137);
    }

    #[test]
    fn test_nifti_frame_count_bad_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bold.nii");
        fs::write(&path, b"short").unwrap();
        assert!(matches!(
            NiftiFrameCounter.frame_count(&path),
            Err(Error::Header { .. })
        ));
    }
}
