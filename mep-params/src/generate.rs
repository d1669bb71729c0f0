//! Params file generation
//!
//! Wires discovery, grouping and serialization together. Output layout:
//!
//! ```text
//! <project>/instructions.params        (+ instructions.toml)
//! <project>/<subject>/struct.params
//! <project>/<subject>/<session>/func.params
//! <project>/<subject>/<session>/runs.json
//! ```
//!
//! In DICOM mode the project is the data directory itself and session
//! outputs land next to the study folders.

use crate::anatomical::{
    flatten_selections, resolve_anatomicals, resolve_bids_anatomicals, AnatomicalSelection,
};
use crate::bids::{BidsLayout, FrameCounter};
use crate::functional::group_dicom_session;
use crate::header::HeaderReader;
use crate::locator::{find_manifest_files, scan_session, PathStyle, SessionManifest};
use crate::overrides::{OverrideFile, SessionOverride};
use crate::runs::{RunMap, RunMapOptions};
use mep_common::{Error, Params, ParamsKind, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Audit record of the runs behind a `func.params`
pub const RUNS_MANIFEST: &str = "runs.json";

const FREESURFER_DIR: &str = "fs7.2";
const POST_FREESURFER_DIR: &str = "FREESURFER_fs_LR";
const MASK_DIR: &str = "subcortical_mask";
const ATLAS_DIR: &str = "atlas";

/// `<dir>/<stem>.params` for a parameter set
pub fn params_path(dir: &Path, kind: ParamsKind) -> PathBuf {
    dir.join(format!("{}.params", kind.file_stem()))
}

/// Write project instructions, applying `overrides` on top of the defaults
///
/// Both the shell format and a TOML copy are written.
pub fn generate_instructions(project_dir: &Path, overrides: Option<&toml::Table>) -> Result<Params> {
    let mut params = Params::new(ParamsKind::Instructions);
    if let Some(table) = overrides {
        params.merge_table(table)?;
    }

    fs::create_dir_all(project_dir)?;
    let path = params_path(project_dir, ParamsKind::Instructions);
    params.save_params(&path)?;
    let toml_path = params.save_toml(&path)?;

    info!(
        params = %path.display(),
        toml = %toml_path.display(),
        "Wrote instructions"
    );
    Ok(params)
}

/// Instructions for a whole-dataset run
///
/// An existing `instructions.params` is kept, with `overrides` merged in
/// and rewritten only when there are any. A project without one gets the
/// defaults written as by [`generate_instructions`].
pub fn prepare_instructions(project_dir: &Path, overrides: Option<&toml::Table>) -> Result<Params> {
    let path = params_path(project_dir, ParamsKind::Instructions);
    if !path.is_file() {
        return generate_instructions(project_dir, overrides);
    }

    let mut params = Params::load_params(ParamsKind::Instructions, &path)?;
    match overrides.filter(|table| !table.is_empty()) {
        Some(table) => {
            params.merge_table(table)?;
            params.save_params(&path)?;
            params.save_toml(&path)?;
            info!(path = %path.display(), changed = table.len(), "Updated existing instructions");
        }
        None => info!(path = %path.display(), "Keeping existing instructions"),
    }
    Ok(params)
}

/// Read `instructions.params` from `project_dir`, defaults when absent
pub fn load_instructions(project_dir: &Path) -> Result<Params> {
    let path = params_path(project_dir, ParamsKind::Instructions);
    if !path.exists() {
        warn!(path = %path.display(), "No instructions file, using defaults");
        return Ok(Params::new(ParamsKind::Instructions));
    }
    Params::load_params(ParamsKind::Instructions, &path)
}

/// Structural params for `subject` from its anatomical selections
pub fn structural_params(
    subject: &str,
    subject_dir: &Path,
    selections: &[AnatomicalSelection],
) -> Result<Params> {
    let (t1w, t2w) = flatten_selections(selections);
    let fs_dir = subject_dir.join(FREESURFER_DIR);

    let mut params = Params::new(ParamsKind::Structural);
    params.set("patid", subject)?;
    params.set("structid", subject)?;
    params.set("studydir", subject_dir)?;
    params.set("mprdirs", t1w)?;
    params.set("t2wdirs", t2w)?;
    params.set("PostFSdir", fs_dir.join(POST_FREESURFER_DIR))?;
    params.set("FSdir", fs_dir)?;
    Ok(params)
}

/// Resolve anatomicals of a DICOM subject and write `struct.params`
pub fn generate_structural(
    subject_dir: &Path,
    max_depth: usize,
    reader: &dyn HeaderReader,
    style: &PathStyle,
) -> Result<Params> {
    let subject_dir = &absolute_dir(subject_dir)?;
    let subject = dir_label(subject_dir)?;
    let selections = resolve_anatomicals(subject_dir, max_depth, reader, style)?;

    let params = structural_params(&subject, subject_dir, &selections)?;
    let path = params_path(subject_dir, ParamsKind::Structural);
    params.save_params(&path)?;
    info!(subject = %subject, path = %path.display(), "Wrote structural params");
    Ok(params)
}

/// Where one session's functional outputs go and what they refer to
#[derive(Debug, Clone)]
pub struct SessionTarget {
    pub subject: String,
    pub subject_dir: PathBuf,
    /// Session holding the anatomy the functional runs register to
    pub day1: String,
    pub session: String,
    /// Base for relative override entries
    pub session_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// What was written for one session; `runs == 0` means nothing was
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session: String,
    pub output_dir: PathBuf,
    pub runs: usize,
}

/// Functional params for a session from its grouped runs
pub fn functional_params(target: &SessionTarget, map: &RunMap) -> Result<Params> {
    let ids = |run_ids: Vec<u32>| run_ids.into_iter().map(i64::from).collect::<Vec<_>>();
    let groups: Vec<Vec<i64>> = map
        .groups()
        .iter()
        .map(|group| ids(group.clone()))
        .collect();
    let sefm: Vec<Vec<String>> = map
        .fieldmap_signatures()
        .iter()
        .map(|sig| sig.iter().map(|p| p.to_string_lossy().into_owned()).collect())
        .collect();
    let fs_dir = target.subject_dir.join(FREESURFER_DIR);

    let mut params = Params::new(ParamsKind::Functional);
    params.set("day1_patid", target.day1.as_str())?;
    params.set("day1_path", target.subject_dir.join(&target.day1).join(ATLAS_DIR))?;
    params.set("patid", target.session.as_str())?;
    params.set("mpr", format!("{}_T1w", target.subject))?;
    params.set("t2wimg", format!("{}_T2w", target.subject))?;
    params.set("BOLDgrps", groups)?;
    params.set("runID", ids(map.run_ids()))?;
    params.set("FCrunID", ids(map.fc_run_ids()))?;
    params.set("sefm", sefm)?;
    params.set("PostFSdir", fs_dir.join(POST_FREESURFER_DIR))?;
    params.set("FSdir", fs_dir)?;
    params.set("maskdir", target.subject_dir.join(MASK_DIR))?;
    Ok(params)
}

/// Apply overrides, then write `func.params` and `runs.json`
///
/// A session left with no runs gets no params; stale outputs from an
/// earlier generation are removed along with the output directory when it
/// ends up empty.
pub fn write_session(
    target: &SessionTarget,
    mut map: RunMap,
    overrides: Option<SessionOverride>,
) -> Result<SessionReport> {
    let config = match overrides {
        Some(mut session_override) => {
            if session_override.has_runs() {
                session_override.resolve_paths(&target.session_dir);
                map.update(&session_override.mag, &session_override.phase)?;
            }
            Some(session_override.config)
        }
        None => None,
    };

    let report = SessionReport {
        session: target.session.clone(),
        output_dir: target.output_dir.clone(),
        runs: map.len(),
    };

    if map.is_empty() {
        warn!(session = %target.session, "No usable functional runs, skipping session");
        remove_partial_output(&target.output_dir)?;
        return Ok(report);
    }

    map.verify_fieldmaps()?;

    let mut params = functional_params(target, &map)?;
    if let Some(config) = config.filter(|c| !c.is_empty()) {
        params.merge_table(&config)?;
    }

    fs::create_dir_all(&target.output_dir)?;
    let path = params_path(&target.output_dir, ParamsKind::Functional);
    params.save_params(&path)?;
    map.manifest().save(&target.output_dir.join(RUNS_MANIFEST))?;

    info!(
        session = %target.session,
        runs = map.len(),
        groups = map.groups().len(),
        path = %path.display(),
        "Wrote functional params"
    );
    Ok(report)
}

/// Remove generated session outputs, then the directory if nothing is left
///
/// Other files (DICOM study folders in particular) are never touched.
pub fn remove_partial_output(output_dir: &Path) -> Result<()> {
    if !output_dir.is_dir() {
        return Ok(());
    }

    for generated in [params_path(output_dir, ParamsKind::Functional), output_dir.join(RUNS_MANIFEST)] {
        if generated.is_file() {
            fs::remove_file(&generated)?;
            info!(path = %generated.display(), "Removed stale output");
        }
    }

    if fs::read_dir(output_dir)?.next().is_none() {
        fs::remove_dir(output_dir)?;
        info!(path = %output_dir.display(), "Removed empty session directory");
    }
    Ok(())
}

/// Group the functional runs of every DICOM session of a subject and write
/// their params
///
/// `day1` defaults to the first session found.
pub fn generate_functional(
    subject_dir: &Path,
    max_depth: usize,
    reader: &dyn HeaderReader,
    instructions: &Params,
    overrides: Option<&OverrideFile>,
    day1: Option<&str>,
) -> Result<Vec<SessionReport>> {
    let subject_dir = &absolute_dir(subject_dir)?;
    let subject = dir_label(subject_dir)?;
    let options = RunMapOptions::from_instructions(instructions);

    let manifests = find_manifest_files(subject_dir, max_depth)?
        .iter()
        .map(|path| SessionManifest::parse(path))
        .collect::<Result<Vec<_>>>()?;
    let Some(first) = manifests.first() else {
        warn!(subject = %subject, "No sessions found");
        return Ok(Vec::new());
    };
    let day1 = day1.map_or_else(|| first.session.clone(), str::to_string);

    let mut reports = Vec::with_capacity(manifests.len());
    for manifest in &manifests {
        let records = scan_session(manifest, reader)?;
        let (sources, signatures) = group_dicom_session(&records);
        let map = RunMap::build(sources, &signatures, &options)?;

        let target = SessionTarget {
            subject: subject.clone(),
            subject_dir: subject_dir.to_path_buf(),
            day1: day1.clone(),
            session: manifest.session.clone(),
            session_dir: manifest.session_dir.clone(),
            output_dir: manifest.session_dir.clone(),
        };
        let session_override = match overrides {
            Some(file) => file.session(&subject, &manifest.session)?,
            None => None,
        };
        reports.push(write_session(&target, map, session_override)?);
    }
    Ok(reports)
}

/// Summary of a whole-dataset BIDS generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BidsReport {
    /// Subjects that got a `struct.params`
    pub structural: Vec<String>,
    /// Subjects skipped for lack of a T1w
    pub skipped: Vec<String>,
    pub sessions: Vec<SessionReport>,
}

/// Generate every params file for a BIDS dataset into `project_dir`
///
/// Subject folders are named `sub-<label>`, session folders `ses-<label>`
/// (or the subject folder name for single-session datasets). A subject
/// without any T1w gets no structural params but its functional sessions
/// are still processed.
pub fn generate_bids(
    bids_dir: &Path,
    project_dir: &Path,
    counter: &dyn FrameCounter,
    instruction_overrides: Option<&toml::Table>,
    overrides: Option<&OverrideFile>,
) -> Result<BidsReport> {
    let bids_dir = &absolute_dir(bids_dir)?;
    fs::create_dir_all(project_dir)?;
    let project_dir = &absolute_dir(project_dir)?;

    let layout = BidsLayout::index(bids_dir)?;
    let instructions = prepare_instructions(project_dir, instruction_overrides)?;
    let options = RunMapOptions::from_instructions(&instructions);

    let mut report = BidsReport::default();
    for subject in layout.subjects() {
        let subject_label = format!("sub-{}", subject);
        let subject_dir = project_dir.join(&subject_label);
        fs::create_dir_all(&subject_dir)?;

        match resolve_bids_anatomicals(&layout, &subject) {
            Ok(selections) => {
                let params = structural_params(&subject_label, &subject_dir, &selections)?;
                params.save_params(&params_path(&subject_dir, ParamsKind::Structural))?;
                report.structural.push(subject_label.clone());
            }
            Err(Error::NotFound(what)) => {
                warn!(subject = %subject_label, "Skipping structural params: no {}", what);
                report.skipped.push(subject_label.clone());
            }
            Err(e) => return Err(e),
        }

        let sessions = layout.sessions(&subject);
        let sessions: Vec<Option<&str>> = if sessions.is_empty() {
            vec![None]
        } else {
            sessions.iter().map(|s| Some(s.as_str())).collect()
        };
        let label = |session: Option<&str>| {
            session.map_or_else(|| subject_label.clone(), |s| format!("ses-{}", s))
        };
        let day1 = label(sessions[0]);

        for session in sessions {
            let sources = layout.functional_runs(&subject, session, counter)?;
            let signatures = layout.fieldmap_signatures(&subject, session)?;
            let map = RunMap::build(sources, &signatures, &options)?;

            let session_label = label(session);
            let session_dir = match session {
                Some(s) => bids_dir.join(&subject_label).join(format!("ses-{}", s)),
                None => bids_dir.join(&subject_label),
            };
            let target = SessionTarget {
                subject: subject_label.clone(),
                subject_dir: subject_dir.clone(),
                day1: day1.clone(),
                output_dir: subject_dir.join(&session_label),
                session: session_label,
                session_dir,
            };
            let session_override = match overrides {
                Some(file) => file.session(&subject_label, &target.session)?,
                None => None,
            };
            report.sessions.push(write_session(&target, map, session_override)?);
        }
    }

    info!(
        subjects = report.structural.len() + report.skipped.len(),
        sessions = report.sessions.len(),
        "BIDS dataset processed"
    );
    Ok(report)
}

/// Canonical form of an input directory
///
/// Params files are sourced from other working directories, so every path
/// written into them has to be absolute.
fn absolute_dir(dir: &Path) -> Result<PathBuf> {
    dir.canonicalize()
        .map_err(|e| Error::Config(format!("Cannot resolve directory {}: {}", dir.display(), e)))
}

fn dir_label(dir: &Path) -> Result<String> {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Config(format!("Cannot derive a label from {}", dir.display())))
}
