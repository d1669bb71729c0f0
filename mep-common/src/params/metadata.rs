//! Parameter metadata definitions
//!
//! Declaration order here is output order in the params files. Several
//! string fields hold shell variable references (`$cwd`, `$REFDIR`) that the
//! pipeline scripts expand, so they are typed `Str` rather than `Path`.

use super::{ParamDefault, ParamKind, ParamMetadata, ParamValue};

fn any_value(_: &ParamValue) -> Result<(), String> {
    Ok(())
}

fn non_negative(value: &ParamValue) -> Result<(), String> {
    match value {
        ParamValue::Int(v) if *v < 0 => Err(format!("value {} must be >= 0", v)),
        ParamValue::Float(v) if *v < 0.0 => Err(format!("value {} must be >= 0", v)),
        _ => Ok(()),
    }
}

fn positive(value: &ParamValue) -> Result<(), String> {
    match value {
        ParamValue::Int(v) if *v < 1 => Err(format!("value {} must be >= 1", v)),
        ParamValue::Float(v) if *v <= 0.0 => Err(format!("value {} must be > 0", v)),
        _ => Ok(()),
    }
}

fn motion_parameter(value: &ParamValue) -> Result<(), String> {
    match value {
        ParamValue::Int(v) if !(0..=6).contains(v) => {
            Err(format!("value {} out of range [0, 6]", v))
        }
        _ => Ok(()),
    }
}

fn not_empty(value: &ParamValue) -> Result<(), String> {
    match value {
        ParamValue::Str(s) if s.trim().is_empty() => Err("must not be empty".to_string()),
        ParamValue::Path(p) if p.as_os_str().is_empty() => Err("must not be empty".to_string()),
        _ => Ok(()),
    }
}

fn positive_run_ids(value: &ParamValue) -> Result<(), String> {
    let bad = match value {
        ParamValue::IntList(ids) => ids.iter().find(|id| **id < 1).copied(),
        ParamValue::IntGroups(groups) => groups.iter().flatten().find(|id| **id < 1).copied(),
        _ => None,
    };
    match bad {
        Some(id) => Err(format!("run ID {} must be >= 1", id)),
        None => Ok(()),
    }
}

const fn field(
    key: &'static str,
    kind: ParamKind,
    default: ParamDefault,
    description: &'static str,
) -> ParamMetadata {
    ParamMetadata {
        key,
        kind,
        default,
        description,
        validator: any_value,
    }
}

const fn checked(
    key: &'static str,
    kind: ParamKind,
    default: ParamDefault,
    description: &'static str,
    validator: fn(&ParamValue) -> Result<(), String>,
) -> ParamMetadata {
    ParamMetadata {
        key,
        kind,
        default,
        description,
        validator,
    }
}

use ParamDefault as D;
use ParamKind as K;

/// Project-wide pipeline instructions
pub static INSTRUCTIONS: &[ParamMetadata] = &[
    field("bids", K::Bool, D::Bool(true), "Input is a BIDS dataset"),
    field("cleanup", K::Bool, D::Bool(false), "Delete intermediate files"),
    checked("economy", K::Int, D::Int(0), "Intermediate file retention level", non_negative),
    field("inpath", K::Str, D::Str("$cwd"), "Location of sorted study folders"),
    field("target", K::Str, D::Str("$REFDIR/TRIO_Y_NDC"), "Atlas representative target in 711-2B space"),
    field("outspace_flag", K::Str, D::Str("mni2mm"), "Final fMRI resolution and space"),
    field("nlalign", K::Bool, D::Bool(false), "Run non-linear atlas alignment (fnirt)"),
    field("medic", K::Bool, D::Bool(true), "Per-run multi-echo distortion correction"),
    checked("num_cpus", K::Int, D::Int(8), "Threads/processes for external tools", positive),
    checked("delta", K::Float, D::Float(0.00246), "GRE field map echo time difference (s)", positive),
    field("ME_reg", K::Bool, D::Bool(true), "Compute fitted and optimally combined multi-echo signal"),
    field("dbnd_flag", K::Bool, D::Bool(true), "Debanding"),
    field("isnordic", K::Bool, D::Bool(true), "NORDIC data collected"),
    field("runnordic", K::Bool, D::Bool(true), "Run NORDIC denoising"),
    checked("noiseframes", K::Int, D::Int(3), "NORDIC noise frames", non_negative),
    field("bases", K::Str, D::Str("/not/working/please/ignore/FNIRT_474_all_basis.4dfp.img"), "Synthetic field map bases"),
    field("mean", K::Str, D::Str("/not/working/please/ignore/FNIRT_474_all_mean.4dfp.img"), "Synthetic field map mean"),
    checked("nbases", K::Int, D::Int(5), "Synthetic field map basis count", positive),
    checked("niter", K::Int, D::Int(5), "Synthetic field map iterations", positive),
    field("GetBoldConfig", K::Bool, D::Bool(true), "Read sequence parameters from DICOM"),
    checked("skip", K::Int, D::Int(0), "Pre-steady-state frames", non_negative),
    field("normode", K::Bool, D::Bool(false), "Frame-to-frame intensity stabilization"),
    field("BiasField", K::Bool, D::Bool(true), "Intensity bias field correction"),
    field("useold", K::Bool, D::Bool(true), "Reuse existing t4 files"),
    checked("FCdir", K::Str, D::Str("FCmaps"), "Functional connectivity output folder", not_empty),
    checked("ncontig", K::Int, D::Int(3), "Contiguous frames for FD censoring", non_negative),
    checked("FDthresh", K::Float, D::Float(0.08), "FD censoring threshold (mm)", non_negative),
    checked("DVARthresh", K::Float, D::Unset, "DVARS censoring threshold; 0 uses autocrit", non_negative),
    checked("DVARsd", K::Float, D::Float(3.5), "DVARS autocrit standard deviations", positive),
    checked("DVARblur", K::Float, D::Float(10.0), "DVARS spatial smoothing (mm)", non_negative),
    field("bpss_params", K::StrList, D::StrList(&["-bl0.005", "-ol2", "-bh0.1", "-oh2"]), "bandpass_4dfp arguments"),
    checked("blur", K::Float, D::Float(1.4701), "gauss_4dfp lowpass frequency (1/cm)", non_negative),
    checked("lomotil", K::Int, D::Int(0), "Motion parameter to lowpass (0 = all)", motion_parameter),
    field("Atlas_ROIs", K::Bool, D::Bool(false), "Atlas subcortical ROIs for CIFTI"),
    checked("surfsmooth", K::Float, D::Float(1.7), "Surface smoothing (mm)", non_negative),
    checked("subcortsmooth", K::Float, D::Float(1.7), "Subcortical smoothing (mm)", non_negative),
    checked("CSF_excl_lim", K::Float, D::Float(0.15), "CSF exclusion limit", non_negative),
    checked("CSF_lcube", K::Int, D::Int(4), "CSF erosion cube", positive),
    checked("CSF_svdt", K::Float, D::Float(0.15), "CSF SVD threshold", non_negative),
    checked("WM_lcube", K::Int, D::Int(3), "WM erosion cube", positive),
    checked("WM_svdt", K::Float, D::Float(0.15), "WM SVD threshold", non_negative),
    checked("nRegress", K::Int, D::Int(20), "Nuisance regressor limit", positive),
    checked("min_frames", K::Int, D::Int(50), "Runs with this many frames or fewer are dropped", non_negative),
    field("ROIdir", K::Str, D::Str("$REFDIR/CanonicalROIsNP705"), "Seed ROI directory"),
    field("ROIimg", K::Str, D::Str("CanonicalROIsNP705_on_MNI152_2mm.4dfp.img"), "Seed ROI image"),
];

/// Per-subject structural params
pub static STRUCTURAL: &[ParamMetadata] = &[
    checked("patid", K::Str, D::Required, "Subject label", not_empty),
    checked("structid", K::Str, D::Required, "Structural output label", not_empty),
    checked("studydir", K::Path, D::Required, "Subject directory", not_empty),
    field("mprdirs", K::PathList, D::Required, "Selected T1w study folders or images"),
    field("t2wdirs", K::PathList, D::Required, "Selected T2w study folders or images"),
    checked("FSdir", K::Path, D::Required, "FreeSurfer subject directory", not_empty),
    checked("PostFSdir", K::Path, D::Required, "PostFreeSurfer output directory", not_empty),
];

/// Per-session functional params
pub static FUNCTIONAL: &[ParamMetadata] = &[
    checked("day1_patid", K::Str, D::Required, "Label of the session holding the anatomy", not_empty),
    checked("day1_path", K::Path, D::Required, "Atlas directory of that session", not_empty),
    checked("patid", K::Str, D::Required, "Session label", not_empty),
    field("mpr", K::Str, D::Required, "T1w image stem"),
    field("t2wimg", K::Str, D::Required, "T2w image stem"),
    checked("BOLDgrps", K::IntGroups, D::Required, "Run IDs grouped by shared field map", positive_run_ids),
    checked("runID", K::IntList, D::Required, "All run IDs", positive_run_ids),
    checked("FCrunID", K::IntList, D::Required, "Run IDs used for functional connectivity", positive_run_ids),
    field("sefm", K::StrGroups, D::Required, "Field map signature of each group"),
    checked("FSdir", K::Path, D::Required, "FreeSurfer subject directory", not_empty),
    checked("PostFSdir", K::Path, D::Required, "PostFreeSurfer output directory", not_empty),
    checked("maskdir", K::Path, D::Required, "Subcortical mask directory", not_empty),
];
