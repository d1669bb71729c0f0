//! Scan classification by image-type tags and description text
//!
//! Two kinds of matching are combined here:
//! - Tag patterns: a pattern is a set of required ImageType tags; `"*"`
//!   matches anything. An ordered list of patterns is a priority list.
//! - Text patterns: unanchored regexes searched in a series/protocol
//!   description, used to decide modality before tags are looked at.

use mep_common::{Error, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::PathBuf;
use tracing::debug;

/// Pattern element that matches any tag set
pub const WILDCARD: &str = "*";

/// Structural quality priority: normalized multi-echo mean, multi-echo
/// mean, normalized, anything
pub const STRUCTURAL_PRIORITY: &[&[&str]] = &[&["NORM", "MEAN"], &["MEAN"], &["NORM"], &[WILDCARD]];

/// Multi-echo BOLD magnitude tags, besides the echo tag
pub const FUNC_MAG_TAGS: &[&str] = &["ORIGINAL", "PRIMARY", "M", "MB", "NORM", "ND", "MOSAIC"];

/// Multi-echo BOLD phase tags, besides the echo tag
pub const FUNC_PHASE_TAGS: &[&str] = &["ORIGINAL", "PRIMARY", "P", "MB", "ND", "MOSAIC"];

/// Highest echo number recognized in `TE{n}` tags
pub const MAX_ECHOES: u32 = 8;

/// Spin-echo / gradient-echo field map tags
pub const FIELDMAP_TAGS: &[&str] = &["ORIGINAL", "PRIMARY", "M", "ND", "MOSAIC"];

/// Resting-state protocol names
pub const REST_PROTOCOLS: &[&str] = &["BOLD_NORDIC", "rest_ep2d_bold_ME"];

/// Task protocol names
pub const TASK_PROTOCOLS: &[&str] = &["VoiceHCPTask"];

/// Field maps with anterior-posterior phase encoding
pub const AP_FIELDMAPS: &[&str] = &["SpinEchoFieldMap_AP", "GEFieldMap_AP_forME"];

/// Field maps with posterior-anterior phase encoding
pub const PA_FIELDMAPS: &[&str] = &["SpinEchoFieldMap_PA", "GEFieldMap_PA_forME"];

/// Single-band reference scans are never classified
pub const SBREF_MARKER: &str = "SBRef";

/// Test a tag pattern against a tag set
///
/// True when the pattern holds the wildcard, or every pattern element is
/// present in `tags`. Order and duplicates do not matter.
pub fn matches<S: AsRef<str>>(pattern: &[&str], tags: &[S]) -> bool {
    if pattern.contains(&WILDCARD) {
        return true;
    }
    pattern
        .iter()
        .all(|required| tags.iter().any(|tag| tag.as_ref() == *required))
}

/// True when `tags` carries a `TE1`..`TE8` echo tag
pub fn has_echo_tag<S: AsRef<str>>(tags: &[S]) -> bool {
    (1..=MAX_ECHOES).any(|echo| {
        let echo_tag = format!("TE{}", echo);
        tags.iter().any(|tag| tag.as_ref() == echo_tag)
    })
}

/// A path with the tags read from its representative file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub tags: Vec<String>,
}

impl Candidate {
    pub fn new(path: impl Into<PathBuf>, tags: Vec<String>) -> Self {
        Self {
            path: path.into(),
            tags,
        }
    }
}

/// Greedy priority selection
///
/// Walks `patterns` in order and returns every candidate matching the first
/// pattern that matches anything, in candidate order. Lower-priority patterns
/// are never consulted once a match is found. No match at all gives an empty
/// list.
pub fn select_best(patterns: &[&[&str]], candidates: &[Candidate]) -> Vec<PathBuf> {
    for (level, pattern) in patterns.iter().enumerate() {
        let selected: Vec<PathBuf> = candidates
            .iter()
            .filter(|c| matches(pattern, &c.tags))
            .map(|c| c.path.clone())
            .collect();

        if !selected.is_empty() {
            debug!(
                level,
                pattern = ?pattern,
                selected = selected.len(),
                "Priority pattern matched"
            );
            return selected;
        }
    }
    Vec::new()
}

/// True when any regex finds a match anywhere in `text`
pub fn regex_match_any(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

/// Modality classifier on description text
///
/// Matches when any include pattern matches and no exclude pattern does.
/// Exclusions stand in for look-behind, e.g. "T1w not ending in setter".
#[derive(Debug, Clone)]
pub struct ModalityMatcher {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

static T1W: OnceCell<ModalityMatcher> = OnceCell::new();
static T2W: OnceCell<ModalityMatcher> = OnceCell::new();

impl ModalityMatcher {
    pub fn new(include: &[&str], exclude: &[&str]) -> Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// T1-weighted, excluding the calibration "setter" series
    pub fn t1w() -> Result<&'static ModalityMatcher> {
        T1W.get_or_try_init(|| Self::new(&["T1w"], &["setter$"]))
    }

    /// T2-weighted, excluding the calibration "setter" series
    pub fn t2w() -> Result<&'static ModalityMatcher> {
        T2W.get_or_try_init(|| Self::new(&["T2w"], &["setter$"]))
    }

    /// Substring matcher over literal names (regex metacharacters escaped)
    pub fn literal(names: &[&str]) -> Result<Self> {
        let escaped: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
        let escaped: Vec<&str> = escaped.iter().map(String::as_str).collect();
        Self::new(&escaped, &[])
    }

    pub fn is_match(&self, text: &str) -> bool {
        regex_match_any(&self.include, text) && !regex_match_any(&self.exclude, text)
    }
}

fn compile(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| Error::Config(format!("Invalid pattern '{}': {}", p, e))))
        .collect()
}

/// What a series is, judged from its description and tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanClass {
    /// Multi-echo BOLD magnitude, with its task label
    BoldMag(&'static str),
    /// Multi-echo BOLD phase, with its task label
    BoldPhase(&'static str),
    FieldMapAp,
    FieldMapPa,
    /// Single-band reference or anything else not used for grouping
    Other,
}

/// Classify a functional-side series
///
/// `text` is the series description (or protocol name). Resting-state runs
/// get the task label `rest`; the VoiceHCP task gets `VoiceHCP`.
pub fn classify_series<S: AsRef<str>>(text: &str, tags: &[S]) -> ScanClass {
    if text.contains(SBREF_MARKER) {
        return ScanClass::Other;
    }

    let task = if REST_PROTOCOLS.iter().any(|p| text.contains(p)) {
        Some("rest")
    } else if TASK_PROTOCOLS.iter().any(|p| text.contains(p)) {
        Some("VoiceHCP")
    } else {
        None
    };

    if let Some(task) = task {
        if !has_echo_tag(tags) {
            return ScanClass::Other;
        }
        if matches(FUNC_MAG_TAGS, tags) {
            return ScanClass::BoldMag(task);
        }
        if matches(FUNC_PHASE_TAGS, tags) {
            return ScanClass::BoldPhase(task);
        }
        return ScanClass::Other;
    }

    if matches(FIELDMAP_TAGS, tags) {
        if AP_FIELDMAPS.iter().any(|p| text.contains(p)) {
            return ScanClass::FieldMapAp;
        }
        if PA_FIELDMAPS.iter().any(|p| text.contains(p)) {
            return ScanClass::FieldMapPa;
        }
    }
    ScanClass::Other
}
