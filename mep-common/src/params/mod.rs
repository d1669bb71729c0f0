//! Pipeline parameter sets
//!
//! Three parameter sets are handed to the external shell pipeline:
//! project-wide instructions, per-subject structural params and per-session
//! functional params. Each set is described by an ordered static table of
//! [`ParamMetadata`]; one [`Params`] type holds values for any of them.
//!
//! # Architecture
//!
//! The metadata table is the single source of truth for:
//! - Field names and declaration order (which is also output order)
//! - Declared types (drives formatting and load-time type checks)
//! - Defaults, or whether the field is required
//! - Value validation
//!
//! # Usage
//!
//! ```rust
//! use mep_common::params::{Params, ParamsKind};
//!
//! let mut params = Params::new(ParamsKind::Instructions);
//! params.set("num_cpus", 4i64).unwrap();
//! let text = params.to_params_string().unwrap();
//! assert!(text.contains("set num_cpus = 4\n"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

mod format;
mod init;
mod metadata;
mod setters;
#[cfg(test)]
mod tests;

pub use format::format_value;
pub use metadata::{FUNCTIONAL, INSTRUCTIONS, STRUCTURAL};

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    Str,
    Path,
    StrList,
    PathList,
    IntList,
    StrGroups,
    IntGroups,
}

impl ParamKind {
    /// Type name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Str => "str",
            ParamKind::Path => "Path",
            ParamKind::StrList => "list[str]",
            ParamKind::PathList => "list[Path]",
            ParamKind::IntList => "list[int]",
            ParamKind::StrGroups => "list[list[str]]",
            ParamKind::IntGroups => "list[list[int]]",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Path(PathBuf),
    StrList(Vec<String>),
    PathList(Vec<PathBuf>),
    IntList(Vec<i64>),
    StrGroups(Vec<Vec<String>>),
    IntGroups(Vec<Vec<i64>>),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Str(_) => ParamKind::Str,
            ParamValue::Path(_) => ParamKind::Path,
            ParamValue::StrList(_) => ParamKind::StrList,
            ParamValue::PathList(_) => ParamKind::PathList,
            ParamValue::IntList(_) => ParamKind::IntList,
            ParamValue::StrGroups(_) => ParamKind::StrGroups,
            ParamValue::IntGroups(_) => ParamKind::IntGroups,
        }
    }

    /// Convert to `kind`, allowing string ↔ path conversions only
    ///
    /// Returns the value unchanged in `Err` when no conversion applies.
    pub fn coerce(self, kind: ParamKind) -> std::result::Result<ParamValue, ParamValue> {
        match (self, kind) {
            (v, k) if v.kind() == k => Ok(v),
            (ParamValue::Str(s), ParamKind::Path) => Ok(ParamValue::Path(PathBuf::from(s))),
            (ParamValue::Path(p), ParamKind::Str) => {
                Ok(ParamValue::Str(p.to_string_lossy().into_owned()))
            }
            (ParamValue::StrList(v), ParamKind::PathList) => {
                Ok(ParamValue::PathList(v.into_iter().map(PathBuf::from).collect()))
            }
            (ParamValue::PathList(v), ParamKind::StrList) => Ok(ParamValue::StrList(
                v.into_iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect(),
            )),
            (v, _) => Err(v),
        }
    }
}

/// Default for a parameter
///
/// Kept const-constructible so schema tables can be plain statics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    /// Must be supplied; loading fails without it
    Required,
    /// Optional with no value; omitted from output until set
    Unset,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
    StrList(&'static [&'static str]),
}

impl ParamDefault {
    /// Materialize the default as a value of `kind`
    pub fn to_value(&self, kind: ParamKind) -> Option<ParamValue> {
        let value = match *self {
            ParamDefault::Required | ParamDefault::Unset => return None,
            ParamDefault::Bool(b) => ParamValue::Bool(b),
            ParamDefault::Int(i) => ParamValue::Int(i),
            ParamDefault::Float(f) => ParamValue::Float(f),
            ParamDefault::Str(s) => ParamValue::Str(s.to_string()),
            ParamDefault::StrList(items) => {
                ParamValue::StrList(items.iter().map(|s| s.to_string()).collect())
            }
        };
        value.coerce(kind).ok()
    }

    pub fn is_required(&self) -> bool {
        matches!(self, ParamDefault::Required)
    }
}

/// Metadata for a single parameter
///
/// # Validator Signature
///
/// Validators receive a value already known to be of `kind` and return
/// `Err(reason)`; the caller attaches the field name.
pub struct ParamMetadata {
    pub key: &'static str,
    pub kind: ParamKind,
    pub default: ParamDefault,
    pub description: &'static str,
    pub validator: fn(&ParamValue) -> Result<(), String>,
}

/// Which parameter set a [`Params`] value holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamsKind {
    Instructions,
    Structural,
    Functional,
}

impl ParamsKind {
    pub fn metadata(&self) -> &'static [ParamMetadata] {
        match self {
            ParamsKind::Instructions => INSTRUCTIONS,
            ParamsKind::Structural => STRUCTURAL,
            ParamsKind::Functional => FUNCTIONAL,
        }
    }

    /// Conventional file stem the shell pipeline looks for
    pub fn file_stem(&self) -> &'static str {
        match self {
            ParamsKind::Instructions => "instructions",
            ParamsKind::Structural => "struct",
            ParamsKind::Functional => "func",
        }
    }
}

/// Values for one parameter set, index-aligned with its metadata table
///
/// `None` is the "unset" sentinel: the field is omitted on save.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    kind: ParamsKind,
    values: Vec<Option<ParamValue>>,
}

impl Params {
    /// New parameter set holding schema defaults; required fields start unset
    pub fn new(kind: ParamsKind) -> Self {
        let values = kind
            .metadata()
            .iter()
            .map(|meta| meta.default.to_value(meta.kind))
            .collect();
        Self { kind, values }
    }

    pub fn kind(&self) -> ParamsKind {
        self.kind
    }

    pub fn metadata(&self) -> &'static [ParamMetadata] {
        self.kind.metadata()
    }

    /// Iterate `(metadata, value)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&'static ParamMetadata, Option<&ParamValue>)> {
        self.kind
            .metadata()
            .iter()
            .zip(self.values.iter().map(Option::as_ref))
    }

    /// Keys of required fields that still have no value
    pub fn missing_required(&self) -> Vec<&'static str> {
        self.iter()
            .filter(|(meta, value)| meta.default.is_required() && value.is_none())
            .map(|(meta, _)| meta.key)
            .collect()
    }
}
