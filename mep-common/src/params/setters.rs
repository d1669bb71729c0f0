//! Parameter access with metadata-based validation
//!
//! All writes go through [`Params::set`], which checks the declared type and
//! runs the field's validator before storing anything.

use super::{ParamMetadata, ParamValue, Params};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

impl Params {
    /// Position of `key` in the schema
    pub(crate) fn index_of(&self, key: &str) -> Result<usize> {
        self.metadata()
            .iter()
            .position(|m| m.key == key)
            .ok_or_else(|| Error::UnknownField {
                field: key.to_string(),
            })
    }

    /// Metadata for `key`
    pub fn field(&self, key: &str) -> Result<&'static ParamMetadata> {
        let index = self.index_of(key)?;
        Ok(&self.metadata()[index])
    }

    /// Validate and store a value
    ///
    /// Strings are accepted for path fields (and vice versa); any other kind
    /// difference is a type error. On error the previous value is kept.
    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) -> Result<()> {
        let index = self.index_of(key)?;
        let meta = &self.metadata()[index];
        let value = checked_value(meta, value.into())?;
        self.values[index] = Some(value);
        Ok(())
    }

    /// Reset a field to the "unset" sentinel
    pub fn unset(&mut self, key: &str) -> Result<()> {
        let index = self.index_of(key)?;
        self.values[index] = None;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        let index = self.index_of(key).ok()?;
        self.values[index].as_ref()
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            ParamValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_path(&self, key: &str) -> Option<&Path> {
        match self.get(key)? {
            ParamValue::Path(p) => Some(p.as_path()),
            _ => None,
        }
    }

    pub fn get_int_groups(&self, key: &str) -> Option<&[Vec<i64>]> {
        match self.get(key)? {
            ParamValue::IntGroups(groups) => Some(groups.as_slice()),
            _ => None,
        }
    }
}

/// Coerce to the declared kind and run the field validator
pub(crate) fn checked_value(meta: &ParamMetadata, value: ParamValue) -> Result<ParamValue> {
    let value = value.coerce(meta.kind).map_err(|v| Error::TypeMismatch {
        field: meta.key.to_string(),
        expected: meta.kind.name().to_string(),
        found: v.kind().name().to_string(),
    })?;

    (meta.validator)(&value).map_err(|reason| Error::InvalidValue {
        field: meta.key.to_string(),
        reason,
    })?;

    Ok(value)
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<PathBuf> for ParamValue {
    fn from(v: PathBuf) -> Self {
        ParamValue::Path(v)
    }
}

impl From<&Path> for ParamValue {
    fn from(v: &Path) -> Self {
        ParamValue::Path(v.to_path_buf())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::StrList(v)
    }
}

impl From<Vec<PathBuf>> for ParamValue {
    fn from(v: Vec<PathBuf>) -> Self {
        ParamValue::PathList(v)
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        ParamValue::IntList(v)
    }
}

impl From<Vec<Vec<String>>> for ParamValue {
    fn from(v: Vec<Vec<String>>) -> Self {
        ParamValue::StrGroups(v)
    }
}

impl From<Vec<Vec<i64>>> for ParamValue {
    fn from(v: Vec<Vec<i64>>) -> Self {
        ParamValue::IntGroups(v)
    }
}
