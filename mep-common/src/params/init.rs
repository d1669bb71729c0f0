//! Parameter loading from and saving to TOML
//!
//! Loading type-checks every declared field present in the input against
//! its declared kind. The input's type is inferred recursively: a list's
//! type comes from its first element, so `[[1, 2], [3]]` infers as
//! `list[list[int]]`. An empty list carries no element type and is accepted
//! for any list kind.

use super::setters::checked_value;
use super::{ParamKind, ParamMetadata, ParamValue, Params, ParamsKind};
use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Type of a TOML value as seen by the loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InferredType {
    Bool,
    Int,
    Float,
    Str,
    Datetime,
    Table,
    /// `None` for an empty list
    List(Option<Box<InferredType>>),
}

impl InferredType {
    pub(crate) fn of(value: &toml::Value) -> Self {
        match value {
            toml::Value::Boolean(_) => InferredType::Bool,
            toml::Value::Integer(_) => InferredType::Int,
            toml::Value::Float(_) => InferredType::Float,
            toml::Value::String(_) => InferredType::Str,
            toml::Value::Datetime(_) => InferredType::Datetime,
            toml::Value::Table(_) => InferredType::Table,
            toml::Value::Array(items) => {
                InferredType::List(items.first().map(|first| Box::new(Self::of(first))))
            }
        }
    }

    fn is_list_of(&self, element: &InferredType) -> bool {
        match self {
            InferredType::List(None) => true,
            InferredType::List(Some(inner)) => inner.as_ref() == element,
            _ => false,
        }
    }

    fn is_list_of_lists(&self, element: &InferredType) -> bool {
        match self {
            InferredType::List(None) => true,
            InferredType::List(Some(inner)) => inner.is_list_of(element),
            _ => false,
        }
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferredType::Bool => f.write_str("bool"),
            InferredType::Int => f.write_str("int"),
            InferredType::Float => f.write_str("float"),
            InferredType::Str => f.write_str("str"),
            InferredType::Datetime => f.write_str("datetime"),
            InferredType::Table => f.write_str("table"),
            InferredType::List(None) => f.write_str("list"),
            InferredType::List(Some(inner)) => write!(f, "list[{}]", inner),
        }
    }
}

impl ParamKind {
    /// Whether a loaded value of type `found` may populate this kind
    pub(crate) fn accepts(&self, found: &InferredType) -> bool {
        match self {
            ParamKind::Bool => *found == InferredType::Bool,
            ParamKind::Int => *found == InferredType::Int,
            ParamKind::Float => *found == InferredType::Float,
            ParamKind::Str | ParamKind::Path => *found == InferredType::Str,
            ParamKind::StrList | ParamKind::PathList => found.is_list_of(&InferredType::Str),
            ParamKind::IntList => found.is_list_of(&InferredType::Int),
            ParamKind::StrGroups => found.is_list_of_lists(&InferredType::Str),
            ParamKind::IntGroups => found.is_list_of_lists(&InferredType::Int),
        }
    }
}

/// Convert a type-checked TOML value into a parameter value
///
/// Lists are only checked on their first element, so a mixed list is caught
/// here as a mismatch.
fn from_toml(meta: &ParamMetadata, value: &toml::Value) -> Result<ParamValue> {
    let found = InferredType::of(value);
    let mismatch = || Error::TypeMismatch {
        field: meta.key.to_string(),
        expected: meta.kind.name().to_string(),
        found: found.to_string(),
    };

    if !meta.kind.accepts(&found) {
        return Err(mismatch());
    }

    let converted = match (meta.kind, value) {
        (ParamKind::Bool, toml::Value::Boolean(b)) => Some(ParamValue::Bool(*b)),
        (ParamKind::Int, toml::Value::Integer(i)) => Some(ParamValue::Int(*i)),
        (ParamKind::Float, toml::Value::Float(f)) => Some(ParamValue::Float(*f)),
        (ParamKind::Str, toml::Value::String(s)) => Some(ParamValue::Str(s.clone())),
        (ParamKind::Path, toml::Value::String(s)) => Some(ParamValue::Path(PathBuf::from(s))),
        (ParamKind::StrList, toml::Value::Array(items)) => {
            toml_strings(items).map(ParamValue::StrList)
        }
        (ParamKind::PathList, toml::Value::Array(items)) => toml_strings(items)
            .map(|v| ParamValue::PathList(v.into_iter().map(PathBuf::from).collect())),
        (ParamKind::IntList, toml::Value::Array(items)) => toml_ints(items).map(ParamValue::IntList),
        (ParamKind::StrGroups, toml::Value::Array(items)) => toml_groups(items).and_then(|groups| {
            groups
                .into_iter()
                .map(toml_strings)
                .collect::<Option<Vec<_>>>()
                .map(ParamValue::StrGroups)
        }),
        (ParamKind::IntGroups, toml::Value::Array(items)) => toml_groups(items).and_then(|groups| {
            groups
                .into_iter()
                .map(toml_ints)
                .collect::<Option<Vec<_>>>()
                .map(ParamValue::IntGroups)
        }),
        _ => None,
    };

    converted.ok_or_else(mismatch)
}

fn toml_strings(items: &[toml::Value]) -> Option<Vec<String>> {
    items.iter().map(|v| v.as_str().map(str::to_string)).collect()
}

fn toml_ints(items: &[toml::Value]) -> Option<Vec<i64>> {
    items.iter().map(toml::Value::as_integer).collect()
}

fn toml_groups(items: &[toml::Value]) -> Option<Vec<&[toml::Value]>> {
    items
        .iter()
        .map(|v| v.as_array().map(Vec::as_slice))
        .collect()
}

/// Convert a parameter value to TOML (paths become strings)
pub(crate) fn to_toml(value: &ParamValue) -> toml::Value {
    use toml::Value;

    let strings = |items: Vec<String>| Value::Array(items.into_iter().map(Value::String).collect());
    let ints = |items: &Vec<i64>| Value::Array(items.iter().copied().map(Value::Integer).collect());

    match value {
        ParamValue::Bool(b) => Value::Boolean(*b),
        ParamValue::Int(i) => Value::Integer(*i),
        ParamValue::Float(f) => Value::Float(*f),
        ParamValue::Str(s) => Value::String(s.clone()),
        ParamValue::Path(p) => Value::String(p.to_string_lossy().into_owned()),
        ParamValue::StrList(items) => strings(items.clone()),
        ParamValue::PathList(items) => strings(
            items
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        ),
        ParamValue::IntList(items) => ints(items),
        ParamValue::StrGroups(groups) => {
            Value::Array(groups.iter().map(|g| strings(g.clone())).collect())
        }
        ParamValue::IntGroups(groups) => Value::Array(groups.iter().map(|g| ints(g)).collect()),
    }
}

impl Params {
    /// Build a parameter set from a TOML table
    ///
    /// Every declared field present in `table` is type-checked; a declared
    /// field that is absent falls back to its default, or fails with
    /// `MissingField` when it has none. Keys the schema does not declare
    /// (retired fields from older files) are skipped with a warning.
    pub fn from_toml_table(kind: ParamsKind, table: &toml::Table) -> Result<Params> {
        let mut params = Params::new(kind);

        for key in table
            .keys()
            .filter(|k| !kind.metadata().iter().any(|m| m.key == k.as_str()))
        {
            warn!(field = %key, kind = ?kind, "Ignoring unknown field");
        }

        for (index, meta) in kind.metadata().iter().enumerate() {
            match table.get(meta.key) {
                Some(value) => {
                    let value = from_toml(meta, value)?;
                    params.values[index] = Some(checked_value(meta, value)?);
                }
                None if meta.default.is_required() => {
                    return Err(Error::MissingField {
                        field: meta.key.to_string(),
                    });
                }
                None => {}
            }
        }

        Ok(params)
    }

    /// Load a parameter set from a TOML file
    pub fn load_toml(kind: ParamsKind, path: &Path) -> Result<Params> {
        let content = std::fs::read_to_string(path)?;
        let table: toml::Table = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Error parsing toml file {}: {}", path.display(), e)))?;

        let params = Self::from_toml_table(kind, &table).map_err(|e| {
            warn!(path = %path.display(), "Rejected params file: {}", e);
            e
        })?;

        info!(path = %path.display(), kind = ?kind, "Loaded params from TOML");
        Ok(params)
    }

    /// Apply a partial override
    ///
    /// Only keys present in `table` change; each is type-checked like
    /// [`Params::from_toml_table`]. Nothing is modified if any key fails.
    pub fn merge_table(&mut self, table: &toml::Table) -> Result<()> {
        let mut staged = Vec::with_capacity(table.len());
        for (key, value) in table {
            let index = self.index_of(key)?;
            let meta = &self.metadata()[index];
            let value = checked_value(meta, from_toml(meta, value)?)?;
            staged.push((index, value));
        }

        for (index, value) in staged {
            debug!(field = self.metadata()[index].key, "Override applied");
            self.values[index] = Some(value);
        }
        Ok(())
    }

    /// Set values as a TOML table (unset fields omitted)
    pub fn to_toml_table(&self) -> toml::Table {
        self.iter()
            .filter_map(|(meta, value)| value.map(|v| (meta.key.to_string(), to_toml(v))))
            .collect()
    }

    /// Save set values to a TOML file, adding a `.toml` suffix when missing
    pub fn save_toml(&self, path: &Path) -> Result<PathBuf> {
        let path = if path.extension().map_or(false, |ext| ext == "toml") {
            path.to_path_buf()
        } else {
            path.with_extension("toml")
        };

        let content = toml::to_string(&self.to_toml_table())
            .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
