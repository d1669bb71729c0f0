//! Shell `set NAME = VALUE` params format
//!
//! This is the format the pipeline's csh scripts `source`. Formatting rules:
//! - bool → `0` / `1`
//! - int, str, path → as-is
//! - float → shortest round-trip form, integral values keep a `.0`,
//!   exponents carry a sign and at least two digits (`1e-05`)
//! - list → `( a b c )`
//! - list of lists → `( a,b c,d )`
//!
//! Unset fields are not written at all.

use super::{ParamKind, ParamValue, Params, ParamsKind};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Render a value the way the shell scripts expect it
pub fn format_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        ParamValue::Int(i) => i.to_string(),
        ParamValue::Float(f) => format_float(*f),
        ParamValue::Str(s) => s.clone(),
        ParamValue::Path(p) => p.display().to_string(),
        ParamValue::StrList(items) => wrap(items.iter().map(String::as_str)),
        ParamValue::PathList(items) => {
            let items: Vec<String> = items.iter().map(|p| p.display().to_string()).collect();
            wrap(items.iter().map(String::as_str))
        }
        ParamValue::IntList(items) => {
            let items: Vec<String> = items.iter().map(i64::to_string).collect();
            wrap(items.iter().map(String::as_str))
        }
        ParamValue::StrGroups(groups) => {
            let items: Vec<String> = groups.iter().map(|g| g.join(",")).collect();
            wrap(items.iter().map(String::as_str))
        }
        ParamValue::IntGroups(groups) => {
            let items: Vec<String> = groups
                .iter()
                .map(|g| {
                    g.iter()
                        .map(i64::to_string)
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .collect();
            wrap(items.iter().map(String::as_str))
        }
    }
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    // Debug keeps a trailing ".0" on integral values (10.0, not 10) and
    // switches to exponent form outside [1e-4, 1e16)
    let debug = format!("{:?}", value);
    match debug.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => debug,
    }
}

fn wrap<'a>(items: impl Iterator<Item = &'a str>) -> String {
    format!("( {} )", items.collect::<Vec<_>>().join(" "))
}

impl Params {
    /// Render the whole set, one `set` line per field that has a value
    ///
    /// Fails if a required field has not been given a value.
    pub fn to_params_string(&self) -> Result<String> {
        if let Some(field) = self.missing_required().first() {
            return Err(Error::MissingField {
                field: field.to_string(),
            });
        }

        let mut out = String::new();
        for (meta, value) in self.iter() {
            if let Some(value) = value {
                out.push_str(&format!("set {} = {}\n", meta.key, format_value(value)));
            }
        }
        Ok(out)
    }

    /// Write the params file to `path`
    pub fn save_params(&self, path: &Path) -> Result<()> {
        let text = self.to_params_string()?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), kind = ?self.kind, "Wrote params file");
        Ok(())
    }

    /// Parse params text produced by [`Params::to_params_string`]
    ///
    /// Fields missing from the text keep their schema default. Blank lines
    /// and `#` comments are ignored.
    pub fn parse_params(kind: ParamsKind, text: &str) -> Result<Params> {
        let mut params = Params::new(kind);

        for (number, line) in text.lines().enumerate() {
            let line_no = number + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let rest = line.strip_prefix("set ").ok_or_else(|| Error::ParamsSyntax {
                line: line_no,
                reason: "expected 'set NAME = VALUE'".to_string(),
            })?;
            let (name, raw) = rest.split_once('=').ok_or_else(|| Error::ParamsSyntax {
                line: line_no,
                reason: "missing '='".to_string(),
            })?;
            let name = name.trim();

            let index = params.index_of(name)?;
            let kind = params.metadata()[index].kind;
            let value = parse_value(kind, raw.trim()).map_err(|reason| Error::ParamsSyntax {
                line: line_no,
                reason: format!("{}: {}", name, reason),
            })?;
            params.set(name, value)?;
        }

        Ok(params)
    }

    /// Read and parse a params file
    pub fn load_params(kind: ParamsKind, path: &Path) -> Result<Params> {
        let text = std::fs::read_to_string(path)?;
        Self::parse_params(kind, &text)
    }
}

fn parse_value(kind: ParamKind, raw: &str) -> std::result::Result<ParamValue, String> {
    let value = match kind {
        ParamKind::Bool => match raw {
            "0" => ParamValue::Bool(false),
            "1" => ParamValue::Bool(true),
            other => return Err(format!("'{}' is not 0 or 1", other)),
        },
        ParamKind::Int => ParamValue::Int(parse_int(raw)?),
        ParamKind::Float => ParamValue::Float(
            raw.parse()
                .map_err(|_| format!("'{}' is not a float", raw))?,
        ),
        ParamKind::Str => ParamValue::Str(raw.to_string()),
        ParamKind::Path => ParamValue::Path(PathBuf::from(raw)),
        ParamKind::StrList => {
            ParamValue::StrList(unwrap_list(raw)?.map(str::to_string).collect())
        }
        ParamKind::PathList => {
            ParamValue::PathList(unwrap_list(raw)?.map(PathBuf::from).collect())
        }
        ParamKind::IntList => ParamValue::IntList(
            unwrap_list(raw)?
                .map(parse_int)
                .collect::<std::result::Result<_, _>>()?,
        ),
        ParamKind::StrGroups => ParamValue::StrGroups(
            unwrap_list(raw)?
                .map(|group| group.split(',').map(str::to_string).collect())
                .collect(),
        ),
        ParamKind::IntGroups => ParamValue::IntGroups(
            unwrap_list(raw)?
                .map(|group| {
                    group
                        .split(',')
                        .map(parse_int)
                        .collect::<std::result::Result<Vec<i64>, String>>()
                })
                .collect::<std::result::Result<_, _>>()?,
        ),
    };
    Ok(value)
}

fn parse_int(raw: &str) -> std::result::Result<i64, String> {
    raw.parse().map_err(|_| format!("'{}' is not an integer", raw))
}

fn unwrap_list(raw: &str) -> std::result::Result<std::str::SplitWhitespace<'_>, String> {
    let inner = raw
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| format!("'{}' is not a ( ... ) list", raw))?;
    Ok(inner.split_whitespace())
}
