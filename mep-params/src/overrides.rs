//! Per-session override file
//!
//! ```toml
//! [sub01.vc1.config]
//! maskdir = "/data/masks/sub01"
//!
//! [sub01.vc1.mag]
//! 1 = ["study7"]
//! 2 = ["study12"]
//!
//! [sub01.vc1.phase]
//! 1 = ["study8"]
//! 2 = ["study13"]
//! ```
//!
//! `config` is merged into the session's functional params. `mag` and
//! `phase` replace the discovered run lists; relative entries are resolved
//! against the session directory.

use mep_common::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Overrides for one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOverride {
    pub config: toml::Table,
    pub mag: BTreeMap<u32, Vec<PathBuf>>,
    pub phase: BTreeMap<u32, Vec<PathBuf>>,
}

impl SessionOverride {
    /// Whether the run lists are overridden
    pub fn has_runs(&self) -> bool {
        !self.mag.is_empty() || !self.phase.is_empty()
    }

    /// Resolve relative run entries against `session_dir`
    pub fn resolve_paths(&mut self, session_dir: &Path) {
        for files in self.mag.values_mut().chain(self.phase.values_mut()) {
            for file in files.iter_mut() {
                if file.is_relative() {
                    *file = session_dir.join(&*file);
                }
            }
        }
    }
}

/// Parsed override file, `subject → session → table`
#[derive(Debug, Clone, Default)]
pub struct OverrideFile {
    root: toml::Table,
}

impl OverrideFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let root: toml::Table =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { root })
    }

    /// Overrides for one session; `None` when the file has no entry for it
    pub fn session(&self, subject: &str, session: &str) -> Result<Option<SessionOverride>> {
        let Some(table) = self
            .root
            .get(subject)
            .and_then(|s| s.as_table())
            .and_then(|s| s.get(session))
            .and_then(|s| s.as_table())
        else {
            return Ok(None);
        };

        let section = |name: &str| table.get(name).and_then(|v| v.as_table());
        let parsed = SessionOverride {
            config: section("config").cloned().unwrap_or_default(),
            mag: section("mag").map(run_lists).transpose()?.unwrap_or_default(),
            phase: section("phase").map(run_lists).transpose()?.unwrap_or_default(),
        };

        debug!(
            subject,
            session,
            config_keys = parsed.config.len(),
            runs = parsed.mag.len(),
            "Loaded session override"
        );
        Ok(Some(parsed))
    }
}

fn run_lists(table: &toml::Table) -> Result<BTreeMap<u32, Vec<PathBuf>>> {
    table
        .iter()
        .map(|(key, value)| {
            let id: u32 = key
                .parse()
                .map_err(|_| Error::Config(format!("Run key '{}' is not an integer", key)))?;

            let files = value
                .as_array()
                .and_then(|items| {
                    items
                        .iter()
                        .map(|v| v.as_str().map(PathBuf::from))
                        .collect::<Option<Vec<_>>>()
                })
                .ok_or_else(|| Error::Config(format!("Run {} must be a list of file names", key)))?;

            Ok((id, files))
        })
        .collect()
}
