//! Persisted Rules
//!
//! Reads an existing udev rules file back into stable-identifier →
//! symlink pairs, so a run can emit only what the file lacks.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

static SERIAL_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"ENV\{ID_SERIAL\}=="([^"\s]+)""#).expect("valid ID_SERIAL pattern"));
static DM_NAME_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"ENV\{DM_NAME\}=="([^"\s]+)""#).expect("valid DM_NAME pattern"));
static SYMLINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"SYMLINK\+="([^"\s]+)""#).expect("valid SYMLINK pattern"));

/// Stable identifier → symlink name, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistedRules {
    links: IndexMap<String, String>,
}

/// Pull the identifier and link out of one rule line
fn parse_rule_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }

    let key = SERIAL_KEY
        .captures(trimmed)
        .or_else(|| DM_NAME_KEY.captures(trimmed))?;
    let link = SYMLINK.captures(trimmed)?;

    Some((key[1].to_string(), link[1].to_string()))
}

impl PersistedRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse rules text; lines without both an identifier and a link are ignored
    pub fn parse(text: &str) -> Self {
        let mut links = IndexMap::new();
        for (lineno, line) in text.lines().enumerate() {
            match parse_rule_line(line) {
                Some((id, link)) => {
                    links.insert(id, link);
                }
                None if !line.trim().is_empty() && !line.trim_start().starts_with('#') => {
                    debug!("Ignoring rules line {}: {:?}", lineno + 1, line);
                }
                None => {}
            }
        }
        Self { links }
    }

    /// Load a rules file; a missing file is an empty rule set
    pub fn load_existing(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let rules = Self::parse(&text);
                info!("Loaded {} persisted rules from {}", rules.len(), path.display());
                Ok(rules)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No persisted rules at {}", path.display());
                Ok(Self::new())
            }
            Err(source) => Err(Error::RulesFile {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn contains(&self, stable_id: &str) -> bool {
        self.links.contains_key(stable_id)
    }

    pub fn link(&self, stable_id: &str) -> Option<&str> {
        self.links.get(stable_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.links.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
