//! Group and vehicle-type filter deciding which contacts a behavior acts on.
//!
//! Names are case-insensitive. A name may not be on both the match and the
//! ignore list of the same kind.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactFilter {
    match_groups: BTreeSet<String>,
    ignore_groups: BTreeSet<String>,
    match_types: BTreeSet<String>,
    ignore_types: BTreeSet<String>,
    /// Contacts with an empty group or type fail any ignore list
    strict_ignore: bool,
}

/// Split `"a,b"` or `"{a,b}"` into lowercase names
fn parse_names(list: &str) -> Vec<String> {
    list.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Add every name in `list` to `target` unless `opposite` holds it. Names
/// that do not conflict are added even when others are refused.
fn add_names(
    param: &str,
    list: &str,
    target: &mut BTreeSet<String>,
    opposite: &BTreeSet<String>,
) -> Result<(), ConfigError> {
    let names = parse_names(list);
    if names.is_empty() {
        return Err(ConfigError::invalid(param, list, "empty name list"));
    }
    let mut refused = false;
    for name in names {
        if opposite.contains(&name) {
            refused = true;
        } else {
            target.insert(name);
        }
    }
    if refused {
        return Err(ConfigError::invalid(param, list, "name already on the opposite list"));
    }
    Ok(())
}

fn passes(value: &str, matches: &BTreeSet<String>, ignores: &BTreeSet<String>, strict: bool) -> bool {
    let value = value.trim().to_lowercase();
    if !matches.is_empty() && !matches.contains(&value) {
        return false;
    }
    if !ignores.is_empty() {
        if strict && value.is_empty() {
            return false;
        }
        if ignores.contains(&value) {
            return false;
        }
    }
    true
}

impl ContactFilter {
    pub fn add_match_group(&mut self, list: &str) -> Result<(), ConfigError> {
        add_names("match_group", list, &mut self.match_groups, &self.ignore_groups)
    }

    pub fn add_ignore_group(&mut self, list: &str) -> Result<(), ConfigError> {
        add_names("ignore_group", list, &mut self.ignore_groups, &self.match_groups)
    }

    pub fn add_match_type(&mut self, list: &str) -> Result<(), ConfigError> {
        add_names("match_type", list, &mut self.match_types, &self.ignore_types)
    }

    pub fn add_ignore_type(&mut self, list: &str) -> Result<(), ConfigError> {
        add_names("ignore_type", list, &mut self.ignore_types, &self.match_types)
    }

    pub fn set_strict_ignore(&mut self, strict: bool) {
        self.strict_ignore = strict;
    }

    pub fn is_empty(&self) -> bool {
        self.match_groups.is_empty()
            && self.ignore_groups.is_empty()
            && self.match_types.is_empty()
            && self.ignore_types.is_empty()
    }

    /// True if a contact with this group and vehicle type passes
    pub fn check(&self, group: &str, vtype: &str) -> bool {
        passes(group, &self.match_groups, &self.ignore_groups, self.strict_ignore)
            && passes(vtype, &self.match_types, &self.ignore_types, self.strict_ignore)
    }

    /// One-line description, empty when nothing is filtered
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        let lists = [
            ("match_group", &self.match_groups),
            ("ignore_group", &self.ignore_groups),
            ("match_type", &self.match_types),
            ("ignore_type", &self.ignore_types),
        ];
        for (key, set) in lists {
            if !set.is_empty() {
                let names: Vec<&str> = set.iter().map(String::as_str).collect();
                parts.push(format!("{}={}", key, names.join(":")));
            }
        }
        parts.join(", ")
    }
}
