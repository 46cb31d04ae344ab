// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability checked against the permission rules of a doctype.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermType {
    Read,
    Write,
    Create,
    Submit,
    Cancel,
    Delete,
}

impl fmt::Display for PermType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermType::Read => "read",
            PermType::Write => "write",
            PermType::Create => "create",
            PermType::Submit => "submit",
            PermType::Cancel => "cancel",
            PermType::Delete => "delete",
        };
        write!(f, "{name}")
    }
}

/// Grants capabilities to a role at one permission level.
///
/// Rules at level 0 decide about document-level capabilities (create, submit, ...). Rules at
/// higher levels only decide which fields of that level a role may read or write.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermRule {
    pub role: String,
    #[serde(default)]
    pub permlevel: u8,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub submit: bool,
    #[serde(default)]
    pub cancel: bool,
    #[serde(default)]
    pub delete: bool,
}

impl PermRule {
    pub fn new(role: &str) -> Self {
        Self {
            role: role.to_owned(),
            ..Default::default()
        }
    }

    /// Rule granting every capability at level 0.
    pub fn full(role: &str) -> Self {
        Self::new(role)
            .allow(PermType::Read)
            .allow(PermType::Write)
            .allow(PermType::Create)
            .allow(PermType::Submit)
            .allow(PermType::Cancel)
            .allow(PermType::Delete)
    }

    pub fn at_level(mut self, permlevel: u8) -> Self {
        self.permlevel = permlevel;
        self
    }

    pub fn allow(mut self, ptype: PermType) -> Self {
        match ptype {
            PermType::Read => self.read = true,
            PermType::Write => self.write = true,
            PermType::Create => self.create = true,
            PermType::Submit => self.submit = true,
            PermType::Cancel => self.cancel = true,
            PermType::Delete => self.delete = true,
        }
        self
    }

    pub fn allows(&self, ptype: PermType) -> bool {
        match ptype {
            PermType::Read => self.read,
            PermType::Write => self.write,
            PermType::Create => self.create,
            PermType::Submit => self.submit,
            PermType::Cancel => self.cancel,
            PermType::Delete => self.delete,
        }
    }
}

/// Permission levels at which any of the given roles holds `ptype`.
pub fn permlevel_access<'a>(
    rules: impl IntoIterator<Item = &'a PermRule>,
    roles: &BTreeSet<String>,
    ptype: PermType,
) -> BTreeSet<u8> {
    rules
        .into_iter()
        .filter(|rule| roles.contains(&rule.role) && rule.allows(ptype))
        .map(|rule| rule.permlevel)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{PermRule, PermType, permlevel_access};

    #[test]
    fn collect_levels_for_roles() {
        let rules = [
            PermRule::full("Sales User"),
            PermRule::new("Sales User").at_level(1).allow(PermType::Read),
            PermRule::new("Sales Manager")
                .at_level(2)
                .allow(PermType::Read)
                .allow(PermType::Write),
        ];
        let roles = BTreeSet::from(["Sales User".to_string()]);

        assert_eq!(
            permlevel_access(&rules, &roles, PermType::Read),
            BTreeSet::from([0, 1])
        );
        assert_eq!(
            permlevel_access(&rules, &roles, PermType::Write),
            BTreeSet::from([0])
        );
    }
}
