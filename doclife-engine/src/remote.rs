// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manifest of document operations callable from outside.
use std::collections::{BTreeSet, HashMap};

use crate::error::DocumentError;

const DEFAULT_METHODS: [&str; 2] = ["submit", "cancel"];

/// Operations the HTTP layer may invoke on documents, per doctype.
#[derive(Clone, Debug)]
pub struct RemoteMethods {
    defaults: BTreeSet<String>,
    doctypes: HashMap<String, BTreeSet<String>>,
}

impl Default for RemoteMethods {
    fn default() -> Self {
        Self {
            defaults: DEFAULT_METHODS.iter().map(|method| (*method).to_owned()).collect(),
            doctypes: HashMap::new(),
        }
    }
}

impl RemoteMethods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow calling `method` on documents of `doctype`.
    pub fn register(&mut self, doctype: &str, method: &str) {
        self.doctypes
            .entry(doctype.to_owned())
            .or_default()
            .insert(method.to_owned());
    }

    pub fn is_allowed(&self, doctype: &str, method: &str) -> bool {
        self.defaults.contains(method)
            || self
                .doctypes
                .get(doctype)
                .is_some_and(|methods| methods.contains(method))
    }

    pub fn ensure_allowed(&self, doctype: &str, method: &str) -> Result<(), DocumentError> {
        if self.is_allowed(doctype, method) {
            return Ok(());
        }
        Err(DocumentError::UnknownMethod {
            doctype: doctype.to_owned(),
            method: method.to_owned(),
        })
    }

    /// All methods callable on documents of `doctype`, sorted.
    pub fn methods(&self, doctype: &str) -> Vec<String> {
        let mut methods = self.defaults.clone();
        if let Some(extra) = self.doctypes.get(doctype) {
            methods.extend(extra.iter().cloned());
        }
        methods.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::error::{DocumentError, ErrorKind};

    use super::RemoteMethods;

    #[test]
    fn explicit_manifest() {
        let mut remote = RemoteMethods::new();
        remote.register("Sales Order", "make_delivery_note");

        assert!(remote.is_allowed("Item", "submit"));
        assert!(remote.is_allowed("Sales Order", "make_delivery_note"));
        assert!(!remote.is_allowed("Item", "make_delivery_note"));
        assert_eq!(
            remote.methods("Sales Order"),
            vec!["cancel", "make_delivery_note", "submit"]
        );

        let err = remote.ensure_allowed("Item", "delete_everything").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DoesNotExist);
        assert_matches!(err, DocumentError::UnknownMethod { .. });
    }
}
