// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document-level capabilities and field permission levels.
use std::collections::BTreeSet;

use doclife_core::schema::permlevel_access;
use doclife_core::{DocTypeMeta, Document, FieldDef, MetaProvider, PermType, Value};
use tracing::trace;

use crate::config::Config;
use crate::context::{Actor, Context};
use crate::error::DocumentError;

pub(crate) fn is_administrator(config: &Config, actor: &Actor) -> bool {
    actor.user == config.administrator
}

/// Returns `true` if the actor holds `ptype` on documents of this doctype.
///
/// Only rules at permission level 0 grant document-level capabilities.
pub fn has_permission(config: &Config, meta: &DocTypeMeta, actor: &Actor, ptype: PermType) -> bool {
    if is_administrator(config, actor) {
        return true;
    }
    meta.permissions
        .iter()
        .any(|rule| rule.permlevel == 0 && actor.has_role(&rule.role) && rule.allows(ptype))
}

pub(crate) fn check_permission(
    config: &Config,
    ctx: &Context,
    meta: &DocTypeMeta,
    name: &str,
    ptype: PermType,
) -> Result<(), DocumentError> {
    if ctx.flags.ignore_permissions || has_permission(config, meta, &ctx.actor, ptype) {
        return Ok(());
    }
    Err(DocumentError::Permission {
        ptype,
        doctype: meta.name.clone(),
        name: name.to_owned(),
    })
}

/// Permission levels an actor can access for one capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelAccess {
    levels: Option<BTreeSet<u8>>,
}

impl LevelAccess {
    pub fn unrestricted() -> Self {
        Self { levels: None }
    }

    pub fn new(config: &Config, meta: &DocTypeMeta, actor: &Actor, ptype: PermType) -> Self {
        if is_administrator(config, actor) {
            return Self::unrestricted();
        }
        Self {
            levels: Some(permlevel_access(&meta.permissions, &actor.roles, ptype)),
        }
    }

    /// Level 0 is governed by the document-level capability and always passes here.
    pub fn allows(&self, permlevel: u8) -> bool {
        permlevel == 0
            || self
                .levels
                .as_ref()
                .is_none_or(|levels| levels.contains(&permlevel))
    }
}

fn reset_field(doc: &mut Document, before: Option<&Document>, field: &FieldDef) {
    let value = match before {
        Some(before) => before.value(&field.fieldname),
        None => field.default.clone().unwrap_or_default(),
    };
    if doc.value(&field.fieldname) != value {
        trace!(
            doctype = %doc.doctype,
            field = %field.fieldname,
            permlevel = field.permlevel,
            "reset field without write access"
        );
        doc.set(&field.fieldname, value);
    }
}

/// Tables of an inaccessible level keep their stored rows, new documents start without rows.
fn reset_table(doc: &mut Document, before: Option<&Document>, table: &FieldDef) {
    let rows = before
        .map(|before| before.table(&table.fieldname).to_vec())
        .unwrap_or_default();
    if !doc.has_table(&table.fieldname) && rows.is_empty() {
        return;
    }
    if doc.table(&table.fieldname) != rows.as_slice() {
        trace!(
            doctype = %doc.doctype,
            table = %table.fieldname,
            permlevel = table.permlevel,
            "reset table without write access"
        );
    }
    doc.set_table(&table.fieldname, rows);
}

/// Reset every field of a permission level the actor can not write back to its stored value, or
/// its default for new documents.
///
/// Tables are reset as a whole when their own level is inaccessible. Child rows are checked
/// against the rules of their parent doctype and matched with their stored version by name.
pub(crate) fn reset_inaccessible_fields<P>(
    provider: &P,
    meta: &DocTypeMeta,
    access: &LevelAccess,
    doc: &mut Document,
    before: Option<&Document>,
) where
    P: MetaProvider + ?Sized,
{
    for field in meta
        .high_permlevel_fields()
        .filter(|field| !field.is_table() && !access.allows(field.permlevel))
    {
        reset_field(doc, before, field);
    }

    for table in meta.table_fields() {
        if !access.allows(table.permlevel) {
            reset_table(doc, before, table);
            continue;
        }

        let Some(child_meta) = table
            .options
            .as_deref()
            .and_then(|doctype| provider.get_meta(doctype))
        else {
            continue;
        };
        let fields: Vec<&FieldDef> = child_meta
            .high_permlevel_fields()
            .filter(|field| !access.allows(field.permlevel))
            .collect();
        if fields.is_empty() || !doc.has_table(&table.fieldname) {
            continue;
        }

        let previous = before
            .map(|before| before.table(&table.fieldname))
            .unwrap_or_default();
        for row in doc.table_mut(&table.fieldname) {
            let stored = row
                .name
                .as_deref()
                .and_then(|name| previous.iter().find(|candidate| candidate.name() == name));
            for field in &fields {
                reset_field(row, stored, field);
            }
        }
    }
}

/// Set every field of a permission level the actor can not read to `Null`.
pub(crate) fn mask_unreadable_fields<P>(
    provider: &P,
    meta: &DocTypeMeta,
    access: &LevelAccess,
    doc: &mut Document,
) where
    P: MetaProvider + ?Sized,
{
    for field in meta.high_permlevel_fields() {
        if !access.allows(field.permlevel) {
            doc.set(&field.fieldname, Value::Null);
        }
    }

    for table in meta.table_fields() {
        let Some(child_meta) = table
            .options
            .as_deref()
            .and_then(|doctype| provider.get_meta(doctype))
        else {
            continue;
        };
        if !doc.has_table(&table.fieldname) {
            continue;
        }
        if !access.allows(table.permlevel) {
            doc.set_table(&table.fieldname, Vec::new());
            continue;
        }
        for row in doc.table_mut(&table.fieldname) {
            for field in child_meta.high_permlevel_fields() {
                if !access.allows(field.permlevel) {
                    row.set(&field.fieldname, Value::Null);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use doclife_core::test_utils::{
        SALES_MANAGER, SALES_USER, STOCK_MANAGER, STOCK_USER, fixture_provider, item, sales_order,
    };
    use doclife_core::{Document, PermType, Value};

    use crate::config::Config;
    use crate::context::Actor;

    use super::{LevelAccess, has_permission, mask_unreadable_fields, reset_inaccessible_fields};

    #[test]
    fn document_capabilities() {
        let config = Config::default();
        let meta = item();

        let sales = Actor::new("sam", [SALES_USER]);
        assert!(has_permission(&config, &meta, &sales, PermType::Read));
        assert!(!has_permission(&config, &meta, &sales, PermType::Write));

        let admin = Actor::new("Administrator", []);
        assert!(has_permission(&config, &meta, &admin, PermType::Delete));
    }

    #[test]
    fn reset_and_mask_levels() {
        let config = Config::default();
        let provider = fixture_provider();
        let meta = item();

        let mut stored = Document::new("Item");
        stored.set("item_code", "WIDGET-1").set("valuation_rate", 10.0);

        let mut changed = stored.clone();
        changed.set("valuation_rate", 99.0).set("item_name", "Widget");

        let user = Actor::new("una", [STOCK_USER]);
        let access = LevelAccess::new(&config, &meta, &user, PermType::Write);
        assert!(!access.allows(1));

        let mut doc = changed.clone();
        reset_inaccessible_fields(&provider, &meta, &access, &mut doc, Some(&stored));
        assert_eq!(doc.value("valuation_rate"), Value::Float(10.0));
        assert_eq!(doc.value("item_name"), Value::from("Widget"));

        let manager = Actor::new("max", [STOCK_MANAGER]);
        let access = LevelAccess::new(&config, &meta, &manager, PermType::Write);
        let mut doc = changed.clone();
        reset_inaccessible_fields(&provider, &meta, &access, &mut doc, Some(&stored));
        assert_eq!(doc.value("valuation_rate"), Value::Float(99.0));

        let access = LevelAccess::new(&config, &meta, &user, PermType::Read);
        let mut doc = changed;
        mask_unreadable_fields(&provider, &meta, &access, &mut doc);
        assert_eq!(doc.value("valuation_rate"), Value::Null);
        assert_eq!(doc.value("item_code"), Value::from("WIDGET-1"));
    }

    #[test]
    fn reset_tables_of_inaccessible_levels() {
        let config = Config::default();
        let provider = fixture_provider();
        let meta = sales_order();

        let mut stored = Document::new("Sales Order");
        stored
            .append("sales_team", Document::new("Sales Team"))
            .set("sales_person", "mia");
        let mut changed = stored.clone();
        changed
            .append("sales_team", Document::new("Sales Team"))
            .set("sales_person", "sam");

        let user = Actor::new("sam", [SALES_USER]);
        let access = LevelAccess::new(&config, &meta, &user, PermType::Write);
        assert!(!access.allows(2));

        let mut doc = changed.clone();
        reset_inaccessible_fields(&provider, &meta, &access, &mut doc, Some(&stored));
        assert_eq!(doc.table("sales_team"), stored.table("sales_team"));

        // New documents start without rows.
        let mut doc = changed.clone();
        reset_inaccessible_fields(&provider, &meta, &access, &mut doc, None);
        assert!(doc.table("sales_team").is_empty());

        let manager = Actor::new("mia", [SALES_USER, SALES_MANAGER]);
        let access = LevelAccess::new(&config, &meta, &manager, PermType::Write);
        let mut doc = changed.clone();
        reset_inaccessible_fields(&provider, &meta, &access, &mut doc, Some(&stored));
        assert_eq!(doc.table("sales_team").len(), 2);
    }
}
