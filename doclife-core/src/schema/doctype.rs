// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::schema::{FieldDef, FieldType, PermRule, WorkflowDef};

/// Strategy resolving the name of a new document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Autoname {
    /// Random hexadecimal name.
    #[default]
    Hash,

    /// Name is taken from the value of the given field.
    Field(String),

    /// Name is taken from a series pattern like `SO-.####`.
    Series(String),

    /// Name must be supplied by the caller.
    Prompt,
}

impl Autoname {
    /// Parse the textual autoname rule used in doctype definitions.
    ///
    /// Recognised forms are `hash`, `prompt`, `field:<fieldname>` and series patterns which
    /// contain a `.#` placeholder, everything else falls back to `Hash`.
    pub fn parse(rule: &str) -> Self {
        let rule = rule.trim();
        if let Some(fieldname) = rule.strip_prefix("field:") {
            return Autoname::Field(fieldname.trim().to_owned());
        }
        if rule.eq_ignore_ascii_case("prompt") {
            return Autoname::Prompt;
        }
        if rule.contains(".#") {
            return Autoname::Series(rule.to_owned());
        }
        Autoname::Hash
    }
}

/// Schema of a doctype: fields, child tables, permission rules and lifecycle flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocTypeMeta {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub permissions: Vec<PermRule>,
    #[serde(default)]
    pub autoname: Autoname,
    #[serde(default)]
    pub is_single: bool,
    #[serde(default)]
    pub is_table: bool,
    #[serde(default)]
    pub is_submittable: bool,
    #[serde(default)]
    pub track_changes: bool,
    #[serde(default)]
    pub title_field: Option<String>,
    #[serde(default)]
    pub workflow: Option<WorkflowDef>,
}

impl DocTypeMeta {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            fields: Vec::new(),
            permissions: Vec::new(),
            autoname: Autoname::Hash,
            is_single: false,
            is_table: false,
            is_submittable: false,
            track_changes: false,
            title_field: None,
            workflow: None,
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_permission(mut self, rule: PermRule) -> Self {
        self.permissions.push(rule);
        self
    }

    pub fn with_autoname(mut self, autoname: Autoname) -> Self {
        self.autoname = autoname;
        self
    }

    pub fn with_title_field(mut self, fieldname: &str) -> Self {
        self.title_field = Some(fieldname.to_owned());
        self
    }

    pub fn with_workflow(mut self, workflow: WorkflowDef) -> Self {
        self.workflow = Some(workflow);
        self
    }

    pub fn single(mut self) -> Self {
        self.is_single = true;
        self
    }

    pub fn child_table(mut self) -> Self {
        self.is_table = true;
        self
    }

    pub fn submittable(mut self) -> Self {
        self.is_submittable = true;
        self
    }

    pub fn tracked(mut self) -> Self {
        self.track_changes = true;
        self
    }

    pub fn get_field(&self, fieldname: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|field| field.fieldname == fieldname)
    }

    pub fn has_field(&self, fieldname: &str) -> bool {
        self.get_field(fieldname).is_some()
    }

    /// Fields holding child rows.
    pub fn table_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|field| field.is_table())
    }

    /// All fields which are not child tables.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|field| !field.is_table())
    }

    /// Static and dynamic link fields.
    pub fn link_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|field| field.fieldtype.is_link())
    }

    /// Fields with a permission level above 0.
    pub fn high_permlevel_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|field| field.permlevel > 0)
    }

    pub fn set_only_once_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|field| field.set_only_once)
    }

    pub fn global_search_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields
            .iter()
            .filter(|field| field.in_global_search && !field.is_table())
    }

    /// Field holding the title of a document, falls back to a field named `title`.
    pub fn title_field(&self) -> Option<&FieldDef> {
        match &self.title_field {
            Some(fieldname) => self.get_field(fieldname),
            None => self.get_field("title"),
        }
    }

    /// Returns `true` if any `Dynamic Link` field exists, the target doctype is then read from
    /// another field of the same document.
    pub fn has_dynamic_links(&self) -> bool {
        self.fields
            .iter()
            .any(|field| matches!(field.fieldtype, FieldType::DynamicLink))
    }
}
