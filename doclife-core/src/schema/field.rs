// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Value;

/// Default maximum length of `Data` fields without explicit length.
pub const DEFAULT_DATA_LENGTH: usize = 140;

/// Type of a field in a doctype.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Data,
    #[serde(rename = "Small Text")]
    SmallText,
    Text,
    Int,
    Float,
    Currency,
    Percent,
    Check,
    Select,
    Link,
    #[serde(rename = "Dynamic Link")]
    DynamicLink,
    Date,
    Datetime,
    Time,
    #[serde(rename = "Read Only")]
    ReadOnly,
    Table,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Int | FieldType::Float | FieldType::Currency | FieldType::Percent
        )
    }

    pub fn is_table(&self) -> bool {
        matches!(self, FieldType::Table)
    }

    pub fn is_link(&self) -> bool {
        matches!(self, FieldType::Link | FieldType::DynamicLink)
    }

    /// Temporal fields are compared by their string representation.
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Datetime | FieldType::Time)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Data => "Data",
            FieldType::SmallText => "Small Text",
            FieldType::Text => "Text",
            FieldType::Int => "Int",
            FieldType::Float => "Float",
            FieldType::Currency => "Currency",
            FieldType::Percent => "Percent",
            FieldType::Check => "Check",
            FieldType::Select => "Select",
            FieldType::Link => "Link",
            FieldType::DynamicLink => "Dynamic Link",
            FieldType::Date => "Date",
            FieldType::Datetime => "Datetime",
            FieldType::Time => "Time",
            FieldType::ReadOnly => "Read Only",
            FieldType::Table => "Table",
        };
        write!(f, "{name}")
    }
}

/// Definition of one field of a doctype.
///
/// `options` depends on the field type: the target doctype for `Link` and `Table` fields, the
/// name of the field holding the target doctype for `Dynamic Link` fields and newline separated
/// choices for `Select` fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub fieldname: String,
    pub fieldtype: FieldType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub options: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub permlevel: u8,
    #[serde(default)]
    pub reqd: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub non_negative: bool,
    #[serde(default)]
    pub set_only_once: bool,
    #[serde(default)]
    pub allow_on_submit: bool,
    #[serde(default)]
    pub no_copy: bool,
    #[serde(default)]
    pub in_global_search: bool,
    #[serde(default)]
    pub length: Option<usize>,
}

impl FieldDef {
    pub fn new(fieldname: &str, fieldtype: FieldType) -> Self {
        Self {
            fieldname: fieldname.to_owned(),
            fieldtype,
            label: None,
            options: None,
            default: None,
            permlevel: 0,
            reqd: false,
            read_only: false,
            non_negative: false,
            set_only_once: false,
            allow_on_submit: false,
            no_copy: false,
            in_global_search: false,
            length: None,
        }
    }

    /// `Link` field pointing at documents of the given doctype.
    pub fn link(fieldname: &str, doctype: &str) -> Self {
        Self::new(fieldname, FieldType::Link).with_options(doctype)
    }

    /// `Table` field holding rows of the given child doctype.
    pub fn table(fieldname: &str, child_doctype: &str) -> Self {
        Self::new(fieldname, FieldType::Table).with_options(child_doctype)
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_owned());
        self
    }

    pub fn with_options(mut self, options: &str) -> Self {
        self.options = Some(options.to_owned());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_permlevel(mut self, permlevel: u8) -> Self {
        self.permlevel = permlevel;
        self
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn reqd(mut self) -> Self {
        self.reqd = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn non_negative(mut self) -> Self {
        self.non_negative = true;
        self
    }

    pub fn set_only_once(mut self) -> Self {
        self.set_only_once = true;
        self
    }

    pub fn allow_on_submit(mut self) -> Self {
        self.allow_on_submit = true;
        self
    }

    pub fn no_copy(mut self) -> Self {
        self.no_copy = true;
        self
    }

    pub fn in_global_search(mut self) -> Self {
        self.in_global_search = true;
        self
    }

    /// Human readable label, falls back to the field name.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.fieldname)
    }

    pub fn is_table(&self) -> bool {
        self.fieldtype.is_table()
    }

    /// Fields which can never be changed through an external update request.
    pub fn is_read_only(&self) -> bool {
        self.read_only || matches!(self.fieldtype, FieldType::ReadOnly)
    }

    /// Choices of a `Select` field, empty lines are ignored.
    pub fn select_options(&self) -> Vec<&str> {
        self.options
            .as_deref()
            .map(|options| {
                options
                    .lines()
                    .map(str::trim)
                    .filter(|option| !option.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Maximum accepted length, only enforced for `Data` fields.
    pub fn max_length(&self) -> Option<usize> {
        match self.fieldtype {
            FieldType::Data => Some(self.length.unwrap_or(DEFAULT_DATA_LENGTH)),
            _ => self.length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldDef, FieldType};

    #[test]
    fn builder_flags() {
        let field = FieldDef::new("status", FieldType::Select)
            .with_options("Open\n\nClosed\n")
            .with_label("Status")
            .reqd()
            .allow_on_submit();

        assert!(field.reqd);
        assert!(field.allow_on_submit);
        assert!(!field.is_read_only());
        assert_eq!(field.label(), "Status");
        assert_eq!(field.select_options(), vec!["Open", "Closed"]);
        assert_eq!(field.max_length(), None);

        let field = FieldDef::new("title", FieldType::Data);
        assert_eq!(field.label(), "title");
        assert_eq!(field.max_length(), Some(140));
        assert!(FieldDef::new("x", FieldType::ReadOnly).is_read_only());
    }

    #[test]
    fn deserialize_with_defaults() {
        let field: FieldDef = serde_json::from_str(
            r#"{ "fieldname": "party", "fieldtype": "Dynamic Link", "options": "party_type" }"#,
        )
        .unwrap();
        assert_eq!(field.fieldtype, FieldType::DynamicLink);
        assert_eq!(field.permlevel, 0);
        assert!(!field.reqd);
    }
}
