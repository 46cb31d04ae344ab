// SPDX-License-Identifier: MIT OR Apache-2.0

//! Name resolution for new documents.
use doclife_core::{Autoname, DocTypeMeta, Document};
use doclife_store::RowStore;
use tracing::trace;

use crate::config::Config;
use crate::error::{DocumentError, StoreResultExt};
use crate::links::AMENDED_FROM;

/// Number of hexadecimal characters of random names.
const HASH_LENGTH: usize = 10;

/// Random name for documents and child rows.
pub fn make_hash_name() -> String {
    let mut name = hex::encode(rand::random::<u64>().to_be_bytes());
    name.truncate(HASH_LENGTH);
    name
}

/// Trim a name and reject empty or overlong names and names containing markup or newlines.
pub fn validate_name(config: &Config, name: &str) -> Result<String, DocumentError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DocumentError::InvalidName("name can not be empty".into()));
    }
    if name.chars().count() > config.max_name_length {
        return Err(DocumentError::InvalidName(format!(
            "'{name}' is longer than {} characters",
            config.max_name_length
        )));
    }
    if name.contains(['<', '>', '\n', '\r']) {
        return Err(DocumentError::InvalidName(format!(
            "'{name}' contains forbidden characters"
        )));
    }
    Ok(name.to_owned())
}

/// Split a series pattern like `SO-.####` into its prefix and the number of digits.
pub fn parse_series(pattern: &str) -> (String, usize) {
    match pattern.find(".#") {
        Some(position) => {
            let digits = pattern[position + 1..]
                .chars()
                .take_while(|char| *char == '#')
                .count();
            (pattern[..position].to_owned(), digits)
        }
        None => (pattern.to_owned(), 5),
    }
}

/// Next name of a series, the counter lives in the store.
pub(crate) async fn next_in_series<S>(store: &S, pattern: &str) -> Result<String, DocumentError>
where
    S: RowStore,
{
    let (prefix, digits) = parse_series(pattern);
    let current = store.next_series(&prefix).await.or_store_err()?;
    Ok(format!("{prefix}{current:0digits$}"))
}

/// Name of an amendment of `source`: `NAME-1` for the first amendment, the suffix is counted up
/// when `source` is an amendment itself.
pub(crate) async fn amended_name<S>(
    store: &S,
    doctype: &str,
    source: &str,
) -> Result<String, DocumentError>
where
    S: RowStore,
{
    let source_is_amendment = store
        .get_row(doctype, source, false)
        .await
        .or_store_err()?
        .and_then(|row| row.get_str(AMENDED_FROM).map(|from| !from.is_empty()))
        .unwrap_or(false);

    if source_is_amendment
        && let Some((prefix, counter)) = source.rsplit_once('-')
        && let Ok(counter) = counter.parse::<u64>()
    {
        return Ok(format!("{prefix}-{}", counter + 1));
    }
    Ok(format!("{source}-1"))
}

/// Resolve the name of a new document.
///
/// An explicit name given by the caller wins, followed by the amendment name, a name which was
/// already set on the document and finally the autoname rule of the doctype. Single documents
/// are always named after their doctype.
pub(crate) async fn set_new_name<S>(
    store: &S,
    config: &Config,
    meta: &DocTypeMeta,
    doc: &mut Document,
    set_name: Option<&str>,
) -> Result<(), DocumentError>
where
    S: RowStore,
{
    if meta.is_single {
        doc.name = Some(meta.name.clone());
        return Ok(());
    }

    let amended_from = doc
        .get_str(AMENDED_FROM)
        .filter(|from| !from.is_empty())
        .map(str::to_owned);
    let preset = doc.name.clone().filter(|name| !name.trim().is_empty());

    let name = if let Some(name) = set_name {
        name.to_owned()
    } else if let Some(source) = amended_from {
        amended_name(store, &doc.doctype, &source).await?
    } else if let Some(name) = preset {
        name
    } else {
        match &meta.autoname {
            Autoname::Hash => make_hash_name(),
            Autoname::Field(fieldname) => match doc.get(fieldname) {
                Some(value) if !value.is_empty() => value.to_string(),
                _ => {
                    let label = meta
                        .get_field(fieldname)
                        .map(|field| field.label().to_owned())
                        .unwrap_or_else(|| fieldname.clone());
                    return Err(DocumentError::Mandatory {
                        doctype: doc.doctype.clone(),
                        name: String::new(),
                        fields: vec![label],
                    });
                }
            },
            Autoname::Series(pattern) => next_in_series(store, pattern).await?,
            Autoname::Prompt => {
                return Err(DocumentError::InvalidName(format!(
                    "a name must be given for new {} documents",
                    doc.doctype
                )));
            }
        }
    };

    let name = validate_name(config, &name)?;
    trace!(doctype = %doc.doctype, %name, "resolved name");
    doc.name = Some(name);
    Ok(())
}

/// Give every child row without a name a random one.
pub(crate) fn set_child_names(doc: &mut Document) {
    for child in doc.all_children_mut() {
        if child.name.as_deref().is_none_or(|name| name.is_empty()) {
            child.name = Some(make_hash_name());
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::config::Config;
    use crate::error::DocumentError;

    use super::{make_hash_name, parse_series, validate_name};

    #[test]
    fn names_are_trimmed_and_checked() {
        let config = Config::default();
        assert_eq!(validate_name(&config, "  WIDGET-1 ").unwrap(), "WIDGET-1");
        assert_matches!(validate_name(&config, "   "), Err(DocumentError::InvalidName(_)));
        assert_matches!(
            validate_name(&config, "<script>"),
            Err(DocumentError::InvalidName(_))
        );
        assert_matches!(
            validate_name(&config, "two\nlines"),
            Err(DocumentError::InvalidName(_))
        );
        assert_matches!(
            validate_name(&config, &"x".repeat(101)),
            Err(DocumentError::InvalidName(_))
        );
        assert!(validate_name(&config, &"x".repeat(100)).is_ok());
    }

    #[test]
    fn series_patterns() {
        assert_eq!(parse_series("SO-.####"), ("SO-".to_owned(), 4));
        assert_eq!(parse_series("PR-.###"), ("PR-".to_owned(), 3));
        assert_eq!(parse_series("INV"), ("INV".to_owned(), 5));
    }

    #[test]
    fn hash_names() {
        let name = make_hash_name();
        assert_eq!(name.len(), 10);
        assert!(name.chars().all(|char| char.is_ascii_hexdigit()));
        assert_ne!(make_hash_name(), name);
    }
}
