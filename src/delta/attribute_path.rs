//! Attribute paths and content schemas.
//!
//! An attribute path is a sequence of predicate URIs leading from a record
//! to one position in its graph. Its string form joins the URIs with
//! `U+001E`; comparison is always on the URI sequence.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::model::keys::ATTRIBUTE_DELIMITER;
use crate::{Error, Result};

/// One predicate URI of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attribute {
    uri: String,
}

impl Attribute {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttributePath {
    attributes: SmallVec<[Attribute; 4]>,
}

impl AttributePath {
    pub fn new(attributes: impl IntoIterator<Item = Attribute>) -> Self {
        Self { attributes: attributes.into_iter().collect() }
    }

    pub fn from_uris<S: Into<String>>(uris: impl IntoIterator<Item = S>) -> Self {
        Self::new(uris.into_iter().map(Attribute::new))
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn uris(&self) -> Vec<&str> {
        self.attributes.iter().map(Attribute::uri).collect()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// The first `len` attributes.
    pub fn prefix(&self, len: usize) -> AttributePath {
        Self::new(self.attributes.iter().take(len).cloned())
    }

    pub fn starts_with(&self, prefix: &AttributePath) -> bool {
        self.attributes.starts_with(&prefix.attributes)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attribute) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, "{ATTRIBUTE_DELIMITER}")?;
            }
            f.write_str(attribute.uri())?;
        }
        Ok(())
    }
}

impl FromStr for AttributePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        let mut attributes = SmallVec::new();
        for uri in s.split(ATTRIBUTE_DELIMITER) {
            if uri.is_empty() {
                return Err(Error::ConfigurationError(format!("empty attribute in path {s:?}")));
            }
            attributes.push(Attribute::new(uri));
        }
        Ok(Self { attributes })
    }
}

impl TryFrom<String> for AttributePath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<AttributePath> for String {
    fn from(path: AttributePath) -> Self {
        path.to_string()
    }
}

/// Suffix of `path` below `common`.
///
/// Walks both in lock-step up to the first divergence or the end of
/// `common`. `None` when `path` is used up by then: it points at the entity
/// itself and cannot distinguish anything below it.
pub fn relative_attribute_path(path: &AttributePath, common: &AttributePath) -> Option<AttributePath> {
    let shared = path
        .attributes
        .iter()
        .zip(common.attributes.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if shared >= path.len() {
        return None;
    }
    Some(AttributePath::new(path.attributes[shared..].iter().cloned()))
}

// ============================================================================
// Content schema
// ============================================================================

/// Describes the repeatable entities of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSchema {
    /// Path from the record to its identifier literal.
    pub record_identifier: Option<AttributePath>,
    pub key_paths: Vec<AttributePath>,
    pub value_path: Option<AttributePath>,
}

impl ContentSchema {
    pub fn new(key_paths: Vec<AttributePath>, value_path: AttributePath) -> Self {
        Self {
            record_identifier: None,
            key_paths,
            value_path: Some(value_path),
        }
    }

    pub fn with_record_identifier(mut self, path: AttributePath) -> Self {
        self.record_identifier = Some(path);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Key- and value-based matching needs at least one key path and a
    /// value path, none of them empty.
    pub fn validate(&self) -> Result<()> {
        if self.key_paths.is_empty() {
            return Err(Error::ConfigurationError("content schema has no key attribute path".into()));
        }
        let Some(value_path) = &self.value_path else {
            return Err(Error::ConfigurationError("content schema has no value attribute path".into()));
        };
        if value_path.is_empty() || self.key_paths.iter().any(AttributePath::is_empty) {
            return Err(Error::ConfigurationError("content schema has an empty attribute path".into()));
        }
        Ok(())
    }

    /// Path from the record to its content-schema entities: the longest
    /// prefix shared by all key paths and the value path, leaving at least
    /// one attribute of each below it.
    pub fn common_attribute_path(&self) -> Result<AttributePath> {
        self.validate()?;
        let paths: Vec<&AttributePath> = self.key_paths.iter().chain(self.value_path.as_ref()).collect();

        let shortest = paths.iter().map(|p| p.len()).min().unwrap_or(0);
        let first = paths[0];
        let shared = (0..shortest.saturating_sub(1))
            .take_while(|&i| paths.iter().all(|p| p.attributes[i] == first.attributes[i]))
            .count();

        Ok(first.prefix(shared))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FIELD: &str = "http://www.ddb.de/professionell/mabxml/mabxml-1.xsd#feld";
    const NR: &str = "http://www.ddb.de/professionell/mabxml/mabxml-1.xsd#nr";
    const IND: &str = "http://www.ddb.de/professionell/mabxml/mabxml-1.xsd#ind";
    const VALUE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#value";

    fn path(uris: &[&str]) -> AttributePath {
        AttributePath::from_uris(uris.iter().copied())
    }

    #[test]
    fn test_string_form_uses_delimiter() {
        let p = path(&[FIELD, NR]);
        let s = p.to_string();
        assert_eq!(s, format!("{FIELD}\u{1E}{NR}"));
        assert_eq!(s.parse::<AttributePath>().unwrap(), p);
    }

    #[test]
    fn test_empty_segment_is_rejected() {
        let s = format!("{FIELD}\u{1E}\u{1E}{NR}");
        assert!(matches!(s.parse::<AttributePath>(), Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_relative_path() {
        let common = path(&[FIELD]);
        assert_eq!(relative_attribute_path(&path(&[FIELD, NR]), &common), Some(path(&[NR])));
        assert_eq!(relative_attribute_path(&path(&[FIELD]), &common), None);
        // diverges at the first attribute: the whole path is relative
        assert_eq!(relative_attribute_path(&path(&[NR, IND]), &common), Some(path(&[NR, IND])));
    }

    #[test]
    fn test_common_path() {
        let schema = ContentSchema::new(vec![path(&[FIELD, NR]), path(&[FIELD, IND])], path(&[FIELD, VALUE]));
        assert_eq!(schema.common_attribute_path().unwrap(), path(&[FIELD]));

        // identical paths still leave one attribute below the entity
        let schema = ContentSchema::new(vec![path(&[FIELD, NR])], path(&[FIELD, NR]));
        assert_eq!(schema.common_attribute_path().unwrap(), path(&[FIELD]));

        let schema = ContentSchema::new(vec![path(&[NR])], path(&[VALUE]));
        assert!(schema.common_attribute_path().unwrap().is_empty());
    }

    #[test]
    fn test_validate() {
        let missing_keys = ContentSchema { value_path: Some(path(&[VALUE])), ..ContentSchema::default() };
        assert!(matches!(missing_keys.validate(), Err(Error::ConfigurationError(_))));

        let missing_value = ContentSchema { key_paths: vec![path(&[NR])], ..ContentSchema::default() };
        assert!(matches!(missing_value.validate(), Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_schema_json() {
        let json = format!(
            r#"{{"record_identifier":"{FIELD}","key_paths":["{FIELD}\u001e{NR}"],"value_path":"{FIELD}\u001e{VALUE}"}}"#
        );
        let schema = ContentSchema::from_json(&json).unwrap();
        assert_eq!(schema.key_paths, vec![path(&[FIELD, NR])]);
        assert_eq!(schema.value_path, Some(path(&[FIELD, VALUE])));
        assert_eq!(schema.record_identifier, Some(path(&[FIELD])));
    }
}
