//! Raw records as delivered by a row source

use std::collections::HashMap;

use bson::{Bson, Document};

/// A single attribute value
///
/// Only [`AttributeValue::String`] is ever read by the projector; every other
/// variant projects to an empty field.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Number(String),
    Bool(bool),
    Null,
    Other,
}

impl AttributeValue {
    /// String payload, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<Bson> for AttributeValue {
    fn from(value: Bson) -> Self {
        match value {
            Bson::String(s) => AttributeValue::String(s),
            Bson::Int32(n) => AttributeValue::Number(n.to_string()),
            Bson::Int64(n) => AttributeValue::Number(n.to_string()),
            Bson::Double(n) => AttributeValue::Number(n.to_string()),
            Bson::Boolean(b) => AttributeValue::Bool(b),
            Bson::Null | Bson::Undefined => AttributeValue::Null,
            _ => AttributeValue::Other,
        }
    }
}

/// Mapping from attribute name to value for one row of a table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    attributes: HashMap<String, AttributeValue>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace an attribute
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Look up an attribute
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// String value of an attribute, if present and string-typed
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_str)
    }

    /// Attribute names present in this record
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl From<Document> for Record {
    fn from(doc: Document) -> Self {
        let attributes = doc
            .into_iter()
            .map(|(name, value)| (name, AttributeValue::from(value)))
            .collect();
        Self { attributes }
    }
}
