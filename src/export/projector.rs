//! Record projection into CSV lines
//!
//! Projection is a pure function of a record and a [`ProjectionSpec`], so it
//! runs on every scan worker without any shared mutable state.
//!
//! Quoting is minimal: a field is wrapped in double quotes only when it
//! contains a comma, a double quote or a newline, and quotes inside a quoted
//! field are doubled. Missing or non-string attributes become empty fields.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigError, Result};

use super::record::Record;

/// Ordered attribute allow-list for one export
///
/// Defines which attributes are requested from the store and the column
/// order of the output. Cheap to clone; the names are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionSpec {
    attributes: Arc<[String]>,
}

impl ProjectionSpec {
    /// Build a projection from attribute names
    ///
    /// # Errors
    /// Returns a configuration error when the list is empty or contains a
    /// blank name.
    pub fn new<I, S>(attributes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let attributes: Vec<String> = attributes.into_iter().map(Into::into).collect();

        if attributes.is_empty() {
            return Err(ConfigError::EmptyProjection.into());
        }
        if let Some(blank) = attributes.iter().find(|a| a.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "attributes".to_string(),
                value: blank.clone(),
            }
            .into());
        }

        Ok(Self {
            attributes: attributes.into(),
        })
    }

    /// Attribute names in output order
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// The header row: attribute names, escaped and comma-joined
    pub fn header_line(&self) -> OutputLine {
        join_fields(self.attributes.iter().map(|a| a.as_str()))
    }

    /// Project a record into one CSV line
    pub fn project(&self, record: &Record) -> OutputLine {
        join_fields(
            self.attributes
                .iter()
                .map(|name| record.get_str(name).unwrap_or("")),
        )
    }
}

/// One fully escaped, newline-terminated CSV line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine(String);

impl OutputLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Escape a single CSV field
///
/// # Arguments
/// * `value` - Raw field value
///
/// # Returns
/// * `Cow<str>` - The value itself, or a quoted copy when quoting is needed
pub fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn join_fields<'a>(fields: impl Iterator<Item = &'a str>) -> OutputLine {
    let mut line = String::new();
    for (i, field) in fields.enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&escape_field(field));
    }
    line.push('\n');
    OutputLine(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::record::AttributeValue;

    /// Inverse of `escape_field` for a single field
    fn unescape_field(field: &str) -> String {
        match field.strip_prefix('"').and_then(|f| f.strip_suffix('"')) {
            Some(inner) => inner.replace("\"\"", "\""),
            None => field.to_string(),
        }
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("simple"), "simple");
        assert_eq!(escape_field("with,comma"), "\"with,comma\"");
        assert_eq!(escape_field("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_field("with\nnewline"), "\"with\nnewline\"");
        assert_eq!(escape_field(""), "");
        assert_eq!(escape_field("  padded  "), "  padded  ");
    }

    #[test]
    fn test_escape_leaves_plain_values_borrowed() {
        assert!(matches!(escape_field("plain"), Cow::Borrowed(_)));
        assert!(matches!(escape_field("a,b"), Cow::Owned(_)));
    }

    #[test]
    fn test_escape_round_trip() {
        let samples = [
            "a,b",
            "\"",
            "\"\"",
            "line\nbreak",
            "mixed, \"quoted\"\nand more",
            ",",
            "\n",
            "trailing quote\"",
        ];

        for s in samples {
            let escaped = escape_field(s);
            assert_eq!(unescape_field(&escaped), s, "round trip failed for {s:?}");
            // Every newline sits inside the quoted field
            assert!(escaped.starts_with('"') && escaped.ends_with('"'));
        }
    }

    #[test]
    fn test_projection_rejects_empty() {
        let err = ProjectionSpec::new(Vec::<String>::new()).unwrap_err();
        assert!(err.to_string().contains("No attributes selected"));
    }

    #[test]
    fn test_projection_rejects_blank_name() {
        assert!(ProjectionSpec::new(["id", "  "]).is_err());
    }

    #[test]
    fn test_header_line() {
        let spec = ProjectionSpec::new(["id", "name"]).unwrap();
        assert_eq!(spec.header_line().as_str(), "id,name\n");

        let odd = ProjectionSpec::new(["a,b", "c"]).unwrap();
        assert_eq!(odd.header_line().as_str(), "\"a,b\",c\n");
    }

    #[test]
    fn test_project_scenario_rows() {
        let spec = ProjectionSpec::new(["id", "name"]).unwrap();

        let al = Record::new().with("id", "1").with("name", "Al");
        let bo = Record::new().with("id", "2").with("name", "Bo, Jr.");
        let nameless = Record::new()
            .with("id", "3")
            .with("name", AttributeValue::Null);

        assert_eq!(spec.project(&al).as_str(), "1,Al\n");
        assert_eq!(spec.project(&bo).as_str(), "2,\"Bo, Jr.\"\n");
        assert_eq!(spec.project(&nameless).as_str(), "3,\n");
    }

    #[test]
    fn test_project_missing_and_non_string() {
        let spec = ProjectionSpec::new(["a", "b", "c"]).unwrap();
        let record = Record::new()
            .with("b", AttributeValue::Number("42".to_string()))
            .with("c", "x");
        assert_eq!(spec.project(&record).as_str(), ",,x\n");
    }

    #[test]
    fn test_project_follows_spec_order() {
        let record = Record::new().with("id", "1").with("name", "Al");
        let reversed = ProjectionSpec::new(["name", "id"]).unwrap();
        assert_eq!(reversed.project(&record).as_str(), "Al,1\n");
    }

    #[test]
    fn test_projection_is_deterministic() {
        let spec = ProjectionSpec::new(["id", "note"]).unwrap();
        let record = Record::new().with("id", "9").with("note", "say \"hi\", twice");
        assert_eq!(spec.project(&record), spec.project(&record));
    }
}
