//! Ordered object-tree documents.
//!
//! Workspace (`.gwks`) and project (`.gprj`) files share one small format:
//! a sequence of named objects, each holding nothing, a string, or a table
//! of child objects. Layout on disk is exactly write order.
//!
//! ```text
//! Name: Engine
//! Kind: StaticLibrary
//! Files:
//! 	src/engine.cpp
//! 	src/render.cpp
//! ```
//!
//! Children are indented with one tab per level. Names or values that would
//! be ambiguous on a line (leading quote, `": "`, trailing colon, control
//! characters, surrounding whitespace) are written as quoted strings.

mod reader;
mod writer;

use std::path::PathBuf;

use thiserror::Error;

pub use reader::{parse, DocumentReader};
pub use writer::{render, DocumentWriter};

/// The payload of an [`Object`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// Name-only entry (e.g. a path inside a `Files` table)
    #[default]
    None,
    String(String),
    Table(Vec<Object>),
}

/// A named node in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    name: String,
    value: Value,
}

impl Object {
    /// Create a name-only object.
    pub fn new(name: impl Into<String>) -> Self {
        Object {
            name: name.into(),
            value: Value::None,
        }
    }

    /// Create an object holding a string.
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Object {
            name: name.into(),
            value: Value::String(value.into()),
        }
    }

    /// Create an object holding an empty table.
    pub fn table(name: impl Into<String>) -> Self {
        Object {
            name: name.into(),
            value: Value::Table(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The string value, if this object holds one.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self.value, Value::Table(_))
    }

    /// Child objects; empty unless this object is a table.
    pub fn children(&self) -> &[Object] {
        match &self.value {
            Value::Table(children) => children,
            _ => &[],
        }
    }

    /// Append a child, turning a name-only object into a table.
    ///
    /// A string value is replaced by the table.
    pub fn add_child(&mut self, child: Object) {
        match &mut self.value {
            Value::Table(children) => children.push(child),
            _ => self.value = Value::Table(vec![child]),
        }
    }

    /// Builder form of [`Object::add_child`].
    pub fn with_child(mut self, child: Object) -> Self {
        self.add_child(child);
        self
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Object> {
        self.children().iter().find(|c| c.name == name)
    }
}

/// Error reading or writing a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to open document `{}`", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write document `{}`", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Whether `s` can be written without quotes in the given position.
fn is_bare(s: &str, as_name: bool) -> bool {
    if s.is_empty() || s.trim() != s || s.starts_with('"') {
        return false;
    }
    if s.chars().any(|c| c.is_control()) {
        return false;
    }
    if as_name && (s.starts_with('#') || s.contains(": ") || s.ends_with(':')) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_child_promotes_to_table() {
        let mut files = Object::new("Files");
        assert!(!files.is_table());
        assert!(files.children().is_empty());

        files.add_child(Object::new("main.c"));
        files.add_child(Object::new("util.c"));

        assert!(files.is_table());
        let names: Vec<_> = files.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["main.c", "util.c"]);
    }

    #[test]
    fn test_child_lookup() {
        let option = Object::new("Debug").with_child(Object::string("Architecture", "x86"));
        assert_eq!(
            option.child("Architecture").and_then(Object::as_str),
            Some("x86")
        );
        assert!(option.child("Kind").is_none());
    }

    #[test]
    fn test_bare_rules() {
        assert!(is_bare("src/main.c", true));
        assert!(is_bare(r"C:\src\main.c", true));
        assert!(!is_bare("a: b", true));
        assert!(is_bare("a: b", false));
        assert!(!is_bare("trailing:", true));
        assert!(!is_bare(" padded", false));
        assert!(!is_bare("", false));
        assert!(!is_bare("#comment", true));
    }
}
