//! Document writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{is_bare, DocumentError, Object, Value};

/// Appends objects to a document file in call order.
///
/// The file is created (truncated) by [`DocumentWriter::create`], so a
/// location that cannot be written to is reported before anything is
/// serialized.
pub struct DocumentWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl DocumentWriter {
    /// Open `path` for writing, creating parent directories as needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| DocumentError::Open {
                    path: path.clone(),
                    source,
                })?;
            }
        }

        let file = File::create(&path).map_err(|source| DocumentError::Open {
            path: path.clone(),
            source,
        })?;

        Ok(DocumentWriter {
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one top-level object.
    pub fn write_object(&mut self, object: &Object) -> Result<(), DocumentError> {
        let mut text = String::new();
        render_object(&mut text, object, 0);
        self.out
            .write_all(text.as_bytes())
            .map_err(|source| DocumentError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Flush buffered output to disk.
    pub fn finish(mut self) -> Result<(), DocumentError> {
        self.out.flush().map_err(|source| DocumentError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Render a sequence of top-level objects to text.
pub fn render(objects: &[Object]) -> String {
    let mut text = String::new();
    for object in objects {
        render_object(&mut text, object, 0);
    }
    text
}

fn render_object(out: &mut String, object: &Object, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
    push_token(out, object.name(), true);

    match object.value() {
        Value::None => out.push('\n'),
        Value::String(s) => {
            out.push_str(": ");
            push_token(out, s, false);
            out.push('\n');
        }
        Value::Table(children) => {
            out.push_str(":\n");
            for child in children {
                render_object(out, child, depth + 1);
            }
        }
    }
}

fn push_token(out: &mut String, s: &str, as_name: bool) {
    if is_bare(s, as_name) {
        out.push_str(s);
        return;
    }

    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}
