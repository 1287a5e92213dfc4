//! Document reader.

use std::path::{Path, PathBuf};

use super::{DocumentError, Object, Value};

/// A parsed document, read in full on open.
#[derive(Debug)]
pub struct DocumentReader {
    path: PathBuf,
    objects: Vec<Object>,
}

impl DocumentReader {
    /// Read and parse the document at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path).map_err(|source| DocumentError::Open {
            path: path.clone(),
            source,
        })?;
        let objects = parse(&text)?;

        Ok(DocumentReader { path, objects })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Visit every top-level object in file order.
    ///
    /// Stops at the first error returned by `callback`.
    pub fn objects<E>(
        &self,
        mut callback: impl FnMut(&Object) -> Result<(), E>,
    ) -> Result<(), E> {
        for object in &self.objects {
            callback(object)?;
        }
        Ok(())
    }
}

enum LineValue {
    None,
    String(String),
    Table,
}

struct Line {
    number: usize,
    depth: usize,
    name: String,
    value: LineValue,
}

/// Parse document text into its top-level objects.
pub fn parse(text: &str) -> Result<Vec<Object>, DocumentError> {
    let mut lines = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let content = raw.trim_start_matches('\t');
        let depth = raw.len() - content.len();

        if content.trim().is_empty() || content.starts_with('#') {
            continue;
        }
        if content.starts_with(' ') {
            return Err(parse_error(number, "indentation must use tabs"));
        }

        lines.push(parse_line(number, depth, content)?);
    }

    let mut pos = 0;
    parse_block(&lines, &mut pos, 0)
}

fn parse_block(lines: &[Line], pos: &mut usize, depth: usize) -> Result<Vec<Object>, DocumentError> {
    let mut objects = Vec::new();

    while let Some(line) = lines.get(*pos) {
        if line.depth < depth {
            break;
        }
        if line.depth > depth {
            return Err(parse_error(line.number, "unexpected indentation"));
        }
        *pos += 1;

        let object = match &line.value {
            LineValue::None => Object::new(line.name.clone()),
            LineValue::String(s) => Object::string(line.name.clone(), s.clone()),
            LineValue::Table => {
                let children = parse_block(lines, pos, depth + 1)?;
                Object {
                    name: line.name.clone(),
                    value: Value::Table(children),
                }
            }
        };
        objects.push(object);
    }

    Ok(objects)
}

fn parse_line(number: usize, depth: usize, content: &str) -> Result<Line, DocumentError> {
    let (name, rest) = if content.starts_with('"') {
        parse_quoted(number, content)?
    } else if let Some(split) = content.find(": ") {
        (content[..split].to_string(), &content[split..])
    } else if let Some(name) = content.strip_suffix(':') {
        (name.to_string(), ":")
    } else {
        (content.to_string(), "")
    };

    let value = if rest.is_empty() {
        LineValue::None
    } else if rest == ":" {
        LineValue::Table
    } else if let Some(value) = rest.strip_prefix(": ") {
        if value.starts_with('"') {
            let (value, trailing) = parse_quoted(number, value)?;
            if !trailing.is_empty() {
                return Err(parse_error(number, "unexpected text after quoted value"));
            }
            LineValue::String(value)
        } else {
            LineValue::String(value.to_string())
        }
    } else {
        return Err(parse_error(number, "expected `: ` after quoted name"));
    };

    Ok(Line {
        number,
        depth,
        name,
        value,
    })
}

/// Parse a quoted token at the start of `s`, returning it and the remainder.
fn parse_quoted(number: usize, s: &str) -> Result<(String, &str), DocumentError> {
    let mut out = String::new();
    let mut chars = s.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, &s[i + 1..])),
            '\\' => match chars.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, other)) => {
                    return Err(parse_error(number, format!("unknown escape `\\{}`", other)))
                }
                None => break,
            },
            c => out.push(c),
        }
    }

    Err(parse_error(number, "unterminated quoted string"))
}

fn parse_error(line: usize, message: impl Into<String>) -> DocumentError {
    DocumentError::Parse {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::render;

    #[test]
    fn test_parse_strings_and_tables() {
        let objects = parse(
            "Name: Demo\n\
             # comment\n\
             \n\
             Files:\n\
             \tsrc/main.c\n\
             \tC:\\work\\util.c\n\
             Kind: Application\n",
        )
        .unwrap();

        assert_eq!(objects.len(), 3);
        assert_eq!(objects[0].as_str(), Some("Demo"));
        let files: Vec<_> = objects[1].children().iter().map(|c| c.name()).collect();
        assert_eq!(files, vec!["src/main.c", "C:\\work\\util.c"]);
        assert_eq!(objects[2].name(), "Kind");
    }

    #[test]
    fn test_parse_nested_tables() {
        let objects = parse(
            "Matrix:\n\tPlatform:\n\t\tWindows\n\t\tLinux\n\tConfiguration:\n\t\tDebug:\n\t\t\tDefines:\n\t\t\t\tDEBUG\n",
        )
        .unwrap();

        let matrix = &objects[0];
        assert_eq!(matrix.children().len(), 2);
        assert_eq!(matrix.children()[0].children().len(), 2);
        let debug = &matrix.children()[1].children()[0];
        assert_eq!(debug.name(), "Debug");
        assert_eq!(debug.child("Defines").unwrap().children()[0].name(), "DEBUG");
    }

    #[test]
    fn test_empty_table_stays_table() {
        let objects = parse("Files:\nName: x\n").unwrap();
        assert!(objects[0].is_table());
        assert!(objects[0].children().is_empty());
    }

    #[test]
    fn test_quoted_tokens_survive_render() {
        let original = vec![
            Object::string("Define", "A: \"quoted\"\tvalue"),
            Object::new("ends with:"),
            Object::string(" odd name ", ""),
        ];
        assert_eq!(parse(&render(&original)).unwrap(), original);
    }

    #[test]
    fn test_unexpected_indentation() {
        let err = parse("Name: x\n\tstray\n").unwrap_err();
        assert!(matches!(err, DocumentError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_unterminated_quote() {
        let err = parse("\"open\n").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_callback_order_and_early_exit() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.gprj");
        std::fs::write(&path, "A: 1\nB: 2\nC: 3\n").unwrap();

        let reader = DocumentReader::open(&path).unwrap();
        let mut seen = Vec::new();
        let result: Result<(), String> = reader.objects(|object| {
            seen.push(object.name().to_string());
            if object.name() == "B" {
                return Err("stop".to_string());
            }
            Ok(())
        });

        assert_eq!(result, Err("stop".to_string()));
        assert_eq!(seen, vec!["A", "B"]);
    }

    #[test]
    fn test_open_missing_file() {
        let err = DocumentReader::open("/definitely/not/here.gwks").unwrap_err();
        assert!(matches!(err, DocumentError::Open { .. }));
    }
}
