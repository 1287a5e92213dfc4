//! Extraction of warnings and errors from toolchain output.
//!
//! Recognizes the GCC/Clang form `file:line:col: warning: msg` and the MSVC
//! form `file(line,col): error C2065: msg`. Lines that match neither are
//! ignored; linker output without a location is not reported.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use super::events::BuildEvent;

static GNU_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<file>(?:[A-Za-z]:)?[^:\n]+):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?P<sev>warning|error|fatal error):\s*(?P<msg>.*)$",
    )
    .expect("valid regex")
});

static MSVC_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<file>.+?)\((?P<line>\d+)(?:,(?P<col>\d+))?\)\s*:\s*(?P<sev>warning|error|fatal error)\s+(?P<code>[A-Z]+\d+)\s*:\s*(?P<msg>.*)$",
    )
    .expect("valid regex")
});

/// One located compiler message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerMessage {
    pub is_error: bool,
    pub message: String,
    pub file: PathBuf,
    pub line: u32,
    pub column: Option<u32>,
}

impl CompilerMessage {
    pub fn into_event(self, project: &str) -> BuildEvent {
        let (file, line, column) = (Some(self.file), Some(self.line), self.column);
        if self.is_error {
            BuildEvent::CompilerError {
                project: project.to_string(),
                message: self.message,
                file,
                line,
                column,
            }
        } else {
            BuildEvent::CompilerWarning {
                project: project.to_string(),
                message: self.message,
                file,
                line,
                column,
            }
        }
    }
}

/// Parse every recognizable message out of combined toolchain output.
pub fn parse_messages(output: &str) -> Vec<CompilerMessage> {
    output.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<CompilerMessage> {
    let line = line.trim_end();
    let caps = MSVC_STYLE
        .captures(line)
        .or_else(|| GNU_STYLE.captures(line))?;

    let message = match caps.name("code") {
        Some(code) => format!("{}: {}", code.as_str(), &caps["msg"]),
        None => caps["msg"].to_string(),
    };

    Some(CompilerMessage {
        is_error: caps["sev"].ends_with("error"),
        message,
        file: PathBuf::from(caps["file"].trim()),
        line: caps["line"].parse().ok()?,
        column: caps.name("col").and_then(|c| c.as_str().parse().ok()),
    })
}
