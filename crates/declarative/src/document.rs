//! Line-oriented configuration documents

use std::fmt;

/// Line terminator detected in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }

    /// CRLF only when every line break in `text` is CRLF.
    fn detect(text: &str) -> Self {
        let breaks = text.matches('\n').count();
        if breaks > 0 && breaks == text.matches("\r\n").count() {
            Self::CrLf
        } else {
            Self::Lf
        }
    }
}

/// An ordered sequence of lines representing a text configuration file.
///
/// `parse` followed by `render` reproduces the input byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    lines: Vec<String>,
    line_ending: LineEnding,
    trailing_newline: bool,
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Self {
        let line_ending = LineEnding::detect(text);
        let sep = line_ending.as_str();

        if text.is_empty() {
            return Self::from_lines(Vec::new());
        }

        let trailing_newline = text.ends_with(sep);
        let body = text.strip_suffix(sep).unwrap_or(text);
        let lines = body.split(sep).map(str::to_string).collect();

        Self {
            lines,
            line_ending,
            trailing_newline,
        }
    }

    /// Build a document from lines, rendered with LF and a final newline.
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            line_ending: LineEnding::Lf,
            trailing_newline: true,
        }
    }

    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let sep = self.line_ending.as_str();
        let mut out = self.lines.join(sep);
        if self.trailing_newline {
            out.push_str(sep);
        }
        out
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True when the document has no non-whitespace content.
    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Replace the lines, keeping line ending and trailing newline style.
    pub(crate) fn with_lines(&self, lines: Vec<String>) -> Self {
        Self {
            lines,
            line_ending: self.line_ending,
            trailing_newline: self.trailing_newline || self.lines.is_empty(),
        }
    }
}

impl From<&str> for ConfigDocument {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
