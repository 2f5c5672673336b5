// src/manifest/scanner.rs

//! Line scanner for deb822-style control data
//!
//! Recognises the `Field-Name: value` grammar used by `Packages` indexes:
//!
//! - a field line starts with a non-whitespace name followed by `:`
//! - a line starting with a space or tab continues the previous field
//! - a blank line ends the current stanza
//! - `#` lines are comments
//!
//! CRLF line endings and a missing trailing newline are accepted. Field
//! names compare case-insensitively; values are trimmed.

/// One field of a stanza
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field<'a> {
    pub name: &'a str,
    /// Value of the first line, trimmed
    pub value: &'a str,
    /// 1-based line number of the field line
    pub line: usize,
}

/// Iterator over the fields of a control document
pub struct FieldScanner<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    malformed: usize,
}

impl<'a> FieldScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            malformed: 0,
        }
    }

    /// Number of non-blank lines that matched no rule so far
    pub fn malformed_lines(&self) -> usize {
        self.malformed
    }
}

impl<'a> Iterator for FieldScanner<'a> {
    type Item = Field<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for (idx, raw) in self.lines.by_ref() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);

            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            // Continuation of a multi-line value
            if line.starts_with(' ') || line.starts_with('\t') {
                continue;
            }

            match line.split_once(':') {
                Some((name, value)) if !name.is_empty() && !name.contains(char::is_whitespace) => {
                    return Some(Field {
                        name,
                        value: value.trim(),
                        line: idx + 1,
                    });
                }
                _ => self.malformed += 1,
            }
        }
        None
    }
}

/// Every non-empty value of the named field, in document order
pub fn field_values<'a>(text: &'a str, name: &str) -> Vec<&'a str> {
    FieldScanner::new(text)
        .filter(|f| f.name.eq_ignore_ascii_case(name) && !f.value.is_empty())
        .map(|f| f.value)
        .collect()
}
