// Copyright 2025 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Placeholder substitution for configuration templates.
//!
//! Template documents reference context entries with `{{namespaced:key}}`
//! tokens. Whitespace inside the braces is ignored; the key itself is matched
//! exactly and case-sensitively.
//!
//! # Examples
//!
//! ```
//! use druid_eks::config::context::ContextBuilder;
//! use druid_eks::config::template::{resolve, TemplateDocument};
//!
//! let context = ContextBuilder::new()
//!     .parameter("release", "r1")
//!     .parameter("asset", "chart.tgz")
//!     .build()
//!     .unwrap();
//!
//! let doc = TemplateDocument::new("values.yaml", "release: {{release}}\nasset: {{asset}}");
//! let resolved = resolve(&doc, &context).unwrap();
//! assert_eq!(resolved.as_str(), "release: r1\nasset: chart.tgz");
//! ```

use lazy_static::lazy_static;
use log::debug;
use regex::{CaptureMatches, Captures, Regex};

use super::context::ContextMap;

/// Maximum length for resolved documents
const MAX_RESOLVED_LENGTH: usize = 10_000_000; // 10MB

lazy_static! {
    /// Placeholder tokens. Group 1 is the key: it starts with an alphanumeric
    /// or underscore and may contain `:`, `.`, `-` and `/` separators.
    static ref PLACEHOLDER_PATTERN: Regex = Regex::new(
        r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_.:/\-]*)\s*\}\}"
    ).expect("Invalid regex pattern");
}

/// Errors that can occur while resolving a template document.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Unresolved placeholder '{key}' in document '{document}'")]
    UnresolvedPlaceholder { key: String, document: String },

    #[error("Malformed placeholder in document '{document}' at line {line}")]
    MalformedPlaceholder { document: String, line: usize },

    #[error("Resolved document '{document}' exceeds maximum allowed length of {MAX_RESOLVED_LENGTH} bytes")]
    ResultTooLarge { document: String },
}

/// Raw configuration text that may contain placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDocument {
    name: String,
    text: String,
}

impl TemplateDocument {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Text with every placeholder substituted, ready for parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedText {
    document: String,
    text: String,
}

impl ResolvedText {
    /// Wrap text that never contained placeholders.
    pub fn new(document: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            text: text.into(),
        }
    }

    /// Name of the document this text was resolved from.
    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Substitute every placeholder in `document` from `context`.
///
/// Substitution is a single pass: a substituted value is never scanned again,
/// so a value that itself looks like `{{key}}` is emitted literally.
///
/// # Errors
///
/// - [`TemplateError::UnresolvedPlaceholder`] naming the first key (in document
///   order) absent from the context
/// - [`TemplateError::MalformedPlaceholder`] if `{{` opens something that is
///   not a well-formed token
/// - [`TemplateError::ResultTooLarge`] if the output exceeds the size limit
pub fn resolve(document: &TemplateDocument, context: &ContextMap) -> Result<ResolvedText, TemplateError> {
    let mut result = String::with_capacity(document.text().len());
    let mut keys_used = Vec::new();

    for segment in segments(&PLACEHOLDER_PATTERN, document.text()) {
        match segment {
            Segment::Literal { text, offset } => {
                check_literal(document, text, offset)?;
                result.push_str(text);
            }
            Segment::Token(caps) => {
                let key = caps.get(1).map_or("", |m| m.as_str());
                let value = context
                    .get(key)
                    .ok_or_else(|| TemplateError::UnresolvedPlaceholder {
                        key: key.to_string(),
                        document: document.name().to_string(),
                    })?;
                result.push_str(&value.render());
                keys_used.push(key);
            }
        }

        if result.len() > MAX_RESOLVED_LENGTH {
            return Err(TemplateError::ResultTooLarge {
                document: document.name().to_string(),
            });
        }
    }

    // Names only, never values
    if !keys_used.is_empty() {
        debug!(
            "Resolved placeholders in '{}': {}",
            document.name(),
            keys_used.join(", ")
        );
    }

    Ok(ResolvedText {
        document: document.name().to_string(),
        text: result,
    })
}

/// A piece of text split by [`segments`].
pub(crate) enum Segment<'t> {
    /// Text between tokens, with its byte offset in the input.
    Literal { text: &'t str, offset: usize },
    Token(Captures<'t>),
}

/// Iterator over the literal text and pattern matches of an input, in order.
/// Always ends with a (possibly empty) literal.
pub(crate) struct Segments<'r, 't> {
    input: &'t str,
    matches: CaptureMatches<'r, 't>,
    pending: Option<Captures<'t>>,
    position: usize,
    done: bool,
}

/// Split `input` into literals and `pattern` tokens.
pub(crate) fn segments<'r, 't>(pattern: &'r Regex, input: &'t str) -> Segments<'r, 't> {
    Segments {
        input,
        matches: pattern.captures_iter(input),
        pending: None,
        position: 0,
        done: false,
    }
}

impl<'r, 't> Iterator for Segments<'r, 't> {
    type Item = Segment<'t>;

    fn next(&mut self) -> Option<Segment<'t>> {
        if let Some(caps) = self.pending.take() {
            return Some(Segment::Token(caps));
        }
        if self.done {
            return None;
        }

        let offset = self.position;
        match self.matches.next() {
            Some(caps) => {
                let whole = caps.get_match();
                self.position = whole.end();
                self.pending = Some(caps);
                Some(Segment::Literal {
                    text: &self.input[offset..whole.start()],
                    offset,
                })
            }
            None => {
                self.done = true;
                Some(Segment::Literal {
                    text: &self.input[offset..],
                    offset,
                })
            }
        }
    }
}

/// Distinct placeholder keys referenced by `document`, in order of first use.
pub fn placeholders(document: &TemplateDocument) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_PATTERN.captures_iter(document.text()) {
        if let Some(key) = caps.get(1) {
            if !keys.iter().any(|k| k == key.as_str()) {
                keys.push(key.as_str().to_string());
            }
        }
    }
    keys
}

fn check_literal(document: &TemplateDocument, literal: &str, offset: usize) -> Result<(), TemplateError> {
    if let Some(pos) = literal.find("{{") {
        let absolute = offset + pos;
        let line = document.text()[..absolute].matches('\n').count() + 1;
        return Err(TemplateError::MalformedPlaceholder {
            document: document.name().to_string(),
            line,
        });
    }
    Ok(())
}
