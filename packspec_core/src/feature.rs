//! Feature parser: one raw specification entry in, one [`Feature`] out
//!
//! A raw entry is either a bare string (a comment, optionally prefixed with a
//! `(tag:list)`) or a single-key mapping whose key is the left-hand side
//! `(tags) assign = property` and whose value is the right-hand payload.

use crate::error::{PackspecError, Result};
use crate::types::{Mapping, Value, ERROR};
use regex::Regex;

/// Marker closing a property that is read and compared rather than called
const EQUALITY_MARKER: &str = "==";

/// One parsed specification entry
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Comment(Comment),
    Test(Test),
}

impl Feature {
    /// Text shown by reporters
    pub fn text(&self) -> &str {
        match self {
            Feature::Comment(comment) => &comment.text,
            Feature::Test(test) => &test.text,
        }
    }

    pub fn skip(&self) -> bool {
        match self {
            Feature::Comment(comment) => comment.skip,
            Feature::Test(test) => test.skip,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Feature::Comment(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    /// Runtime tags from the `(a:b)` prefix, if one was given
    pub tags: Option<Vec<String>>,
    pub skip: bool,
}

impl Comment {
    /// Re-render the entry, tag prefix included
    pub fn canonical(&self) -> String {
        match &self.tags {
            Some(tags) => format!("({}) {}", tags.join(":"), self.text),
            None => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Test {
    /// Runtime tags from the `(a:b)` prefix; without them the skip state is
    /// inherited from the preceding comment
    pub tags: Option<Vec<String>>,
    pub skip: bool,
    pub assign: Option<String>,
    pub property: Option<String>,
    pub call: bool,
    pub args: Vec<Value>,
    pub kwargs: Mapping,
    /// Expected result; null means "must not raise"
    pub result: Value,
    pub text: String,
}

/// Parses raw entries for one runtime
pub struct FeatureParser {
    runtime_tag: String,
    comment_pattern: Regex,
    test_pattern: Regex,
}

impl FeatureParser {
    /// Create a parser that keeps features tagged for `runtime_tag`
    pub fn new(runtime_tag: impl Into<String>) -> Result<Self> {
        Ok(Self {
            runtime_tag: runtime_tag.into(),
            // Multi-line entries (YAML block scalars) match on their first line
            comment_pattern: Regex::new(r"(?m)^(?:\(([^)]*)\))?\s*(\w.*)$")?,
            test_pattern: Regex::new(r"(?m)^(?:\(([^)]*)\))?\s*(?:([^=]*)=)?([^=].*)?$")?,
        })
    }

    pub fn runtime_tag(&self) -> &str {
        &self.runtime_tag
    }

    /// Parse one raw entry
    pub fn parse(&self, raw: &Value) -> Result<Feature> {
        match raw {
            Value::String(text) => self.parse_comment(text).map(Feature::Comment),
            Value::Object(mapping) if mapping.len() == 1 => {
                let (left, right) = mapping
                    .first()
                    .ok_or_else(|| PackspecError::Parse("empty feature mapping".to_string()))?;
                self.parse_test(left, right).map(Feature::Test)
            }
            other => Err(PackspecError::Parse(format!(
                "feature must be a string or a single-key mapping, got {}",
                other.render()
            ))),
        }
    }

    fn parse_comment(&self, text: &str) -> Result<Comment> {
        let captures = self
            .comment_pattern
            .captures(text)
            .ok_or_else(|| PackspecError::Parse(format!("malformed comment: {}", text)))?;
        let tags = captures.get(1).map(|m| split_tags(m.as_str()));
        let text = captures
            .get(2)
            .map(|m| m.as_str().trim_end().to_string())
            .unwrap_or_default();
        Ok(Comment {
            skip: self.skips(tags.as_deref()),
            tags,
            text,
        })
    }

    fn parse_test(&self, left: &str, right: &Value) -> Result<Test> {
        let captures = self
            .test_pattern
            .captures(left)
            .ok_or_else(|| PackspecError::Parse(format!("malformed feature: {}", left)))?;
        let tags = captures.get(1).map(|m| split_tags(m.as_str()));
        let assign = non_empty(captures.get(2).map(|m| m.as_str()));
        let mut property = non_empty(captures.get(3).map(|m| m.as_str()));
        if assign.is_none() && property.is_none() {
            return Err(PackspecError::InvalidFeature(left.to_string()));
        }

        let mut call = false;
        if let Some(name) = property.as_mut() {
            if let Some(stripped) = name.strip_suffix(EQUALITY_MARKER) {
                *name = stripped.trim_end().to_string();
            } else {
                call = matches!(right, Value::Array(_));
            }
        }

        let mut args = Vec::new();
        let mut kwargs = Mapping::new();
        let mut result = Value::Null;
        match right {
            Value::Array(items) if call => {
                for item in items {
                    if let Value::Object(entry) = item {
                        if let (1, Some((key, value))) = (entry.len(), entry.first()) {
                            if key == EQUALITY_MARKER {
                                result = value.clone();
                                continue;
                            }
                            if let Some(name) = key.strip_suffix('=') {
                                kwargs.insert(name.trim().to_string(), value.clone());
                                continue;
                            }
                        }
                    }
                    args.push(item.clone());
                }
            }
            _ => result = right.clone(),
        }

        let text = render_text(
            assign.as_deref(),
            property.as_deref(),
            call,
            &args,
            &kwargs,
            &result,
        );
        Ok(Test {
            skip: self.skips(tags.as_deref()),
            tags,
            assign,
            property,
            call,
            args,
            kwargs,
            result,
            text,
        })
    }

    /// A tag-list skips unless it names the current runtime
    fn skips(&self, tags: Option<&[String]>) -> bool {
        tags.is_some_and(|tags| !tags.iter().any(|tag| tag == &self.runtime_tag))
    }
}

fn split_tags(list: &str) -> Vec<String> {
    list.split(':')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(String::from)
}

/// `assign = property(args, kw=value) == result`, absent parts omitted
fn render_text(
    assign: Option<&str>,
    property: Option<&str>,
    call: bool,
    args: &[Value],
    kwargs: &Mapping,
    result: &Value,
) -> String {
    let mut text = match (assign, property) {
        (Some(assign), Some(property)) => format!("{} = {}", assign, property),
        (Some(assign), None) => format!("{} = {}", assign, result.render()),
        (None, property) => property.unwrap_or_default().to_string(),
    };
    if call {
        let items: Vec<String> = args
            .iter()
            .map(Value::render)
            .chain(
                kwargs
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value.render())),
            )
            .collect();
        text = format!("{}({})", text, items.join(", "));
    }
    if property.is_some() && !result.is_null() {
        let expected = if result.is_error() {
            ERROR.to_string()
        } else {
            result.render()
        };
        text = format!("{} == {}", text, expected);
    }
    text
}
