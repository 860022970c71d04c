//! JSON-path subset used by filter paths and watched properties
//!
//! Supported syntax:
//! - `$` root (optional)
//! - `.key` and bare `key` at the start
//! - `[n]` array index
//! - `['key']` / `["key"]` quoted key
//! - `[*]` / `.*` wildcard, mapping the rest of the path over every element
//!
//! `$.rows[*].value` over `{"rows":[{"value":1},{"value":2}]}` yields `[1,2]`.

use crate::error::PathError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One path step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// Parsed path
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    /// Path selecting the whole value
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path expression
    ///
    /// # Errors
    /// Returns [`PathError`] on malformed input
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }

        let chars: Vec<char> = trimmed.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        if chars[0] == '$' {
            i = 1;
        } else if chars[0] != '.' && chars[0] != '[' {
            let (key, next) = read_key(&chars, 0);
            segments.push(key_or_wildcard(key));
            i = next;
        }

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    let (key, next) = read_key(&chars, i + 1);
                    if key.is_empty() {
                        return Err(match chars.get(i + 1) {
                            Some(&ch) => PathError::UnexpectedChar {
                                ch,
                                position: i + 1,
                            },
                            None => PathError::UnexpectedChar { ch: '.', position: i },
                        });
                    }
                    segments.push(key_or_wildcard(key));
                    i = next;
                }
                '[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|offset| i + offset)
                        .ok_or(PathError::UnclosedBracket { position: i })?;
                    let inner: String = chars[i + 1..close].iter().collect();
                    segments.push(parse_selector(inner.trim())?);
                    i = close + 1;
                }
                ch => return Err(PathError::UnexpectedChar { ch, position: i }),
            }
        }

        Ok(Self { segments })
    }

    /// Path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True for `$`
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Project a value; `None` when any step misses
    #[must_use]
    pub fn select(&self, value: &Value) -> Option<Value> {
        select_from(&self.segments, value)
    }
}

fn read_key(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn key_or_wildcard(key: String) -> Segment {
    if key == "*" {
        Segment::Wildcard
    } else {
        Segment::Key(key)
    }
}

fn parse_selector(inner: &str) -> Result<Segment, PathError> {
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    for quote in ['\'', '"'] {
        if inner.len() >= 2 && inner.starts_with(quote) && inner.ends_with(quote) {
            return Ok(Segment::Key(inner[1..inner.len() - 1].to_string()));
        }
    }
    inner
        .parse::<usize>()
        .map(Segment::Index)
        .map_err(|_| PathError::InvalidSelector(inner.to_string()))
}

fn select_from(segments: &[Segment], value: &Value) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match head {
        Segment::Key(key) => match value {
            Value::Object(map) => select_from(rest, map.get(key)?),
            // Numeric keys also index arrays, so `rows.0` behaves like `rows[0]`
            Value::Array(items) => select_from(rest, items.get(key.parse::<usize>().ok()?)?),
            _ => None,
        },
        Segment::Index(index) => match value {
            Value::Array(items) => select_from(rest, items.get(*index)?),
            _ => None,
        },
        Segment::Wildcard => {
            let children: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                Value::Object(map) => map.values().collect(),
                _ => return None,
            };
            Some(Value::Array(
                children
                    .into_iter()
                    .filter_map(|child| select_from(rest, child))
                    .collect(),
            ))
        }
    }
}

impl FromStr for JsonPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                Segment::Key(key) if is_plain_key(key) => write!(f, ".{key}")?,
                Segment::Key(key) => write!(f, "['{key}']")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Wildcard => f.write_str("[*]")?,
            }
        }
        Ok(())
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn select(path: &str, value: &Value) -> Option<Value> {
        JsonPath::parse(path).unwrap().select(value)
    }

    #[test]
    fn root_and_keys() {
        let data = json!({"temperature": 25.6, "nested": {"a": {"b": true}}});
        assert_eq!(select("$", &data), Some(data.clone()));
        assert_eq!(select("$.temperature", &data), Some(json!(25.6)));
        assert_eq!(select("nested.a.b", &data), Some(json!(true)));
        assert_eq!(select("$['nested'][\"a\"]", &data), Some(json!({"b": true})));
    }

    #[test]
    fn indexes_and_misses() {
        let data = json!({"rows": [10, 20, 30]});
        assert_eq!(select("$.rows[1]", &data), Some(json!(20)));
        assert_eq!(select("$.rows.2", &data), Some(json!(30)));
        assert_eq!(select("$.rows[5]", &data), None);
        assert_eq!(select("$.missing", &data), None);
        assert_eq!(select("$.rows.x", &data), None);
    }

    #[test]
    fn wildcard_maps_over_elements() {
        let data = json!([{"v": 1}, {"v": 2}, {"w": 3}]);
        assert_eq!(select("$[*].v", &data), Some(json!([1, 2])));
        assert_eq!(select("$.*", &json!({"a": 1, "b": 2})), Some(json!([1, 2])));
        assert_eq!(select("$[*]", &json!(5)), None);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(JsonPath::parse(""), Err(PathError::Empty));
        assert_eq!(
            JsonPath::parse("$.rows[1"),
            Err(PathError::UnclosedBracket { position: 6 })
        );
        assert_eq!(
            JsonPath::parse("$[abc]"),
            Err(PathError::InvalidSelector("abc".into()))
        );
        assert!(matches!(
            JsonPath::parse("$.a..b"),
            Err(PathError::UnexpectedChar { ch: '.', .. })
        ));
        assert!(matches!(
            JsonPath::parse("$x"),
            Err(PathError::UnexpectedChar { ch: 'x', position: 1 })
        ));
    }

    #[test]
    fn display_normalizes() {
        let path = JsonPath::parse("rows[0]['two words'][*]").unwrap();
        assert_eq!(path.to_string(), "$.rows[0]['two words'][*]");
        assert!(JsonPath::parse("$").unwrap().is_root());
    }
}
