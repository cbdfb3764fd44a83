//! YAML frontmatter splitting and validation.
//!
//! A document may start with a `---` line, followed by a YAML mapping of
//! scalar values and a closing `---` line. Everything after the closing line
//! is the body, kept byte-for-byte.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::Value;

/// A frontmatter value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Text.
    String(String),
    /// Whole number.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Explicit null (`key:` or `key: ~`).
    Null,
}

impl Scalar {
    /// String value, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Frontmatter key/value pairs, ordered by key.
pub type Frontmatter = BTreeMap<String, Scalar>;

/// Error for malformed frontmatter.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrontmatterError {
    /// Opening delimiter without a closing one.
    #[error("frontmatter is not terminated by a closing '---' line")]
    Unterminated,
    /// The block is not valid YAML.
    #[error("invalid frontmatter YAML: {0}")]
    Yaml(String),
    /// The block is valid YAML but not a mapping.
    #[error("frontmatter must be a mapping")]
    NotAMapping,
    /// A key is not a string.
    #[error("frontmatter keys must be strings")]
    NonStringKey,
    /// A value is a list or a nested mapping.
    #[error("frontmatter value for '{0}' must be a scalar")]
    NonScalar(String),
    /// The `order` key is present but not an integer.
    #[error("frontmatter 'order' must be an integer")]
    InvalidOrder,
}

/// Parsed frontmatter plus the remaining body.
#[derive(Clone, Debug, PartialEq)]
pub struct Parsed<'a> {
    /// Validated key/value pairs (empty without frontmatter).
    pub frontmatter: Frontmatter,
    /// Body after the closing delimiter.
    pub body: &'a str,
    /// Value of the `order` key.
    pub order: Option<i64>,
}

/// Whether a line (without its terminator) is a `---` delimiter.
fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']).trim_end() == "---"
}

/// Split raw content into the frontmatter block (if any) and the body.
fn split(content: &str) -> Result<(Option<&str>, &str), FrontmatterError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut lines = content.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Ok((None, content));
    };
    if !is_delimiter(first) {
        return Ok((None, content));
    }

    let block_start = first.len();
    let mut offset = block_start;
    for line in lines {
        if is_delimiter(line) {
            let block = &content[block_start..offset];
            let body = &content[offset + line.len()..];
            return Ok((Some(block), body));
        }
        offset += line.len();
    }

    Err(FrontmatterError::Unterminated)
}

fn to_scalar(key: &str, value: Value) -> Result<Scalar, FrontmatterError> {
    match value {
        Value::Null => Ok(Scalar::Null),
        Value::Bool(b) => Ok(Scalar::Bool(b)),
        Value::String(s) => Ok(Scalar::String(s)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Scalar::Integer(i)),
            None => n
                .as_f64()
                .map(Scalar::Float)
                .ok_or_else(|| FrontmatterError::NonScalar(key.to_owned())),
        },
        Value::Tagged(tagged) => to_scalar(key, tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => Err(FrontmatterError::NonScalar(key.to_owned())),
    }
}

/// Parse and validate the frontmatter of a document.
pub fn parse(content: &str) -> Result<Parsed<'_>, FrontmatterError> {
    let (block, body) = split(content)?;
    let Some(block) = block else {
        return Ok(Parsed {
            frontmatter: Frontmatter::new(),
            body,
            order: None,
        });
    };

    let value: Value = if block.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(block).map_err(|e| FrontmatterError::Yaml(e.to_string()))?
    };
    let mapping = match value {
        Value::Null => serde_yaml::Mapping::new(),
        Value::Mapping(mapping) => mapping,
        _ => return Err(FrontmatterError::NotAMapping),
    };

    let mut frontmatter = Frontmatter::new();
    for (key, value) in mapping {
        let Value::String(key) = key else {
            return Err(FrontmatterError::NonStringKey);
        };
        let scalar = to_scalar(&key, value)?;
        frontmatter.insert(key, scalar);
    }

    let order = match frontmatter.get("order") {
        None | Some(Scalar::Null) => None,
        Some(Scalar::Integer(order)) => Some(*order),
        Some(_) => return Err(FrontmatterError::InvalidOrder),
    };

    Ok(Parsed {
        frontmatter,
        body,
        order,
    })
}
