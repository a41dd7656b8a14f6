//! Lucene-syntax clause builder
//!
//! A [`LuceneQuery`] is an ordered list of term clauses rendered into the
//! query string syntax understood by the engine's `query_string` query. The
//! rendered text is embedded verbatim into the request body.

use serde_json::Value;
use std::fmt;

/// Characters that force a value to be quoted
const SPECIAL_CHARS: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\',
    '/',
];

/// A single value matched by a term clause
#[derive(Debug, Clone, PartialEq)]
pub enum TermValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl TermValue {
    /// Convert a JSON scalar into a term value; containers and null yield `None`
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            _ => None,
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for TermValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => {
                if s.chars().any(|c| c.is_whitespace() || SPECIAL_CHARS.contains(&c)) {
                    write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
                } else {
                    f.write_str(s)
                }
            }
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for TermValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for TermValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&String> for TermValue {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<i64> for TermValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for TermValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<u32> for TermValue {
    fn from(i: u32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for TermValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for TermValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Term {
        field: Option<String>,
        value: TermValue,
        boost: Option<f64>,
        fuzziness: Option<f64>,
    },
    Collection {
        field: String,
        values: Vec<TermValue>,
    },
    Raw(String),
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Term {
                field,
                value,
                boost,
                fuzziness,
            } => {
                if let Some(field) = field {
                    write!(f, "{field}:")?;
                }
                write!(f, "{value}")?;
                if let Some(fuzziness) = fuzziness {
                    write!(f, "~{fuzziness}")?;
                }
                if let Some(boost) = boost {
                    write!(f, "^{boost}")?;
                }
                Ok(())
            }
            Clause::Collection { field, values } => {
                let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{}:({})", field, parts.join(" OR "))
            }
            Clause::Raw(text) => f.write_str(text),
        }
    }
}

/// Ordered collection of Lucene clauses
///
/// One clause renders bare, several are space separated inside parentheses,
/// letting the engine apply its default operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LuceneQuery {
    clauses: Vec<Clause>,
}

impl LuceneQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Match `value` exactly on `field`
    pub fn match_term(&mut self, field: &str, value: impl Into<TermValue>) -> &mut Self {
        self.match_term_with(Some(field), value, None, None)
    }

    /// Match `value` with optional field, boost and fuzziness
    ///
    /// Blank text values are ignored.
    pub fn match_term_with(
        &mut self,
        field: Option<&str>,
        value: impl Into<TermValue>,
        boost: Option<f64>,
        fuzziness: Option<f64>,
    ) -> &mut Self {
        let value = value.into();
        if value.is_blank() {
            return self;
        }
        self.clauses.push(Clause::Term {
            field: field.filter(|f| !f.is_empty()).map(str::to_string),
            value,
            boost,
            fuzziness,
        });
        self
    }

    /// Match any of `values` on `field`; an empty collection is ignored
    pub fn match_term_collection<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<TermValue>,
    {
        let values: Vec<TermValue> = values
            .into_iter()
            .map(Into::into)
            .filter(|v| !v.is_blank())
            .collect();
        if !values.is_empty() {
            self.clauses.push(Clause::Collection {
                field: field.to_string(),
                values,
            });
        }
        self
    }

    /// Append pre-rendered query text as is
    pub fn raw(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.clauses.push(Clause::Raw(text));
        }
        self
    }

    pub fn clear(&mut self) {
        self.clauses.clear();
    }
}

impl fmt::Display for LuceneQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.clauses.as_slice() {
            [] => Ok(()),
            [single] => write!(f, "{single}"),
            clauses => {
                let parts: Vec<String> = clauses.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(" "))
            }
        }
    }
}
