//! Typed expressions for the backend's list query language.
//!
//! A [`Query`] renders (via `Display`) to the restricted expression string
//! the backend's list endpoint accepts, e.g.
//! `trashed=False and name='notes.txt' and 'root' in parents`.

use crate::object::ObjectRecord;
use std::fmt;

/// Escapes a literal for use inside single quotes.
pub fn escape<S: AsRef<str>>(value: S) -> String {
    value.as_ref().replace('\\', "\\\\").replace('\'', "\\'")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Trashed(bool),
    /// Case-insensitive on the backend.
    NameEquals(String),
    NameContains(String),
    MimeTypeEquals(String),
    InParents(String),
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
}

impl Query {
    /// Lookup of a single live child by name.
    pub fn child_named<P: Into<String>, N: Into<String>>(parent_id: P, name: N) -> Self {
        Query::And(vec![
            Query::Trashed(false),
            Query::NameEquals(name.into()),
            Query::InParents(parent_id.into()),
        ])
    }

    /// All live children of a folder.
    pub fn children_of<P: Into<String>>(parent_id: P) -> Self {
        Query::And(vec![Query::Trashed(false), Query::InParents(parent_id.into())])
    }

    pub fn name_equals<N: Into<String>>(name: N) -> Self {
        Query::NameEquals(name.into())
    }

    pub fn name_contains<N: Into<String>>(fragment: N) -> Self {
        Query::NameContains(fragment.into())
    }

    pub fn mime_type_equals<M: Into<String>>(mime_type: M) -> Self {
        Query::MimeTypeEquals(mime_type.into())
    }

    pub fn and(self, other: Query) -> Self {
        match self {
            Query::And(mut items) => {
                items.push(other);
                Query::And(items)
            }
            first => Query::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Query) -> Self {
        match self {
            Query::Or(mut items) => {
                items.push(other);
                Query::Or(items)
            }
            first => Query::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Query::Not(Box::new(self))
    }

    /// True if the expression already constrains the trashed flag.
    pub fn mentions_trashed(&self) -> bool {
        match self {
            Query::Trashed(_) => true,
            Query::And(items) | Query::Or(items) => items.iter().any(Query::mentions_trashed),
            Query::Not(inner) => inner.mentions_trashed(),
            _ => false,
        }
    }

    /// Evaluates the expression against a record the way the backend does.
    pub fn matches(&self, record: &ObjectRecord) -> bool {
        match self {
            Query::Trashed(trashed) => record.trashed == *trashed,
            Query::NameEquals(name) => record.name.to_lowercase() == name.to_lowercase(),
            Query::NameContains(fragment) => record
                .name
                .to_lowercase()
                .contains(&fragment.to_lowercase()),
            Query::MimeTypeEquals(mime_type) => record.mime_type == *mime_type,
            Query::InParents(parent_id) => record.parents.iter().any(|p| p == parent_id),
            Query::And(items) => items.iter().all(|q| q.matches(record)),
            Query::Or(items) => items.iter().any(|q| q.matches(record)),
            Query::Not(inner) => !inner.matches(record),
        }
    }

    fn is_compound(&self) -> bool {
        matches!(self, Query::And(items) | Query::Or(items) if items.len() > 1)
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_compound() {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }

    fn fmt_joined(items: &[Query], op: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                write!(f, " {op} ")?;
            }
            item.fmt_operand(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Trashed(true) => write!(f, "trashed=True"),
            Query::Trashed(false) => write!(f, "trashed=False"),
            Query::NameEquals(name) => write!(f, "name='{}'", escape(name)),
            Query::NameContains(fragment) => write!(f, "name contains '{}'", escape(fragment)),
            Query::MimeTypeEquals(mime_type) => write!(f, "mimeType='{}'", escape(mime_type)),
            Query::InParents(parent_id) => write!(f, "'{}' in parents", escape(parent_id)),
            Query::And(items) => Self::fmt_joined(items, "and", f),
            Query::Or(items) => Self::fmt_joined(items, "or", f),
            Query::Not(inner) => {
                write!(f, "not ")?;
                inner.fmt_operand(f)
            }
        }
    }
}
