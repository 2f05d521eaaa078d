//! Core data models for the advisory pipeline.
//!
//! These types represent the normalized catalog records that flow from
//! ingestion into the vector index and out through retrieval.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An attribute value parsed from one record line.
///
/// A value whose serialized form looks like a bracketed list
/// (`['AI', 'ML']`) becomes a `List`; everything else stays a `Scalar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Scalar(String),
    List(Vec<String>),
}

impl AttrValue {
    /// The scalar text, or the list elements joined for display.
    pub fn as_text(&self) -> String {
        match self {
            AttrValue::Scalar(s) => s.clone(),
            AttrValue::List(items) => items.join(", "),
        }
    }
}

/// Attribute map derived from a record body. Keys are always a subset of
/// the owning catalog's header set.
pub type Attributes = HashMap<String, AttrValue>;

/// Normalized unit of retrievable text plus its structured attributes.
///
/// Created during ingestion and immutable afterwards. The body is sanitized
/// (no null bytes, valid UTF-8) before the Document is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Identifier derived from the catalog's identifying attribute, or a
    /// row ordinal when that attribute is absent. Chunked documents carry
    /// `<parent>#<n>` ids so siblings stay traceable to the same record.
    pub id: Option<String>,
    /// The rendered record text.
    pub body: String,
    /// Attributes parsed from the body.
    pub attributes: Attributes,
}
