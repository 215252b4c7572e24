//! Query Engine
//!
//! Turns a logical query (a type tag plus at most one equality
//! predicate) into a prefix range scan and filters client-side.
//!
//! There are no secondary indexes: every query walks the whole type
//! range, so cost is linear in the number of documents of that type.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::model::{type_range, Document};
use crate::store::{DocumentStore, Scan};

/// A scanned payload
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Payload parsed as a JSON object
    Structured(Map<String, Value>),

    /// Anything else, kept verbatim
    Opaque(Bytes),
}

impl Record {
    /// Parse a payload; never fails
    pub fn parse(payload: Bytes) -> Self {
        match serde_json::from_slice::<Value>(&payload) {
            Ok(Value::Object(fields)) => Record::Structured(fields),
            _ => Record::Opaque(payload),
        }
    }

    /// Field value, if this is a structured record that has it
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Record::Structured(fields) => fields.get(name),
            Record::Opaque(_) => None,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Record::Opaque(_))
    }
}

/// One query result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub key: Vec<u8>,
    pub record: Record,
}

/// Type tag plus an optional `field == value` predicate
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    doc_type: String,
    predicate: Option<(String, Value)>,
}

impl Query {
    /// Every document of `doc_type`
    pub fn by_type(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            predicate: None,
        }
    }

    /// Keep only records whose `field` equals `value`
    ///
    /// Only one predicate is supported; a second call replaces the first.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicate = Some((field.into(), value.into()));
        self
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    pub fn predicate(&self) -> Option<(&str, &Value)> {
        self.predicate.as_ref().map(|(f, v)| (f.as_str(), v))
    }

    fn matches(&self, record: &Record) -> bool {
        match &self.predicate {
            None => true,
            Some((field, value)) => record.field(field) == Some(value),
        }
    }
}

/// Run a query lazily, in ascending key order
pub fn query_by_type<'a, S>(store: &'a S, query: &Query) -> Result<QueryIter<'a>>
where
    S: DocumentStore + ?Sized,
{
    let (low, high) = type_range(query.doc_type());
    tracing::debug!(
        doc_type = query.doc_type(),
        predicate = ?query.predicate(),
        "Scanning type range"
    );
    Ok(QueryIter {
        scan: store.scan(&low, &high)?,
        query: query.clone(),
    })
}

/// Run a query and collect every hit
pub fn collect_query<S>(store: &S, query: &Query) -> Result<Vec<QueryHit>>
where
    S: DocumentStore + ?Sized,
{
    query_by_type(store, query)?.collect()
}

/// Run a query and decode structured hits as `T`
///
/// A structured record that does not decode is an error; opaque payloads
/// are skipped.
pub fn load_documents<T, S>(store: &S, query: &Query) -> Result<Vec<T>>
where
    T: Document,
    S: DocumentStore + ?Sized,
{
    let mut documents = Vec::new();
    for hit in query_by_type(store, query)? {
        let hit = hit?;
        match &hit.record {
            Record::Structured(fields) => documents.push(T::from_fields(fields)?),
            Record::Opaque(payload) => {
                tracing::warn!(
                    key = %String::from_utf8_lossy(&hit.key),
                    bytes = payload.len(),
                    "Skipping opaque {} payload",
                    T::DOC_TYPE
                );
            }
        }
    }
    Ok(documents)
}

/// Lazy query results
pub struct QueryIter<'a> {
    scan: Scan<'a>,
    query: Query,
}

impl Iterator for QueryIter<'_> {
    type Item = Result<QueryHit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, payload) = match self.scan.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };
            let record = Record::parse(payload);
            if self.query.matches(&record) {
                return Some(Ok(QueryHit { key, record }));
            }
        }
    }
}
