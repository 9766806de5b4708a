//! Request fields and their canonical form
//!
//! The server recomputes the digest over the same canonical string, so the
//! encoding here must be byte-for-byte deterministic: pairs sorted by name,
//! each name and value query-escaped, joined with `=` and `&`.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::certificate::CertificateStatus;

/// Value of a single request field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    /// Sent as the status wire name (`good`, `revoked`, ...)
    Status(CertificateStatus),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Status(status) => f.write_str(status.as_str()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<&String> for FieldValue {
    fn from(s: &String) -> Self {
        FieldValue::Text(s.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<CertificateStatus> for FieldValue {
    fn from(status: CertificateStatus) -> Self {
        FieldValue::Status(status)
    }
}

/// Ordered collection of request fields
///
/// Names must be unique within one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    pairs: Vec<(String, FieldValue)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        debug_assert!(!self.contains(&name), "duplicate field name: {}", name);
        self.pairs.push((name, value.into()));
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.pairs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Field names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Sort in place by name, comparing bytes
    pub fn sort(&mut self) {
        self.pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    }

    /// Sorted, percent-encoded `name=value&...` string used for signing
    ///
    /// Does not depend on insertion order.
    pub fn to_canonical_form(&self) -> String {
        let mut sorted: Vec<&(String, FieldValue)> = self.pairs.iter().collect();
        sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

        sorted
            .into_iter()
            .map(|(name, value)| format!("{}={}", encode(name), encode(&value.to_string())))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<N, V> FromIterator<(N, V)> for Fields
where
    N: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (name, value) in iter {
            fields.push(name, value);
        }
        fields
    }
}

/// Bytes left as is in a query component: alphanumerics and `-_.~`
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Query-escape one component, space as `+`
///
/// `*` becomes `%2A` and `~` is kept, which the verifier reproduces.
pub(crate) fn encode(s: &str) -> String {
    // A literal "%20" in the input is escaped to "%2520", so this only hits spaces
    utf8_percent_encode(s, QUERY_COMPONENT)
        .to_string()
        .replace("%20", "+")
}
