//! Ordered request parameter collections and URL encoding

use std::borrow::Cow;

/// A source of request parameters.
///
/// Implementors hand back all of their parameters as ordered key/value pairs so they
/// can be bulk-added to a request as query parameters, headers or body fields.
pub trait RequestParameters {
    /// Return every parameter as an ordered collection of key/value pairs
    fn to_pairs(&self) -> Vec<(String, String)>;
}

/// Ordered list of name/value pairs.
///
/// Insertion order is preserved and duplicate names are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    pairs: Vec<(String, String)>,
}

impl Parameters {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// Append every pair produced by `source`
    pub fn extend_from(&mut self, source: &impl RequestParameters) {
        self.pairs.extend(source.to_pairs());
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over the pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl RequestParameters for Parameters {
    fn to_pairs(&self) -> Vec<(String, String)> {
        self.pairs.clone()
    }
}

impl<K, V> RequestParameters for [(K, V)]
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn to_pairs(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect()
    }
}

impl<K, V> RequestParameters for Vec<(K, V)>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn to_pairs(&self) -> Vec<(String, String)> {
        self.as_slice().to_pairs()
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Percent-encode the pairs as `name=value` joined by `&`.
///
/// Names and values are UTF-8 encoded; everything outside `A-Z a-z 0-9 - _ . ~`
/// becomes `%XX`, so a space is written as `%20`. An empty collection encodes to
/// an empty string.
pub fn url_encode_parameters(parameters: &Parameters) -> String {
    parameters
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Inverse of [`url_encode_parameters`], used to inspect encoded bodies.
pub fn url_decode_parameters(encoded: &str) -> Option<Parameters> {
    if encoded.is_empty() {
        return Some(Parameters::new());
    }

    encoded
        .split('&')
        .map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name: Cow<'_, str> = urlencoding::decode(name).ok()?;
            let value: Cow<'_, str> = urlencoding::decode(value).ok()?;
            Some((name.into_owned(), value.into_owned()))
        })
        .collect()
}
