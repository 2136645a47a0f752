//! Call parameters and their wire encoding.
//!
//! A logical call is described by an ordered map of typed values.
//! [`normalize`] turns it into the flat string pairs the API expects.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};

/// Separator used for multi-value parameters whose elements contain `|`.
///
/// The API recognizes a value starting with U+001F as joined by U+001F
/// instead of the pipe.
pub const MULTI_VALUE_SEPARATOR: char = '\u{1f}';

/// Values longer than this (in characters) switch the body to multipart.
pub const LONG_FIELD_THRESHOLD: usize = 8000;

/// Parameters whose values never appear in Debug output.
const SENSITIVE_PARAMS: &[&str] = &[
    "token",
    "lgtoken",
    "lgpassword",
    "logintoken",
    "createtoken",
    "password",
    "retype",
];

/// A file to upload as a multipart part.
#[derive(Clone, PartialEq)]
pub struct FileUpload {
    /// File name sent in the part's content disposition.
    pub filename: String,
    /// File contents.
    pub data: Bytes,
}

impl std::fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileUpload")
            .field("filename", &self.filename)
            .field("len", &self.data.len())
            .finish()
    }
}

impl FileUpload {
    /// Create a new file upload.
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    /// `true` is sent as `"1"`, `false` removes the parameter.
    Bool(bool),
    Int(i64),
    Float(f64),
    TextList(Vec<String>),
    IntList(Vec<i64>),
    File(FileUpload),
    /// Sent as an ISO 8601 timestamp with millisecond precision.
    Date(DateTime<Utc>),
    /// Removes the parameter, including one inherited from defaults.
    Unset,
}

impl ParamValue {
    /// Borrow the string if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<&String> for ParamValue {
    fn from(v: &String) -> Self {
        ParamValue::Text(v.clone())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::TextList(v)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(v: Vec<&str>) -> Self {
        ParamValue::TextList(v.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for ParamValue {
    fn from(v: &[&str]) -> Self {
        ParamValue::TextList(v.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        ParamValue::IntList(v)
    }
}

impl From<FileUpload> for ParamValue {
    fn from(v: FileUpload) -> Self {
        ParamValue::File(v)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(v: DateTime<Utc>) -> Self {
        ParamValue::Date(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::Unset)
    }
}

/// Ordered parameters for one logical API call.
///
/// Setting an existing key replaces its value in place. Sensitive values
/// (passwords, tokens) are redacted in Debug output.
#[derive(Clone, Default, PartialEq)]
pub struct CallParams {
    entries: Vec<(String, ParamValue)>,
}

impl std::fmt::Debug for CallParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.entries {
            if SENSITIVE_PARAMS.contains(&key.as_str()) {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

impl CallParams {
    /// Create empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a parameter, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Get a parameter value.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Get a text parameter.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_str)
    }

    /// Remove a parameter.
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Returns true if the key is present (even if it would serialize to nothing).
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The `action` parameter.
    pub fn action(&self) -> Option<&str> {
        self.get_str("action")
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Layer these parameters over `defaults`; keys set here win.
    pub fn merged_over(&self, defaults: &CallParams) -> CallParams {
        let mut merged = defaults.clone();
        for (key, value) in &self.entries {
            merged.set(key.clone(), value.clone());
        }
        merged
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for CallParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = CallParams::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

impl<K: Into<String>, V: Into<ParamValue>, const N: usize> From<[(K, V); N]> for CallParams {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// A wire-ready value.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Text(String),
    File(FileUpload),
}

/// Normalized parameters, ready for a query string or request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireParams {
    /// Fields in insertion order.
    pub fields: Vec<(String, WireValue)>,
    /// True if any text value exceeds [`LONG_FIELD_THRESHOLD`] characters.
    pub has_long_field: bool,
}

impl WireParams {
    /// Returns true if any field is a file.
    pub fn has_files(&self) -> bool {
        self.fields
            .iter()
            .any(|(_, v)| matches!(v, WireValue::File(_)))
    }

    /// Text fields as owned pairs; files are skipped.
    pub fn text_pairs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .filter_map(|(k, v)| match v {
                WireValue::Text(s) => Some((k.clone(), s.clone())),
                WireValue::File(_) => None,
            })
            .collect()
    }

    /// Look up a text field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.iter().find_map(|(k, v)| match v {
            WireValue::Text(s) if k == key => Some(s.as_str()),
            _ => None,
        })
    }
}

/// Join list elements with `|`, or with U+001F (prefixed) if any element has a pipe.
pub fn join_multi_value<S: AsRef<str>>(values: &[S]) -> String {
    if values.iter().any(|v| v.as_ref().contains('|')) {
        let sep = MULTI_VALUE_SEPARATOR.to_string();
        let joined = values
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(&sep);
        format!("{}{}", MULTI_VALUE_SEPARATOR, joined)
    } else {
        values
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Convert typed parameters to wire form.
///
/// `false` and [`ParamValue::Unset`] drop the key; `true` becomes `"1"`.
pub fn normalize(params: &CallParams) -> WireParams {
    let mut wire = WireParams::default();

    for (key, value) in params.iter() {
        let text = match value {
            ParamValue::Unset | ParamValue::Bool(false) => continue,
            ParamValue::Bool(true) => "1".to_string(),
            ParamValue::Text(s) => s.clone(),
            ParamValue::Int(n) => n.to_string(),
            ParamValue::Float(n) => n.to_string(),
            ParamValue::TextList(list) => join_multi_value(list),
            ParamValue::IntList(list) => {
                let list: Vec<String> = list.iter().map(|n| n.to_string()).collect();
                join_multi_value(&list)
            }
            ParamValue::Date(date) => date.to_rfc3339_opts(SecondsFormat::Millis, true),
            ParamValue::File(file) => {
                wire.fields
                    .push((key.to_string(), WireValue::File(file.clone())));
                continue;
            }
        };

        if text.chars().count() > LONG_FIELD_THRESHOLD {
            wire.has_long_field = true;
        }
        wire.fields.push((key.to_string(), WireValue::Text(text)));
    }

    wire
}
