//! Typed property values and property sets.
//!
//! A [`PropertySet`] keeps its pairs sorted by name. That order is what the canonical key
//! is rendered in, and it lets [`PropertySet::compare`] walk both sets in one merge pass.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Boolean or small integer (`0b`/`1b`, `true`/`false`).
    Byte(u8),
    Int(i32),
    Text(String),
}

impl PropertyValue {
    pub fn as_byte(&self) -> Option<u8> {
        match self { PropertyValue::Byte(b) => Some(*b), _ => None }
    }
    pub fn as_int(&self) -> Option<i32> {
        match self { PropertyValue::Int(i) => Some(*i), _ => None }
    }
    pub fn as_text(&self) -> Option<&str> {
        match self { PropertyValue::Text(s) => Some(s), _ => None }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Byte(b) => write!(f, "{}b", b),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self { PropertyValue::Byte(v as u8) }
}
impl From<u8> for PropertyValue {
    fn from(v: u8) -> Self { PropertyValue::Byte(v) }
}
impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self { PropertyValue::Int(v) }
}
impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self { PropertyValue::Text(v.to_string()) }
}
impl From<String> for PropertyValue {
    fn from(v: String) -> Self { PropertyValue::Text(v) }
}

/// Outcome of comparing a query set against a candidate set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparedOutput {
    /// Present in both with equal values.
    pub same: u32,
    /// Present in both, values differ.
    pub different: u32,
    /// Present in the candidate only.
    pub redundant: u32,
    /// Present in the query only.
    pub missing: u32,
}

impl ComparedOutput {
    /// Sum of every non-matching count; lower is closer.
    pub fn mismatch(&self) -> u32 { self.different + self.redundant + self.missing }

    /// Whether `self` ranks strictly ahead of `other` in a best-match scan.
    pub fn beats(&self, other: &ComparedOutput) -> bool {
        self.same > other.same || (self.same == other.same && self.mismatch() < other.mismatch())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertySet {
    pairs: SmallVec<[(String, PropertyValue); 8]>,
}

impl PropertySet {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.pairs.len() }
    pub fn is_empty(&self) -> bool { self.pairs.is_empty() }

    /// Parse the textual (brace, bracket or SNBT-like) form.
    pub fn parse(text: &str) -> Result<Self> { crate::parse::parse_property_set(text) }

    /// Build a set from an NBT-like JSON object of bool, integer and string values.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let obj = match value {
            serde_json::Value::Object(obj) => obj,
            serde_json::Value::Null => return Ok(Self::new()),
            other => return Err(Error::malformed(&other.to_string(), "expected an object of properties")),
        };
        let mut set = Self::new();
        for (name, v) in obj.iter() {
            let value = match v {
                serde_json::Value::Bool(b) => PropertyValue::from(*b),
                serde_json::Value::String(s) => PropertyValue::Text(s.clone()),
                serde_json::Value::Number(n) => {
                    let i = n
                        .as_i64()
                        .and_then(|i| i32::try_from(i).ok())
                        .ok_or_else(|| Error::malformed(&n.to_string(), format!("property {name} is not a 32-bit integer")))?;
                    PropertyValue::Int(i)
                }
                other => {
                    return Err(Error::malformed(&other.to_string(), format!("unsupported value kind for property {name}")))
                }
            };
            set.insert(name.clone(), value);
        }
        Ok(set)
    }

    /// Insert or replace a property, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Option<PropertyValue> {
        let name = name.into();
        let value = value.into();
        match self.pairs.binary_search_by(|(n, _)| n.as_str().cmp(&name)) {
            Ok(i) => Some(std::mem::replace(&mut self.pairs[i].1, value)),
            Err(i) => {
                self.pairs.insert(i, (name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.pairs
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| &self.pairs[i].1)
    }

    pub fn contains(&self, name: &str) -> bool { self.get(name).is_some() }

    /// Pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> + '_ {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Whitespace-free exact-match key, e.g. `{color=red,open=1b,rot=3}`.
    pub fn canonical_key(&self) -> String {
        let mut out = String::with_capacity(2 + self.pairs.len() * 16);
        out.push('{');
        for (i, (n, v)) in self.pairs.iter().enumerate() {
            if i > 0 { out.push(','); }
            out.push_str(n);
            out.push('=');
            out.push_str(&v.to_string());
        }
        out.push('}');
        out
    }

    /// Brace form for persisting: the canonical key, except that names and text values
    /// are quoted wherever the bare form would not parse back to the same pair.
    pub fn record_form(&self) -> String {
        use crate::parse::{name_needs_quotes, quote, text_needs_quotes};
        let mut out = String::with_capacity(2 + self.pairs.len() * 16);
        out.push('{');
        for (i, (n, v)) in self.pairs.iter().enumerate() {
            if i > 0 { out.push(','); }
            if name_needs_quotes(n) { out.push_str(&quote(n)); } else { out.push_str(n); }
            out.push('=');
            match v {
                PropertyValue::Text(t) if text_needs_quotes(t) => out.push_str(&quote(t)),
                other => out.push_str(&other.to_string()),
            }
        }
        out.push('}');
        out
    }

    /// Compare `self` as the query against `candidate`.
    pub fn compare(&self, candidate: &PropertySet) -> ComparedOutput {
        let mut out = ComparedOutput::default();
        let (q, c) = (&self.pairs, &candidate.pairs);
        let (mut i, mut j) = (0usize, 0usize);
        while i < q.len() && j < c.len() {
            match q[i].0.cmp(&c[j].0) {
                Ordering::Less => { out.missing += 1; i += 1; }
                Ordering::Greater => { out.redundant += 1; j += 1; }
                Ordering::Equal => {
                    if q[i].1 == c[j].1 { out.same += 1; } else { out.different += 1; }
                    i += 1;
                    j += 1;
                }
            }
        }
        out.missing += (q.len() - i) as u32;
        out.redundant += (c.len() - j) as u32;
        out
    }
}

impl fmt::Display for PropertySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.canonical_key()) }
}

impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for PropertySet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = PropertySet::new();
        for (k, v) in iter { set.insert(k, v); }
        set
    }
}
