//! Base names and source block query strings.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Error, LegacyValue, PropertySet, Result};

/// Namespace-stripped, lowercased block name shared by every variant of one block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BaseName(String);

impl BaseName {
    pub fn new(raw: &str) -> Self {
        let t = raw.trim();
        let base = t.rsplit_once(':').map(|(_, b)| b).unwrap_or(t);
        BaseName(base.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for BaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for BaseName {
    fn as_ref(&self) -> &str { &self.0 }
}

impl Borrow<str> for BaseName {
    fn borrow(&self) -> &str { &self.0 }
}

impl From<&str> for BaseName {
    fn from(raw: &str) -> Self { BaseName::new(raw) }
}

impl From<&String> for BaseName {
    fn from(raw: &String) -> Self { BaseName::new(raw) }
}

/// A source block written as `name`, `name[state]`, `name{state}`, `name state` or
/// `name <legacy value>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockQuery {
    Legacy { name: BaseName, value: LegacyValue },
    State { name: BaseName, props: PropertySet },
}

impl BlockQuery {
    pub fn name(&self) -> &BaseName {
        match self {
            BlockQuery::Legacy { name, .. } | BlockQuery::State { name, .. } => name,
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let (name, rest) = split_block_string(text);
        if name.is_empty() {
            return Err(Error::malformed(text, "missing block name"));
        }
        let name = BaseName::new(name);
        let Some(rest) = rest else {
            return Ok(BlockQuery::State { name, props: PropertySet::new() });
        };
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            let value = rest
                .parse::<LegacyValue>()
                .map_err(|_| Error::malformed(text, format!("legacy value out of range: {rest}")))?;
            return Ok(BlockQuery::Legacy { name, value });
        }
        let props = PropertySet::parse(rest)?;
        Ok(BlockQuery::State { name, props })
    }

    /// Like [`BlockQuery::parse`], but an unreadable state degrades to an empty property set.
    pub fn parse_lenient(text: &str) -> Self {
        match Self::parse(text) {
            Ok(q) => q,
            Err(e) => {
                warn!(input = %text, error = %e, "unreadable block state; querying without properties");
                let (name, _) = split_block_string(text);
                BlockQuery::State { name: BaseName::new(name), props: PropertySet::new() }
            }
        }
    }
}

fn split_block_string(text: &str) -> (&str, Option<&str>) {
    let t = text.trim();
    if let Some(i) = t.find(['[', '{']) {
        return (t[..i].trim(), Some(t[i..].trim()));
    }
    match t.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, Some(rest.trim())),
        None => (t, None),
    }
}
