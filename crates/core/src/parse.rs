//! Text parser for property sets.
//!
//! Accepted shapes: `{a=1,b="x"}`, `["a":1b,"b":'x']`, `a=true, b=north` and the empty
//! string. Nested compounds and lists are not part of block states and are rejected.

use crate::{Error, PropertySet, PropertyValue, Result};

pub fn parse_property_set(text: &str) -> Result<PropertySet> {
    let inner = strip_enclosing(text)?;
    let mut set = PropertySet::new();
    if inner.trim().is_empty() {
        return Ok(set);
    }
    for segment in split_outside_quotes(text, inner, |c| c == ',')? {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(Error::malformed(text, "empty property entry"));
        }
        let (name, value) = split_pair(text, segment)?;
        if set.contains(&name) {
            return Err(Error::malformed(text, format!("duplicate property {name}")));
        }
        set.insert(name, value);
    }
    Ok(set)
}

fn strip_enclosing(text: &str) -> Result<&str> {
    let t = text.trim();
    let open = t.chars().next();
    let close = t.chars().last();
    match (open, close) {
        (Some('{'), Some('}')) | (Some('['), Some(']')) if t.len() >= 2 => Ok(&t[1..t.len() - 1]),
        (Some('{'), _) | (Some('['), _) => Err(Error::malformed(text, "unbalanced delimiters")),
        (_, Some('}')) | (_, Some(']')) => Err(Error::malformed(text, "unbalanced delimiters")),
        _ => Ok(t),
    }
}

/// Split `s` on every char matching `is_sep` that sits outside a quoted span.
fn split_outside_quotes<'a>(input: &str, s: &'a str, is_sep: impl Fn(char) -> bool) -> Result<Vec<&'a str>> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' | '}' | '[' | ']' => {
                return Err(Error::malformed(input, "unbalanced delimiters or nested value"))
            }
            _ if is_sep(c) => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(Error::malformed(input, "unterminated quote"));
    }
    parts.push(&s[start..]);
    Ok(parts)
}

fn split_pair(input: &str, segment: &str) -> Result<(String, PropertyValue)> {
    // `=` wins over `:` so namespaced names like `minecraft:facing=north` split at `=`.
    let at = find_unquoted(segment, '=')
        .or_else(|| find_unquoted(segment, ':'))
        .ok_or_else(|| Error::malformed(input, format!("missing '=' in {segment:?}")))?;
    let raw_name = segment[..at].trim();
    let name = if is_quoted(raw_name) { unquote(input, raw_name)? } else { raw_name.to_string() };
    if name.is_empty() {
        return Err(Error::malformed(input, "empty property name"));
    }
    let value = parse_value(input, segment[at + 1..].trim())?;
    Ok((name, value))
}

fn find_unquoted(segment: &str, sep: char) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in segment.char_indices() {
        if let Some(q) = quote {
            if escaped { escaped = false; } else if c == '\\' { escaped = true; } else if c == q { quote = None; }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            _ if c == sep => return Some(i),
            _ => {}
        }
    }
    None
}

/// Whether a bare literal would read back as something other than this text.
pub(crate) fn text_needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s == "true"
        || s == "false"
        || looks_numeric(s)
        || name_needs_quotes(s)
}

pub(crate) fn name_needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.chars().any(|c| c.is_whitespace() || matches!(c, ',' | '=' | '"' | '\'' | '\\' | '{' | '}' | '[' | ']'))
}

pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn is_quoted(s: &str) -> bool {
    s.len() >= 2 && (s.starts_with('"') && s.ends_with('"') || s.starts_with('\'') && s.ends_with('\''))
}

fn unquote(input: &str, s: &str) -> Result<String> {
    if !is_quoted(s) {
        return Err(Error::malformed(input, format!("unterminated quote in {s:?}")));
    }
    let body = &s[1..s.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(e) => out.push(e),
                None => return Err(Error::malformed(input, "dangling escape")),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn parse_value(input: &str, raw: &str) -> Result<PropertyValue> {
    if raw.is_empty() {
        return Err(Error::malformed(input, "missing value"));
    }
    if raw.starts_with('"') || raw.starts_with('\'') {
        return unquote(input, raw).map(PropertyValue::Text);
    }
    match raw {
        "true" => return Ok(PropertyValue::Byte(1)),
        "false" => return Ok(PropertyValue::Byte(0)),
        _ => {}
    }
    if looks_numeric(raw) {
        if let Some(digits) = raw.strip_suffix('b').or_else(|| raw.strip_suffix('B')) {
            return digits
                .parse::<u8>()
                .map(PropertyValue::Byte)
                .map_err(|_| Error::malformed(input, format!("byte literal out of range: {raw}")));
        }
        return raw
            .parse::<i32>()
            .map(PropertyValue::Int)
            .map_err(|_| Error::malformed(input, format!("unparseable number: {raw}")));
    }
    if raw.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '=') {
        return Err(Error::malformed(input, format!("unparseable value literal: {raw}")));
    }
    Ok(PropertyValue::Text(raw.to_string()))
}

fn looks_numeric(raw: &str) -> bool {
    let mut chars = raw.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+') | Some('-') => chars.next().map(|c| c.is_ascii_digit()).unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_brace_form() {
        let s = parse_property_set(r#"{color="red",open=1b,rot=3}"#).unwrap();
        assert_eq!(s.get("color"), Some(&PropertyValue::Text("red".into())));
        assert_eq!(s.get("open"), Some(&PropertyValue::Byte(1)));
        assert_eq!(s.get("rot"), Some(&PropertyValue::Int(3)));
        assert_eq!(s.canonical_key(), "{color=red,open=1b,rot=3}");
    }

    #[test]
    fn canonical_key_parses_back_to_same_set() {
        let s = parse_property_set(r#"["direction":-2, "lit":true, "minecraft:cardinal_direction":'north']"#).unwrap();
        let key = s.canonical_key();
        assert_eq!(key, "{direction=-2,lit=1b,minecraft:cardinal_direction=north}");
        assert_eq!(parse_property_set(&key).unwrap(), s);
    }

    #[test]
    fn namespaced_names_split_at_equals() {
        let s = parse_property_set(r#"{"minecraft:cardinal_direction"="north",open_bit=0b}"#).unwrap();
        let back = parse_property_set(&s.canonical_key()).unwrap();
        assert_eq!(back, s);
        assert_eq!(back.get("minecraft:cardinal_direction"), Some(&PropertyValue::Text("north".into())));
        let snbt = parse_property_set(r#"{facing:"north",block:minecraft:stone}"#).unwrap();
        assert_eq!(snbt.get("block"), Some(&PropertyValue::Text("minecraft:stone".into())));
    }

    #[test]
    fn record_form_keeps_text_that_looks_like_other_literals() {
        let s: PropertySet = [
            ("flag", PropertyValue::Text("true".into())),
            ("count", PropertyValue::Text("1".into())),
            ("neg", PropertyValue::Text("-3b".into())),
            ("list", PropertyValue::Text("a,b".into())),
            ("quoted", PropertyValue::Text(r#"say "hi""#.into())),
            ("spaced", PropertyValue::Text("two words".into())),
            ("empty", PropertyValue::Text(String::new())),
            ("minecraft:facing", PropertyValue::Text("north".into())),
            ("open", PropertyValue::Byte(1)),
            ("rot", PropertyValue::Int(3)),
        ]
        .into_iter()
        .collect();
        let form = s.record_form();
        assert!(form.contains(r#"flag="true""#), "{form}");
        assert!(form.contains("minecraft:facing=north"), "{form}");
        assert!(form.contains("open=1b,") && form.contains("rot=3,"), "{form}");
        let back = parse_property_set(&form).unwrap();
        assert_eq!(back, s);
        assert_eq!(back.canonical_key(), s.canonical_key());
    }

    #[test]
    fn record_form_matches_canonical_key_for_plain_sets() {
        let s = parse_property_set(r#"{color="red",open=1b,rot=3}"#).unwrap();
        assert_eq!(s.record_form(), s.canonical_key());
        assert_eq!(PropertySet::new().record_form(), "{}");
    }

    #[test]
    fn empty_inputs() {
        assert!(parse_property_set("").unwrap().is_empty());
        assert!(parse_property_set("{}").unwrap().is_empty());
        assert!(parse_property_set(" [ ] ").unwrap().is_empty());
    }

    #[test]
    fn bare_pairs_without_braces() {
        let s = parse_property_set("facing=north, half=top").unwrap();
        assert_eq!(s.canonical_key(), "{facing=north,half=top}");
    }

    #[test]
    fn escapes_inside_quotes() {
        let s = parse_property_set(r#"{text="say \"hi\""}"#).unwrap();
        assert_eq!(s.get("text").and_then(|v| v.as_text()), Some(r#"say "hi""#));
    }

    #[test]
    fn rejects_malformed() {
        for bad in [
            "{a=1",
            "a=1}",
            "[a=1}",
            "{a=\"x}",
            "{a}",
            "{=1}",
            "{a=}",
            "{a=1,,b=2}",
            "{a=300b}",
            "{a=99999999999}",
            "{a=12x}",
            "{a=1,a=2}",
            "{a={b=1}}",
        ] {
            let err = parse_property_set(bad).unwrap_err();
            assert!(matches!(err, Error::MalformedPropertyData { .. }), "{bad} should fail");
        }
    }
}
