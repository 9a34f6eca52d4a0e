//! Reading and writing the `---` fenced YAML header of a markdown post.
//!
//! The header is parsed with `serde_yaml`, keeping key order. Values the
//! workflow does not interpret (numbers, nested maps, nulls) are carried as
//! raw YAML so they are written back untouched. A header that is not a valid
//! YAML mapping is read line by line instead: scalar text, booleans, dates,
//! inline `[a, b]` arrays and block `- item` sequences are kept and every
//! other line is skipped with a warning.

use std::fmt::Write;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use serde_yaml::{Mapping, Value as YamlValue};
use spdlog::warn;

use crate::content::{FieldValue, Frontmatter, PostDocument};
use crate::error::{ContentError, Result};
use crate::text_utils::{parse_iso_date, parse_timestamp};

const FENCE: &str = "---";

pub fn decode(raw: &str) -> Result<PostDocument> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut segments = raw.split_inclusive('\n');

    let opening = match segments.next() {
        Some(line) if strip_eol(line).trim_end() == FENCE => line,
        _ => return Ok(PostDocument::new(Frontmatter::new(), raw)),
    };

    let mut offset = opening.len();
    let mut header_lines: Vec<&str> = vec![];
    for line in segments {
        offset += line.len();
        let content = strip_eol(line);
        if content.trim_end() == FENCE {
            let frontmatter = parse_block(&header_lines);
            return Ok(PostDocument::new(frontmatter, &raw[offset..]));
        }
        header_lines.push(content);
    }

    Err(ContentError::MalformedFrontmatter(
        "opening '---' has no closing delimiter".to_string()
    ))
}

pub fn encode(doc: &PostDocument) -> Result<String> {
    let mut buf = String::new();

    let _ = writeln!(&mut buf, "{}", FENCE);
    if !doc.frontmatter.is_empty() {
        let yaml = serde_yaml::to_string(&to_mapping(&doc.frontmatter))
            .map_err(|e| ContentError::MalformedFrontmatter(format!("cannot encode frontmatter: {}", e)))?;
        buf.push_str(&yaml);
    }
    let _ = writeln!(&mut buf, "{}", FENCE);
    buf.push_str(&doc.body);

    Ok(buf)
}

/// Frontmatter from an editor's JSON object. JSON has no date type, so strings
/// that read as dates become dates. Nulls are dropped. Nested objects are kept
/// as raw YAML.
pub fn from_json(map: &Map<String, Value>) -> Frontmatter {
    let mut frontmatter = Frontmatter::new();
    for (key, value) in map {
        let field = match value {
            Value::Null => {
                warn!("Dropping frontmatter key '{}': null value", key);
                continue;
            }
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::String(s) => string_value(s),
            Value::Array(items) if items.iter().all(|item| !item.is_array() && !item.is_object()) => {
                FieldValue::List(items.iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        Value::Bool(b) => Some(b.to_string()),
                        _ => None,
                    })
                    .collect())
            }
            other => match serde_yaml::to_value(other) {
                Ok(yaml) => FieldValue::Yaml(yaml),
                Err(e) => {
                    warn!("Dropping frontmatter key '{}': {}", key, e);
                    continue;
                }
            },
        };
        frontmatter.set(key, field);
    }
    frontmatter
}

fn string_value(s: &str) -> FieldValue {
    if let Some(date) = parse_iso_date(s) {
        return FieldValue::Date(date);
    }
    if s.starts_with(|c: char| c.is_ascii_digit()) {
        if let Some(date_time) = parse_timestamp(s) {
            return FieldValue::DateTime(date_time);
        }
    }
    FieldValue::Text(s.to_string())
}

fn parse_block(lines: &[&str]) -> Frontmatter {
    let block = lines.join("\n");
    if block.trim().is_empty() {
        return Frontmatter::new();
    }
    match serde_yaml::from_str::<YamlValue>(&block) {
        Ok(YamlValue::Mapping(mapping)) => from_mapping(mapping),
        Ok(YamlValue::Null) => Frontmatter::new(),
        Ok(_) => {
            warn!("Frontmatter is not a mapping, reading it line by line");
            parse_header(lines)
        }
        Err(e) => {
            warn!("Frontmatter is not valid YAML ({}), reading it line by line", e);
            parse_header(lines)
        }
    }
}

fn from_mapping(mapping: Mapping) -> Frontmatter {
    let mut frontmatter = Frontmatter::new();
    for (key, value) in mapping {
        let key = match key {
            YamlValue::String(s) => s,
            YamlValue::Number(n) => n.to_string(),
            YamlValue::Bool(b) => b.to_string(),
            other => {
                warn!("Skipping frontmatter entry with a non scalar key: {:?}", other);
                continue;
            }
        };
        frontmatter.set(&key, field_from_yaml(value));
    }
    frontmatter
}

fn scalar_text(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn field_from_yaml(value: YamlValue) -> FieldValue {
    match value {
        YamlValue::String(s) => string_value(&s),
        YamlValue::Bool(b) => FieldValue::Bool(b),
        YamlValue::Sequence(items) if items.iter().all(|item| scalar_text(item).is_some()) => {
            FieldValue::List(items.iter().filter_map(scalar_text).collect())
        }
        other => FieldValue::Yaml(other),
    }
}

fn to_yaml(value: &FieldValue) -> YamlValue {
    match value {
        FieldValue::Text(s) => YamlValue::String(s.clone()),
        FieldValue::Bool(b) => YamlValue::Bool(*b),
        FieldValue::Date(_) | FieldValue::DateTime(_) => YamlValue::String(value.to_string()),
        FieldValue::List(items) => YamlValue::Sequence(items.iter().cloned().map(YamlValue::String).collect()),
        FieldValue::Yaml(raw) => raw.clone(),
    }
}

fn to_mapping(frontmatter: &Frontmatter) -> Mapping {
    let mut mapping = Mapping::new();
    for (key, value) in frontmatter.iter() {
        mapping.insert(YamlValue::String(key.to_string()), to_yaml(value));
    }
    mapping
}

fn strip_eol(line: &str) -> &str {
    line.trim_end_matches(&['\n', '\r'][..])
}

fn parse_header(lines: &[&str]) -> Frontmatter {
    let mut frontmatter = Frontmatter::new();
    // A `key:` with no inline value may be followed by `- item` lines
    let mut open_list: Option<(String, Vec<String>)> = None;

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = extract_list_item(line) {
            match open_list {
                Some((_, ref mut items)) => items.push(unquote(item)),
                None => warn!("Skipping frontmatter list item without a key at line {}: {}", idx + 2, line),
            }
            continue;
        }

        close_list(&mut frontmatter, open_list.take());

        match extract_key_value(line) {
            Some((key, "")) => open_list = Some((key.to_string(), vec![])),
            Some((key, value)) => frontmatter.set(key, parse_value(value)),
            None => warn!("Skipping malformed frontmatter line {}: {}", idx + 2, line),
        }
    }
    close_list(&mut frontmatter, open_list);

    frontmatter
}

fn close_list(frontmatter: &mut Frontmatter, open_list: Option<(String, Vec<String>)>) {
    if let Some((key, items)) = open_list {
        let value = if items.is_empty() {
            FieldValue::Text(String::new())
        } else {
            FieldValue::List(items)
        };
        frontmatter.set(&key, value);
    }
}

fn extract_key_value(line: &str) -> Option<(&str, &str)> {
    lazy_static! {
        static ref KEY_VALUE_REGEX: Regex = Regex::new(
            r"^(?P<key>[A-Za-z_][\w.-]*)\s*:\s*(?P<value>.*?)\s*$"
        ).unwrap();
    }

    KEY_VALUE_REGEX.captures(line).and_then(|cap| {
        let key = cap.name("key").map(|key| key.as_str());
        let val = cap.name("value").map(|val| val.as_str());
        match (key, val) {
            (Some(key), Some(val)) => Some((key, val)),
            _ => None
        }
    })
}

fn extract_list_item(line: &str) -> Option<&str> {
    lazy_static! {
        static ref LIST_ITEM_REGEX: Regex = Regex::new(r"^\s*-(?:\s+(?P<item>.*?))?\s*$").unwrap();
    }

    LIST_ITEM_REGEX.captures(line)
        .map(|cap| cap.name("item").map(|item| item.as_str()).unwrap_or(""))
}

fn parse_value(value: &str) -> FieldValue {
    if is_quoted(value, '"') || is_quoted(value, '\'') {
        return FieldValue::Text(unquote(value));
    }

    match value {
        "true" => return FieldValue::Bool(true),
        "false" => return FieldValue::Bool(false),
        _ => {}
    }

    if value.starts_with(|c: char| c.is_ascii_digit()) {
        if let Some(date) = parse_iso_date(value) {
            return FieldValue::Date(date);
        }
        if let Some(date_time) = parse_timestamp(value) {
            return FieldValue::DateTime(date_time);
        }
    }

    if value.starts_with('[') && value.ends_with(']') {
        return FieldValue::List(parse_inline_list(value));
    }

    FieldValue::Text(value.to_string())
}

fn is_quoted(value: &str, quote: char) -> bool {
    value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote)
}

fn unquote(value: &str) -> String {
    if is_quoted(value, '"') {
        unescape_double(&value[1..value.len() - 1])
    } else if is_quoted(value, '\'') {
        value[1..value.len() - 1].replace("''", "'")
    } else {
        value.to_string()
    }
}

fn unescape_double(inner: &str) -> String {
    let mut res = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            res.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => res.push('\n'),
            Some('t') => res.push('\t'),
            Some('r') => res.push('\r'),
            Some('"') => res.push('"'),
            Some('\\') => res.push('\\'),
            Some(other) => {
                res.push('\\');
                res.push(other);
            }
            None => res.push('\\'),
        }
    }
    res
}

fn parse_inline_list(value: &str) -> Vec<String> {
    if let Ok(items) = serde_json::from_str::<Vec<String>>(value) {
        return items;
    }

    // Not JSON: bare or single quoted items
    let inner = &value[1..value.len() - 1];
    let mut items = vec![];
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in inner.chars() {
        match (quote, c) {
            (None, ',') => {
                items.push(current.trim().to_string());
                current.clear();
            }
            (None, '"') | (None, '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (Some(q), _) if q == c => {
                quote = None;
                current.push(c);
            }
            _ => current.push(c),
        }
    }
    items.push(current.trim().to_string());

    items.into_iter()
        .filter(|item| !item.is_empty())
        .map(|item| unquote(&item))
        .collect()
}
