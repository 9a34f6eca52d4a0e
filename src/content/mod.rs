use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

pub mod frontmatter;
pub mod slug;

pub const STATUS_DRAFT: &str = "Draft";
pub const STATUS_PUBLISHED: &str = "Published";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    List(Vec<String>),
    /// Any other YAML value, written back as it was read.
    Yaml(serde_yaml::Value),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Dates are widened to midnight UTC so both date kinds sort together.
    pub fn as_date_time(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::DateTime(dt) => Some(*dt),
            FieldValue::Date(d) => d.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            FieldValue::List(items) => write!(f, "{}", items.join(", ")),
            FieldValue::Yaml(serde_yaml::Value::Null) => Ok(()),
            FieldValue::Yaml(serde_yaml::Value::Number(n)) => write!(f, "{}", n),
            FieldValue::Yaml(raw) => match serde_yaml::to_string(raw) {
                Ok(yaml) => write!(f, "{}", yaml.trim_end()),
                Err(_) => write!(f, "{:?}", raw),
            },
        }
    }
}

/// Frontmatter keys in the order they were inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    fields: Vec<(String, FieldValue)>,
}

impl Frontmatter {
    pub fn new() -> Self {
        Frontmatter::default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replaces the value in place when the key exists, appends otherwise.
    pub fn set(&mut self, key: &str, value: FieldValue) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        let pos = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item=(&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Tags as a list. A comma separated text value is accepted as well.
    pub fn tags(&self) -> Vec<String> {
        match self.get("tags") {
            Some(FieldValue::List(items)) => items.clone(),
            Some(FieldValue::Text(s)) => s.split(',')
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(|t| t.to_string())
                .collect(),
            _ => vec![],
        }
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for Frontmatter {
    fn from_iter<T: IntoIterator<Item=(K, FieldValue)>>(iter: T) -> Self {
        let mut fm = Frontmatter::new();
        for (k, v) in iter {
            fm.set(&k.into(), v);
        }
        fm
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDocument {
    pub frontmatter: Frontmatter,
    pub body: String,
}

impl PostDocument {
    pub fn new(frontmatter: Frontmatter, body: impl Into<String>) -> Self {
        PostDocument {
            frontmatter,
            body: body.into(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.frontmatter.get_str("title").filter(|t| !t.trim().is_empty())
    }

    pub fn slug(&self) -> Option<&str> {
        self.frontmatter.get_str("slug").filter(|s| !s.trim().is_empty())
    }

    pub fn status(&self) -> Option<&str> {
        self.frontmatter.get_str("status")
    }
}
