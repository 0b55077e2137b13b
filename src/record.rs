//! Bibliographic record model.
//!
//! A [`Record`] is an ordered mapping from field name to [`FieldValue`],
//! scoped to one entry of a tagged export.

use serde::Serialize;

/// Separator used when a multi-valued field is collapsed to one string.
pub const LIST_SEPARATOR: &str = ", ";

/// The value of a single field: one string, or several in append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    Multi(Vec<String>),
}

impl FieldValue {
    /// Appends a value, promoting a scalar to a one-element list first.
    pub fn push(&mut self, value: impl Into<String>) {
        let value = value.into();
        match self {
            FieldValue::Scalar(existing) => {
                let first = std::mem::take(existing);
                *self = FieldValue::Multi(vec![first, value]);
            }
            FieldValue::Multi(values) => values.push(value),
        }
    }

    /// Collapses the value to one string.
    ///
    /// A one-element list yields its element unchanged, so `["x"]` and `"x"`
    /// produce the same output.
    pub fn joined(&self, separator: &str) -> String {
        match self {
            FieldValue::Scalar(value) => value.clone(),
            FieldValue::Multi(values) => values.join(separator),
        }
    }

    /// Returns the values as a slice, a scalar being a slice of one.
    pub fn values(&self) -> &[String] {
        match self {
            FieldValue::Scalar(value) => std::slice::from_ref(value),
            FieldValue::Multi(values) => values,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, FieldValue::Multi(_))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::Multi(values)
    }
}

/// One bibliographic entry.
///
/// Field order is first-insertion order. Records handed out by the parser are
/// never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value for `name`.
    ///
    /// A new name is inserted as a scalar; a recurring name has the value
    /// appended to its list.
    pub fn insert_value(&mut self, name: &str, value: impl Into<String>) {
        match self.get_mut(name) {
            Some(existing) => existing.push(value),
            None => self
                .fields
                .push((name.to_string(), FieldValue::Scalar(value.into()))),
        }
    }

    /// Inserts a whole value under `name`, merging with any existing value.
    pub fn merge_value(&mut self, name: &str, value: FieldValue) {
        match self.get_mut(name) {
            Some(existing) => {
                for item in value.values() {
                    existing.push(item.clone());
                }
            }
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Appends a continuation line to an existing field.
    ///
    /// Returns `false` (and changes nothing) when the field is absent or the
    /// text is empty.
    pub fn append_continuation(&mut self, name: &str, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        match self.get_mut(name) {
            Some(existing) => {
                existing.push(text);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.fields
            .iter_mut()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let index = self.fields.iter().position(|(field, _)| field == name)?;
        Some(self.fields.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Field names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.merge_value(&name, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
