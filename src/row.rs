use std::fmt;

use crate::domain::Role;

/// A single attribute value of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    /// Null, false, zero, NaN and the empty string.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => *n == 0.0 || n.is_nan(),
            Value::Text(s) => s.is_empty(),
            Value::List(_) | Value::Object(_) => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Object(entries) => {
                for (idx, (name, value)) in entries.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Discriminant set when a record is ingested. Views branch on this instead of
/// looking for distinguishing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Patient,
    Hospital,
    User(Option<Role>),
}

impl RowKind {
    pub fn label(&self) -> &'static str {
        match self {
            RowKind::Patient => "Patient",
            RowKind::Hospital => "Hospital",
            RowKind::User(Some(Role::Doctor)) => "Doctor",
            RowKind::User(Some(Role::Nurse)) => "Nurse",
            RowKind::User(Some(Role::Asha)) => "ASHA worker",
            RowKind::User(Some(Role::Admin)) => "Administrator",
            RowKind::User(None) => "User",
        }
    }
}

/// Read access to named attributes. The table engine only needs this.
pub trait Searchable {
    fn field(&self, name: &str) -> Option<&Value>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    id: String,
    kind: RowKind,
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new(id: impl Into<String>, kind: RowKind) -> Self {
        Row {
            id: id.into(),
            kind,
            fields: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> RowKind {
        self.kind
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Display text of a field, empty when the field is missing.
    pub fn cell(&self, name: &str) -> String {
        self.get(name).map(|v| v.to_string()).unwrap_or_default()
    }
}

impl Searchable for Row {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falsy_values() {
        assert!(Value::Null.is_falsy());
        assert!(Value::Bool(false).is_falsy());
        assert!(Value::Text(String::new()).is_falsy());
        assert!(Value::Number(0.0).is_falsy());
        assert!(!Value::Bool(true).is_falsy());
        assert!(!Value::List(Vec::new()).is_falsy());
    }

    #[test]
    fn display_renders_nested_values() {
        let v = Value::Object(vec![
            ("city".into(), "Pune".into()),
            ("beds".into(), Value::Number(120.0)),
            ("wards".into(), vec!["A", "B"].into()),
        ]);
        assert_eq!(v.to_string(), "city: Pune, beds: 120, wards: A, B");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn set_replaces_existing_field() {
        let mut row = Row::new("p1", RowKind::Patient).with("name", "Ravi");
        row.set("name", "Ravi Kumar");
        assert_eq!(row.fields().len(), 1);
        assert_eq!(row.cell("name"), "Ravi Kumar");
        assert_eq!(row.cell("missing"), "");
    }
}
