use std::str::FromStr;

use super::dto::{UserFields, UserRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Age,
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            "age" => Ok(Self::Age),
            other => Err(format!("unknown field `{other}` (expected name, email or age)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Please fill all fields")]
    MissingFields,
    #[error("Age must be a whole number")]
    InvalidAge(String),
}

/// Leading-integer coercion of age text: `"30"` -> 30, `" 42abc"` -> 42,
/// `"31.9"` -> 31. Text without leading digits has no age.
pub fn parse_age(text: &str) -> Option<i64> {
    let t = text.trim_start();
    let (negative, digits) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// The three creation inputs, held as typed text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateForm {
    pub name: String,
    pub email: String,
    pub age: String,
}

impl CreateForm {
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::Email => &mut self.email,
            Field::Age => &mut self.age,
        };
        *slot = value.into();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Presence check on all three inputs, then age coercion.
    pub fn submit(&self) -> Result<UserFields, FormError> {
        if self.name.is_empty() || self.email.is_empty() || self.age.is_empty() {
            return Err(FormError::MissingFields);
        }
        let age = parse_age(&self.age).ok_or_else(|| FormError::InvalidAge(self.age.clone()))?;
        Ok(UserFields {
            name: self.name.clone(),
            email: self.email.clone(),
            age,
        })
    }
}

/// Working copy of one record in edit mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditingUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub age: String,
}

impl EditingUser {
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            email: record.email.clone(),
            age: record.age.to_string(),
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::Email => &mut self.email,
            Field::Age => &mut self.age,
        };
        *slot = value.into();
    }

    /// All three fields, rewritten unconditionally on save.
    pub fn to_fields(&self) -> Result<UserFields, FormError> {
        let age = parse_age(&self.age).ok_or_else(|| FormError::InvalidAge(self.age.clone()))?;
        Ok(UserFields {
            name: self.name.clone(),
            email: self.email.clone(),
            age,
        })
    }
}
