use std::str::FromStr;

use crate::users::Field;

/// A row named by its 1-based position in the list or by document id.
/// `#<id>` always names an id, even one made only of digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRef {
    Position(usize),
    Id(String),
}

impl RowRef {
    fn parse(s: &str) -> Self {
        if let Some(id) = s.strip_prefix('#').filter(|id| !id.is_empty()) {
            return Self::Id(id.to_string());
        }
        match s.parse::<usize>() {
            Ok(n) if n > 0 => Self::Position(n),
            _ => Self::Id(s.to_string()),
        }
    }
}

/// One user action on the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Type into one of the creation inputs.
    Input(Field, String),
    Add,
    Edit(RowRef),
    /// Type into one of the edit-mode inputs.
    Set(Field, String),
    Save,
    Cancel,
    Delete(RowRef),
    Refresh,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("unknown command `{0}`, type `help`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (s, ""),
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }
        let (word, rest) = split_word(line);
        let cmd = match word.to_ascii_lowercase().as_str() {
            "name" => Self::Input(Field::Name, rest.to_string()),
            "email" => Self::Input(Field::Email, rest.to_string()),
            "age" => Self::Input(Field::Age, rest.to_string()),
            "add" => Self::Add,
            "edit" if !rest.is_empty() => Self::Edit(RowRef::parse(rest)),
            "edit" => return Err(ParseError::Usage("edit <row>")),
            "delete" if !rest.is_empty() => Self::Delete(RowRef::parse(rest)),
            "delete" => return Err(ParseError::Usage("delete <row>")),
            "set" => {
                let (field, value) = split_word(rest);
                let field = field
                    .parse::<Field>()
                    .map_err(|_| ParseError::Usage("set name|email|age <text>"))?;
                Self::Set(field, value.to_string())
            }
            "save" => Self::Save,
            "cancel" => Self::Cancel,
            "refresh" => Self::Refresh,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => return Err(ParseError::Unknown(word.to_string())),
        };
        Ok(cmd)
    }
}
