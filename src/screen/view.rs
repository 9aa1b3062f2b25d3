use std::fmt::Write;

use crate::alert::{Alert, AlertKind};
use crate::users::UserDirectory;

pub const HELP: &str = "\
commands:
  name <text> | email <text> | age <text>   fill the new-user form
  add                                       add the user
  edit <row>                                edit a row (number, id or #id)
  set name|email|age <text>                 change the row being edited
  save | cancel                             finish editing
  delete <row>                              delete a row
  refresh                                   reload the list
  quit
<row> is a list number or a document id; use #<id> for an id made only of digits";

pub const LOADING: &str = "Loading...";

/// Text rendition of the whole screen.
pub fn render(dir: &UserDirectory) -> String {
    let mut out = String::new();
    let form = dir.form();

    let _ = writeln!(out, "User Management");
    let _ = writeln!(out, "===============");
    let _ = writeln!(out, "  Name:  [{}]", form.name);
    let _ = writeln!(out, "  Email: [{}]", form.email);
    let _ = writeln!(out, "  Age:   [{}]", form.age);
    let _ = writeln!(out, "  [add] Add User");
    let _ = writeln!(out);
    let _ = writeln!(out, "User List");
    let _ = writeln!(out, "---------");

    if dir.is_loading() {
        let _ = writeln!(out, "{LOADING}");
        return out;
    }
    if dir.users().is_empty() {
        let _ = writeln!(out, "(no users)");
        return out;
    }

    for (i, user) in dir.users().iter().enumerate() {
        let row = i + 1;
        match dir.editing().filter(|e| e.id == user.id) {
            Some(editing) => {
                let _ = writeln!(out, "{row}. editing {}", user.id);
                let _ = writeln!(out, "   name:  [{}]", editing.name);
                let _ = writeln!(out, "   email: [{}]", editing.email);
                let _ = writeln!(out, "   age:   [{}]", editing.age);
                let _ = writeln!(out, "   [save] [cancel]");
            }
            None => {
                let _ = writeln!(out, "{row}. {}", user.name);
                let _ = writeln!(out, "   {} - {} years old", user.email, user.age);
                let _ = writeln!(out, "   [edit {row}] [delete {row}]");
            }
        }
    }
    out
}

pub fn render_alert(alert: &Alert) -> String {
    let marker = match alert.kind {
        AlertKind::Success => "+",
        AlertKind::Error => "!",
    };
    let body = format!("[{marker}] {}: {}", alert.title, alert.message);
    let rule = "-".repeat(body.chars().count());
    format!("{rule}\n{body}\n{rule}\n")
}
