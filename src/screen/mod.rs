//! Terminal rendition of the user directory screen.
//!
//! Reads one command per line, applies it to the [`UserDirectory`], then
//! prints pending alerts followed by the redrawn screen. While a remote call
//! is in flight the loading indicator is printed once.

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::users::UserDirectory;

pub mod command;
pub mod view;

use command::{Command, ParseError, RowRef};

/// Runs the screen until `quit` or end of input.
pub async fn run<R, W>(mut dir: UserDirectory, input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    with_indicator(&mut dir, Remote::Mount, &mut output).await?;
    redraw(&mut dir, &mut output).await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;
        let Some(line) = lines.next_line().await.context("read command")? else {
            break;
        };

        let cmd = match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(Command::Help) => {
                output.write_all(format!("{}\n", view::HELP).as_bytes()).await?;
                continue;
            }
            Ok(cmd) => cmd,
            Err(ParseError::Empty) => continue,
            Err(e) => {
                output.write_all(format!("{e}\n").as_bytes()).await?;
                continue;
            }
        };

        debug!(?cmd, "command");
        if let Err(hint) = dispatch(&mut dir, cmd, &mut output).await? {
            output.write_all(format!("{hint}\n").as_bytes()).await?;
        }
        redraw(&mut dir, &mut output).await?;
    }
    Ok(())
}

async fn redraw<W: AsyncWrite + Unpin>(dir: &mut UserDirectory, output: &mut W) -> anyhow::Result<()> {
    let mut text = String::new();
    for alert in dir.take_alerts() {
        text.push_str(&view::render_alert(&alert));
    }
    text.push('\n');
    text.push_str(&view::render(dir));
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

fn resolve(dir: &UserDirectory, row: &RowRef) -> Result<String, String> {
    match row {
        RowRef::Position(n) => dir
            .users()
            .get(n - 1)
            .map(|u| u.id.clone())
            .ok_or_else(|| format!("no row {n}")),
        RowRef::Id(id) => dir
            .users()
            .iter()
            .find(|u| &u.id == id)
            .map(|u| u.id.clone())
            .ok_or_else(|| format!("no user with id {id}")),
    }
}

/// The commands that reach the store.
enum Remote {
    Mount,
    Add,
    Save,
    Refresh,
    Delete(String),
}

async fn perform(dir: &mut UserDirectory, op: Remote) {
    match op {
        Remote::Mount => dir.mount().await,
        Remote::Add => dir.add_user().await,
        Remote::Save => dir.update_user().await,
        Remote::Refresh => dir.fetch_users().await,
        Remote::Delete(id) => dir.delete_user(&id).await,
    }
}

/// Applies one command. The inner `Err` is a hint for the user; nothing was
/// sent to the store.
async fn dispatch<W: AsyncWrite + Unpin>(
    dir: &mut UserDirectory,
    cmd: Command,
    output: &mut W,
) -> anyhow::Result<Result<(), String>> {
    let op = match cmd {
        Command::Input(field, value) => {
            dir.set_field(field, value);
            return Ok(Ok(()));
        }
        Command::Set(field, value) => {
            if !dir.edit_field(field, value) {
                return Ok(Err("not editing; use `edit <row>` first".into()));
            }
            return Ok(Ok(()));
        }
        Command::Edit(row) => {
            return Ok(resolve(dir, &row).map(|id| {
                dir.start_edit(&id);
            }));
        }
        Command::Cancel => {
            dir.cancel_edit();
            return Ok(Ok(()));
        }
        Command::Add => Remote::Add,
        Command::Save => Remote::Save,
        Command::Refresh => Remote::Refresh,
        Command::Delete(row) => match resolve(dir, &row) {
            Ok(id) => Remote::Delete(id),
            Err(hint) => return Ok(Err(hint)),
        },
        Command::Help | Command::Quit => return Ok(Ok(())),
    };
    with_indicator(dir, op, output).await?;
    Ok(Ok(()))
}

/// Drives a remote command, printing the loading indicator once the
/// directory reports it is loading.
async fn with_indicator<W: AsyncWrite + Unpin>(
    dir: &mut UserDirectory,
    op: Remote,
    output: &mut W,
) -> anyhow::Result<()> {
    let mut loading = dir.loading_updates();
    let fut = perform(dir, op);
    tokio::pin!(fut);
    let mut shown = false;
    loop {
        tokio::select! {
            () = &mut fut => break,
            changed = loading.changed(), if !shown => {
                if changed.is_err() {
                    shown = true;
                } else if *loading.borrow_and_update() {
                    output.write_all(format!("{}\n", view::LOADING).as_bytes()).await?;
                    output.flush().await?;
                    shown = true;
                }
            }
        }
    }
    Ok(())
}
