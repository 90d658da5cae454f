use std::io::{
  self,
  Write
};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tokio::io::{
  AsyncBufReadExt,
  BufReader
};
use tracing::{
  debug,
  info,
  warn
};

use super::{
  Flow,
  Workspace,
  account
};
use crate::cli::{
  Command,
  ShellLine
};

const PROMPT: &str = "todowheel> ";

/// Reads commands from stdin until `exit` or end of input. Pending changes
/// are flushed whenever their debounce window lapses, even while waiting
/// for input, and once more on the way out.
#[tracing::instrument(skip_all)]
pub async fn run(
  ws: &mut Workspace
) -> anyhow::Result<()> {
  let mut lines =
    BufReader::new(tokio::io::stdin())
      .lines();
  let mut out = io::stdout();
  info!("shell started");
  prompt(&mut out)?;

  loop {
    let deadline = ws.deadline();
    let line = tokio::select! {
      line = lines.next_line() => {
        line.context("failed reading stdin")?
      }
      () = wait_until(deadline) => {
        flush_quietly(ws).await;
        continue;
      }
    };
    let Some(line) = line else {
      writeln!(out)?;
      break;
    };

    let flow = match parse(&line) {
      | Ok(None) => Flow::Continue,
      | Ok(Some(Command::Login {
        email
      })) => {
        let password =
          match account::prompted_password() {
            | Ok(Some(password)) => password,
            | Ok(None) => {
              eprint!("password: ");
              io::stderr().flush()?;
              let line = lines
                .next_line()
                .await
                .context(
                  "failed reading password"
                )?
                .unwrap_or_default();
              account::piped_password(&line)
            }
            | Err(err) => {
              eprintln!("error: {err:#}");
              prompt(&mut out)?;
              continue;
            }
          };
        report(
          account::login(
            ws, &mut out, &email, &password
          )
          .await
          .map(|()| Flow::Continue)
        )
      }
      | Ok(Some(command)) => {
        report(
          ws.execute(command, &mut out)
            .await
        )
      }
      | Err(err) => {
        if let Err(print_err) = err.print() {
          warn!(error = %print_err, "failed printing parse error");
        }
        Flow::Continue
      }
    };

    if flow == Flow::Exit {
      break;
    }
    if ws.is_due(Instant::now()) {
      flush_quietly(ws).await;
    }
    prompt(&mut out)?;
  }

  if let Err(error) = ws.flush().await {
    eprintln!("warning: changes not saved: {error}");
  }
  info!("shell finished");
  Ok(())
}

/// Blank lines yield `None`. Quoting errors surface as clap errors so they
/// print the same way as unknown commands.
fn parse(
  line: &str
) -> Result<Option<Command>, clap::Error> {
  let words = shell_words::split(line)
    .map_err(|err| {
      clap::Error::raw(
        clap::error::ErrorKind::InvalidValue,
        format!("{err}\n")
      )
    })?;
  if words.is_empty() {
    return Ok(None);
  }
  debug!(?words, "parsing shell line");
  ShellLine::try_parse_from(words)
    .map(|line| Some(line.command))
}

fn report(
  result: anyhow::Result<Flow>
) -> Flow {
  match result {
    | Ok(flow) => flow,
    | Err(err) => {
      eprintln!("error: {err:#}");
      Flow::Continue
    }
  }
}

async fn flush_quietly(
  ws: &mut Workspace
) {
  if let Err(error) = ws.flush().await {
    debug!(error = %error, "flush deferred");
  }
}

async fn wait_until(
  deadline: Option<Instant>
) {
  match deadline {
    | Some(at) => {
      tokio::time::sleep_until(
        tokio::time::Instant::from_std(at)
      )
      .await
    }
    | None => {
      std::future::pending::<()>().await
    }
  }
}

fn prompt<W: Write>(
  out: &mut W
) -> anyhow::Result<()> {
  write!(out, "{PROMPT}")?;
  out.flush()?;
  Ok(())
}
