use std::io::{
  self,
  BufRead,
  IsTerminal,
  Write
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  info,
  instrument,
  warn
};

use super::{
  Workspace,
  hosted_backend
};
use crate::app::AppSession;
use crate::store::Backend;

const PASSWORD_ENV: &str =
  "TODOWHEEL_PASSWORD";

/// Takes the password from `TODOWHEEL_PASSWORD`, or prompts for it without
/// echo when stdin is a terminal. `None` means it must come from piped
/// input.
pub(super) fn prompted_password()
-> anyhow::Result<Option<String>> {
  if let Ok(password) =
    std::env::var(PASSWORD_ENV)
  {
    return Ok(Some(password));
  }
  if !io::stdin().is_terminal() {
    return Ok(None);
  }

  let password =
    dialoguer::Password::new()
      .with_prompt("password")
      .interact()
      .context(
        "failed reading password"
      )?;
  Ok(Some(password))
}

/// A password line from piped input. Only the line ending is removed.
pub(super) fn piped_password(
  line: &str
) -> String {
  line
    .trim_end_matches(['\r', '\n'])
    .to_string()
}

pub(super) fn read_password()
-> anyhow::Result<String> {
  if let Some(password) =
    prompted_password()?
  {
    return Ok(password);
  }

  let mut line = String::new();
  io::stdin()
    .lock()
    .read_line(&mut line)
    .context(
      "failed reading password from \
       stdin"
    )?;
  Ok(piped_password(&line))
}

/// Signs in and reloads every collection for the new user.
#[instrument(skip(ws, out, password))]
pub(super) async fn login<W: Write>(
  ws: &mut Workspace,
  out: &mut W,
  email: &str,
  password: &str
) -> anyhow::Result<()> {
  let debounce = ws.cfg.debounce();
  let Some(auth) = ws.auth.as_mut()
  else {
    return Err(anyhow!(
      "login needs `storage = hosted` \
       in the todowheelrc"
    ));
  };
  if password.is_empty() {
    return Err(anyhow!(
      "please enter a password"
    ));
  }

  let user = auth
    .sign_in(email.trim(), password)
    .await
    .context("sign-in failed")?;
  let label = user
    .email
    .clone()
    .unwrap_or_else(|| user.id.clone());

  let Some(backend) = hosted_backend(auth)
  else {
    return Err(anyhow!(
      "sign-in did not produce a session"
    ));
  };
  match ws.session.as_mut() {
    | Some(session) => {
      session
        .switch_backend(backend)
        .await
        .context(
          "failed loading hosted task \
           data"
        )?
    }
    | None => {
      ws.session = Some(
        AppSession::open(
          backend, debounce
        )
        .await
        .context(
          "failed loading hosted task \
           data"
        )?
      )
    }
  }
  ws.restore_active_goal();

  info!(user = %label, "login complete");
  writeln!(out, "Signed in as {label}.")?;
  Ok(())
}

/// Sends pending changes while still authorized, then signs out.
#[instrument(skip(ws, out))]
pub(super) async fn logout<W: Write>(
  ws: &mut Workspace,
  out: &mut W
) -> anyhow::Result<()> {
  if ws.auth.is_none() {
    return Err(anyhow!(
      "logout needs `storage = hosted` \
       in the todowheelrc"
    ));
  }

  if let Err(error) = ws.flush().await {
    warn!(error = %error, "unsent changes dropped at sign-out");
    writeln!(
      out,
      "Warning: some changes could not \
       be saved: {error}"
    )?;
  }
  ws.session = None;
  ws.wheel.clear();

  if let Some(auth) = ws.auth.as_mut() {
    auth.sign_out().await?;
  }
  writeln!(out, "Signed out.")?;
  Ok(())
}

pub(super) fn whoami<W: Write>(
  ws: &Workspace,
  out: &mut W
) -> anyhow::Result<()> {
  let storage = match &ws.session {
    | Some(session) => {
      session.backend().describe()
    }
    | None => "hosted".to_string()
  };
  let user = ws
    .auth
    .as_ref()
    .and_then(|auth| auth.current_user());
  ws.renderer.user(out, &storage, user)
}
