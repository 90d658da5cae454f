use std::io::Write;
use std::time::Instant;

use tracing::{
  debug,
  info,
  instrument
};

use super::{
  Workspace,
  active,
  active_mut
};
use crate::task::short_id;

pub(super) fn show<W: Write>(
  ws: &Workspace,
  out: &mut W
) -> anyhow::Result<()> {
  let session = active(&ws.session)?;
  ws.renderer
    .history(out, session.state().completed())
}

#[instrument(skip(ws, out))]
pub(super) fn clear<W: Write>(
  ws: &mut Workspace,
  out: &mut W
) -> anyhow::Result<()> {
  let session = active_mut(&mut ws.session)?;
  let count =
    session.state().completed().len();
  session.update(Instant::now(), |state| {
    Ok(state.clear_completed())
  })?;
  info!(count, "cleared completed tasks");
  writeln!(
    out,
    "Cleared {count} completed task{}.",
    if count == 1 { "" } else { "s" }
  )?;
  Ok(())
}

#[instrument(skip(ws, out))]
pub(super) fn remove<W: Write>(
  ws: &mut Workspace,
  out: &mut W,
  needle: &str
) -> anyhow::Result<()> {
  let session = active_mut(&mut ws.session)?;
  let Some(id) = session
    .state()
    .resolve_completed(needle)?
  else {
    debug!(needle, "history remove: no matching completed task");
    writeln!(
      out,
      "No completed task matches \
       `{needle}`."
    )?;
    return Ok(());
  };

  session.update(Instant::now(), |state| {
    Ok(state.remove_completed(id))
  })?;
  info!(task = %short_id(id), "removed completed task");
  writeln!(
    out,
    "Removed completed task {}.",
    short_id(id)
  )?;
  Ok(())
}
