use std::borrow::Cow;
use std::io::Write;
use std::time::Instant;

use chrono::Utc;
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
use crate::duration::TaskDuration;
use crate::session::{
  SessionState,
  TaskDraft
};
use crate::task::short_id;

#[instrument(skip(ws, out))]
pub(super) fn add<W: Write>(
  ws: &mut Workspace,
  out: &mut W,
  title: &str,
  time: Option<&str>,
  unit: Option<&str>,
  goal: Option<&str>
) -> anyhow::Result<()> {
  let duration = match (time, unit) {
    | (Some(amount), Some(unit)) => {
      Some(TaskDuration::from_parts(
        amount, unit
      )?)
    }
    | (Some(raw), None) => {
      Some(raw.parse::<TaskDuration>()?)
    }
    | (None, _) => None
  };

  let mut draft = TaskDraft::new(title);
  if let Some(duration) = duration {
    draft = draft.with_duration(duration);
  }
  if let Some(goal) = goal {
    draft = draft.with_goal(goal);
  }
  let id = draft.id;

  let session = active_mut(&mut ws.session)?;
  session.update(Instant::now(), |state| {
    state.add_task(draft, Utc::now())
  })?;

  let added = session
    .state()
    .tasks()
    .iter()
    .find(|task| task.id == id);
  if let Some(task) = added {
    info!(task = %task.short_id(), goal = %task.goal, "added task");
    writeln!(
      out,
      "Added task {} \"{}\" to {}.",
      task.short_id(),
      task.title,
      task.goal
    )?;
  }
  Ok(())
}

#[instrument(skip(ws, out))]
pub(super) fn list<W: Write>(
  ws: &Workspace,
  out: &mut W,
  goal: Option<&str>
) -> anyhow::Result<()> {
  let session = active(&ws.session)?;
  let state =
    filtered(session.state(), goal)?;
  writeln!(
    out,
    "{}",
    ws.renderer.paint(
      state.active_goal().label(),
      "1"
    )
  )?;
  ws.renderer
    .task_table(out, &state.visible_tasks())
}

#[instrument(skip(ws, out))]
pub(super) fn done<W: Write>(
  ws: &mut Workspace,
  out: &mut W,
  needle: &str
) -> anyhow::Result<()> {
  let session = active_mut(&mut ws.session)?;
  let Some(id) =
    session.state().resolve_active(needle)?
  else {
    debug!(needle, "complete: no matching active task");
    writeln!(
      out,
      "No active task matches `{needle}`."
    )?;
    return Ok(());
  };

  match session.update(
    Instant::now(),
    |state| state.complete_task(id, Utc::now())
  ) {
    | Ok(()) => {
      let title = session
        .state()
        .completed()
        .first()
        .map(|task| task.title.clone())
        .unwrap_or_default();
      info!(task = %short_id(id), "completed task");
      writeln!(
        out,
        "Completed task {} \"{title}\".",
        short_id(id)
      )?;
      Ok(())
    }
    | Err(err) if err.is_not_found() => {
      debug!(task = %short_id(id), "complete: task already gone");
      writeln!(out, "{err}.")?;
      Ok(())
    }
    | Err(err) => Err(err.into())
  }
}

#[instrument(skip(ws, out))]
pub(super) fn delete<W: Write>(
  ws: &mut Workspace,
  out: &mut W,
  needle: &str
) -> anyhow::Result<()> {
  let session = active_mut(&mut ws.session)?;
  let Some(id) =
    session.state().resolve_active(needle)?
  else {
    debug!(needle, "delete: no matching active task");
    writeln!(
      out,
      "No active task matches `{needle}`."
    )?;
    return Ok(());
  };

  session.update(Instant::now(), |state| {
    Ok(state.remove_task(id))
  })?;
  info!(task = %short_id(id), "deleted task");
  writeln!(
    out,
    "Deleted task {}.",
    short_id(id)
  )?;
  Ok(())
}

#[instrument(skip(ws, out))]
pub(super) fn spin<W: Write>(
  ws: &mut Workspace,
  out: &mut W,
  goal: Option<&str>
) -> anyhow::Result<()> {
  let session = active(&ws.session)?;
  let state =
    filtered(session.state(), goal)?;
  let visible = state.visible_tasks();

  let mut rng = rand::thread_rng();
  match ws.wheel.spin(&visible, &mut rng) {
    | Some(spin) => {
      let task = visible[spin.index];
      info!(
        task = %task.short_id(),
        index = spin.index,
        of = visible.len(),
        "wheel landed"
      );
      ws.renderer.spin(out, spin, task)?;
    }
    | None => {
      writeln!(
        out,
        "Nothing to spin under {}. Add a \
         task first.",
        state.active_goal().label()
      )?;
    }
  }
  Ok(())
}

/// Applies a one-off goal filter without changing the remembered one.
fn filtered<'a>(
  state: &'a SessionState,
  goal: Option<&str>
) -> anyhow::Result<Cow<'a, SessionState>> {
  match goal {
    | Some(label) => {
      Ok(Cow::Owned(
        state.select_goal(label)?
      ))
    }
    | None => Ok(Cow::Borrowed(state))
  }
}
