use std::io::Write;
use std::time::Instant;

use tracing::{
  info,
  instrument
};

use super::{
  Workspace,
  active,
  active_mut
};
use crate::datastore::write_active_goal;
use crate::goals::GoalFilter;

pub(super) fn show<W: Write>(
  ws: &Workspace,
  out: &mut W
) -> anyhow::Result<()> {
  let session = active(&ws.session)?;
  let state = session.state();
  ws.renderer.goal_tabs(
    out,
    state.goals(),
    state.active_goal()
  )
}

#[instrument(skip(ws, out))]
pub(super) fn add<W: Write>(
  ws: &mut Workspace,
  out: &mut W,
  name: &str
) -> anyhow::Result<()> {
  let session = active_mut(&mut ws.session)?;
  let existed =
    session.state().goals().contains(name.trim());
  session.update(Instant::now(), |state| {
    state.add_goal(name)
  })?;

  if existed {
    writeln!(
      out,
      "Goal \"{}\" already exists.",
      name.trim()
    )?;
  } else {
    info!(goal = %name.trim(), "added goal");
    writeln!(
      out,
      "Added goal \"{}\".",
      name.trim()
    )?;
  }
  Ok(())
}

/// Selects the goal filter and remembers it on this device.
#[instrument(skip(ws, out))]
pub(super) fn select<W: Write>(
  ws: &mut Workspace,
  out: &mut W,
  label: &str
) -> anyhow::Result<()> {
  let session = active_mut(&mut ws.session)?;
  session.update(Instant::now(), |state| {
    state.select_goal(label)
  })?;

  let filter =
    session.state().active_goal().clone();
  let remembered = match &filter {
    | GoalFilter::All => None,
    | GoalFilter::Goal(label) => {
      Some(label.as_str())
    }
  };
  write_active_goal(
    &ws.data_dir,
    remembered
  )?;
  info!(goal = %filter.label(), "selected goal");
  writeln!(
    out,
    "Showing {}.",
    filter.label()
  )?;
  Ok(())
}
