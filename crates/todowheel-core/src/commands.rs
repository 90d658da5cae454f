mod account;
mod goals;
mod history;
pub mod shell;
mod tasks;

use std::io::Write;
use std::path::{
  Path,
  PathBuf
};
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use tracing::{
  debug,
  info,
  instrument,
  warn
};

use crate::app::AppSession;
use crate::cli::{
  Command,
  GoalAction,
  HistoryAction
};
use crate::config::{
  Config,
  StorageMode
};
use crate::datastore::{
  DataStore,
  read_active_goal
};
use crate::hosted::HostedBackend;
use crate::hosted::auth::Authenticator;
use crate::render::Renderer;
use crate::store::{
  StoreBackend,
  StoreError,
  StoreResult
};
use crate::wheel::Wheel;

/// Whether the caller should keep reading commands.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Flow {
  Continue,
  Exit
}

/// Everything a command runs against: configuration, the storage
/// session (absent while signed out of hosted storage), and the wheel.
#[derive(Debug)]
pub struct Workspace {
  cfg:      Config,
  data_dir: PathBuf,
  renderer: Renderer,
  mode:     StorageMode,
  auth:     Option<Authenticator>,
  session:  Option<AppSession<StoreBackend>>,
  wheel:    Wheel
}

impl Workspace {
  #[instrument(skip(cfg, renderer))]
  pub async fn open(
    cfg: Config,
    data_dir: PathBuf,
    renderer: Renderer
  ) -> anyhow::Result<Self> {
    let mode = cfg.storage_mode()?;
    let debounce = cfg.debounce();
    let mut ws = Self {
      cfg,
      data_dir,
      renderer,
      mode,
      auth: None,
      session: None,
      wheel: Wheel::new()
    };

    match mode {
      | StorageMode::Local => {
        let store =
          DataStore::open(&ws.data_dir)
            .with_context(|| {
              format!(
                "failed to open \
                 datastore at {}",
                ws.data_dir.display()
              )
            })?;
        let session = AppSession::open(
          StoreBackend::Local(store),
          debounce
        )
        .await
        .context(
          "failed loading local task \
           data"
        )?;
        ws.session = Some(session);
      }
      | StorageMode::Hosted => {
        let mut auth = Authenticator::new(
          ws.cfg.hosted()?,
          &ws.data_dir
        )?;
        auth.restore()?;
        if auth.current_user().is_some()
          && let Err(error) = auth
            .ensure_fresh(Utc::now())
            .await
        {
          warn!(error = %error, "failed refreshing hosted session");
        }
        if let Some(backend) =
          hosted_backend(&auth)
        {
          match AppSession::open(
            backend, debounce
          )
          .await
          {
            | Ok(session) => {
              ws.session = Some(session)
            }
            | Err(error)
              if error.is_unauthorized() =>
            {
              warn!(
                error = %error,
                "cached session rejected; signing out"
              );
              auth.discard()?;
            }
            | Err(error) => {
              return Err(error).context(
                "failed loading hosted \
                 task data"
              );
            }
          }
        }
        ws.auth = Some(auth);
      }
    }

    ws.restore_active_goal();
    info!(
      mode = ?ws.mode,
      data_dir = %ws.data_dir.display(),
      signed_in = ws.session.is_some(),
      "workspace ready"
    );
    Ok(ws)
  }

  pub fn data_dir(&self) -> &Path {
    &self.data_dir
  }

  pub fn session(
    &self
  ) -> Option<&AppSession<StoreBackend>> {
    self.session.as_ref()
  }

  pub fn deadline(
    &self
  ) -> Option<Instant> {
    self
      .session
      .as_ref()
      .and_then(|s| s.deadline())
  }

  pub fn is_due(
    &self,
    now: Instant
  ) -> bool {
    self
      .session
      .as_ref()
      .is_some_and(|s| s.is_due(now))
  }

  /// Sends pending changes, if any, to the backend.
  pub async fn flush(
    &mut self
  ) -> StoreResult<()> {
    match self.session.as_mut() {
      | Some(session) => {
        session.flush().await
      }
      | None => Ok(())
    }
  }

  #[instrument(skip(self, out))]
  pub async fn execute<W: Write>(
    &mut self,
    command: Command,
    out: &mut W
  ) -> anyhow::Result<Flow> {
    debug!(?command, "dispatching command");

    match command {
      | Command::Add {
        title,
        time,
        unit,
        goal
      } => {
        tasks::add(
          self,
          out,
          &title.join(" "),
          time.as_deref(),
          unit.as_deref(),
          goal.as_deref()
        )?
      }
      | Command::List {
        goal
      } => {
        tasks::list(
          self,
          out,
          goal.as_deref()
        )?
      }
      | Command::Done {
        id
      } => tasks::done(self, out, &id)?,
      | Command::Delete {
        id
      } => tasks::delete(self, out, &id)?,
      | Command::Spin {
        goal
      } => {
        tasks::spin(
          self,
          out,
          goal.as_deref()
        )?
      }
      | Command::Goals => {
        goals::show(self, out)?
      }
      | Command::Goal {
        action
      } => {
        match action {
          | GoalAction::Add {
            name
          } => {
            goals::add(
              self,
              out,
              &name.join(" ")
            )?
          }
          | GoalAction::Use {
            label
          } => {
            goals::select(
              self,
              out,
              &label.join(" ")
            )?
          }
        }
      }
      | Command::History {
        action
      } => {
        match action {
          | None => {
            history::show(self, out)?
          }
          | Some(
            HistoryAction::Clear
          ) => history::clear(self, out)?,
          | Some(
            HistoryAction::Remove {
              id
            }
          ) => {
            history::remove(
              self, out, &id
            )?
          }
        }
      }
      | Command::Login {
        email
      } => {
        let password =
          account::read_password()?;
        account::login(
          self, out, &email, &password
        )
        .await?
      }
      | Command::Logout => {
        account::logout(self, out)
          .await?
      }
      | Command::Whoami => {
        account::whoami(self, out)?
      }
      | Command::Shell => {
        writeln!(
          out,
          "Already in the shell."
        )?
      }
      | Command::Version => {
        writeln!(
          out,
          "{}",
          env!("CARGO_PKG_VERSION")
        )?
      }
      | Command::Exit => {
        return Ok(Flow::Exit);
      }
    }

    Ok(Flow::Continue)
  }

  /// Re-applies the goal filter remembered on this device, falling back
  /// to `default.goal`. Labels that no longer exist are ignored.
  fn restore_active_goal(&mut self) {
    let remembered =
      match read_active_goal(
        &self.data_dir
      ) {
        | Ok(label) => label,
        | Err(error) => {
          warn!(error = %error, "failed reading remembered goal");
          None
        }
      };
    let Some(label) = remembered
      .or_else(|| {
        self.cfg.default_goal()
      })
    else {
      return;
    };
    let Some(session) =
      self.session.as_mut()
    else {
      return;
    };

    match session
      .state()
      .select_goal(&label)
    {
      | Ok(next) => {
        session.apply(
          next,
          Instant::now()
        )
      }
      | Err(error) => {
        debug!(label = %label, error = %error, "remembered goal not restored");
      }
    }
  }
}

fn hosted_backend(
  auth: &Authenticator
) -> Option<StoreBackend> {
  auth.current_user().map(|user| {
    StoreBackend::Hosted(
      HostedBackend::new(
        auth.http().clone(),
        auth.config(),
        user
      )
    )
  })
}

fn active(
  slot: &Option<AppSession<StoreBackend>>
) -> anyhow::Result<&AppSession<StoreBackend>>
{
  slot.as_ref().ok_or_else(|| {
    anyhow::Error::new(
      StoreError::NotSignedIn
    )
  })
}

fn active_mut(
  slot: &mut Option<
    AppSession<StoreBackend>
  >
) -> anyhow::Result<
  &mut AppSession<StoreBackend>
> {
  slot.as_mut().ok_or_else(|| {
    anyhow::Error::new(
      StoreError::NotSignedIn
    )
  })
}
