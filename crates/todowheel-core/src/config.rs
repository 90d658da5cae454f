use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::hosted::HostedConfig;
use crate::mirror::DEFAULT_DEBOUNCE;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum StorageMode {
  Local,
  Hosted
}

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "data.location".to_string(),
      "~/.todowheel".to_string()
    );
    map.insert(
      "storage".to_string(),
      "local".to_string()
    );
    map.insert(
      "sync.debounce_ms".to_string(),
      DEFAULT_DEBOUNCE
        .as_millis()
        .to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc =
      resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading todowheelrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no todowheelrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn storage_mode(
    &self
  ) -> anyhow::Result<StorageMode> {
    let raw = self
      .get("storage")
      .unwrap_or_default();
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "" | "local" => {
        Ok(StorageMode::Local)
      }
      | "hosted" => {
        Ok(StorageMode::Hosted)
      }
      | other => {
        Err(anyhow!(
          "invalid storage mode \
           `{other}`; expected \
           `local` or `hosted`"
        ))
      }
    }
  }

  pub fn hosted(
    &self
  ) -> anyhow::Result<HostedConfig> {
    let url = self
      .get("hosted.url")
      .filter(|v| !v.trim().is_empty())
      .ok_or_else(|| {
        anyhow!(
          "hosted storage needs \
           `hosted.url` in the \
           todowheelrc"
        )
      })?;
    let anon_key = self
      .get("hosted.anon_key")
      .filter(|v| !v.trim().is_empty())
      .ok_or_else(|| {
        anyhow!(
          "hosted storage needs \
           `hosted.anon_key` in the \
           todowheelrc"
        )
      })?;
    Ok(HostedConfig::new(
      url.trim(),
      anon_key.trim()
    ))
  }

  pub fn debounce(&self) -> Duration {
    match self.get("sync.debounce_ms") {
      | Some(raw) => {
        match raw.trim().parse::<u64>() {
          | Ok(ms) => {
            Duration::from_millis(ms)
          }
          | Err(_) => {
            warn!(value = %raw, "invalid sync.debounce_ms; using default");
            DEFAULT_DEBOUNCE
          }
        }
      }
      | None => DEFAULT_DEBOUNCE
    }
  }

  pub fn default_goal(
    &self
  ) -> Option<String> {
    self
      .get("default.goal")
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let line = match raw_line
        .split_once('#')
      {
        | Some((before, _)) => {
          before.trim()
        }
        | None => raw_line.trim()
      };
      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var("TODOWHEELRC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    return Ok(None);
  };
  let candidate =
    home.join(".todowheelrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".todowheel"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let expanded =
    expand_tilde(Path::new(include));
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::{
    Config,
    StorageMode
  };

  #[test]
  fn rc_file_with_include_and_comments()
  {
    let temp = tempfile::tempdir()
      .expect("tempdir");
    std::fs::write(
      temp.path().join("hosted.rc"),
      "hosted.url = https://db.example.com/\nhosted.anon_key = anon\n"
    )
    .expect("write include");
    let rc = temp.path().join("main.rc");
    std::fs::write(
      &rc,
      "# todowheel\nstorage = hosted # remote\ninclude hosted.rc\nsync.debounce_ms = 50\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(&rc))
      .expect("load config");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg
        .storage_mode()
        .expect("storage mode"),
      StorageMode::Hosted
    );
    let hosted =
      cfg.hosted().expect("hosted");
    assert_eq!(
      hosted.base_url(),
      "https://db.example.com"
    );
    assert_eq!(
      cfg.debounce(),
      Duration::from_millis(50)
    );
  }

  #[test]
  fn overrides_strip_rc_prefix_and_win()
  {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "rc.color".to_string(),
      "off".to_string()
    )]);
    assert_eq!(
      cfg.get_bool("color"),
      Some(false)
    );
    assert_eq!(
      cfg
        .storage_mode()
        .expect("storage mode"),
      StorageMode::Local
    );
  }

  #[test]
  fn invalid_values_are_reported_or_defaulted()
  {
    let mut cfg = Config::default();
    cfg.apply_overrides([
      (
        "storage".to_string(),
        "cloud".to_string()
      ),
      (
        "sync.debounce_ms".to_string(),
        "soon".to_string()
      )
    ]);
    assert!(cfg.storage_mode().is_err());
    assert!(cfg.hosted().is_err());
    assert_eq!(
      cfg.debounce(),
      Duration::from_millis(750)
    );
  }

  #[test]
  fn malformed_line_names_file_and_line()
  {
    let temp = tempfile::tempdir()
      .expect("tempdir");
    let rc = temp.path().join("bad.rc");
    std::fs::write(
      &rc,
      "color = on\nnot a pair\n"
    )
    .expect("write rc");
    let err = Config::load(Some(&rc))
      .expect_err("should fail");
    assert!(
      err.to_string().contains(":2:")
    );
  }
}
