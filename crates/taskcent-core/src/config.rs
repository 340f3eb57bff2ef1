use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow,
  bail
};
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::store::SortOrder;

pub const DEFAULT_API_URL: &str =
  "http://localhost:8000/api";
pub const CONFIG_ENV: &str =
  "TASKCENT_CONFIG";

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Deserialize,
)]
#[serde(
  default,
  deny_unknown_fields
)]
pub struct ApiSection {
  pub url:          String,
  pub timeout_secs: u64
}

impl Default for ApiSection {
  fn default() -> Self {
    Self {
      url:          DEFAULT_API_URL
        .to_string(),
      timeout_secs: 30
    }
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Deserialize,
)]
#[serde(
  default,
  deny_unknown_fields
)]
pub struct DataSection {
  pub location: String
}

impl Default for DataSection {
  fn default() -> Self {
    Self {
      location: "~/.taskcent"
        .to_string()
    }
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Deserialize,
)]
#[serde(
  default,
  deny_unknown_fields
)]
pub struct TasksSection {
  pub sort: String
}

impl Default for TasksSection {
  fn default() -> Self {
    Self {
      sort: SortOrder::default()
        .as_str()
        .to_string()
    }
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Deserialize,
)]
#[serde(
  default,
  deny_unknown_fields
)]
pub struct Config {
  pub api:          ApiSection,
  pub data:         DataSection,
  pub tasks:        TasksSection,
  pub color:        bool,
  #[serde(skip)]
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api:          ApiSection::default(),
      data:         DataSection::default(),
      tasks:        TasksSection::default(),
      color:        true,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let path = resolve_config_path(
      config_override
    )?;
    Self::load_from(path.as_deref())
  }

  /// Reads `path` when given, falling
  /// back to defaults otherwise.
  pub fn load_from(
    path: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) = path else {
      warn!(
        "no config file found; using \
         defaults"
      );
      return Ok(Self::default());
    };

    let path = expand_tilde(path);
    info!(config = %path.display(), "loading config");
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let mut cfg: Config =
      toml::from_str(&text)
        .with_context(|| {
          format!(
            "invalid config file {}",
            path.display()
          )
        })?;
    cfg.loaded_files.push(path.clone());
    cfg.validate().with_context(|| {
      format!(
        "invalid config file {}",
        path.display()
      )
    })?;
    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .trim()
        .to_string();
      let value = v.trim().to_string();
      debug!(key = %key, value = %value, "applying override");

      match key.as_str() {
        | "api.url" => {
          self.api.url = value
        }
        | "api.timeout_secs" => {
          self.api.timeout_secs = value
            .parse()
            .map_err(|_| {
              anyhow!(
                "api.timeout_secs must \
                 be a whole number of \
                 seconds, got \
                 {value:?}"
              )
            })?;
        }
        | "data.location" => {
          self.data.location = value
        }
        | "tasks.sort" => {
          self.tasks.sort = value
        }
        | "color" => {
          self.color = parse_bool(&value)
            .ok_or_else(|| {
              anyhow!(
                "color must be on or \
                 off, got {value:?}"
              )
            })?;
        }
        | other => {
          bail!(
            "unknown config key: \
             {other}"
          )
        }
      }
    }

    self.validate()
  }

  pub fn validate(
    &self
  ) -> anyhow::Result<()> {
    if self.api.url.trim().is_empty() {
      bail!("api.url must not be empty");
    }
    if self.api.timeout_secs == 0 {
      bail!(
        "api.timeout_secs must be \
         greater than zero"
      );
    }
    if SortOrder::parse(&self.tasks.sort)
      .is_none()
    {
      bail!(
        "tasks.sort must be one of \
         server, due, priority; got \
         {:?}",
        self.tasks.sort
      );
    }
    Ok(())
  }

  pub fn api_url(&self) -> &str {
    self
      .api
      .url
      .trim()
      .trim_end_matches('/')
  }

  pub fn api_timeout(&self) -> Duration {
    Duration::from_secs(
      self.api.timeout_secs
    )
  }

  pub fn sort_order(&self) -> SortOrder {
    SortOrder::parse(&self.tasks.sort)
      .unwrap_or_default()
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
    expand_tilde(path)
  } else if !cfg
    .data
    .location
    .trim()
    .is_empty()
  {
    expand_tilde(Path::new(
      cfg.data.location.trim()
    ))
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
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(from_env) =
    std::env::var(CONFIG_ENV)
  {
    if from_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      from_env
    )));
  }

  let Some(config_dir) =
    dirs::config_dir()
  else {
    debug!("no config directory on this platform");
    return Ok(None);
  };
  let candidate = config_dir
    .join("taskcent")
    .join("config.toml");
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
  Ok(home.join(".taskcent"))
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

fn parse_bool(
  s: &str
) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::time::Duration;

  use super::{
    Config,
    DEFAULT_API_URL,
    resolve_data_dir
  };
  use crate::store::SortOrder;

  fn rc(
    key: &str,
    value: &str
  ) -> (String, String) {
    (key.to_string(), value.to_string())
  }

  #[test]
  fn defaults_without_file() {
    let cfg = Config::load_from(None)
      .expect("defaults");
    assert_eq!(cfg.api_url(), DEFAULT_API_URL);
    assert_eq!(
      cfg.api_timeout(),
      Duration::from_secs(30)
    );
    assert_eq!(
      cfg.sort_order(),
      SortOrder::Server
    );
    assert!(cfg.color);
    assert!(cfg.loaded_files.is_empty());
  }

  #[test]
  fn file_values_override_defaults() {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(
      &path,
      "color = false\n\n[api]\nurl = \
       \"https://tasks.example.com/api/\"\n\n\
       [tasks]\nsort = \"priority\"\n"
    )
    .expect("write config");

    let cfg = Config::load_from(Some(
      path.as_path()
    ))
    .expect("load");
    assert_eq!(
      cfg.api_url(),
      "https://tasks.example.com/api"
    );
    assert_eq!(cfg.api.timeout_secs, 30);
    assert_eq!(
      cfg.sort_order(),
      SortOrder::Priority
    );
    assert!(!cfg.color);
    assert_eq!(cfg.loaded_files, vec![
      path
    ]);
  }

  #[test]
  fn unknown_keys_in_file_are_rejected()
  {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(
      &path,
      "[api]\nendpoint = \"x\"\n"
    )
    .expect("write config");
    assert!(
      Config::load_from(Some(path.as_path()))
        .is_err()
    );
  }

  #[test]
  fn bad_sort_in_file_is_rejected() {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(
      &path,
      "[tasks]\nsort = \"alphabetical\"\n"
    )
    .expect("write config");
    assert!(
      Config::load_from(Some(path.as_path()))
        .is_err()
    );
  }

  #[test]
  fn overrides_apply_after_file() {
    let mut cfg = Config::default();
    cfg
      .apply_overrides(vec![
        rc("rc.tasks.sort", "due"),
        rc("api.timeout_secs", "5"),
        rc("color", "off"),
      ])
      .expect("overrides");
    assert_eq!(
      cfg.sort_order(),
      SortOrder::DueDate
    );
    assert_eq!(
      cfg.api_timeout(),
      Duration::from_secs(5)
    );
    assert!(!cfg.color);
  }

  #[test]
  fn bad_overrides_are_errors() {
    for (key, value) in [
      ("api.timeout_secs", "soon"),
      ("api.timeout_secs", "0"),
      ("color", "maybe"),
      ("tasks.sort", "random"),
      ("api.url", " "),
      ("editor", "vim"),
    ] {
      let mut cfg = Config::default();
      assert!(
        cfg
          .apply_overrides(vec![rc(
            key, value
          )])
          .is_err(),
        "{key}={value}"
      );
    }
  }

  #[test]
  fn data_dir_is_created() {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let target =
      dir.path().join("nested/data");
    let resolved = resolve_data_dir(
      &Config::default(),
      Some(target.as_path())
    )
    .expect("resolve");
    assert_eq!(resolved, target);
    assert!(target.is_dir());
  }
}
