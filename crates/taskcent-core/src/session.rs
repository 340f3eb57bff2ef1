use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use taskcent_shared::Credentials;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::api::{AuthApi, TaskApi};
use crate::error::{ApiError, ErrorKind};
use crate::store::{SortOrder, TaskStore};

pub const PASSWORD_MIN_CHARS: usize = 6;
pub const ACCOUNT_NOT_FOUND_CODE: &str = "account_not_found";

/// The signed-in identity persisted between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("Account not found. Please sign up first.")]
    AccountNotFound,
    #[error(transparent)]
    Rejected(ApiError),
}

impl AuthFailure {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Decides whether a failed login means the account does not exist. The
/// server's structured code is authoritative; a bare 404 counts too.
pub fn classify_login_failure(err: ApiError) -> AuthFailure {
    if err.code() == Some(ACCOUNT_NOT_FOUND_CODE) || err.kind() == ErrorKind::NotFound {
        AuthFailure::AccountNotFound
    } else {
        AuthFailure::Rejected(err)
    }
}

/// Checks credentials before any request is made. Sign-up additionally
/// enforces the password minimum.
pub fn credentials(
    email: &str,
    password: &str,
    signing_up: bool,
) -> Result<Credentials, AuthFailure> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthFailure::Invalid("Email is required"));
    }
    if password.is_empty() {
        return Err(AuthFailure::Invalid("Password is required"));
    }
    if signing_up && password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(AuthFailure::Invalid("Password must be at least 6 characters"));
    }
    Ok(Credentials {
        email: email.to_string(),
        password: password.to_string(),
    })
}

#[instrument(skip(api, credentials), fields(email = %credentials.email))]
pub async fn login(api: &dyn AuthApi, credentials: &Credentials) -> Result<Session, AuthFailure> {
    let response = api
        .login(credentials)
        .await
        .map_err(classify_login_failure)
        .inspect_err(|err| warn!(error = %err, "login failed"))?;
    session_from(credentials, response.token, response.email)
}

#[instrument(skip(api, credentials), fields(email = %credentials.email))]
pub async fn signup(api: &dyn AuthApi, credentials: &Credentials) -> Result<Session, AuthFailure> {
    let response = api
        .signup(credentials)
        .await
        .map_err(AuthFailure::Rejected)
        .inspect_err(|err| warn!(error = %err, "signup failed"))?;
    session_from(credentials, response.token, response.email)
}

fn session_from(
    credentials: &Credentials,
    token: String,
    email: Option<String>,
) -> Result<Session, AuthFailure> {
    if token.trim().is_empty() {
        return Err(AuthFailure::Rejected(ApiError::invalid_payload(
            "server issued an empty token",
        )));
    }
    let email = email
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| credentials.email.clone());
    info!(email = %email, "signed in");
    Ok(Session { email, token })
}

/// `session.json` inside the data directory.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub const FILE_NAME: &'static str = "session.json";

    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[tracing::instrument(skip(self), fields(file = %self.path.display()))]
    pub fn load(&self) -> anyhow::Result<Option<Session>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                debug!("no saved session");
                return Ok(None);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()));
            }
        };

        let session: Session = serde_json::from_str(&text)
            .with_context(|| format!("failed parsing {}", self.path.display()))?;
        Ok(Some(session))
    }

    #[tracing::instrument(skip(self, session), fields(file = %self.path.display()))]
    pub fn save(&self, session: &Session) -> anyhow::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, session)?;
        writeln!(temp)?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        debug!(email = %session.email, "session saved");
        Ok(())
    }

    /// Returns whether a session file existed.
    #[tracing::instrument(skip(self), fields(file = %self.path.display()))]
    pub fn clear(&self) -> anyhow::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(err).with_context(|| format!("failed to remove {}", self.path.display()))
            }
        }
    }
}

/// A signed-in session together with the task store bound to it.
pub struct ActiveSession {
    session: Session,
    store: TaskStore,
    file: SessionFile,
}

impl ActiveSession {
    pub fn start(
        api: Arc<dyn TaskApi>,
        session: Session,
        order: SortOrder,
        file: SessionFile,
    ) -> Self {
        info!(email = %session.email, order = order.as_str(), "session started");
        Self {
            session,
            store: TaskStore::new(api, order),
            file,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Empties the store, detaching requests still in flight, and forgets
    /// the saved session.
    pub fn teardown(self) -> anyhow::Result<()> {
        self.store.reset();
        let removed = self.file.clear()?;
        info!(email = %self.session.email, removed, "session ended");
        Ok(())
    }
}
