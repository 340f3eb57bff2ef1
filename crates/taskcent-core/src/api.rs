use async_trait::async_trait;
use taskcent_shared::{AuthResponse, Credentials, RawTask, TaskDraft, TaskPatch};

use crate::error::ApiError;
use crate::task::TaskId;

/// The task endpoints of the remote API. Implementations return payloads
/// as the server sent them; normalization is the store's job.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list(&self) -> Result<Vec<RawTask>, ApiError>;

    async fn create(&self, draft: &TaskDraft) -> Result<RawTask, ApiError>;

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<RawTask, ApiError>;

    async fn delete(&self, id: &TaskId) -> Result<(), ApiError>;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;

    async fn signup(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;
}
