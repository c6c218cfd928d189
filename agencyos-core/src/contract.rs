#![allow(unused)]

//! # contract: interfaces at the edges of the core
//!
//! The core talks to three collaborators it does not own:
//! - [`RemoteStore`]: the cloud file store that mirrors post folders (Dropbox in production).
//! - [`PlanStore`]: the local records (agencies, clients, campaigns, posts, files). The local
//!   store is the source of truth for existence and soft-delete state.
//! - [`PdfRenderer`]: lays out a [`ReportDocument`] as PDF bytes.
//!
//! ## Mocking & Testing
//! - `RemoteStore` and `PdfRenderer` are annotated for `mockall`; mocks are exported under the
//!   `test-export-mocks` feature so the CLI crate and integration tests can use them.
//! - `PlanStore` is exercised through [`crate::memory_store::MemoryStore`] instead.
//!
//! ## Error Handling
//! - Remote calls return [`RemoteError`]. The sync adapter ([`crate::sync::RemoteSync`]) never
//!   lets one escape; it logs and returns a sentinel.
//! - Local calls return [`StoreError`], which does propagate.

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use thiserror::Error;

use crate::models::{
    Agency, AgencyId, AttachedFile, Campaign, CampaignId, Client, ClientId, FileId, Post, PostId,
    StorageSession, UserId,
};
use crate::report::ReportDocument;

/// Failure of one call against the remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote store rejected the credentials")]
    Auth,

    #[error("remote path not found: {0}")]
    NotFound(String),

    #[error("a shared link already exists for {0}")]
    SharedLinkExists(String),

    #[error("remote conflict: {0}")]
    Conflict(String),

    #[error("remote API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// One entry returned by a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub is_folder: bool,
}

/// Thumbnail sizes offered by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailSize {
    W256H256,
    #[default]
    W640H480,
    W1024H768,
}

impl ThumbnailSize {
    pub fn as_tag(&self) -> &'static str {
        match self {
            ThumbnailSize::W256H256 => "w256h256",
            ThumbnailSize::W640H480 => "w640h480",
            ThumbnailSize::W1024H768 => "w1024h768",
        }
    }
}

/// Provider operations consumed by the sync adapter.
///
/// Paths are absolute remote paths without trailing slash, as built by [`crate::paths`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload `content` to `path`, overwriting whatever is there.
    async fn upload(&self, path: &str, content: Vec<u8>) -> Result<(), RemoteError>;

    /// Create a shared link. Fails with [`RemoteError::SharedLinkExists`] if one exists.
    async fn create_shared_link(&self, path: &str) -> Result<String, RemoteError>;

    /// Existing shared links for `path`, most relevant first.
    async fn list_shared_links(&self, path: &str) -> Result<Vec<String>, RemoteError>;

    /// Move a file or folder. Never auto-renames.
    async fn move_path(&self, from: &str, to: &str) -> Result<(), RemoteError>;

    /// Entries directly inside a folder.
    async fn list_folder(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Delete a file or folder (folders are deleted with their contents).
    async fn delete(&self, path: &str) -> Result<(), RemoteError>;

    /// Short-lived direct download URL.
    async fn temporary_link(&self, path: &str) -> Result<String, RemoteError>;

    /// PNG thumbnail rendered by the provider.
    async fn thumbnail(&self, path: &str, size: ThumbnailSize) -> Result<Vec<u8>, RemoteError>;
}

/// Failure of the local record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format error: {0}")]
    Format(#[from] serde_json::Error),

    #[error("store is poisoned")]
    Poisoned,
}

/// Local records. Reads return owned copies; writes replace the stored record by id.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn agency(&self, id: AgencyId) -> Result<Option<Agency>, StoreError>;

    async fn agency_owned_by(&self, user_id: UserId) -> Result<Option<Agency>, StoreError>;

    async fn client(&self, id: ClientId) -> Result<Option<Client>, StoreError>;

    async fn campaign(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError>;

    async fn post(&self, id: PostId) -> Result<Option<Post>, StoreError>;

    async fn file(&self, id: FileId) -> Result<Option<AttachedFile>, StoreError>;

    /// All posts of a campaign, trashed or not, in id order.
    async fn posts_for_campaign(&self, campaign_id: CampaignId) -> Result<Vec<Post>, StoreError>;

    /// Files of a post ordered by display order, then id.
    async fn files_for_post(&self, post_id: PostId) -> Result<Vec<AttachedFile>, StoreError>;

    /// Trashed posts and trashed campaigns of an agency.
    async fn trashed(&self, agency_id: AgencyId)
        -> Result<(Vec<Post>, Vec<Campaign>), StoreError>;

    /// Posts of an agency whose remote mirror lags their local state.
    async fn sync_pending_posts(&self, agency_id: AgencyId) -> Result<Vec<Post>, StoreError>;

    async fn storage_session(
        &self,
        agency_id: AgencyId,
    ) -> Result<Option<StorageSession>, StoreError>;

    async fn save_agency(&self, agency: &Agency) -> Result<(), StoreError>;

    async fn save_client(&self, client: &Client) -> Result<(), StoreError>;

    async fn save_campaign(&self, campaign: &Campaign) -> Result<(), StoreError>;

    async fn save_post(&self, post: &Post) -> Result<(), StoreError>;

    async fn save_file(&self, file: &AttachedFile) -> Result<(), StoreError>;

    /// Record a new file on a post with the next display order.
    async fn add_file(&self, post_id: PostId, dropbox_path: &str)
        -> Result<AttachedFile, StoreError>;

    async fn remove_file(&self, id: FileId) -> Result<(), StoreError>;

    /// Create or replace the agency's session.
    async fn save_storage_session(&self, session: &StorageSession) -> Result<(), StoreError>;

    async fn delete_storage_session(&self, agency_id: AgencyId) -> Result<(), StoreError>;

    /// Permanently remove trashed campaigns (with all their posts) and trashed posts, with
    /// their files. Returns `(posts_removed, campaigns_removed)`.
    async fn purge_trashed(&self, agency_id: AgencyId) -> Result<(usize, usize), StoreError>;
}

/// Failure of the PDF layout step.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF layout failed: {0}")]
    Layout(String),
}

/// Report document to PDF. Image paths in the document must exist for the whole call.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait PdfRenderer: Send + Sync {
    fn render(&self, document: &ReportDocument) -> Result<Vec<u8>, RenderError>;
}
