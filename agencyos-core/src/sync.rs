//! Remote sync adapter: the only place the core calls the remote store.
//!
//! Every call is best effort. A failure is logged with its stage tag and turned into a
//! sentinel (`None`, `false`, [`MoveOutcome::Failed`], a short count) so that callers can keep
//! their local state authoritative and decide what the failure means.
//!
//! # Navigation
//! - Uploads: [`RemoteSync::upload`] (with a raw-view link) and [`RemoteSync::store_file`]
//! - Moves: [`RemoteSync::move_post_folder`], followed by [`RemoteSync::prune_empty_ancestors`]
//! - Reads: [`RemoteSync::temporary_link`], [`RemoteSync::thumbnail`],
//!   [`RemoteSync::campaign_previews`]

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::contract::{PlanStore, RemoteError, RemoteStore, StoreError, ThumbnailSize};
use crate::models::{representative_file, CampaignId, PostId};
use crate::paths;

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "m4v"];

/// True when the path ends in a known video extension (case-insensitive).
pub fn is_video_path(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Rewrites a shared link so it serves the file itself instead of the preview page.
pub fn to_raw_link(link: &str) -> String {
    link.replace("?dl=0", "?raw=1").replace("&dl=0", "&raw=1")
}

/// Result of mirroring a post folder move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// The origin folder does not exist remotely; there is nothing to mirror.
    Missing,
    Failed,
}

impl MoveOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, MoveOutcome::Moved)
    }
}

/// One row of the campaign preview list.
#[derive(Debug, Clone, PartialEq)]
pub struct PostPreview {
    pub post_id: PostId,
    pub title: String,
    pub publish_at: DateTime<Utc>,
    /// Short-lived link to the representative file, if one could be issued.
    pub url: Option<String>,
    pub is_video: bool,
}

pub struct RemoteSync<'a> {
    remote: &'a dyn RemoteStore,
}

impl<'a> RemoteSync<'a> {
    pub fn new(remote: &'a dyn RemoteStore) -> Self {
        Self { remote }
    }

    /// Uploads with overwrite and returns a raw-view link to the stored file.
    pub async fn upload(&self, content: Vec<u8>, path: &str) -> Option<String> {
        info!(path, bytes = content.len(), "[SYNC] Uploading file");
        if let Err(e) = self.remote.upload(path, content).await {
            error!(path, error = %e, "[SYNC][ERROR] Upload failed");
            return None;
        }

        let link = match self.remote.create_shared_link(path).await {
            Ok(link) => link,
            Err(RemoteError::SharedLinkExists(_)) => {
                debug!(path, "[SYNC] Shared link exists, reusing it");
                match self.remote.list_shared_links(path).await {
                    Ok(links) => match links.into_iter().next() {
                        Some(link) => link,
                        None => {
                            warn!(path, "[SYNC] Provider reported a link but listed none");
                            return None;
                        }
                    },
                    Err(e) => {
                        error!(path, error = %e, "[SYNC][ERROR] Listing shared links failed");
                        return None;
                    }
                }
            }
            Err(e) => {
                error!(path, error = %e, "[SYNC][ERROR] Creating shared link failed");
                return None;
            }
        };
        let raw = to_raw_link(&link);
        info!(path, link = %raw, "[SYNC] Upload complete");
        Some(raw)
    }

    /// Uploads with overwrite without publishing a link.
    pub async fn store_file(&self, path: &str, content: Vec<u8>) -> bool {
        match self.remote.upload(path, content).await {
            Ok(()) => {
                info!(path, "[SYNC] Stored file");
                true
            }
            Err(e) => {
                error!(path, error = %e, "[SYNC][ERROR] Storing file failed");
                false
            }
        }
    }

    /// Moves a post folder between the active and trash trees.
    pub async fn move_post_folder(&self, from: &str, to: &str) -> MoveOutcome {
        if from == to {
            debug!(from, "[SYNC] Move is a no-op");
            return MoveOutcome::Moved;
        }
        match self.remote.move_path(from, to).await {
            Ok(()) => {
                info!(from, to, "[SYNC] Moved post folder");
                MoveOutcome::Moved
            }
            Err(RemoteError::NotFound(_)) => {
                warn!(from, to, "[SYNC] Origin folder missing remotely, nothing moved");
                MoveOutcome::Missing
            }
            Err(e) => {
                error!(from, to, error = %e, "[SYNC][ERROR] Move failed");
                MoveOutcome::Failed
            }
        }
    }

    /// Deletes empty folders upward from `start`, never touching `boundary` or anything outside it.
    ///
    /// Stops at the first non-empty folder or at the first failure. Returns how many folders
    /// were deleted.
    pub async fn prune_empty_ancestors(&self, start: &str, boundary: &str) -> usize {
        let boundary = boundary.trim_end_matches('/');
        let inside = format!("{boundary}/");
        let mut current = start.trim_end_matches('/').to_string();
        let mut deleted = 0;

        // One iteration per path segment at most.
        let max_steps = current.matches('/').count();
        for _ in 0..max_steps {
            if current.len() <= boundary.len() || !current.starts_with(&inside) {
                debug!(folder = %current, boundary, "[SYNC] Reached prune boundary");
                break;
            }
            match self.remote.list_folder(&current).await {
                Ok(entries) if entries.is_empty() => {}
                Ok(entries) => {
                    debug!(folder = %current, entries = entries.len(), "[SYNC] Folder not empty, pruning stops");
                    break;
                }
                Err(e) => {
                    warn!(folder = %current, error = %e, "[SYNC] Could not list folder, pruning stops");
                    break;
                }
            }
            if let Err(e) = self.remote.delete(&current).await {
                warn!(folder = %current, error = %e, "[SYNC] Could not delete empty folder");
                break;
            }
            info!(folder = %current, "[SYNC] Pruned empty folder");
            deleted += 1;
            match paths::parent(&current) {
                Some(parent) => current = parent.to_string(),
                None => break,
            }
        }
        deleted
    }

    pub async fn temporary_link(&self, path: &str) -> Option<String> {
        match self.remote.temporary_link(path).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(path, error = %e, "[SYNC] Temporary link unavailable");
                None
            }
        }
    }

    /// Provider-rendered PNG thumbnail. Only requested for video files.
    pub async fn thumbnail(&self, path: &str) -> Option<Vec<u8>> {
        if !is_video_path(path) {
            debug!(path, "[SYNC] Not a video, no thumbnail requested");
            return None;
        }
        match self.remote.thumbnail(path, ThumbnailSize::default()).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path, error = %e, "[SYNC] Thumbnail unavailable");
                None
            }
        }
    }

    /// Non-deleted posts of a campaign, newest first, with a temporary link to each
    /// representative file.
    pub async fn campaign_previews(
        &self,
        store: &dyn PlanStore,
        campaign_id: CampaignId,
    ) -> Result<Vec<PostPreview>, StoreError> {
        let mut posts: Vec<_> = store
            .posts_for_campaign(campaign_id)
            .await?
            .into_iter()
            .filter(|p| !p.trashed)
            .collect();
        posts.sort_by(|a, b| b.publish_at.cmp(&a.publish_at).then(b.id.cmp(&a.id)));

        let mut previews = Vec::with_capacity(posts.len());
        for post in posts {
            let files = store.files_for_post(post.id).await?;
            let (url, is_video) = match representative_file(&files) {
                Some(file) => (
                    self.temporary_link(&file.dropbox_path).await,
                    is_video_path(&file.dropbox_path),
                ),
                None => (None, false),
            };
            previews.push(PostPreview {
                post_id: post.id,
                title: post.title,
                publish_at: post.publish_at,
                url,
                is_video,
            });
        }
        info!(campaign_id, previews = previews.len(), "[SYNC] Built campaign previews");
        Ok(previews)
    }
}
