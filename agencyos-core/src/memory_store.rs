//! In-process [`PlanStore`] backed by a JSON snapshot on disk.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::contract::{PlanStore, StoreError};
use crate::models::{
    Agency, AgencyId, AttachedFile, Campaign, CampaignId, Client, ClientId, FileId, Post, PostId,
    StorageSession, UserId,
};

/// Serialized form of every local record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub agencies: Vec<Agency>,
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub files: Vec<AttachedFile>,
    #[serde(default)]
    pub sessions: Vec<StorageSession>,
}

impl Snapshot {
    fn agency_of_campaign(&self, campaign: &Campaign) -> Option<AgencyId> {
        self.clients
            .iter()
            .find(|c| c.id == campaign.client_id)
            .map(|c| c.agency_id)
    }

    fn agency_of_post(&self, post: &Post) -> Option<AgencyId> {
        self.campaigns
            .iter()
            .find(|c| c.id == post.campaign_id)
            .and_then(|c| self.agency_of_campaign(c))
    }

    fn next_file_id(&self) -> FileId {
        self.files.iter().map(|f| f.id).max().unwrap_or(0) + 1
    }
}

fn upsert<T: Clone>(items: &mut Vec<T>, item: &T, same: impl Fn(&T) -> bool) {
    match items.iter_mut().find(|existing| same(existing)) {
        Some(existing) => *existing = item.clone(),
        None => items.push(item.clone()),
    }
}

pub struct MemoryStore {
    inner: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }

    /// Reads a snapshot file. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            info!(path = %path.display(), "No snapshot on disk, starting with an empty store");
            return Ok(Self::new(Snapshot::default()));
        }
        let raw = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        info!(
            path = %path.display(),
            campaigns = snapshot.campaigns.len(),
            posts = snapshot.posts.len(),
            files = snapshot.files.len(),
            "Loaded snapshot"
        );
        Ok(Self::new(snapshot))
    }

    /// Writes the current records to `path` (pretty JSON).
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&*self.lock()?)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Saved snapshot");
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn agency(&self, id: AgencyId) -> Result<Option<Agency>, StoreError> {
        Ok(self.lock()?.agencies.iter().find(|a| a.id == id).cloned())
    }

    async fn agency_owned_by(&self, user_id: UserId) -> Result<Option<Agency>, StoreError> {
        Ok(self
            .lock()?
            .agencies
            .iter()
            .find(|a| a.owner_user_id == user_id)
            .cloned())
    }

    async fn client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.lock()?.clients.iter().find(|c| c.id == id).cloned())
    }

    async fn campaign(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError> {
        Ok(self.lock()?.campaigns.iter().find(|c| c.id == id).cloned())
    }

    async fn post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.lock()?.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn file(&self, id: FileId) -> Result<Option<AttachedFile>, StoreError> {
        Ok(self.lock()?.files.iter().find(|f| f.id == id).cloned())
    }

    async fn posts_for_campaign(&self, campaign_id: CampaignId) -> Result<Vec<Post>, StoreError> {
        let mut posts: Vec<Post> = self
            .lock()?
            .posts
            .iter()
            .filter(|p| p.campaign_id == campaign_id)
            .cloned()
            .collect();
        posts.sort_by_key(|p| p.id);
        Ok(posts)
    }

    async fn files_for_post(&self, post_id: PostId) -> Result<Vec<AttachedFile>, StoreError> {
        let mut files: Vec<AttachedFile> = self
            .lock()?
            .files
            .iter()
            .filter(|f| f.post_id == post_id)
            .cloned()
            .collect();
        files.sort_by_key(|f| (f.order, f.id));
        Ok(files)
    }

    async fn trashed(
        &self,
        agency_id: AgencyId,
    ) -> Result<(Vec<Post>, Vec<Campaign>), StoreError> {
        let snapshot = self.lock()?;
        let posts = snapshot
            .posts
            .iter()
            .filter(|p| p.trashed && snapshot.agency_of_post(p) == Some(agency_id))
            .cloned()
            .collect();
        let campaigns = snapshot
            .campaigns
            .iter()
            .filter(|c| c.trashed && snapshot.agency_of_campaign(c) == Some(agency_id))
            .cloned()
            .collect();
        Ok((posts, campaigns))
    }

    async fn sync_pending_posts(&self, agency_id: AgencyId) -> Result<Vec<Post>, StoreError> {
        let snapshot = self.lock()?;
        Ok(snapshot
            .posts
            .iter()
            .filter(|p| p.sync_pending && snapshot.agency_of_post(p) == Some(agency_id))
            .cloned()
            .collect())
    }

    async fn storage_session(
        &self,
        agency_id: AgencyId,
    ) -> Result<Option<StorageSession>, StoreError> {
        Ok(self
            .lock()?
            .sessions
            .iter()
            .find(|s| s.agency_id == agency_id)
            .cloned())
    }

    async fn save_agency(&self, agency: &Agency) -> Result<(), StoreError> {
        upsert(&mut self.lock()?.agencies, agency, |a| a.id == agency.id);
        Ok(())
    }

    async fn save_client(&self, client: &Client) -> Result<(), StoreError> {
        upsert(&mut self.lock()?.clients, client, |c| c.id == client.id);
        Ok(())
    }

    async fn save_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        upsert(&mut self.lock()?.campaigns, campaign, |c| c.id == campaign.id);
        Ok(())
    }

    async fn save_post(&self, post: &Post) -> Result<(), StoreError> {
        upsert(&mut self.lock()?.posts, post, |p| p.id == post.id);
        Ok(())
    }

    async fn save_file(&self, file: &AttachedFile) -> Result<(), StoreError> {
        upsert(&mut self.lock()?.files, file, |f| f.id == file.id);
        Ok(())
    }

    async fn add_file(
        &self,
        post_id: PostId,
        dropbox_path: &str,
    ) -> Result<AttachedFile, StoreError> {
        let mut snapshot = self.lock()?;
        if !snapshot.posts.iter().any(|p| p.id == post_id) {
            return Err(StoreError::NotFound {
                kind: "post",
                id: post_id,
            });
        }
        let order = snapshot
            .files
            .iter()
            .filter(|f| f.post_id == post_id)
            .map(|f| f.order + 1)
            .max()
            .unwrap_or(0);
        let file = AttachedFile {
            id: snapshot.next_file_id(),
            post_id,
            dropbox_path: dropbox_path.to_string(),
            order,
        };
        snapshot.files.push(file.clone());
        Ok(file)
    }

    async fn remove_file(&self, id: FileId) -> Result<(), StoreError> {
        let mut snapshot = self.lock()?;
        let before = snapshot.files.len();
        snapshot.files.retain(|f| f.id != id);
        if snapshot.files.len() == before {
            return Err(StoreError::NotFound { kind: "file", id });
        }
        Ok(())
    }

    async fn save_storage_session(&self, session: &StorageSession) -> Result<(), StoreError> {
        upsert(&mut self.lock()?.sessions, session, |s| {
            s.agency_id == session.agency_id
        });
        Ok(())
    }

    async fn delete_storage_session(&self, agency_id: AgencyId) -> Result<(), StoreError> {
        self.lock()?.sessions.retain(|s| s.agency_id != agency_id);
        Ok(())
    }

    async fn purge_trashed(&self, agency_id: AgencyId) -> Result<(usize, usize), StoreError> {
        let mut snapshot = self.lock()?;
        let doomed_campaigns: Vec<CampaignId> = snapshot
            .campaigns
            .iter()
            .filter(|c| c.trashed && snapshot.agency_of_campaign(c) == Some(agency_id))
            .map(|c| c.id)
            .collect();
        let doomed_posts: Vec<PostId> = snapshot
            .posts
            .iter()
            .filter(|p| {
                (p.trashed || doomed_campaigns.contains(&p.campaign_id))
                    && snapshot.agency_of_post(p) == Some(agency_id)
            })
            .map(|p| p.id)
            .collect();

        snapshot.files.retain(|f| !doomed_posts.contains(&f.post_id));
        snapshot.posts.retain(|p| !doomed_posts.contains(&p.id));
        snapshot
            .campaigns
            .retain(|c| !doomed_campaigns.contains(&c.id));
        Ok((doomed_posts.len(), doomed_campaigns.len()))
    }
}
