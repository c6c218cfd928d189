//! Soft delete of posts and campaigns, mirrored into the remote trash tree.
//!
//! The local flag always commits. The remote move is mirrored best effort:
//! - moved: attached file paths and the post's `dropbox_path` are rewritten under the new
//!   folder, and now-empty ancestors of the old folder are pruned
//! - origin missing remotely: nothing to mirror, records are left as they are
//! - any other failure: records keep their old paths and the post is marked `sync_pending`
//!   until [`Planner::resync_pending`] succeeds

use chrono::{DateTime, Utc};
use tracing::{info, info_span, warn, Instrument};

use crate::agency::{campaign_in_agency, post_in_agency};
use crate::error::PlannerError;
use crate::models::{AgencyId, Campaign, CampaignId, Client, Post, PostId};
use crate::paths;
use crate::planner::{location, Planner};
use crate::sync::MoveOutcome;

/// Counts of what happened to the remote mirror during a campaign-level operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub moved: usize,
    pub missing: usize,
    pub pending: usize,
    pub unchanged: usize,
}

impl MirrorReport {
    fn record(&mut self, outcome: MoveOutcome) {
        match outcome {
            MoveOutcome::Moved => self.moved += 1,
            MoveOutcome::Missing => self.missing += 1,
            MoveOutcome::Failed => self.pending += 1,
        }
    }
}

/// Contents of an agency's trash, most recently deleted first.
#[derive(Debug, Clone, Default)]
pub struct TrashListing {
    pub posts: Vec<Post>,
    pub campaigns: Vec<Campaign>,
}

impl<'a> Planner<'a> {
    pub async fn trash_post(
        &self,
        agency_id: AgencyId,
        post_id: PostId,
    ) -> Result<Option<MoveOutcome>, PlannerError> {
        let scope = post_in_agency(self.store, agency_id, post_id).await?;
        if scope.post.trashed {
            info!(post_id, "[TRASH] Post already in trash");
            return Ok(None);
        }
        let mut post = scope.post;
        let outcome = self
            .relocate(&scope.client, &scope.campaign, &mut post, true)
            .await?;
        post.trashed = true;
        post.trashed_at = Some(Utc::now());
        self.store.save_post(&post).await?;
        info!(post_id, ?outcome, "[TRASH] Post moved to trash");
        Ok(Some(outcome))
    }

    pub async fn restore_post(
        &self,
        agency_id: AgencyId,
        post_id: PostId,
    ) -> Result<Option<MoveOutcome>, PlannerError> {
        let scope = post_in_agency(self.store, agency_id, post_id).await?;
        if !scope.post.trashed {
            info!(post_id, "[TRASH] Post is not in trash");
            return Ok(None);
        }
        let mut post = scope.post;
        let outcome = self
            .relocate(&scope.client, &scope.campaign, &mut post, false)
            .await?;
        post.trashed = false;
        post.trashed_at = None;
        self.store.save_post(&post).await?;
        info!(post_id, ?outcome, "[TRASH] Post restored");
        Ok(Some(outcome))
    }

    /// Trashes a campaign and cascades the flag and timestamp to every post in it.
    pub async fn trash_campaign(
        &self,
        agency_id: AgencyId,
        campaign_id: CampaignId,
    ) -> Result<MirrorReport, PlannerError> {
        self.set_campaign_trashed(agency_id, campaign_id, Some(Utc::now()))
            .instrument(info_span!("trash_campaign", campaign_id))
            .await
    }

    /// Restores a campaign and every post in it.
    pub async fn restore_campaign(
        &self,
        agency_id: AgencyId,
        campaign_id: CampaignId,
    ) -> Result<MirrorReport, PlannerError> {
        self.set_campaign_trashed(agency_id, campaign_id, None)
            .instrument(info_span!("restore_campaign", campaign_id))
            .await
    }

    pub async fn trash_listing(&self, agency_id: AgencyId) -> Result<TrashListing, PlannerError> {
        let (mut posts, mut campaigns) = self.store.trashed(agency_id).await?;
        posts.sort_by(|a, b| b.trashed_at.cmp(&a.trashed_at).then(b.id.cmp(&a.id)));
        campaigns.sort_by(|a, b| b.trashed_at.cmp(&a.trashed_at).then(b.id.cmp(&a.id)));
        Ok(TrashListing { posts, campaigns })
    }

    /// Permanently deletes trashed records. The remote trash tree is left untouched.
    pub async fn empty_trash(&self, agency_id: AgencyId) -> Result<(usize, usize), PlannerError> {
        let (posts, campaigns) = self.store.purge_trashed(agency_id).await?;
        info!(agency_id, posts, campaigns, "[TRASH] Emptied trash");
        Ok((posts, campaigns))
    }

    /// Retries the remote move of every post whose mirror lags its local state.
    /// Returns `(resolved, still_pending)`.
    pub async fn resync_pending(&self, agency_id: AgencyId) -> Result<(usize, usize), PlannerError> {
        let pending = self.store.sync_pending_posts(agency_id).await?;
        let mut resolved = 0;
        for post in pending {
            let scope = post_in_agency(self.store, agency_id, post.id).await?;
            let mut post = scope.post;
            let trashed = post.trashed;
            self.relocate(&scope.client, &scope.campaign, &mut post, trashed)
                .await?;
            if !post.sync_pending {
                resolved += 1;
            }
            self.store.save_post(&post).await?;
        }
        let still_pending = self.store.sync_pending_posts(agency_id).await?.len();
        info!(agency_id, resolved, still_pending, "[TRASH] Resync finished");
        Ok((resolved, still_pending))
    }

    async fn set_campaign_trashed(
        &self,
        agency_id: AgencyId,
        campaign_id: CampaignId,
        trashed_at: Option<DateTime<Utc>>,
    ) -> Result<MirrorReport, PlannerError> {
        let scope = campaign_in_agency(self.store, agency_id, campaign_id).await?;
        let to_trash = trashed_at.is_some();
        let mut report = MirrorReport::default();

        for mut post in self.store.posts_for_campaign(campaign_id).await? {
            if post.trashed == to_trash {
                report.unchanged += 1;
            } else {
                let outcome = self
                    .relocate(&scope.client, &scope.campaign, &mut post, to_trash)
                    .await?;
                report.record(outcome);
            }
            post.trashed = to_trash;
            post.trashed_at = trashed_at;
            self.store.save_post(&post).await?;
        }

        let mut campaign = scope.campaign;
        campaign.trashed = to_trash;
        campaign.trashed_at = trashed_at;
        self.store.save_campaign(&campaign).await?;
        info!(campaign_id, to_trash, ?report, "[TRASH] Campaign state changed");
        Ok(report)
    }

    /// Mirrors a post into the tree it is about to belong to and updates `post` in memory.
    /// The caller saves `post`; attached files are saved here.
    async fn relocate(
        &self,
        client: &Client,
        campaign: &Campaign,
        post: &mut Post,
        to_trash: bool,
    ) -> Result<MoveOutcome, PlannerError> {
        let loc = location(client, campaign, post);
        let from = self.paths.post_folder(&loc, !to_trash);
        let to = self.paths.post_folder(&loc, to_trash);

        let outcome = self.sync.move_post_folder(&from, &to).await;
        match outcome {
            MoveOutcome::Moved => {
                for mut file in self.store.files_for_post(post.id).await? {
                    file.dropbox_path = paths::file_path(&to, file.basename());
                    self.store.save_file(&file).await?;
                }
                post.dropbox_path = Some(to);
                post.sync_pending = false;
                if let Some(origin_parent) = paths::parent(&from) {
                    self.sync
                        .prune_empty_ancestors(origin_parent, &self.paths.clients_root(!to_trash))
                        .await;
                }
            }
            MoveOutcome::Missing => {
                post.sync_pending = false;
            }
            MoveOutcome::Failed => {
                warn!(post_id = post.id, from = %from, to = %to, "[TRASH] Remote mirror lags, marking post for resync");
                post.sync_pending = true;
            }
        }
        Ok(outcome)
    }
}
