use crate::contract::{PlanStore, RemoteStore};
use crate::models::{Campaign, Client, Post};
use crate::paths::{PathBuilder, PostLocation};
use crate::sync::RemoteSync;

/// Collaborators shared by the lifecycle, attachment and report operations.
///
/// Operations live in [`crate::trash`], [`crate::attachments`] and [`crate::report`].
pub struct Planner<'a> {
    pub(crate) store: &'a dyn PlanStore,
    pub(crate) sync: RemoteSync<'a>,
    pub(crate) paths: &'a PathBuilder,
}

impl<'a> Planner<'a> {
    pub fn new(store: &'a dyn PlanStore, remote: &'a dyn RemoteStore, paths: &'a PathBuilder) -> Self {
        Self {
            store,
            sync: RemoteSync::new(remote),
            paths,
        }
    }

    pub fn store(&self) -> &'a dyn PlanStore {
        self.store
    }

    pub fn sync(&self) -> &RemoteSync<'a> {
        &self.sync
    }

    pub fn paths(&self) -> &'a PathBuilder {
        self.paths
    }
}

pub(crate) fn location<'p>(client: &'p Client, campaign: &'p Campaign, post: &'p Post) -> PostLocation<'p> {
    PostLocation {
        client: &client.trade_name,
        year: campaign.year,
        month: campaign.month,
        campaign: &campaign.title,
        post: &post.title,
    }
}
