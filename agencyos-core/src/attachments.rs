//! Post attachments and logos.

use tracing::{info, warn};

use crate::agency::{client_in_agency, file_in_agency, post_in_agency};
use crate::error::PlannerError;
use crate::models::{AgencyId, AttachedFile, ClientId, FileId, PostId};
use crate::paths;
use crate::planner::{location, Planner};

fn extension_of(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => ext,
        _ => "",
    }
}

impl<'a> Planner<'a> {
    /// Uploads a file into the post's folder and records it with the next display order.
    /// Returns `None` when the upload fails; nothing is recorded then.
    pub async fn attach_post_file(
        &self,
        agency_id: AgencyId,
        post_id: PostId,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<Option<AttachedFile>, PlannerError> {
        let scope = post_in_agency(self.store, agency_id, post_id).await?;
        // A pending post's remote folder is still in the tree it was moving out of.
        let in_trash = scope.post.trashed != scope.post.sync_pending;
        let folder = self.paths.post_folder(
            &location(&scope.client, &scope.campaign, &scope.post),
            in_trash,
        );
        let remote_path = paths::file_path(&folder, filename);

        if !self.sync.store_file(&remote_path, content).await {
            warn!(post_id, path = %remote_path, "[SYNC] Attachment not recorded, upload failed");
            return Ok(None);
        }
        let file = self.store.add_file(post_id, &remote_path).await?;
        let mut post = scope.post;
        post.dropbox_path = Some(folder);
        self.store.save_post(&post).await?;
        info!(post_id, file_id = file.id, order = file.order, "[SYNC] Attached file");
        Ok(Some(file))
    }

    /// Forgets a file locally. The remote copy is kept.
    pub async fn remove_post_file(
        &self,
        agency_id: AgencyId,
        file_id: FileId,
    ) -> Result<AttachedFile, PlannerError> {
        let (file, _) = file_in_agency(self.store, agency_id, file_id).await?;
        self.store.remove_file(file_id).await?;
        info!(file_id, post_id = file.post_id, "Removed attached file");
        Ok(file)
    }

    /// Uploads the agency logo and stores its raw-view link.
    pub async fn upload_agency_logo(
        &self,
        agency_id: AgencyId,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<Option<String>, PlannerError> {
        let mut agency = self
            .store
            .agency(agency_id)
            .await?
            .ok_or_else(|| PlannerError::not_found("agency", agency_id))?;
        let path = self.paths.agency_logo(&agency.trade_name, extension_of(filename));
        let Some(link) = self.sync.upload(content, &path).await else {
            return Ok(None);
        };
        agency.logo_link = Some(link.clone());
        self.store.save_agency(&agency).await?;
        Ok(Some(link))
    }

    /// Uploads a client logo and stores its raw-view link.
    pub async fn upload_client_logo(
        &self,
        agency_id: AgencyId,
        client_id: ClientId,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<Option<String>, PlannerError> {
        let mut client = client_in_agency(self.store, agency_id, client_id).await?;
        let path = self.paths.client_logo(&client.trade_name, extension_of(filename));
        let Some(link) = self.sync.upload(content, &path).await else {
            return Ok(None);
        };
        client.logo_link = Some(link.clone());
        self.store.save_client(&client).await?;
        Ok(Some(link))
    }
}
