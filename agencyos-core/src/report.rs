//! Campaign grid report: resolve images, paginate, render PDF, optionally publish.
//!
//! # Flow
//! 1. Load the campaign's non-deleted posts ordered by publish date.
//! 2. Resolve each post's representative image concurrently (video: provider thumbnail,
//!    image: temporary link), normalized into temp files owned by one [`TempRegistry`].
//! 3. Paginate with [`crate::grid::paginate`] into a [`ReportDocument`].
//! 4. Render through the [`PdfRenderer`] while the temp files still exist, then drop the registry.
//!
//! Missing images never fail the report; their slot renders as a blank placeholder.

use futures::future::join_all;
use std::path::PathBuf;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agency::{campaign_in_agency, CampaignScope};
use crate::config::ReportConfig;
use crate::contract::PdfRenderer;
use crate::error::PlannerError;
use crate::grid::{paginate, GridPage};
use crate::models::{representative_file, Agency, AgencyId, AttachedFile, CampaignId, Post};
use crate::normalize::{ImageNormalizer, ImageSource, TempRegistry};
use crate::planner::Planner;
use crate::sync::is_video_path;

/// One post with its resolved grid image.
#[derive(Debug, Clone)]
pub struct GridSlot {
    pub post: Post,
    pub image: Option<PathBuf>,
    pub is_video: bool,
}

/// Everything the PDF layout needs. Image paths point at normalized JPEGs.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub campaign_title: String,
    pub period: String,
    pub client_name: String,
    pub client_handle: String,
    pub agency_handle: String,
    pub client_logo: Option<PathBuf>,
    pub agency_logo: Option<PathBuf>,
    pub pages: Vec<GridPage<GridSlot>>,
}

/// Result of a published report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedReport {
    pub path: String,
    pub link: String,
}

pub struct CampaignReport<'a> {
    planner: &'a Planner<'a>,
    normalizer: &'a ImageNormalizer,
    renderer: &'a dyn PdfRenderer,
    bounds: ReportConfig,
    temp_dir: Option<PathBuf>,
}

impl<'a> CampaignReport<'a> {
    pub fn new(
        planner: &'a Planner<'a>,
        normalizer: &'a ImageNormalizer,
        renderer: &'a dyn PdfRenderer,
        bounds: ReportConfig,
    ) -> Self {
        Self {
            planner,
            normalizer,
            renderer,
            bounds,
            temp_dir: None,
        }
    }

    /// Put normalized images under `dir` instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Builds the PDF of a campaign. Temp files are gone when this returns, whatever the outcome.
    pub async fn build(
        &self,
        agency_id: AgencyId,
        campaign_id: CampaignId,
    ) -> Result<Vec<u8>, PlannerError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("campaign_pdf", %request_id, campaign_id);
        async {
            info!("[PDF] Starting campaign report");
            let scope = campaign_in_agency(self.planner.store, agency_id, campaign_id).await?;
            let agency = self
                .planner
                .store
                .agency(agency_id)
                .await?
                .ok_or_else(|| PlannerError::not_found("agency", agency_id))?;

            let registry = match &self.temp_dir {
                Some(dir) => TempRegistry::in_dir(dir),
                None => TempRegistry::new(),
            };
            let document = self.assemble(&scope, &agency, &registry).await?;
            debug!(
                pages = document.pages.len(),
                client_logo = document.client_logo.is_some(),
                agency_logo = document.agency_logo.is_some(),
                "[PDF] Document assembled"
            );

            let rendered = self.renderer.render(&document);
            if let Err(e) = registry.close() {
                warn!(error = %e, "[PDF] Some temp files could not be deleted");
            }
            let bytes = rendered?;
            info!(bytes = bytes.len(), pages = document.pages.len(), "[PDF] Campaign report rendered");
            Ok::<_, PlannerError>(bytes)
        }
        .instrument(span)
        .await
    }

    /// Builds the PDF, uploads it next to the campaign's posts and stores its link on the campaign.
    /// Returns `None` when the upload fails.
    pub async fn publish(
        &self,
        agency_id: AgencyId,
        campaign_id: CampaignId,
    ) -> Result<Option<PublishedReport>, PlannerError> {
        let bytes = self.build(agency_id, campaign_id).await?;
        let CampaignScope { client, mut campaign } =
            campaign_in_agency(self.planner.store, agency_id, campaign_id).await?;
        let path = self.planner.paths.campaign_pdf(
            &client.trade_name,
            campaign.year,
            campaign.month,
            &campaign.title,
        );
        let Some(link) = self.planner.sync.upload(bytes, &path).await else {
            warn!(campaign_id, path = %path, "[PDF] Report not published");
            return Ok(None);
        };
        campaign.pdf_link = Some(link.clone());
        campaign.pdf_path = Some(path.clone());
        self.planner.store.save_campaign(&campaign).await?;
        info!(campaign_id, path = %path, "[PDF] Report published");
        Ok(Some(PublishedReport { path, link }))
    }

    async fn assemble(
        &self,
        scope: &CampaignScope,
        agency: &Agency,
        registry: &TempRegistry,
    ) -> Result<ReportDocument, PlannerError> {
        let store = self.planner.store;
        let mut posts: Vec<Post> = store
            .posts_for_campaign(scope.campaign.id)
            .await?
            .into_iter()
            .filter(|p| !p.trashed)
            .collect();
        posts.sort_by(|a, b| a.publish_at.cmp(&b.publish_at).then(a.id.cmp(&b.id)));

        let mut with_files = Vec::with_capacity(posts.len());
        for post in posts {
            let files = store.files_for_post(post.id).await?;
            with_files.push((post, files));
        }

        let slots = join_all(
            with_files
                .into_iter()
                .map(|(post, files)| self.resolve_slot(post, files, registry)),
        )
        .await;
        let resolved = slots.iter().filter(|s| s.image.is_some()).count();
        info!(posts = slots.len(), resolved, "[PDF] Resolved post images");

        let client_logo = self
            .logo(scope.client.logo_link.as_deref(), scope.client.logo_path.as_deref(), registry)
            .await;
        let agency_logo = self
            .logo(agency.logo_link.as_deref(), agency.logo_path.as_deref(), registry)
            .await;

        Ok(ReportDocument {
            campaign_title: scope.campaign.title.clone(),
            period: format!("{:02}/{}", scope.campaign.month, scope.campaign.year),
            client_name: scope.client.trade_name.clone(),
            client_handle: scope.client.display_handle(),
            agency_handle: agency.display_handle(),
            client_logo,
            agency_logo,
            pages: paginate(&slots, &scope.campaign.title),
        })
    }

    async fn resolve_slot(
        &self,
        post: Post,
        files: Vec<AttachedFile>,
        registry: &TempRegistry,
    ) -> GridSlot {
        let Some(file) = representative_file(&files) else {
            return GridSlot {
                post,
                image: None,
                is_video: false,
            };
        };
        let sync = &self.planner.sync;
        let bound = self.bounds.grid_bound;
        let is_video = is_video_path(&file.dropbox_path);

        let source = if is_video {
            sync.thumbnail(&file.dropbox_path).await.map(ImageSource::Bytes)
        } else {
            sync.temporary_link(&file.dropbox_path)
                .await
                .map(ImageSource::Remote)
        };
        let image = match source {
            Some(source) => self.normalizer.normalize(&source, bound, registry).await,
            None => None,
        };
        GridSlot {
            post,
            image,
            is_video,
        }
    }

    /// Remote link first, then the local media copy.
    async fn logo(
        &self,
        link: Option<&str>,
        local: Option<&str>,
        registry: &TempRegistry,
    ) -> Option<PathBuf> {
        let bound = self.bounds.logo_bound;
        for reference in [link, local].into_iter().flatten() {
            let source = ImageSource::from_reference(reference);
            if let Some(path) = self.normalizer.normalize(&source, bound, registry).await {
                return Some(path);
            }
        }
        None
    }
}
