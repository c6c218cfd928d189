///
/// This module implements the CLI interface for agencyos: command parsing, agency resolution,
/// wiring of the Dropbox client and the local snapshot store, and user-visible output.
///
/// All business logic (paths, trash mirroring, reports) lives in the [`agencyos-core`] crate.
/// This module is strictly CLI glue.
///
/// ## How To Use
/// - Command line: `agencyos --config agencyos.yaml --user 10 <command> ...`, see `--help`.
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// Every command first resolves the acting user's agency; objects of other agencies are refused.
/// Commands that change local records save the snapshot at `data_file` before returning.
///
/// [`agencyos-core`]: ../../agencyos-core/
use crate::dropbox::DropboxClient;
use crate::load_config::{load_config, AppConfig};
use agencyos_core::agency::{
    campaign_in_agency, connect_storage, disconnect_storage, resolve_agency_for,
};
use agencyos_core::contract::PlanStore;
use agencyos_core::memory_store::MemoryStore;
use agencyos_core::models::{Agency, UserContext};
use agencyos_core::normalize::ImageNormalizer;
use agencyos_core::paths::PathBuilder;
use agencyos_core::planner::Planner;
use agencyos_core::render::PrintPdfRenderer;
use agencyos_core::report::CampaignReport;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

pub const TOKEN_ENV: &str = "DROPBOX_ACCESS_TOKEN";

/// CLI for agencyos: content calendars mirrored to Dropbox, with PDF grid reports.
#[derive(Parser)]
#[clap(
    name = "agencyos",
    version,
    about = "Mirror content-calendar posts to Dropbox, manage the trash and render monthly PDF grids"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[clap(long)]
    pub config: PathBuf,

    /// Id of the acting user
    #[clap(long)]
    pub user: u64,

    /// Client linked to the acting user, for users who do not own an agency
    #[clap(long)]
    pub linked_client: Option<u64>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render the PDF grid report of a campaign to a local file
    Pdf {
        #[clap(long)]
        campaign: u64,
        #[clap(long)]
        output: PathBuf,
    },
    /// Render the PDF grid report and publish it next to the campaign's posts
    PublishPdf {
        #[clap(long)]
        campaign: u64,
    },
    /// List the campaign's posts, newest first, with temporary links
    Preview {
        #[clap(long)]
        campaign: u64,
    },
    /// Upload a file into a post's folder
    Attach {
        #[clap(long)]
        post: u64,
        file: PathBuf,
    },
    /// Forget an attached file (the remote copy is kept)
    Detach {
        #[clap(long)]
        file: u64,
    },
    /// Upload the agency logo
    AgencyLogo { file: PathBuf },
    /// Upload a client logo
    ClientLogo {
        #[clap(long)]
        client: u64,
        file: PathBuf,
    },
    /// Move a post to the trash
    TrashPost {
        #[clap(long)]
        post: u64,
    },
    /// Restore a post from the trash
    RestorePost {
        #[clap(long)]
        post: u64,
    },
    /// Move a campaign and all its posts to the trash
    TrashCampaign {
        #[clap(long)]
        campaign: u64,
    },
    /// Restore a campaign and all its posts
    RestoreCampaign {
        #[clap(long)]
        campaign: u64,
    },
    /// List the trash
    Trash,
    /// Permanently delete trashed records (local only)
    EmptyTrash,
    /// Retry remote moves of posts marked for resync
    Resync,
    /// Store the agency's Dropbox credentials
    Connect {
        #[clap(long)]
        token: String,
        #[clap(long)]
        refresh_token: Option<String>,
        /// Seconds until the access token expires
        #[clap(long)]
        expires_in: Option<i64>,
    },
    /// Remove the agency's Dropbox credentials
    Disconnect,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Pdf { .. } => "pdf",
            Commands::PublishPdf { .. } => "publish-pdf",
            Commands::Preview { .. } => "preview",
            Commands::Attach { .. } => "attach",
            Commands::Detach { .. } => "detach",
            Commands::AgencyLogo { .. } => "agency-logo",
            Commands::ClientLogo { .. } => "client-logo",
            Commands::TrashPost { .. } => "trash-post",
            Commands::RestorePost { .. } => "restore-post",
            Commands::TrashCampaign { .. } => "trash-campaign",
            Commands::RestoreCampaign { .. } => "restore-campaign",
            Commands::Trash => "trash",
            Commands::EmptyTrash => "empty-trash",
            Commands::Resync => "resync",
            Commands::Connect { .. } => "connect",
            Commands::Disconnect => "disconnect",
        }
    }

    /// Commands that only read or write local records.
    fn is_local(&self) -> bool {
        matches!(
            self,
            Commands::Detach { .. }
                | Commands::Trash
                | Commands::EmptyTrash
                | Commands::Connect { .. }
                | Commands::Disconnect
        )
    }
}

/// Access token: the environment wins over the stored session.
async fn resolve_token(store: &dyn PlanStore, agency: &Agency) -> Result<Option<String>> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            tracing::debug!("Using access token from environment");
            return Ok(Some(token));
        }
    }
    let Some(session) = store.storage_session(agency.id).await? else {
        return Ok(None);
    };
    if session.is_expired(Utc::now()) {
        tracing::warn!(agency_id = agency.id, expires_at = ?session.expires_at, "Stored access token has expired");
    }
    Ok(Some(session.access_token))
}

fn read_file(path: &Path) -> Result<(String, Vec<u8>)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Not a file path: {:?}", path))?
        .to_string();
    let content = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    Ok((name, content))
}

/// Absolute expiry for a token valid `secs` seconds from now.
fn expiry_after(secs: i64) -> Result<DateTime<Utc>> {
    TimeDelta::try_seconds(secs)
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .ok_or_else(|| anyhow!("--expires-in {} is out of range", secs))
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");
    let command = cli.command.name();

    let config = load_config(&cli.config)?;
    let store = MemoryStore::load(&config.data_file)
        .with_context(|| format!("Failed to load data file {:?}", config.data_file))?;

    let user = UserContext {
        user_id: cli.user,
        linked_client_id: cli.linked_client,
    };
    let agency = resolve_agency_for(&store, &user)
        .await?
        .ok_or_else(|| anyhow!("User {} has no agency", cli.user))?;
    tracing::info!(command, agency_id = agency.id, user_id = cli.user, "Resolved agency");

    let token = match resolve_token(&store, &agency).await? {
        Some(token) => token,
        None if cli.command.is_local() => String::new(),
        None => {
            return Err(anyhow!(
                "Dropbox is not connected for agency {}; run `connect` or set {}",
                agency.id,
                TOKEN_ENV
            ))
        }
    };
    let remote = DropboxClient::new(&config.dropbox, token)?;
    let paths = PathBuilder::new(
        config.planner.storage.root.clone(),
        config.planner.storage.segment_policy,
    );
    let planner = Planner::new(&store, &remote, &paths);

    let result = execute(cli.command, &config, &planner, &agency).await;
    match &result {
        Ok(()) => {
            store
                .save(&config.data_file)
                .with_context(|| format!("Failed to save data file {:?}", config.data_file))?;
            tracing::info!(command, "Command complete");
        }
        Err(e) => tracing::error!(command, error = %e, "Command failed"),
    }
    result
}

async fn execute(
    command: Commands,
    config: &AppConfig,
    planner: &Planner<'_>,
    agency: &Agency,
) -> Result<()> {
    let agency_id = agency.id;
    match command {
        Commands::Pdf { campaign, output } => {
            let normalizer = ImageNormalizer::new(config.planner.media.clone(), &config.planner.report)?;
            let renderer = PrintPdfRenderer;
            let report = CampaignReport::new(
                planner,
                &normalizer,
                &renderer,
                config.planner.report.clone(),
            );
            let bytes = report.build(agency_id, campaign).await?;
            std::fs::write(&output, &bytes)
                .with_context(|| format!("Failed to write {:?}", output))?;
            println!("Wrote {} bytes to {}", bytes.len(), output.display());
        }
        Commands::PublishPdf { campaign } => {
            let normalizer = ImageNormalizer::new(config.planner.media.clone(), &config.planner.report)?;
            let renderer = PrintPdfRenderer;
            let report = CampaignReport::new(
                planner,
                &normalizer,
                &renderer,
                config.planner.report.clone(),
            );
            match report.publish(agency_id, campaign).await? {
                Some(published) => println!("Published {} -> {}", published.path, published.link),
                None => return Err(anyhow!("Upload of the campaign PDF failed")),
            }
        }
        Commands::Preview { campaign } => {
            campaign_in_agency(planner.store(), agency_id, campaign).await?;
            let previews = planner
                .sync()
                .campaign_previews(planner.store(), campaign)
                .await?;
            for p in previews {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    p.post_id,
                    p.publish_at.format("%Y-%m-%d %H:%M"),
                    if p.is_video { "video" } else { "image" },
                    p.title,
                    p.url.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Attach { post, file } => {
            let (name, content) = read_file(&file)?;
            match planner.attach_post_file(agency_id, post, &name, content).await? {
                Some(f) => println!("Attached file {} at {}", f.id, f.dropbox_path),
                None => return Err(anyhow!("Upload of {:?} failed", file)),
            }
        }
        Commands::Detach { file } => {
            let removed = planner.remove_post_file(agency_id, file).await?;
            println!("Removed file {} ({})", removed.id, removed.dropbox_path);
        }
        Commands::AgencyLogo { file } => {
            let (name, content) = read_file(&file)?;
            match planner.upload_agency_logo(agency_id, &name, content).await? {
                Some(link) => println!("Agency logo: {link}"),
                None => return Err(anyhow!("Upload of {:?} failed", file)),
            }
        }
        Commands::ClientLogo { client, file } => {
            let (name, content) = read_file(&file)?;
            match planner.upload_client_logo(agency_id, client, &name, content).await? {
                Some(link) => println!("Client logo: {link}"),
                None => return Err(anyhow!("Upload of {:?} failed", file)),
            }
        }
        Commands::TrashPost { post } => {
            let outcome = planner.trash_post(agency_id, post).await?;
            println!("Post {post} trashed (remote: {outcome:?})");
        }
        Commands::RestorePost { post } => {
            let outcome = planner.restore_post(agency_id, post).await?;
            println!("Post {post} restored (remote: {outcome:?})");
        }
        Commands::TrashCampaign { campaign } => {
            let report = planner.trash_campaign(agency_id, campaign).await?;
            println!("Campaign {campaign} trashed: {report:?}");
        }
        Commands::RestoreCampaign { campaign } => {
            let report = planner.restore_campaign(agency_id, campaign).await?;
            println!("Campaign {campaign} restored: {report:?}");
        }
        Commands::Trash => {
            let listing = planner.trash_listing(agency_id).await?;
            println!(
                "{} posts, {} campaigns in trash",
                listing.posts.len(),
                listing.campaigns.len()
            );
            for c in &listing.campaigns {
                println!("campaign\t{}\t{}", c.id, c.title);
            }
            for p in &listing.posts {
                let pending = if p.sync_pending { "\tsync pending" } else { "" };
                println!("post\t{}\t{}{}", p.id, p.title, pending);
            }
        }
        Commands::EmptyTrash => {
            let (posts, campaigns) = planner.empty_trash(agency_id).await?;
            println!("Deleted {posts} posts and {campaigns} campaigns");
        }
        Commands::Resync => {
            let (resolved, pending) = planner.resync_pending(agency_id).await?;
            println!("Resynced {resolved} posts, {pending} still pending");
        }
        Commands::Connect {
            token,
            refresh_token,
            expires_in,
        } => {
            let expires_at = expires_in.map(expiry_after).transpose()?;
            connect_storage(planner.store(), agency_id, token, refresh_token, expires_at).await?;
            println!("Dropbox connected for agency {agency_id}");
        }
        Commands::Disconnect => {
            disconnect_storage(planner.store(), agency_id).await?;
            println!("Dropbox disconnected for agency {agency_id}");
        }
    }
    Ok(())
}
