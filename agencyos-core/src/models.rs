//! Plain data records for agencies, clients, campaigns ("cronogramas"), posts and their files.
//!
//! These are the local, authoritative records. Remote folder locations are derived from them
//! (see [`crate::paths`]); the only remote state cached here is the `dropbox_path` hint on
//! [`Post`] and the per-file `dropbox_path` on [`AttachedFile`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type UserId = u64;
pub type AgencyId = u64;
pub type ClientId = u64;
pub type CampaignId = u64;
pub type PostId = u64;
pub type FileId = u64;

/// Handles stored for one social network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialProfile {
    #[serde(default)]
    pub perfil: Option<String>,
    #[serde(default)]
    pub usuario: Option<String>,
}

/// Social profiles keyed by network name (`instagram`, `tiktok`, ...).
pub type SocialProfiles = BTreeMap<String, SocialProfile>;

/// Instagram handle for display, `@`-prefixed. `perfil` wins over `usuario`.
pub fn instagram_handle(profiles: &SocialProfiles) -> Option<String> {
    let profile = profiles.get("instagram")?;
    let value = profile
        .perfil
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| profile.usuario.as_deref().filter(|v| !v.trim().is_empty()))?
        .trim();
    if value.starts_with('@') {
        Some(value.to_string())
    } else {
        Some(format!("@{value}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    pub id: AgencyId,
    pub owner_user_id: UserId,
    pub trade_name: String,
    #[serde(default)]
    pub social: SocialProfiles,
    /// Raw-view link of the logo in the remote store.
    #[serde(default)]
    pub logo_link: Option<String>,
    /// Local media reference of the logo (e.g. `/media/agencias/logos/x.png`).
    #[serde(default)]
    pub logo_path: Option<String>,
}

impl Agency {
    pub fn display_handle(&self) -> String {
        instagram_handle(&self.social).unwrap_or_else(|| self.trade_name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub agency_id: AgencyId,
    pub trade_name: String,
    #[serde(default)]
    pub social: SocialProfiles,
    #[serde(default)]
    pub logo_link: Option<String>,
    #[serde(default)]
    pub logo_path: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Client {
    pub fn display_handle(&self) -> String {
        instagram_handle(&self.social).unwrap_or_else(|| self.trade_name.clone())
    }
}

fn default_true() -> bool {
    true
}

/// Month-scoped content plan for one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub client_id: ClientId,
    pub title: String,
    pub month: u32,
    pub year: i32,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default)]
    pub trashed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pdf_link: Option<String>,
    #[serde(default)]
    pub pdf_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Reels,
    Feed,
    Stories,
    Tiktok,
    Youtube,
}

impl Network {
    pub fn label(&self) -> &'static str {
        match self {
            Network::Reels => "Instagram Reels",
            Network::Feed => "Instagram Feed",
            Network::Stories => "Instagram Stories",
            Network::Tiktok => "TikTok",
            Network::Youtube => "YouTube Shorts",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostFormat {
    Static,
    Carousel,
    Video,
    Story,
}

impl PostFormat {
    pub fn label(&self) -> &'static str {
        match self {
            PostFormat::Static => "Estático",
            PostFormat::Carousel => "Carrossel",
            PostFormat::Video => "Vídeo",
            PostFormat::Story => "Story",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub campaign_id: CampaignId,
    pub title: String,
    pub publish_at: DateTime<Utc>,
    pub network: Network,
    pub format: PostFormat,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub briefing: String,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default)]
    pub trashed_at: Option<DateTime<Utc>>,
    /// Cached remote folder of this post. Rewritten on every active/trash move.
    #[serde(default)]
    pub dropbox_path: Option<String>,
    /// Set when the local trash state changed but the mirrored remote move failed.
    #[serde(default)]
    pub sync_pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedFile {
    pub id: FileId,
    pub post_id: PostId,
    pub dropbox_path: String,
    #[serde(default)]
    pub order: u32,
}

impl AttachedFile {
    /// Last path segment of the remote path.
    pub fn basename(&self) -> &str {
        self.dropbox_path
            .rsplit('/')
            .next()
            .unwrap_or(self.dropbox_path.as_str())
    }
}

/// Lowest-order file of a post (ties broken by id).
pub fn representative_file(files: &[AttachedFile]) -> Option<&AttachedFile> {
    files.iter().min_by_key(|f| (f.order, f.id))
}

/// Credentials for one agency's connection to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSession {
    pub agency_id: AgencyId,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StorageSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Who is acting. Resolved to an agency by [`crate::agency::resolve_agency_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: UserId,
    pub linked_client_id: Option<ClientId>,
}
