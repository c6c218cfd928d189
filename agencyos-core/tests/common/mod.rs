#![allow(dead_code)]

use agencyos_core::contract::{RemoteEntry, RemoteError, RemoteStore, ThumbnailSize};
use agencyos_core::memory_store::{MemoryStore, Snapshot};
use agencyos_core::models::{
    Agency, Campaign, Client, Network, Post, PostFormat, SocialProfile, SocialProfiles,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const AGENCY: u64 = 1;
pub const OWNER: u64 = 10;
pub const CLIENT: u64 = 100;
pub const CAMPAIGN: u64 = 7;

#[derive(Default)]
struct Tree {
    folders: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    links: BTreeMap<String, String>,
}

impl Tree {
    fn exists(&self, path: &str) -> bool {
        self.folders.contains(path) || self.files.contains_key(path)
    }

    fn add_ancestors(&mut self, path: &str) {
        let mut current = path;
        while let Some((parent, _)) = current.rsplit_once('/') {
            if parent.is_empty() {
                break;
            }
            self.folders.insert(parent.to_string());
            current = parent;
        }
    }
}

fn under(path: &str, folder: &str) -> bool {
    path.len() > folder.len() && path.starts_with(folder) && path.as_bytes()[folder.len()] == b'/'
}

/// In-memory remote tree with Dropbox-like semantics. Folders exist implicitly above files.
#[derive(Default)]
pub struct FakeRemote {
    tree: Mutex<Tree>,
    fail_moves: AtomicBool,
    fail_everything: AtomicBool,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_moves(&self, fail: bool) {
        self.fail_moves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_everything(&self, fail: bool) {
        self.fail_everything.store(fail, Ordering::SeqCst);
    }

    pub fn mkdir(&self, path: &str) {
        let mut tree = self.tree.lock().unwrap();
        tree.folders.insert(path.to_string());
        tree.add_ancestors(path);
    }

    pub fn put(&self, path: &str, content: &[u8]) {
        let mut tree = self.tree.lock().unwrap();
        tree.files.insert(path.to_string(), content.to_vec());
        tree.add_ancestors(path);
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.tree.lock().unwrap().files.contains_key(path)
    }

    pub fn has_folder(&self, path: &str) -> bool {
        self.tree.lock().unwrap().folders.contains(path)
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.tree.lock().unwrap().files.keys().cloned().collect()
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.fail_everything.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn upload(&self, path: &str, content: Vec<u8>) -> Result<(), RemoteError> {
        self.check()?;
        self.put(path, &content);
        Ok(())
    }

    async fn create_shared_link(&self, path: &str) -> Result<String, RemoteError> {
        self.check()?;
        let mut tree = self.tree.lock().unwrap();
        if !tree.exists(path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        if tree.links.contains_key(path) {
            return Err(RemoteError::SharedLinkExists(path.to_string()));
        }
        let link = format!("https://www.dropbox.com/s/fake{path}?dl=0");
        tree.links.insert(path.to_string(), link.clone());
        Ok(link)
    }

    async fn list_shared_links(&self, path: &str) -> Result<Vec<String>, RemoteError> {
        self.check()?;
        Ok(self.tree.lock().unwrap().links.get(path).cloned().into_iter().collect())
    }

    async fn move_path(&self, from: &str, to: &str) -> Result<(), RemoteError> {
        self.check()?;
        if self.fail_moves.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("timed out".into()));
        }
        let mut tree = self.tree.lock().unwrap();
        if !tree.exists(from) {
            return Err(RemoteError::NotFound(from.to_string()));
        }
        if tree.exists(to) {
            return Err(RemoteError::Conflict(to.to_string()));
        }
        let rebase = |p: &str| format!("{to}{}", &p[from.len()..]);

        let folders: Vec<String> = tree
            .folders
            .iter()
            .filter(|f| f.as_str() == from || under(f, from))
            .cloned()
            .collect();
        for folder in folders {
            tree.folders.remove(&folder);
            tree.folders.insert(rebase(&folder));
        }
        let files: Vec<String> = tree
            .files
            .keys()
            .filter(|f| f.as_str() == from || under(f, from))
            .cloned()
            .collect();
        for file in files {
            if let Some(content) = tree.files.remove(&file) {
                tree.files.insert(rebase(&file), content);
            }
        }
        tree.add_ancestors(to);
        Ok(())
    }

    async fn list_folder(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        self.check()?;
        let tree = self.tree.lock().unwrap();
        if !tree.folders.contains(path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        let direct = |p: &String| under(p, path) && !p[path.len() + 1..].contains('/');
        let mut entries: Vec<RemoteEntry> = tree
            .folders
            .iter()
            .filter(|p| direct(*p))
            .map(|p| RemoteEntry {
                name: p[path.len() + 1..].to_string(),
                path: p.clone(),
                is_folder: true,
            })
            .collect();
        entries.extend(tree.files.keys().filter(|p| direct(*p)).map(|p| RemoteEntry {
            name: p[path.len() + 1..].to_string(),
            path: p.clone(),
            is_folder: false,
        }));
        Ok(entries)
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        self.check()?;
        let mut tree = self.tree.lock().unwrap();
        if !tree.exists(path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        tree.folders.retain(|f| f != path && !under(f, path));
        tree.files.retain(|f, _| f != path && !under(f, path));
        Ok(())
    }

    async fn temporary_link(&self, path: &str) -> Result<String, RemoteError> {
        self.check()?;
        if !self.has_file(path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        // Nothing listens on the discard port, so fetching fails fast.
        Ok(format!("http://127.0.0.1:9{path}"))
    }

    async fn thumbnail(&self, path: &str, _size: ThumbnailSize) -> Result<Vec<u8>, RemoteError> {
        self.check()?;
        self.tree
            .lock()
            .unwrap()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut cursor = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .unwrap();
    cursor.into_inner()
}

pub fn post(id: u64, title: &str, day: u32) -> Post {
    Post {
        id,
        campaign_id: CAMPAIGN,
        title: title.to_string(),
        publish_at: Utc.with_ymd_and_hms(2025, 3, day, 9, 30, 0).unwrap(),
        network: Network::Feed,
        format: PostFormat::Static,
        caption: format!("Legenda {id}"),
        briefing: String::new(),
        trashed: false,
        trashed_at: None,
        dropbox_path: None,
        sync_pending: false,
    }
}

/// One agency owning one client with one March 2025 campaign holding `posts`.
pub fn seeded_store(posts: Vec<Post>) -> MemoryStore {
    let mut social = SocialProfiles::new();
    social.insert(
        "instagram".into(),
        SocialProfile {
            perfil: Some("padaria.sj".into()),
            usuario: None,
        },
    );
    MemoryStore::new(Snapshot {
        agencies: vec![Agency {
            id: AGENCY,
            owner_user_id: OWNER,
            trade_name: "Agência Luz".into(),
            social: SocialProfiles::new(),
            logo_link: None,
            logo_path: None,
        }],
        clients: vec![Client {
            id: CLIENT,
            agency_id: AGENCY,
            trade_name: "Padaria São João".into(),
            social,
            logo_link: None,
            logo_path: None,
            active: true,
        }],
        campaigns: vec![Campaign {
            id: CAMPAIGN,
            client_id: CLIENT,
            title: "Março Café".into(),
            month: 3,
            year: 2025,
            trashed: false,
            trashed_at: None,
            pdf_link: None,
            pdf_path: None,
        }],
        posts,
        ..Default::default()
    })
}
