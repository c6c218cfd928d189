//! Canonical remote folder layout.
//!
//! Every remote location the system writes to is built here, so the same logical post always
//! resolves to the same folder:
//!
//! ```text
//! {ROOT}/CLIENTES/{client}/{year}/{MM - MONTH}/{campaign}/{post}/{file}
//! {ROOT}/LIXEIRA/CLIENTES/{client}/{year}/{MM - MONTH}/{campaign}/{post}/{file}
//! ```
//!
//! Name segments (client, campaign, post, agency) go through one [`SegmentPolicy`] chosen per
//! deployment; month folders and file basenames are used as-is.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

const CLIENTS_DIR: &str = "CLIENTES";
const TRASH_DIR: &str = "LIXEIRA";
const SYSTEM_DIR: &str = "SISTEMA";

const MONTH_FOLDERS: [&str; 12] = [
    "01 - JANEIRO",
    "02 - FEVEREIRO",
    "03 - MARCO",
    "04 - ABRIL",
    "05 - MAIO",
    "06 - JUNHO",
    "07 - JULHO",
    "08 - AGOSTO",
    "09 - SETEMBRO",
    "10 - OUTUBRO",
    "11 - NOVEMBRO",
    "12 - DEZEMBRO",
];

const EMPTY_SLUG: &str = "sem-titulo";

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

/// How display names become folder names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentPolicy {
    /// Lowercase, accent-stripped, hyphenated.
    #[default]
    Slug,
    /// Display name as typed, trimmed, with `/` replaced so it stays one segment.
    Raw,
}

/// Month folder name, e.g. `"01 - JANEIRO"`. Months outside 1..=12 fall back to `"MM"`.
pub fn month_folder(month: u32) -> String {
    match month {
        1..=12 => MONTH_FOLDERS[(month - 1) as usize].to_string(),
        other => format!("{other:02}"),
    }
}

/// Django-style slug: NFKD, ASCII only, `[^\w\s-]` removed, lowercased, separators collapsed.
pub fn slugify(value: &str) -> String {
    let ascii: String = value.nfkd().filter(|c| c.is_ascii()).collect();
    let cleaned = NON_WORD.replace_all(&ascii, "").to_lowercase();
    let hyphenated = SEPARATOR_RUNS.replace_all(cleaned.trim(), "-");
    hyphenated.trim_matches(|c: char| c == '-' || c == '_').to_string()
}

/// Everything a post folder depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostLocation<'a> {
    pub client: &'a str,
    pub year: i32,
    pub month: u32,
    pub campaign: &'a str,
    pub post: &'a str,
}

/// Builds remote paths under one root with one segment policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathBuilder {
    root: String,
    policy: SegmentPolicy,
}

impl PathBuilder {
    pub fn new(root: impl Into<String>, policy: SegmentPolicy) -> Self {
        let root = root.into();
        let trimmed = root.trim().trim_end_matches('/');
        let root = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        Self { root, policy }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn policy(&self) -> SegmentPolicy {
        self.policy
    }

    /// Applies the segment policy to one display name.
    pub fn segment(&self, name: &str) -> String {
        let segment = match self.policy {
            SegmentPolicy::Slug => slugify(name),
            SegmentPolicy::Raw => name.trim().replace('/', "-"),
        };
        if segment.is_empty() {
            EMPTY_SLUG.to_string()
        } else {
            segment
        }
    }

    /// `{ROOT}/CLIENTES` or `{ROOT}/LIXEIRA/CLIENTES`. Pruning never goes above this.
    pub fn clients_root(&self, trashed: bool) -> String {
        if trashed {
            format!("{}/{TRASH_DIR}/{CLIENTS_DIR}", self.root)
        } else {
            format!("{}/{CLIENTS_DIR}", self.root)
        }
    }

    /// Folder of one campaign month inside the active or trash tree.
    pub fn campaign_folder(
        &self,
        client: &str,
        year: i32,
        month: u32,
        campaign: &str,
        trashed: bool,
    ) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.clients_root(trashed),
            self.segment(client),
            year,
            month_folder(month),
            self.segment(campaign)
        )
    }

    /// Canonical folder of a post. Active and trash variants differ only in the trash segment.
    pub fn post_folder(&self, location: &PostLocation<'_>, trashed: bool) -> String {
        format!(
            "{}/{}",
            self.campaign_folder(
                location.client,
                location.year,
                location.month,
                location.campaign,
                trashed
            ),
            self.segment(location.post)
        )
    }

    /// Remote path of the generated PDF of a campaign (always in the active tree).
    pub fn campaign_pdf(&self, client: &str, year: i32, month: u32, campaign: &str) -> String {
        format!(
            "{}/Cronograma_{}.pdf",
            self.campaign_folder(client, year, month, campaign, false),
            self.segment(campaign)
        )
    }

    /// `{ROOT}/SISTEMA/AGENCIA/{agency}/LOGO/logo_{agency}{ext}`.
    pub fn agency_logo(&self, agency: &str, extension: &str) -> String {
        let name = self.segment(agency);
        format!(
            "{}/{SYSTEM_DIR}/AGENCIA/{name}/LOGO/logo_{name}{}",
            self.root,
            normalize_extension(extension)
        )
    }

    /// `{ROOT}/SISTEMA/CLIENTES/{client}/LOGO/logo_{client}{ext}`.
    pub fn client_logo(&self, client: &str, extension: &str) -> String {
        let name = self.segment(client);
        format!(
            "{}/{SYSTEM_DIR}/{CLIENTS_DIR}/{name}/LOGO/logo_{name}{}",
            self.root,
            normalize_extension(extension)
        )
    }
}

/// Joins a folder and the basename of `filename` (any directories in it are dropped).
pub fn file_path(folder: &str, filename: &str) -> String {
    let basename = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .filter(|b| !b.is_empty())
        .unwrap_or(filename);
    format!("{}/{}", folder.trim_end_matches('/'), basename)
}

/// Parent folder of a remote path, `None` at the root.
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", _)) | None => None,
        Some((parent, _)) => Some(parent),
    }
}

fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location<'a>() -> PostLocation<'a> {
        PostLocation {
            client: "Padaria São João",
            year: 2025,
            month: 3,
            campaign: "Março Café & Pão",
            post: "Lançamento do Croissant",
        }
    }

    #[test]
    fn month_folder_table_is_zero_padded() {
        assert_eq!(month_folder(1), "01 - JANEIRO");
        assert_eq!(month_folder(3), "03 - MARCO");
        assert_eq!(month_folder(12), "12 - DEZEMBRO");
        assert_eq!(month_folder(13), "13");
        assert_eq!(month_folder(0), "00");
    }

    #[test]
    fn slugify_strips_accents_and_symbols() {
        assert_eq!(slugify("Padaria São João"), "padaria-sao-joao");
        assert_eq!(slugify("  Março Café & Pão  "), "marco-cafe-pao");
        assert_eq!(slugify("--já__"), "ja");
        assert_eq!(slugify("🚀"), "");
    }

    #[test]
    fn slug_post_folder_layout() {
        let paths = PathBuilder::new("/AgencyOS", SegmentPolicy::Slug);
        assert_eq!(
            paths.post_folder(&location(), false),
            "/AgencyOS/CLIENTES/padaria-sao-joao/2025/03 - MARCO/marco-cafe-pao/lancamento-do-croissant"
        );
        assert_eq!(
            paths.post_folder(&location(), true),
            "/AgencyOS/LIXEIRA/CLIENTES/padaria-sao-joao/2025/03 - MARCO/marco-cafe-pao/lancamento-do-croissant"
        );
    }

    #[test]
    fn trash_and_active_differ_only_in_trash_segment() {
        for policy in [SegmentPolicy::Slug, SegmentPolicy::Raw] {
            let paths = PathBuilder::new("/AgencyOS/", policy);
            let active = paths.post_folder(&location(), false);
            let trashed = paths.post_folder(&location(), true);
            assert_eq!(trashed.replacen("/LIXEIRA", "", 1), active);
            assert_eq!(paths.post_folder(&location(), false), active);
        }
    }

    #[test]
    fn raw_policy_keeps_names_but_not_slashes() {
        let paths = PathBuilder::new("AgencyOS", SegmentPolicy::Raw);
        let loc = PostLocation {
            post: "Promo 1/2 preço",
            ..location()
        };
        assert_eq!(
            paths.post_folder(&loc, false),
            "/AgencyOS/CLIENTES/Padaria São João/2025/03 - MARCO/Março Café & Pão/Promo 1-2 preço"
        );
    }

    #[test]
    fn empty_segments_never_collapse_the_tree() {
        let paths = PathBuilder::new("/AgencyOS", SegmentPolicy::Slug);
        let loc = PostLocation {
            post: "!!!",
            ..location()
        };
        assert!(paths.post_folder(&loc, false).ends_with("/marco-cafe-pao/sem-titulo"));
    }

    #[test]
    fn supplementary_paths() {
        let paths = PathBuilder::new("/AgencyOS", SegmentPolicy::Slug);
        assert_eq!(
            paths.campaign_pdf("Padaria São João", 2025, 3, "Março Café & Pão"),
            "/AgencyOS/CLIENTES/padaria-sao-joao/2025/03 - MARCO/marco-cafe-pao/Cronograma_marco-cafe-pao.pdf"
        );
        assert_eq!(
            paths.agency_logo("Agência Luz", "PNG"),
            "/AgencyOS/SISTEMA/AGENCIA/agencia-luz/LOGO/logo_agencia-luz.png"
        );
        assert_eq!(
            paths.client_logo("Padaria São João", ".jpg"),
            "/AgencyOS/SISTEMA/CLIENTES/padaria-sao-joao/LOGO/logo_padaria-sao-joao.jpg"
        );
        assert_eq!(paths.clients_root(true), "/AgencyOS/LIXEIRA/CLIENTES");
    }

    #[test]
    fn file_path_and_parent() {
        assert_eq!(file_path("/a/b/", "dir/foto.jpg"), "/a/b/foto.jpg");
        assert_eq!(file_path("/a/b", "C:\\fotos\\x.png"), "/a/b/x.png");
        assert_eq!(parent("/a/b/c"), Some("/a/b"));
        assert_eq!(parent("/a"), None);
    }
}
