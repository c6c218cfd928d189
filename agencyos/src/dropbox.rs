#![doc = "Dropbox HTTP API v2 client implementing the core RemoteStore contract."]
//
//! # Dropbox client (CLI <-> Core)
//!
//! Wires the [`RemoteStore`] trait from `agencyos-core` to the Dropbox HTTP API.
//!
//! - RPC endpoints (`api_base`) take a JSON body and return JSON.
//! - Content endpoints (`content_base`) carry their arguments in the `Dropbox-API-Arg` header,
//!   which must be ASCII: every non-ASCII character is escaped as `\uXXXX`.
//! - Uploads are verified against the Dropbox content hash of the bytes sent; a mismatch is
//!   logged, not failed.
//!
//! ## Error mapping
//! - 401: [`RemoteError::Auth`]
//! - 409 with `not_found` in the summary: [`RemoteError::NotFound`]
//! - 409 with `shared_link_already_exists`: [`RemoteError::SharedLinkExists`]
//! - other 409: [`RemoteError::Conflict`]; any other non-2xx: [`RemoteError::Api`]

use agencyos_core::contract::{RemoteEntry, RemoteError, RemoteStore, ThumbnailSize};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::load_config::DropboxSettings;

const API_ARG_HEADER: &str = "Dropbox-API-Arg";
const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Dropbox content hash: SHA-256 over the concatenated SHA-256 digests of 4 MiB blocks.
pub fn content_hash(content: &[u8]) -> String {
    let mut overall = Sha256::new();
    for block in content.chunks(BLOCK_SIZE) {
        overall.update(Sha256::digest(block));
    }
    format!("{:x}", overall.finalize())
}

/// JSON for the `Dropbox-API-Arg` header, with non-ASCII escaped as UTF-16 `\uXXXX` units.
pub fn header_json(value: &Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_summary: String,
}

#[derive(Debug, Deserialize)]
struct FolderEntry {
    #[serde(rename = ".tag")]
    tag: String,
    name: String,
    #[serde(default)]
    path_display: Option<String>,
    #[serde(default)]
    path_lower: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FolderPage {
    entries: Vec<FolderEntry>,
    cursor: String,
    has_more: bool,
}

pub struct DropboxClient {
    http: reqwest::Client,
    api_base: String,
    content_base: String,
    token: String,
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

impl DropboxClient {
    pub fn new(settings: &DropboxSettings, token: impl Into<String>) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(transport)?;
        let client = DropboxClient {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            content_base: settings.content_base.trim_end_matches('/').to_string(),
            token: token.into(),
        };
        tracing::info!(
            api_base = %client.api_base,
            content_base = %client.content_base,
            token_set = !client.token.is_empty(),
            "Initialized DropboxClient"
        );
        Ok(client)
    }

    async fn check(resp: reqwest::Response, subject: &str) -> Result<reqwest::Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %body, subject, "[REMOTE] Error response");
        match status.as_u16() {
            401 => Err(RemoteError::Auth),
            409 => {
                let summary = serde_json::from_str::<ErrorBody>(&body)
                    .map(|b| b.error_summary)
                    .unwrap_or(body);
                if summary.contains("shared_link_already_exists") {
                    Err(RemoteError::SharedLinkExists(subject.to_string()))
                } else if summary.contains("not_found") {
                    Err(RemoteError::NotFound(subject.to_string()))
                } else {
                    Err(RemoteError::Conflict(summary))
                }
            }
            code => Err(RemoteError::Api {
                status: code,
                message: body,
            }),
        }
    }

    async fn rpc(&self, endpoint: &str, body: Value, subject: &str) -> Result<Value, RemoteError> {
        tracing::debug!(endpoint, subject, "[REMOTE] RPC call");
        let resp = self
            .http
            .post(format!("{}/{}", self.api_base, endpoint))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let resp = Self::check(resp, subject).await?;
        resp.json::<Value>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn str_field(value: &Value, field: &str) -> Result<String, RemoteError> {
        value
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Decode(format!("missing field `{field}`")))
    }
}

#[async_trait]
impl RemoteStore for DropboxClient {
    async fn upload(&self, path: &str, content: Vec<u8>) -> Result<(), RemoteError> {
        let expected = content_hash(&content);
        let arg = json!({
            "path": path,
            "mode": "overwrite",
            "autorename": false,
            "mute": false,
        });
        tracing::info!(path, bytes = content.len(), "[REMOTE] Uploading");
        let resp = self
            .http
            .post(format!("{}/files/upload", self.content_base))
            .bearer_auth(&self.token)
            .header(API_ARG_HEADER, header_json(&arg))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content)
            .send()
            .await
            .map_err(transport)?;
        let resp = Self::check(resp, path).await?;
        let meta: Value = resp
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        match meta.get("content_hash").and_then(Value::as_str) {
            Some(remote) if remote == expected => {
                tracing::debug!(path, "[REMOTE] Content hash verified");
            }
            Some(remote) => {
                tracing::warn!(path, remote, local = %expected, "[REMOTE] Content hash mismatch");
            }
            None => tracing::debug!(path, "[REMOTE] Upload response has no content hash"),
        }
        Ok(())
    }

    async fn create_shared_link(&self, path: &str) -> Result<String, RemoteError> {
        let v = self
            .rpc(
                "sharing/create_shared_link_with_settings",
                json!({ "path": path }),
                path,
            )
            .await?;
        Self::str_field(&v, "url")
    }

    async fn list_shared_links(&self, path: &str) -> Result<Vec<String>, RemoteError> {
        let v = self
            .rpc(
                "sharing/list_shared_links",
                json!({ "path": path, "direct_only": true }),
                path,
            )
            .await?;
        let links = v
            .get("links")
            .and_then(Value::as_array)
            .map(|links| {
                links
                    .iter()
                    .filter_map(|l| l.get("url").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(links)
    }

    async fn move_path(&self, from: &str, to: &str) -> Result<(), RemoteError> {
        self.rpc(
            "files/move_v2",
            json!({
                "from_path": from,
                "to_path": to,
                "allow_shared_folder": true,
                "autorename": false,
            }),
            from,
        )
        .await?;
        tracing::info!(from, to, "[REMOTE] Moved");
        Ok(())
    }

    async fn list_folder(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let mut page: FolderPage = serde_json::from_value(
            self.rpc("files/list_folder", json!({ "path": path }), path)
                .await?,
        )
        .map_err(|e| RemoteError::Decode(e.to_string()))?;
        let mut entries = Vec::new();
        loop {
            entries.extend(page.entries.drain(..).map(|e| RemoteEntry {
                path: e
                    .path_display
                    .or(e.path_lower)
                    .unwrap_or_else(|| format!("{}/{}", path, e.name)),
                is_folder: e.tag == "folder",
                name: e.name,
            }));
            if !page.has_more {
                break;
            }
            page = serde_json::from_value(
                self.rpc(
                    "files/list_folder/continue",
                    json!({ "cursor": page.cursor }),
                    path,
                )
                .await?,
            )
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        }
        Ok(entries)
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        self.rpc("files/delete_v2", json!({ "path": path }), path)
            .await?;
        tracing::info!(path, "[REMOTE] Deleted");
        Ok(())
    }

    async fn temporary_link(&self, path: &str) -> Result<String, RemoteError> {
        let v = self
            .rpc("files/get_temporary_link", json!({ "path": path }), path)
            .await?;
        Self::str_field(&v, "link")
    }

    async fn thumbnail(&self, path: &str, size: ThumbnailSize) -> Result<Vec<u8>, RemoteError> {
        let arg = json!({
            "resource": { ".tag": "path", "path": path },
            "format": "png",
            "size": size.as_tag(),
        });
        let resp = self
            .http
            .post(format!("{}/files/get_thumbnail_v2", self.content_base))
            .bearer_auth(&self.token)
            .header(API_ARG_HEADER, header_json(&arg))
            .send()
            .await
            .map_err(transport)?;
        let resp = Self::check(resp, path).await?;
        let bytes = resp.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_json_escapes_non_ascii() {
        let arg = json!({ "path": "/Março/Ação 🚀" });
        assert_eq!(
            header_json(&arg),
            r#"{"path":"/Mar\u00e7o/A\u00e7\u00e3o \ud83d\ude80"}"#
        );
    }

    #[test]
    fn content_hash_of_empty_input() {
        // SHA-256 of zero concatenated block digests is the digest of the empty string.
        assert_eq!(
            content_hash(&[]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn content_hash_hashes_block_digests() {
        let data = b"hello";
        let inner = Sha256::digest(data);
        let expected = format!("{:x}", Sha256::digest(inner));
        assert_eq!(content_hash(data), expected);
    }
}
