//! Image normalizer: any image reference in, a bounded JPEG temp file out.
//!
//! Pipeline per image: fetch, decode, apply EXIF orientation, convert to RGB, shrink to fit a
//! square bound (never enlarge), encode JPEG. The result is written to a unique temp file owned by
//! a [`TempRegistry`] that deletes it when the registry goes away.
//!
//! Every failure becomes `None` at [`ImageNormalizer::normalize`]; the detailed
//! [`NormalizeError`] is logged.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempPath;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{MediaConfig, ReportConfig};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("fetch returned status {0}")]
    Status(u16),

    #[error("local media file missing: {0}")]
    Missing(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("empty image data")]
    Empty,
}

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Absolute http(s) URL.
    Remote(String),
    /// Media reference such as `/media/clientes/logos/x.png`.
    Local(String),
    /// Bytes already in memory, e.g. a provider thumbnail.
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Classifies a stored reference: `http(s)://` is remote, anything else is local media.
    pub fn from_reference(reference: &str) -> Self {
        let trimmed = reference.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ImageSource::Remote(trimmed.to_string())
        } else {
            ImageSource::Local(trimmed.to_string())
        }
    }
}

/// Resolves a media reference: `media/...` against `base_dir`, anything else against `media_root`.
pub fn resolve_media_path(media: &MediaConfig, reference: &str) -> PathBuf {
    let relative = reference.trim_start_matches('/');
    if relative.starts_with("media/") {
        media.base_dir.join(relative)
    } else {
        media.media_root.join(relative)
    }
}

/// Temp files created while serving one request. All of them are deleted on drop.
#[derive(Debug)]
pub struct TempRegistry {
    dir: Option<PathBuf>,
    files: Mutex<Vec<TempPath>>,
}

impl Default for TempRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TempRegistry {
    /// Files go to the system temp dir.
    pub fn new() -> Self {
        Self {
            dir: None,
            files: Mutex::new(Vec::new()),
        }
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            files: Mutex::new(Vec::new()),
        }
    }

    /// Writes `content` to a new unique `.jpg` file and keeps it alive until the registry drops.
    pub fn persist(&self, content: &[u8]) -> Result<PathBuf, std::io::Error> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("agencyos-").suffix(".jpg");
        let mut file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        std::io::Write::write_all(&mut file, content)?;
        let temp_path = file.into_temp_path();
        let path = temp_path.to_path_buf();
        self.register(temp_path);
        Ok(path)
    }

    pub fn register(&self, path: TempPath) {
        match self.files.lock() {
            Ok(mut files) => files.push(path),
            // A poisoned registry still owns the path; dropping it here deletes the file.
            Err(_) => warn!(path = %path.display(), "Temp registry poisoned, deleting file now"),
        }
    }

    pub fn len(&self) -> usize {
        self.files.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deletes every registered file now, reporting the first failure.
    pub fn close(self) -> Result<(), std::io::Error> {
        let files = match self.files.into_inner() {
            Ok(files) => files,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut first_error = None;
        for path in files {
            if let Err(e) = path.close() {
                warn!(error = %e, "Failed to delete temp file");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Decodes, orients, shrinks to fit `bound` and encodes as JPEG.
pub fn normalize_bytes(bytes: &[u8], bound: u32, quality: u8) -> Result<Vec<u8>, NormalizeError> {
    if bytes.is_empty() {
        return Err(NormalizeError::Empty);
    }
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);

    let mut rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    if rgb.width() > bound || rgb.height() > bound {
        rgb = rgb.resize(bound, bound, FilterType::Lanczos3);
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb.to_rgb8())?;
    Ok(out)
}

pub struct ImageNormalizer {
    http: reqwest::Client,
    media: MediaConfig,
    quality: u8,
}

impl ImageNormalizer {
    pub fn new(media: MediaConfig, report: &ReportConfig) -> Result<Self, NormalizeError> {
        Self::with_timeout(media, report.fetch_timeout(), report.jpeg_quality)
    }

    pub fn with_timeout(
        media: MediaConfig,
        timeout: Duration,
        quality: u8,
    ) -> Result<Self, NormalizeError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            media,
            quality,
        })
    }

    /// Normalized temp file for `source`, or `None` if any step fails.
    pub async fn normalize(
        &self,
        source: &ImageSource,
        bound: u32,
        registry: &TempRegistry,
    ) -> Option<PathBuf> {
        match self.try_normalize(source, bound, registry).await {
            Ok(path) => {
                debug!(path = %path.display(), bound, "Normalized image");
                Some(path)
            }
            Err(e) => {
                warn!(source = %describe(source), error = %e, "Image normalization failed");
                None
            }
        }
    }

    async fn try_normalize(
        &self,
        source: &ImageSource,
        bound: u32,
        registry: &TempRegistry,
    ) -> Result<PathBuf, NormalizeError> {
        let bytes = self.fetch(source).await?;
        let jpeg = normalize_bytes(&bytes, bound, self.quality)?;
        Ok(registry.persist(&jpeg)?)
    }

    async fn fetch(&self, source: &ImageSource) -> Result<Vec<u8>, NormalizeError> {
        match source {
            ImageSource::Bytes(bytes) => Ok(bytes.clone()),
            ImageSource::Remote(url) => {
                let resp = self.http.get(url).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(NormalizeError::Status(status.as_u16()));
                }
                Ok(resp.bytes().await?.to_vec())
            }
            ImageSource::Local(reference) => {
                let path = resolve_media_path(&self.media, reference);
                read_local(&path).await
            }
        }
    }
}

async fn read_local(path: &Path) -> Result<Vec<u8>, NormalizeError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(NormalizeError::Missing(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn describe(source: &ImageSource) -> String {
    match source {
        ImageSource::Remote(url) => url.clone(),
        ImageSource::Local(reference) => reference.clone(),
        ImageSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
    }
}
