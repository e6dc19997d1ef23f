// utils/image_utils.rs
use std::path::PathBuf;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use uuid::Uuid;

/// Out-of-band storage for image message bytes.
#[async_trait]
pub trait ImageStore: Send + Sync + std::fmt::Debug {
    /// Stores the image and returns the path clients fetch it from.
    async fn store(&self, chat_id: Uuid, bytes: Vec<u8>, extension: &str) -> Result<String, String>;
}

/// Writes images under a local directory that the router serves at `/uploads`.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(&self, chat_id: Uuid, bytes: Vec<u8>, extension: &str) -> Result<String, String> {
        let folder = self.root.join(chat_id.to_string());
        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(|e| format!("Failed to create upload folder: {}", e))?;

        let filename = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(folder.join(&filename), bytes)
            .await
            .map_err(|e| format!("Failed to write image: {}", e))?;

        Ok(format!("/uploads/{}/{}", chat_id, filename))
    }
}

/// A decoded image payload.
#[derive(Debug, PartialEq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// Decodes a base64 image, with or without a `data:image/...;base64,` prefix.
pub fn decode_image(data: &str) -> Result<DecodedImage, String> {
    let (mime, payload) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| "Malformed data URL".to_string())?;
            let mime = header.split(';').next().unwrap_or_default();
            (Some(mime), payload)
        }
        None => (None, data),
    };

    let extension = match mime {
        None | Some("image/jpeg") | Some("image/jpg") | Some("image") => "jpg",
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        Some(other) => return Err(format!("Unsupported image type: {}", other)),
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("Failed to decode base64: {}", e))?;

    if bytes.is_empty() {
        return Err("Image is empty".to_string());
    }

    Ok(DecodedImage { bytes, extension })
}

pub fn validate_image_size(bytes: &[u8], max_size_mb: usize) -> Result<(), String> {
    let max_size_bytes = max_size_mb * 1024 * 1024;
    if bytes.len() > max_size_bytes {
        return Err(format!("Image exceeds the {} MB limit", max_size_mb));
    }
    Ok(())
}
