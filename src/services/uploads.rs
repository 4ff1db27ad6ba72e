//! Advisory image uploads
//!
//! Multipart bodies are parsed with multer; accepted images are written
//! under `<upload_dir>/advisory/` with a generated name and served back by
//! file name only.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Utc;
use rand::Rng;
use tracing::debug;

use crate::db::schemas::AdvisoryImage;
use crate::types::{FarmError, Result};

const IMAGE_FIELD: &str = "image";
const QUERY_FIELD: &str = "query";
const IMAGE_TYPES: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

/// Largest accepted text field in an advisory form
const MAX_TEXT_FIELD_BYTES: u64 = 64 * 1024;

/// One uploaded file, still in memory
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub original_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

/// Fields of `POST /api/advisory/image`
#[derive(Debug, Default)]
pub struct AdvisoryForm {
    pub image: Option<ImageUpload>,
    pub query: Option<String>,
}

/// Both the extension and the declared type must name an image format
pub fn is_allowed_image(file_name: &str, mime_type: &str) -> bool {
    let ext_ok = extension(file_name).is_some_and(|ext| IMAGE_TYPES.contains(&ext.as_str()));
    let mime_ok = mime_type
        .to_ascii_lowercase()
        .strip_prefix("image/")
        .is_some_and(|sub| IMAGE_TYPES.contains(&sub));
    ext_ok && mime_ok
}

fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Parse an advisory multipart body
pub async fn parse_advisory_form(
    content_type: &str,
    body: Bytes,
    max_image_bytes: usize,
) -> Result<AdvisoryForm> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| FarmError::BadRequest("Expected a multipart/form-data body".into()))?;

    let constraints = multer::Constraints::new().size_limit(
        multer::SizeLimit::new()
            .for_field(IMAGE_FIELD, max_image_bytes as u64)
            .for_field(QUERY_FIELD, MAX_TEXT_FIELD_BYTES),
    );
    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::with_constraints(stream, boundary, constraints);

    let mut form = AdvisoryForm::default();
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some(IMAGE_FIELD) => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let mime_type = field
                    .content_type()
                    .map(|m| m.essence_str().to_string())
                    .unwrap_or_default();

                if !is_allowed_image(&original_name, &mime_type) {
                    return Err(FarmError::BadRequest("Only image files are allowed".into()));
                }

                let data = field.bytes().await?;
                form.image = Some(ImageUpload {
                    original_name,
                    mime_type,
                    data,
                });
            }
            Some(QUERY_FIELD) => {
                form.query = Some(field.text().await?);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// `Content-Type` for a stored upload or a static asset
pub fn content_type_for(file_name: &str) -> &'static str {
    match extension(file_name).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json" | "map") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Reject anything that could step outside the upload directory
fn is_safe_name(file_name: &str) -> bool {
    !file_name.is_empty()
        && !file_name.contains('/')
        && !file_name.contains('\\')
        && !file_name.contains("..")
}

/// Local upload directory
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn advisory_dir(&self) -> PathBuf {
        self.root.join("advisory")
    }

    /// Write an image and describe it for the advisory record
    pub async fn save_advisory_image(&self, upload: &ImageUpload) -> Result<AdvisoryImage> {
        let dir = self.advisory_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let ext = extension(&upload.original_name)
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let filename = format!(
            "image-{}-{}{}",
            Utc::now().timestamp_millis(),
            rand::thread_rng().gen_range(0..1_000_000_000u32),
            ext
        );
        let path = dir.join(&filename);
        tokio::fs::write(&path, &upload.data).await?;

        debug!(file = %filename, size = upload.data.len(), "Stored advisory image");

        Ok(AdvisoryImage {
            filename,
            original_name: upload.original_name.clone(),
            path: path.to_string_lossy().into_owned(),
            size: upload.data.len() as i64,
            mime_type: upload.mime_type.clone(),
        })
    }

    /// Read a stored advisory image by bare file name
    pub async fn read_advisory(&self, file_name: &str) -> Result<(Bytes, &'static str)> {
        if !is_safe_name(file_name) {
            return Err(FarmError::BadRequest("Invalid file name".into()));
        }

        match tokio::fs::read(self.advisory_dir().join(file_name)).await {
            Ok(data) => Ok((Bytes::from(data), content_type_for(file_name))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FarmError::NotFound("File not found".into()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multipart_body(boundary: &str, parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Bytes {
        let mut body = Vec::new();
        for (name, file, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            match file {
                Some((file_name, mime)) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, mime
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        Bytes::from(body)
    }

    #[test]
    fn test_image_type_check() {
        assert!(is_allowed_image("leaf.JPG", "image/jpeg"));
        assert!(is_allowed_image("leaf.webp", "image/webp"));
        assert!(!is_allowed_image("leaf.pdf", "image/png"));
        assert!(!is_allowed_image("leaf.png", "application/pdf"));
        assert!(!is_allowed_image("leaf", "image/png"));
    }

    #[test]
    fn test_unsafe_names() {
        assert!(is_safe_name("image-1-2.png"));
        assert!(!is_safe_name("../secret"));
        assert!(!is_safe_name("a/b.png"));
        assert!(!is_safe_name("a\\b.png"));
        assert!(!is_safe_name(""));
    }

    #[tokio::test]
    async fn test_parse_form_with_image_and_query() {
        let body = multipart_body(
            "XyZ",
            &[
                ("query", None, b"spots on tomato leaves"),
                ("image", Some(("leaf.png", "image/png")), b"\x89PNG fake"),
            ],
        );
        let form = parse_advisory_form("multipart/form-data; boundary=XyZ", body, 1024)
            .await
            .unwrap();

        assert_eq!(form.query.as_deref(), Some("spots on tomato leaves"));
        let image = form.image.unwrap();
        assert_eq!(image.original_name, "leaf.png");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(&image.data[..], b"\x89PNG fake");
    }

    #[tokio::test]
    async fn test_parse_form_rejects_non_image() {
        let body = multipart_body(
            "XyZ",
            &[("image", Some(("notes.txt", "text/plain")), b"hello")],
        );
        let err = parse_advisory_form("multipart/form-data; boundary=XyZ", body, 1024)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Only image files are allowed");
    }

    #[tokio::test]
    async fn test_parse_form_enforces_size() {
        let big = vec![0u8; 2048];
        let body = multipart_body("XyZ", &[("image", Some(("big.png", "image/png")), &big)]);
        let err = parse_advisory_form("multipart/form-data; boundary=XyZ", body, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, FarmError::PayloadTooLarge(_)));
    }

    #[tokio::test]
    async fn test_save_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(dir.path());

        let stored = uploads
            .save_advisory_image(&ImageUpload {
                original_name: "Leaf.PNG".into(),
                mime_type: "image/png".into(),
                data: Bytes::from_static(b"png-bytes"),
            })
            .await
            .unwrap();

        assert!(stored.filename.starts_with("image-"));
        assert!(stored.filename.ends_with(".png"));
        assert_eq!(stored.size, 9);

        let (data, mime) = uploads.read_advisory(&stored.filename).await.unwrap();
        assert_eq!(&data[..], b"png-bytes");
        assert_eq!(mime, "image/png");

        let missing = uploads.read_advisory("image-0-0.png").await.unwrap_err();
        assert!(matches!(missing, FarmError::NotFound(_)));
    }
}
