// src/service.rs
//
// Upload service: the entry point an HTTP handler calls for
// `POST /artists/{id}/image` and `POST /tracks/{id}/image`.
//
// Order of operations: entity lookup, source acquisition, optimization,
// persistence. A missing entity fails before any network I/O.

use crate::config::OptimizationConfig;
use crate::engine::{CancelToken, HttpFetcher, Optimizer, UploadRequest};
use crate::error::{IngestError, Result};
use crate::ops::{ImageFormat, ProcessingResult};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Entity types that carry artwork.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Artist,
    Track,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Track => "track",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the repository knows about an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityRecord {
    pub id: String,
    pub name: String,
}

/// Image bytes handed to the repository for persistence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoredImage<'a> {
    pub data: &'a [u8],
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl StoredImage<'_> {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Storage key for an entity's artwork, e.g. `artist-42.jpg`.
    pub fn file_name(&self, kind: EntityKind, id: &str) -> String {
        format!("{kind}-{id}.{}", self.format.extension())
    }
}

impl<'a> From<&'a ProcessingResult> for StoredImage<'a> {
    fn from(result: &'a ProcessingResult) -> Self {
        Self {
            data: &result.data,
            format: result.format,
            width: result.optimized.width,
            height: result.optimized.height,
        }
    }
}

/// Persistence boundary. Implementations map their own failures to
/// `IngestError::RepositoryFailed`.
pub trait EntityRepository {
    fn lookup(&self, kind: EntityKind, id: &str) -> Result<Option<EntityRecord>>;

    fn store_image(&self, kind: EntityKind, id: &str, image: &StoredImage<'_>) -> Result<()>;
}

impl<R: EntityRepository + ?Sized> EntityRepository for &R {
    fn lookup(&self, kind: EntityKind, id: &str) -> Result<Option<EntityRecord>> {
        (**self).lookup(kind, id)
    }

    fn store_image(&self, kind: EntityKind, id: &str, image: &StoredImage<'_>) -> Result<()> {
        (**self).store_image(kind, id, image)
    }
}

/// JSON body returned to the client after a successful upload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UploadResponse {
    pub original_size: u64,
    pub optimized_size: u64,
    pub savings_percent: f64,
    pub encoder: String,
}

impl From<&ProcessingResult> for UploadResponse {
    fn from(result: &ProcessingResult) -> Self {
        Self {
            original_size: result.original_size(),
            optimized_size: result.optimized_size(),
            savings_percent: result.savings_percent,
            encoder: result.encoder_label.clone(),
        }
    }
}

/// Ties request parsing, acquisition, optimization and persistence together.
#[derive(Debug)]
pub struct UploadService<R> {
    repository: R,
    config: OptimizationConfig,
    fetcher: HttpFetcher,
    optimizer: Optimizer,
}

impl<R: EntityRepository> UploadService<R> {
    pub fn new(repository: R, config: OptimizationConfig) -> Self {
        Self {
            repository,
            config,
            fetcher: HttpFetcher::new(),
            optimizer: Optimizer::new(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: HttpFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_optimizer(mut self, optimizer: Optimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Process one upload for `kind`/`id`.
    pub fn upload(
        &self,
        kind: EntityKind,
        id: &str,
        request: UploadRequest,
        cancel: &CancelToken,
    ) -> Result<UploadResponse> {
        let source = request.into_source()?;

        if self.repository.lookup(kind, id)?.is_none() {
            return Err(IngestError::entity_not_found(kind.as_str(), id.to_string()));
        }
        debug!(kind = %kind, id, source = source.kind(), "starting artwork upload");

        let bytes = source.acquire(&self.fetcher, self.config.max_download_bytes(), cancel)?;
        let result = self.optimizer.process(bytes, &self.config)?;

        let stored = StoredImage::from(&result);
        self.repository.store_image(kind, id, &stored)?;
        info!(
            kind = %kind,
            id,
            mime = stored.mime_type(),
            size = result.optimized_size(),
            "artwork stored"
        );
        Ok(UploadResponse::from(&result))
    }

    /// Same as [`upload`](Self::upload) for a raw JSON request body.
    pub fn upload_json(
        &self,
        kind: EntityKind,
        id: &str,
        body: &str,
        cancel: &CancelToken,
    ) -> Result<UploadResponse> {
        let request = UploadRequest::from_json(body)?;
        self.upload(kind, id, request, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryRepository {
        entities: HashMap<(EntityKind, String), EntityRecord>,
        images: Mutex<HashMap<(EntityKind, String), Vec<u8>>>,
        files: Mutex<Vec<(String, &'static str)>>,
        fail_store: bool,
    }

    impl MemoryRepository {
        fn with_entity(mut self, kind: EntityKind, id: &str) -> Self {
            self.entities.insert(
                (kind, id.to_string()),
                EntityRecord {
                    id: id.to_string(),
                    name: format!("{kind} {id}"),
                },
            );
            self
        }

        fn stored(&self, kind: EntityKind, id: &str) -> Option<Vec<u8>> {
            self.images
                .lock()
                .unwrap()
                .get(&(kind, id.to_string()))
                .cloned()
        }
    }

    impl EntityRepository for MemoryRepository {
        fn lookup(&self, kind: EntityKind, id: &str) -> Result<Option<EntityRecord>> {
            Ok(self.entities.get(&(kind, id.to_string())).cloned())
        }

        fn store_image(&self, kind: EntityKind, id: &str, image: &StoredImage<'_>) -> Result<()> {
            if self.fail_store {
                return Err(IngestError::repository_failed("disk full"));
            }
            self.images
                .lock()
                .unwrap()
                .insert((kind, id.to_string()), image.data.to_vec());
            self.files
                .lock()
                .unwrap()
                .push((image.file_name(kind, id), image.mime_type()));
            Ok(())
        }
    }

    fn png_base64(width: u32, height: u32) -> String {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 40]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        STANDARD.encode(buf)
    }

    fn config(w: u32, h: u32) -> OptimizationConfig {
        OptimizationConfig::new(w, h, 85, false, 1 << 20).unwrap()
    }

    #[test]
    fn stores_optimized_image_for_entity() {
        let repo = MemoryRepository::default().with_entity(EntityKind::Artist, "7");
        let service = UploadService::new(&repo, config(32, 32));

        let payload = format!("data:image/png;base64,{}", png_base64(128, 64));
        let request = UploadRequest::from_base64(payload);
        let response = service
            .upload(EntityKind::Artist, "7", request, &CancelToken::new())
            .unwrap();

        let stored = repo.stored(EntityKind::Artist, "7").unwrap();
        assert_eq!(stored.len() as u64, response.optimized_size);
        assert!(response.optimized_size <= response.original_size);
    }

    #[test]
    fn exact_size_upload_is_stored_verbatim() {
        let repo = MemoryRepository::default().with_entity(EntityKind::Track, "t1");
        let service = UploadService::new(&repo, config(16, 16));
        let payload = png_base64(16, 16);

        let response = service
            .upload_json(
                EntityKind::Track,
                "t1",
                &format!(r#"{{"image":"{payload}"}}"#),
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(response.encoder, crate::ops::LABEL_NO_OPTIMIZATION_NEEDED);
        assert_eq!(response.savings_percent, 0.0);
        let stored = repo.stored(EntityKind::Track, "t1").unwrap();
        assert_eq!(STANDARD.encode(stored), payload);
    }

    #[test]
    fn stored_file_name_follows_output_format() {
        let repo = MemoryRepository::default()
            .with_entity(EntityKind::Artist, "7")
            .with_entity(EntityKind::Track, "t1");
        let service = UploadService::new(&repo, config(16, 16));
        let cancel = CancelToken::new();

        let resized = UploadRequest::from_base64(png_base64(64, 64));
        service
            .upload(EntityKind::Artist, "7", resized, &cancel)
            .unwrap();
        // exact size, so the PNG is kept as uploaded
        let exact = UploadRequest::from_base64(png_base64(16, 16));
        service
            .upload(EntityKind::Track, "t1", exact, &cancel)
            .unwrap();

        let files = repo.files.lock().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1], ("track-t1.png".to_string(), "image/png"));

        let (name, mime) = &files[0];
        let ext = name.strip_prefix("artist-7.").unwrap();
        assert_eq!(ImageFormat::from_extension(ext), ImageFormat::from_mime(mime));
    }

    #[test]
    fn stored_image_names_jpeg_with_jpg_extension() {
        let image = StoredImage {
            data: &[0xFF, 0xD8],
            format: ImageFormat::Jpeg,
            width: 1,
            height: 1,
        };
        assert_eq!(image.file_name(EntityKind::Track, "abc"), "track-abc.jpg");
        assert_eq!(image.mime_type(), "image/jpeg");
    }

    #[test]
    fn missing_entity_fails_before_acquisition() {
        let repo = MemoryRepository::default();
        let service = UploadService::new(&repo, config(32, 32));
        // An unreachable URL would time out if it were ever fetched.
        let err = service
            .upload(
                EntityKind::Artist,
                "404",
                UploadRequest::from_url("http://192.0.2.1:9/a.jpg"),
                &CancelToken::new(),
            )
            .unwrap_err();
        assert_eq!(err, IngestError::entity_not_found("artist", "404"));
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn source_errors_surface_unchanged() {
        let repo = MemoryRepository::default().with_entity(EntityKind::Artist, "1");
        let service = UploadService::new(&repo, config(32, 32));

        let err = service
            .upload(
                EntityKind::Artist,
                "1",
                UploadRequest::from_base64("not-valid-base64!!"),
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidBase64 { .. }));

        let err = service
            .upload_json(EntityKind::Artist, "1", "{}", &CancelToken::new())
            .unwrap_err();
        assert_eq!(err, IngestError::MissingSource);
        assert!(repo.stored(EntityKind::Artist, "1").is_none());
    }

    #[test]
    fn repository_failure_is_internal() {
        let repo = MemoryRepository {
            fail_store: true,
            ..MemoryRepository::default()
        }
        .with_entity(EntityKind::Track, "9");
        let service = UploadService::new(&repo, config(8, 8));

        let err = service
            .upload(
                EntityKind::Track,
                "9",
                UploadRequest::from_base64(png_base64(8, 8)),
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, IngestError::RepositoryFailed { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn response_serializes_with_snake_case_fields() {
        let response = UploadResponse {
            original_size: 2000,
            optimized_size: 500,
            savings_percent: 75.0,
            encoder: "alt (0 KB) vs standard (0 KB)".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["original_size"], 2000);
        assert_eq!(json["optimized_size"], 500);
        assert_eq!(json["savings_percent"], 75.0);
        assert_eq!(json["encoder"], "alt (0 KB) vs standard (0 KB)");
    }
}
