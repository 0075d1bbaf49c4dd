use std::path::{Path, PathBuf};

use crate::cache::{is_plain_relative, DiskCache};
use crate::images::tools::{self, ImageError, SourceFormat, WEBP_CONTENT_TYPE};

/// Where the bytes of a resolved image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOrigin {
    CacheHit,
    Transcoded,
    PassThrough,
}

impl ResolveOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveOrigin::CacheHit => "HIT",
            ResolveOrigin::Transcoded => "MISS",
            ResolveOrigin::PassThrough => "PASS",
        }
    }
}

#[derive(Debug)]
pub struct ResolvedImage {
    pub data: Vec<u8>,
    pub content_type: &'static str,
    pub origin: ResolveOrigin,
}

// Result of the blocking half of a cache miss
enum MissOutcome {
    Written,
    PassThrough,
}

/// Serves images from the disk cache, transcoding JPEG/PNG sources to WebP
/// on a miss.
pub struct ImagePipeline {
    cache: DiskCache,
    source_dir: PathBuf,
    quality: u8,
}

impl ImagePipeline {
    pub fn new(cache: DiskCache, source_dir: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            cache,
            source_dir: source_dir.into(),
            quality: quality.min(100),
        }
    }

    pub fn cache(&self) -> &DiskCache {
        &self.cache
    }

    pub async fn resolve(&self, resource: &Path) -> Result<ResolvedImage, ImageError> {
        if !is_plain_relative(resource) {
            log::warn!("Rejecting resource path {}", resource.display());
            return Err(ImageError::NotFound(resource.to_path_buf()));
        }

        let cache_path = self.cache.key_for(resource);
        if self.cache.contains(&cache_path).await {
            log::debug!("Cache hit for {}", resource.display());
            return Ok(ResolvedImage {
                data: read_file(&cache_path).await?,
                content_type: WEBP_CONTENT_TYPE,
                origin: ResolveOrigin::CacheHit,
            });
        }

        log::info!("Cache miss for {}", resource.display());

        let source_path = self.source_dir.join(resource);
        let outcome = {
            let cache = self.cache.clone();
            let source_path = source_path.clone();
            let cache_path = cache_path.clone();
            let quality = self.quality;
            tokio::task::spawn_blocking(move || transcode(&cache, &source_path, &cache_path, quality))
                .await
                .map_err(|e| ImageError::TaskError(e.to_string()))??
        };

        match outcome {
            MissOutcome::PassThrough => {
                log::debug!("{} is already WebP, serving as is", resource.display());
                Ok(ResolvedImage {
                    data: read_file(&source_path).await?,
                    content_type: WEBP_CONTENT_TYPE,
                    origin: ResolveOrigin::PassThrough,
                })
            }
            MissOutcome::Written => {
                log::info!(
                    "Transcoded {} into {}",
                    resource.display(),
                    cache_path.display()
                );
                Ok(ResolvedImage {
                    data: read_file(&cache_path).await?,
                    content_type: WEBP_CONTENT_TYPE,
                    origin: ResolveOrigin::Transcoded,
                })
            }
        }
    }
}

// Open, sniff, decode and encode into the cache. Runs on the blocking pool.
fn transcode(
    cache: &DiskCache,
    source_path: &Path,
    cache_path: &Path,
    quality: u8,
) -> Result<MissOutcome, ImageError> {
    let mut file = tools::open_source(source_path)?;

    let format = tools::sniff(&mut file, source_path)?;
    let img = match format {
        SourceFormat::Jpeg | SourceFormat::Png => tools::decode(file, format)?,
        SourceFormat::WebP => return Ok(MissOutcome::PassThrough),
        SourceFormat::Other(mime) => return Err(ImageError::UnsupportedType(mime)),
    };

    cache.store_with(cache_path, |writer| tools::encode_webp(&img, writer, quality))?;

    Ok(MissOutcome::Written)
}

async fn read_file(path: &Path) -> Result<Vec<u8>, ImageError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| ImageError::ReadError {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        source_dir: PathBuf,
        pipeline: ImagePipeline,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let source_dir = dir.path().join("images");
        std::fs::create_dir_all(&source_dir).unwrap();
        let cache = DiskCache::new(dir.path().join("cache"));
        let pipeline = ImagePipeline::new(cache, &source_dir, 90);
        Fixture {
            _dir: dir,
            source_dir,
            pipeline,
        }
    }

    fn write_image(path: &Path, format: ImageFormat) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([200, 40, 40])));
        img.save_with_format(path, format).unwrap();
    }

    #[tokio::test]
    async fn test_jpeg_is_transcoded_then_served_from_cache() {
        let fx = fixture();
        write_image(&fx.source_dir.join("photo.jpg"), ImageFormat::Jpeg);

        let first = fx.pipeline.resolve(Path::new("photo.jpg")).await.unwrap();
        assert_eq!(first.origin, ResolveOrigin::Transcoded);
        assert_eq!(first.content_type, "image/webp");
        assert_eq!(tools::detect_format(&first.data), SourceFormat::WebP);

        let cache_path = fx.pipeline.cache().key_for(Path::new("photo.jpg"));
        assert_eq!(std::fs::read(&cache_path).unwrap(), first.data);

        let second = fx.pipeline.resolve(Path::new("photo.jpg")).await.unwrap();
        assert_eq!(second.origin, ResolveOrigin::CacheHit);
        assert_eq!(second.data, first.data);
    }

    #[tokio::test]
    async fn test_nested_png_mirrors_source_layout() {
        let fx = fixture();
        write_image(&fx.source_dir.join("a/b/icon.png"), ImageFormat::Png);

        let resolved = fx.pipeline.resolve(Path::new("a/b/icon.png")).await.unwrap();

        assert_eq!(resolved.origin, ResolveOrigin::Transcoded);
        assert!(fx.pipeline.cache().root().join("a/b/icon.png.webp").is_file());
    }

    #[tokio::test]
    async fn test_webp_source_passes_through() {
        let fx = fixture();
        let mut webp = Vec::new();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([0, 0, 255])));
        tools::encode_webp(&img, &mut webp, 50).unwrap();
        std::fs::write(fx.source_dir.join("ready.webp"), &webp).unwrap();

        let resolved = fx.pipeline.resolve(Path::new("ready.webp")).await.unwrap();

        assert_eq!(resolved.origin, ResolveOrigin::PassThrough);
        assert_eq!(resolved.data, webp);
        assert!(!fx.pipeline.cache().root().exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_not_found() {
        let fx = fixture();

        let err = fx.pipeline.resolve(Path::new("ghost.jpg")).await.unwrap_err();

        assert!(matches!(err, ImageError::NotFound(_)));
        assert!(!fx.pipeline.cache().root().exists());
    }

    #[tokio::test]
    async fn test_text_file_is_unsupported() {
        let fx = fixture();
        std::fs::write(fx.source_dir.join("notes.txt"), "just some text").unwrap();

        let err = fx.pipeline.resolve(Path::new("notes.txt")).await.unwrap_err();

        assert!(matches!(err, ImageError::UnsupportedType(_)));
        assert!(!fx.pipeline.cache().root().exists());
    }

    #[tokio::test]
    async fn test_corrupt_jpeg_is_decode_error_without_cache_entry() {
        let fx = fixture();
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(&[0x42; 128]);
        std::fs::write(fx.source_dir.join("broken.jpg"), data).unwrap();

        let err = fx.pipeline.resolve(Path::new("broken.jpg")).await.unwrap_err();

        assert!(matches!(err, ImageError::DecodeError(_)));
        assert!(!fx.pipeline.cache().key_for(Path::new("broken.jpg")).exists());
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let fx = fixture();
        std::fs::write(fx.source_dir.join("../secret.jpg"), "x").unwrap();

        let err = fx
            .pipeline
            .resolve(Path::new("../secret.jpg"))
            .await
            .unwrap_err();

        assert!(matches!(err, ImageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cleared_cache_triggers_fresh_transcode() {
        let fx = fixture();
        write_image(&fx.source_dir.join("photo.png"), ImageFormat::Png);

        fx.pipeline.resolve(Path::new("photo.png")).await.unwrap();
        fx.pipeline.cache().clear().await.unwrap();

        let again = fx.pipeline.resolve(Path::new("photo.png")).await.unwrap();
        assert_eq!(again.origin, ResolveOrigin::Transcoded);
    }
}
