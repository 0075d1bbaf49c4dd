use std::io::Cursor;
use std::path::PathBuf;

use rocket::http::{ContentType, Header, Status};
use rocket::{request::Request, response::{self, Responder, Response}, State};

use crate::api::ApiError;
use crate::cache::DiskCache;
use crate::config::AppConfig;
use crate::images::{ImagePipeline, ResolveOrigin, ResolvedImage};

pub const CACHE_CLEARED: &str = "Cache cleared successfully";

const CACHE_CONTROL: &str = "public, max-age=86400";

// Responder for image data
pub struct ImageResponse {
    pub data: Vec<u8>,
    pub content_type: &'static str,
    pub origin: ResolveOrigin,
}

impl From<ResolvedImage> for ImageResponse {
    fn from(resolved: ResolvedImage) -> Self {
        Self {
            data: resolved.data,
            content_type: resolved.content_type,
            origin: resolved.origin,
        }
    }
}

impl<'r> Responder<'r, 'static> for ImageResponse {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let content_type = ContentType::parse_flexible(self.content_type)
            .unwrap_or(ContentType::Binary);
        let etag = format!("\"{:x}\"", md5::compute(&self.data));
        // Check If-None-Match header
        if let Some(if_none_match) = req.headers().get_one("If-None-Match") {
            if if_none_match == etag {
                return Response::build()
                    .status(Status::NotModified)
                    .header(Header::new("ETag", etag))
                    .header(Header::new("Cache-Control", CACHE_CONTROL))
                    .ok();
            }
        }
        Response::build()
            .header(content_type)
            .header(Header::new("Cache-Control", CACHE_CONTROL))
            .header(Header::new("ETag", etag))
            .header(Header::new("X-Cache", self.origin.as_str()))
            .sized_body(self.data.len(), Cursor::new(self.data))
            .ok()
    }
}

#[get("/clearcache?<key>")]
pub async fn clear_cache(
    key: Option<String>,
    cache: &State<DiskCache>,
    config: &State<AppConfig>,
) -> Result<&'static str, ApiError> {
    if key.as_deref().unwrap_or_default() != config.cache_clear_key {
        return Err(ApiError::Forbidden);
    }

    cache.clear().await?;
    log::info!("Cache cleared: {}", cache.root().display());

    Ok(CACHE_CLEARED)
}

#[get("/<path..>", rank = 10)]
pub async fn serve_image(
    path: PathBuf,
    pipeline: &State<ImagePipeline>,
) -> Result<ImageResponse, ApiError> {
    log::debug!("Serving image {}", path.display());

    let resolved = pipeline.resolve(&path).await?;
    Ok(resolved.into())
}
