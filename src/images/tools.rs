use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use image::codecs::webp::{WebPEncoder, WebPQuality};
use image::{ColorType, DynamicImage, ImageFormat};
use thiserror::Error;

use crate::cache::CacheError;

/// Number of leading bytes inspected to classify a source file.
pub const SNIFF_LEN: usize = 512;

pub const WEBP_CONTENT_TYPE: &str = "image/webp";

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Error reading {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },

    #[error("Unsupported file type: {0}")]
    UnsupportedType(&'static str),

    #[error("Error decoding image: {0}")]
    DecodeError(#[source] image::ImageError),

    #[error("Error encoding image: {0}")]
    EncodeError(#[source] image::ImageError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Image task failed: {0}")]
    TaskError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    WebP,
    // Anything we don't transcode, tagged with its sniffed mime type
    Other(&'static str),
}

impl SourceFormat {
    pub fn content_type(&self) -> &'static str {
        match *self {
            SourceFormat::Jpeg => "image/jpeg",
            SourceFormat::Png => "image/png",
            SourceFormat::WebP => WEBP_CONTENT_TYPE,
            SourceFormat::Other(mime) => mime,
        }
    }
}

// Classify a file prefix by its magic number
pub fn detect_format(data: &[u8]) -> SourceFormat {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        SourceFormat::Jpeg
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        SourceFormat::Png
    } else if data.starts_with(b"RIFF") && data.get(8..14) == Some(b"WEBPVP".as_slice()) {
        SourceFormat::WebP
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        SourceFormat::Other("image/gif")
    } else if data.starts_with(b"BM") {
        SourceFormat::Other("image/bmp")
    } else if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        SourceFormat::Other("image/tiff")
    } else if data.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        SourceFormat::Other("image/x-icon")
    } else {
        SourceFormat::Other("application/octet-stream")
    }
}

/// Opens a source file, distinguishing a missing file from an unreadable one.
pub fn open_source(path: &Path) -> Result<File, ImageError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ImageError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(ImageError::ReadError {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let is_dir = file
        .metadata()
        .map(|m| m.is_dir())
        .map_err(|source| ImageError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
    if is_dir {
        return Err(ImageError::NotFound(path.to_path_buf()));
    }

    Ok(file)
}

/// Reads up to [`SNIFF_LEN`] bytes, classifies them and rewinds the reader.
pub fn sniff<R: Read + Seek>(reader: &mut R, path: &Path) -> Result<SourceFormat, ImageError> {
    let read_error = |source: io::Error| ImageError::ReadError {
        path: path.to_path_buf(),
        source,
    };

    let mut buffer = Vec::with_capacity(SNIFF_LEN);
    reader
        .by_ref()
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut buffer)
        .map_err(read_error)?;
    if buffer.is_empty() {
        return Err(read_error(io::ErrorKind::UnexpectedEof.into()));
    }

    reader.seek(SeekFrom::Start(0)).map_err(read_error)?;

    Ok(detect_format(&buffer))
}

pub fn decode<R: Read + Seek>(reader: R, format: SourceFormat) -> Result<DynamicImage, ImageError> {
    let format = match format {
        SourceFormat::Jpeg => ImageFormat::Jpeg,
        SourceFormat::Png => ImageFormat::Png,
        other => return Err(ImageError::UnsupportedType(other.content_type())),
    };

    image::load(BufReader::new(reader), format).map_err(ImageError::DecodeError)
}

/// Encodes `img` as lossy WebP at `quality` (0-100) into `writer`.
#[allow(deprecated)]
pub fn encode_webp(img: &DynamicImage, writer: &mut dyn Write, quality: u8) -> Result<(), ImageError> {
    let rgba = img.to_rgba8();
    let encoder = WebPEncoder::new_with_quality(writer, WebPQuality::lossy(quality.min(100)));
    encoder
        .encode(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)
        .map_err(ImageError::EncodeError)
}
