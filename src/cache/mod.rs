pub mod image;

pub use image::{is_plain_relative, CacheError, DiskCache, CACHE_EXTENSION};
