pub mod pipeline;
pub mod tools;

pub use pipeline::{ImagePipeline, ResolveOrigin, ResolvedImage};
pub use tools::{ImageError, SourceFormat};
