pub mod error;
pub mod images;

pub use error::ApiError;

use rocket::Route;

/// `/clearcache` plus the catch-all image route.
pub fn routes() -> Vec<Route> {
    routes![images::clear_cache, images::serve_image]
}
