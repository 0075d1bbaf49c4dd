use crate::cache::CacheError;
use crate::images::ImageError;
use rocket::http::{ContentType, Status};
use std::io::Cursor;

#[derive(Debug)]
pub enum ApiError {
    ImageError(ImageError),
    CacheError(CacheError),
    Forbidden,
}

impl From<ImageError> for ApiError {
    fn from(error: ImageError) -> Self {
        ApiError::ImageError(error)
    }
}

impl From<CacheError> for ApiError {
    fn from(error: CacheError) -> Self {
        ApiError::CacheError(error)
    }
}

impl ApiError {
    pub fn status(&self) -> Status {
        self.parts().0
    }

    pub fn message(&self) -> &'static str {
        self.parts().1
    }

    fn parts(&self) -> (Status, &'static str) {
        match self {
            ApiError::ImageError(ImageError::NotFound(_)) => (Status::NotFound, "File not found"),
            ApiError::ImageError(ImageError::ReadError { .. }) => {
                (Status::InternalServerError, "Error reading file")
            }
            ApiError::ImageError(ImageError::UnsupportedType(_)) => {
                (Status::BadRequest, "Unsupported file type")
            }
            ApiError::ImageError(ImageError::DecodeError(_))
            | ApiError::ImageError(ImageError::TaskError(_)) => {
                (Status::InternalServerError, "Error processing image")
            }
            ApiError::ImageError(ImageError::EncodeError(_)) => {
                (Status::InternalServerError, "Error encoding image")
            }
            ApiError::ImageError(ImageError::Cache(error)) | ApiError::CacheError(error) => {
                match error {
                    CacheError::DirError { .. } => {
                        (Status::InternalServerError, "Error creating cache directory")
                    }
                    CacheError::CreateError { .. } => {
                        (Status::InternalServerError, "Error creating cache file")
                    }
                    CacheError::DeleteError { .. } => {
                        (Status::InternalServerError, "Error clearing cache")
                    }
                }
            }
            ApiError::Forbidden => (Status::Forbidden, "Invalid cache clear key"),
        }
    }

    // Details stay in the log, the client only gets the short message
    fn log(&self) {
        let status = self.status();
        match self {
            ApiError::ImageError(error) if status.code >= 500 => log::error!("{}: {}", status, error),
            ApiError::CacheError(error) => log::error!("{}: {}", status, error),
            ApiError::ImageError(error) => log::warn!("{}: {}", status, error),
            ApiError::Forbidden => log::warn!("{}: cache clear rejected, wrong key", status),
        }
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        self.log();
        let (status, message) = self.parts();

        rocket::Response::build()
            .status(status)
            .header(ContentType::Plain)
            .sized_body(message.len(), Cursor::new(message))
            .ok()
    }
}
