mod card;
mod range;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::derive::{Display, Error};

pub use card::routes as card_routes;
pub use range::routes as range_routes;

type ApiResponse = Result<HttpResponse, ApiError>;

#[derive(Debug, Error, Display)]
enum ApiError {
    #[display("Invalid range: {reason}")]
    InvalidRange { reason: String },
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        tracing::warn!("ApiError: {}", self);

        match self {
            ApiError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
        }
    }
}
