use std::sync::Arc;

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::adapter::range_selection::RangeSelection;
use crate::core::time::{DateRange, DateTime};

use super::{ApiError, ApiResponse};

pub fn routes(selection: Arc<RangeSelection>) -> actix_web::Scope {
    web::scope("/range")
        .route("", web::get().to(get_range))
        .route("", web::put().to(put_range))
        .app_data(web::Data::from(selection))
}

#[derive(Debug, Deserialize)]
struct RangeRequest {
    start: DateTime,
    end: Option<DateTime>,
}

async fn get_range(selection: web::Data<RangeSelection>) -> ApiResponse {
    Ok(HttpResponse::Ok().json(selection.current()))
}

async fn put_range(selection: web::Data<RangeSelection>, request: web::Json<RangeRequest>) -> ApiResponse {
    let request = request.into_inner();
    let range = DateRange::new(request.start, request.end).map_err(|e| ApiError::InvalidRange {
        reason: e.to_string(),
    })?;

    selection.select(range);
    Ok(HttpResponse::NoContent().finish())
}
