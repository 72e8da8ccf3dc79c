use axum::extract::FromRequest;

use crate::error::AppError;

/// `Json` whose rejections render as a 400 in the API envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
