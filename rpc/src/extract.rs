//! Request extractors whose rejections are reported as [`RpcError`], so a
//! malformed body, path or query string gets the same `{ error, kind }`
//! response as any other validation failure.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::RpcError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(RpcError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(RpcError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(RpcError))]
pub struct ApiQuery<T>(pub T);
