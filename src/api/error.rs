// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Ingress error taxonomy and the `{status_code, message, data}` envelope.
//!
//! The teacher's services get this from a shared private `net` crate
//! (`net::Error`, `net::server::add_error_body`). That crate isn't a
//! published dependency we can pull in, so `ApiError` and
//! [`add_error_body`] reimplement the same shape against our own error
//! type.

use serde::{Deserialize, Serialize};
use snafu::Snafu;
use tide::StatusCode;

#[derive(Debug, Snafu, Serialize, Deserialize)]
#[snafu(module(error))]
pub enum ShimError {
    #[snafu(display("invalid webhook_url: {}", url))]
    WebhookTargetInvalid { url: String },

    #[snafu(display("failed to write to the durable queue: {}", msg))]
    QueueWriteFailed { msg: String },

    #[snafu(display("invalid request parameter: {}", msg))]
    BadRequest { msg: String },

    #[snafu(display("internal server error: {}", msg))]
    Internal { msg: String },
}

pub trait ApiError: std::error::Error + Serialize {
    fn catch_all(msg: String) -> Self;
    fn status(&self) -> StatusCode;
}

impl ApiError for ShimError {
    fn catch_all(msg: String) -> Self {
        Self::Internal { msg }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::WebhookTargetInvalid { .. } => StatusCode::UnprocessableEntity,
            Self::BadRequest { .. } => StatusCode::BadRequest,
            Self::QueueWriteFailed { .. } => StatusCode::InternalServerError,
            Self::Internal { .. } => StatusCode::InternalServerError,
        }
    }
}

pub fn server_error<E: Into<ShimError>>(err: E) -> tide::Error {
    let err = err.into();
    tide::Error::from_str(err.status(), err.to_string())
}

/// Render a typed value as a JSON body with the given status code.
pub fn response_with_status<T: Serialize>(status: StatusCode, value: &T) -> tide::Response {
    tide::Response::builder(status)
        .content_type(tide::http::mime::JSON)
        .body(serde_json::to_value(value).expect("response body always serializes"))
        .build()
}

/// Render a typed value as a `200` JSON body.
pub fn response<T: Serialize>(value: &T) -> tide::Response {
    response_with_status(StatusCode::Ok, value)
}

/// Middleware that catches any error raised by a downstream handler and
/// rewrites the response body into the stable
/// `{status_code, message, data}` envelope, matching the teacher's
/// `net::server::add_error_body` convention.
pub async fn add_error_body<T: Clone + Send + Sync + 'static>(
    req: tide::Request<T>,
    next: tide::Next<'_, T>,
) -> tide::Result {
    let mut res = next.run(req).await;
    if let Some(err) = res.take_error() {
        let status = res.status();
        let msg = err.to_string();
        res.set_body(serde_json::json!({
            "status_code": status as u16,
            "message": msg,
            "data": serde_json::Value::Null,
        }));
        res.set_content_type(tide::http::mime::JSON);
    }
    Ok(res)
}
