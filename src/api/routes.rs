// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Ingress handlers: `/crypto/sign`, `/crypto/test-webhook`, `/healthcheck`.

use super::error::{response, response_with_status, server_error, ShimError};
use crate::context::ShimContext;
use crate::dispatcher::Outcome;
use crate::task::{ExternalTask, Task};
use crate::webhook::validate_webhook_url;
use serde::Deserialize;
use std::sync::Arc;
use tide::StatusCode;

#[derive(Debug, Deserialize)]
struct SignQuery {
    message: String,
    #[serde(default)]
    webhook_url: String,
}

/// `GET /crypto/sign?message=<str>&webhook_url=<str?>`.
///
/// Tries the dispatcher once, inline. An immediate ACK+200 is returned to
/// the caller synchronously and never touches the queue; anything else
/// is validated and enqueued for the worker to retry.
pub async fn crypto_sign(
    req: tide::Request<Arc<ShimContext>>,
) -> Result<tide::Response, tide::Error> {
    let query: SignQuery = req.query().map_err(|err| {
        server_error(ShimError::BadRequest {
            msg: err.to_string(),
        })
    })?;
    let ctx = req.state();

    let (outcome, upstream) = ctx.dispatcher.call(query.message.as_bytes()).await;
    if let Outcome::Ack = outcome {
        let upstream = upstream.expect("Ack outcome always carries a response");
        if upstream.status == 200 {
            let mut task = Task::new(query.message.into_bytes(), query.webhook_url, rand::random());
            task.mark_done(&upstream.body)
                .expect("freshly constructed task is always PENDING");
            return Ok(response_with_status(StatusCode::Ok, &task.sanitize()));
        }
    }

    if !validate_webhook_url(&query.webhook_url).await {
        return Err(server_error(ShimError::WebhookTargetInvalid {
            url: query.webhook_url,
        }));
    }

    let task = Task::new(query.message.into_bytes(), query.webhook_url, rand::random());
    let sanitized = task.sanitize();
    ctx.queue.add(task).await.map_err(|err| {
        server_error(ShimError::QueueWriteFailed {
            msg: err.to_string(),
        })
    })?;

    Ok(response_with_status(StatusCode::Accepted, &sanitized))
}

/// `POST /crypto/test-webhook`: echoes the sanitized task it receives.
/// Exists solely to drive the webhook JSON-serialization path under test.
pub async fn test_webhook(
    mut req: tide::Request<Arc<ShimContext>>,
) -> Result<tide::Response, tide::Error> {
    let task: ExternalTask = req
        .body_json()
        .await
        .map_err(|err| server_error(ShimError::BadRequest {
            msg: err.to_string(),
        }))?;
    Ok(response(&task))
}

/// `GET /healthcheck`.
pub async fn healthcheck(_req: tide::Request<Arc<ShimContext>>) -> Result<tide::Response, tide::Error> {
    Ok(response(&serde_json::json!({ "status": "available" })))
}
