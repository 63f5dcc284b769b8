// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Fire-and-log webhook delivery, plus DNS pre-validation used at
//! task-admission time.

use crate::task::ExternalTask;
use async_std::future::timeout;
use async_std::net::ToSocketAddrs;
use std::time::Duration;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(1);

/// Validate a prospective webhook URL at admission time: the scheme must
/// be `http`/`https` and the host must resolve. Never called again at
/// delivery time (delivery failures are logged and swallowed instead).
pub async fn validate_webhook_url(url: &str) -> bool {
    if url.is_empty() {
        // Empty webhook_url means "no notification"; always valid.
        return true;
    }
    let parsed = match surf::Url::parse(url) {
        Ok(url) => url,
        Err(_) => return false,
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }
    let host = match parsed.host_str() {
        Some(host) => host,
        None => return false,
    };
    let port = parsed
        .port_or_known_default()
        .unwrap_or(if parsed.scheme() == "https" { 443 } else { 80 });

    (host, port).to_socket_addrs().await.is_ok()
}

/// POST the sanitized task as JSON to `task.webhook_url`. A no-op if the
/// URL is empty. Any transport error, non-200 response, or timeout is
/// logged and swallowed: webhook delivery is best-effort, at-most-once.
pub async fn notify(task: &ExternalTask) {
    if task.webhook_url.is_empty() {
        return;
    }
    let send = surf::post(&task.webhook_url)
        .content_type(surf::http::mime::JSON)
        .body_json(task)
        .expect("ExternalTask always serializes");

    match timeout(WEBHOOK_TIMEOUT, send).await {
        Ok(Ok(response)) if response.status().is_success() => {
            tracing::debug!(id = task.id, url = %task.webhook_url, "webhook delivered");
        }
        Ok(Ok(response)) => {
            tracing::warn!(
                id = task.id,
                url = %task.webhook_url,
                status = %response.status(),
                "webhook delivery returned non-200, dropping"
            );
        }
        Ok(Err(err)) => {
            tracing::warn!(id = task.id, url = %task.webhook_url, %err, "webhook delivery failed, dropping");
        }
        Err(_) => {
            tracing::warn!(id = task.id, url = %task.webhook_url, "webhook delivery timed out, dropping");
        }
    }
}
