// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The upstream dispatcher: a token-paced, single-in-flight call to the
//! unreliable signing service.
//!
//! The admission check (`now <= last_time + time_step`) and the
//! non-blocking `try_lock` together form the rate limiter. A blocking
//! lock would serialize a burst of callers into slow ACKs instead of
//! one ACK and the rest BUSY, which is the whole point of this type
//! (see the "single cooperative mutex" redesign note).

use async_std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of a single dispatcher call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// We reached upstream and got a response; the HTTP status itself is
    /// the caller's concern.
    Ack,
    /// We did not attempt the call, or the transport failed.
    Busy,
}

/// A completed upstream response: status code and raw body bytes.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

struct PacingState {
    last_time: Instant,
}

/// Rate-limits and single-flights calls to the upstream signing service.
pub struct Dispatcher {
    api_key: String,
    base_url: surf::Url,
    time_step: Duration,
    state: Mutex<PacingState>,
}

impl Dispatcher {
    pub fn new(base_url: surf::Url, api_key: String, max_requests_per_minute: u32) -> Self {
        let time_step = Duration::from_secs_f64(60.0 / max_requests_per_minute as f64);
        Self {
            api_key,
            base_url,
            time_step,
            // Backdated so the very first call is always admitted.
            state: Mutex::new(PacingState {
                last_time: Instant::now() - time_step.mul_f64(1.1),
            }),
        }
    }

    pub fn time_step(&self) -> Duration {
        self.time_step
    }

    /// `GET {base_url}/crypto/sign?message=<message>` with the configured
    /// API key, paced to at most one attempt per `time_step` and never
    /// more than one in flight. A burst of N concurrent callers arriving
    /// within one idle window produces exactly one `Ack` and N-1 `Busy`.
    pub async fn call(&self, message: &[u8]) -> (Outcome, Option<UpstreamResponse>) {
        let now = Instant::now();
        let Some(mut state) = self.state.try_lock() else {
            return (Outcome::Busy, None);
        };
        if now <= state.last_time + self.time_step {
            return (Outcome::Busy, None);
        }

        let url = match self.sign_url(message) {
            Some(url) => url,
            None => {
                state.last_time = Instant::now();
                return (Outcome::Busy, None);
            }
        };
        let result = surf::get(url)
            .header("Authorization", self.api_key.as_str())
            .await;
        // Per spec open question #1: update `last_time` regardless of
        // whether the exchange succeeded. This consumes the pacing slot
        // even on transport failure, which is friendlier to upstream
        // under sustained failures than retrying immediately.
        state.last_time = Instant::now();

        match result {
            Ok(mut response) => {
                let status = response.status() as u16;
                let body = response.body_bytes().await.unwrap_or_default();
                tracing::debug!(status, "upstream responded");
                (Outcome::Ack, Some(UpstreamResponse { status, body }))
            }
            Err(err) => {
                tracing::warn!(%err, "upstream transport error");
                (Outcome::Busy, None)
            }
        }
    }

    fn sign_url(&self, message: &[u8]) -> Option<surf::Url> {
        let message = std::str::from_utf8(message).ok()?;
        let mut url = self.base_url.join("/crypto/sign").ok()?;
        url.query_pairs_mut().append_pair("message", message);
        Some(url)
    }
}
