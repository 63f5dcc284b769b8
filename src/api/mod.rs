// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The ingress `tide` app: route wiring only, no business logic.

pub mod error;
pub mod routes;

use crate::context::ShimContext;
use std::sync::Arc;

pub fn build_app(ctx: Arc<ShimContext>) -> tide::Server<Arc<ShimContext>> {
    let mut app = tide::with_state(ctx);
    app.with(error::add_error_body);
    app.at("/crypto/sign").get(routes::crypto_sign);
    app.at("/crypto/test-webhook").post(routes::test_webhook);
    app.at("/healthcheck").get(routes::healthcheck);
    app
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{LogLevel, QueueType, ShimOptions};
    use std::time::Duration;
    use tide::{Body, Response, StatusCode};

    async fn spawn_stub_upstream(status: StatusCode, body: &'static [u8]) -> surf::Url {
        let port = portpicker::pick_unused_port().expect("no free port");
        let mut app = tide::new();
        app.at("/crypto/sign")
            .get(move |_req: tide::Request<()>| async move {
                let mut resp = Response::new(status);
                resp.set_body(Body::from_bytes(body.to_vec()));
                Ok(resp)
            });
        let addr = format!("127.0.0.1:{}", port);
        async_std::task::spawn(app.listen(addr.clone()));
        async_std::task::sleep(Duration::from_millis(50)).await;
        surf::Url::parse(&format!("http://{}", addr)).unwrap()
    }

    async fn spawn_shim(upstream: surf::Url, max_requests_per_minute: u32) -> (surf::Url, Arc<ShimContext>) {
        let opt = ShimOptions {
            api_key: "key".to_string(),
            unreliable_service_url: upstream,
            log_level: LogLevel::Info,
            queue_type: QueueType::InMemory,
            persistent_queue_path: String::new(),
            max_task_retries: 5,
            max_requests_per_minute,
            notify_on_failure: false,
            port: 0,
        };
        let ctx = Arc::new(ShimContext::new(opt).unwrap());
        let app = build_app(ctx.clone());
        let port = portpicker::pick_unused_port().expect("no free port");
        let addr = format!("127.0.0.1:{}", port);
        async_std::task::spawn(app.listen(addr.clone()));
        async_std::task::sleep(Duration::from_millis(50)).await;
        (surf::Url::parse(&format!("http://{}", addr)).unwrap(), ctx)
    }

    #[async_std::test]
    async fn sync_success_returns_200_with_signature() {
        let upstream = spawn_stub_upstream(StatusCode::Ok, b"aaaa").await;
        let (shim, ctx) = spawn_shim(upstream, 60).await;

        let res = surf::get(shim.join("/crypto/sign?message=foobar").unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(ctx.queue.len().await, 0);
    }

    #[async_std::test]
    async fn rate_limited_call_enqueues_pending_task() {
        let upstream = spawn_stub_upstream(StatusCode::Ok, b"aaaa").await;
        let (shim, ctx) = spawn_shim(upstream, 1).await;
        // Exhaust the rate window.
        ctx.dispatcher.call(b"warmup").await;

        let res = surf::get(shim.join("/crypto/sign?message=foobar1").unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::Accepted);
        assert_eq!(ctx.queue.len().await, 1);
    }

    #[async_std::test]
    async fn invalid_webhook_url_returns_422_and_does_not_enqueue() {
        let upstream = spawn_stub_upstream(StatusCode::Ok, b"aaaa").await;
        let (shim, ctx) = spawn_shim(upstream, 1).await;
        ctx.dispatcher.call(b"warmup").await;

        let res = surf::get(
            shim.join("/crypto/sign?message=foobar&webhook_url=foo://google.com")
                .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(res.status(), StatusCode::UnprocessableEntity);
        assert_eq!(ctx.queue.len().await, 0);
    }

    #[async_std::test]
    async fn healthcheck_reports_available() {
        let upstream = spawn_stub_upstream(StatusCode::Ok, b"aaaa").await;
        let (shim, _ctx) = spawn_shim(upstream, 60).await;

        let mut res = surf::get(shim.join("/healthcheck").unwrap()).await.unwrap();
        let body: serde_json::Value = res.body_json().await.unwrap();
        assert_eq!(body["status"], "available");
    }

    #[async_std::test]
    async fn test_webhook_echoes_body() {
        let upstream = spawn_stub_upstream(StatusCode::Ok, b"aaaa").await;
        let (shim, _ctx) = spawn_shim(upstream, 60).await;

        let task = crate::task::ExternalTask {
            id: 7,
            message: b"hi".to_vec(),
            webhook_url: String::new(),
            status: crate::task::TaskStatus::Pending,
            signature: String::new(),
        };
        let mut res = surf::post(shim.join("/crypto/test-webhook").unwrap())
            .body_json(&task)
            .unwrap()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::Ok);
        let echoed: crate::task::ExternalTask = res.body_json().await.unwrap();
        assert_eq!(echoed, task);
    }
}
