use reqwest::{Client, header};
use tokio::time::Instant;

use super::{TaskExecutor, infra_failure, remaining};
use crate::{
    outcome::{Outcome, Status},
    task::{Payload, TaskDescriptor},
};

/// POSTs each task's payload to a fixed endpoint.
///
/// File payloads are sent as raw bytes, records as a JSON object. The inner
/// [`Client`] holds the connection pool and is shared by every worker;
/// build one executor per run and never one per task.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpExecutor {
    pub fn new(client: Client, url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            token,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TaskExecutor for HttpExecutor {
    async fn execute(&self, task: &TaskDescriptor, deadline: Option<Instant>) -> Outcome {
        let started = Instant::now();

        let mut request = self.client.post(&self.url);
        request = match &task.payload {
            Payload::File(path) => match tokio::fs::read(path).await {
                Ok(bytes) => request
                    .header(header::CONTENT_TYPE, "application/octet-stream")
                    .body(bytes),
                Err(e) => {
                    return infra_failure(task, started, format!("read {}: {e}", path.display()));
                }
            },
            Payload::Record(record) => request.json(record),
        };
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(left) = remaining(deadline) {
            request = request.timeout(left);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Outcome::timed_out(task, started.elapsed()),
            Err(e) => return infra_failure(task, started, e),
        };

        let code = response.status().as_u16();
        // the body is kept for diagnostics; a broken body on a success is still a success
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Outcome::timed_out(task, started.elapsed()),
            Err(e) => format!("<unreadable body: {e}>"),
        };
        Outcome::new(task, started.elapsed(), Status::Http(code), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        extract::Json,
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use serde_json::{Map, Value, json};
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn success_with_bearer_and_json() {
        let app = Router::new().route(
            "/ingest",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if auth != "Bearer secret-token-0123456789" {
                    return (StatusCode::UNAUTHORIZED, "no".to_string());
                }
                (StatusCode::CREATED, body["did"].as_str().unwrap_or_default().to_string())
            }),
        );
        let base = serve(app).await;
        let executor = HttpExecutor::new(
            Client::new(),
            format!("{base}/ingest"),
            Some("secret-token-0123456789".into()),
        );

        let task = TaskDescriptor::record(4, "exp-1-0", record(json!({"did": "exp-1-0"})));
        let outcome = executor.execute(&task, None).await;
        assert_eq!(outcome.status, Status::Http(201));
        assert!(outcome.status.is_success());
        assert_eq!(outcome.detail, "exp-1-0");
        assert_eq!(outcome.index, 4);
    }

    #[tokio::test]
    async fn application_failure_keeps_body() {
        let app = Router::new().route(
            "/ingest",
            post(|| async { (StatusCode::BAD_REQUEST, "schema violation: size") }),
        );
        let base = serve(app).await;
        let executor = HttpExecutor::new(Client::new(), format!("{base}/ingest"), None);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(&path, b"{}").unwrap();

        let outcome = executor.execute(&TaskDescriptor::file(0, &path), None).await;
        assert_eq!(outcome.status, Status::Http(400));
        assert!(!outcome.status.is_success());
        assert_eq!(outcome.detail, "schema violation: size");
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let app = Router::new().route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let base = serve(app).await;
        let executor = HttpExecutor::new(Client::new(), format!("{base}/slow"), None);

        let task = TaskDescriptor::record(0, "x", record(json!({"did": "x"})));
        let deadline = Instant::now() + Duration::from_millis(100);
        let outcome = executor.execute(&task, Some(deadline)).await;
        assert_eq!(outcome.status, Status::TimedOut);
        assert!(outcome.elapsed >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn connection_refused_is_infrastructure_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let executor = HttpExecutor::new(Client::new(), format!("http://{addr}/"), None);
        let task = TaskDescriptor::record(0, "x", record(json!({"did": "x"})));
        let outcome = executor.execute(&task, None).await;
        assert_eq!(outcome.status, Status::Failed);
        assert!(!outcome.detail.is_empty());
    }

    #[tokio::test]
    async fn unreadable_file_is_infrastructure_failure() {
        let executor = HttpExecutor::new(Client::new(), "http://127.0.0.1:9/", None);
        let outcome = executor
            .execute(&TaskDescriptor::file(0, "/definitely/not/here.json"), None)
            .await;
        assert_eq!(outcome.status, Status::Failed);
        assert!(outcome.detail.contains("not/here.json"));
    }
}
