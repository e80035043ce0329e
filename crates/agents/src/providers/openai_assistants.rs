//! Completion gateway backed by the OpenAI Assistants API (v2).

use std::time::Duration;

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    reqwest::Method,
    secrecy::{ExposeSecret, Secret},
    serde_json::{Value, json},
    tracing::{debug, trace, warn},
};

use crate::{
    action::{ActionArgs, ActionRequest},
    completion::{CompletionGateway, RunId, RunSnapshot, RunStatus},
};

const ASSISTANTS_BETA_HEADER: &str = "assistants=v2";
const RUN_LIST_LIMIT: u32 = 100;

pub struct OpenAiAssistants {
    api_key: Secret<String>,
    base_url: String,
    assistant_id: String,
    client: reqwest::Client,
}

impl OpenAiAssistants {
    pub fn new(
        api_key: Secret<String>,
        base_url: String,
        assistant_id: String,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            assistant_id,
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("OpenAI-Beta", ASSISTANTS_BETA_HEADER)
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let resp = request
            .send()
            .await
            .with_context(|| format!("{what}: request failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "{what} failed");
            anyhow::bail!("{what}: HTTP {status}: {body}");
        }
        let value: Value = resp
            .json()
            .await
            .with_context(|| format!("{what}: invalid JSON response"))?;
        trace!(response = %value, "{what} response");
        Ok(value)
    }
}

#[async_trait]
impl CompletionGateway for OpenAiAssistants {
    async fn submit_input(&self, thread_id: &str, text: &str) -> Result<RunId> {
        self.send(
            self.request(Method::POST, &format!("/threads/{thread_id}/messages"))
                .json(&json!({ "role": "user", "content": text })),
            "add message",
        )
        .await?;

        let run = self
            .send(
                self.request(Method::POST, &format!("/threads/{thread_id}/runs"))
                    .json(&json!({ "assistant_id": self.assistant_id })),
                "create run",
            )
            .await?;
        let run_id = parse_run_id(&run)?;
        debug!(thread_id, run_id = %run_id, "run created");
        Ok(run_id)
    }

    async fn poll_status(&self, thread_id: &str, run_id: &str) -> Result<RunSnapshot> {
        let run = self
            .send(
                self.request(Method::GET, &format!("/threads/{thread_id}/runs/{run_id}")),
                "retrieve run",
            )
            .await?;
        parse_run_snapshot(&run)
    }

    async fn submit_action_result(
        &self,
        thread_id: &str,
        run_id: &str,
        call_id: &str,
        output: &str,
    ) -> Result<RunId> {
        let run = self
            .send(
                self.request(
                    Method::POST,
                    &format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
                )
                .json(&json!({
                    "tool_outputs": [{ "tool_call_id": call_id, "output": output }],
                })),
                "submit tool outputs",
            )
            .await?;
        parse_run_id(&run)
    }

    async fn fetch_latest_reply(&self, thread_id: &str) -> Result<String> {
        let messages = self
            .send(
                self.request(Method::GET, &format!("/threads/{thread_id}/messages"))
                    .query(&[("limit", "1"), ("order", "desc")]),
                "list messages",
            )
            .await?;
        Ok(parse_latest_reply(&messages))
    }

    async fn list_active_runs(&self, thread_id: &str) -> Result<Vec<RunId>> {
        let runs = self
            .send(
                self.request(Method::GET, &format!("/threads/{thread_id}/runs"))
                    .query(&[("limit", RUN_LIST_LIMIT)]),
                "list runs",
            )
            .await?;
        Ok(parse_active_runs(&runs))
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<()> {
        self.send(
            self.request(
                Method::POST,
                &format!("/threads/{thread_id}/runs/{run_id}/cancel"),
            ),
            "cancel run",
        )
        .await?;
        Ok(())
    }
}

fn parse_run_id(run: &Value) -> Result<RunId> {
    run["id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("run object has no id"))
}

fn parse_run_snapshot(run: &Value) -> Result<RunSnapshot> {
    let raw = run["status"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("run object has no status"))?;
    let status =
        RunStatus::from_api(raw).ok_or_else(|| anyhow::anyhow!("unknown run status: {raw}"))?;

    let actions = if status == RunStatus::RequiresAction {
        run["required_action"]["submit_tool_outputs"]["tool_calls"]
            .as_array()
            .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    Ok(RunSnapshot { status, actions })
}

fn parse_tool_call(call: &Value) -> Option<ActionRequest> {
    let call_id = call["id"].as_str()?;
    let function = &call["function"];
    let name = function["name"].as_str()?;
    let raw_args = function["arguments"].as_str().unwrap_or_default();
    // Malformed arguments reach the registry as an empty set, which fails
    // its parameter checks with "invalid arguments".
    let arguments = ActionArgs::from_json_str(raw_args).unwrap_or_else(|e| {
        warn!(action = name, error = %e, "malformed action arguments");
        ActionArgs::default()
    });
    Some(ActionRequest {
        name: name.to_string(),
        arguments,
        call_id: call_id.to_string(),
    })
}

/// Text parts of the newest message, if it came from the assistant.
fn parse_latest_reply(messages: &Value) -> String {
    let Some(latest) = messages["data"].as_array().and_then(|d| d.first()) else {
        return String::new();
    };
    if latest["role"].as_str() != Some("assistant") {
        return String::new();
    }
    latest["content"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p["type"] == "text")
                .filter_map(|p| p["text"]["value"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

fn parse_active_runs(runs: &Value) -> Vec<RunId> {
    runs["data"]
        .as_array()
        .map(|data| {
            data.iter()
                .filter(|run| {
                    run["status"]
                        .as_str()
                        .and_then(RunStatus::from_api)
                        .is_some_and(RunStatus::is_active)
                })
                .filter_map(|run| run["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, extract::Request, http::StatusCode, response::IntoResponse};

    use super::*;

    #[derive(Debug, Clone)]
    struct Captured {
        method: String,
        path: String,
        query: Option<String>,
        authorization: Option<String>,
        beta: Option<String>,
        body: Option<Value>,
    }

    fn header(req: &Request, name: &str) -> Option<String> {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn canned_response(method: &str, path: &str) -> (StatusCode, Value) {
        match (method, path) {
            ("POST", "/threads/thread_1/messages") => {
                (StatusCode::OK, json!({ "id": "msg_1", "role": "user" }))
            },
            ("POST", "/threads/thread_1/runs") => {
                (StatusCode::OK, json!({ "id": "run_1", "status": "queued" }))
            },
            ("GET", "/threads/thread_1/runs/run_1") => (
                StatusCode::OK,
                json!({
                    "id": "run_1",
                    "status": "requires_action",
                    "required_action": {
                        "type": "submit_tool_outputs",
                        "submit_tool_outputs": {
                            "tool_calls": [{
                                "id": "call_1",
                                "type": "function",
                                "function": {
                                    "name": "fetch-history",
                                    "arguments": "{\"entity\":\"@news\",\"limit\":5}"
                                }
                            }]
                        }
                    }
                }),
            ),
            ("POST", "/threads/thread_1/runs/run_1/submit_tool_outputs") => {
                (StatusCode::OK, json!({ "id": "run_1", "status": "queued" }))
            },
            ("GET", "/threads/thread_1/messages") => (
                StatusCode::OK,
                json!({
                    "data": [{
                        "role": "assistant",
                        "content": [
                            { "type": "text", "text": { "value": "Here is" } },
                            { "type": "image_file", "image_file": { "file_id": "f" } },
                            { "type": "text", "text": { "value": "the summary." } }
                        ]
                    }]
                }),
            ),
            ("GET", "/threads/thread_1/runs") => (
                StatusCode::OK,
                json!({
                    "data": [
                        { "id": "run_a", "status": "requires_action" },
                        { "id": "run_b", "status": "completed" },
                        { "id": "run_c", "status": "in_progress" },
                        { "id": "run_d", "status": "cancelled" }
                    ]
                }),
            ),
            ("POST", "/threads/thread_1/runs/run_a/cancel") => {
                (StatusCode::OK, json!({ "id": "run_a", "status": "cancelling" }))
            },
            _ => (
                StatusCode::NOT_FOUND,
                json!({ "error": { "message": "No thread found" } }),
            ),
        }
    }

    /// Start a mock Assistants API that records every request.
    async fn start_mock() -> (String, Arc<Mutex<Vec<Captured>>>) {
        let captured: Arc<Mutex<Vec<Captured>>> = Arc::new(Mutex::new(Vec::new()));
        let captured_clone = captured.clone();

        let app = Router::new().fallback(move |req: Request| {
            let cap = captured_clone.clone();
            async move {
                let method = req.method().to_string();
                let path = req.uri().path().to_string();
                let query = req.uri().query().map(str::to_string);
                let authorization = header(&req, "authorization");
                let beta = header(&req, "openai-beta");
                let body_bytes = axum::body::to_bytes(req.into_body(), 1024 * 1024)
                    .await
                    .unwrap_or_default();
                let body: Option<Value> = serde_json::from_slice(&body_bytes).ok();
                let (status, payload) = canned_response(&method, &path);
                cap.lock().unwrap().push(Captured {
                    method,
                    path,
                    query,
                    authorization,
                    beta,
                    body,
                });
                (status, axum::Json(payload)).into_response()
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/"), captured)
    }

    fn test_gateway(base_url: &str) -> OpenAiAssistants {
        OpenAiAssistants::new(
            Secret::new("sk-test".to_string()),
            base_url.to_string(),
            "asst_1".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn submit_input_adds_message_then_creates_run() {
        let (url, captured) = start_mock().await;
        let run_id = test_gateway(&url)
            .submit_input("thread_1", "summarise @news")
            .await
            .unwrap();
        assert_eq!(run_id, "run_1");

        let reqs = captured.lock().unwrap().clone();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].path, "/threads/thread_1/messages");
        assert_eq!(
            reqs[0].body,
            Some(json!({ "role": "user", "content": "summarise @news" }))
        );
        assert_eq!(reqs[1].body, Some(json!({ "assistant_id": "asst_1" })));
        for req in &reqs {
            assert_eq!(req.method, "POST");
            assert_eq!(req.authorization.as_deref(), Some("Bearer sk-test"));
            assert_eq!(req.beta.as_deref(), Some("assistants=v2"));
        }
    }

    #[tokio::test]
    async fn poll_decodes_requested_action() {
        let (url, _) = start_mock().await;
        let snapshot = test_gateway(&url)
            .poll_status("thread_1", "run_1")
            .await
            .unwrap();
        assert_eq!(snapshot.status, RunStatus::RequiresAction);
        assert_eq!(snapshot.actions, vec![ActionRequest {
            name: "fetch-history".into(),
            arguments: ActionArgs::new().with("entity", "@news").with("limit", "5"),
            call_id: "call_1".into(),
        }]);
    }

    #[tokio::test]
    async fn submit_action_result_posts_tool_output() {
        let (url, captured) = start_mock().await;
        let run_id = test_gateway(&url)
            .submit_action_result("thread_1", "run_1", "call_1", r#"{"success":true}"#)
            .await
            .unwrap();
        assert_eq!(run_id, "run_1");

        let reqs = captured.lock().unwrap().clone();
        assert_eq!(
            reqs[0].body,
            Some(json!({
                "tool_outputs": [{ "tool_call_id": "call_1", "output": "{\"success\":true}" }]
            }))
        );
    }

    #[tokio::test]
    async fn fetch_latest_reply_joins_text_parts() {
        let (url, captured) = start_mock().await;
        let reply = test_gateway(&url)
            .fetch_latest_reply("thread_1")
            .await
            .unwrap();
        assert_eq!(reply, "Here is\nthe summary.");

        let reqs = captured.lock().unwrap().clone();
        let query = reqs[0].query.clone().unwrap();
        assert!(query.contains("limit=1"));
        assert!(query.contains("order=desc"));
    }

    #[tokio::test]
    async fn lists_and_cancels_active_runs() {
        let (url, captured) = start_mock().await;
        let gateway = test_gateway(&url);
        let active = gateway.list_active_runs("thread_1").await.unwrap();
        assert_eq!(active, vec!["run_a", "run_c"]);

        gateway.cancel_run("thread_1", "run_a").await.unwrap();
        let reqs = captured.lock().unwrap().clone();
        assert_eq!(reqs[1].path, "/threads/thread_1/runs/run_a/cancel");
    }

    #[tokio::test]
    async fn http_error_surfaces_status() {
        let (url, _) = start_mock().await;
        let err = test_gateway(&url)
            .poll_status("thread_missing", "run_1")
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("404"), "{message}");
        assert!(message.contains("No thread found"), "{message}");
    }

    #[test]
    fn malformed_arguments_become_empty() {
        let run = json!({
            "id": "run_1",
            "status": "requires_action",
            "required_action": { "submit_tool_outputs": { "tool_calls": [{
                "id": "call_1",
                "function": { "name": "join-channel", "arguments": "{oops" }
            }]}}
        });
        let snapshot = parse_run_snapshot(&run).unwrap();
        assert_eq!(snapshot.actions.len(), 1);
        assert!(snapshot.actions[0].arguments.is_empty());
    }

    #[test]
    fn unknown_status_is_error() {
        assert!(parse_run_snapshot(&json!({ "id": "r", "status": "melted" })).is_err());
        assert!(parse_run_snapshot(&json!({ "id": "r" })).is_err());
    }

    #[test]
    fn user_message_is_not_a_reply() {
        let messages = json!({
            "data": [{ "role": "user", "content": [{ "type": "text", "text": { "value": "hi" } }] }]
        });
        assert_eq!(parse_latest_reply(&messages), "");
        assert_eq!(parse_latest_reply(&json!({ "data": [] })), "");
    }
}
