//! Backend tools for DevPilot.
//!
//! Each tool is one typed operation against the project management service:
//! projects and tasks can be created, listed, inspected, updated and deleted,
//! and tasks additionally support narrow status, tag and schedule updates.
//! All of them share one [`BackendClient`].

pub mod client;
mod payload;
pub mod projects;
pub mod tasks;

use devpilot_core::error::ToolError;
use devpilot_core::tool::ToolRegistry;

pub use client::BackendClient;

/// Create the registry with the full project/task catalogue.
///
/// The registry's per-call timeout matches the client's request timeout.
pub fn default_registry(client: BackendClient) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new().with_call_timeout(client.timeout());

    registry.register(Box::new(projects::CreateProjectTool::new(client.clone())))?;
    registry.register(Box::new(projects::ListProjectsTool::new(client.clone())))?;
    registry.register(Box::new(projects::GetProjectTool::new(client.clone())))?;
    registry.register(Box::new(projects::UpdateProjectTool::new(client.clone())))?;
    registry.register(Box::new(projects::DeleteProjectTool::new(client.clone())))?;

    registry.register(Box::new(tasks::CreateTaskTool::new(client.clone())))?;
    registry.register(Box::new(tasks::ListTasksTool::new(client.clone())))?;
    registry.register(Box::new(tasks::GetTaskTool::new(client.clone())))?;
    registry.register(Box::new(tasks::UpdateTaskTool::new(client.clone())))?;
    registry.register(Box::new(tasks::DeleteTaskTool::new(client.clone())))?;
    registry.register(Box::new(tasks::UpdateTaskStatusTool::new(client.clone())))?;
    registry.register(Box::new(tasks::UpdateTaskTagsTool::new(client.clone())))?;
    registry.register(Box::new(tasks::RemoveTaskTagsTool::new(client.clone())))?;
    registry.register(Box::new(tasks::UpdateTaskScheduleTool::new(client)))?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use axum::response::{IntoResponse, Response};
    use devpilot_core::tool::{FailureKind, ToolOutcome};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[derive(Debug, Clone)]
    struct Recorded {
        method: Method,
        path: String,
        authorization: Option<String>,
        user_id: Option<String>,
        body: Option<Value>,
    }

    #[derive(Clone, Default)]
    struct FakeBackend {
        requests: Arc<Mutex<Vec<Recorded>>>,
    }

    impl FakeBackend {
        fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }
    }

    async fn handle(
        State(state): State<FakeBackend>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let path = uri.path().to_string();
        state.requests.lock().unwrap().push(Recorded {
            method: method.clone(),
            path: path.clone(),
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            user_id: headers
                .get("x-user-id")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            body: serde_json::from_slice(&body).ok(),
        });

        let route = path.trim_start_matches("/api/agent");
        match (method.as_str(), route) {
            ("POST", "/projects/new") => axum::Json(json!({
                "projectId": 11,
                "projectName": "Apollo",
                "projectStatus": "ACTIVE"
            }))
            .into_response(),
            ("GET", "/projects/mypage") => axum::Json(json!([
                { "projectId": 1, "projectName": "Apollo", "projectStatus": "ACTIVE" },
                { "projectId": 2, "projectName": "Gemini", "projectStatus": "COMPLETED" }
            ]))
            .into_response(),
            ("GET", "/projects/dashboard") => axum::Json(json!([
                { "projectId": 1, "projectName": "Apollo", "projectStatus": "ACTIVE" }
            ]))
            .into_response(),
            ("GET", "/projects/404") => (
                StatusCode::NOT_FOUND,
                axum::Json(json!({ "message": "Project 404 not found" })),
            )
                .into_response(),
            ("GET", "/tasks/all") => axum::Json(json!({ "data": [
                { "taskId": 1, "title": "Spec", "status": "DONE", "projectId": 1, "tags": "docs,planning" },
                { "taskId": 2, "title": "Build", "status": "IN_PROGRESS", "projectId": 1, "tags": "backend" },
                { "taskId": 3, "title": "Launch", "status": "TODO", "projectId": 2, "tags": ["ops"] }
            ]}))
            .into_response(),
            ("GET", "/tasks/99") => {
                tokio::time::sleep(Duration::from_secs(3)).await;
                axum::Json(json!({})).into_response()
            }
            ("DELETE", _) => StatusCode::NO_CONTENT.into_response(),
            _ => axum::Json(json!({ "taskId": 5, "updated": true })).into_response(),
        }
    }

    async fn spawn_backend() -> (FakeBackend, String) {
        let state = FakeBackend::default();
        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (state, format!("http://{addr}"))
    }

    async fn registry_for(base_url: &str) -> ToolRegistry {
        let client = BackendClient::new(base_url)
            .with_auth_token("jwt-123")
            .with_user_id("42")
            .with_timeout(Duration::from_millis(500));
        default_registry(client).unwrap()
    }

    fn data(outcome: ToolOutcome) -> Value {
        match outcome {
            ToolOutcome::Success { data } => data,
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn default_registry_has_full_catalogue() {
        let registry = default_registry(BackendClient::new("http://localhost:8080")).unwrap();
        assert_eq!(registry.len(), 14);
        assert_eq!(
            registry.names(),
            vec![
                "create_project",
                "create_task",
                "delete_project",
                "delete_task",
                "get_project",
                "get_task",
                "list_projects",
                "list_tasks",
                "remove_task_tags",
                "update_project",
                "update_task",
                "update_task_schedule",
                "update_task_status",
                "update_task_tags",
            ]
        );
        for def in registry.definitions() {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }

    #[tokio::test]
    async fn create_project_sends_backend_fields_and_headers() {
        let (backend, url) = spawn_backend().await;
        let registry = registry_for(&url).await;

        let out = data(
            registry
                .invoke("create_project", &json!({ "name": "Apollo", "description": "Moon" }))
                .await,
        );
        assert_eq!(out["project_id"], 11);

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.path, "/api/agent/projects/new");
        assert_eq!(req.authorization.as_deref(), Some("Bearer jwt-123"));
        assert_eq!(req.user_id.as_deref(), Some("42"));
        assert_eq!(
            req.body,
            Some(json!({
                "projectName": "Apollo",
                "projectDescription": "Moon",
                "projectStatus": "ACTIVE"
            }))
        );
    }

    #[tokio::test]
    async fn list_projects_scope_and_status_filter() {
        let (backend, url) = spawn_backend().await;
        let registry = registry_for(&url).await;

        let all = data(registry.invoke("list_projects", &json!({})).await);
        assert_eq!(all["count"], 2);

        let completed = data(registry.invoke("list_projects", &json!({ "status": "COMPLETED" })).await);
        assert_eq!(completed["count"], 1);
        assert_eq!(completed["projects"][0]["projectName"], "Gemini");

        let active = data(registry.invoke("list_projects", &json!({ "scope": "active" })).await);
        assert_eq!(active["count"], 1);

        let paths: Vec<String> = backend.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec![
                "/api/agent/projects/mypage",
                "/api/agent/projects/mypage",
                "/api/agent/projects/dashboard"
            ]
        );
    }

    #[tokio::test]
    async fn list_tasks_filters_locally() {
        let (_backend, url) = spawn_backend().await;
        let registry = registry_for(&url).await;

        let by_project = data(registry.invoke("list_tasks", &json!({ "project_id": 1 })).await);
        assert_eq!(by_project["count"], 2);

        let by_tag = data(registry.invoke("list_tasks", &json!({ "tag": "docs" })).await);
        assert_eq!(by_tag["tasks"][0]["title"], "Spec");

        let by_status = data(registry.invoke("list_tasks", &json!({ "status": "TODO" })).await);
        assert_eq!(by_status["tasks"][0]["taskId"], 3);
    }

    #[tokio::test]
    async fn create_task_joins_tags_and_defaults_status() {
        let (backend, url) = spawn_backend().await;
        let registry = registry_for(&url).await;

        let out = data(
            registry
                .invoke(
                    "create_task",
                    &json!({
                        "title": "Write tests",
                        "tags": ["qa", "backend"],
                        "priority": 2,
                        "due_date": "2025-06-30",
                        "project_id": 1
                    }),
                )
                .await,
        );
        assert_eq!(out["task_id"], 5);

        let body = backend.requests()[0].body.clone().unwrap();
        assert_eq!(body["tags"], "qa,backend");
        assert_eq!(body["dueDate"], "2025-06-30");
        assert_eq!(body["projectId"], 1);
        assert_eq!(body["status"], "TODO");
        assert!(body.get("description").is_none());
    }

    #[tokio::test]
    async fn narrow_task_updates_hit_their_endpoints() {
        let (backend, url) = spawn_backend().await;
        let registry = registry_for(&url).await;

        assert!(registry
            .invoke("update_task_status", &json!({ "task_id": 5, "status": "DONE" }))
            .await
            .is_success());
        assert!(registry
            .invoke("update_task_tags", &json!({ "task_id": 5, "tags": ["urgent"] }))
            .await
            .is_success());
        assert!(registry
            .invoke("update_task_schedule", &json!({ "task_id": 5, "priority": 1 }))
            .await
            .is_success());
        let removed = data(registry.invoke("remove_task_tags", &json!({ "task_id": 5 })).await);
        assert_eq!(removed["ok"], true);

        let calls: Vec<(Method, String, Option<Value>)> = backend
            .requests()
            .into_iter()
            .map(|r| (r.method, r.path, r.body))
            .collect();
        assert_eq!(calls[0], (Method::PATCH, "/api/agent/tasks/5/status".into(), Some(json!({ "status": "DONE" }))));
        assert_eq!(calls[1], (Method::PATCH, "/api/agent/tasks/5/tags".into(), Some(json!({ "tags": ["urgent"] }))));
        assert_eq!(calls[2], (Method::PATCH, "/api/agent/tasks/5/schedule".into(), Some(json!({ "priority": 1 }))));
        assert_eq!(calls[3].0, Method::DELETE);
        assert_eq!(calls[3].1, "/api/agent/tasks/5/tags");
    }

    #[tokio::test]
    async fn update_task_sends_only_given_fields() {
        let (backend, url) = spawn_backend().await;
        let registry = registry_for(&url).await;

        let out = data(
            registry
                .invoke("update_task", &json!({ "task_id": 8, "title": "Renamed" }))
                .await,
        );
        assert_eq!(out["task_id"], 8);

        let req = &backend.requests()[0];
        assert_eq!(req.method, Method::PUT);
        assert_eq!(req.path, "/api/agent/tasks/8");
        assert_eq!(req.body, Some(json!({ "title": "Renamed" })));
    }

    #[tokio::test]
    async fn malformed_arguments_make_no_requests() {
        let (backend, url) = spawn_backend().await;
        let registry = registry_for(&url).await;

        let cases = [
            ("update_task_schedule", json!({ "task_id": 5 })),
            ("update_project", json!({ "project_id": 1 })),
            ("create_task", json!({ "priority": 3 })),
            ("create_task", json!({ "title": "x", "priority": 7 })),
            ("update_task_status", json!({ "task_id": 5, "status": "FINISHED" })),
            ("get_task", json!({ "task_id": "five" })),
        ];
        for (tool, args) in cases {
            let outcome = registry.invoke(tool, &args).await;
            assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidArguments), "{tool} {args}");
        }
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn backend_error_becomes_remote_failure() {
        let (_backend, url) = spawn_backend().await;
        let registry = registry_for(&url).await;

        match registry.invoke("get_project", &json!({ "project_id": 404 })).await {
            ToolOutcome::Failure { kind, message, http_status } => {
                assert_eq!(kind, FailureKind::RemoteError);
                assert_eq!(http_status, Some(404));
                assert!(message.contains("Project 404 not found"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_with_empty_body_succeeds() {
        let (_backend, url) = spawn_backend().await;
        let registry = registry_for(&url).await;

        let out = data(registry.invoke("delete_project", &json!({ "project_id": 2 })).await);
        assert_eq!(out, json!({ "ok": true, "deleted_project_id": 2 }));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let (_backend, url) = spawn_backend().await;
        let registry = registry_for(&url).await;

        let outcome = registry.invoke("get_task", &json!({ "task_id": 99 })).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn unreachable_backend_is_remote_failure() {
        let registry = registry_for("http://127.0.0.1:1").await;
        let outcome = registry.invoke("list_tasks", &json!({})).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::RemoteError));
    }
}
