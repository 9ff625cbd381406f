//! Project tools: create, list, inspect, update and delete projects.

use async_trait::async_trait;
use devpilot_core::error::ToolError;
use devpilot_core::schema::{FieldKind, ToolSchema};
use devpilot_core::tool::Tool;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::client::BackendClient;
use crate::payload::{compact, extract_id, field_str, into_list, parse_args};

pub const PROJECT_STATUSES: &[&str] = &["ACTIVE", "ARCHIVED", "COMPLETED"];

const PROJECT_ID_KEYS: &[&str] = &["projectId", "id"];

fn project_status() -> FieldKind {
    FieldKind::one_of(PROJECT_STATUSES)
}

fn project_id_field(schema: ToolSchema) -> ToolSchema {
    schema.required("project_id", FieldKind::integer(), "Numeric id of the project")
}

// --- create_project ---

pub struct CreateProjectTool {
    client: BackendClient,
    schema: ToolSchema,
}

#[derive(Deserialize)]
struct CreateProjectArgs {
    name: String,
    description: Option<String>,
    status: Option<String>,
}

impl CreateProjectTool {
    pub fn new(client: BackendClient) -> Self {
        let schema = ToolSchema::new()
            .required("name", FieldKind::String, "Project name")
            .optional("description", FieldKind::String, "Short description of the project")
            .optional("status", project_status(), "Initial status, ACTIVE if omitted");
        Self { client, schema }
    }
}

#[async_trait]
impl Tool for CreateProjectTool {
    fn name(&self) -> &str {
        "create_project"
    }

    fn description(&self) -> &str {
        "Create a new project. Requires a name; description and status are optional."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: CreateProjectArgs = parse_args(arguments)?;
        let body = json!({
            "projectName": args.name,
            "projectDescription": args.description.unwrap_or_default(),
            "projectStatus": args.status.unwrap_or_else(|| "ACTIVE".into()),
        });
        let project = self.client.post("/projects/new", &body).await?;
        Ok(json!({
            "project_id": extract_id(&project, PROJECT_ID_KEYS),
            "project": project,
        }))
    }
}

// --- list_projects ---

pub struct ListProjectsTool {
    client: BackendClient,
    schema: ToolSchema,
}

#[derive(Deserialize)]
struct ListProjectsArgs {
    scope: Option<String>,
    status: Option<String>,
}

impl ListProjectsTool {
    pub fn new(client: BackendClient) -> Self {
        let schema = ToolSchema::new()
            .optional(
                "scope",
                FieldKind::one_of(&["all", "active"]),
                "'active' lists dashboard projects only; default 'all' includes their tasks",
            )
            .optional("status", project_status(), "Only return projects with this status");
        Self { client, schema }
    }
}

#[async_trait]
impl Tool for ListProjectsTool {
    fn name(&self) -> &str {
        "list_projects"
    }

    fn description(&self) -> &str {
        "List the user's projects, optionally only active ones or those with a given status."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: ListProjectsArgs = parse_args(arguments)?;
        let path = match args.scope.as_deref() {
            Some("active") => "/projects/dashboard",
            _ => "/projects/mypage",
        };

        let projects: Vec<Value> = into_list(self.client.get(path).await?)
            .into_iter()
            .filter(|p| match &args.status {
                Some(wanted) => field_str(p, &["projectStatus", "status"]) == Some(wanted.as_str()),
                None => true,
            })
            .collect();

        Ok(json!({ "count": projects.len(), "projects": projects }))
    }
}

// --- get_project ---

pub struct GetProjectTool {
    client: BackendClient,
    schema: ToolSchema,
}

#[derive(Deserialize)]
struct ProjectRef {
    project_id: i64,
}

impl GetProjectTool {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            schema: project_id_field(ToolSchema::new()),
        }
    }
}

#[async_trait]
impl Tool for GetProjectTool {
    fn name(&self) -> &str {
        "get_project"
    }

    fn description(&self) -> &str {
        "Fetch one project by id, including its details and status."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: ProjectRef = parse_args(arguments)?;
        let project = self.client.get(&format!("/projects/{}", args.project_id)).await?;
        Ok(json!({ "project_id": args.project_id, "project": project }))
    }
}

// --- update_project ---

pub struct UpdateProjectTool {
    client: BackendClient,
    schema: ToolSchema,
}

#[derive(Deserialize)]
struct UpdateProjectArgs {
    project_id: i64,
    name: Option<String>,
    description: Option<String>,
    status: Option<String>,
}

impl UpdateProjectTool {
    pub fn new(client: BackendClient) -> Self {
        let schema = project_id_field(ToolSchema::new())
            .optional("name", FieldKind::String, "New project name")
            .optional("description", FieldKind::String, "New description")
            .optional("status", project_status(), "New status")
            .require_any_of(&["name", "description", "status"]);
        Self { client, schema }
    }
}

#[async_trait]
impl Tool for UpdateProjectTool {
    fn name(&self) -> &str {
        "update_project"
    }

    fn description(&self) -> &str {
        "Change a project's name, description or status. Only the given fields change."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: UpdateProjectArgs = parse_args(arguments)?;
        let body = compact(vec![
            ("projectName", args.name.map(Value::from)),
            ("projectDescription", args.description.map(Value::from)),
            ("projectStatus", args.status.map(Value::from)),
        ]);
        let project = self
            .client
            .put(&format!("/projects/{}", args.project_id), &body)
            .await?;
        Ok(json!({ "ok": true, "project_id": args.project_id, "project": project }))
    }
}

// --- delete_project ---

pub struct DeleteProjectTool {
    client: BackendClient,
    schema: ToolSchema,
}

impl DeleteProjectTool {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            schema: project_id_field(ToolSchema::new()),
        }
    }
}

#[async_trait]
impl Tool for DeleteProjectTool {
    fn name(&self) -> &str {
        "delete_project"
    }

    fn description(&self) -> &str {
        "Permanently delete a project by id."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: ProjectRef = parse_args(arguments)?;
        self.client
            .delete(&format!("/projects/{}", args.project_id))
            .await?;
        Ok(json!({ "ok": true, "deleted_project_id": args.project_id }))
    }
}
