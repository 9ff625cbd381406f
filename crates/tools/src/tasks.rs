//! Task tools: CRUD plus the narrow status, tag and schedule updates.

use async_trait::async_trait;
use devpilot_core::error::ToolError;
use devpilot_core::schema::{FieldKind, ToolSchema};
use devpilot_core::tool::Tool;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::client::BackendClient;
use crate::payload::{compact, extract_id, field_str, into_list, parse_args, same_id, tags_of};

pub const TASK_STATUSES: &[&str] = &["TODO", "IN_PROGRESS", "DONE", "BLOCKED"];

const TASK_ID_KEYS: &[&str] = &["taskId", "id"];

fn task_status() -> FieldKind {
    FieldKind::one_of(TASK_STATUSES)
}

fn priority() -> FieldKind {
    FieldKind::integer_between(1, 5)
}

fn task_ref() -> ToolSchema {
    ToolSchema::new().required("task_id", FieldKind::integer(), "Numeric id of the task")
}

#[derive(Deserialize)]
struct TaskRef {
    task_id: i64,
}

/// Fields shared by task creation and full updates.
#[derive(Deserialize)]
struct TaskFields {
    title: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
    priority: Option<i64>,
    due_date: Option<String>,
    estimated_time_hours: Option<f64>,
    status: Option<String>,
    project_id: Option<i64>,
}

impl TaskFields {
    /// Backend body; tags travel as one comma-separated string here.
    fn to_body(&self) -> Value {
        compact(vec![
            ("title", self.title.clone().map(Value::from)),
            ("description", self.description.clone().map(Value::from)),
            ("tags", self.tags.as_ref().map(|t| Value::from(t.join(",")))),
            ("priority", self.priority.map(Value::from)),
            ("dueDate", self.due_date.clone().map(Value::from)),
            ("estimatedTimeHours", self.estimated_time_hours.map(Value::from)),
            ("status", self.status.clone().map(Value::from)),
            ("projectId", self.project_id.map(Value::from)),
        ])
    }
}

fn task_field_schema(schema: ToolSchema) -> ToolSchema {
    schema
        .optional("description", FieldKind::String, "Short description")
        .optional("tags", FieldKind::StringList, "Labels such as 'backend' or 'urgent'")
        .optional("priority", priority(), "1 (highest) to 5 (lowest)")
        .optional("due_date", FieldKind::Date, "Deadline, YYYY-MM-DD")
        .optional("estimated_time_hours", FieldKind::Number, "Estimated effort in hours")
        .optional("status", task_status(), "Workflow status")
        .optional("project_id", FieldKind::integer(), "Project the task belongs to")
}

pub struct CreateTaskTool {
    client: BackendClient,
    schema: ToolSchema,
}

pub struct ListTasksTool {
    client: BackendClient,
    schema: ToolSchema,
}

pub struct GetTaskTool {
    client: BackendClient,
    schema: ToolSchema,
}

pub struct UpdateTaskTool {
    client: BackendClient,
    schema: ToolSchema,
}

pub struct DeleteTaskTool {
    client: BackendClient,
    schema: ToolSchema,
}

pub struct UpdateTaskStatusTool {
    client: BackendClient,
    schema: ToolSchema,
}

pub struct UpdateTaskTagsTool {
    client: BackendClient,
    schema: ToolSchema,
}

pub struct RemoveTaskTagsTool {
    client: BackendClient,
    schema: ToolSchema,
}

pub struct UpdateTaskScheduleTool {
    client: BackendClient,
    schema: ToolSchema,
}

// --- create_task ---

impl CreateTaskTool {
    pub fn new(client: BackendClient) -> Self {
        let schema = task_field_schema(ToolSchema::new().required("title", FieldKind::String, "Task title"));
        Self { client, schema }
    }
}

#[async_trait]
impl Tool for CreateTaskTool {
    fn name(&self) -> &str {
        "create_task"
    }

    fn description(&self) -> &str {
        "Create a task. Requires a title; it can be attached to a project and given tags, \
         priority (1 highest to 5 lowest), due date, estimate and status (TODO if omitted)."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let mut fields: TaskFields = parse_args(arguments)?;
        fields.status.get_or_insert_with(|| "TODO".into());
        let task = self.client.post("/tasks/new", &fields.to_body()).await?;
        Ok(json!({
            "task_id": extract_id(&task, TASK_ID_KEYS),
            "task": task,
        }))
    }
}

// --- list_tasks ---

#[derive(Deserialize)]
struct ListTasksArgs {
    project_id: Option<i64>,
    status: Option<String>,
    tag: Option<String>,
}

impl ListTasksTool {
    pub fn new(client: BackendClient) -> Self {
        let schema = ToolSchema::new()
            .optional("project_id", FieldKind::integer(), "Only tasks of this project")
            .optional("status", task_status(), "Only tasks with this status")
            .optional("tag", FieldKind::String, "Only tasks carrying this tag");
        Self { client, schema }
    }
}

#[async_trait]
impl Tool for ListTasksTool {
    fn name(&self) -> &str {
        "list_tasks"
    }

    fn description(&self) -> &str {
        "List the user's tasks, optionally filtered by project, status or tag."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: ListTasksArgs = parse_args(arguments)?;
        let tasks: Vec<Value> = into_list(self.client.get("/tasks/all").await?)
            .into_iter()
            .filter(|t| {
                args.project_id
                    .is_none_or(|id| t.get("projectId").is_some_and(|v| same_id(v, id)))
            })
            .filter(|t| {
                args.status
                    .as_deref()
                    .is_none_or(|s| field_str(t, &["status", "taskStatus"]) == Some(s))
            })
            .filter(|t| {
                args.tag
                    .as_deref()
                    .is_none_or(|tag| tags_of(t).iter().any(|x| x.eq_ignore_ascii_case(tag)))
            })
            .collect();

        Ok(json!({ "count": tasks.len(), "tasks": tasks }))
    }
}

// --- get_task ---

impl GetTaskTool {
    pub fn new(client: BackendClient) -> Self {
        Self { client, schema: task_ref() }
    }
}

#[async_trait]
impl Tool for GetTaskTool {
    fn name(&self) -> &str {
        "get_task"
    }

    fn description(&self) -> &str {
        "Fetch one task by id."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: TaskRef = parse_args(arguments)?;
        let task = self.client.get(&format!("/tasks/{}", args.task_id)).await?;
        Ok(json!({ "task_id": args.task_id, "task": task }))
    }
}

// --- update_task ---

impl UpdateTaskTool {
    pub fn new(client: BackendClient) -> Self {
        let schema = task_field_schema(task_ref().optional("title", FieldKind::String, "New title"))
            .require_any_of(&[
                "title",
                "description",
                "tags",
                "priority",
                "due_date",
                "estimated_time_hours",
                "status",
                "project_id",
            ]);
        Self { client, schema }
    }
}

#[async_trait]
impl Tool for UpdateTaskTool {
    fn name(&self) -> &str {
        "update_task"
    }

    fn description(&self) -> &str {
        "Change any fields of a task. Only the given fields change."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, mut arguments: Value) -> Result<Value, ToolError> {
        let task_id = arguments
            .as_object_mut()
            .and_then(|m| m.remove("task_id"))
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ToolError::InvalidArguments("task_id must be a whole number".into()))?;
        let fields: TaskFields = parse_args(arguments)?;
        let task = self
            .client
            .put(&format!("/tasks/{task_id}"), &fields.to_body())
            .await?;
        Ok(json!({ "ok": true, "task_id": task_id, "task": task }))
    }
}

// --- delete_task ---

impl DeleteTaskTool {
    pub fn new(client: BackendClient) -> Self {
        Self { client, schema: task_ref() }
    }
}

#[async_trait]
impl Tool for DeleteTaskTool {
    fn name(&self) -> &str {
        "delete_task"
    }

    fn description(&self) -> &str {
        "Permanently delete a task by id."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: TaskRef = parse_args(arguments)?;
        self.client.delete(&format!("/tasks/{}", args.task_id)).await?;
        Ok(json!({ "ok": true, "deleted_task_id": args.task_id }))
    }
}

// --- update_task_status ---

#[derive(Deserialize)]
struct StatusArgs {
    task_id: i64,
    status: String,
}

impl UpdateTaskStatusTool {
    pub fn new(client: BackendClient) -> Self {
        let schema = task_ref().required("status", task_status(), "New workflow status");
        Self { client, schema }
    }
}

#[async_trait]
impl Tool for UpdateTaskStatusTool {
    fn name(&self) -> &str {
        "update_task_status"
    }

    fn description(&self) -> &str {
        "Move a task to TODO, IN_PROGRESS, DONE or BLOCKED."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: StatusArgs = parse_args(arguments)?;
        let task = self
            .client
            .patch(&format!("/tasks/{}/status", args.task_id), &json!({ "status": args.status }))
            .await?;
        Ok(json!({ "ok": true, "task_id": args.task_id, "task": task }))
    }
}

// --- update_task_tags ---

#[derive(Deserialize)]
struct TagsArgs {
    task_id: i64,
    tags: Vec<String>,
}

impl UpdateTaskTagsTool {
    pub fn new(client: BackendClient) -> Self {
        let schema = task_ref().required(
            "tags",
            FieldKind::StringList,
            "Replacement tag list; existing tags are overwritten",
        );
        Self { client, schema }
    }
}

#[async_trait]
impl Tool for UpdateTaskTagsTool {
    fn name(&self) -> &str {
        "update_task_tags"
    }

    fn description(&self) -> &str {
        "Replace a task's tags with the given list."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: TagsArgs = parse_args(arguments)?;
        let task = self
            .client
            .patch(&format!("/tasks/{}/tags", args.task_id), &json!({ "tags": args.tags }))
            .await?;
        Ok(json!({ "ok": true, "task_id": args.task_id, "task": task }))
    }
}

// --- remove_task_tags ---

impl RemoveTaskTagsTool {
    pub fn new(client: BackendClient) -> Self {
        Self { client, schema: task_ref() }
    }
}

#[async_trait]
impl Tool for RemoveTaskTagsTool {
    fn name(&self) -> &str {
        "remove_task_tags"
    }

    fn description(&self) -> &str {
        "Remove every tag from a task."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: TaskRef = parse_args(arguments)?;
        self.client
            .delete(&format!("/tasks/{}/tags", args.task_id))
            .await?;
        Ok(json!({ "ok": true, "task_id": args.task_id }))
    }
}

// --- update_task_schedule ---

#[derive(Deserialize)]
struct ScheduleArgs {
    task_id: i64,
    due_date: Option<String>,
    priority: Option<i64>,
}

impl UpdateTaskScheduleTool {
    pub fn new(client: BackendClient) -> Self {
        let schema = task_ref()
            .optional("due_date", FieldKind::Date, "New deadline, YYYY-MM-DD")
            .optional("priority", priority(), "New priority, 1 (highest) to 5 (lowest)")
            .require_any_of(&["due_date", "priority"]);
        Self { client, schema }
    }
}

#[async_trait]
impl Tool for UpdateTaskScheduleTool {
    fn name(&self) -> &str {
        "update_task_schedule"
    }

    fn description(&self) -> &str {
        "Change a task's due date and/or priority."
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: ScheduleArgs = parse_args(arguments)?;
        let body = compact(vec![
            ("dueDate", args.due_date.map(Value::from)),
            ("priority", args.priority.map(Value::from)),
        ]);
        let task = self
            .client
            .patch(&format!("/tasks/{}/schedule", args.task_id), &body)
            .await?;
        Ok(json!({ "ok": true, "task_id": args.task_id, "task": task }))
    }
}
