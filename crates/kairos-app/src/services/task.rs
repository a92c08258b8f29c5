//! `TaskService`.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use kairos_core::{KairosError, KairosResult};
use kairos_dispatch::{Invocation, MethodTable, ParameterDescriptor, Reply, Service};
use serde_json::json;
use uuid::Uuid;

use super::{load_owned, require_admin};
use crate::models::{NewTask, Task, TaskChanges, TaskStatus};
use crate::repository::{TaskQuery, TaskRepository};

/// Largest page `ListTasksAsync` returns.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Task CRUD for the calling user.
pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskService").finish_non_exhaustive()
    }
}

impl TaskService {
    /// Creates the service over a repository.
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self { tasks }
    }

    async fn create(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let owner = inv.caller_id()?.to_string();
        let input: NewTask = inv.arg("task")?;
        let now = Utc::now();

        let task = self
            .tasks
            .insert(Task {
                id: Uuid::now_v7().to_string(),
                owner_id: owner,
                title: input.title.trim().to_string(),
                description: input.description,
                status: TaskStatus::Todo,
                priority: input.priority.unwrap_or(0),
                due_date: input.due_date,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(task_id = %task.id, owner = %task.owner_id, "task created");
        Reply::json(&task)
    }

    async fn get(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let task_id: String = inv.arg("taskId")?;
        let task = load_owned(self.tasks.as_ref(), &task_id, inv.identity(), "TaskService.GetTaskAsync").await?;
        Reply::json(&task)
    }

    async fn list(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let owner = inv.caller_id()?;
        let status = inv
            .arg_opt::<String>("status")?
            .map(|s| s.parse::<TaskStatus>())
            .transpose()
            .map_err(KairosError::validation)?;
        let page: i64 = inv.arg("page")?;
        let page_size: i64 = inv.arg("pageSize")?;

        if page < 1 {
            return Err(KairosError::validation("page must be at least 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(KairosError::validation(format!(
                "pageSize must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let query = TaskQuery {
            status,
            page: usize::try_from(page).unwrap_or(usize::MAX),
            page_size: usize::try_from(page_size).unwrap_or(1),
        };
        let tasks = self.tasks.list_by_owner(owner, query).await?;
        Reply::json(&tasks)
    }

    async fn update(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let task_id: String = inv.arg("taskId")?;
        let changes: TaskChanges = inv.arg("changes")?;
        let mut task =
            load_owned(self.tasks.as_ref(), &task_id, inv.identity(), "TaskService.UpdateTaskAsync").await?;

        changes.apply(&mut task, Utc::now());
        let task = self.tasks.update(task).await?;
        Reply::json(&task)
    }

    async fn complete(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let task_id: String = inv.arg("taskId")?;
        let mut task =
            load_owned(self.tasks.as_ref(), &task_id, inv.identity(), "TaskService.CompleteTaskAsync").await?;

        if task.status != TaskStatus::Done {
            task.status = TaskStatus::Done;
            task.updated_at = Utc::now();
            task = self.tasks.update(task).await?;
        }
        Reply::json(&task)
    }

    async fn delete(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let task_id: String = inv.arg("taskId")?;
        load_owned(self.tasks.as_ref(), &task_id, inv.identity(), "TaskService.DeleteTaskAsync").await?;

        self.tasks.delete(&task_id).await?;
        tracing::info!(task_id = %task_id, "task deleted");
        Ok(Reply::Empty)
    }

    async fn export_csv(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let tasks = self.all_owned(&inv).await?;

        let mut csv = String::from("id,title,status,priority,dueDate,createdAt\n");
        for task in &tasks {
            let due = task.due_date.map(|d| d.to_rfc3339()).unwrap_or_default();
            csv.push_str(&format!(
                "{},{},{},{},{},{}\n",
                task.id,
                csv_field(&task.title),
                task.status,
                task.priority,
                due,
                task.created_at.to_rfc3339()
            ));
        }
        Ok(Reply::text(csv))
    }

    async fn export_archive(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let tasks = self.all_owned(&inv).await?;

        let lines: Vec<Result<Bytes, io::Error>> = tasks
            .iter()
            .map(|task| {
                serde_json::to_vec(task)
                    .map(|mut line| {
                        line.push(b'\n');
                        Bytes::from(line)
                    })
                    .map_err(io::Error::other)
            })
            .collect();
        Ok(Reply::stream(futures_util::stream::iter(lines)))
    }

    async fn purge(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        require_admin(inv.identity(), "TaskService.PurgeAllTasksAsync")?;

        let purged = self.tasks.purge().await?;
        tracing::warn!(purged, caller = %inv.identity().log_id(), "all tasks purged");
        Reply::json(&json!({ "purged": purged }))
    }

    async fn all_owned(&self, inv: &Invocation) -> KairosResult<Vec<Task>> {
        let query = TaskQuery {
            status: None,
            page: 1,
            page_size: usize::MAX,
        };
        self.tasks.list_by_owner(inv.caller_id()?, query).await
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl Service for TaskService {
    const NAME: &'static str = "TaskService";

    fn register(table: &mut MethodTable<Self>) {
        let task_id = || ParameterDescriptor::string("taskId");

        table
            .protected(
                "CreateTaskAsync",
                vec![
                    ParameterDescriptor::complex::<NewTask>("task"),
                    ParameterDescriptor::injected("caller"),
                ],
                Self::create,
            )
            .protected("GetTaskAsync", vec![task_id()], Self::get)
            .protected(
                "ListTasksAsync",
                vec![
                    ParameterDescriptor::string("status").optional(),
                    ParameterDescriptor::integer("page").with_default(1),
                    ParameterDescriptor::integer("pageSize").with_default(20),
                ],
                Self::list,
            )
            .protected(
                "UpdateTaskAsync",
                vec![task_id(), ParameterDescriptor::complex::<TaskChanges>("changes")],
                Self::update,
            )
            .protected("CompleteTaskAsync", vec![task_id()], Self::complete)
            .protected("DeleteTaskAsync", vec![task_id()], Self::delete)
            .protected("ExportTasksCsv", Vec::new(), Self::export_csv)
            .protected("ExportTasksArchive", Vec::new(), Self::export_archive)
            .protected("PurgeAllTasksAsync", Vec::new(), Self::purge);
    }
}
