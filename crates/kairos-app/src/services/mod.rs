//! Services exposed through dynamic dispatch.
//!
//! | Service       | Methods                                                    |
//! |---------------|------------------------------------------------------------|
//! | `TaskService` | task CRUD, CSV and JSON-lines export, admin purge          |
//! | `UserService` | registration, login, profile, admin user listing, ping     |
//! | `AiService`   | subtask suggestions and summaries from a completion provider |
//!
//! Access levels are declared next to each method. Role and ownership checks
//! happen inside the methods and fail with `AccessDenied`.

mod ai;
mod task;
mod user;

pub use ai::AiService;
pub use task::TaskService;
pub use user::UserService;

use kairos_core::{CallerIdentity, KairosError, KairosResult};

use crate::models::Task;
use crate::repository::TaskRepository;

/// Loads a task the caller may see: their own, or any task for admins.
async fn load_owned(
    tasks: &dyn TaskRepository,
    task_id: &str,
    caller: &CallerIdentity,
    operation: &str,
) -> KairosResult<Task> {
    let task = tasks
        .get(task_id)
        .await?
        .ok_or_else(|| KairosError::not_found_resource("task", task_id))?;

    if caller.is_admin() || caller.user_id() == Some(task.owner_id.as_str()) {
        Ok(task)
    } else {
        Err(KairosError::access_denied_for("task belongs to another user", operation))
    }
}

fn require_admin(caller: &CallerIdentity, operation: &str) -> KairosResult<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(KairosError::access_denied_for("admin role required", operation))
    }
}
