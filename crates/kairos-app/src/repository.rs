//! Persistence.
//!
//! Services only see the [`TaskRepository`] and [`UserRepository`] traits.
//! The in-memory implementations keep everything behind a
//! `parking_lot::RwLock` and are what the binary runs with.

use std::collections::HashMap;

use async_trait::async_trait;
use kairos_core::{KairosError, KairosResult};
use parking_lot::RwLock;

use crate::models::{Task, TaskStatus, User};

/// Filter and page for task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskQuery {
    /// Only tasks with this status.
    pub status: Option<TaskStatus>,
    /// 1-based page number.
    pub page: usize,
    /// Tasks per page.
    pub page_size: usize,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            status: None,
            page: 1,
            page_size: 20,
        }
    }
}

/// Task storage.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task.
    async fn insert(&self, task: Task) -> KairosResult<Task>;

    /// Fetches a task by id.
    async fn get(&self, id: &str) -> KairosResult<Option<Task>>;

    /// Lists an owner's tasks, oldest first.
    async fn list_by_owner(&self, owner_id: &str, query: TaskQuery) -> KairosResult<Vec<Task>>;

    /// Replaces a stored task.
    async fn update(&self, task: Task) -> KairosResult<Task>;

    /// Deletes a task. Returns `false` if it did not exist.
    async fn delete(&self, id: &str) -> KairosResult<bool>;

    /// Deletes every task and returns how many there were.
    async fn purge(&self) -> KairosResult<usize>;
}

/// Account storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Stores a new account. Emails are unique, compared case-insensitively.
    async fn insert(&self, user: User) -> KairosResult<User>;

    /// Fetches an account by id.
    async fn get(&self, id: &str) -> KairosResult<Option<User>>;

    /// Fetches an account by email.
    async fn find_by_email(&self, email: &str) -> KairosResult<Option<User>>;

    /// Lists every account, oldest first.
    async fn list(&self) -> KairosResult<Vec<User>>;
}

/// [`TaskRepository`] held in memory.
#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryTaskRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks.
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn insert(&self, task: Task) -> KairosResult<Task> {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&task.id) {
            return Err(KairosError::conflict(format!("task already exists: {}", task.id)));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn get(&self, id: &str) -> KairosResult<Option<Task>> {
        Ok(self.tasks.read().get(id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str, query: TaskQuery) -> KairosResult<Vec<Task>> {
        let mut owned: Vec<Task> = self
            .tasks
            .read()
            .values()
            .filter(|t| t.owner_id == owner_id)
            .filter(|t| query.status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        // UUID v7 ids sort by creation time.
        owned.sort_by(|a, b| a.id.cmp(&b.id));

        let skip = query.page.saturating_sub(1).saturating_mul(query.page_size);
        Ok(owned.into_iter().skip(skip).take(query.page_size).collect())
    }

    async fn update(&self, task: Task) -> KairosResult<Task> {
        let mut tasks = self.tasks.write();
        match tasks.get_mut(&task.id) {
            Some(stored) => {
                *stored = task.clone();
                Ok(task)
            }
            None => Err(KairosError::not_found_resource("task", task.id)),
        }
    }

    async fn delete(&self, id: &str) -> KairosResult<bool> {
        Ok(self.tasks.write().remove(id).is_some())
    }

    async fn purge(&self) -> KairosResult<usize> {
        let mut tasks = self.tasks.write();
        let count = tasks.len();
        tasks.clear();
        Ok(count)
    }
}

/// [`UserRepository`] held in memory.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: User) -> KairosResult<User> {
        let mut users = self.users.write();
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(KairosError::conflict(format!("email already registered: {}", user.email)));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get(&self, id: &str) -> KairosResult<Option<User>> {
        Ok(self.users.read().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> KairosResult<Option<User>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list(&self) -> KairosResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Utc;
    use kairos_core::ErrorCategory;
    use uuid::Uuid;

    fn task(owner: &str, status: TaskStatus) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::now_v7().to_string(),
            owner_id: owner.to_string(),
            title: "t".to_string(),
            description: None,
            status,
            priority: 0,
            due_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn user(email: &str) -> User {
        User {
            id: Uuid::now_v7().to_string(),
            email: email.to_string(),
            name: "n".to_string(),
            role: Role::Member,
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_list_filters_owner_and_status() {
        let repo = InMemoryTaskRepository::new();
        repo.insert(task("a", TaskStatus::Todo)).await.unwrap();
        repo.insert(task("a", TaskStatus::Done)).await.unwrap();
        repo.insert(task("b", TaskStatus::Todo)).await.unwrap();

        let all = repo.list_by_owner("a", TaskQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let done = repo
            .list_by_owner(
                "a",
                TaskQuery {
                    status: Some(TaskStatus::Done),
                    ..TaskQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_list_pages() {
        let repo = InMemoryTaskRepository::new();
        for _ in 0..5 {
            repo.insert(task("a", TaskStatus::Todo)).await.unwrap();
        }
        let query = |page| TaskQuery {
            status: None,
            page,
            page_size: 2,
        };
        assert_eq!(repo.list_by_owner("a", query(1)).await.unwrap().len(), 2);
        assert_eq!(repo.list_by_owner("a", query(3)).await.unwrap().len(), 1);
        assert!(repo.list_by_owner("a", query(4)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_task() {
        let repo = InMemoryTaskRepository::new();
        let err = repo.update(task("a", TaskStatus::Todo)).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn test_delete_and_purge() {
        let repo = InMemoryTaskRepository::new();
        let t = repo.insert(task("a", TaskStatus::Todo)).await.unwrap();
        repo.insert(task("b", TaskStatus::Todo)).await.unwrap();

        assert!(repo.delete(&t.id).await.unwrap());
        assert!(!repo.delete(&t.id).await.unwrap());
        assert_eq!(repo.purge().await.unwrap(), 1);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.insert(user("ada@example.com")).await.unwrap();
        let err = repo.insert(user("ADA@example.com")).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert!(repo.find_by_email("Ada@Example.com").await.unwrap().is_some());
    }
}
