//! `AiService`.

use std::fmt::Write as _;
use std::sync::Arc;

use kairos_core::{KairosError, KairosResult};
use kairos_dispatch::{Invocation, MethodTable, ParameterDescriptor, Reply, Service};

use super::load_owned;
use crate::ai::CompletionProvider;
use crate::models::{Suggestion, TaskStatus};
use crate::repository::{TaskQuery, TaskRepository};

/// Most suggestions one call may ask for.
pub const MAX_SUGGESTIONS: i64 = 10;

const SUBTASK_PROMPT: &str = "You break tasks into small, concrete subtasks. \
Answer with one subtask per line and nothing else.";

const SUMMARY_PROMPT: &str = "You summarize a to-do list in two or three sentences. \
Mention what looks most urgent.";

/// AI-assisted task planning.
///
/// The completion provider is an injected dependency resolved from the
/// registry's container.
pub struct AiService {
    tasks: Arc<dyn TaskRepository>,
}

impl std::fmt::Debug for AiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiService").finish_non_exhaustive()
    }
}

impl AiService {
    /// Creates the service.
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self { tasks }
    }

    async fn suggest(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let task_id: String = inv.arg("taskId")?;
        let max: i64 = inv.arg("maxSuggestions")?;
        if !(1..=MAX_SUGGESTIONS).contains(&max) {
            return Err(KairosError::validation(format!(
                "maxSuggestions must be between 1 and {MAX_SUGGESTIONS}"
            )));
        }

        let task = load_owned(self.tasks.as_ref(), &task_id, inv.identity(), "AiService.SuggestSubtasksAsync").await?;
        let provider = inv.inject::<dyn CompletionProvider>()?;

        let mut prompt = format!("Task: {}\n", task.title);
        if let Some(description) = &task.description {
            let _ = writeln!(prompt, "Details: {description}");
        }
        let _ = write!(prompt, "Suggest at most {max} subtasks.");

        let answer = provider.complete(SUBTASK_PROMPT, &prompt).await?;
        let suggestions = parse_suggestions(&answer, usize::try_from(max).unwrap_or(0));
        tracing::debug!(task_id = %task.id, count = suggestions.len(), "subtasks suggested");
        Reply::json(&suggestions)
    }

    async fn summarize(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let owner = inv.caller_id()?.to_string();
        let provider = inv.inject::<dyn CompletionProvider>()?;
        let tasks = Arc::clone(&self.tasks);

        // The provider round trip runs when the response stage awaits the reply.
        Ok(Reply::deferred(async move {
            let query = TaskQuery {
                status: None,
                page: 1,
                page_size: usize::MAX,
            };
            let open: Vec<_> = tasks
                .list_by_owner(&owner, query)
                .await?
                .into_iter()
                .filter(|t| t.status != TaskStatus::Done)
                .collect();

            if open.is_empty() {
                return Ok(Reply::text("No open tasks."));
            }

            let mut prompt = String::new();
            for task in &open {
                let due = task.due_date.map(|d| format!(" (due {})", d.date_naive())).unwrap_or_default();
                let _ = writeln!(prompt, "- [{}] {}{due}", task.status, task.title);
            }

            let summary = provider.complete(SUMMARY_PROMPT, &prompt).await?;
            Ok(Reply::text(summary.trim().to_string()))
        }))
    }
}

/// Turns a completion into at most `max` suggestions, dropping list markers.
fn parse_suggestions(answer: &str, max: usize) -> Vec<Suggestion> {
    answer
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '-' | '*' | '.' | ')'))
                .trim()
        })
        .filter(|line| !line.is_empty())
        .take(max)
        .map(|title| Suggestion {
            title: title.to_string(),
        })
        .collect()
}

impl Service for AiService {
    const NAME: &'static str = "AiService";

    fn register(table: &mut MethodTable<Self>) {
        table
            .protected(
                "SuggestSubtasksAsync",
                vec![
                    ParameterDescriptor::string("taskId"),
                    ParameterDescriptor::integer("maxSuggestions").with_default(5),
                    ParameterDescriptor::injected("provider"),
                ],
                Self::suggest,
            )
            .protected(
                "SummarizeTasksAsync",
                vec![ParameterDescriptor::injected("provider")],
                Self::summarize,
            );
    }
}
