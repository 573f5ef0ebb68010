use crate::models::OnboardingTask;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid task status: '{0}'")]
pub struct InvalidTaskStatus(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = InvalidTaskStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "review" => Ok(TaskStatus::Review),
            "done" => Ok(TaskStatus::Done),
            other => Err(InvalidTaskStatus(other.to_string())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage of tasks marked done, rounded half up. Zero when empty.
pub fn calculate_progress(tasks: &[OnboardingTask]) -> u8 {
    if tasks.is_empty() {
        return 0;
    }
    let total = tasks.len();
    let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
    ((done * 200 + total) / (2 * total)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, status: TaskStatus) -> OnboardingTask {
        OnboardingTask {
            id: id.to_string(),
            title: format!("Task {id}"),
            description: None,
            status,
            due_date: None,
            step_id: "step-1".to_string(),
            organization_id: "org-a".to_string(),
        }
    }

    #[test]
    fn empty_checklist_has_no_progress() {
        assert_eq!(calculate_progress(&[]), 0);
    }

    #[test]
    fn one_of_three_done_rounds_to_33() {
        let tasks = vec![
            task("1", TaskStatus::Done),
            task("2", TaskStatus::Pending),
            task("3", TaskStatus::Review),
        ];
        assert_eq!(calculate_progress(&tasks), 33);
    }

    #[test]
    fn halves_round_up() {
        let mut tasks: Vec<_> = (0..8).map(|i| task(&i.to_string(), TaskStatus::Pending)).collect();
        tasks[0].status = TaskStatus::Done;
        assert_eq!(calculate_progress(&tasks), 13);
        tasks[1].status = TaskStatus::Done;
        tasks[2].status = TaskStatus::Done;
        assert_eq!(calculate_progress(&tasks), 38);
    }

    #[test]
    fn all_done_is_complete() {
        let tasks = vec![task("1", TaskStatus::Done), task("2", TaskStatus::Done)];
        assert_eq!(calculate_progress(&tasks), 100);
    }

    #[test]
    fn review_is_not_done() {
        assert_eq!(calculate_progress(&[task("1", TaskStatus::Review)]), 0);
        assert!("reviewing".parse::<TaskStatus>().is_err());
    }
}
