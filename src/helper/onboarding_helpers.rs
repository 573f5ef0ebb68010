use crate::helper::notification_helpers::{self, NotificationError};
use crate::helper::sanitization_helpers::clean_optional;
use crate::models::db_operations::onboarding_db_operations;
use crate::models::{OnboardingStep, OnboardingTask, OnboardingTemplate, PortalUser, TemplateStep, TemplateTask};
use crate::onboarding::{calculate_progress, InvalidTaskStatus, TaskStatus};
use crate::permissions::ModuleKey;
use crate::DbPool;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OnboardingError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Task not found: {0}")]
    NotFound(String),
    #[error("You do not have permission for this onboarding action.")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    InvalidStatus(#[from] InvalidTaskStatus),
}

#[derive(Debug, Serialize)]
pub struct OnboardingOverview {
    pub organization_id: String,
    pub steps: Vec<OnboardingStep>,
    pub tasks: Vec<OnboardingTask>,
    pub progress: u8,
}

#[derive(Debug, Deserialize, Default)]
pub struct TaskDetailsPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
}

/// Clients always see their own organization. Admins must name one.
fn resolve_organization(user: &PortalUser, requested: Option<&str>) -> Result<String, OnboardingError> {
    let org = match user.data_scope() {
        None => requested,
        Some(own) => Some(own),
    };
    org.filter(|o| !o.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| OnboardingError::Validation("An organization is required.".to_string()))
}

pub fn overview(pool: &DbPool, user: &PortalUser, requested: Option<&str>) -> Result<OnboardingOverview, OnboardingError> {
    if !user.can_use(ModuleKey::Onboarding) {
        return Err(OnboardingError::Forbidden);
    }
    let organization_id = resolve_organization(user, requested)?;
    let conn = pool.get()?;
    let steps = onboarding_db_operations::list_steps(&conn, &organization_id)?;
    let tasks = onboarding_db_operations::list_tasks(&conn, &organization_id)?;
    let progress = calculate_progress(&tasks);
    Ok(OnboardingOverview { organization_id, steps, tasks, progress })
}

fn read_visible_task(pool: &DbPool, user: &PortalUser, task_id: &str) -> Result<OnboardingTask, OnboardingError> {
    let conn = pool.get()?;
    onboarding_db_operations::read_task(&conn, task_id)?
        .filter(|task| user.data_scope().map_or(true, |own| own == task.organization_id))
        .ok_or_else(|| OnboardingError::NotFound(task_id.to_string()))
}

/// Moving a task to `done` emits a `task_completed` notification for its
/// organization. A failed notification is logged, the status change stands.
pub fn update_task_status(
    pool: &DbPool,
    user: &PortalUser,
    task_id: &str,
    raw_status: &str,
) -> Result<OnboardingTask, OnboardingError> {
    if !user.can_use(ModuleKey::Onboarding) {
        return Err(OnboardingError::Forbidden);
    }
    let status: TaskStatus = raw_status.trim().parse()?;
    let mut task = read_visible_task(pool, user, task_id)?;
    let previous = task.status;
    {
        let conn = pool.get()?;
        onboarding_db_operations::update_task_status(&conn, &task.id, status)?;
    }
    task.status = status;

    if status == TaskStatus::Done && previous != TaskStatus::Done {
        let emitted: Result<_, NotificationError> = notification_helpers::emit(
            pool,
            "task_completed",
            &format!("Tarefa concluída: {}", task.title),
            task.description.clone(),
            Some(&task.organization_id),
        );
        if let Err(e) = emitted {
            log::error!("Failed to emit task_completed for task {}: {}", task.id, e);
        }
    }
    Ok(task)
}

pub fn update_task_details(
    pool: &DbPool,
    user: &PortalUser,
    task_id: &str,
    patch: TaskDetailsPatch,
) -> Result<OnboardingTask, OnboardingError> {
    if !user.access_level().can_manage_clients() {
        return Err(OnboardingError::Forbidden);
    }
    let due_date = clean_optional(patch.due_date.as_deref());
    if let Some(date) = &due_date {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| OnboardingError::Validation(format!("Invalid due date '{}', expected YYYY-MM-DD.", date)))?;
    }
    let title = clean_optional(patch.title.as_deref());
    let description = clean_optional(patch.description.as_deref());

    let conn = pool.get()?;
    let updated = onboarding_db_operations::update_task_details(
        &conn,
        task_id,
        title.as_deref(),
        description.as_deref(),
        due_date.as_deref(),
    )?;
    if updated == 0 {
        return Err(OnboardingError::NotFound(task_id.to_string()));
    }
    onboarding_db_operations::read_task(&conn, task_id)?.ok_or_else(|| OnboardingError::NotFound(task_id.to_string()))
}

fn sanitize_template(template: OnboardingTemplate) -> Result<OnboardingTemplate, OnboardingError> {
    let mut steps = Vec::with_capacity(template.steps.len());
    for step in template.steps {
        let title = clean_optional(Some(&step.title))
            .ok_or_else(|| OnboardingError::Validation("Every step needs a title.".to_string()))?;
        let tasks = step
            .tasks
            .into_iter()
            .filter_map(|task| {
                clean_optional(Some(&task.title)).map(|title| TemplateTask {
                    title,
                    description: clean_optional(task.description.as_deref()),
                })
            })
            .collect();
        steps.push(TemplateStep { title, tasks });
    }
    if steps.is_empty() {
        return Err(OnboardingError::Validation("Template has no steps.".to_string()));
    }
    Ok(OnboardingTemplate { name: template.name, steps })
}

pub fn apply_template(
    pool: &DbPool,
    user: &PortalUser,
    organization_id: &str,
    template: OnboardingTemplate,
) -> Result<Vec<OnboardingStep>, OnboardingError> {
    if !user.access_level().can_manage_clients() {
        return Err(OnboardingError::Forbidden);
    }
    let organization_id = organization_id.trim();
    if organization_id.is_empty() {
        return Err(OnboardingError::Validation("An organization is required.".to_string()));
    }
    let template = sanitize_template(template)?;
    let mut conn = pool.get()?;
    let steps = onboarding_db_operations::apply_template(&mut conn, organization_id, &template)?;
    log::info!(
        "Applied onboarding template '{}' to organization {} ({} steps).",
        template.name,
        organization_id,
        steps.len()
    );
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::notification_helpers::{list_for_user, ListMode, ReceiptCache};
    use crate::models::db_operations::users_db_operations::{read_user_by_id, tests::{add_user, test_pool}};
    use crate::permissions::UserRole;
    use chrono::Duration;
    use std::sync::RwLock;

    fn user(pool: &DbPool, username: &str, role: UserRole, org: Option<&str>) -> PortalUser {
        let conn = pool.get().unwrap();
        let id = add_user(&conn, username, role, org);
        read_user_by_id(&conn, id).unwrap().unwrap()
    }

    fn kickoff() -> OnboardingTemplate {
        OnboardingTemplate {
            name: "Kickoff".to_string(),
            steps: vec![TemplateStep {
                title: "Acessos".to_string(),
                tasks: vec![
                    TemplateTask { title: "Instagram".to_string(), description: None },
                    TemplateTask { title: "<b>LinkedIn</b>".to_string(), description: None },
                    TemplateTask { title: "   ".to_string(), description: None },
                ],
            }],
        }
    }

    #[test]
    fn clients_see_their_own_organization() {
        let pool = test_pool();
        let admin = user(&pool, "root", UserRole::InternalAdmin, None);
        let client = user(&pool, "ana", UserRole::ClientOwner, Some("org-a"));
        apply_template(&pool, &admin, "org-a", kickoff()).unwrap();

        let view = overview(&pool, &client, Some("org-b")).unwrap();
        assert_eq!(view.organization_id, "org-a");
        assert_eq!(view.steps.len(), 1);
        let titles: Vec<&str> = view.tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Instagram", "LinkedIn"]);
        assert_eq!(view.progress, 0);

        assert!(matches!(overview(&pool, &admin, None), Err(OnboardingError::Validation(_))));
        assert_eq!(overview(&pool, &admin, Some("org-a")).unwrap().tasks.len(), 2);
    }

    #[test]
    fn completing_a_task_updates_progress_and_notifies() {
        let pool = test_pool();
        let admin = user(&pool, "root", UserRole::InternalAdmin, None);
        let client = user(&pool, "ana", UserRole::ClientUser, Some("org-a"));
        apply_template(&pool, &admin, "org-a", kickoff()).unwrap();
        let task_id = overview(&pool, &client, None).unwrap().tasks[0].id.clone();

        let task = update_task_status(&pool, &client, &task_id, "done").unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(overview(&pool, &client, None).unwrap().progress, 50);

        let cache = RwLock::new(ReceiptCache::new(Duration::hours(1)));
        let notes = list_for_user(&pool, &cache, &client, ListMode::All).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].r#type, "task_completed");
        assert_eq!(notes[0].organization_id.as_deref(), Some("org-a"));

        // Already done: no second notification.
        update_task_status(&pool, &client, &task_id, "done").unwrap();
        assert_eq!(list_for_user(&pool, &cache, &client, ListMode::All).unwrap().len(), 1);
    }

    #[test]
    fn foreign_tasks_and_bad_statuses_are_rejected() {
        let pool = test_pool();
        let admin = user(&pool, "root", UserRole::InternalAdmin, None);
        let outsider = user(&pool, "bob", UserRole::ClientOwner, Some("org-b"));
        apply_template(&pool, &admin, "org-a", kickoff()).unwrap();
        let task_id = overview(&pool, &admin, Some("org-a")).unwrap().tasks[0].id.clone();

        assert!(matches!(
            update_task_status(&pool, &outsider, &task_id, "done"),
            Err(OnboardingError::NotFound(_))
        ));
        assert!(matches!(
            update_task_status(&pool, &admin, &task_id, "finished"),
            Err(OnboardingError::InvalidStatus(_))
        ));
    }

    #[test]
    fn unknown_roles_cannot_touch_onboarding() {
        let pool = test_pool();
        let admin = user(&pool, "root", UserRole::InternalAdmin, None);
        apply_template(&pool, &admin, "org-a", kickoff()).unwrap();
        let task_id = overview(&pool, &admin, Some("org-a")).unwrap().tasks[0].id.clone();
        let stranger = PortalUser { role: "freelancer".to_string(), organization_id: Some("org-a".to_string()), ..admin.clone() };

        assert!(matches!(overview(&pool, &stranger, None), Err(OnboardingError::Forbidden)));
        assert!(matches!(
            update_task_status(&pool, &stranger, &task_id, "done"),
            Err(OnboardingError::Forbidden)
        ));
        let view = overview(&pool, &admin, Some("org-a")).unwrap();
        assert_eq!(view.progress, 0);

        let cache = RwLock::new(ReceiptCache::new(Duration::hours(1)));
        assert!(list_for_user(&pool, &cache, &admin, ListMode::All).unwrap().is_empty());
    }

    #[test]
    fn admin_edits_validate_due_dates() {
        let pool = test_pool();
        let admin = user(&pool, "root", UserRole::InternalAdmin, None);
        let client = user(&pool, "ana", UserRole::ClientOwner, Some("org-a"));
        apply_template(&pool, &admin, "org-a", kickoff()).unwrap();
        let task_id = overview(&pool, &admin, Some("org-a")).unwrap().tasks[0].id.clone();

        let patch = || TaskDetailsPatch { title: Some("Instagram Business".to_string()), description: None, due_date: Some("2024-07-01".to_string()) };
        assert!(matches!(update_task_details(&pool, &client, &task_id, patch()), Err(OnboardingError::Forbidden)));

        let edited = update_task_details(&pool, &admin, &task_id, patch()).unwrap();
        assert_eq!(edited.title, "Instagram Business");
        assert_eq!(edited.due_date.as_deref(), Some("2024-07-01"));

        let bad = TaskDetailsPatch { due_date: Some("01/07/2024".to_string()), ..Default::default() };
        assert!(matches!(update_task_details(&pool, &admin, &task_id, bad), Err(OnboardingError::Validation(_))));
        assert!(matches!(
            update_task_details(&pool, &admin, "missing", TaskDetailsPatch::default()),
            Err(OnboardingError::NotFound(_))
        ));
    }

    #[test]
    fn templates_need_admin_organization_and_steps() {
        let pool = test_pool();
        let admin = user(&pool, "root", UserRole::InternalAdmin, None);
        let client = user(&pool, "ana", UserRole::ClientOwner, Some("org-a"));
        assert!(matches!(apply_template(&pool, &client, "org-a", kickoff()), Err(OnboardingError::Forbidden)));
        assert!(matches!(apply_template(&pool, &admin, " ", kickoff()), Err(OnboardingError::Validation(_))));
        let empty = OnboardingTemplate { name: "Empty".to_string(), steps: Vec::new() };
        assert!(matches!(apply_template(&pool, &admin, "org-a", empty), Err(OnboardingError::Validation(_))));
    }
}
