use crate::models::{OnboardingStep, OnboardingTask, OnboardingTemplate};
use crate::onboarding::TaskStatus;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, title, description, status, due_date, step_id, organization_id";

fn map_task(row: &Row) -> rusqlite::Result<OnboardingTask> {
    let status: String = row.get(3)?;
    Ok(OnboardingTask {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: status
            .parse()
            .map_err(|e| RusqliteError::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?,
        due_date: row.get(4)?,
        step_id: row.get(5)?,
        organization_id: row.get(6)?,
    })
}

pub fn insert_step(
    conn: &Connection,
    organization_id: &str,
    title: &str,
    position: i64,
) -> Result<OnboardingStep, RusqliteError> {
    let step = OnboardingStep { id: Uuid::new_v4().to_string(), title: title.to_string(), position };
    conn.execute(
        "INSERT INTO onboarding_steps (id, organization_id, title, position) VALUES (?1, ?2, ?3, ?4)",
        params![step.id, organization_id, step.title, step.position],
    )?;
    Ok(step)
}

pub fn insert_task(
    conn: &Connection,
    step_id: &str,
    organization_id: &str,
    title: &str,
    description: Option<&str>,
    due_date: Option<&str>,
) -> Result<OnboardingTask, RusqliteError> {
    let task = OnboardingTask {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        description: description.map(str::to_string),
        status: TaskStatus::Pending,
        due_date: due_date.map(str::to_string),
        step_id: step_id.to_string(),
        organization_id: organization_id.to_string(),
    };
    conn.execute(
        "INSERT INTO onboarding_tasks (id, step_id, organization_id, title, description, status, due_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            task.id,
            task.step_id,
            task.organization_id,
            task.title,
            task.description,
            task.status.as_str(),
            task.due_date
        ],
    )?;
    Ok(task)
}

pub fn list_steps(conn: &Connection, organization_id: &str) -> Result<Vec<OnboardingStep>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, position FROM onboarding_steps WHERE organization_id = ?1 ORDER BY position, rowid",
    )?;
    let steps = stmt
        .query_map([organization_id], |row| {
            Ok(OnboardingStep { id: row.get(0)?, title: row.get(1)?, position: row.get(2)? })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(steps)
}

/// Tasks by due date, undated tasks last.
pub fn list_tasks(conn: &Connection, organization_id: &str) -> Result<Vec<OnboardingTask>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM onboarding_tasks WHERE organization_id = ?1
         ORDER BY due_date IS NULL, due_date, rowid"
    ))?;
    let tasks = stmt
        .query_map([organization_id], map_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

pub fn read_task(conn: &Connection, task_id: &str) -> Result<Option<OnboardingTask>, RusqliteError> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM onboarding_tasks WHERE id = ?1"),
        [task_id],
        map_task,
    )
    .optional()
}

pub fn update_task_status(conn: &Connection, task_id: &str, status: TaskStatus) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE onboarding_tasks SET status = ?1 WHERE id = ?2",
        params![status.as_str(), task_id],
    )
}

/// `None` keeps the stored value.
pub fn update_task_details(
    conn: &Connection,
    task_id: &str,
    title: Option<&str>,
    description: Option<&str>,
    due_date: Option<&str>,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE onboarding_tasks SET
             title = COALESCE(?1, title),
             description = COALESCE(?2, description),
             due_date = COALESCE(?3, due_date)
         WHERE id = ?4",
        params![title, description, due_date, task_id],
    )
}

/// Materialises a template for an organization in one transaction. Steps
/// are positioned after any existing ones, tasks start `pending`.
pub fn apply_template(
    conn: &mut Connection,
    organization_id: &str,
    template: &OnboardingTemplate,
) -> Result<Vec<OnboardingStep>, RusqliteError> {
    let tx = conn.transaction()?;
    let next_position: i64 = tx.query_row(
        "SELECT COALESCE(MAX(position), 0) FROM onboarding_steps WHERE organization_id = ?1",
        [organization_id],
        |row| row.get(0),
    )?;

    let mut steps = Vec::with_capacity(template.steps.len());
    for (offset, template_step) in template.steps.iter().enumerate() {
        let step = insert_step(&tx, organization_id, &template_step.title, next_position + 1 + offset as i64)?;
        for template_task in &template_step.tasks {
            insert_task(
                &tx,
                &step.id,
                organization_id,
                &template_task.title,
                template_task.description.as_deref(),
                None,
            )?;
        }
        steps.push(step);
    }
    tx.commit()?;
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::users_db_operations::tests::portal_conn;
    use crate::models::{TemplateStep, TemplateTask};

    fn template() -> OnboardingTemplate {
        OnboardingTemplate {
            name: "Kickoff".to_string(),
            steps: vec![
                TemplateStep {
                    title: "Acessos".to_string(),
                    tasks: vec![
                        TemplateTask { title: "Instagram".to_string(), description: None },
                        TemplateTask { title: "LinkedIn".to_string(), description: Some("Admin da página".to_string()) },
                    ],
                },
                TemplateStep {
                    title: "Briefing".to_string(),
                    tasks: vec![TemplateTask { title: "Formulário".to_string(), description: None }],
                },
            ],
        }
    }

    #[test]
    fn template_creates_ordered_steps_with_pending_tasks() {
        let mut conn = portal_conn();
        apply_template(&mut conn, "org-a", &template()).unwrap();

        let steps = list_steps(&conn, "org-a").unwrap();
        let titles: Vec<&str> = steps.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Acessos", "Briefing"]);
        assert_eq!(steps[0].position, 1);

        let tasks = list_tasks(&conn, "org-a").unwrap();
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));
        assert!(list_tasks(&conn, "org-b").unwrap().is_empty());
    }

    #[test]
    fn reapplying_appends_after_existing_steps() {
        let mut conn = portal_conn();
        apply_template(&mut conn, "org-a", &template()).unwrap();
        let second = apply_template(&mut conn, "org-a", &template()).unwrap();
        assert_eq!(second[0].position, 3);
    }

    #[test]
    fn undated_tasks_sort_last() {
        let conn = portal_conn();
        let step = insert_step(&conn, "org-a", "Step", 1).unwrap();
        insert_task(&conn, &step.id, "org-a", "undated", None, None).unwrap();
        insert_task(&conn, &step.id, "org-a", "later", None, Some("2024-06-10")).unwrap();
        insert_task(&conn, &step.id, "org-a", "sooner", None, Some("2024-06-01")).unwrap();
        let titles: Vec<String> = list_tasks(&conn, "org-a").unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["sooner", "later", "undated"]);
    }

    #[test]
    fn details_update_keeps_unspecified_fields() {
        let conn = portal_conn();
        let step = insert_step(&conn, "org-a", "Step", 1).unwrap();
        let task = insert_task(&conn, &step.id, "org-a", "Old", Some("desc"), None).unwrap();
        update_task_details(&conn, &task.id, Some("New"), None, Some("2024-07-01")).unwrap();
        update_task_status(&conn, &task.id, TaskStatus::Review).unwrap();

        let stored = read_task(&conn, &task.id).unwrap().unwrap();
        assert_eq!(stored.title, "New");
        assert_eq!(stored.description.as_deref(), Some("desc"));
        assert_eq!(stored.due_date.as_deref(), Some("2024-07-01"));
        assert_eq!(stored.status, TaskStatus::Review);
    }
}
