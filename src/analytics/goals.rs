use chrono::{DateTime, Utc};

use crate::analytics::types::GoalSummary;
use crate::analytics::util::{is_overdue, percent};
use crate::error::Result;
use crate::model::{GoalWithTasks, Priority, TaskRecord};
use crate::query::builder::{GoalField, GoalQuery, TaskField, TaskQuery};
use crate::query::scope::{DateRange, DepartmentAttribution, ScopeFilter};
use crate::query::AnalyticsStore;

/// Progress of each goal in scope.
///
/// Department scope selects goals owned by the department. City or team
/// scope selects goals that have at least one task assigned into that city
/// or team; a department given alongside narrows those goals further. Task
/// counts only include tasks created within `range`.
pub async fn goal_summary<S: AnalyticsStore + ?Sized>(
    store: &S,
    scope: &ScopeFilter,
    range: &DateRange,
) -> Result<Vec<GoalSummary>> {
    let mut query = GoalQuery::new().with_tasks();

    if scope.needs_team_join() {
        let team_scope = ScopeFilter {
            department_id: None,
            ..scope.clone()
        };
        let linked = store
            .fetch_tasks(
                &TaskQuery::new()
                    .filter_not_null(TaskField::GoalId)
                    .scoped(&team_scope, DepartmentAttribution::Direct),
            )
            .await?;
        let goal_ids = distinct_goal_ids(&linked);
        if goal_ids.is_empty() {
            return Ok(Vec::new());
        }
        query = query.filter_in(GoalField::Id, goal_ids);
    }
    if let Some(ref dept) = scope.department_id {
        query = query.filter_eq(GoalField::DepartmentId, dept);
    }

    let goals = store.fetch_goals(&query).await?;
    let now = Utc::now();
    Ok(goals
        .iter()
        .map(|g| summarize_goal(g, range, now))
        .collect())
}

/// Goal ids referenced by `tasks`, first-seen order.
fn distinct_goal_ids(tasks: &[TaskRecord]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in tasks.iter().filter_map(|t| t.goal_id.as_ref()) {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    ids
}

pub fn summarize_goal(goal: &GoalWithTasks, range: &DateRange, now: DateTime<Utc>) -> GoalSummary {
    let mut total = 0;
    let mut completed = 0;
    let mut at_risk = 0;
    for task in goal.tasks.iter().filter(|t| range.contains(t.created_at)) {
        total += 1;
        if task.is_completed() {
            completed += 1;
        } else if is_overdue(task, now) || task.priority == Some(Priority::Urgent) {
            at_risk += 1;
        }
    }
    GoalSummary {
        goal: goal.goal.clone(),
        total_tasks: total,
        completed_tasks: completed,
        at_risk_tasks: at_risk,
        progress_percent: percent(completed, total),
    }
}
