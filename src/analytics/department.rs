use chrono::{DateTime, Utc};

use crate::analytics::types::DepartmentClosureMetric;
use crate::analytics::util::{closure_hours, is_overdue, mean, median, OrderedGroups};
use crate::error::Result;
use crate::model::TaskRecord;
use crate::query::builder::{TaskField, TaskQuery};
use crate::query::scope::{DateRange, DepartmentAttribution, ScopeFilter};
use crate::query::AnalyticsStore;

/// Per-department closure metrics keyed by the task's own department.
///
/// A department-only scope keeps unassigned tasks. City or team scope adds
/// the assignee team join and drops them.
pub async fn department_closure_times<S: AnalyticsStore + ?Sized>(
    store: &S,
    scope: &ScopeFilter,
    range: &DateRange,
) -> Result<Vec<DepartmentClosureMetric>> {
    let query = TaskQuery::new()
        .filter_not_null(TaskField::DepartmentId)
        .scoped(scope, DepartmentAttribution::Direct)
        .filter_range(TaskField::CreatedAt, range);
    let tasks = store.fetch_tasks(&query).await?;
    Ok(summarize_department_closure(&tasks, Utc::now()))
}

pub fn summarize_department_closure(
    tasks: &[TaskRecord],
    now: DateTime<Utc>,
) -> Vec<DepartmentClosureMetric> {
    struct Tally {
        name: String,
        completed: u64,
        hours: Vec<f64>,
        overdue: u64,
    }

    let mut groups = OrderedGroups::new();
    for task in tasks {
        let Some(dept_id) = task.department_id.as_deref() else {
            continue;
        };
        let tally = groups.get_or_insert_with(dept_id, || Tally {
            name: task
                .department
                .as_ref()
                .map(|d| d.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            completed: 0,
            hours: Vec::new(),
            overdue: 0,
        });
        if task.is_completed() {
            tally.completed += 1;
        }
        if let Some(hours) = closure_hours(task) {
            tally.hours.push(hours);
        }
        if is_overdue(task, now) {
            tally.overdue += 1;
        }
    }

    groups
        .into_entries()
        .into_iter()
        .map(|(department_id, t)| DepartmentClosureMetric {
            department_id,
            department_name: t.name,
            completed_tasks: t.completed,
            average_close_hours: mean(&t.hours),
            median_close_hours: median(&t.hours),
            overdue_tasks: t.overdue,
        })
        .collect()
}
