//! Task progress and closure-time reports.
//!
//! Progress reports bound the task set by `created_at`. Closure-time
//! reports look at completed tasks and bound them by `updated_at`, so they
//! measure closures in the period rather than creations.

use chrono::{DateTime, Utc};

use crate::analytics::types::*;
use crate::analytics::util::{
    bucket_priority, closure_hours, is_overdue, mean, median, percent, priority_weight,
    weighted_average, ClosureEntry, PriorityBuckets, OVERDUE_SAMPLE_SIZE,
};
use crate::error::Result;
use crate::model::{Priority, TaskRecord, TaskStatus};
use crate::query::builder::{TaskField, TaskQuery};
use crate::query::scope::{DateRange, DepartmentAttribution, ScopeFilter};
use crate::query::AnalyticsStore;

/// Completed tasks with a closure timestamp inside `range`.
fn closed_tasks_query(scope: &ScopeFilter, range: &DateRange) -> TaskQuery {
    TaskQuery::new()
        .scoped(scope, DepartmentAttribution::Direct)
        .filter_eq(TaskField::Status, TaskStatus::Completed.as_str())
        .filter_not_null(TaskField::UpdatedAt)
        .filter_range(TaskField::UpdatedAt, range)
}

pub async fn task_progress_by_scope<S: AnalyticsStore + ?Sized>(
    store: &S,
    scope: &ScopeFilter,
    range: &DateRange,
) -> Result<TaskProgressStats> {
    let query = TaskQuery::new()
        .scoped(scope, DepartmentAttribution::Direct)
        .filter_range(TaskField::CreatedAt, range);
    let tasks = store.fetch_tasks(&query).await?;
    Ok(summarize_progress(&tasks, range, Utc::now()))
}

pub async fn task_completion_time<S: AnalyticsStore + ?Sized>(
    store: &S,
    scope: &ScopeFilter,
    range: &DateRange,
) -> Result<TaskClosureTimeStats> {
    let tasks = store.fetch_tasks(&closed_tasks_query(scope, range)).await?;
    Ok(summarize_completion_time(&tasks))
}

pub async fn weighted_task_closure_time<S: AnalyticsStore + ?Sized>(
    store: &S,
    scope: &ScopeFilter,
    range: &DateRange,
) -> Result<WeightedClosureStats> {
    let tasks = store.fetch_tasks(&closed_tasks_query(scope, range)).await?;
    Ok(summarize_weighted_closure(&tasks))
}

/// Organization-wide closure spread per priority level.
pub async fn closure_time_by_priority<S: AnalyticsStore + ?Sized>(
    store: &S,
    range: &DateRange,
) -> Result<Vec<PriorityClosureStats>> {
    let tasks = store
        .fetch_tasks(&closed_tasks_query(&ScopeFilter::org(), range))
        .await?;
    Ok(summarize_priority_closure(&tasks))
}

pub fn summarize_progress(
    tasks: &[TaskRecord],
    range: &DateRange,
    now: DateTime<Utc>,
) -> TaskProgressStats {
    let mut stats = TaskProgressStats::default();
    let mut overdue: Vec<&TaskRecord> = Vec::new();

    for task in tasks {
        match task.status {
            TaskStatus::Completed => stats.distribution.completed += 1,
            TaskStatus::InProgress => stats.distribution.in_progress += 1,
            TaskStatus::Todo => stats.distribution.todo += 1,
        }

        stats.period_activity.created_count += 1;
        if task.is_completed() && task.updated_at.is_some_and(|at| range.contains(at)) {
            stats.period_activity.completed_count += 1;
        }

        stats
            .priority_breakdown
            .increment(bucket_priority(task.priority));

        if is_overdue(task, now) {
            overdue.push(task);
        }
    }

    let total = tasks.len() as u64;
    let dist = &mut stats.distribution;
    dist.total = total;
    dist.completed_percent = percent(dist.completed, total);
    dist.in_progress_percent = percent(dist.in_progress, total);
    dist.todo_percent = percent(dist.todo, total);

    stats.overdue.count = overdue.len() as u64;
    // Stable: equal due dates keep fetch order.
    overdue.sort_by_key(|t| t.due_date);
    stats.overdue.most_overdue_sample = overdue
        .into_iter()
        .take(OVERDUE_SAMPLE_SIZE)
        .filter_map(|t| {
            Some(OverdueSample {
                id: t.id.clone(),
                title: t.title.clone(),
                due_date: t.due_date?,
            })
        })
        .collect();

    stats
}

fn closure_entries(tasks: &[TaskRecord]) -> Vec<ClosureEntry> {
    tasks
        .iter()
        .filter_map(|t| {
            closure_hours(t).map(|hours| ClosureEntry {
                hours,
                priority: t.priority,
            })
        })
        .collect()
}

fn buckets_of(entries: &[ClosureEntry]) -> PriorityBuckets {
    let mut buckets = PriorityBuckets::default();
    for e in entries {
        buckets.push(bucket_priority(e.priority), e.hours);
    }
    buckets
}

pub fn summarize_completion_time(tasks: &[TaskRecord]) -> TaskClosureTimeStats {
    let entries = closure_entries(tasks);
    let hours: Vec<f64> = entries.iter().map(|e| e.hours).collect();
    TaskClosureTimeStats {
        overall_average_hours: mean(&hours),
        by_priority: buckets_of(&entries).averages(),
    }
}

/// Missing priorities weigh zero here, but still land in the medium bucket
/// of the per-priority averages.
pub fn summarize_weighted_closure(tasks: &[TaskRecord]) -> WeightedClosureStats {
    let entries = closure_entries(tasks);
    WeightedClosureStats {
        weighted_average_hours: weighted_average(&entries),
        by_priority: buckets_of(&entries).averages(),
    }
}

pub fn summarize_priority_closure(tasks: &[TaskRecord]) -> Vec<PriorityClosureStats> {
    let buckets = buckets_of(&closure_entries(tasks));
    Priority::ALL
        .iter()
        .filter_map(|&priority| {
            let hours = buckets.get(priority);
            if hours.is_empty() {
                return None;
            }
            Some(PriorityClosureStats {
                priority,
                priority_weight: priority_weight(Some(priority)),
                total_completed: hours.len() as u64,
                avg_closure_hours: mean(hours),
                min_closure_hours: hours.iter().copied().fold(f64::INFINITY, f64::min),
                max_closure_hours: hours.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                median_closure_hours: median(hours),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::util::test_support::*;
    use crate::date_util::parse_timestamp;
    use crate::storage::snapshot::Snapshot;
    use crate::storage::Database;
    use chrono::Duration;

    #[test]
    fn test_progress_empty() {
        let stats = summarize_progress(&[], &DateRange::all(), now());
        assert_eq!(stats, TaskProgressStats::default());
        assert_eq!(stats.distribution.completed_percent, 0.0);
    }

    #[test]
    fn test_progress_distribution_sums() {
        let tasks = vec![
            task("a").closed_after(5).build(),
            task("b").status(TaskStatus::InProgress).build(),
            task("c").build(),
            task("d").build(),
        ];
        let stats = summarize_progress(&tasks, &DateRange::all(), now());
        let d = &stats.distribution;
        assert_eq!(d.total, 4);
        assert_eq!(d.completed + d.in_progress + d.todo, d.total);
        assert_eq!(d.completed_percent, 25.0);
        assert_eq!(d.todo_percent, 50.0);
        assert!((d.completed_percent + d.in_progress_percent + d.todo_percent - 100.0).abs() < 1e-9);
        assert_eq!(stats.period_activity.created_count, 4);
    }

    #[test]
    fn test_progress_completed_in_period_rechecks_updated_at() {
        let range = DateRange::new(Some(days_ago(10)), Some(days_ago(2)));
        let tasks = vec![
            // Closed inside the window.
            task("a").created(days_ago(9)).closed_after(24).build(),
            // Created inside, closed after the window ends.
            task("b").created(days_ago(3)).closed_after(48).build(),
        ];
        let stats = summarize_progress(&tasks, &range, now());
        assert_eq!(stats.period_activity.completed_count, 1);
    }

    #[test]
    fn test_progress_priority_breakdown_folds_null_into_medium() {
        let tasks = vec![
            task("a").priority(Priority::Urgent).build(),
            task("b").build(),
            task("c").priority(Priority::Medium).build(),
        ];
        let stats = summarize_progress(&tasks, &DateRange::all(), now());
        assert_eq!(stats.priority_breakdown.urgent, 1);
        assert_eq!(stats.priority_breakdown.medium, 2);
        assert_eq!(stats.priority_breakdown.total(), 3);
    }

    #[test]
    fn test_progress_overdue_sample_earliest_first() {
        let mut tasks: Vec<TaskRecord> = (1..=7)
            .map(|i| task(&format!("t{i}")).due(days_ago(i)).build())
            .collect();
        // Same due date as t3; must come after it.
        tasks.push(task("tie").due(days_ago(3)).build());
        tasks.push(task("done").due(days_ago(20)).closed_after(1).build());

        let stats = summarize_progress(&tasks, &DateRange::all(), now());
        assert_eq!(stats.overdue.count, 8);
        let ids: Vec<&str> = stats
            .overdue
            .most_overdue_sample
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["t7", "t6", "t5", "t4", "t3"]);

        let tie_first = vec![
            task("x").due(days_ago(1)).build(),
            task("y").due(days_ago(1)).build(),
        ];
        let stats = summarize_progress(&tie_first, &DateRange::all(), now());
        assert_eq!(stats.overdue.most_overdue_sample[0].id, "x");
        assert_eq!(stats.overdue.most_overdue_sample[1].id, "y");
    }

    #[test]
    fn test_completion_time_per_priority() {
        let tasks = vec![
            task("a").priority(Priority::Urgent).closed_after(2).build(),
            task("b").priority(Priority::Urgent).closed_after(4).build(),
            task("c").closed_after(12).build(),
        ];
        let stats = summarize_completion_time(&tasks);
        assert_eq!(stats.overall_average_hours, 6.0);
        assert_eq!(stats.by_priority.urgent, Some(3.0));
        assert_eq!(stats.by_priority.medium, Some(12.0));
        assert_eq!(stats.by_priority.important, None);
        assert_eq!(stats.by_priority.low, None);
    }

    #[test]
    fn test_completion_time_empty() {
        let stats = summarize_completion_time(&[]);
        assert_eq!(stats.overall_average_hours, 0.0);
        assert_eq!(stats.by_priority, PriorityAverages::default());
    }

    #[test]
    fn test_weighted_closure_skips_unprioritized() {
        let tasks = vec![
            task("a").priority(Priority::Urgent).closed_after(10).build(),
            task("b").priority(Priority::Low).closed_after(0).build(),
            task("c").closed_after(100).build(),
        ];
        let stats = summarize_weighted_closure(&tasks);
        assert_eq!(stats.weighted_average_hours, 8.0);
        assert_eq!(stats.by_priority.medium, Some(100.0));
    }

    #[test]
    fn test_priority_closure_spread() {
        let tasks = vec![
            task("a").priority(Priority::Important).closed_after(1).build(),
            task("b").priority(Priority::Important).closed_after(9).build(),
            task("c").priority(Priority::Important).closed_after(5).build(),
            task("d").priority(Priority::Low).closed_after(3).build(),
        ];
        let rows = summarize_priority_closure(&tasks);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].priority, Priority::Important);
        assert_eq!(rows[0].priority_weight, 3);
        assert_eq!(rows[0].total_completed, 3);
        assert_eq!(rows[0].min_closure_hours, 1.0);
        assert_eq!(rows[0].max_closure_hours, 9.0);
        assert_eq!(rows[0].median_closure_hours, 5.0);
        assert_eq!(rows[0].avg_closure_hours, 5.0);
        assert_eq!(rows[1].priority, Priority::Low);
    }

    const FIXTURE: &str = r#"{
        "cities": [{"id": "c1", "name": "Lagos"}],
        "departments": [{"id": "d1", "name": "Engineering"}],
        "teams": [{"id": "tm1", "name": "Platform", "city_id": "c1", "department_id": "d1"}],
        "profiles": [{"id": "u1", "full_name": "Ada", "email": "ada@example.com", "team_id": "tm1"}],
        "tasks": [
            {"id": "t1", "title": "Assigned", "status": "completed", "priority": "urgent",
             "created_at": "2025-03-01T00:00:00Z", "updated_at": "2025-03-02T00:00:00Z",
             "department_id": "d1", "assignee_id": "u1", "goal_id": null, "meeting_id": null},
            {"id": "t2", "title": "Unassigned", "status": "completed", "priority": "low",
             "created_at": "2025-03-01T00:00:00Z", "updated_at": "2025-03-01T12:00:00Z",
             "department_id": "d1", "assignee_id": null, "goal_id": null, "meeting_id": null},
            {"id": "t3", "title": "Open", "status": "todo", "priority": null,
             "created_at": "2025-03-05T00:00:00Z",
             "department_id": "d1", "assignee_id": null, "goal_id": null, "meeting_id": null}
        ]
    }"#;

    async fn seeded() -> Database {
        let db = Database::open_memory().await.unwrap();
        db.load_snapshot(Snapshot::from_json(FIXTURE).unwrap())
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_department_scope_includes_unassigned() {
        let db = seeded().await;
        let stats = task_progress_by_scope(&db, &ScopeFilter::department("d1"), &DateRange::all())
            .await
            .unwrap();
        assert_eq!(stats.distribution.total, 3);
    }

    #[tokio::test]
    async fn test_city_scope_excludes_unassigned() {
        let db = seeded().await;
        let stats = task_progress_by_scope(&db, &ScopeFilter::city("c1"), &DateRange::all())
            .await
            .unwrap();
        assert_eq!(stats.distribution.total, 1);

        let closure = task_completion_time(&db, &ScopeFilter::city("c1"), &DateRange::all())
            .await
            .unwrap();
        assert_eq!(closure.overall_average_hours, 24.0);
        assert_eq!(closure.by_priority.low, None);
    }

    #[tokio::test]
    async fn test_closure_range_applies_to_updated_at() {
        let db = seeded().await;
        let from = parse_timestamp("2025-03-01T06:00:00Z").unwrap();
        let range = DateRange::new(Some(from), Some(from + Duration::days(1)));
        let stats = weighted_task_closure_time(&db, &ScopeFilter::org(), &range)
            .await
            .unwrap();
        // t2 closes at 12:00 on the 1st; t1 closes on the 2nd at midnight.
        assert_eq!(stats.by_priority.low, Some(12.0));
        assert_eq!(stats.by_priority.urgent, Some(24.0));

        let rows = closure_time_by_priority(&db, &DateRange::all()).await.unwrap();
        assert_eq!(rows.len(), 2);
    }
}
