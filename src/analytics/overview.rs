//! Organization-wide rollups. City membership always follows the assignee's
//! team; department membership follows `task.department_id`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::analytics::types::{
    CityClosureTime, CityTasksOverview, DepartmentProgress, OrganizationStats,
};
use crate::analytics::util::{
    bucket_priority, closure_hours, is_overdue, mean, median, percent, OrderedGroups,
    PriorityBuckets,
};
use crate::error::Result;
use crate::model::{City, EntityCounts, TaskRecord, TaskStatus};
use crate::query::builder::{TaskField, TaskQuery, TeamField};
use crate::query::scope::DateRange;
use crate::query::AnalyticsStore;

#[derive(Debug, Default)]
struct StatusTally {
    total: u64,
    todo: u64,
    in_progress: u64,
    completed: u64,
    overdue: u64,
}

impl StatusTally {
    fn add(&mut self, task: &TaskRecord, now: DateTime<Utc>) {
        self.total += 1;
        match task.status {
            TaskStatus::Todo => self.todo += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Completed => self.completed += 1,
        }
        if is_overdue(task, now) {
            self.overdue += 1;
        }
    }
}

/// Task status counts for every city, by creation date.
pub async fn tasks_by_city<S: AnalyticsStore + ?Sized>(
    store: &S,
    range: &DateRange,
) -> Result<Vec<CityTasksOverview>> {
    let cities = store.fetch_cities().await?;
    let tasks = store
        .fetch_tasks(
            &TaskQuery::new()
                .require_team()
                .filter_range(TaskField::CreatedAt, range),
        )
        .await?;
    Ok(summarize_tasks_by_city(&cities, &tasks, Utc::now()))
}

/// One row per city, in `cities` order. Cities without tasks get zeros.
pub fn summarize_tasks_by_city(
    cities: &[City],
    tasks: &[TaskRecord],
    now: DateTime<Utc>,
) -> Vec<CityTasksOverview> {
    let mut tallies: HashMap<&str, StatusTally> = HashMap::new();
    for task in tasks {
        if let Some(city) = task.team_city_id() {
            tallies.entry(city).or_default().add(task, now);
        }
    }

    cities
        .iter()
        .map(|city| {
            let t = tallies.remove(city.id.as_str()).unwrap_or_default();
            CityTasksOverview {
                city_id: city.id.clone(),
                city_name: city.name.clone(),
                total_tasks: t.total,
                todo_tasks: t.todo,
                in_progress_tasks: t.in_progress,
                completed_tasks: t.completed,
                overdue_tasks: t.overdue,
                completion_rate: percent(t.completed, t.total),
            }
        })
        .collect()
}

/// Per (city, department) progress, optionally limited to one city.
pub async fn department_progress<S: AnalyticsStore + ?Sized>(
    store: &S,
    city_id: Option<&str>,
    range: &DateRange,
) -> Result<Vec<DepartmentProgress>> {
    let cities = store.fetch_cities().await?;
    let mut query = TaskQuery::new()
        .require_team()
        .filter_not_null(TaskField::DepartmentId)
        .filter_range(TaskField::CreatedAt, range);
    if let Some(city) = city_id {
        query = query.filter_join_eq(TeamField::CityId, city);
    }
    let tasks = store.fetch_tasks(&query).await?;
    Ok(summarize_department_progress(&cities, &tasks, Utc::now()))
}

/// Sorted by city name, then department name.
pub fn summarize_department_progress(
    cities: &[City],
    tasks: &[TaskRecord],
    now: DateTime<Utc>,
) -> Vec<DepartmentProgress> {
    struct Tally {
        city_id: String,
        department_id: String,
        department_name: String,
        status: StatusTally,
        hours: Vec<f64>,
    }

    let city_names: HashMap<&str, &str> = cities
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect();

    let mut groups = OrderedGroups::new();
    for task in tasks {
        let (Some(city_id), Some(dept_id)) = (task.team_city_id(), task.department_id.as_deref())
        else {
            continue;
        };
        let tally = groups.get_or_insert_with(&format!("{city_id}/{dept_id}"), || Tally {
            city_id: city_id.to_string(),
            department_id: dept_id.to_string(),
            department_name: task
                .department
                .as_ref()
                .map(|d| d.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            status: StatusTally::default(),
            hours: Vec::new(),
        });
        tally.status.add(task, now);
        if let Some(h) = closure_hours(task) {
            tally.hours.push(h);
        }
    }

    let mut rows: Vec<DepartmentProgress> = groups
        .into_values()
        .map(|t| DepartmentProgress {
            city_name: city_names
                .get(t.city_id.as_str())
                .map(|n| n.to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            city_id: t.city_id,
            department_id: t.department_id,
            department_name: t.department_name,
            total_tasks: t.status.total,
            todo_tasks: t.status.todo,
            in_progress_tasks: t.status.in_progress,
            completed_tasks: t.status.completed,
            overdue_tasks: t.status.overdue,
            completion_rate: percent(t.status.completed, t.status.total),
            avg_completion_time_hours: mean(&t.hours),
        })
        .collect();
    rows.sort_by(|a, b| {
        (a.city_name.as_str(), a.department_name.as_str())
            .cmp(&(b.city_name.as_str(), b.department_name.as_str()))
    });
    rows
}

/// Closure-time spread per city over tasks completed within `range`.
pub async fn closure_time_by_city<S: AnalyticsStore + ?Sized>(
    store: &S,
    range: &DateRange,
) -> Result<Vec<CityClosureTime>> {
    let cities = store.fetch_cities().await?;
    let tasks = store
        .fetch_tasks(
            &TaskQuery::new()
                .require_team()
                .filter_eq(TaskField::Status, TaskStatus::Completed.as_str())
                .filter_not_null(TaskField::UpdatedAt)
                .filter_range(TaskField::UpdatedAt, range),
        )
        .await?;
    Ok(summarize_closure_by_city(&cities, &tasks))
}

/// Cities without completions are left out.
pub fn summarize_closure_by_city(cities: &[City], tasks: &[TaskRecord]) -> Vec<CityClosureTime> {
    let mut by_city: HashMap<&str, (Vec<f64>, PriorityBuckets)> = HashMap::new();
    for task in tasks {
        let (Some(city), Some(hours)) = (task.team_city_id(), closure_hours(task)) else {
            continue;
        };
        let (all, buckets) = by_city.entry(city).or_default();
        all.push(hours);
        buckets.push(bucket_priority(task.priority), hours);
    }

    cities
        .iter()
        .filter_map(|city| {
            let (hours, buckets) = by_city.remove(city.id.as_str())?;
            Some(CityClosureTime {
                city_id: city.id.clone(),
                city_name: city.name.clone(),
                total_completed: hours.len() as u64,
                avg_closure_hours: mean(&hours),
                median_closure_hours: median(&hours),
                by_priority: buckets.averages(),
            })
        })
        .collect()
}

/// Headline counts across the whole warehouse.
pub async fn organization_stats<S: AnalyticsStore + ?Sized>(
    store: &S,
) -> Result<OrganizationStats> {
    let counts = store.entity_counts().await?;
    Ok(OrganizationStats::from(&counts))
}

fn whole_percent(part: u64, total: u64) -> u64 {
    percent(part, total).round() as u64
}

impl From<&EntityCounts> for OrganizationStats {
    fn from(c: &EntityCounts) -> Self {
        Self {
            total_meetings: c.meetings,
            total_tasks: c.tasks,
            completed_tasks: c.completed_tasks,
            total_goals: c.goals,
            active_goals: c.active_goals,
            total_departments: c.departments,
            total_users: c.users,
            task_completion_rate: whole_percent(c.completed_tasks, c.tasks),
            goal_active_rate: whole_percent(c.active_goals, c.goals),
        }
    }
}
