use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::analytics::types::*;
use crate::analytics::util::{
    bucket_priority, closure_hours, is_overdue, mean, median, percent, OrderedGroups,
    PriorityBuckets,
};
use crate::error::Result;
use crate::model::{GoalWithTasks, TaskRecord, TaskStatus, Team};
use crate::query::builder::{GoalField, GoalQuery, TaskField, TaskQuery, TeamField, TeamQuery};
use crate::query::scope::DateRange;
use crate::query::AnalyticsStore;

/// The teams located in a city and the departments those teams belong to.
#[derive(Debug, Clone, Default)]
pub struct CityMembership {
    team_ids: HashSet<String>,
    /// Distinct, in first-seen order.
    department_ids: Vec<String>,
}

impl CityMembership {
    pub fn from_teams(teams: &[Team]) -> Self {
        let mut membership = Self::default();
        for team in teams {
            membership.team_ids.insert(team.id.clone());
            if let Some(ref dept) = team.department_id {
                if !membership.department_ids.contains(dept) {
                    membership.department_ids.push(dept.clone());
                }
            }
        }
        membership
    }

    pub fn is_empty(&self) -> bool {
        self.team_ids.is_empty() && self.department_ids.is_empty()
    }

    pub fn department_ids(&self) -> &[String] {
        &self.department_ids
    }
}

/// A task belongs to the city when its assignee's team is one of the
/// city's teams, or when its own department has a team in the city.
pub fn city_relevant(membership: &CityMembership, task: &TaskRecord) -> bool {
    let by_team = task
        .team_id()
        .is_some_and(|id| membership.team_ids.contains(id));
    let by_department = task
        .department_id
        .as_ref()
        .is_some_and(|id| membership.department_ids.contains(id));
    by_team || by_department
}

async fn city_membership<S: AnalyticsStore + ?Sized>(
    store: &S,
    city_id: &str,
) -> Result<CityMembership> {
    let teams = store
        .fetch_teams(&TeamQuery::new().filter_eq(TeamField::CityId, city_id))
        .await?;
    Ok(CityMembership::from_teams(&teams))
}

/// Task, SLA and department summary for one city. A city with no teams
/// yields the all-zero overview.
pub async fn city_overview<S: AnalyticsStore + ?Sized>(
    store: &S,
    city_id: &str,
    range: &DateRange,
) -> Result<CityOverview> {
    let membership = city_membership(store, city_id).await?;
    if membership.is_empty() {
        log::debug!("city {city_id} has no teams");
        return Ok(CityOverview::default());
    }

    // The team-or-department test is an OR across two relations, so it is
    // applied after a broad fetch.
    let tasks = store
        .fetch_tasks(&TaskQuery::new().filter_range(TaskField::CreatedAt, range))
        .await?;
    let relevant: Vec<TaskRecord> = tasks
        .into_iter()
        .filter(|t| city_relevant(&membership, t))
        .collect();
    Ok(summarize_city(&relevant, Utc::now()))
}

pub fn summarize_city(tasks: &[TaskRecord], now: DateTime<Utc>) -> CityOverview {
    struct DeptTally {
        name: String,
        total: u64,
        completed: u64,
        overdue: u64,
        hours: Vec<f64>,
    }

    let mut overview = CityOverview::default();
    let mut closed_hours = Vec::new();
    let mut buckets = PriorityBuckets::default();
    let mut departments = OrderedGroups::new();

    overview.summary.total_tasks = tasks.len() as u64;
    for task in tasks {
        match task.status {
            TaskStatus::Completed => overview.summary.completed_tasks += 1,
            TaskStatus::InProgress => overview.summary.in_progress_tasks += 1,
            TaskStatus::Todo => overview.summary.todo_tasks += 1,
        }
        let overdue = is_overdue(task, now);
        if overdue {
            overview.summary.overdue_tasks += 1;
        }

        if let Some(priority) = task.priority {
            overview.priority_distribution.increment(priority);
        }

        let hours = closure_hours(task);
        if let Some(h) = hours {
            closed_hours.push(h);
            buckets.push(bucket_priority(task.priority), h);
        }

        if let Some(ref dept_id) = task.department_id {
            let tally = departments.get_or_insert_with(dept_id, || DeptTally {
                name: task
                    .department
                    .as_ref()
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                total: 0,
                completed: 0,
                overdue: 0,
                hours: Vec::new(),
            });
            tally.total += 1;
            if task.is_completed() {
                tally.completed += 1;
            }
            if overdue {
                tally.overdue += 1;
            }
            if let Some(h) = hours {
                tally.hours.push(h);
            }
        }
    }

    overview.sla_metrics = CitySlaMetrics {
        average_time_to_close_hours: mean(&closed_hours),
        median_time_to_close_hours: median(&closed_hours),
        distribution_by_priority: buckets.averages(),
    };
    overview.department_breakdown = departments
        .into_entries()
        .into_iter()
        .map(|(department_id, t)| DepartmentInCityMetrics {
            department_id,
            department_name: t.name,
            total_tasks: t.total,
            completed_tasks: t.completed,
            overdue_tasks: t.overdue,
            average_close_time_hours: mean(&t.hours),
        })
        .collect();
    overview
}

/// Progress of every goal owned by a department with a team in the city.
pub async fn city_goal_progress<S: AnalyticsStore + ?Sized>(
    store: &S,
    city_id: &str,
    range: &DateRange,
) -> Result<Vec<CityGoalProgress>> {
    let membership = city_membership(store, city_id).await?;
    if membership.department_ids().is_empty() {
        return Ok(Vec::new());
    }
    let goals = store
        .fetch_goals(
            &GoalQuery::new()
                .filter_in(GoalField::DepartmentId, membership.department_ids().to_vec())
                .with_tasks(),
        )
        .await?;
    Ok(goals
        .iter()
        .map(|g| summarize_goal_progress(g, range))
        .collect())
}

pub fn summarize_goal_progress(goal: &GoalWithTasks, range: &DateRange) -> CityGoalProgress {
    let in_range: Vec<&TaskRecord> = goal
        .tasks
        .iter()
        .filter(|t| range.contains(t.created_at))
        .collect();
    let total = in_range.len() as u64;
    let completed = in_range.iter().filter(|t| t.is_completed()).count() as u64;
    CityGoalProgress {
        goal: GoalRef::from(&goal.goal),
        total_tasks: total,
        completed_tasks: completed,
        progress_percent: percent(completed, total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::util::test_support::*;
    use crate::model::{Goal, Priority};
    use crate::storage::snapshot::Snapshot;
    use crate::storage::Database;

    fn team(id: &str, department_id: Option<&str>) -> Team {
        Team {
            id: id.into(),
            name: id.into(),
            city_id: Some("c1".into()),
            department_id: department_id.map(String::from),
        }
    }

    #[test]
    fn test_membership_or_rule() {
        let membership = CityMembership::from_teams(&[
            team("tm1", Some("d1")),
            team("tm2", Some("d1")),
            team("tm3", None),
        ]);
        assert_eq!(membership.department_ids(), &["d1".to_string()]);

        // Assignee in a city team, department elsewhere.
        assert!(city_relevant(&membership, &task("a").team("tm3", "c1", "d9").build()));
        // Department has a team in the city, no assignee.
        assert!(city_relevant(&membership, &task("b").department("d1", "Eng").build()));
        // Neither.
        assert!(!city_relevant(&membership, &task("c").department("d2", "Sales").team("tm9", "c2", "d2").build()));
        assert!(!city_relevant(&membership, &task("d").build()));
    }

    #[test]
    fn test_empty_city_is_all_zero() {
        assert!(CityMembership::from_teams(&[]).is_empty());
        let overview = CityOverview::default();
        assert_eq!(overview.summary, CityTaskSummary::default());
        assert!(overview.department_breakdown.is_empty());
        assert_eq!(overview.sla_metrics.average_time_to_close_hours, 0.0);
    }

    #[test]
    fn test_summarize_city() {
        let tasks = vec![
            task("a")
                .department("d1", "Engineering")
                .priority(Priority::Urgent)
                .closed_after(4)
                .build(),
            task("b")
                .department("d1", "Engineering")
                .closed_after(10)
                .build(),
            task("c")
                .department("d2", "Sales")
                .status(TaskStatus::InProgress)
                .due(days_ago(1))
                .build(),
            task("d").priority(Priority::Low).build(),
        ];
        let overview = summarize_city(&tasks, now());

        assert_eq!(overview.summary.total_tasks, 4);
        assert_eq!(overview.summary.completed_tasks, 2);
        assert_eq!(overview.summary.in_progress_tasks, 1);
        assert_eq!(overview.summary.todo_tasks, 1);
        assert_eq!(overview.summary.overdue_tasks, 1);

        // Unprioritized tasks are not counted in the histogram.
        assert_eq!(overview.priority_distribution.total(), 2);
        assert_eq!(overview.priority_distribution.medium, 0);

        assert_eq!(overview.sla_metrics.average_time_to_close_hours, 7.0);
        assert_eq!(overview.sla_metrics.median_time_to_close_hours, 7.0);
        assert_eq!(overview.sla_metrics.distribution_by_priority.urgent, Some(4.0));
        assert_eq!(overview.sla_metrics.distribution_by_priority.medium, Some(10.0));
        assert_eq!(overview.sla_metrics.distribution_by_priority.low, None);

        // Task "d" has no department and is left out of the breakdown.
        let names: Vec<&str> = overview
            .department_breakdown
            .iter()
            .map(|d| d.department_name.as_str())
            .collect();
        assert_eq!(names, vec!["Engineering", "Sales"]);
        assert_eq!(overview.department_breakdown[0].average_close_time_hours, 7.0);
        assert_eq!(overview.department_breakdown[1].overdue_tasks, 1);
    }

    #[test]
    fn test_goal_progress_percent() {
        let goal = Goal {
            id: "g1".into(),
            title: "Ship".into(),
            description: None,
            year: 2025,
            quarter: Some(2),
            status: Some("active".into()),
            department_id: Some("d1".into()),
        };
        let empty = GoalWithTasks {
            goal: goal.clone(),
            tasks: Vec::new(),
        };
        assert_eq!(summarize_goal_progress(&empty, &DateRange::all()).progress_percent, 0.0);

        let full = GoalWithTasks {
            goal,
            tasks: vec![
                task("a").closed_after(1).build(),
                task("b").closed_after(1).build(),
                task("c").closed_after(1).build(),
                task("d").build(),
                task("old").created(days_ago(400)).build(),
            ],
        };
        let range = DateRange::new(Some(days_ago(30)), None);
        let progress = summarize_goal_progress(&full, &range);
        assert_eq!(progress.total_tasks, 4);
        assert_eq!(progress.completed_tasks, 3);
        assert_eq!(progress.progress_percent, 75.0);
    }

    const FIXTURE: &str = r#"{
        "cities": [{"id": "c1", "name": "Lagos"}, {"id": "c2", "name": "Accra"}, {"id": "c3", "name": "Empty"}],
        "departments": [{"id": "d1", "name": "Engineering"}, {"id": "d2", "name": "Sales"}],
        "teams": [
            {"id": "tm1", "name": "Platform", "city_id": "c1", "department_id": "d1"},
            {"id": "tm2", "name": "Field", "city_id": "c2", "department_id": "d2"}
        ],
        "profiles": [
            {"id": "u1", "full_name": null, "email": "a@example.com", "team_id": "tm1"},
            {"id": "u2", "full_name": null, "email": "b@example.com", "team_id": "tm2"}
        ],
        "goals": [
            {"id": "g1", "title": "Eng goal", "description": null, "year": 2025, "quarter": 1,
             "status": "active", "department_id": "d1"},
            {"id": "g2", "title": "Sales goal", "description": null, "year": 2025, "quarter": 1,
             "status": "active", "department_id": "d2"}
        ],
        "tasks": [
            {"id": "t1", "title": "Lagos team", "status": "completed", "created_at": "2025-03-01",
             "updated_at": "2025-03-02", "department_id": "d2", "assignee_id": "u1",
             "goal_id": "g1", "meeting_id": null},
            {"id": "t2", "title": "Eng unassigned", "status": "todo", "created_at": "2025-03-01",
             "department_id": "d1", "assignee_id": null, "goal_id": "g1", "meeting_id": null},
            {"id": "t3", "title": "Accra only", "status": "todo", "created_at": "2025-03-01",
             "department_id": "d2", "assignee_id": "u2", "goal_id": "g2", "meeting_id": null}
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
    async fn test_city_overview_from_store() {
        let db = seeded().await;
        let overview = city_overview(&db, "c1", &DateRange::all()).await.unwrap();
        assert_eq!(overview.summary.total_tasks, 2);
        assert_eq!(overview.summary.completed_tasks, 1);
        // Grouped by the task's own department.
        let ids: Vec<&str> = overview
            .department_breakdown
            .iter()
            .map(|d| d.department_id.as_str())
            .collect();
        assert_eq!(ids, vec!["d2", "d1"]);

        let empty = city_overview(&db, "c3", &DateRange::all()).await.unwrap();
        assert_eq!(empty.summary.total_tasks, 0);
        assert!(empty.department_breakdown.is_empty());

        let unknown = city_overview(&db, "nowhere", &DateRange::all()).await.unwrap();
        assert_eq!(unknown.summary, CityTaskSummary::default());
    }

    #[tokio::test]
    async fn test_city_goal_progress_from_store() {
        let db = seeded().await;
        let goals = city_goal_progress(&db, "c1", &DateRange::all()).await.unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].goal.id, "g1");
        assert_eq!(goals[0].total_tasks, 2);
        assert_eq!(goals[0].progress_percent, 50.0);

        assert!(city_goal_progress(&db, "c3", &DateRange::all())
            .await
            .unwrap()
            .is_empty());
    }
}
