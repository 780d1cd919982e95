use chrono::{DateTime, Utc};

use crate::analytics::types::{TeamClosureMetric, TeamSupportMetric};
use crate::analytics::util::{closure_hours, is_critical, is_overdue, mean, OrderedGroups};
use crate::error::Result;
use crate::model::{TaskRecord, Team};
use crate::query::builder::{TaskField, TaskQuery};
use crate::query::scope::{DateRange, DepartmentAttribution, ScopeFilter};
use crate::query::AnalyticsStore;

/// Tasks whose assignee has a team. Department scope follows the team.
fn team_tasks_query(scope: &ScopeFilter, range: &DateRange) -> TaskQuery {
    TaskQuery::new()
        .require_team()
        .scoped(scope, DepartmentAttribution::Team)
        .filter_range(TaskField::CreatedAt, range)
}

pub async fn team_closure_times<S: AnalyticsStore + ?Sized>(
    store: &S,
    scope: &ScopeFilter,
    range: &DateRange,
) -> Result<Vec<TeamClosureMetric>> {
    let tasks = store.fetch_tasks(&team_tasks_query(scope, range)).await?;
    Ok(summarize_team_closure(&tasks, Utc::now()))
}

pub async fn teams_needing_support<S: AnalyticsStore + ?Sized>(
    store: &S,
    scope: &ScopeFilter,
    range: &DateRange,
) -> Result<Vec<TeamSupportMetric>> {
    let tasks = store.fetch_tasks(&team_tasks_query(scope, range)).await?;
    Ok(rank_teams_needing_support(&tasks, Utc::now()))
}

struct TeamTally<'a> {
    team: &'a Team,
    completed: u64,
    close_hours: Vec<f64>,
    overdue: u64,
    critical: u64,
}

/// Fold tasks into per-team tallies in first-seen order. Tasks without an
/// assignee team are skipped.
fn tally_by_team(tasks: &[TaskRecord], now: DateTime<Utc>) -> Vec<TeamTally<'_>> {
    let mut groups = OrderedGroups::new();
    for task in tasks {
        let Some(team) = task.assignee_team.as_ref() else {
            continue;
        };
        let tally = groups.get_or_insert_with(&team.id, || TeamTally {
            team,
            completed: 0,
            close_hours: Vec::new(),
            overdue: 0,
            critical: 0,
        });
        if task.is_completed() {
            tally.completed += 1;
        }
        if let Some(hours) = closure_hours(task) {
            tally.close_hours.push(hours);
        }
        if is_overdue(task, now) {
            tally.overdue += 1;
        }
        if is_critical(task, now) {
            tally.critical += 1;
        }
    }
    groups.into_values().collect()
}

pub fn summarize_team_closure(tasks: &[TaskRecord], now: DateTime<Utc>) -> Vec<TeamClosureMetric> {
    tally_by_team(tasks, now)
        .into_iter()
        .map(|t| TeamClosureMetric {
            team_id: t.team.id.clone(),
            team_name: t.team.name.clone(),
            city_id: t.team.city_id.clone(),
            department_id: t.team.department_id.clone(),
            completed_tasks: t.completed,
            average_close_hours: mean(&t.close_hours),
            overdue_tasks: t.overdue,
        })
        .collect()
}

/// Teams ordered by critical issue count, highest first. Ties keep
/// first-seen order.
pub fn rank_teams_needing_support(
    tasks: &[TaskRecord],
    now: DateTime<Utc>,
) -> Vec<TeamSupportMetric> {
    let mut ranked: Vec<TeamSupportMetric> = tally_by_team(tasks, now)
        .into_iter()
        .map(|t| TeamSupportMetric {
            team_id: t.team.id.clone(),
            team_name: t.team.name.clone(),
            city_id: t.team.city_id.clone(),
            department_id: t.team.department_id.clone(),
            critical_issues: t.critical,
            average_close_hours: mean(&t.close_hours),
            overdue_tasks: t.overdue,
        })
        .collect();
    ranked.sort_by(|a, b| b.critical_issues.cmp(&a.critical_issues));
    ranked
}
