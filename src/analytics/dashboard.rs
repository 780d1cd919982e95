use serde::Serialize;

use crate::analytics::types::*;
use crate::analytics::{department, goals, meetings, overview, tasks, team};
use crate::error::Result;
use crate::query::scope::{DateRange, ScopeFilter};
use crate::query::AnalyticsStore;

/// Organization-wide dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct OrgDashboard {
    pub range: DateRange,
    pub tasks_by_city: Vec<CityTasksOverview>,
    pub department_progress: Vec<DepartmentProgress>,
    pub closure_by_priority: Vec<PriorityClosureStats>,
    pub weighted_closure: WeightedClosureStats,
    pub closure_by_city: Vec<CityClosureTime>,
}

/// Dashboard for one scope.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeDashboard {
    pub scope: ScopeFilter,
    pub range: DateRange,
    pub progress: TaskProgressStats,
    pub completion_time: TaskClosureTimeStats,
    pub team_closure: Vec<TeamClosureMetric>,
    pub teams_needing_support: Vec<TeamSupportMetric>,
    pub department_closure: Vec<DepartmentClosureMetric>,
    pub goals: Vec<GoalSummary>,
    pub meetings: MeetingComplianceStats,
}

/// Run the org-level reports concurrently. The first failure aborts the load.
pub async fn load_org_dashboard<S: AnalyticsStore + ?Sized>(
    store: &S,
    range: &DateRange,
) -> Result<OrgDashboard> {
    let org = ScopeFilter::org();
    let (tasks_by_city, department_progress, closure_by_priority, weighted_closure, closure_by_city) =
        tokio::try_join!(
            overview::tasks_by_city(store, range),
            overview::department_progress(store, None, range),
            tasks::closure_time_by_priority(store, range),
            tasks::weighted_task_closure_time(store, &org, range),
            overview::closure_time_by_city(store, range),
        )?;
    Ok(OrgDashboard {
        range: *range,
        tasks_by_city,
        department_progress,
        closure_by_priority,
        weighted_closure,
        closure_by_city,
    })
}

pub async fn load_scope_dashboard<S: AnalyticsStore + ?Sized>(
    store: &S,
    scope: &ScopeFilter,
    range: &DateRange,
) -> Result<ScopeDashboard> {
    let (progress, completion_time, team_closure, teams_needing_support, department_closure, goals, meetings) =
        tokio::try_join!(
            tasks::task_progress_by_scope(store, scope, range),
            tasks::task_completion_time(store, scope, range),
            team::team_closure_times(store, scope, range),
            team::teams_needing_support(store, scope, range),
            department::department_closure_times(store, scope, range),
            goals::goal_summary(store, scope, range),
            meetings::meeting_compliance(store, scope, range),
        )?;
    Ok(ScopeDashboard {
        scope: scope.clone(),
        range: *range,
        progress,
        completion_time,
        team_closure,
        teams_needing_support,
        department_closure,
        goals,
        meetings,
    })
}
