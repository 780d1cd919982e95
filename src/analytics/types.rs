use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Goal, Priority};

/// Counts per priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub urgent: u64,
    pub important: u64,
    pub medium: u64,
    pub low: u64,
}

impl PriorityCounts {
    pub fn increment(&mut self, priority: Priority) {
        match priority {
            Priority::Urgent => self.urgent += 1,
            Priority::Important => self.important += 1,
            Priority::Medium => self.medium += 1,
            Priority::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.urgent + self.important + self.medium + self.low
    }
}

/// Mean closure hours per priority. `None` means no closed task had that
/// priority, as distinct from an average of zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriorityAverages {
    pub urgent: Option<f64>,
    pub important: Option<f64>,
    pub medium: Option<f64>,
    pub low: Option<f64>,
}

// ── Task progress & closure time ───────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusDistribution {
    pub total: u64,
    pub completed: u64,
    pub in_progress: u64,
    pub todo: u64,
    pub completed_percent: f64,
    pub in_progress_percent: f64,
    pub todo_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeriodActivity {
    /// Equal to the distribution total: the fetch is already bounded by
    /// creation date.
    pub created_count: u64,
    pub completed_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueSample {
    pub id: String,
    pub title: String,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverdueSummary {
    pub count: u64,
    /// Earliest due dates first.
    pub most_overdue_sample: Vec<OverdueSample>,
}

/// Status, activity, overdue and priority breakdown of a scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskProgressStats {
    pub distribution: StatusDistribution,
    pub period_activity: PeriodActivity,
    pub overdue: OverdueSummary,
    pub priority_breakdown: PriorityCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskClosureTimeStats {
    pub overall_average_hours: f64,
    pub by_priority: PriorityAverages,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeightedClosureStats {
    pub weighted_average_hours: f64,
    pub by_priority: PriorityAverages,
}

/// Closure-time spread for one priority level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityClosureStats {
    pub priority: Priority,
    pub priority_weight: u8,
    pub total_completed: u64,
    pub avg_closure_hours: f64,
    pub min_closure_hours: f64,
    pub max_closure_hours: f64,
    pub median_closure_hours: f64,
}

// ── Teams ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamClosureMetric {
    pub team_id: String,
    pub team_name: String,
    pub city_id: Option<String>,
    pub department_id: Option<String>,
    pub completed_tasks: u64,
    pub average_close_hours: f64,
    pub overdue_tasks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSupportMetric {
    pub team_id: String,
    pub team_name: String,
    pub city_id: Option<String>,
    pub department_id: Option<String>,
    /// Tasks that are overdue, urgent, or stuck in progress.
    pub critical_issues: u64,
    pub average_close_hours: f64,
    pub overdue_tasks: u64,
}

// ── Departments ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentClosureMetric {
    pub department_id: String,
    pub department_name: String,
    pub completed_tasks: u64,
    pub average_close_hours: f64,
    pub median_close_hours: f64,
    pub overdue_tasks: u64,
}

// ── Cities ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CityTaskSummary {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub in_progress_tasks: u64,
    pub todo_tasks: u64,
    pub overdue_tasks: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CitySlaMetrics {
    pub average_time_to_close_hours: f64,
    pub median_time_to_close_hours: f64,
    pub distribution_by_priority: PriorityAverages,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentInCityMetrics {
    pub department_id: String,
    pub department_name: String,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub overdue_tasks: u64,
    pub average_close_time_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CityOverview {
    pub summary: CityTaskSummary,
    /// Only tasks with a known priority are counted.
    pub priority_distribution: PriorityCounts,
    pub sla_metrics: CitySlaMetrics,
    pub department_breakdown: Vec<DepartmentInCityMetrics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalRef {
    pub id: String,
    pub title: String,
    pub status: Option<String>,
    pub department_id: Option<String>,
}

impl From<&Goal> for GoalRef {
    fn from(goal: &Goal) -> Self {
        Self {
            id: goal.id.clone(),
            title: goal.title.clone(),
            status: goal.status.clone(),
            department_id: goal.department_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityGoalProgress {
    pub goal: GoalRef,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub progress_percent: f64,
}

// ── Goals ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalSummary {
    pub goal: Goal,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    /// Open tasks that are overdue or urgent.
    pub at_risk_tasks: u64,
    pub progress_percent: f64,
}

// ── Meetings ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeetingSummary {
    pub meeting_id: String,
    pub meeting_title: String,
    pub date: DateTime<Utc>,
    pub status: Option<String>,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub open_tasks: u64,
    pub critical_issues: u64,
    pub departments_involved: Vec<EntityRef>,
    pub teams_involved: Vec<EntityRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeetingStatusTally {
    pub total_meetings: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeetingComplianceStats {
    pub summary: MeetingStatusTally,
    pub meetings: Vec<MeetingSummary>,
}

// ── Organization rollups ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityTasksOverview {
    pub city_id: String,
    pub city_name: String,
    pub total_tasks: u64,
    pub todo_tasks: u64,
    pub in_progress_tasks: u64,
    pub completed_tasks: u64,
    pub overdue_tasks: u64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentProgress {
    pub city_id: String,
    pub city_name: String,
    pub department_id: String,
    pub department_name: String,
    pub total_tasks: u64,
    pub todo_tasks: u64,
    pub in_progress_tasks: u64,
    pub completed_tasks: u64,
    pub overdue_tasks: u64,
    pub completion_rate: f64,
    pub avg_completion_time_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityClosureTime {
    pub city_id: String,
    pub city_name: String,
    pub total_completed: u64,
    pub avg_closure_hours: f64,
    pub median_closure_hours: f64,
    pub by_priority: PriorityAverages,
}

/// Headline counts for the whole organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizationStats {
    pub total_meetings: u64,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub total_goals: u64,
    pub active_goals: u64,
    pub total_departments: u64,
    pub total_users: u64,
    /// Whole percent.
    pub task_completion_rate: u64,
    /// Whole percent.
    pub goal_active_rate: u64,
}
