//! Report engines.
//!
//! Each public async function fetches through an [`AnalyticsStore`] and
//! folds the rows with a pure `summarize_*` function. Engines never call each
//! other; [`dashboard`] composes them.
//!
//! [`AnalyticsStore`]: crate::query::AnalyticsStore

pub mod city;
pub mod dashboard;
pub mod department;
pub mod goals;
pub mod meetings;
pub mod overview;
pub mod tasks;
pub mod team;
pub mod types;
pub mod util;

pub use city::{city_goal_progress, city_overview};
pub use dashboard::{load_org_dashboard, load_scope_dashboard, OrgDashboard, ScopeDashboard};
pub use department::department_closure_times;
pub use goals::goal_summary;
pub use meetings::meeting_compliance;
pub use overview::{closure_time_by_city, department_progress, organization_stats, tasks_by_city};
pub use tasks::{
    closure_time_by_priority, task_completion_time, task_progress_by_scope,
    weighted_task_closure_time,
};
pub use team::{team_closure_times, teams_needing_support};
pub use types::*;
