pub mod builder;
pub mod period;
pub mod scope;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{City, EntityCounts, GoalWithTasks, MeetingWithTasks, TaskRecord, Team};

pub use builder::{
    GoalField, GoalQuery, MeetingField, MeetingQuery, TaskField, TaskQuery, TeamField, TeamQuery,
};
pub use period::Period;
pub use scope::{DateRange, DepartmentAttribution, ScopeFilter};

/// Read access to the records the reports aggregate.
///
/// Each fetch is a single round trip. Implementations apply every filter on
/// the query they are handed and return rows in the query's documented
/// order.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Tasks with their department and assignee team attached.
    async fn fetch_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskRecord>>;

    async fn fetch_teams(&self, query: &TeamQuery) -> Result<Vec<Team>>;

    /// Goals, with tasks attached when the query asks for them.
    async fn fetch_goals(&self, query: &GoalQuery) -> Result<Vec<GoalWithTasks>>;

    /// Meetings, with tasks attached when the query asks for them.
    async fn fetch_meetings(&self, query: &MeetingQuery) -> Result<Vec<MeetingWithTasks>>;

    async fn fetch_cities(&self) -> Result<Vec<City>>;

    async fn entity_counts(&self) -> Result<EntityCounts>;
}
