//! Analytics warehouse for meeting-minutes tasks, goals and meetings.
//!
//! Records land in a local SQLite database through [`Snapshot`] loads. The
//! report engines in [`analytics`] read them back through the
//! [`AnalyticsStore`] trait, which [`Database`] implements.

pub mod analytics;
pub mod date_util;
pub mod error;
pub mod model;
pub mod query;
pub mod storage;

pub use error::{Error, Result};
pub use model::{
    City, Department, EntityCounts, Goal, GoalWithTasks, Meeting, MeetingWithTasks, Priority,
    Profile, TaskRecord, TaskStatus, Team,
};
pub use query::{
    AnalyticsStore, DateRange, DepartmentAttribution, GoalQuery, MeetingQuery, Period,
    ScopeFilter, TaskQuery, TeamQuery,
};
pub use storage::snapshot::{LoadStats, Snapshot};
pub use storage::Database;
