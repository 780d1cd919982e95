use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::date_util::parse_timestamp;
use crate::error::Result;
use crate::model::TaskRecord;

/// Which slice of the organization a report covers.
///
/// City and team narrowing resolve through the task's assignee and that
/// assignee's team, so tasks without an assignee (or whose assignee has no
/// team) never match a city/team scope. Department narrowing depends on the
/// [`DepartmentAttribution`] the report uses. When several fields are set,
/// each one is an independent constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    #[serde(default)]
    pub org_scope: bool,
    pub city_id: Option<String>,
    pub department_id: Option<String>,
    pub team_id: Option<String>,
}

impl ScopeFilter {
    /// Organization-wide scope.
    pub fn org() -> Self {
        Self {
            org_scope: true,
            ..Self::default()
        }
    }

    pub fn city(id: &str) -> Self {
        Self::default().with_city(id)
    }

    pub fn department(id: &str) -> Self {
        Self::default().with_department(id)
    }

    pub fn team(id: &str) -> Self {
        Self::default().with_team(id)
    }

    pub fn with_city(mut self, id: &str) -> Self {
        self.city_id = Some(id.to_string());
        self
    }

    pub fn with_department(mut self, id: &str) -> Self {
        self.department_id = Some(id.to_string());
        self
    }

    pub fn with_team(mut self, id: &str) -> Self {
        self.team_id = Some(id.to_string());
        self
    }

    /// True when any of city, department or team narrows the scope.
    pub fn is_scoped(&self) -> bool {
        self.city_id.is_some() || self.department_id.is_some() || self.team_id.is_some()
    }

    /// True when matching needs the task → assignee → team join.
    pub fn needs_team_join(&self) -> bool {
        self.city_id.is_some() || self.team_id.is_some()
    }

    /// In-memory form of the scope predicate.
    pub fn matches(&self, task: &TaskRecord, attribution: DepartmentAttribution) -> bool {
        if let Some(ref city) = self.city_id {
            if task.team_city_id() != Some(city.as_str()) {
                return false;
            }
        }
        if let Some(ref team) = self.team_id {
            if task.team_id() != Some(team.as_str()) {
                return false;
            }
        }
        if let Some(ref dept) = self.department_id {
            if attribution.department_of(task) != Some(dept.as_str()) {
                return false;
            }
        }
        true
    }
}

/// How a report decides which department a task belongs to.
///
/// Reports disagree on this and the difference is kept deliberately:
/// task progress, closure time, department and meeting reports use the
/// task's own `department_id`; team reports use the department of the
/// assignee's team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartmentAttribution {
    /// `task.department_id`
    Direct,
    /// `task.assignee.team.department_id`
    Team,
}

impl DepartmentAttribution {
    pub fn department_of<'a>(&self, task: &'a TaskRecord) -> Option<&'a str> {
        match self {
            DepartmentAttribution::Direct => task.department_id.as_deref(),
            DepartmentAttribution::Team => task.team_department_id(),
        }
    }
}

/// Inclusive timestamp window. A missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    /// Unbounded range.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse optional ISO-8601 date or datetime bounds.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self> {
        Ok(Self {
            from: from.map(parse_timestamp).transpose()?,
            to: to.map(parse_timestamp).transpose()?,
        })
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| ts >= from) && self.to.is_none_or(|to| ts <= to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Team, TaskStatus};
    use chrono::TimeZone;

    fn task(department_id: Option<&str>, team: Option<(&str, &str, &str)>) -> TaskRecord {
        TaskRecord {
            id: "t1".into(),
            title: "Task".into(),
            status: TaskStatus::Todo,
            priority: None,
            due_date: None,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            updated_at: None,
            department_id: department_id.map(String::from),
            assignee_id: team.map(|_| "u1".to_string()),
            goal_id: None,
            meeting_id: None,
            department: None,
            assignee_team: team.map(|(id, city, dept)| Team {
                id: id.into(),
                name: format!("Team {id}"),
                city_id: Some(city.into()),
                department_id: Some(dept.into()),
            }),
        }
    }

    #[test]
    fn test_unscoped_matches_everything() {
        let scope = ScopeFilter::org();
        assert!(!scope.is_scoped());
        assert!(scope.matches(&task(None, None), DepartmentAttribution::Direct));
    }

    #[test]
    fn test_city_scope_requires_assignee_team() {
        let scope = ScopeFilter::city("c1");
        assert!(scope.needs_team_join());
        assert!(!scope.matches(&task(Some("d1"), None), DepartmentAttribution::Direct));
        assert!(scope.matches(
            &task(None, Some(("tm1", "c1", "d1"))),
            DepartmentAttribution::Direct
        ));
        assert!(!scope.matches(
            &task(None, Some(("tm1", "c2", "d1"))),
            DepartmentAttribution::Direct
        ));
    }

    #[test]
    fn test_department_scope_without_assignee() {
        let scope = ScopeFilter::department("d1");
        assert!(!scope.needs_team_join());
        assert!(scope.matches(&task(Some("d1"), None), DepartmentAttribution::Direct));
        assert!(!scope.matches(&task(Some("d1"), None), DepartmentAttribution::Team));
    }

    #[test]
    fn test_attribution_strategies_diverge() {
        // Task filed against d1 but assigned to a team that belongs to d2.
        let t = task(Some("d1"), Some(("tm1", "c1", "d2")));
        assert_eq!(DepartmentAttribution::Direct.department_of(&t), Some("d1"));
        assert_eq!(DepartmentAttribution::Team.department_of(&t), Some("d2"));

        let scope = ScopeFilter::department("d2");
        assert!(!scope.matches(&t, DepartmentAttribution::Direct));
        assert!(scope.matches(&t, DepartmentAttribution::Team));
    }

    #[test]
    fn test_combined_filters_are_independent() {
        let t = task(Some("d1"), Some(("tm1", "c1", "d9")));
        let scope = ScopeFilter::city("c1").with_department("d1");
        assert!(scope.matches(&t, DepartmentAttribution::Direct));
        let scope = ScopeFilter::city("c1").with_department("d2");
        assert!(!scope.matches(&t, DepartmentAttribution::Direct));
    }

    #[test]
    fn test_date_range_contains_inclusive() {
        let range = DateRange::parse(Some("2025-01-01"), Some("2025-01-31")).unwrap();
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(end + chrono::Duration::seconds(1)));
        assert!(DateRange::all().contains(start));
        assert!(DateRange::all().is_unbounded());
    }

    #[test]
    fn test_date_range_parse_error() {
        assert!(DateRange::parse(Some("yesterday"), None).is_err());
    }
}
