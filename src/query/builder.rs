use rusqlite::types::ToSql;

use crate::date_util::format_timestamp;
use crate::query::scope::{DateRange, DepartmentAttribution, ScopeFilter};

/// A column a query can filter on.
pub trait Field: Copy {
    fn column(&self) -> &'static str;
}

/// Task columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Id,
    Status,
    Priority,
    DueDate,
    CreatedAt,
    UpdatedAt,
    DepartmentId,
    AssigneeId,
    GoalId,
    MeetingId,
}

impl Field for TaskField {
    fn column(&self) -> &'static str {
        match self {
            TaskField::Id => "t.id",
            TaskField::Status => "t.status",
            TaskField::Priority => "t.priority",
            TaskField::DueDate => "t.due_date",
            TaskField::CreatedAt => "t.created_at",
            TaskField::UpdatedAt => "t.updated_at",
            TaskField::DepartmentId => "t.department_id",
            TaskField::AssigneeId => "t.assignee_id",
            TaskField::GoalId => "t.goal_id",
            TaskField::MeetingId => "t.meeting_id",
        }
    }
}

/// Team columns. On a [`TaskQuery`] these are reached through
/// task → assignee → team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamField {
    Id,
    CityId,
    DepartmentId,
}

impl Field for TeamField {
    fn column(&self) -> &'static str {
        match self {
            TeamField::Id => "tm.id",
            TeamField::CityId => "tm.city_id",
            TeamField::DepartmentId => "tm.department_id",
        }
    }
}

/// Goal columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalField {
    Id,
    DepartmentId,
    Status,
}

impl Field for GoalField {
    fn column(&self) -> &'static str {
        match self {
            GoalField::Id => "g.id",
            GoalField::DepartmentId => "g.department_id",
            GoalField::Status => "g.status",
        }
    }
}

/// Meeting columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingField {
    Id,
    Date,
    Status,
}

impl Field for MeetingField {
    fn column(&self) -> &'static str {
        match self {
            MeetingField::Id => "m.id",
            MeetingField::Date => "m.date",
            MeetingField::Status => "m.status",
        }
    }
}

/// One predicate on a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter<F> {
    Eq(F, String),
    NotNull(F),
    Range(F, DateRange),
    In(F, Vec<String>),
}

type Params = Vec<Box<dyn ToSql>>;

/// Accumulates WHERE clauses with numbered parameters.
#[derive(Default)]
struct WhereBuilder {
    clauses: Vec<String>,
    params: Params,
}

impl WhereBuilder {
    fn next_idx(&self) -> usize {
        self.params.len() + 1
    }

    fn push<F: Field>(&mut self, filter: &Filter<F>) {
        match filter {
            Filter::Eq(field, value) => {
                let idx = self.next_idx();
                self.clauses.push(format!("{} = ?{idx}", field.column()));
                self.params.push(Box::new(value.clone()));
            }
            Filter::NotNull(field) => {
                self.clauses.push(format!("{} IS NOT NULL", field.column()));
            }
            Filter::Range(field, range) => {
                if let Some(from) = range.from {
                    let idx = self.next_idx();
                    self.clauses.push(format!("{} >= ?{idx}", field.column()));
                    self.params.push(Box::new(format_timestamp(&from)));
                }
                if let Some(to) = range.to {
                    let idx = self.next_idx();
                    self.clauses.push(format!("{} <= ?{idx}", field.column()));
                    self.params.push(Box::new(format_timestamp(&to)));
                }
            }
            Filter::In(field, values) => {
                if values.is_empty() {
                    // IN () matches nothing.
                    self.clauses.push("0 = 1".to_string());
                    return;
                }
                let start = self.next_idx();
                let placeholders = (start..start + values.len())
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(",");
                self.clauses
                    .push(format!("{} IN ({placeholders})", field.column()));
                for v in values {
                    self.params.push(Box::new(v.clone()));
                }
            }
        }
    }

    fn push_raw(&mut self, clause: &str) {
        self.clauses.push(clause.to_string());
    }

    fn finish(self, mut sql: String, order_by: &str) -> (String, Params) {
        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
        (sql, self.params)
    }
}

/// Selected task columns plus joined department and assignee team.
pub(crate) const TASK_SELECT: &str = "SELECT t.id, t.title, t.status, t.priority, t.due_date,
        t.created_at, t.updated_at, t.department_id, t.assignee_id, t.goal_id, t.meeting_id,
        d.id, d.name, tm.id, tm.name, tm.city_id, tm.department_id
    FROM tasks t
    LEFT JOIN departments d ON d.id = t.department_id
    LEFT JOIN profiles p ON p.id = t.assignee_id
    LEFT JOIN teams tm ON tm.id = p.team_id";

/// Builder for task queries.
///
/// Rows always come back with their department and assignee team attached.
/// Any filter on a [`TeamField`] turns the assignee/team join into an inner
/// join: tasks without an assignee team drop out.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    filters: Vec<Filter<TaskField>>,
    team_filters: Vec<Filter<TeamField>>,
    require_team: bool,
}

impl TaskQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_eq(mut self, field: TaskField, value: &str) -> Self {
        self.filters.push(Filter::Eq(field, value.to_string()));
        self
    }

    pub fn filter_not_null(mut self, field: TaskField) -> Self {
        self.filters.push(Filter::NotNull(field));
        self
    }

    /// Inclusive range on a timestamp field. Unbounded ranges add nothing.
    pub fn filter_range(mut self, field: TaskField, range: &DateRange) -> Self {
        if !range.is_unbounded() {
            self.filters.push(Filter::Range(field, *range));
        }
        self
    }

    pub fn filter_in(mut self, field: TaskField, values: Vec<String>) -> Self {
        self.filters.push(Filter::In(field, values));
        self
    }

    /// Equality through task → assignee → team (inner join).
    pub fn filter_join_eq(mut self, field: TeamField, value: &str) -> Self {
        self.team_filters.push(Filter::Eq(field, value.to_string()));
        self
    }

    /// Keep only tasks whose assignee has a team.
    pub fn require_team(mut self) -> Self {
        self.require_team = true;
        self
    }

    /// Push a scope down as store filters.
    pub fn scoped(mut self, scope: &ScopeFilter, attribution: DepartmentAttribution) -> Self {
        if let Some(ref city) = scope.city_id {
            self = self.filter_join_eq(TeamField::CityId, city);
        }
        if let Some(ref team) = scope.team_id {
            self = self.filter_join_eq(TeamField::Id, team);
        }
        if let Some(ref dept) = scope.department_id {
            self = match attribution {
                DepartmentAttribution::Direct => self.filter_eq(TaskField::DepartmentId, dept),
                DepartmentAttribution::Team => {
                    self.filter_join_eq(TeamField::DepartmentId, dept)
                }
            };
        }
        self
    }

    pub fn filters(&self) -> &[Filter<TaskField>] {
        &self.filters
    }

    pub fn team_filters(&self) -> &[Filter<TeamField>] {
        &self.team_filters
    }

    /// True when the assignee/team join is an inner join.
    pub fn requires_team(&self) -> bool {
        self.require_team || !self.team_filters.is_empty()
    }

    pub(crate) fn build_sql(&self) -> (String, Params) {
        let mut wb = WhereBuilder::default();
        for f in &self.filters {
            wb.push(f);
        }
        for f in &self.team_filters {
            wb.push(f);
        }
        if self.requires_team() {
            wb.push_raw("tm.id IS NOT NULL");
        }
        wb.finish(TASK_SELECT.to_string(), "t.created_at, t.id")
    }
}

/// Builder for team queries.
#[derive(Debug, Clone, Default)]
pub struct TeamQuery {
    filters: Vec<Filter<TeamField>>,
}

impl TeamQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_eq(mut self, field: TeamField, value: &str) -> Self {
        self.filters.push(Filter::Eq(field, value.to_string()));
        self
    }

    pub(crate) fn build_sql(&self) -> (String, Params) {
        let mut wb = WhereBuilder::default();
        for f in &self.filters {
            wb.push(f);
        }
        wb.finish(
            "SELECT tm.id, tm.name, tm.city_id, tm.department_id FROM teams tm".to_string(),
            "tm.name, tm.id",
        )
    }
}

/// Builder for goal queries. `with_tasks` selects each goal's tasks.
#[derive(Debug, Clone, Default)]
pub struct GoalQuery {
    filters: Vec<Filter<GoalField>>,
    with_tasks: bool,
}

impl GoalQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_eq(mut self, field: GoalField, value: &str) -> Self {
        self.filters.push(Filter::Eq(field, value.to_string()));
        self
    }

    pub fn filter_in(mut self, field: GoalField, values: Vec<String>) -> Self {
        self.filters.push(Filter::In(field, values));
        self
    }

    pub fn with_tasks(mut self) -> Self {
        self.with_tasks = true;
        self
    }

    pub fn includes_tasks(&self) -> bool {
        self.with_tasks
    }

    pub(crate) fn build_sql(&self) -> (String, Params) {
        let mut wb = WhereBuilder::default();
        for f in &self.filters {
            wb.push(f);
        }
        wb.finish(
            "SELECT g.id, g.title, g.description, g.year, g.quarter, g.status, g.department_id
             FROM goals g"
                .to_string(),
            "g.year, g.quarter, g.title, g.id",
        )
    }
}

/// Builder for meeting queries. `with_tasks` selects each meeting's tasks.
#[derive(Debug, Clone, Default)]
pub struct MeetingQuery {
    filters: Vec<Filter<MeetingField>>,
    with_tasks: bool,
}

impl MeetingQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_eq(mut self, field: MeetingField, value: &str) -> Self {
        self.filters.push(Filter::Eq(field, value.to_string()));
        self
    }

    pub fn filter_range(mut self, field: MeetingField, range: &DateRange) -> Self {
        if !range.is_unbounded() {
            self.filters.push(Filter::Range(field, *range));
        }
        self
    }

    pub fn with_tasks(mut self) -> Self {
        self.with_tasks = true;
        self
    }

    pub fn includes_tasks(&self) -> bool {
        self.with_tasks
    }

    pub(crate) fn build_sql(&self) -> (String, Params) {
        let mut wb = WhereBuilder::default();
        for f in &self.filters {
            wb.push(f);
        }
        wb.finish(
            "SELECT m.id, m.title, m.date, m.status, m.summary FROM meetings m".to_string(),
            "m.date, m.id",
        )
    }
}
