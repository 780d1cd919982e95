use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use crate::date_util::parse_timestamp;
use crate::error::Result;
use crate::model::{
    City, Department, EntityCounts, Goal, GoalWithTasks, Meeting, MeetingWithTasks, Priority,
    TaskRecord, TaskStatus, Team,
};
use crate::query::builder::{GoalQuery, MeetingQuery, TaskField, TaskQuery, TeamQuery};
use crate::query::AnalyticsStore;
use crate::storage::Database;

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_timestamp(&raw).map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        }),
        None => Ok(None),
    }
}

/// Decode one row of [`crate::query::builder::TASK_SELECT`].
fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    let status: String = row.get(2)?;
    let priority: Option<String> = row.get(3)?;

    let department = match (row.get::<_, Option<String>>(11)?, row.get::<_, Option<String>>(12)?) {
        (Some(id), Some(name)) => Some(Department { id, name }),
        _ => None,
    };
    let assignee_team = match row.get::<_, Option<String>>(13)? {
        Some(id) => Some(Team {
            id,
            name: row.get(14)?,
            city_id: row.get(15)?,
            department_id: row.get(16)?,
        }),
        None => None,
    };

    Ok(TaskRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        status: TaskStatus::parse(&status),
        priority: priority.as_deref().and_then(Priority::parse),
        due_date: opt_timestamp_at(row, 4)?,
        created_at: timestamp_at(row, 5)?,
        updated_at: opt_timestamp_at(row, 6)?,
        department_id: row.get(7)?,
        assignee_id: row.get(8)?,
        goal_id: row.get(9)?,
        meeting_id: row.get(10)?,
        department,
        assignee_team,
    })
}

fn query_tasks(conn: &Connection, query: &TaskQuery) -> rusqlite::Result<Vec<TaskRecord>> {
    let (sql, params) = query.build_sql();
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), task_from_row)?;
    rows.collect()
}

fn query_teams(conn: &Connection, query: &TeamQuery) -> rusqlite::Result<Vec<Team>> {
    let (sql, params) = query.build_sql();
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok(Team {
            id: row.get(0)?,
            name: row.get(1)?,
            city_id: row.get(2)?,
            department_id: row.get(3)?,
        })
    })?;
    rows.collect()
}

/// Group tasks under their parents, preserving parent order.
fn attach_tasks<P>(
    parents: Vec<P>,
    parent_id: impl Fn(&P) -> &str,
    task_parent: impl Fn(&TaskRecord) -> Option<&str>,
    tasks: Vec<TaskRecord>,
) -> Vec<(P, Vec<TaskRecord>)> {
    let index: HashMap<String, usize> = parents
        .iter()
        .enumerate()
        .map(|(i, p)| (parent_id(p).to_string(), i))
        .collect();
    let mut grouped: Vec<(P, Vec<TaskRecord>)> =
        parents.into_iter().map(|p| (p, Vec::new())).collect();
    for task in tasks {
        if let Some(&i) = task_parent(&task).and_then(|id| index.get(id)) {
            grouped[i].1.push(task);
        }
    }
    grouped
}

fn query_goals(conn: &Connection, query: &GoalQuery) -> rusqlite::Result<Vec<GoalWithTasks>> {
    let (sql, params) = query.build_sql();
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let goals = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(Goal {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                year: row.get(3)?,
                quarter: row.get(4)?,
                status: row.get(5)?,
                department_id: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let tasks = if query.includes_tasks() && !goals.is_empty() {
        let ids = goals.iter().map(|g| g.id.clone()).collect();
        query_tasks(conn, &TaskQuery::new().filter_in(TaskField::GoalId, ids))?
    } else {
        Vec::new()
    };

    Ok(attach_tasks(goals, |g| g.id.as_str(), |t| t.goal_id.as_deref(), tasks)
        .into_iter()
        .map(|(goal, tasks)| GoalWithTasks { goal, tasks })
        .collect())
}

fn query_meetings(
    conn: &Connection,
    query: &MeetingQuery,
) -> rusqlite::Result<Vec<MeetingWithTasks>> {
    let (sql, params) = query.build_sql();
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let meetings = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(Meeting {
                id: row.get(0)?,
                title: row.get(1)?,
                date: timestamp_at(row, 2)?,
                status: row.get(3)?,
                summary: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let tasks = if query.includes_tasks() && !meetings.is_empty() {
        let ids = meetings.iter().map(|m| m.id.clone()).collect();
        query_tasks(conn, &TaskQuery::new().filter_in(TaskField::MeetingId, ids))?
    } else {
        Vec::new()
    };

    Ok(
        attach_tasks(meetings, |m| m.id.as_str(), |t| t.meeting_id.as_deref(), tasks)
            .into_iter()
            .map(|(meeting, tasks)| MeetingWithTasks { meeting, tasks })
            .collect(),
    )
}

fn count(conn: &Connection, sql: &str) -> rusqlite::Result<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

#[async_trait]
impl AnalyticsStore for Database {
    async fn fetch_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskRecord>> {
        let query = query.clone();
        let tasks = self
            .reader()
            .call(move |conn| query_tasks(conn, &query))
            .await?;
        log::debug!("fetched {} tasks", tasks.len());
        Ok(tasks)
    }

    async fn fetch_teams(&self, query: &TeamQuery) -> Result<Vec<Team>> {
        let query = query.clone();
        let teams = self
            .reader()
            .call(move |conn| query_teams(conn, &query))
            .await?;
        log::debug!("fetched {} teams", teams.len());
        Ok(teams)
    }

    async fn fetch_goals(&self, query: &GoalQuery) -> Result<Vec<GoalWithTasks>> {
        let query = query.clone();
        let goals = self
            .reader()
            .call(move |conn| query_goals(conn, &query))
            .await?;
        log::debug!("fetched {} goals", goals.len());
        Ok(goals)
    }

    async fn fetch_meetings(&self, query: &MeetingQuery) -> Result<Vec<MeetingWithTasks>> {
        let query = query.clone();
        let meetings = self
            .reader()
            .call(move |conn| query_meetings(conn, &query))
            .await?;
        log::debug!("fetched {} meetings", meetings.len());
        Ok(meetings)
    }

    async fn fetch_cities(&self) -> Result<Vec<City>> {
        let cities = self
            .reader()
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id, name FROM cities ORDER BY name, id")?;
                let rows = stmt.query_map([], |row| {
                    Ok(City {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;
        Ok(cities)
    }

    async fn entity_counts(&self) -> Result<EntityCounts> {
        let counts = self
            .reader()
            .call(|conn| {
                Ok::<EntityCounts, rusqlite::Error>(EntityCounts {
                    cities: count(conn, "SELECT COUNT(*) FROM cities")?,
                    departments: count(conn, "SELECT COUNT(*) FROM departments")?,
                    teams: count(conn, "SELECT COUNT(*) FROM teams")?,
                    users: count(conn, "SELECT COUNT(*) FROM profiles")?,
                    goals: count(conn, "SELECT COUNT(*) FROM goals")?,
                    active_goals: count(
                        conn,
                        "SELECT COUNT(*) FROM goals WHERE status = 'active'",
                    )?,
                    meetings: count(conn, "SELECT COUNT(*) FROM meetings")?,
                    tasks: count(conn, "SELECT COUNT(*) FROM tasks")?,
                    completed_tasks: count(
                        conn,
                        "SELECT COUNT(*) FROM tasks WHERE status = 'completed'",
                    )?,
                })
            })
            .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::builder::{GoalField, MeetingField, TeamField};
    use crate::query::scope::{DateRange, DepartmentAttribution, ScopeFilter};
    use crate::storage::snapshot::Snapshot;

    const FIXTURE: &str = r#"{
        "cities": [{"id": "c1", "name": "Lagos"}, {"id": "c2", "name": "Accra"}],
        "departments": [{"id": "d1", "name": "Engineering"}, {"id": "d2", "name": "Sales"}],
        "teams": [
            {"id": "tm1", "name": "Platform", "city_id": "c1", "department_id": "d1"},
            {"id": "tm2", "name": "Field", "city_id": "c2", "department_id": "d2"}
        ],
        "profiles": [
            {"id": "u1", "full_name": "Ada", "email": "ada@example.com", "team_id": "tm1"},
            {"id": "u2", "full_name": "Kofi", "email": "kofi@example.com", "team_id": "tm2"},
            {"id": "u3", "full_name": null, "email": "nobody@example.com", "team_id": null}
        ],
        "goals": [
            {"id": "g1", "title": "Ship v2", "description": null, "year": 2025, "quarter": 1,
             "status": "active", "department_id": "d1"},
            {"id": "g2", "title": "Grow", "description": null, "year": 2025, "quarter": 2,
             "status": "draft", "department_id": "d2"}
        ],
        "meetings": [
            {"id": "m1", "title": "Kickoff", "date": "2025-01-06", "status": "completed", "summary": null},
            {"id": "m2", "title": "Review", "date": "2025-02-03", "status": "processing", "summary": null}
        ],
        "tasks": [
            {"id": "t1", "title": "A", "status": "completed", "priority": "urgent",
             "created_at": "2025-01-06T09:00:00Z", "updated_at": "2025-01-07T09:00:00Z",
             "department_id": "d1", "assignee_id": "u1", "goal_id": "g1", "meeting_id": "m1"},
            {"id": "t2", "title": "B", "status": "in_progress", "priority": "bogus",
             "created_at": "2025-01-08T09:00:00Z",
             "department_id": "d2", "assignee_id": "u1", "goal_id": "g1", "meeting_id": "m1"},
            {"id": "t3", "title": "C", "status": "todo", "priority": "low",
             "created_at": "2025-02-03T09:00:00Z",
             "department_id": "d2", "assignee_id": "u2", "goal_id": "g2", "meeting_id": "m2"},
            {"id": "t4", "title": "D", "status": "weird", "priority": null,
             "created_at": "2025-02-04T09:00:00Z",
             "department_id": null, "assignee_id": "u3", "goal_id": null, "meeting_id": null}
        ]
    }"#;

    async fn seeded() -> Database {
        let db = Database::open_memory().await.unwrap();
        db.load_snapshot(Snapshot::from_json(FIXTURE).unwrap())
            .await
            .unwrap();
        db
    }

    fn ids(tasks: &[TaskRecord]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_fetch_tasks_hydrates_relations() {
        let db = seeded().await;
        let tasks = db.fetch_tasks(&TaskQuery::new()).await.unwrap();
        assert_eq!(ids(&tasks), vec!["t1", "t2", "t3", "t4"]);

        let t1 = &tasks[0];
        assert_eq!(t1.status, TaskStatus::Completed);
        assert_eq!(t1.priority, Some(Priority::Urgent));
        assert_eq!(t1.department.as_ref().unwrap().name, "Engineering");
        assert_eq!(t1.team_city_id(), Some("c1"));

        // Unknown values decode leniently.
        assert_eq!(tasks[1].priority, None);
        assert_eq!(tasks[3].status, TaskStatus::Todo);
        // Assignee without a team.
        assert!(tasks[3].assignee_team.is_none());
        assert!(tasks[3].department.is_none());
    }

    #[tokio::test]
    async fn test_fetch_tasks_join_filter_drops_teamless() {
        let db = seeded().await;
        let tasks = db
            .fetch_tasks(&TaskQuery::new().require_team())
            .await
            .unwrap();
        assert_eq!(ids(&tasks), vec!["t1", "t2", "t3"]);

        let tasks = db
            .fetch_tasks(&TaskQuery::new().filter_join_eq(TeamField::CityId, "c1"))
            .await
            .unwrap();
        assert_eq!(ids(&tasks), vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_fetch_tasks_scoped_attribution() {
        let db = seeded().await;
        let direct = db
            .fetch_tasks(
                &TaskQuery::new().scoped(&ScopeFilter::department("d2"), DepartmentAttribution::Direct),
            )
            .await
            .unwrap();
        assert_eq!(ids(&direct), vec!["t2", "t3"]);

        let team = db
            .fetch_tasks(
                &TaskQuery::new().scoped(&ScopeFilter::department("d2"), DepartmentAttribution::Team),
            )
            .await
            .unwrap();
        assert_eq!(ids(&team), vec!["t3"]);
    }

    #[tokio::test]
    async fn test_fetch_tasks_range_and_not_null() {
        let db = seeded().await;
        let range = DateRange::parse(Some("2025-01-07"), Some("2025-01-31")).unwrap();
        let tasks = db
            .fetch_tasks(
                &TaskQuery::new()
                    .filter_not_null(TaskField::UpdatedAt)
                    .filter_range(TaskField::UpdatedAt, &range),
            )
            .await
            .unwrap();
        assert_eq!(ids(&tasks), vec!["t1"]);
    }

    #[tokio::test]
    async fn test_fetch_goals_with_tasks() {
        let db = seeded().await;
        let goals = db
            .fetch_goals(&GoalQuery::new().with_tasks())
            .await
            .unwrap();
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0].goal.id, "g1");
        assert_eq!(ids(&goals[0].tasks), vec!["t1", "t2"]);
        assert_eq!(ids(&goals[1].tasks), vec!["t3"]);

        let goals = db
            .fetch_goals(&GoalQuery::new().filter_eq(GoalField::DepartmentId, "d2"))
            .await
            .unwrap();
        assert_eq!(goals.len(), 1);
        assert!(goals[0].tasks.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_meetings_in_range() {
        let db = seeded().await;
        let range = DateRange::parse(Some("2025-02-01"), None).unwrap();
        let meetings = db
            .fetch_meetings(
                &MeetingQuery::new()
                    .filter_range(MeetingField::Date, &range)
                    .with_tasks(),
            )
            .await
            .unwrap();
        assert_eq!(meetings.len(), 1);
        assert_eq!(meetings[0].meeting.id, "m2");
        assert_eq!(ids(&meetings[0].tasks), vec!["t3"]);
    }

    #[tokio::test]
    async fn test_fetch_teams_and_cities() {
        let db = seeded().await;
        let teams = db
            .fetch_teams(&TeamQuery::new().filter_eq(TeamField::CityId, "c2"))
            .await
            .unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].name, "Field");

        let cities = db.fetch_cities().await.unwrap();
        let names: Vec<&str> = cities.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Accra", "Lagos"]);
    }

    #[tokio::test]
    async fn test_entity_counts() {
        let db = seeded().await;
        let counts = db.entity_counts().await.unwrap();
        assert_eq!(counts.cities, 2);
        assert_eq!(counts.users, 3);
        assert_eq!(counts.goals, 2);
        assert_eq!(counts.active_goals, 1);
        assert_eq!(counts.tasks, 4);
        assert_eq!(counts.completed_tasks, 1);
    }
}
