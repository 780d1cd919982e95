use rusqlite::{params, Connection, OptionalExtension};

use crate::date_util::format_timestamp;
use crate::model::{City, Department, Profile, Team};
use crate::storage::snapshot::{GoalRow, MeetingRow, TaskRow};

// ── Organization ───────────────────────────────────────────────────

pub fn upsert_city(conn: &Connection, city: &City) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO cities (id, name) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET name=excluded.name",
        params![city.id, city.name],
    )?;
    Ok(())
}

pub fn upsert_department(conn: &Connection, dept: &Department) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO departments (id, name) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET name=excluded.name",
        params![dept.id, dept.name],
    )?;
    Ok(())
}

pub fn upsert_team(conn: &Connection, team: &Team) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO teams (id, name, city_id, department_id) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            name=excluded.name, city_id=excluded.city_id,
            department_id=excluded.department_id",
        params![team.id, team.name, team.city_id, team.department_id],
    )?;
    Ok(())
}

pub fn upsert_profile(conn: &Connection, profile: &Profile) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO profiles (id, full_name, email, team_id) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            full_name=excluded.full_name, email=excluded.email, team_id=excluded.team_id",
        params![profile.id, profile.full_name, profile.email, profile.team_id],
    )?;
    Ok(())
}

// ── Goals & meetings ───────────────────────────────────────────────

pub fn upsert_goal(conn: &Connection, goal: &GoalRow) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO goals (id, title, description, year, quarter, status, department_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            title=excluded.title, description=excluded.description, year=excluded.year,
            quarter=excluded.quarter, status=excluded.status,
            department_id=excluded.department_id",
        params![
            goal.id,
            goal.title,
            goal.description,
            goal.year,
            goal.quarter,
            goal.status,
            goal.department_id,
        ],
    )?;
    Ok(())
}

pub fn upsert_meeting(conn: &Connection, meeting: &MeetingRow) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO meetings (id, title, date, status, summary)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            title=excluded.title, date=excluded.date, status=excluded.status,
            summary=excluded.summary",
        params![
            meeting.id,
            meeting.title,
            format_timestamp(&meeting.date),
            meeting.status,
            meeting.summary,
        ],
    )?;
    Ok(())
}

// ── Tasks ──────────────────────────────────────────────────────────

pub fn upsert_task(conn: &Connection, task: &TaskRow) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO tasks (
            id, title, status, priority, due_date, created_at, updated_at,
            department_id, assignee_id, goal_id, meeting_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(id) DO UPDATE SET
            title=excluded.title, status=excluded.status, priority=excluded.priority,
            due_date=excluded.due_date, created_at=excluded.created_at,
            updated_at=excluded.updated_at, department_id=excluded.department_id,
            assignee_id=excluded.assignee_id, goal_id=excluded.goal_id,
            meeting_id=excluded.meeting_id",
        params![
            task.id,
            task.title,
            task.status,
            task.priority,
            task.due_date.as_ref().map(format_timestamp),
            format_timestamp(&task.created_at),
            task.updated_at.as_ref().map(format_timestamp),
            task.department_id,
            task.assignee_id,
            task.goal_id,
            task.meeting_id,
        ],
    )?;
    Ok(())
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}
