//! JSON snapshot ingestion.
//!
//! A snapshot is an export of the organization as the upload-review-save
//! workflow left it. Loading is an upsert: re-loading the same snapshot is a
//! no-op, and a newer snapshot overwrites rows by id.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::date_util::parse_timestamp;
use crate::error::{Error, Result};
use crate::model::{City, Department, Profile, Team};
use crate::storage::{repository, Database};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub cities: Vec<City>,
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub goals: Vec<GoalRow>,
    #[serde(default)]
    pub meetings: Vec<MeetingRow>,
    #[serde(default)]
    pub tasks: Vec<TaskRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub year: i32,
    pub quarter: Option<u8>,
    pub status: Option<String>,
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRow {
    pub id: String,
    pub title: String,
    #[serde(deserialize_with = "de_timestamp")]
    pub date: DateTime<Utc>,
    pub status: Option<String>,
    pub summary: Option<String>,
}

/// A task as exported. Status and priority stay raw strings; they are
/// decoded leniently on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    #[serde(default = "default_status")]
    pub status: String,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "de_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    pub department_id: Option<String>,
    pub assignee_id: Option<String>,
    pub goal_id: Option<String>,
    pub meeting_id: Option<String>,
}

fn default_status() -> String {
    "todo".to_string()
}

fn de_timestamp<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(d)?;
    parse_timestamp(&s).map_err(serde::de::Error::custom)
}

fn de_opt_timestamp<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(s) if !s.trim().is_empty() => parse_timestamp(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// Row counts written by one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub cities: usize,
    pub departments: usize,
    pub teams: usize,
    pub profiles: usize,
    pub goals: usize,
    pub meetings: usize,
    pub tasks: usize,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Snapshot(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    fn stats(&self) -> LoadStats {
        LoadStats {
            cities: self.cities.len(),
            departments: self.departments.len(),
            teams: self.teams.len(),
            profiles: self.profiles.len(),
            goals: self.goals.len(),
            meetings: self.meetings.len(),
            tasks: self.tasks.len(),
        }
    }
}

fn write_snapshot(conn: &mut rusqlite::Connection, snapshot: &Snapshot) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    // Parents before children so foreign keys resolve.
    for city in &snapshot.cities {
        repository::upsert_city(&tx, city)?;
    }
    for dept in &snapshot.departments {
        repository::upsert_department(&tx, dept)?;
    }
    for team in &snapshot.teams {
        repository::upsert_team(&tx, team)?;
    }
    for profile in &snapshot.profiles {
        repository::upsert_profile(&tx, profile)?;
    }
    for goal in &snapshot.goals {
        repository::upsert_goal(&tx, goal)?;
    }
    for meeting in &snapshot.meetings {
        repository::upsert_meeting(&tx, meeting)?;
    }
    for task in &snapshot.tasks {
        repository::upsert_task(&tx, task)?;
    }
    tx.commit()
}

impl Database {
    /// Write a snapshot in a single transaction. Nothing is written if any
    /// row fails.
    pub async fn load_snapshot(&self, snapshot: Snapshot) -> Result<LoadStats> {
        let stats = snapshot.stats();
        self.writer()
            .call(move |conn| write_snapshot(conn, &snapshot))
            .await?;
        log::info!(
            "loaded snapshot: {} cities, {} departments, {} teams, {} profiles, {} goals, {} meetings, {} tasks",
            stats.cities,
            stats.departments,
            stats.teams,
            stats.profiles,
            stats.goals,
            stats.meetings,
            stats.tasks
        );
        Ok(stats)
    }
}
