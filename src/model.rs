//! Records read from the warehouse.
//!
//! These mirror the rows the upload-review-save workflow writes. The
//! analytics layer only reads them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Decode a stored status. Anything that is not `completed` or
    /// `in_progress` lands in the todo bucket.
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => TaskStatus::Completed,
            "in_progress" => TaskStatus::InProgress,
            _ => TaskStatus::Todo,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    Important,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Urgent,
        Priority::Important,
        Priority::Medium,
        Priority::Low,
    ];

    /// Decode a stored priority. Unknown values decode as `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "urgent" => Some(Priority::Urgent),
            "important" => Some(Priority::Important),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::Important => "important",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub city_id: Option<String>,
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: Option<String>,
    pub email: String,
    pub team_id: Option<String>,
}

/// A task together with the relations the reports join through: its own
/// department and its assignee's team.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub department_id: Option<String>,
    pub assignee_id: Option<String>,
    pub goal_id: Option<String>,
    pub meeting_id: Option<String>,
    /// Joined from `departments` through `department_id`.
    pub department: Option<Department>,
    /// Joined from `profiles` → `teams` through `assignee_id`.
    pub assignee_team: Option<Team>,
}

impl TaskRecord {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Department id of the assignee's team, if the task has one.
    pub fn team_department_id(&self) -> Option<&str> {
        self.assignee_team
            .as_ref()
            .and_then(|t| t.department_id.as_deref())
    }

    pub fn team_city_id(&self) -> Option<&str> {
        self.assignee_team.as_ref().and_then(|t| t.city_id.as_deref())
    }

    pub fn team_id(&self) -> Option<&str> {
        self.assignee_team.as_ref().map(|t| t.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub year: i32,
    pub quarter: Option<u8>,
    pub status: Option<String>,
    pub department_id: Option<String>,
}

/// A goal with every task linked to it through `goal_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalWithTasks {
    pub goal: Goal,
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub status: Option<String>,
    pub summary: Option<String>,
}

/// A meeting with every task linked to it through `meeting_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeetingWithTasks {
    pub meeting: Meeting,
    pub tasks: Vec<TaskRecord>,
}

/// Row counts across the warehouse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub cities: u64,
    pub departments: u64,
    pub teams: u64,
    pub users: u64,
    pub goals: u64,
    pub active_goals: u64,
    pub meetings: u64,
    pub tasks: u64,
    pub completed_tasks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_lenient() {
        assert_eq!(TaskStatus::parse("completed"), TaskStatus::Completed);
        assert_eq!(TaskStatus::parse("in_progress"), TaskStatus::InProgress);
        assert_eq!(TaskStatus::parse("todo"), TaskStatus::Todo);
        assert_eq!(TaskStatus::parse("blocked"), TaskStatus::Todo);
    }

    #[test]
    fn test_priority_parse() {
        for p in Priority::ALL {
            assert_eq!(Priority::parse(p.as_str()), Some(p));
        }
        assert_eq!(Priority::parse("critical"), None);
        assert_eq!(Priority::parse(""), None);
    }

    #[test]
    fn test_priority_serde_names() {
        let json = serde_json::to_string(&Priority::Important).unwrap();
        assert_eq!(json, "\"important\"");
        let status: TaskStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, TaskStatus::InProgress);
    }
}
