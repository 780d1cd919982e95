use chrono::{DateTime, Utc};

use crate::analytics::types::{EntityRef, MeetingComplianceStats, MeetingSummary};
use crate::analytics::util::is_critical;
use crate::error::Result;
use crate::model::{MeetingWithTasks, TaskRecord};
use crate::query::builder::{MeetingField, MeetingQuery};
use crate::query::scope::{DateRange, DepartmentAttribution, ScopeFilter};
use crate::query::AnalyticsStore;

/// Follow-through on the tasks raised in each meeting held within `range`.
pub async fn meeting_compliance<S: AnalyticsStore + ?Sized>(
    store: &S,
    scope: &ScopeFilter,
    range: &DateRange,
) -> Result<MeetingComplianceStats> {
    let meetings = store
        .fetch_meetings(
            &MeetingQuery::new()
                .filter_range(MeetingField::Date, range)
                .with_tasks(),
        )
        .await?;
    Ok(summarize_meetings(&meetings, scope, Utc::now()))
}

/// Narrow each meeting's tasks to the scope and tally the survivors.
///
/// Under an active scope a meeting with no remaining tasks is dropped and
/// does not count toward the status tally.
pub fn summarize_meetings(
    meetings: &[MeetingWithTasks],
    scope: &ScopeFilter,
    now: DateTime<Utc>,
) -> MeetingComplianceStats {
    let mut stats = MeetingComplianceStats::default();
    for m in meetings {
        let tasks: Vec<&TaskRecord> = m
            .tasks
            .iter()
            .filter(|t| scope.matches(t, DepartmentAttribution::Direct))
            .collect();
        if scope.is_scoped() && tasks.is_empty() {
            continue;
        }

        stats.summary.total_meetings += 1;
        match m.meeting.status.as_deref() {
            Some("completed") => stats.summary.completed += 1,
            Some("processing") => stats.summary.processing += 1,
            Some("failed") => stats.summary.failed += 1,
            _ => {}
        }
        stats.meetings.push(summarize_meeting(m, &tasks, now));
    }
    stats
}

fn summarize_meeting(
    m: &MeetingWithTasks,
    tasks: &[&TaskRecord],
    now: DateTime<Utc>,
) -> MeetingSummary {
    let completed = tasks.iter().filter(|t| t.is_completed()).count() as u64;
    let critical = tasks.iter().filter(|t| is_critical(t, now)).count() as u64;

    let mut departments: Vec<EntityRef> = Vec::new();
    let mut teams: Vec<EntityRef> = Vec::new();
    for task in tasks {
        if let Some(ref d) = task.department {
            push_distinct(&mut departments, &d.id, &d.name);
        }
        if let Some(ref t) = task.assignee_team {
            push_distinct(&mut teams, &t.id, &t.name);
        }
    }

    MeetingSummary {
        meeting_id: m.meeting.id.clone(),
        meeting_title: m.meeting.title.clone(),
        date: m.meeting.date,
        status: m.meeting.status.clone(),
        total_tasks: tasks.len() as u64,
        completed_tasks: completed,
        open_tasks: tasks.len() as u64 - completed,
        critical_issues: critical,
        departments_involved: departments,
        teams_involved: teams,
    }
}

fn push_distinct(refs: &mut Vec<EntityRef>, id: &str, name: &str) {
    if !refs.iter().any(|r| r.id == id) {
        refs.push(EntityRef {
            id: id.to_string(),
            name: name.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::util::test_support::*;
    use crate::model::{Meeting, Priority};
    use crate::storage::snapshot::Snapshot;
    use crate::storage::Database;

    fn meeting(id: &str, status: Option<&str>, tasks: Vec<TaskRecord>) -> MeetingWithTasks {
        MeetingWithTasks {
            meeting: Meeting {
                id: id.into(),
                title: format!("Meeting {id}"),
                date: days_ago(3),
                status: status.map(String::from),
                summary: None,
            },
            tasks,
        }
    }

    fn sample() -> Vec<MeetingWithTasks> {
        vec![
            meeting(
                "m1",
                Some("completed"),
                vec![
                    task("a")
                        .department("d1", "Engineering")
                        .team("tm1", "c1", "d1")
                        .closed_after(2)
                        .build(),
                    task("b")
                        .department("d1", "Engineering")
                        .team("tm2", "c2", "d1")
                        .priority(Priority::Urgent)
                        .build(),
                    task("c").department("d2", "Sales").build(),
                ],
            ),
            meeting("m2", Some("processing"), Vec::new()),
            meeting(
                "m3",
                Some("archived"),
                vec![task("d").department("d2", "Sales").build()],
            ),
        ]
    }

    #[test]
    fn test_unscoped_keeps_every_meeting() {
        let stats = summarize_meetings(&sample(), &ScopeFilter::org(), now());
        assert_eq!(stats.summary.total_meetings, 3);
        assert_eq!(stats.summary.completed, 1);
        assert_eq!(stats.summary.processing, 1);
        assert_eq!(stats.summary.failed, 0);

        let m1 = &stats.meetings[0];
        assert_eq!(m1.total_tasks, 3);
        assert_eq!(m1.completed_tasks, 1);
        assert_eq!(m1.open_tasks, 2);
        assert_eq!(m1.critical_issues, 1);
        let depts: Vec<&str> = m1.departments_involved.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(depts, vec!["d1", "d2"]);
        let teams: Vec<&str> = m1.teams_involved.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(teams, vec!["tm1", "tm2"]);

        assert_eq!(stats.meetings[1].total_tasks, 0);
    }

    #[test]
    fn test_scoped_drops_empty_meetings() {
        let stats = summarize_meetings(&sample(), &ScopeFilter::city("c1"), now());
        assert_eq!(stats.summary.total_meetings, 1);
        assert_eq!(stats.summary.processing, 0);
        assert_eq!(stats.meetings.len(), 1);
        assert_eq!(stats.meetings[0].meeting_id, "m1");
        assert_eq!(stats.meetings[0].total_tasks, 1);
        assert_eq!(stats.meetings[0].teams_involved.len(), 1);

        let sales = summarize_meetings(&sample(), &ScopeFilter::department("d2"), now());
        let ids: Vec<&str> = sales.meetings.iter().map(|m| m.meeting_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m3"]);
        assert_eq!(sales.summary.total_meetings, 2);
        assert_eq!(sales.summary.completed, 1);
    }

    #[tokio::test]
    async fn test_meeting_compliance_from_store() {
        let db = Database::open_memory().await.unwrap();
        let json = r#"{
            "departments": [{"id": "d1", "name": "Engineering"}],
            "meetings": [
                {"id": "m1", "title": "Kickoff", "date": "2025-01-06", "status": "completed", "summary": null},
                {"id": "m2", "title": "Retro", "date": "2025-02-03", "status": "failed", "summary": null}
            ],
            "tasks": [
                {"id": "t1", "title": "Draft plan", "status": "completed", "created_at": "2025-01-06",
                 "updated_at": "2025-01-08", "department_id": "d1", "assignee_id": null,
                 "goal_id": null, "meeting_id": "m1"}
            ]
        }"#;
        db.load_snapshot(Snapshot::from_json(json).unwrap())
            .await
            .unwrap();

        let all = meeting_compliance(&db, &ScopeFilter::org(), &DateRange::all())
            .await
            .unwrap();
        assert_eq!(all.summary.total_meetings, 2);
        assert_eq!(all.summary.failed, 1);

        let january = DateRange::parse(Some("2025-01-01"), Some("2025-01-31")).unwrap();
        let scoped = meeting_compliance(&db, &ScopeFilter::department("d1"), &january)
            .await
            .unwrap();
        assert_eq!(scoped.meetings.len(), 1);
        assert_eq!(scoped.meetings[0].completed_tasks, 1);
        assert_eq!(scoped.meetings[0].departments_involved[0].name, "Engineering");
    }
}
