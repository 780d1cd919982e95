use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::analytics::types::PriorityAverages;
use crate::model::{Priority, TaskRecord, TaskStatus};

/// An in-progress task older than this many days counts as stuck.
pub const STUCK_IN_PROGRESS_DAYS: f64 = 7.0;

/// Number of overdue tasks sampled into a progress report.
pub const OVERDUE_SAMPLE_SIZE: usize = 5;

/// Group key for tasks without a department.
pub const UNKNOWN_DEPARTMENT: &str = "unknown";

/// Elapsed hours from `start` to `end`. Negative when `end` is earlier.
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 3_600_000.0
}

/// A task is overdue when it has a due date in the past and is not completed.
pub fn is_overdue(task: &TaskRecord, now: DateTime<Utc>) -> bool {
    if task.is_completed() {
        return false;
    }
    task.due_date.is_some_and(|due| due < now)
}

pub fn priority_weight(priority: Option<Priority>) -> u8 {
    match priority {
        Some(Priority::Urgent) => 4,
        Some(Priority::Important) => 3,
        Some(Priority::Medium) => 2,
        Some(Priority::Low) => 1,
        None => 0,
    }
}

/// Priority used for coarse breakdowns: a missing priority counts as medium.
pub fn bucket_priority(priority: Option<Priority>) -> Priority {
    priority.unwrap_or(Priority::Medium)
}

/// Hours a completed task took to close, or `None` if it is not closed.
///
/// Negative values are returned as-is and logged.
pub fn closure_hours(task: &TaskRecord) -> Option<f64> {
    if task.status != TaskStatus::Completed {
        return None;
    }
    let updated = task.updated_at?;
    let hours = hours_between(task.created_at, updated);
    if hours < 0.0 {
        log::warn!(
            "task {} completed {:.1}h before it was created",
            task.id,
            -hours
        );
    }
    Some(hours)
}

/// Overdue, urgent, or in progress for more than [`STUCK_IN_PROGRESS_DAYS`]
/// since creation. A task matching several signals is still one issue.
pub fn is_critical(task: &TaskRecord, now: DateTime<Utc>) -> bool {
    if is_overdue(task, now) || task.priority == Some(Priority::Urgent) {
        return true;
    }
    task.status == TaskStatus::InProgress
        && hours_between(task.created_at, now) / 24.0 > STUCK_IN_PROGRESS_DAYS
}

/// A closure time with the priority it is weighted by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosureEntry {
    pub hours: f64,
    pub priority: Option<Priority>,
}

/// Σ(hours·weight) / Σ(weight) over entries with a non-zero weight; 0 when
/// nothing carries weight.
pub fn weighted_average(entries: &[ClosureEntry]) -> f64 {
    let (total, weight) = entries.iter().fold((0.0, 0u64), |(total, weight), e| {
        let w = priority_weight(e.priority);
        if w == 0 {
            (total, weight)
        } else {
            (total + e.hours * w as f64, weight + w as u64)
        }
    });
    if weight == 0 {
        0.0
    } else {
        total / weight as f64
    }
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    #[allow(clippy::manual_is_multiple_of)]
    let value = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    value
}

pub fn mean(values: &[f64]) -> f64 {
    mean_or_none(values).unwrap_or(0.0)
}

pub fn mean_or_none(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// `part / total * 100`, or 0 when `total` is 0.
pub fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Closure hours collected per priority.
#[derive(Debug, Clone, Default)]
pub struct PriorityBuckets {
    buckets: [Vec<f64>; 4],
}

impl PriorityBuckets {
    fn slot(priority: Priority) -> usize {
        match priority {
            Priority::Urgent => 0,
            Priority::Important => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn push(&mut self, priority: Priority, hours: f64) {
        self.buckets[Self::slot(priority)].push(hours);
    }

    pub fn get(&self, priority: Priority) -> &[f64] {
        &self.buckets[Self::slot(priority)]
    }

    pub fn averages(&self) -> PriorityAverages {
        PriorityAverages {
            urgent: mean_or_none(self.get(Priority::Urgent)),
            important: mean_or_none(self.get(Priority::Important)),
            medium: mean_or_none(self.get(Priority::Medium)),
            low: mean_or_none(self.get(Priority::Low)),
        }
    }
}

/// String-keyed groups that remember first-insertion order.
#[derive(Debug, Clone)]
pub struct OrderedGroups<V> {
    index: HashMap<String, usize>,
    entries: Vec<(String, V)>,
}

impl<V> Default for OrderedGroups<V> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<V> OrderedGroups<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert_with(&mut self, key: &str, init: impl FnOnce() -> V) -> &mut V {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.entries.push((key.to_string(), init()));
                self.index.insert(key.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(String, V)> {
        self.entries
    }

    pub fn into_values(self) -> impl Iterator<Item = V> {
        self.entries.into_iter().map(|(_, v)| v)
    }
}

/// Tasks grouped by `task.department_id`, `"unknown"` for none, in
/// first-seen order.
pub fn group_by_department(tasks: &[TaskRecord]) -> Vec<(String, Vec<&TaskRecord>)> {
    let mut groups = OrderedGroups::new();
    for task in tasks {
        let key = task.department_id.as_deref().unwrap_or(UNKNOWN_DEPARTMENT);
        groups.get_or_insert_with(key, Vec::new).push(task);
    }
    groups.into_entries()
}
