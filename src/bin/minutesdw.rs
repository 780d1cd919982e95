use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use minutesdw::analytics::{self, PriorityAverages};
use minutesdw::{AnalyticsStore, DateRange, Period, ScopeFilter, Snapshot};

#[derive(Parser)]
#[command(name = "minutesdw", about = "Meeting-minutes analytics warehouse CLI")]
struct Cli {
    /// Database path (default: ~/.minutesdw/minutesdw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Load a JSON snapshot of the organization into the warehouse
    Load {
        /// Path to the snapshot file
        path: String,
    },
    /// Run a report
    Report {
        kind: ReportKind,
        /// Restrict to a city (required by city-overview and city-goals)
        #[arg(long)]
        city: Option<String>,
        /// Restrict to a department
        #[arg(long)]
        department: Option<String>,
        /// Restrict to a team
        #[arg(long)]
        team: Option<String>,
        /// Range start (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        from: Option<String>,
        /// Range end (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        to: Option<String>,
        /// Named period (e.g. 2025, 2025-Q1, 2025-03, 2025-W05, 30d, ytd)
        #[arg(long, conflicts_with_all = ["from", "to"])]
        period: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show warehouse status
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportKind {
    Progress,
    CompletionTime,
    WeightedClosure,
    Teams,
    TeamsSupport,
    Departments,
    CityOverview,
    CityGoals,
    Goals,
    Meetings,
    TasksByCity,
    DepartmentProgress,
    ClosureByPriority,
    ClosureByCity,
    Org,
    Dashboard,
}

struct ReportArgs {
    kind: ReportKind,
    scope: ScopeFilter,
    range: DateRange,
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => minutesdw::Database::open_at(path).await?,
        None => minutesdw::Database::open().await?,
    };

    match cli.command {
        Commands::Status => {
            print_status(&db).await?;
        }
        Commands::Config { action } => {
            handle_config(&db, action).await?;
        }
        Commands::Load { path } => {
            let snapshot = Snapshot::from_file(&path)?;
            let stats = db.load_snapshot(snapshot).await?;
            println!("Loaded {path}");
            println!("  Cities:      {}", stats.cities);
            println!("  Departments: {}", stats.departments);
            println!("  Teams:       {}", stats.teams);
            println!("  Profiles:    {}", stats.profiles);
            println!("  Goals:       {}", stats.goals);
            println!("  Meetings:    {}", stats.meetings);
            println!("  Tasks:       {}", stats.tasks);
        }
        Commands::Report {
            kind,
            city,
            department,
            team,
            from,
            to,
            period,
            json,
        } => {
            let range = resolve_range(&db, from.as_deref(), to.as_deref(), period.as_deref()).await?;
            let scope = ScopeFilter {
                org_scope: city.is_none() && department.is_none() && team.is_none(),
                city_id: city,
                department_id: department,
                team_id: team,
            };
            handle_report(&db, ReportArgs { kind, scope, range, json }).await?;
        }
    }

    Ok(())
}

/// Explicit bounds win, then `--period`, then the `default_period` setting.
async fn resolve_range(
    db: &minutesdw::Database,
    from: Option<&str>,
    to: Option<&str>,
    period: Option<&str>,
) -> anyhow::Result<DateRange> {
    if from.is_some() || to.is_some() {
        return Ok(DateRange::parse(from, to)?);
    }
    let period = match period {
        Some(p) => Some(p.to_string()),
        None => db.get_config("default_period").await?,
    };
    match period {
        Some(p) => {
            let p = Period::parse(&p)?;
            log::info!("reporting over {p}");
            Ok(p.to_date_range())
        }
        None => Ok(DateRange::all()),
    }
}

async fn print_status(db: &minutesdw::Database) -> anyhow::Result<()> {
    let counts = db.entity_counts().await?;
    let default_period = db.get_config("default_period").await?;
    println!("Warehouse Status");
    println!("  Cities:      {}", counts.cities);
    println!("  Departments: {}", counts.departments);
    println!("  Teams:       {}", counts.teams);
    println!("  Users:       {}", counts.users);
    println!("  Goals:       {} ({} active)", counts.goals, counts.active_goals);
    println!("  Meetings:    {}", counts.meetings);
    println!("  Tasks:       {} ({} completed)", counts.tasks, counts.completed_tasks);
    println!(
        "  Default period: {}",
        default_period.unwrap_or_else(|| "none".to_string())
    );
    Ok(())
}

async fn handle_config(db: &minutesdw::Database, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match db.get_config(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            if key == "default_period" {
                Period::parse(&value)?;
            }
            db.set_config(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = db.list_config().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn require_city(scope: &ScopeFilter) -> anyhow::Result<&str> {
    scope
        .city_id
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("this report needs --city"))
}

async fn handle_report(db: &minutesdw::Database, args: ReportArgs) -> anyhow::Result<()> {
    let ReportArgs {
        kind,
        scope,
        range,
        json,
    } = args;

    match kind {
        ReportKind::Progress => {
            let r = analytics::task_progress_by_scope(db, &scope, &range).await?;
            if json {
                return print_json(&r);
            }
            let d = &r.distribution;
            println!("Task Progress");
            println!("  Total:       {}", d.total);
            println!("  Completed:   {} ({:.1}%)", d.completed, d.completed_percent);
            println!("  In progress: {} ({:.1}%)", d.in_progress, d.in_progress_percent);
            println!("  Todo:        {} ({:.1}%)", d.todo, d.todo_percent);
            println!("  Completed in period: {}", r.period_activity.completed_count);
            println!("  Overdue:     {}", r.overdue.count);
            for s in &r.overdue.most_overdue_sample {
                println!("    {} {} (due {})", s.id, s.title, s.due_date.format("%Y-%m-%d"));
            }
            let p = &r.priority_breakdown;
            println!(
                "  Priority:    urgent {} / important {} / medium {} / low {}",
                p.urgent, p.important, p.medium, p.low
            );
        }
        ReportKind::CompletionTime => {
            let r = analytics::task_completion_time(db, &scope, &range).await?;
            if json {
                return print_json(&r);
            }
            println!("Completion Time");
            println!("  Average: {:.1}h", r.overall_average_hours);
            print_priority_averages(&r.by_priority);
        }
        ReportKind::WeightedClosure => {
            let r = analytics::weighted_task_closure_time(db, &scope, &range).await?;
            if json {
                return print_json(&r);
            }
            println!("Weighted Closure Time");
            println!("  Weighted average: {:.1}h", r.weighted_average_hours);
            print_priority_averages(&r.by_priority);
        }
        ReportKind::Teams => {
            let r = analytics::team_closure_times(db, &scope, &range).await?;
            if json {
                return print_json(&r);
            }
            println!("Team Closure Times");
            for t in &r {
                println!(
                    "  {:<24} completed {:>4}  avg {:>7.1}h  overdue {:>3}",
                    t.team_name, t.completed_tasks, t.average_close_hours, t.overdue_tasks
                );
            }
        }
        ReportKind::TeamsSupport => {
            let r = analytics::teams_needing_support(db, &scope, &range).await?;
            if json {
                return print_json(&r);
            }
            println!("Teams Needing Support");
            for t in &r {
                println!(
                    "  {:<24} critical {:>3}  overdue {:>3}  avg {:>7.1}h",
                    t.team_name, t.critical_issues, t.overdue_tasks, t.average_close_hours
                );
            }
        }
        ReportKind::Departments => {
            let r = analytics::department_closure_times(db, &scope, &range).await?;
            if json {
                return print_json(&r);
            }
            println!("Department Closure Times");
            for d in &r {
                println!(
                    "  {:<24} completed {:>4}  avg {:>7.1}h  median {:>7.1}h  overdue {:>3}",
                    d.department_name,
                    d.completed_tasks,
                    d.average_close_hours,
                    d.median_close_hours,
                    d.overdue_tasks
                );
            }
        }
        ReportKind::CityOverview => {
            let city = require_city(&scope)?;
            let r = analytics::city_overview(db, city, &range).await?;
            if json {
                return print_json(&r);
            }
            let s = &r.summary;
            println!("City Overview: {city}");
            println!(
                "  Tasks: {} (completed {}, in progress {}, todo {}, overdue {})",
                s.total_tasks, s.completed_tasks, s.in_progress_tasks, s.todo_tasks, s.overdue_tasks
            );
            println!(
                "  Time to close: avg {:.1}h, median {:.1}h",
                r.sla_metrics.average_time_to_close_hours, r.sla_metrics.median_time_to_close_hours
            );
            print_priority_averages(&r.sla_metrics.distribution_by_priority);
            for d in &r.department_breakdown {
                println!(
                    "  {:<24} total {:>4}  completed {:>4}  overdue {:>3}  avg {:>7.1}h",
                    d.department_name,
                    d.total_tasks,
                    d.completed_tasks,
                    d.overdue_tasks,
                    d.average_close_time_hours
                );
            }
        }
        ReportKind::CityGoals => {
            let city = require_city(&scope)?;
            let r = analytics::city_goal_progress(db, city, &range).await?;
            if json {
                return print_json(&r);
            }
            println!("Goal Progress: {city}");
            for g in &r {
                println!(
                    "  {:<32} {:>3}/{:<3} {:>5.1}%",
                    g.goal.title, g.completed_tasks, g.total_tasks, g.progress_percent
                );
            }
        }
        ReportKind::Goals => {
            let r = analytics::goal_summary(db, &scope, &range).await?;
            if json {
                return print_json(&r);
            }
            println!("Goals");
            for g in &r {
                println!(
                    "  {:<32} {:>3}/{:<3} {:>5.1}%  at risk {}",
                    g.goal.title, g.completed_tasks, g.total_tasks, g.progress_percent, g.at_risk_tasks
                );
            }
        }
        ReportKind::Meetings => {
            let r = analytics::meeting_compliance(db, &scope, &range).await?;
            if json {
                return print_json(&r);
            }
            let s = &r.summary;
            println!(
                "Meetings: {} (completed {}, processing {}, failed {})",
                s.total_meetings, s.completed, s.processing, s.failed
            );
            for m in &r.meetings {
                println!(
                    "  {} {:<28} tasks {:>3}  open {:>3}  critical {:>3}",
                    m.date.format("%Y-%m-%d"),
                    m.meeting_title,
                    m.total_tasks,
                    m.open_tasks,
                    m.critical_issues
                );
            }
        }
        ReportKind::TasksByCity => {
            let r = analytics::tasks_by_city(db, &range).await?;
            if json {
                return print_json(&r);
            }
            println!("Tasks by City");
            for c in &r {
                println!(
                    "  {:<20} total {:>4}  done {:>4}  overdue {:>3}  {:>5.1}%",
                    c.city_name, c.total_tasks, c.completed_tasks, c.overdue_tasks, c.completion_rate
                );
            }
        }
        ReportKind::DepartmentProgress => {
            let r = analytics::department_progress(db, scope.city_id.as_deref(), &range).await?;
            if json {
                return print_json(&r);
            }
            println!("Department Progress");
            for d in &r {
                println!(
                    "  {:<16} {:<20} total {:>4}  done {:>4}  {:>5.1}%  avg {:>7.1}h",
                    d.city_name,
                    d.department_name,
                    d.total_tasks,
                    d.completed_tasks,
                    d.completion_rate,
                    d.avg_completion_time_hours
                );
            }
        }
        ReportKind::ClosureByPriority => {
            let r = analytics::closure_time_by_priority(db, &range).await?;
            if json {
                return print_json(&r);
            }
            println!("Closure Time by Priority");
            for p in &r {
                println!(
                    "  {:<10} n={:<4} avg {:>7.1}h  median {:>7.1}h  range {:.1}-{:.1}h",
                    p.priority.as_str(),
                    p.total_completed,
                    p.avg_closure_hours,
                    p.median_closure_hours,
                    p.min_closure_hours,
                    p.max_closure_hours
                );
            }
        }
        ReportKind::ClosureByCity => {
            let r = analytics::closure_time_by_city(db, &range).await?;
            if json {
                return print_json(&r);
            }
            println!("Closure Time by City");
            for c in &r {
                println!(
                    "  {:<20} n={:<4} avg {:>7.1}h  median {:>7.1}h",
                    c.city_name, c.total_completed, c.avg_closure_hours, c.median_closure_hours
                );
            }
        }
        ReportKind::Org => {
            let r = analytics::organization_stats(db).await?;
            if json {
                return print_json(&r);
            }
            println!("Organization");
            println!("  Meetings:    {}", r.total_meetings);
            println!("  Tasks:       {} ({}% completed)", r.total_tasks, r.task_completion_rate);
            println!("  Goals:       {} ({}% active)", r.total_goals, r.goal_active_rate);
            println!("  Departments: {}", r.total_departments);
            println!("  Users:       {}", r.total_users);
        }
        ReportKind::Dashboard => {
            // Dashboards are JSON only.
            if scope.is_scoped() {
                print_json(&analytics::load_scope_dashboard(db, &scope, &range).await?)?;
            } else {
                print_json(&analytics::load_org_dashboard(db, &range).await?)?;
            }
        }
    }
    Ok(())
}

fn print_priority_averages(p: &PriorityAverages) {
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |h| format!("{h:.1}h"));
    println!("  By priority:");
    println!("    Urgent:    {}", fmt(p.urgent));
    println!("    Important: {}", fmt(p.important));
    println!("    Medium:    {}", fmt(p.medium));
    println!("    Low:       {}", fmt(p.low));
}
