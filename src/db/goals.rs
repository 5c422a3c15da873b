use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{DailyTask, Goal, GoalStatus, Milestone, Priority, ScheduleStatus};

use super::store::{Change, JsonStore, Owned, Record, RecordId};

pub const UNREALISTIC_GOAL: &str = "This goal may not be realistic within the selected time.";

impl Record for Goal {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Owned for Goal {
    type Owner = i64;

    fn owner(&self) -> &i64 {
        &self.user_id
    }
}

#[derive(Debug, Clone)]
pub struct MilestoneDraft {
    pub title: String,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct GoalDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub milestones: Vec<MilestoneDraft>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction {
    AddToDate {
        date: NaiveDate,
        title: String,
        description: String,
    },
    Edit {
        task_id: String,
        title: String,
        description: Option<String>,
    },
    Delete {
        task_id: String,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GoalAnalytics {
    pub score: f64,
    pub completed: usize,
    pub active: usize,
    pub overdue: usize,
    pub total: usize,
    pub success_ratio: f64,
    pub weekly_performance: f64,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Short windows only fit short titles.
pub fn check_realism(draft: &GoalDraft) -> Result<(), AppError> {
    let days = (draft.end_date - draft.start_date).num_days();
    if days < 2 && draft.title.chars().count() > 20 {
        return Err(AppError::Validation(UNREALISTIC_GOAL.to_string()));
    }
    Ok(())
}

/// Evenly spaced checkpoints between the start and end dates. The last one
/// always lands on the end date.
pub fn generate_milestones(title: &str, start: NaiveDate, end: NaiveDate) -> Vec<Milestone> {
    let duration = (end - start).num_days().max(1);
    let count = match duration {
        d if d <= 3 => d,
        d if d <= 7 => 4,
        d if d <= 30 => 6,
        _ => 8,
    };
    let interval = (duration / count).max(1);

    let mut milestones: Vec<Milestone> = (1..=count)
        .map(|i| Milestone {
            id: new_id(),
            title: format!("Phase {}: Achieve key target for {}", i, title),
            due_date: start + Duration::days((i * interval).min(duration)),
            is_completed: false,
            completed_at: None,
        })
        .collect();

    if let Some(last) = milestones.last_mut() {
        if last.due_date < end {
            last.due_date = end;
        }
    }
    milestones
}

/// One focus session for every day of the start date's month.
pub fn generate_month_tasks(
    goal_id: &str,
    user_id: i64,
    title: &str,
    start: NaiveDate,
    now: NaiveDateTime,
) -> Vec<DailyTask> {
    let first = start.with_day(1).unwrap_or(start);
    first
        .iter_days()
        .take_while(|day| day.month() == first.month())
        .map(|date| DailyTask {
            id: new_id(),
            user_id,
            goal_id: goal_id.to_string(),
            title: format!("Focus Session: {}", title),
            description: String::new(),
            date,
            is_completed: false,
            completed_at: None,
            created_date: now,
        })
        .collect()
}

/// Recomputes streak and schedule status. Returns whether either changed.
pub fn refresh_state(goal: &mut Goal, today: NaiveDate) -> bool {
    if goal.daily_tasks.is_empty() {
        return false;
    }

    let mut days: BTreeMap<NaiveDate, bool> = BTreeMap::new();
    for task in &goal.daily_tasks {
        let done = days.entry(task.date).or_insert(true);
        *done = *done && task.is_completed;
    }

    let mut streak = 0;
    let mut day = today - Duration::days(1);
    while days.get(&day) == Some(&true) {
        streak += 1;
        day = day - Duration::days(1);
    }
    if days.get(&today) == Some(&true) {
        streak += 1;
    }

    let schedule_status = if goal.status == GoalStatus::Completed {
        ScheduleStatus::Completed
    } else {
        ScheduleStatus::OnTrack
    };

    let changed = goal.streak != streak || goal.schedule_status != schedule_status;
    goal.streak = streak;
    goal.schedule_status = schedule_status;
    changed
}

fn apply_overdue(goal: &mut Goal, today: NaiveDate) -> bool {
    if goal.status != GoalStatus::Completed
        && goal.status != GoalStatus::Overdue
        && goal.end_date < today
    {
        goal.status = GoalStatus::Overdue;
        return true;
    }
    false
}

/// Progress follows the share of completed daily tasks; a goal without
/// tasks counts as done.
pub fn recompute_progress(goal: &mut Goal, today: NaiveDate) {
    let total = goal.daily_tasks.len();
    let completed = goal.daily_tasks.iter().filter(|t| t.is_completed).count();

    goal.progress = if total == 0 {
        100.0
    } else {
        completed as f64 / total as f64 * 100.0
    };

    if goal.progress >= 100.0 {
        goal.progress = 100.0;
        goal.status = GoalStatus::Completed;
        goal.schedule_status = ScheduleStatus::Completed;
    } else if goal.progress > 0.0 {
        goal.status = GoalStatus::InProgress;
    } else {
        goal.status = GoalStatus::NotStarted;
    }

    refresh_state(goal, today);
    apply_overdue(goal, today);
}

/// The user's goals, newest first, with overdue status, streak and schedule
/// brought up to date. Changes are written back.
#[instrument(skip(store))]
pub async fn get_goals(
    store: &JsonStore<Goal>,
    user_id: i64,
    today: NaiveDate,
) -> Result<Vec<Goal>, AppError> {
    let mut goals = store
        .modify(move |goals| {
            let mut changed = false;
            for goal in goals.iter_mut().filter(|g| g.user_id == user_id) {
                changed |= apply_overdue(goal, today);
                changed |= refresh_state(goal, today);
            }

            let owned: Vec<Goal> = goals
                .iter()
                .filter(|g| g.user_id == user_id)
                .cloned()
                .collect();

            if changed {
                Change::Write(owned)
            } else {
                Change::Keep(owned)
            }
        })
        .await?;

    goals.sort_by(|a, b| b.created_date.cmp(&a.created_date));
    Ok(goals)
}

#[instrument(skip(store, draft), fields(title = %draft.title))]
pub async fn create_goal(
    store: &JsonStore<Goal>,
    user_id: i64,
    draft: GoalDraft,
    now: NaiveDateTime,
) -> Result<Goal, AppError> {
    check_realism(&draft)?;
    info!("Creating goal");

    store
        .modify(move |goals| {
            let id = String::next(goals.iter().map(|g| &g.id));
            let daily_tasks =
                generate_month_tasks(&id, user_id, &draft.title, draft.start_date, now);

            let milestones = if draft.milestones.is_empty() {
                generate_milestones(&draft.title, draft.start_date, draft.end_date)
            } else {
                draft
                    .milestones
                    .into_iter()
                    .map(|m| Milestone {
                        id: new_id(),
                        title: m.title,
                        due_date: m.due_date,
                        is_completed: false,
                        completed_at: None,
                    })
                    .collect()
            };

            let goal = Goal {
                id,
                user_id,
                title: draft.title,
                description: draft.description,
                category: draft.category,
                priority: draft.priority,
                start_date: draft.start_date,
                end_date: draft.end_date,
                milestones,
                daily_tasks,
                progress: 0.0,
                status: GoalStatus::NotStarted,
                schedule_status: ScheduleStatus::OnTrack,
                created_date: now,
                streak: 0,
                last_modified: None,
            };

            goals.push(goal.clone());
            Change::Write(goal)
        })
        .await
}

/// Applies `change` to the owned goal, recomputes its progress and writes it
/// back. Nothing is written when the goal or `change` fails.
async fn change_goal<F>(
    store: &JsonStore<Goal>,
    goal_id: &str,
    user_id: i64,
    today: NaiveDate,
    now: NaiveDateTime,
    change: F,
) -> Result<Goal, AppError>
where
    F: FnOnce(&mut Goal) -> Result<(), AppError> + Send,
{
    store
        .try_modify(move |goals| {
            let goal = goals
                .iter_mut()
                .find(|g| same_id(&g.id, goal_id) && g.user_id == user_id)
                .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))?;

            change(goal)?;
            recompute_progress(goal, today);
            goal.last_modified = Some(now);
            Ok(Change::Write(goal.clone()))
        })
        .await
}

/// Goal, task and milestone ids are uuids and match regardless of case.
fn same_id(stored: &str, given: &str) -> bool {
    stored.eq_ignore_ascii_case(given)
}

fn find_task<'a>(goal: &'a mut Goal, task_id: &str) -> Result<&'a mut DailyTask, AppError> {
    let user_id = goal.user_id;
    goal.daily_tasks
        .iter_mut()
        .find(|t| same_id(&t.id, task_id) && t.user_id == user_id)
        .ok_or_else(|| AppError::NotFound("Task not found.".to_string()))
}

#[instrument(skip(store))]
pub async fn set_milestone_completed(
    store: &JsonStore<Goal>,
    goal_id: &str,
    milestone_id: &str,
    user_id: i64,
    is_completed: bool,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<Goal, AppError> {
    change_goal(store, goal_id, user_id, today, now, move |goal| {
        let milestone = goal
            .milestones
            .iter_mut()
            .find(|m| same_id(&m.id, milestone_id))
            .ok_or_else(|| AppError::NotFound("Milestone not found".to_string()))?;
        milestone.is_completed = is_completed;
        milestone.completed_at = is_completed.then_some(now);
        Ok(())
    })
    .await
}

#[instrument(skip(store))]
pub async fn set_task_completed(
    store: &JsonStore<Goal>,
    goal_id: &str,
    task_id: &str,
    user_id: i64,
    is_completed: bool,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<Goal, AppError> {
    change_goal(store, goal_id, user_id, today, now, move |goal| {
        let task = find_task(goal, task_id)?;
        task.is_completed = is_completed;
        task.completed_at = is_completed.then_some(now);
        Ok(())
    })
    .await
}

#[instrument(skip(store, description))]
pub async fn update_task_detail(
    store: &JsonStore<Goal>,
    goal_id: &str,
    task_id: &str,
    user_id: i64,
    title: String,
    description: String,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<Goal, AppError> {
    change_goal(store, goal_id, user_id, today, now, move |goal| {
        let task = find_task(goal, task_id)?;
        task.title = title;
        task.description = description;
        Ok(())
    })
    .await
}

#[instrument(skip(store))]
pub async fn task_action(
    store: &JsonStore<Goal>,
    goal_id: &str,
    user_id: i64,
    action: TaskAction,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<Goal, AppError> {
    change_goal(store, goal_id, user_id, today, now, move |goal| {
        match action {
            TaskAction::AddToDate {
                date,
                title,
                description,
            } => {
                if goal.daily_tasks.iter().any(|t| t.date == date) {
                    return Err(AppError::Conflict(
                        "A task already exists for this date".to_string(),
                    ));
                }
                goal.daily_tasks.push(DailyTask {
                    id: new_id(),
                    user_id: goal.user_id,
                    goal_id: goal.id.clone(),
                    title,
                    description,
                    date,
                    is_completed: false,
                    completed_at: None,
                    created_date: now,
                });
            }
            TaskAction::Edit {
                task_id,
                title,
                description,
            } => {
                let task = find_task(goal, &task_id)?;
                task.title = title;
                if let Some(description) = description {
                    task.description = description;
                }
            }
            TaskAction::Delete { task_id } => {
                find_task(goal, &task_id)?;
                goal.daily_tasks
                    .retain(|t| !same_id(&t.id, &task_id));
            }
        }
        Ok(())
    })
    .await
}

/// Moves unfinished tasks from past days onto the remaining task days in
/// turn, or onto today when no task days remain.
#[instrument(skip(store))]
pub async fn redistribute_tasks(
    store: &JsonStore<Goal>,
    goal_id: &str,
    user_id: i64,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<Goal, AppError> {
    change_goal(store, goal_id, user_id, today, now, move |goal| {
        let mut future_days: Vec<NaiveDate> = goal
            .daily_tasks
            .iter()
            .map(|t| t.date)
            .filter(|d| *d >= today)
            .collect();
        future_days.sort();
        future_days.dedup();

        let overdue_tasks = goal
            .daily_tasks
            .iter_mut()
            .filter(|t| t.date < today && !t.is_completed);

        for (index, task) in overdue_tasks.enumerate() {
            task.date = if future_days.is_empty() {
                today
            } else {
                future_days[index % future_days.len()]
            };
        }

        goal.daily_tasks.sort_by_key(|t| t.date);
        Ok(())
    })
    .await
}

#[instrument(skip(store))]
pub async fn delete_goal(store: &JsonStore<Goal>, goal_id: &str, user_id: i64) -> Result<bool, AppError> {
    info!("Deleting goal");
    let removed = store
        .remove_where(|g| same_id(&g.id, goal_id) && g.user_id == user_id)
        .await?;
    Ok(!removed.is_empty())
}

/// The goal's tasks keyed by `YYYY-MM-DD`. Unknown goals yield no days.
#[instrument(skip(store))]
pub async fn tasks_by_date(
    store: &JsonStore<Goal>,
    goal_id: &str,
    user_id: i64,
) -> Result<BTreeMap<String, Vec<DailyTask>>, AppError> {
    let goal = store
        .filter(|g| same_id(&g.id, goal_id) && g.user_id == user_id)
        .await?
        .into_iter()
        .next();

    let mut grouped: BTreeMap<String, Vec<DailyTask>> = BTreeMap::new();
    for task in goal.map(|g| g.daily_tasks).unwrap_or_default() {
        grouped
            .entry(task.date.format("%Y-%m-%d").to_string())
            .or_default()
            .push(task);
    }
    Ok(grouped)
}

pub fn compute_analytics(goals: &[Goal], today: NaiveDate) -> GoalAnalytics {
    if goals.is_empty() {
        return GoalAnalytics {
            score: 0.0,
            completed: 0,
            active: 0,
            overdue: 0,
            total: 0,
            success_ratio: 0.0,
            weekly_performance: 0.0,
        };
    }

    let total = goals.len();
    let count = |pred: fn(GoalStatus) -> bool| goals.iter().filter(|g| pred(g.status)).count();
    let completed = count(|s| s == GoalStatus::Completed);
    let active = count(|s| matches!(s, GoalStatus::InProgress | GoalStatus::NotStarted));
    let overdue = count(|s| s == GoalStatus::Overdue);

    let avg_progress = goals.iter().map(|g| g.progress).sum::<f64>() / total as f64;
    let score = completed as f64 / total as f64 * 60.0 + avg_progress / 100.0 * 40.0
        - overdue as f64 * 5.0;

    let week_start = today - Duration::days(6);
    let (week_total, week_done) = goals
        .iter()
        .flat_map(|g| g.daily_tasks.iter())
        .filter(|t| t.date >= week_start && t.date <= today)
        .fold((0usize, 0usize), |(all, done), t| {
            (all + 1, done + usize::from(t.is_completed))
        });
    let weekly = if week_total > 0 {
        week_done as f64 / week_total as f64 * 100.0
    } else {
        0.0
    };

    GoalAnalytics {
        score: round1(score.clamp(0.0, 100.0)),
        completed,
        active,
        overdue,
        total,
        success_ratio: round1(completed as f64 / total as f64 * 100.0),
        weekly_performance: round1(weekly),
    }
}

#[instrument(skip(store))]
pub async fn analytics(
    store: &JsonStore<Goal>,
    user_id: i64,
    today: NaiveDate,
) -> Result<GoalAnalytics, AppError> {
    let goals = get_goals(store, user_id, today).await?;
    Ok(compute_analytics(&goals, today))
}
