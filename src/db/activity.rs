use std::collections::HashMap;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::AppError;
use crate::models::UserVisit;

use super::store::JsonStore;

/// Date range of an activity report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityRange {
    Today,
    Yesterday,
    Last7Days,
    Custom(NaiveDate),
}

impl ActivityRange {
    /// `Custom` without a date means today. Unknown names fall back to today.
    pub fn parse(filter: &str, date: Option<NaiveDate>, today: NaiveDate) -> Self {
        match filter {
            "Yesterday" => ActivityRange::Yesterday,
            "Last7Days" => ActivityRange::Last7Days,
            "Custom" => ActivityRange::Custom(date.unwrap_or(today)),
            _ => ActivityRange::Today,
        }
    }

    /// Inclusive first and last day covered.
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match *self {
            ActivityRange::Today => (today, today),
            ActivityRange::Yesterday => {
                let day = today - Duration::days(1);
                (day, day)
            }
            ActivityRange::Last7Days => (today - Duration::days(6), today),
            ActivityRange::Custom(day) => (day, day),
        }
    }

    pub fn display_date(&self, today: NaiveDate) -> String {
        match self {
            ActivityRange::Last7Days => "Last 7 Days".to_string(),
            _ => self.bounds(today).0.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn contains(&self, timestamp: NaiveDateTime, today: NaiveDate) -> bool {
        let (first, last) = self.bounds(today);
        let day = timestamp.date();
        day >= first && day <= last
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserActivityStat {
    pub user_email: String,
    pub visit_count: usize,
    pub last_seen: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityReport {
    pub display_date: String,
    pub total_unique_users: usize,
    pub total_visits: usize,
    pub user_stats: Vec<UserActivityStat>,
}

#[instrument(skip(store))]
pub async fn log_visit(store: &JsonStore<UserVisit>, email: &str, page_url: &str) -> Result<(), AppError> {
    debug!("Recording visit");
    store
        .append(UserVisit {
            user_email: email.to_string(),
            timestamp: Local::now().naive_local(),
            page_url: page_url.to_string(),
        })
        .await
}

/// Per-user visit counts in the range, most recently seen first.
pub fn build_report(visits: &[UserVisit], range: ActivityRange, today: NaiveDate) -> ActivityReport {
    let mut per_user: HashMap<&str, UserActivityStat> = HashMap::new();
    let mut total_visits = 0;

    for visit in visits.iter().filter(|v| range.contains(v.timestamp, today)) {
        total_visits += 1;
        let stat = per_user
            .entry(visit.user_email.as_str())
            .or_insert_with(|| UserActivityStat {
                user_email: visit.user_email.clone(),
                visit_count: 0,
                last_seen: visit.timestamp,
            });
        stat.visit_count += 1;
        stat.last_seen = stat.last_seen.max(visit.timestamp);
    }

    let mut user_stats: Vec<UserActivityStat> = per_user.into_values().collect();
    user_stats.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));

    ActivityReport {
        display_date: range.display_date(today),
        total_unique_users: user_stats.len(),
        total_visits,
        user_stats,
    }
}

#[instrument(skip(store))]
pub async fn report(
    store: &JsonStore<UserVisit>,
    range: ActivityRange,
    today: NaiveDate,
) -> Result<ActivityReport, AppError> {
    let visits = store.get_all().await?;
    Ok(build_report(&visits, range, today))
}

/// One user's visits in the range, newest first.
#[instrument(skip(store))]
pub async fn user_visits(
    store: &JsonStore<UserVisit>,
    email: &str,
    range: ActivityRange,
    today: NaiveDate,
) -> Result<Vec<UserVisit>, AppError> {
    let mut visits = store
        .filter(|v| v.user_email == email && range.contains(v.timestamp, today))
        .await?;
    visits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(visits)
}
