//! Read-only dashboard aggregates.

use std::collections::{BTreeMap, HashMap};

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use entity::{course, enrollment, user, video};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;

use crate::auth::policy::OwnerScope;
use crate::db::queries::{certificates, courses, enrollments, users, videos};
use crate::error::AppError;

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const MIN_WINDOW_DAYS: i64 = 1;
pub const MAX_WINDOW_DAYS: i64 = 180;
pub const TOP_CATEGORIES: usize = 12;
pub const TOP_COURSES: usize = 5;
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total_users: u64,
    pub total_courses: u64,
    pub total_videos: u64,
    pub total_enrollments: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TopCourse {
    pub id: String,
    pub title: String,
    pub video_count: u64,
    pub enrollment_count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyPoint {
    pub date: String,
    pub value: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Series {
    pub users: Vec<DailyPoint>,
    pub courses: Vec<DailyPoint>,
    pub videos: Vec<DailyPoint>,
    pub enrollments: Vec<DailyPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub window_days: i64,
    pub totals: Totals,
    pub by_category: Vec<CategoryCount>,
    pub top_courses_by_videos: Vec<TopCourse>,
    pub series: Series,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TeacherStats {
    pub courses: u64,
    pub videos: u64,
    pub enrollments: u64,
    pub certificates: u64,
}

/// Parses a `windowDays` value and clamps it into range. Missing or
/// non-numeric input falls back to the default; fractions are truncated.
pub fn window_days(raw: Option<&str>) -> i64 {
    let parsed = raw
        .map(str::trim)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|n| n.is_finite());
    match parsed {
        Some(n) => (n.trunc() as i64).clamp(MIN_WINDOW_DAYS, MAX_WINDOW_DAYS),
        None => DEFAULT_WINDOW_DAYS,
    }
}

/// First day of a window of `days` days ending on `today`, inclusive.
pub fn window_start(today: NaiveDate, days: i64) -> NaiveDate {
    let back = days.clamp(MIN_WINDOW_DAYS, MAX_WINDOW_DAYS) as u64 - 1;
    today.checked_sub_days(Days::new(back)).unwrap_or(today)
}

/// Buckets timestamps by calendar day within `[start, end]`. Only days with
/// at least one entry appear, in ascending order.
pub fn daily_series<I>(timestamps: I, start: NaiveDate, end: NaiveDate) -> Vec<DailyPoint>
where
    I: IntoIterator<Item = NaiveDateTime>,
{
    let mut buckets: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for ts in timestamps {
        let day = ts.date();
        if day >= start && day <= end {
            *buckets.entry(day).or_default() += 1;
        }
    }
    buckets
        .into_iter()
        .map(|(day, value)| DailyPoint {
            date: day.format("%Y-%m-%d").to_string(),
            value,
        })
        .collect()
}

/// Counts categories in first-seen order, then sorts by count descending.
/// The sort is stable, so equal counts keep first-seen order.
pub fn category_breakdown<I>(categories: I) -> Vec<CategoryCount>
where
    I: IntoIterator<Item = String>,
{
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, u64> = HashMap::new();
    for raw in categories {
        let trimmed = raw.trim();
        let name = if trimmed.is_empty() {
            UNCATEGORIZED.to_string()
        } else {
            trimmed.to_string()
        };
        let count = counts.entry(name.clone()).or_insert(0);
        if *count == 0 {
            order.push(name);
        }
        *count += 1;
    }

    let mut breakdown: Vec<CategoryCount> = order
        .into_iter()
        .map(|category| CategoryCount {
            count: counts.get(&category).copied().unwrap_or(0),
            category,
        })
        .collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count));
    breakdown.truncate(TOP_CATEGORIES);
    breakdown
}

/// Ranks courses by video count, descending; ties keep retrieval order.
pub fn top_courses(
    ordered: Vec<(String, String)>,
    video_counts: &HashMap<String, u64>,
    enrollment_counts: &HashMap<String, u64>,
    n: usize,
) -> Vec<TopCourse> {
    let mut ranked: Vec<TopCourse> = ordered
        .into_iter()
        .map(|(id, title)| TopCourse {
            video_count: video_counts.get(&id).copied().unwrap_or(0),
            enrollment_count: enrollment_counts.get(&id).copied().unwrap_or(0),
            id,
            title,
        })
        .collect();
    ranked.sort_by(|a, b| b.video_count.cmp(&a.video_count));
    ranked.truncate(n);
    ranked
}

pub async fn totals<C: ConnectionTrait>(db: &C) -> Result<Totals, AppError> {
    Ok(Totals {
        total_users: users::count(db).await?,
        total_courses: courses::count(db).await?,
        total_videos: videos::count(db).await?,
        total_enrollments: enrollments::count(db).await?,
    })
}

async fn created_since<C, E>(db: &C, column: E::Column, since: NaiveDateTime) -> Result<Vec<NaiveDateTime>, AppError>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    Ok(E::find()
        .select_only()
        .column(column)
        .filter(column.gte(since))
        .into_tuple::<NaiveDateTime>()
        .all(db)
        .await?)
}

/// Everything the admin dashboard shows, computed on request.
pub async fn admin_stats<C: ConnectionTrait>(
    db: &C,
    window: i64,
    today: NaiveDate,
) -> Result<AdminStats, AppError> {
    let totals = totals(db).await?;

    let catalog: Vec<(String, String, String)> = course::Entity::find()
        .select_only()
        .column(course::Column::Id)
        .column(course::Column::Title)
        .column(course::Column::Category)
        .order_by_asc(course::Column::CreatedAt)
        .order_by_asc(course::Column::Id)
        .into_tuple()
        .all(db)
        .await?;
    let by_category = category_breakdown(catalog.iter().map(|(_, _, category)| category.clone()));
    let ordered: Vec<(String, String)> = catalog
        .into_iter()
        .map(|(id, title, _)| (id, title))
        .collect();
    let video_counts = courses::video_counts(db, None).await?;
    let enrollment_counts = courses::enrollment_counts(db, None).await?;
    let top_courses_by_videos = top_courses(ordered, &video_counts, &enrollment_counts, TOP_COURSES);

    let start = window_start(today, window);
    let since = start.and_time(NaiveTime::MIN);
    let series = Series {
        users: daily_series(
            created_since::<_, user::Entity>(db, user::Column::CreatedAt, since).await?,
            start,
            today,
        ),
        courses: daily_series(
            created_since::<_, course::Entity>(db, course::Column::CreatedAt, since).await?,
            start,
            today,
        ),
        videos: daily_series(
            created_since::<_, video::Entity>(db, video::Column::CreatedAt, since).await?,
            start,
            today,
        ),
        enrollments: daily_series(
            created_since::<_, enrollment::Entity>(db, enrollment::Column::CreatedAt, since)
                .await?,
            start,
            today,
        ),
    };

    Ok(AdminStats {
        window_days: window,
        totals,
        by_category,
        top_courses_by_videos,
        series,
    })
}

/// Counts over the courses visible under `scope`.
pub async fn teacher_stats<C: ConnectionTrait>(db: &C, scope: &OwnerScope) -> Result<TeacherStats, AppError> {
    let course_ids = courses::ids_in_scope(db, scope).await?;
    let videos: u64 = courses::video_counts(db, Some(&course_ids))
        .await?
        .values()
        .sum();

    Ok(TeacherStats {
        courses: course_ids.len() as u64,
        videos,
        enrollments: enrollments::count_for_courses(db, &course_ids).await?,
        certificates: certificates::count_for_courses(db, &course_ids).await?,
    })
}
