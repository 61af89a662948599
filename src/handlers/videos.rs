use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use entity::{video, video_progress};
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthenticatedUser;
use crate::auth::policy::{authorize, Action};
use crate::db::pagination::{PageRequest, Paged, Pagination};
use crate::db::queries;
use crate::db::queries::progress::VideoProgressView;
use crate::db::queries::videos::{NewVideo, VideoFilter};
use crate::error::AppError;
use crate::handlers::extract::{AppJson, AppQuery};
use crate::handlers::{optional_text, required};
use crate::AppState;

const DEFAULT_VIDEO_PAGE_SIZE: u64 = 10;

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVideosQuery {
    pub course_id: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoRequest {
    pub title: Option<String>,
    pub link: Option<String>,
    pub img: Option<String>,
    pub description: Option<String>,
    pub views: Option<i64>,
    pub course_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub link: Option<String>,
    pub img: Option<String>,
    pub description: Option<String>,
    pub views: Option<i64>,
    pub course_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    pub id: String,
    pub title: String,
    pub link: String,
    pub img: Option<String>,
    pub description: String,
    pub views: i64,
    pub course_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<video::Model> for VideoResponse {
    fn from(v: video::Model) -> Self {
        Self {
            id: v.id,
            title: v.title,
            link: v.link,
            img: v.img,
            description: v.description,
            views: v.views,
            course_id: v.course_id,
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedResponse {
    pub video_id: String,
    pub watched: bool,
    pub updated_at: NaiveDateTime,
}

impl From<video_progress::Model> for WatchedResponse {
    fn from(p: video_progress::Model) -> Self {
        Self {
            video_id: p.video_id,
            watched: p.watched,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteVideoResponse {
    pub message: String,
}

fn validate_views(views: i64) -> Result<i64, AppError> {
    if views < 0 {
        return Err(AppError::bad_request("views must not be negative"));
    }
    Ok(views)
}

// --- Handlers ---

pub async fn list_videos(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListVideosQuery>,
) -> Result<Json<Paged<VideoResponse>>, AppError> {
    authorize(None, Action::ListVideos, None)?;

    let page = PageRequest::from_query(
        query.page.as_deref(),
        query.limit.as_deref(),
        DEFAULT_VIDEO_PAGE_SIZE,
    );
    let filter = VideoFilter {
        course_id: query.course_id,
        search: query.search,
    };
    let (items, total) = queries::videos::list(&state.db, &filter, page).await?;

    Ok(Json(Paged {
        data: items.into_iter().map(VideoResponse::from).collect(),
        pagination: Pagination::new(page, total),
    }))
}

pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VideoResponse>, AppError> {
    authorize(None, Action::ReadVideo, None)?;

    let video = queries::videos::find_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound("Video"))?;
    Ok(Json(VideoResponse::from(video)))
}

pub async fn create_video(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateVideoRequest>,
) -> Result<(StatusCode, Json<VideoResponse>), AppError> {
    let who = caller.caller();
    authorize(Some(&who), Action::CreateVideo, None)?;

    let title = required(req.title, "title")?;
    let link = required(req.link, "link")?;
    let course_id = required(req.course_id, "courseId")?;
    let views = validate_views(req.views.unwrap_or(0))?;

    let course = queries::courses::get(&state.db, &course_id).await?;
    authorize(Some(&who), Action::CreateVideo, Some(&course.teacher_id))?;

    let video = queries::videos::insert(
        &state.db,
        NewVideo {
            title,
            link,
            img: optional_text(req.img),
            description: req.description.unwrap_or_default(),
            views,
            course_id: course.id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(VideoResponse::from(video))))
}

pub async fn update_video(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateVideoRequest>,
) -> Result<Json<VideoResponse>, AppError> {
    let who = caller.caller();
    let owned = queries::videos::effective_owner(&state.db, &id).await?;
    authorize(Some(&who), Action::UpdateVideo, Some(owned.owner_id()))?;

    // Moving a video also requires owning the destination course.
    let target_course = match optional_text(req.course_id) {
        Some(course_id) if course_id != owned.course.id => {
            let target = queries::courses::get(&state.db, &course_id).await?;
            authorize(Some(&who), Action::UpdateVideo, Some(&target.teacher_id))?;
            Some(target.id)
        }
        _ => None,
    };

    let mut active: video::ActiveModel = owned.video.into();
    if let Some(title) = req.title {
        active.title = Set(required(Some(title), "title")?);
    }
    if let Some(link) = req.link {
        active.link = Set(required(Some(link), "link")?);
    }
    if let Some(img) = req.img {
        active.img = Set(optional_text(Some(img)));
    }
    if let Some(description) = req.description {
        active.description = Set(description);
    }
    if let Some(views) = req.views {
        active.views = Set(validate_views(views)?);
    }
    if let Some(course_id) = target_course {
        active.course_id = Set(course_id);
    }

    let updated = queries::videos::update(&state.db, active).await?;
    Ok(Json(VideoResponse::from(updated)))
}

pub async fn delete_video(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteVideoResponse>, AppError> {
    let owned = queries::videos::effective_owner(&state.db, &id).await?;
    authorize(Some(&caller.caller()), Action::DeleteVideo, Some(owned.owner_id()))?;

    queries::videos::delete_with_progress(&state.db, &owned.video.id).await?;
    tracing::info!(video_id = %owned.video.id, deleted_by = %caller.id(), "Video deleted");

    Ok(Json(DeleteVideoResponse {
        message: "Video deleted".to_string(),
    }))
}

pub async fn mark_watched(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WatchedResponse>, AppError> {
    authorize(Some(&caller.caller()), Action::MarkWatched, None)?;

    let progress = queries::progress::mark_watched(&state.db, caller.id(), &id).await?;
    Ok(Json(WatchedResponse::from(progress)))
}

pub async fn video_progress(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VideoProgressView>, AppError> {
    authorize(Some(&caller.caller()), Action::ViewOwnProgress, None)?;

    let view = queries::progress::video_progress(&state.db, caller.id(), &id).await?;
    Ok(Json(view))
}
