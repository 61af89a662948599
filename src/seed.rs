use chrono::{Days, NaiveTime, Utc};
use entity::user::{self, Role};
use rand::RngCore;
use sea_orm::Set;

use crate::auth::password::hash_password;
use crate::db::pool::Db;
use crate::db::queries;
use crate::db::queries::courses::NewCourse;
use crate::db::queries::users::NewUser;
use crate::db::queries::videos::NewVideo;
use crate::error::AppError;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
pub const DEFAULT_DEMO_PASSWORD: &str = "seedpass123";
const DEMO_TEACHER_EMAIL: &str = "teacher.seed@example.com";
const DEMO_STUDENT_EMAIL: &str = "student.seed@example.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    /// New admin; carries the password when one was generated.
    Created { generated_password: Option<String> },
    Promoted,
    AlreadyAdmin,
}

#[derive(Debug)]
pub struct SeedReport {
    pub admin_email: String,
    pub admin: AdminAction,
    /// Whether demo teacher/student/course rows were written.
    pub demo_catalog: bool,
}

fn generate_password() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

async fn ensure_user(
    db: &Db,
    email: &str,
    name: &str,
    role: Role,
    password: &str,
) -> Result<user::Model, AppError> {
    if let Some(existing) = queries::users::find_by_email(db, email).await? {
        return Ok(existing);
    }
    queries::users::insert(
        db,
        NewUser {
            email: email.to_string(),
            password_hash: hash_password(password)?,
            name: name.to_string(),
            role,
            age: None,
            place: None,
        },
    )
    .await
}

/// Creates or promotes the admin account, then fills an empty catalog with a
/// demo teacher, student, course, videos, enrollment and mock test.
pub async fn bootstrap(
    db: &Db,
    admin_email: &str,
    admin_password: Option<&str>,
    demo_password: &str,
) -> Result<SeedReport, AppError> {
    let admin_email = queries::users::normalize_email(admin_email);

    let admin = match queries::users::find_by_email(db, &admin_email).await? {
        Some(existing) if existing.role == Role::Admin => AdminAction::AlreadyAdmin,
        Some(existing) => {
            let mut active: user::ActiveModel = existing.into();
            active.role = Set(Role::Admin);
            queries::users::update(db, active).await?;
            AdminAction::Promoted
        }
        None => {
            let (password, generated) = match admin_password {
                Some(p) => (p.to_string(), None),
                None => {
                    let p = generate_password();
                    (p.clone(), Some(p))
                }
            };
            crate::auth::password::validate_password(&password)?;
            queries::users::insert(
                db,
                NewUser {
                    email: admin_email.clone(),
                    password_hash: hash_password(&password)?,
                    name: "System Admin".to_string(),
                    role: Role::Admin,
                    age: None,
                    place: None,
                },
            )
            .await?;
            AdminAction::Created {
                generated_password: generated,
            }
        }
    };
    tracing::info!(email = %admin_email, "Admin account ready");

    let demo_catalog = queries::courses::count(db).await? == 0;
    if demo_catalog {
        seed_demo_catalog(db, demo_password).await?;
    }

    Ok(SeedReport {
        admin_email,
        admin,
        demo_catalog,
    })
}

async fn seed_demo_catalog(db: &Db, demo_password: &str) -> Result<(), AppError> {
    let teacher = ensure_user(db, DEMO_TEACHER_EMAIL, "Seed Teacher", Role::Teacher, demo_password).await?;
    let student = ensure_user(db, DEMO_STUDENT_EMAIL, "Seed Student", Role::User, demo_password).await?;

    let course = queries::courses::insert(
        db,
        NewCourse {
            title: "Kubernetes 101".to_string(),
            description: "Intro course created by the seed command.".to_string(),
            category: "DevOps".to_string(),
            price: 0.0,
            teacher_id: teacher.id.clone(),
        },
    )
    .await?;

    for (i, title) in ["Pods and containers", "Deployments", "Services and ingress"]
        .into_iter()
        .enumerate()
    {
        queries::videos::insert(
            db,
            NewVideo {
                title: title.to_string(),
                link: format!("https://videos.example.com/k8s-101/{}", i + 1),
                img: None,
                description: String::new(),
                views: 0,
                course_id: course.id.clone(),
            },
        )
        .await?;
    }

    queries::enrollments::enroll(db, &student.id, &course.id).await?;

    let scheduled = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(7))
        .unwrap_or_else(|| Utc::now().date_naive())
        .and_time(NaiveTime::MIN);
    queries::mock_tests::create(db, &course.id, "Kubernetes 101 midterm".to_string(), scheduled)
        .await?;

    tracing::info!(course_id = %course.id, "Demo catalog seeded");
    Ok(())
}
