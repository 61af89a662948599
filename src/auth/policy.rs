//! Role and ownership rules for every operation the service exposes.
//!
//! Decisions are pure: callers resolve identity and the owning user id of
//! the target resource first, then ask [`can_perform`]. Roles have no
//! ordering; `Admin` is listed explicitly wherever elevated access applies.

use entity::user::Role;

use crate::error::AppError;

/// Resolved identity of the caller, taken from the current user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // Public catalog reads.
    ListCourses,
    ReadCourse,
    ListVideos,
    ReadVideo,

    // Catalog mutations. Teachers may only touch what they own.
    CreateCourse,
    UpdateCourse,
    DeleteCourse,
    TransferCourse,
    CreateVideo,
    UpdateVideo,
    DeleteVideo,
    ManageMockTests,
    IssueCertificate,
    ViewTeacherDashboard,

    // Operations on the caller's own learning records.
    Enroll,
    MarkWatched,
    ViewOwnProgress,
    ViewOwnCertificates,
    RecordAttempt,
    ViewCourseMockTests,
    Logout,

    // Account management.
    ViewUser,
    UpdateProfile,
    ChangeRole,
    ListUsers,
    DeleteUser,
    ViewStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Public,
    Authenticated,
    OwnerOrAdmin,
    SelfOrAdmin,
    Roles(&'static [Role]),
}

const ADMIN_ONLY: &[Role] = &[Role::Admin];
const STAFF: &[Role] = &[Role::Teacher, Role::Admin];

impl Action {
    fn rule(self) -> Rule {
        use Action::*;
        match self {
            ListCourses | ReadCourse | ListVideos | ReadVideo => Rule::Public,
            CreateCourse | UpdateCourse | DeleteCourse | CreateVideo | UpdateVideo
            | DeleteVideo | ManageMockTests | IssueCertificate => Rule::OwnerOrAdmin,
            ViewTeacherDashboard | ViewUser => Rule::Roles(STAFF),
            Enroll | MarkWatched | ViewOwnProgress | ViewOwnCertificates | RecordAttempt
            | ViewCourseMockTests | Logout => Rule::Authenticated,
            UpdateProfile => Rule::SelfOrAdmin,
            TransferCourse | ChangeRole | ListUsers | DeleteUser | ViewStats => {
                Rule::Roles(ADMIN_ONLY)
            }
        }
    }
}

/// Outcome of a policy check. The two deny variants map to different
/// status codes and must stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Unauthenticated,
    Forbidden,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Decides whether `caller` may perform `action` on a resource owned by
/// `owner_id`.
///
/// For `OwnerOrAdmin` actions a missing `owner_id` means there is no
/// existing resource yet (creation), so only the role is checked.
pub fn can_perform(caller: Option<&Caller>, action: Action, owner_id: Option<&str>) -> Decision {
    let rule = action.rule();
    if rule == Rule::Public {
        return Decision::Allow;
    }

    let Some(caller) = caller else {
        return Decision::Unauthenticated;
    };

    let allowed = match rule {
        Rule::Public | Rule::Authenticated => true,
        Rule::Roles(roles) => roles.contains(&caller.role),
        Rule::OwnerOrAdmin => match caller.role {
            Role::Admin => true,
            Role::Teacher => owner_id.map_or(true, |owner| owner == caller.id),
            Role::User => false,
        },
        Rule::SelfOrAdmin => caller.is_admin() || owner_id == Some(caller.id.as_str()),
    };

    if allowed {
        Decision::Allow
    } else {
        Decision::Forbidden
    }
}

/// [`can_perform`] rendered as the error taxonomy: 401 without identity,
/// 403 with an identity that lacks permission.
pub fn authorize(
    caller: Option<&Caller>,
    action: Action,
    owner_id: Option<&str>,
) -> Result<(), AppError> {
    match can_perform(caller, action, owner_id) {
        Decision::Allow => Ok(()),
        Decision::Unauthenticated => Err(AppError::Unauthorized),
        Decision::Forbidden => {
            tracing::warn!(
                caller_id = caller.map(|c| c.id.as_str()),
                action = ?action,
                "Authorization denied"
            );
            Err(AppError::forbidden(denial_message(action)))
        }
    }
}

fn denial_message(action: Action) -> &'static str {
    match action.rule() {
        Rule::OwnerOrAdmin => "You do not own this resource",
        Rule::SelfOrAdmin => "You can only modify your own account",
        Rule::Roles(roles) if roles == ADMIN_ONLY => "Admin access required",
        Rule::Roles(_) => "Teacher or admin access required",
        Rule::Public | Rule::Authenticated => "Access denied",
    }
}

/// Ownership predicate applied to list queries over owned resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerScope {
    Any,
    Only(String),
}

impl OwnerScope {
    pub fn for_caller(caller: &Caller) -> Self {
        if caller.is_admin() {
            OwnerScope::Any
        } else {
            OwnerScope::Only(caller.id.clone())
        }
    }

    pub fn owner_id(&self) -> Option<&str> {
        match self {
            OwnerScope::Any => None,
            OwnerScope::Only(id) => Some(id),
        }
    }
}
