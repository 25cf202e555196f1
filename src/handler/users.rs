use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    middleware,
    response::IntoResponse,
    routing::{delete, get, put},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::*,
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::UserRole,
    service::account_service::NewAccount,
    AppState,
};

pub fn users_handler() -> Router {
    Router::new()
        .route("/me", get(get_me))
        .route(
            "/",
            get(get_users)
                .post(create_user)
                .layer(middleware::from_fn(|state, req, next| {
                    role_check(state, req, next, vec![UserRole::SuperAdmin])
                })),
        )
        .route(
            "/:user_id",
            delete(delete_user).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::SuperAdmin])
            })),
        )
        .route(
            "/:user_id/role",
            put(update_user_role).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::SuperAdmin])
            })),
        )
        .route(
            "/submissions",
            get(get_submission_report).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::SuperAdmin])
            })),
        )
        .route(
            "/audit-log",
            get(get_system_audit_log).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::SuperAdmin])
            })),
        )
}

pub async fn get_me(
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(&user.user),
        },
    }))
}

pub async fn get_users(
    Query(query_params): Query<UserQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let users = app_state
        .account_service
        .list_users(
            query_params.role,
            query_params.search.as_deref(),
            query_params.page.unwrap_or(1),
            query_params.limit.unwrap_or(20),
        )
        .await?;

    Ok(Json(UserListResponseDto {
        status: "success".to_string(),
        users: FilterUserDto::filter_users(&users),
        results: users.len(),
    }))
}

pub async fn create_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let created = app_state
        .account_service
        .create_user(
            &user.user,
            NewAccount {
                name: body.name,
                email: body.email,
                password: body.password,
                role: body.role,
                department: body.department,
            },
        )
        .await?;

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(&created),
        },
    }))
}

pub async fn update_user_role(
    Path(user_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<RoleUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    let updated = app_state
        .account_service
        .update_role(&user.user, user_id, body.role, body.department)
        .await?;

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(&updated),
        },
    }))
}

pub async fn delete_user(
    Path(user_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .account_service
        .delete_user(&user.user, user_id)
        .await?;

    Ok(Json(Response {
        status: "success",
        message: "User deleted".to_string(),
    }))
}

pub async fn get_submission_report(
    Query(query_params): Query<RangeQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let origins = app_state
        .complaint_service
        .submission_report(query_params.range, Utc::now())
        .await?;

    Ok(Json(SubmissionReportResponseDto {
        status: "success".to_string(),
        results: origins.len(),
        origins,
    }))
}

pub async fn get_system_audit_log(
    Query(query_params): Query<RangeQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let since = query_params
        .range
        .since(Utc::now(), app_state.complaint_service.day_offset());
    let entries = app_state.account_service.system_audit_log(since).await?;

    Ok(Json(SystemAuditLogResponseDto {
        status: "success".to_string(),
        results: entries.len(),
        entries,
    }))
}
