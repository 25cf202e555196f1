use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use axum::{
    extract::{ConnectInfo, Path, Query},
    http::{header, HeaderMap},
    middleware,
    response::IntoResponse,
    routing::{get, post, MethodRouter},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::*,
    error::HttpError,
    middleware::{auth, optional_auth, submitter_context, JWTAuthMiddeware},
    models::complaintmodel::Complaint,
    service::{
        complaint_service::{NewCommentInput, NewSubmission, RequestContext, SubmissionOrigin},
        lifecycle::{Actor, Transition},
    },
    AppState,
};

const MAX_USER_AGENT_CHARS: usize = 512;

fn authed(route: MethodRouter) -> MethodRouter {
    route.layer(middleware::from_fn(auth))
}

fn public(route: MethodRouter) -> MethodRouter {
    route.layer(middleware::from_fn(optional_auth))
}

pub fn complaints_handler() -> Router {
    Router::new()
        .route(
            "/",
            public(post(submit_complaint)).merge(authed(get(list_complaints))),
        )
        .route("/track/:reference", public(get(track_complaint)))
        .route("/track/:reference/confirm", public(post(confirm_resolution)))
        .route("/track/:reference/dispute", public(post(dispute_resolution)))
        .route(
            "/track/:reference/comments",
            public(get(get_tracking_comments).post(post_tracking_comment)),
        )
        .route("/stats", authed(get(get_stats)))
        .route("/mine", authed(get(get_my_complaints)))
        .route("/:complaint_id", authed(get(get_complaint)))
        .route("/:complaint_id/verify", authed(post(verify_complaint)))
        .route("/:complaint_id/reject", authed(post(reject_complaint)))
        .route("/:complaint_id/start", authed(post(start_complaint)))
        .route("/:complaint_id/resolve", authed(post(resolve_complaint)))
        .route(
            "/:complaint_id/comments",
            authed(get(get_staff_comments).post(post_staff_comment)),
        )
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`, then the socket peer. Only values
/// that parse as an IP address count; the stored key is the normalised address.
pub fn submission_origin(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> SubmissionOrigin {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let forwarded = header_value("x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .and_then(parse_ip);
    if header_value("x-forwarded-for").is_some() && forwarded.is_none() {
        tracing::warn!("Ignoring malformed X-Forwarded-For header");
    }

    let ip_address = forwarded
        .or_else(|| header_value("x-real-ip").and_then(parse_ip))
        .or_else(|| peer.map(|addr| addr.ip()))
        .map(|ip| ip.to_string());

    SubmissionOrigin {
        ip_address,
        user_agent: header_value(header::USER_AGENT.as_str())
            .map(|agent| agent.chars().take(MAX_USER_AGENT_CHARS).collect()),
    }
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse::<IpAddr>().ok()
}

fn complaint_response(complaint: Complaint) -> Json<ComplaintResponseDto> {
    Json(ComplaintResponseDto {
        status: "success".to_string(),
        data: complaint,
    })
}

pub async fn submit_complaint(
    Extension(app_state): Extension<Arc<AppState>>,
    user: Option<Extension<JWTAuthMiddeware>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<SubmitComplaintDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let ctx = submitter_context(user.as_deref());
    let origin = submission_origin(&headers, peer.map(|ConnectInfo(addr)| addr));

    let complaint = app_state
        .complaint_service
        .submit(
            &ctx,
            NewSubmission {
                category: body.category,
                description: body.description,
                name: body.name,
                email: body.email,
                student_id: body.student_id,
                is_anonymous: body.is_anonymous,
                attachment: body.attachment,
                origin,
            },
        )
        .await?;

    Ok(Json(SubmittedComplaintDto {
        status: "success".to_string(),
        reference_number: complaint.reference_number.clone(),
        data: complaint,
    }))
}

pub async fn track_complaint(
    Path(reference): Path<String>,
    Extension(app_state): Extension<Arc<AppState>>,
    user: Option<Extension<JWTAuthMiddeware>>,
) -> Result<impl IntoResponse, HttpError> {
    let ctx = submitter_context(user.as_deref());
    let details = app_state.complaint_service.track(&ctx, &reference).await?;

    Ok(Json(ComplaintDetailsResponseDto {
        status: "success".to_string(),
        data: details,
    }))
}

pub async fn confirm_resolution(
    Path(reference): Path<String>,
    Extension(app_state): Extension<Arc<AppState>>,
    user: Option<Extension<JWTAuthMiddeware>>,
) -> Result<impl IntoResponse, HttpError> {
    let ctx = submitter_context(user.as_deref());
    let complaint = app_state
        .complaint_service
        .transition_by_reference(&ctx, &reference, Transition::Confirm)
        .await?;

    Ok(complaint_response(complaint))
}

pub async fn dispute_resolution(
    Path(reference): Path<String>,
    Extension(app_state): Extension<Arc<AppState>>,
    user: Option<Extension<JWTAuthMiddeware>>,
    Json(body): Json<DisputeDto>,
) -> Result<impl IntoResponse, HttpError> {
    let ctx = submitter_context(user.as_deref());
    let complaint = app_state
        .complaint_service
        .transition_by_reference(&ctx, &reference, Transition::Dispute { reason: body.reason })
        .await?;

    Ok(complaint_response(complaint))
}

pub async fn get_tracking_comments(
    Path(reference): Path<String>,
    Extension(app_state): Extension<Arc<AppState>>,
    user: Option<Extension<JWTAuthMiddeware>>,
) -> Result<impl IntoResponse, HttpError> {
    let ctx = submitter_context(user.as_deref());
    let service = &app_state.complaint_service;
    let complaint = service.find_by_reference(&reference).await?;
    let comments = service.comments(&ctx, &complaint).await?;

    Ok(Json(CommentListResponseDto {
        status: "success".to_string(),
        data: comments,
    }))
}

pub async fn post_tracking_comment(
    Path(reference): Path<String>,
    Extension(app_state): Extension<Arc<AppState>>,
    user: Option<Extension<JWTAuthMiddeware>>,
    Json(body): Json<CommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let ctx = submitter_context(user.as_deref());
    let service = &app_state.complaint_service;
    let complaint = service.find_by_reference(&reference).await?;
    let comment = service
        .post_comment(
            &ctx,
            &complaint,
            NewCommentInput {
                content: body.content,
                is_internal: false,
            },
        )
        .await?;

    Ok(Json(CommentResponseDto {
        status: "success".to_string(),
        data: comment,
    }))
}

pub async fn list_complaints(
    Query(query_params): Query<ComplaintQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = app_state
        .complaint_service
        .list(&user.context(), query_params.into())
        .await?;

    Ok(Json(ComplaintListResponseDto {
        status: "success".to_string(),
        data: page,
    }))
}

/// Complaints the signed-in account submitted itself, whatever its role.
pub async fn get_my_complaints(
    Query(query_params): Query<ComplaintQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let ctx = RequestContext::new(
        Actor::Submitter {
            account_id: Some(user.user.id),
        },
        Utc::now(),
    );
    let page = app_state
        .complaint_service
        .list(&ctx, query_params.into())
        .await?;

    Ok(Json(ComplaintListResponseDto {
        status: "success".to_string(),
        data: page,
    }))
}

pub async fn get_stats(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let stats = app_state.complaint_service.stats(&user.context()).await?;

    Ok(Json(ComplaintStatsResponseDto {
        status: "success".to_string(),
        data: stats,
    }))
}

pub async fn get_complaint(
    Path(complaint_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let details = app_state
        .complaint_service
        .details_for_staff(&user.context(), complaint_id)
        .await?;

    Ok(Json(ComplaintDetailsResponseDto {
        status: "success".to_string(),
        data: details,
    }))
}

pub async fn verify_complaint(
    Path(complaint_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<VerifyComplaintDto>,
) -> Result<impl IntoResponse, HttpError> {
    let complaint = app_state
        .complaint_service
        .transition(
            &user.context(),
            complaint_id,
            Transition::Verify {
                department: body.department,
                remarks: body.remarks,
            },
        )
        .await?;

    Ok(complaint_response(complaint))
}

pub async fn reject_complaint(
    Path(complaint_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<RemarksDto>,
) -> Result<impl IntoResponse, HttpError> {
    let complaint = app_state
        .complaint_service
        .transition(
            &user.context(),
            complaint_id,
            Transition::Reject {
                remarks: body.remarks,
            },
        )
        .await?;

    Ok(complaint_response(complaint))
}

pub async fn start_complaint(
    Path(complaint_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<RemarksDto>,
) -> Result<impl IntoResponse, HttpError> {
    let complaint = app_state
        .complaint_service
        .transition(
            &user.context(),
            complaint_id,
            Transition::Start {
                remarks: body.remarks,
            },
        )
        .await?;

    Ok(complaint_response(complaint))
}

pub async fn resolve_complaint(
    Path(complaint_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<ResolveComplaintDto>,
) -> Result<impl IntoResponse, HttpError> {
    let ctx = user.context();
    let service = &app_state.complaint_service;

    // Check scope before uploading anything on the caller's behalf.
    service.visible_complaint(&ctx, complaint_id).await?;
    let attachment_url = service
        .store_attachment("resolutions", body.resolution_image)
        .await?;

    let complaint = service
        .transition(
            &ctx,
            complaint_id,
            Transition::Resolve {
                details: body.resolution_details,
                attachment_url,
                remarks: body.remarks,
            },
        )
        .await?;

    Ok(complaint_response(complaint))
}

pub async fn get_staff_comments(
    Path(complaint_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let ctx = user.context();
    let service = &app_state.complaint_service;
    let complaint = service.visible_complaint(&ctx, complaint_id).await?;
    let comments = service.comments(&ctx, &complaint).await?;

    Ok(Json(CommentListResponseDto {
        status: "success".to_string(),
        data: comments,
    }))
}

pub async fn post_staff_comment(
    Path(complaint_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<CommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let ctx = user.context();
    let service = &app_state.complaint_service;
    let complaint = service.visible_complaint(&ctx, complaint_id).await?;
    let comment = service
        .post_comment(
            &ctx,
            &complaint,
            NewCommentInput {
                content: body.content,
                is_internal: body.is_internal,
            },
        )
        .await?;

    Ok(Json(CommentResponseDto {
        status: "success".to_string(),
        data: comment,
    }))
}
