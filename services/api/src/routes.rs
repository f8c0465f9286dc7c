//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use classroom::{
    Actor,
    models::{NewClass, SessionRequest},
};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    middleware::auth_middleware,
    models::{
        EnrollResponse, InvoiceStatusResponse, PublishResponse, ReviewPaymentRequest,
        SessionResponse, SubmitProofRequest, SubmitProofResponse, TutorReviewResponse,
        UnenrollResponse,
    },
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/classes", post(create_class))
        .route("/classes/:id/publish", post(publish_class))
        .route("/classes/:id/sessions", post(upsert_session))
        .route("/classes/:id/enroll", post(enroll))
        .route("/enrollments/:id/unenroll", post(unenroll))
        .route("/enrollments/:id/invoices/current", post(current_month_invoice))
        .route("/enrollments/:id/payment-status", get(payment_status))
        .route("/invoices/:id/payments", post(submit_proof))
        .route("/payments/:id/review", post(review_payment))
        .route("/tutors/:id/approve", post(approve_tutor))
        .route("/tutors/:id/revoke", post(revoke_tutor))
        .route("/admin/roll-forward", post(roll_forward))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = match state.classroom.store().health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            warn!("Store health check failed: {}", e);
            false
        }
    };

    Json(json!({
        "status": "ok",
        "service": "api-service",
        "store": store,
    }))
}

/// Create a draft class
pub async fn create_class(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<NewClass>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let class = state.classroom.create_class(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

/// Publish a class after the clash check
pub async fn publish_class(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.classroom.publish_class(&actor, id).await?;
    Ok(Json(PublishResponse { ok: true, status }))
}

/// Create or update a session of the class in the path
pub async fn upsert_session(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(mut request) = payload?;
    request.class_id = Some(id);
    let session_id = state.classroom.upsert_session(&actor, request).await?;
    Ok(Json(SessionResponse {
        ok: true,
        session_id,
    }))
}

/// Enroll the calling student
pub async fn enroll(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state.classroom.enroll(&actor, id).await?;
    Ok(Json(EnrollResponse {
        ok: true,
        enrollment_id: receipt.enrollment_id,
        invoice_id: receipt.invoice_id,
    }))
}

pub async fn unenroll(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.classroom.unenroll(&actor, id).await?;
    Ok(Json(UnenrollResponse { ok: true, status }))
}

/// Ensure this month's invoice exists for an enrollment
pub async fn current_month_invoice(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = state.classroom.current_month_invoice(&actor, id).await?;
    Ok(Json(invoice))
}

pub async fn payment_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.classroom.enrollment_payment_status(&actor, id).await?;
    Ok(Json(InvoiceStatusResponse { status }))
}

/// Attach a payment proof to an invoice
pub async fn submit_proof(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<SubmitProofRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let payment = state
        .classroom
        .submit_proof(&actor, &id, &payload.proof_url, payload.method.as_deref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitProofResponse {
            ok: true,
            payment_id: payment.id,
        }),
    ))
}

pub async fn review_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ReviewPaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let status = state
        .classroom
        .review_payment(&actor, id, payload.approve, payload.reason.as_deref())
        .await?;
    Ok(Json(InvoiceStatusResponse { status }))
}

pub async fn approve_tutor(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.classroom.approve_tutor(&actor, id).await?;
    Ok(Json(TutorReviewResponse {
        ok: true,
        tutor_id: profile.tutor_id,
        status: profile.status,
    }))
}

pub async fn revoke_tutor(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.classroom.revoke_tutor(&actor, id).await?;
    Ok(Json(TutorReviewResponse {
        ok: true,
        tutor_id: profile.tutor_id,
        status: profile.status,
    }))
}

/// Manually run the weekly roll-forward job
pub async fn roll_forward(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.classroom.trigger_roll_forward(&actor).await?;
    Ok(Json(report))
}
