//! API models for request and response payloads

use classroom::models::{ClassStatus, EnrollmentStatus, InvoiceStatus, TutorStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for submitting a payment proof
#[derive(Debug, Deserialize)]
pub struct SubmitProofRequest {
    pub proof_url: String,
    pub method: Option<String>,
}

/// Request body for an admin payment review
#[derive(Debug, Deserialize)]
pub struct ReviewPaymentRequest {
    pub approve: bool,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct PublishResponse {
    pub ok: bool,
    pub status: ClassStatus,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub ok: bool,
    pub session_id: Uuid,
}

#[derive(Serialize)]
pub struct EnrollResponse {
    pub ok: bool,
    pub enrollment_id: Uuid,
    pub invoice_id: String,
}

#[derive(Serialize)]
pub struct UnenrollResponse {
    pub ok: bool,
    pub status: EnrollmentStatus,
}

#[derive(Serialize)]
pub struct SubmitProofResponse {
    pub ok: bool,
    pub payment_id: Uuid,
}

/// Invoice status after a review, or the rolled-up status of an enrollment
#[derive(Serialize)]
pub struct InvoiceStatusResponse {
    pub status: InvoiceStatus,
}

#[derive(Serialize)]
pub struct TutorReviewResponse {
    pub ok: bool,
    pub tutor_id: Uuid,
    pub status: TutorStatus,
}
