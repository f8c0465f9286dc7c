//! Storage port for the transactional core
//!
//! [`Store`] covers the single-record reads and conditional writes the
//! operations need. The one multi-record atomic unit, enrollment, goes
//! through [`Store::transaction`], which hands a [`Transaction`] to a closure
//! and commits only if the closure succeeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::{
    Class, ClassStatus, Enrollment, Invoice, InvoiceStatus, Payment, Session, StudentProfile,
    TutorProfile, TutorStatus, VerifyStatus,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Future returned by transactional work
pub type TxFuture<'a> = BoxFuture<'a, CoreResult<()>>;

/// Transactional work, run against a store-provided handle
pub type TxFn = Box<dyn for<'a> FnOnce(&'a mut dyn Transaction) -> TxFuture<'a> + Send>;

/// Box a closure as [`TxFn`], pinning down its higher-ranked signature
pub fn tx_fn<F>(work: F) -> TxFn
where
    F: for<'a> FnOnce(&'a mut dyn Transaction) -> TxFuture<'a> + Send + 'static,
{
    Box::new(work)
}

/// Handle available inside [`Store::transaction`]
///
/// Implementations guarantee that two transactions which both called
/// `class_for_update` for the same class are serialized.
#[async_trait]
pub trait Transaction: Send {
    /// Read a class and lock it until the transaction ends
    async fn class_for_update(&mut self, class_id: Uuid) -> CoreResult<Option<Class>>;

    /// Count enrollments that hold a seat (active or pending)
    async fn count_seated_enrollments(&mut self, class_id: Uuid) -> CoreResult<i64>;

    async fn student_profile(&mut self, student_id: Uuid) -> CoreResult<Option<StudentProfile>>;

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> CoreResult<()>;

    /// Add `tutor_id` to the student's authorization grants, leaving other
    /// grants untouched
    async fn grant_tutor(&mut self, student_id: Uuid, tutor_id: Uuid) -> CoreResult<()>;

    async fn insert_invoice(&mut self, invoice: &Invoice) -> CoreResult<()>;

    /// Compare-and-swap on invoice status; `false` when the invoice was not
    /// in `from`
    async fn transition_invoice(
        &mut self,
        invoice_id: &str,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> CoreResult<bool>;

    async fn insert_payment(&mut self, payment: &Payment) -> CoreResult<()>;
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> CoreResult<bool>;

    // --- Profiles ---
    async fn tutor_profile(&self, tutor_id: Uuid) -> CoreResult<Option<TutorProfile>>;

    /// Set a tutor's review status, creating the profile if absent
    async fn set_tutor_status(
        &self,
        tutor_id: Uuid,
        status: TutorStatus,
        reviewer: Uuid,
        at: DateTime<Utc>,
    ) -> CoreResult<TutorProfile>;

    async fn student_profile(&self, student_id: Uuid) -> CoreResult<Option<StudentProfile>>;

    /// Upsert a student's name and grade; grants are not touched
    ///
    /// No operation of this crate calls it. Name and grade are owned by the
    /// profile service that writes `student_profiles`; until it has, the
    /// enrollment snapshot of a student is empty.
    async fn save_student_profile(&self, profile: &StudentProfile) -> CoreResult<()>;

    async fn revoke_tutor_grant(&self, student_id: Uuid, tutor_id: Uuid) -> CoreResult<()>;

    // --- Classes ---
    async fn class(&self, class_id: Uuid) -> CoreResult<Option<Class>>;

    async fn insert_class(&self, class: &Class) -> CoreResult<()>;

    async fn classes_for_tutor(
        &self,
        tutor_id: Uuid,
        status: Option<ClassStatus>,
    ) -> CoreResult<Vec<Class>>;

    /// Draft to published; `false` when the class was not a draft
    async fn mark_published(&self, class_id: Uuid, at: DateTime<Utc>) -> CoreResult<bool>;

    // --- Sessions ---
    async fn sessions_for_class(&self, class_id: Uuid) -> CoreResult<Vec<Session>>;

    async fn session(&self, class_id: Uuid, session_id: Uuid) -> CoreResult<Option<Session>>;

    async fn insert_session(&self, session: &Session) -> CoreResult<()>;

    /// Insert unless the class already has a session starting at exactly
    /// `session.start_time`; `false` when nothing was written
    async fn insert_session_if_absent(&self, session: &Session) -> CoreResult<bool>;

    async fn update_session(&self, session: &Session) -> CoreResult<()>;

    async fn recurring_sessions(&self) -> CoreResult<Vec<Session>>;

    /// Sessions of a class starting in `[from, to)`
    async fn sessions_starting_between(
        &self,
        class_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Session>>;

    // --- Enrollments ---
    async fn enrollment(&self, enrollment_id: Uuid) -> CoreResult<Option<Enrollment>>;

    /// Cancel unless already cancelled; `false` when nothing changed
    async fn cancel_enrollment(&self, enrollment_id: Uuid, at: DateTime<Utc>) -> CoreResult<bool>;

    async fn enrollments_for_class(&self, class_id: Uuid) -> CoreResult<Vec<Enrollment>>;

    // --- Invoices ---
    async fn invoice(&self, invoice_id: &str) -> CoreResult<Option<Invoice>>;

    async fn invoices_for_enrollment(&self, enrollment_id: Uuid) -> CoreResult<Vec<Invoice>>;

    /// Create the invoice unless one already exists at that id
    async fn insert_invoice_if_absent(&self, invoice: &Invoice) -> CoreResult<bool>;

    /// Compare-and-swap on invoice status
    async fn transition_invoice(
        &self,
        invoice_id: &str,
        from: InvoiceStatus,
        to: InvoiceStatus,
        reviewer: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> CoreResult<bool>;

    // --- Payments ---
    async fn payment(&self, payment_id: Uuid) -> CoreResult<Option<Payment>>;

    /// Pending to `outcome`; `false` when the payment was already reviewed
    async fn review_payment(
        &self,
        payment_id: Uuid,
        outcome: VerifyStatus,
        reviewer: Uuid,
        at: DateTime<Utc>,
        rejection_reason: Option<&str>,
    ) -> CoreResult<bool>;

    // --- Atomic unit ---
    async fn transaction(&self, work: TxFn) -> CoreResult<()>;
}
