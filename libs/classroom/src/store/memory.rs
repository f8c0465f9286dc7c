//! In-memory store
//!
//! All tables sit behind one async mutex. A transaction holds the lock for its
//! whole duration and works on a staged copy, so concurrent transactions are
//! fully serialized and a failed closure leaves no trace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Store, Transaction, TxFn};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    Class, ClassStatus, Enrollment, EnrollmentStatus, Invoice, InvoiceStatus, Payment, Session,
    StudentProfile, TutorProfile, TutorStatus, VerifyStatus,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    tutors: HashMap<Uuid, TutorProfile>,
    students: HashMap<Uuid, StudentProfile>,
    classes: HashMap<Uuid, Class>,
    sessions: HashMap<Uuid, Session>,
    enrollments: HashMap<Uuid, Enrollment>,
    invoices: HashMap<String, Invoice>,
    payments: HashMap<Uuid, Payment>,
}

impl Tables {
    fn sorted_sessions<F>(&self, keep: F) -> Vec<Session>
    where
        F: Fn(&Session) -> bool,
    {
        let mut sessions: Vec<Session> = self
            .sessions
            .values()
            .filter(|s| keep(s))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.start_time);
        sessions
    }
}

/// Store backed by process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryTx {
    staged: Tables,
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn class_for_update(&mut self, class_id: Uuid) -> CoreResult<Option<Class>> {
        Ok(self.staged.classes.get(&class_id).cloned())
    }

    async fn count_seated_enrollments(&mut self, class_id: Uuid) -> CoreResult<i64> {
        let taken = self
            .staged
            .enrollments
            .values()
            .filter(|e| e.class_id == class_id && e.status.holds_seat())
            .count();
        Ok(taken as i64)
    }

    async fn student_profile(&mut self, student_id: Uuid) -> CoreResult<Option<StudentProfile>> {
        Ok(self.staged.students.get(&student_id).cloned())
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> CoreResult<()> {
        self.staged
            .enrollments
            .insert(enrollment.id, enrollment.clone());
        Ok(())
    }

    async fn grant_tutor(&mut self, student_id: Uuid, tutor_id: Uuid) -> CoreResult<()> {
        self.staged
            .students
            .entry(student_id)
            .or_insert_with(|| StudentProfile::new(student_id))
            .authorized_tutors
            .insert(tutor_id);
        Ok(())
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> CoreResult<()> {
        if self.staged.invoices.contains_key(&invoice.id) {
            return Err(CoreError::Internal(format!(
                "Invoice {} already exists",
                invoice.id
            )));
        }
        self.staged
            .invoices
            .insert(invoice.id.clone(), invoice.clone());
        Ok(())
    }

    async fn transition_invoice(
        &mut self,
        invoice_id: &str,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> CoreResult<bool> {
        match self.staged.invoices.get_mut(invoice_id) {
            Some(invoice) if invoice.status == from => {
                invoice.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_payment(&mut self, payment: &Payment) -> CoreResult<()> {
        self.staged.payments.insert(payment.id, payment.clone());
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> CoreResult<bool> {
        Ok(true)
    }

    async fn tutor_profile(&self, tutor_id: Uuid) -> CoreResult<Option<TutorProfile>> {
        Ok(self.tables.lock().await.tutors.get(&tutor_id).cloned())
    }

    async fn set_tutor_status(
        &self,
        tutor_id: Uuid,
        status: TutorStatus,
        reviewer: Uuid,
        at: DateTime<Utc>,
    ) -> CoreResult<TutorProfile> {
        let mut tables = self.tables.lock().await;
        let profile = tables
            .tutors
            .entry(tutor_id)
            .or_insert_with(|| TutorProfile::pending(tutor_id));
        profile.status = status;
        profile.reviewed_by = Some(reviewer);
        profile.reviewed_at = Some(at);
        Ok(profile.clone())
    }

    async fn student_profile(&self, student_id: Uuid) -> CoreResult<Option<StudentProfile>> {
        Ok(self.tables.lock().await.students.get(&student_id).cloned())
    }

    async fn save_student_profile(&self, profile: &StudentProfile) -> CoreResult<()> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .students
            .entry(profile.student_id)
            .or_insert_with(|| StudentProfile::new(profile.student_id));
        stored.full_name = profile.full_name.clone();
        stored.grade = profile.grade.clone();
        Ok(())
    }

    async fn revoke_tutor_grant(&self, student_id: Uuid, tutor_id: Uuid) -> CoreResult<()> {
        if let Some(profile) = self.tables.lock().await.students.get_mut(&student_id) {
            profile.authorized_tutors.remove(&tutor_id);
        }
        Ok(())
    }

    async fn class(&self, class_id: Uuid) -> CoreResult<Option<Class>> {
        Ok(self.tables.lock().await.classes.get(&class_id).cloned())
    }

    async fn insert_class(&self, class: &Class) -> CoreResult<()> {
        self.tables
            .lock()
            .await
            .classes
            .insert(class.id, class.clone());
        Ok(())
    }

    async fn classes_for_tutor(
        &self,
        tutor_id: Uuid,
        status: Option<ClassStatus>,
    ) -> CoreResult<Vec<Class>> {
        let tables = self.tables.lock().await;
        let mut classes: Vec<Class> = tables
            .classes
            .values()
            .filter(|c| c.tutor_id == tutor_id && status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        classes.sort_by_key(|c| c.created_at);
        Ok(classes)
    }

    async fn mark_published(&self, class_id: Uuid, at: DateTime<Utc>) -> CoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.classes.get_mut(&class_id) {
            Some(class) if class.status == ClassStatus::Draft => {
                class.status = ClassStatus::Published;
                class.published_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn sessions_for_class(&self, class_id: Uuid) -> CoreResult<Vec<Session>> {
        let tables = self.tables.lock().await;
        Ok(tables.sorted_sessions(|s| s.class_id == class_id))
    }

    async fn session(&self, class_id: Uuid, session_id: Uuid) -> CoreResult<Option<Session>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .get(&session_id)
            .filter(|s| s.class_id == class_id)
            .cloned())
    }

    async fn insert_session(&self, session: &Session) -> CoreResult<()> {
        self.tables
            .lock()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn insert_session_if_absent(&self, session: &Session) -> CoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let taken = tables
            .sessions
            .values()
            .any(|s| s.class_id == session.class_id && s.start_time == session.start_time);
        if taken {
            return Ok(false);
        }
        tables.sessions.insert(session.id, session.clone());
        Ok(true)
    }

    async fn update_session(&self, session: &Session) -> CoreResult<()> {
        let mut tables = self.tables.lock().await;
        match tables.sessions.get_mut(&session.id) {
            Some(stored) if stored.class_id == session.class_id => {
                *stored = session.clone();
                Ok(())
            }
            _ => Err(CoreError::not_found("Session")),
        }
    }

    async fn recurring_sessions(&self) -> CoreResult<Vec<Session>> {
        let tables = self.tables.lock().await;
        Ok(tables.sorted_sessions(|s| s.repeat_weekly))
    }

    async fn sessions_starting_between(
        &self,
        class_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Session>> {
        let tables = self.tables.lock().await;
        Ok(tables.sorted_sessions(|s| {
            s.class_id == class_id && s.start_time >= from && s.start_time < to
        }))
    }

    async fn enrollment(&self, enrollment_id: Uuid) -> CoreResult<Option<Enrollment>> {
        Ok(self
            .tables
            .lock()
            .await
            .enrollments
            .get(&enrollment_id)
            .cloned())
    }

    async fn cancel_enrollment(&self, enrollment_id: Uuid, at: DateTime<Utc>) -> CoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.enrollments.get_mut(&enrollment_id) {
            Some(e) if e.status != EnrollmentStatus::Cancelled => {
                e.status = EnrollmentStatus::Cancelled;
                e.cancelled_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn enrollments_for_class(&self, class_id: Uuid) -> CoreResult<Vec<Enrollment>> {
        let tables = self.tables.lock().await;
        let mut enrollments: Vec<Enrollment> = tables
            .enrollments
            .values()
            .filter(|e| e.class_id == class_id)
            .cloned()
            .collect();
        enrollments.sort_by_key(|e| e.enrolled_at);
        Ok(enrollments)
    }

    async fn invoice(&self, invoice_id: &str) -> CoreResult<Option<Invoice>> {
        Ok(self.tables.lock().await.invoices.get(invoice_id).cloned())
    }

    async fn invoices_for_enrollment(&self, enrollment_id: Uuid) -> CoreResult<Vec<Invoice>> {
        let tables = self.tables.lock().await;
        let mut invoices: Vec<Invoice> = tables
            .invoices
            .values()
            .filter(|i| i.enrollment_id == enrollment_id)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| i.created_at);
        Ok(invoices)
    }

    async fn insert_invoice_if_absent(&self, invoice: &Invoice) -> CoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.invoices.contains_key(&invoice.id) {
            return Ok(false);
        }
        tables.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(true)
    }

    async fn transition_invoice(
        &self,
        invoice_id: &str,
        from: InvoiceStatus,
        to: InvoiceStatus,
        reviewer: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.invoices.get_mut(invoice_id) {
            Some(invoice) if invoice.status == from => {
                invoice.status = to;
                if reviewer.is_some() {
                    invoice.reviewed_by = reviewer;
                    invoice.reviewed_at = Some(at);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn payment(&self, payment_id: Uuid) -> CoreResult<Option<Payment>> {
        Ok(self.tables.lock().await.payments.get(&payment_id).cloned())
    }

    async fn review_payment(
        &self,
        payment_id: Uuid,
        outcome: VerifyStatus,
        reviewer: Uuid,
        at: DateTime<Utc>,
        rejection_reason: Option<&str>,
    ) -> CoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.payments.get_mut(&payment_id) {
            Some(payment) if payment.verify_status == VerifyStatus::Pending => {
                payment.verify_status = outcome;
                payment.reviewed_by = Some(reviewer);
                payment.reviewed_at = Some(at);
                payment.rejection_reason = rejection_reason.map(str::to_string);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transaction(&self, work: TxFn) -> CoreResult<()> {
        let mut tables = self.tables.lock().await;
        let mut tx = MemoryTx {
            staged: tables.clone(),
        };
        let handle: &mut dyn Transaction = &mut tx;
        work(handle).await?;
        *tables = tx.staged;
        Ok(())
    }
}
