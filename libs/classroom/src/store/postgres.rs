//! PostgreSQL store
//!
//! Enrollment transactions lock the class row with `SELECT ... FOR UPDATE`,
//! which serializes concurrent capacity checks for the same class. Status
//! transitions are conditional updates keyed on the expected prior status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use tracing::{info, warn};
use uuid::Uuid;

use super::{Store, Transaction, TxFn};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    Class, ClassStatus, Enrollment, Invoice, InvoiceStatus, Payment, Session, StudentProfile,
    TutorProfile, TutorStatus, VerifyStatus,
};

const CLASS_COLUMNS: &str = "id, tutor_id, subject, grade, area, mode, fee, capacity_seats, \
                             status, created_at, published_at";
const SESSION_COLUMNS: &str = "id, class_id, start_time, end_time, label, venue, \
                               repeat_weekly, weekday, created_at";
const ENROLLMENT_COLUMNS: &str = "id, class_id, student_id, status, enrolled_at, cancelled_at, \
                                  student_name, student_grade";
const INVOICE_COLUMNS: &str = "id, enrollment_id, student_id, amount_due, status, due_date, \
                               period, created_at, reviewed_by, reviewed_at";
const PAYMENT_COLUMNS: &str = "id, invoice_id, student_id, paid_amount, paid_at, method, \
                               proof_url, verify_status, reviewed_by, reviewed_at, rejection_reason";
const TUTOR_COLUMNS: &str = "tutor_id, status, subjects, area_code, reviewed_by, reviewed_at";

fn class_from_row(row: &PgRow) -> CoreResult<Class> {
    let status: String = row.try_get("status")?;
    Ok(Class {
        id: row.try_get("id")?,
        tutor_id: row.try_get("tutor_id")?,
        subject: row.try_get("subject")?,
        grade: row.try_get("grade")?,
        area: row.try_get("area")?,
        mode: row.try_get("mode")?,
        fee: row.try_get("fee")?,
        capacity_seats: row.try_get("capacity_seats")?,
        status: status.parse()?,
        created_at: row.try_get("created_at")?,
        published_at: row.try_get("published_at")?,
    })
}

fn session_from_row(row: &PgRow) -> CoreResult<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        class_id: row.try_get("class_id")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        label: row.try_get("label")?,
        venue: row.try_get("venue")?,
        repeat_weekly: row.try_get("repeat_weekly")?,
        weekday: row.try_get("weekday")?,
        created_at: row.try_get("created_at")?,
    })
}

fn enrollment_from_row(row: &PgRow) -> CoreResult<Enrollment> {
    let status: String = row.try_get("status")?;
    Ok(Enrollment {
        id: row.try_get("id")?,
        class_id: row.try_get("class_id")?,
        student_id: row.try_get("student_id")?,
        status: status.parse()?,
        enrolled_at: row.try_get("enrolled_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
        student_name: row.try_get("student_name")?,
        student_grade: row.try_get("student_grade")?,
    })
}

fn invoice_from_row(row: &PgRow) -> CoreResult<Invoice> {
    let status: String = row.try_get("status")?;
    Ok(Invoice {
        id: row.try_get("id")?,
        enrollment_id: row.try_get("enrollment_id")?,
        student_id: row.try_get("student_id")?,
        amount_due: row.try_get("amount_due")?,
        status: status.parse()?,
        due_date: row.try_get("due_date")?,
        period: row.try_get("period")?,
        created_at: row.try_get("created_at")?,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
    })
}

fn payment_from_row(row: &PgRow) -> CoreResult<Payment> {
    let verify_status: String = row.try_get("verify_status")?;
    Ok(Payment {
        id: row.try_get("id")?,
        invoice_id: row.try_get("invoice_id")?,
        student_id: row.try_get("student_id")?,
        paid_amount: row.try_get("paid_amount")?,
        paid_at: row.try_get("paid_at")?,
        method: row.try_get("method")?,
        proof_url: row.try_get("proof_url")?,
        verify_status: verify_status.parse()?,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        rejection_reason: row.try_get("rejection_reason")?,
    })
}

fn tutor_from_row(row: &PgRow) -> CoreResult<TutorProfile> {
    let status: String = row.try_get("status")?;
    Ok(TutorProfile {
        tutor_id: row.try_get("tutor_id")?,
        status: status.parse()?,
        subjects: row.try_get("subjects")?,
        area_code: row.try_get("area_code")?,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
    })
}

fn collect<T>(rows: &[PgRow], map: fn(&PgRow) -> CoreResult<T>) -> CoreResult<Vec<T>> {
    rows.iter().map(map).collect()
}

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema migrations
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Classroom schema migrations applied");
        Ok(())
    }
}

struct PgTx {
    inner: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTx {
    async fn class_for_update(&mut self, class_id: Uuid) -> CoreResult<Option<Class>> {
        let row = sqlx::query(&format!(
            "SELECT {CLASS_COLUMNS} FROM classes WHERE id = $1 FOR UPDATE"
        ))
        .bind(class_id)
        .fetch_optional(&mut *self.inner)
        .await?;

        row.as_ref().map(class_from_row).transpose()
    }

    async fn count_seated_enrollments(&mut self, class_id: Uuid) -> CoreResult<i64> {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM enrollments \
             WHERE class_id = $1 AND status IN ('active', 'pending')",
        )
        .bind(class_id)
        .fetch_one(&mut *self.inner)
        .await?;

        Ok(taken)
    }

    async fn student_profile(&mut self, student_id: Uuid) -> CoreResult<Option<StudentProfile>> {
        let row = sqlx::query(
            "SELECT student_id, full_name, grade FROM student_profiles WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_optional(&mut *self.inner)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tutors: Vec<Uuid> =
            sqlx::query_scalar("SELECT tutor_id FROM student_tutor_grants WHERE student_id = $1")
                .bind(student_id)
                .fetch_all(&mut *self.inner)
                .await?;

        Ok(Some(StudentProfile {
            student_id: row.try_get("student_id")?,
            full_name: row.try_get("full_name")?,
            grade: row.try_get("grade")?,
            authorized_tutors: tutors.into_iter().collect(),
        }))
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO enrollments (id, class_id, student_id, status, enrolled_at, cancelled_at,
                                     student_name, student_grade)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(enrollment.id)
        .bind(enrollment.class_id)
        .bind(enrollment.student_id)
        .bind(enrollment.status.as_str())
        .bind(enrollment.enrolled_at)
        .bind(enrollment.cancelled_at)
        .bind(&enrollment.student_name)
        .bind(&enrollment.student_grade)
        .execute(&mut *self.inner)
        .await?;

        Ok(())
    }

    async fn grant_tutor(&mut self, student_id: Uuid, tutor_id: Uuid) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO student_tutor_grants (student_id, tutor_id) VALUES ($1, $2) \
             ON CONFLICT (student_id, tutor_id) DO NOTHING",
        )
        .bind(student_id)
        .bind(tutor_id)
        .execute(&mut *self.inner)
        .await?;

        Ok(())
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> CoreResult<()> {
        insert_invoice_query(invoice, false)
            .execute(&mut *self.inner)
            .await?;
        Ok(())
    }

    async fn transition_invoice(
        &mut self,
        invoice_id: &str,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> CoreResult<bool> {
        let result = sqlx::query("UPDATE invoices SET status = $3 WHERE id = $1 AND status = $2")
            .bind(invoice_id)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&mut *self.inner)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, invoice_id, student_id, paid_amount, paid_at, method,
                                  proof_url, verify_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(payment.id)
        .bind(&payment.invoice_id)
        .bind(payment.student_id)
        .bind(payment.paid_amount)
        .bind(payment.paid_at)
        .bind(&payment.method)
        .bind(&payment.proof_url)
        .bind(payment.verify_status.as_str())
        .execute(&mut *self.inner)
        .await?;

        Ok(())
    }
}

fn insert_session_query(
    session: &Session,
    skip_existing_slot: bool,
) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    let sql = if skip_existing_slot {
        r#"
        INSERT INTO class_sessions (id, class_id, start_time, end_time, label, venue,
                                    repeat_weekly, weekday, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (class_id, start_time) DO NOTHING
        "#
    } else {
        r#"
        INSERT INTO class_sessions (id, class_id, start_time, end_time, label, venue,
                                    repeat_weekly, weekday, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#
    };

    sqlx::query(sql)
        .bind(session.id)
        .bind(session.class_id)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(&session.label)
        .bind(&session.venue)
        .bind(session.repeat_weekly)
        .bind(session.weekday)
        .bind(session.created_at)
}

fn insert_invoice_query(
    invoice: &Invoice,
    skip_existing: bool,
) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    let sql = if skip_existing {
        r#"
        INSERT INTO invoices (id, enrollment_id, student_id, amount_due, status, due_date,
                              period, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        "#
    } else {
        r#"
        INSERT INTO invoices (id, enrollment_id, student_id, amount_due, status, due_date,
                              period, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#
    };

    sqlx::query(sql)
        .bind(&invoice.id)
        .bind(invoice.enrollment_id)
        .bind(invoice.student_id)
        .bind(invoice.amount_due)
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(&invoice.period)
        .bind(invoice.created_at)
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> CoreResult<bool> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }

    async fn tutor_profile(&self, tutor_id: Uuid) -> CoreResult<Option<TutorProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {TUTOR_COLUMNS} FROM tutor_profiles WHERE tutor_id = $1"
        ))
        .bind(tutor_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(tutor_from_row).transpose()
    }

    async fn set_tutor_status(
        &self,
        tutor_id: Uuid,
        status: TutorStatus,
        reviewer: Uuid,
        at: DateTime<Utc>,
    ) -> CoreResult<TutorProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tutor_profiles (tutor_id, status, reviewed_by, reviewed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tutor_id) DO UPDATE SET
            status = EXCLUDED.status,
            reviewed_by = EXCLUDED.reviewed_by,
            reviewed_at = EXCLUDED.reviewed_at,
            updated_at = NOW()
            RETURNING {TUTOR_COLUMNS}
            "#
        ))
        .bind(tutor_id)
        .bind(status.as_str())
        .bind(reviewer)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        tutor_from_row(&row)
    }

    async fn student_profile(&self, student_id: Uuid) -> CoreResult<Option<StudentProfile>> {
        let row = sqlx::query(
            "SELECT student_id, full_name, grade FROM student_profiles WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        let tutors: Vec<Uuid> =
            sqlx::query_scalar("SELECT tutor_id FROM student_tutor_grants WHERE student_id = $1")
                .bind(student_id)
                .fetch_all(&self.pool)
                .await?;

        // Grants may exist before the profile row itself does
        match row {
            Some(row) => Ok(Some(StudentProfile {
                student_id: row.try_get("student_id")?,
                full_name: row.try_get("full_name")?,
                grade: row.try_get("grade")?,
                authorized_tutors: tutors.into_iter().collect(),
            })),
            None if !tutors.is_empty() => Ok(Some(StudentProfile {
                student_id,
                full_name: None,
                grade: None,
                authorized_tutors: tutors.into_iter().collect(),
            })),
            None => Ok(None),
        }
    }

    async fn save_student_profile(&self, profile: &StudentProfile) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO student_profiles (student_id, full_name, grade)
            VALUES ($1, $2, $3)
            ON CONFLICT (student_id) DO UPDATE SET
            full_name = EXCLUDED.full_name,
            grade = EXCLUDED.grade,
            updated_at = NOW()
            "#,
        )
        .bind(profile.student_id)
        .bind(&profile.full_name)
        .bind(&profile.grade)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn revoke_tutor_grant(&self, student_id: Uuid, tutor_id: Uuid) -> CoreResult<()> {
        sqlx::query("DELETE FROM student_tutor_grants WHERE student_id = $1 AND tutor_id = $2")
            .bind(student_id)
            .bind(tutor_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn class(&self, class_id: Uuid) -> CoreResult<Option<Class>> {
        let row = sqlx::query(&format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = $1"))
            .bind(class_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(class_from_row).transpose()
    }

    async fn insert_class(&self, class: &Class) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO classes (id, tutor_id, subject, grade, area, mode, fee, capacity_seats,
                                 status, created_at, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(class.id)
        .bind(class.tutor_id)
        .bind(&class.subject)
        .bind(&class.grade)
        .bind(&class.area)
        .bind(&class.mode)
        .bind(class.fee)
        .bind(class.capacity_seats)
        .bind(class.status.as_str())
        .bind(class.created_at)
        .bind(class.published_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn classes_for_tutor(
        &self,
        tutor_id: Uuid,
        status: Option<ClassStatus>,
    ) -> CoreResult<Vec<Class>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLASS_COLUMNS} FROM classes \
             WHERE tutor_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at"
        ))
        .bind(tutor_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        collect(&rows, class_from_row)
    }

    async fn mark_published(&self, class_id: Uuid, at: DateTime<Utc>) -> CoreResult<bool> {
        let result = sqlx::query(
            "UPDATE classes SET status = 'published', published_at = $2 \
             WHERE id = $1 AND status = 'draft'",
        )
        .bind(class_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn sessions_for_class(&self, class_id: Uuid) -> CoreResult<Vec<Session>> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM class_sessions WHERE class_id = $1 ORDER BY start_time"
        ))
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        collect(&rows, session_from_row)
    }

    async fn session(&self, class_id: Uuid, session_id: Uuid) -> CoreResult<Option<Session>> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM class_sessions WHERE id = $1 AND class_id = $2"
        ))
        .bind(session_id)
        .bind(class_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn insert_session(&self, session: &Session) -> CoreResult<()> {
        insert_session_query(session, false)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_session_if_absent(&self, session: &Session) -> CoreResult<bool> {
        let result = insert_session_query(session, true)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_session(&self, session: &Session) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE class_sessions SET
            start_time = $3,
            end_time = $4,
            label = $5,
            venue = $6,
            repeat_weekly = $7,
            weekday = $8
            WHERE id = $1 AND class_id = $2
            "#,
        )
        .bind(session.id)
        .bind(session.class_id)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(&session.label)
        .bind(&session.venue)
        .bind(session.repeat_weekly)
        .bind(session.weekday)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Session"));
        }
        Ok(())
    }

    async fn recurring_sessions(&self) -> CoreResult<Vec<Session>> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM class_sessions WHERE repeat_weekly ORDER BY start_time"
        ))
        .fetch_all(&self.pool)
        .await?;

        collect(&rows, session_from_row)
    }

    async fn sessions_starting_between(
        &self,
        class_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Session>> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM class_sessions \
             WHERE class_id = $1 AND start_time >= $2 AND start_time < $3 \
             ORDER BY start_time"
        ))
        .bind(class_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        collect(&rows, session_from_row)
    }

    async fn enrollment(&self, enrollment_id: Uuid) -> CoreResult<Option<Enrollment>> {
        let row = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1"
        ))
        .bind(enrollment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn cancel_enrollment(&self, enrollment_id: Uuid, at: DateTime<Utc>) -> CoreResult<bool> {
        let result = sqlx::query(
            "UPDATE enrollments SET status = 'cancelled', cancelled_at = $2 \
             WHERE id = $1 AND status <> 'cancelled'",
        )
        .bind(enrollment_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn enrollments_for_class(&self, class_id: Uuid) -> CoreResult<Vec<Enrollment>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE class_id = $1 ORDER BY enrolled_at"
        ))
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        collect(&rows, enrollment_from_row)
    }

    async fn invoice(&self, invoice_id: &str) -> CoreResult<Option<Invoice>> {
        let row = sqlx::query(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(invoice_from_row).transpose()
    }

    async fn invoices_for_enrollment(&self, enrollment_id: Uuid) -> CoreResult<Vec<Invoice>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE enrollment_id = $1 ORDER BY created_at"
        ))
        .bind(enrollment_id)
        .fetch_all(&self.pool)
        .await?;

        collect(&rows, invoice_from_row)
    }

    async fn insert_invoice_if_absent(&self, invoice: &Invoice) -> CoreResult<bool> {
        let result = insert_invoice_query(invoice, true)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn transition_invoice(
        &self,
        invoice_id: &str,
        from: InvoiceStatus,
        to: InvoiceStatus,
        reviewer: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
            status = $3,
            reviewed_by = COALESCE($4, reviewed_by),
            reviewed_at = CASE WHEN $4::uuid IS NULL THEN reviewed_at ELSE $5 END
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(invoice_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(reviewer)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn payment(&self, payment_id: Uuid) -> CoreResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(payment_from_row).transpose()
    }

    async fn review_payment(
        &self,
        payment_id: Uuid,
        outcome: VerifyStatus,
        reviewer: Uuid,
        at: DateTime<Utc>,
        rejection_reason: Option<&str>,
    ) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
            verify_status = $2,
            reviewed_by = $3,
            reviewed_at = $4,
            rejection_reason = $5
            WHERE id = $1 AND verify_status = 'pending'
            "#,
        )
        .bind(payment_id)
        .bind(outcome.as_str())
        .bind(reviewer)
        .bind(at)
        .bind(rejection_reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn transaction(&self, work: TxFn) -> CoreResult<()> {
        let mut tx = PgTx {
            inner: self.pool.begin().await?,
        };

        let outcome = {
            let handle: &mut dyn Transaction = &mut tx;
            work(handle).await
        };

        match outcome {
            Ok(()) => {
                tx.inner.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.inner.rollback().await {
                    warn!("Failed to roll back transaction: {}", rollback);
                }
                Err(e)
            }
        }
    }
}
