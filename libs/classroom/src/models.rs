//! Domain records owned by the transactional core

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

use crate::clash::Interval;
use crate::error::CoreError;

/// Status columns are persisted as their snake_case text form.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(CoreError::Internal(format!(
                        "Unexpected {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(TutorStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

text_enum!(ClassStatus {
    Draft => "draft",
    Published => "published",
});

text_enum!(EnrollmentStatus {
    Active => "active",
    Pending => "pending",
    Cancelled => "cancelled",
});

text_enum!(InvoiceStatus {
    AwaitingProof => "awaiting_proof",
    UnderReview => "under_review",
    Approved => "approved",
    Rejected => "rejected",
});

text_enum!(VerifyStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

impl EnrollmentStatus {
    /// Active and pending enrollments each hold one seat
    pub fn holds_seat(&self) -> bool {
        matches!(self, EnrollmentStatus::Active | EnrollmentStatus::Pending)
    }
}

impl InvoiceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Approved | InvoiceStatus::Rejected)
    }
}

impl VerifyStatus {
    pub fn invoice_status(&self) -> InvoiceStatus {
        match self {
            VerifyStatus::Pending => InvoiceStatus::UnderReview,
            VerifyStatus::Approved => InvoiceStatus::Approved,
            VerifyStatus::Rejected => InvoiceStatus::Rejected,
        }
    }
}

/// Tutor profile, mutated only by admin review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorProfile {
    pub tutor_id: Uuid,
    pub status: TutorStatus,
    pub subjects: Vec<String>,
    pub area_code: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl TutorProfile {
    pub fn pending(tutor_id: Uuid) -> Self {
        Self {
            tutor_id,
            status: TutorStatus::Pending,
            subjects: Vec::new(),
            area_code: None,
            reviewed_by: None,
            reviewed_at: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == TutorStatus::Approved
    }
}

/// Student profile fields the core snapshots or mutates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: Uuid,
    pub full_name: Option<String>,
    pub grade: Option<String>,
    /// Tutors granted read access to this profile
    pub authorized_tutors: BTreeSet<Uuid>,
}

impl StudentProfile {
    pub fn new(student_id: Uuid) -> Self {
        Self {
            student_id,
            ..Default::default()
        }
    }
}

/// A tutor's class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub subject: String,
    pub grade: Option<String>,
    pub area: Option<String>,
    pub mode: Option<String>,
    /// Fee in the smallest currency unit
    pub fee: i64,
    pub capacity_seats: i32,
    pub status: ClassStatus,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Draft class creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClass {
    /// Owning tutor; only admins may create on behalf of another tutor
    #[serde(default)]
    pub tutor_id: Option<Uuid>,
    pub subject: String,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    pub fee: i64,
    pub capacity_seats: i32,
}

/// One scheduled meeting of a class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub class_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub label: Option<String>,
    pub venue: Option<String>,
    pub repeat_weekly: bool,
    /// Day of week, 0 = Sunday
    pub weekday: Option<i16>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// Weekday number (0 = Sunday) of an instant in the given calendar zone
pub fn weekday_number(at: DateTime<Utc>, zone: &FixedOffset) -> i16 {
    at.with_timezone(zone).weekday().num_days_from_sunday() as i16
}

/// Create-or-update request for a session
///
/// Instants may be given as RFC 3339 text or epoch milliseconds; the latter
/// wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRequest {
    #[serde(default)]
    pub class_id: Option<Uuid>,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub start_ms: Option<i64>,
    #[serde(default)]
    pub end_ms: Option<i64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub repeat_weekly: Option<bool>,
    #[serde(default)]
    pub weekday: Option<i16>,
}

/// Link between one student and one class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub class_id: Uuid,
    pub student_id: Uuid,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Snapshot taken at enrollment time
    pub student_name: Option<String>,
    pub student_grade: Option<String>,
}

/// Financial obligation attached to an enrollment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub enrollment_id: Uuid,
    pub student_id: Uuid,
    pub amount_due: i64,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    /// Billing period (`YYYY-MM`) for recurring invoices
    pub period: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// One submitted proof of payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: String,
    pub student_id: Uuid,
    pub paid_amount: i64,
    pub paid_at: DateTime<Utc>,
    pub method: String,
    pub proof_url: String,
    pub verify_status: VerifyStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}
