//! Transactional core of the tutoring marketplace
//!
//! Covers class publishing and session scheduling under the per-tutor clash
//! invariant, capacity-safe enrollment, the invoice/payment state machine and
//! the weekly roll-forward of recurring sessions.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use classroom::{Actor, Classroom, EventBus, MemoryStore};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), classroom::CoreError> {
//! let core = Classroom::new(Arc::new(MemoryStore::new()), EventBus::new(64));
//! let student = Actor::student(Uuid::new_v4());
//! let receipt = core.enroll(&student, Uuid::new_v4()).await?;
//! println!("invoice {}", receipt.invoice_id);
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod billing;
pub mod clash;
pub mod enrollment;
pub mod error;
pub mod events;
pub mod models;
pub mod publisher;
pub mod roll_forward;
pub mod service;
pub mod sessions;
pub mod store;
pub mod tutors;

pub use actor::{Actor, Role};
pub use billing::rollup_status;
pub use enrollment::EnrollmentReceipt;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use events::{DomainEvent, EventBus};
pub use roll_forward::RollForwardReport;
pub use service::Classroom;
pub use store::{MemoryStore, PgStore, Store};
