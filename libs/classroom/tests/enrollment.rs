//! Enrollment transactor against the in-memory store

mod support;

use chrono::{Duration, TimeZone, Utc};
use classroom::models::{EnrollmentStatus, InvoiceStatus, StudentProfile};
use classroom::{Actor, DomainEvent, ErrorKind, Store};
use support::{Fixture, drain};
use uuid::Uuid;

#[tokio::test]
async fn test_last_seat_goes_to_exactly_one_student() {
    let fx = Fixture::new();
    let tutor = fx.approved_tutor().await;
    let class = fx.published_class(&tutor, 1, 2500).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let student = fx.student(&format!("Student {}", i), "Form 1").await;
        let core = fx.core.clone();
        let class_id = class.id;
        handles.push(tokio::spawn(async move {
            core.enroll(&student, class_id).await
        }));
    }

    let mut succeeded = 0;
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::ResourceExhausted);
                exhausted += 1;
            }
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(exhausted, 7);

    let seated = fx
        .store
        .enrollments_for_class(class.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.status.holds_seat())
        .count();
    assert_eq!(seated, 1);
}

#[tokio::test]
async fn test_capacity_holds_under_concurrency() {
    let fx = Fixture::new();
    let tutor = fx.approved_tutor().await;
    let class = fx.published_class(&tutor, 3, 2500).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let student = Actor::student(Uuid::new_v4());
        let core = fx.core.clone();
        let class_id = class.id;
        handles.push(tokio::spawn(async move {
            core.enroll(&student, class_id).await
        }));
    }
    let results: Vec<_> = futures::future::join_all(handles).await;
    let succeeded = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();

    assert_eq!(succeeded, 3);
    assert_eq!(fx.store.enrollments_for_class(class.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_enroll_writes_enrollment_grant_and_invoice_together() {
    let now = Utc.with_ymd_and_hms(2026, 5, 28, 9, 0, 0).unwrap();
    let fx = support::Fixture::at(now);
    let tutor = fx.approved_tutor().await;
    let class = fx.published_class(&tutor, 4, 12_000).await;
    let student = fx.student("Kofi Boateng", "Form 3").await;
    let mut rx = fx.events();

    let receipt = fx.core.enroll(&student, class.id).await.unwrap();

    let enrollment = fx
        .store
        .enrollment(receipt.enrollment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.status, EnrollmentStatus::Active);
    assert_eq!(enrollment.student_id, student.id);
    assert_eq!(enrollment.enrolled_at, now);
    assert_eq!(enrollment.student_name.as_deref(), Some("Kofi Boateng"));
    assert_eq!(enrollment.student_grade.as_deref(), Some("Form 3"));

    let profile = fx.store.student_profile(student.id).await.unwrap().unwrap();
    assert!(profile.authorized_tutors.contains(&tutor.id));

    let invoice = fx.store.invoice(&receipt.invoice_id).await.unwrap().unwrap();
    assert_eq!(invoice.enrollment_id, receipt.enrollment_id);
    assert_eq!(invoice.student_id, student.id);
    assert_eq!(invoice.amount_due, 12_000);
    assert_eq!(invoice.status, InvoiceStatus::AwaitingProof);
    assert_eq!(invoice.due_date, (now + Duration::days(7)).date_naive());
    assert!(invoice.period.is_none());

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        DomainEvent::EnrollmentCreated { enrollment_id, .. } if *enrollment_id == receipt.enrollment_id
    )));
}

#[tokio::test]
async fn test_snapshot_is_not_rewritten_by_profile_edits() {
    let fx = Fixture::new();
    let tutor = fx.approved_tutor().await;
    let class = fx.published_class(&tutor, 4, 100).await;
    let student = fx.student("Esi Owusu", "Form 1").await;

    let receipt = fx.core.enroll(&student, class.id).await.unwrap();

    let mut profile = StudentProfile::new(student.id);
    profile.full_name = Some("Esi Owusu-Mensah".to_string());
    profile.grade = Some("Form 2".to_string());
    fx.store.save_student_profile(&profile).await.unwrap();

    let enrollment = fx
        .store
        .enrollment(receipt.enrollment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.student_name.as_deref(), Some("Esi Owusu"));
    assert_eq!(enrollment.student_grade.as_deref(), Some("Form 1"));
}

#[tokio::test]
async fn test_grants_merge_across_tutors() {
    let fx = Fixture::new();
    let first = fx.approved_tutor().await;
    let second = fx.approved_tutor().await;
    let a = fx.published_class(&first, 4, 100).await;
    let b = fx.published_class(&second, 4, 100).await;
    let student = fx.student("Yaw Darko", "Form 2").await;

    fx.core.enroll(&student, a.id).await.unwrap();
    fx.core.enroll(&student, b.id).await.unwrap();

    let profile = fx.store.student_profile(student.id).await.unwrap().unwrap();
    assert!(profile.authorized_tutors.contains(&first.id));
    assert!(profile.authorized_tutors.contains(&second.id));
}

#[tokio::test]
async fn test_enroll_preconditions() {
    let fx = Fixture::new();
    let tutor = fx.approved_tutor().await;
    let draft = fx.draft_class(&tutor, 4, 100).await;
    let student = fx.student("Abena Asare", "Form 1").await;

    let err = fx.core.enroll(&student, draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let err = fx.core.enroll(&student, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = fx.core.enroll(&tutor, draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    // Nothing leaked out of the failed transactions
    assert!(fx.store.enrollments_for_class(draft.id).await.unwrap().is_empty());
    let profile = fx.store.student_profile(student.id).await.unwrap().unwrap();
    assert!(profile.authorized_tutors.is_empty());
}

#[tokio::test]
async fn test_unenroll_is_idempotent_and_frees_the_seat() {
    let fx = Fixture::new();
    let tutor = fx.approved_tutor().await;
    let class = fx.published_class(&tutor, 1, 100).await;
    let first = fx.student("Kwame", "Form 1").await;
    let second = fx.student("Akosua", "Form 1").await;

    let receipt = fx.core.enroll(&first, class.id).await.unwrap();
    let err = fx.core.enroll(&second, class.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);

    let mut rx = fx.events();
    assert_eq!(
        fx.core.unenroll(&first, receipt.enrollment_id).await.unwrap(),
        EnrollmentStatus::Cancelled
    );
    assert_eq!(
        fx.core.unenroll(&first, receipt.enrollment_id).await.unwrap(),
        EnrollmentStatus::Cancelled
    );
    let cancelled: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, DomainEvent::EnrollmentCancelled { .. }))
        .collect();
    assert_eq!(cancelled.len(), 1);

    let enrollment = fx
        .store
        .enrollment(receipt.enrollment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.status, EnrollmentStatus::Cancelled);
    assert!(enrollment.cancelled_at.is_some());

    let profile = fx.store.student_profile(first.id).await.unwrap().unwrap();
    assert!(!profile.authorized_tutors.contains(&tutor.id));

    fx.core.enroll(&second, class.id).await.unwrap();
}

#[tokio::test]
async fn test_unenroll_revokes_even_with_other_enrollments_for_the_tutor() {
    let fx = Fixture::new();
    let tutor = fx.approved_tutor().await;
    let a = fx.published_class(&tutor, 4, 100).await;
    let b = fx.published_class(&tutor, 4, 100).await;
    let student = fx.student("Nana", "Form 2").await;

    let first = fx.core.enroll(&student, a.id).await.unwrap();
    fx.core.enroll(&student, b.id).await.unwrap();
    fx.core.unenroll(&student, first.enrollment_id).await.unwrap();

    let profile = fx.store.student_profile(student.id).await.unwrap().unwrap();
    assert!(!profile.authorized_tutors.contains(&tutor.id));
}

#[tokio::test]
async fn test_unenroll_requires_the_owning_student() {
    let fx = Fixture::new();
    let tutor = fx.approved_tutor().await;
    let class = fx.published_class(&tutor, 4, 100).await;
    let owner = fx.student("Adwoa", "Form 1").await;
    let other = fx.student("Kojo", "Form 1").await;

    let receipt = fx.core.enroll(&owner, class.id).await.unwrap();

    let err = fx.core.unenroll(&other, receipt.enrollment_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = fx.core.unenroll(&fx.admin, receipt.enrollment_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = fx.core.unenroll(&owner, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
