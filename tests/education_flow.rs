//! Integration tests for the education flows on the async service
//!
//! These tests walk the full coursework lifecycle: registration,
//! assignment authoring, confidential submission, grading and the
//! announcement channel, with sealing between the steps that need it.

use std::time::{Duration, Instant};

use serde_json::{json, Map};
use tokio::time::{sleep, timeout};

use eduledger::config::LedgerConfig;
use eduledger::crypto;
use eduledger::error::ChainError;
use eduledger::ledger::Role;
use eduledger::service::{
    LedgerService, NewAnnouncement, NewAssignment, NewGrade, NewSubmission,
};
use eduledger::transaction::{Transaction, TxKind, BROADCAST, SYSTEM};

/// Low difficulty keeps the proof-of-work searches fast under test.
fn test_service() -> LedgerService {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    LedgerService::new(LedgerConfig {
        difficulty: 1,
        seal_reward: 10,
    })
    .expect("failed to create service")
}

/// Difficulty high enough that a seal stays in flight for an observable
/// stretch.
fn slow_sealing_service() -> LedgerService {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    LedgerService::new(LedgerConfig {
        difficulty: 4,
        seal_reward: 10,
    })
    .expect("failed to create service")
}

/// An externally built announcement, cheap enough to queue without keys.
fn plain_announcement() -> Transaction {
    let mut data = Map::new();
    data.insert("title".to_string(), json!("hello"));
    Transaction::new("alice", "bob", TxKind::Announcement, data)
        .expect("transaction build failed")
}

#[tokio::test]
async fn test_registration_issues_wallet_and_participant() {
    let service = test_service();

    let wallet = service
        .register(Role::Teacher, "Grace", "grace@school.edu")
        .await
        .expect("registration failed");

    assert_eq!(wallet.address.len(), 40);
    assert!(wallet.public_pem.contains("BEGIN PUBLIC KEY"));
    assert!(wallet.private_pem.contains("BEGIN PRIVATE KEY"));

    // the profile view never carries the private half
    let profile = service.profile(&wallet.address).expect("profile missing");
    let serialized = serde_json::to_value(&profile).expect("profile should serialize");
    assert!(serialized.get("private_pem").is_none());
    assert!(serialized.get("private_key").is_none());
    assert_eq!(serialized["public_key"], json!(wallet.public_pem));

    let participant = service
        .participant(&wallet.address)
        .await
        .expect("participant missing");
    assert_eq!(participant.role, Role::Teacher);
    assert_eq!(participant.name, "Grace");

    // registration queues a transaction; sealing lands it on the chain
    assert_eq!(service.pending_transactions().await.len(), 1);
    service
        .seal_pending(&wallet.address)
        .await
        .expect("seal failed");

    let info = service.info().await;
    assert_eq!(info.length, 2);
    assert_eq!(info.participants, 1);
    assert!(info.is_valid);

    let roster = service.list_participants().await;
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].address, wallet.address);
}

#[tokio::test]
async fn test_full_coursework_lifecycle() {
    let service = test_service();

    // Register both parties and seal their registrations
    let teacher = service
        .register(Role::Teacher, "Grace", "grace@school.edu")
        .await
        .expect("teacher registration failed");
    let student = service
        .register(Role::Student, "Alan", "alan@school.edu")
        .await
        .expect("student registration failed");
    service
        .seal_pending(&teacher.address)
        .await
        .expect("seal failed");

    // Teacher authors an assignment; the broadcast carries their
    // encryption public key
    let assignment = service
        .create_assignment(NewAssignment {
            teacher_address: teacher.address.clone(),
            title: "Problem Set 1".to_string(),
            description: "Chapters 1-3".to_string(),
            due_date: "2025-10-01".to_string(),
        })
        .await
        .expect("assignment creation failed");
    assert_eq!(assignment.receiver, BROADCAST);
    assert!(assignment.signature.is_some());
    let encryption_key = assignment
        .data_str("encryption_public_key")
        .expect("assignment should embed an encryption key")
        .to_string();
    assert!(encryption_key.contains("BEGIN PUBLIC KEY"));
    // the encryption keypair is separate from the signing keypair
    assert_ne!(encryption_key, teacher.public_pem);
    // issuing again returns the same pair, and the public half is readable
    let issued = service
        .issue_encryption_keys(&teacher.address)
        .await
        .expect("issuing keys failed");
    assert_eq!(issued.public_pem, encryption_key);
    assert_eq!(
        service
            .encryption_public_key(&teacher.address)
            .expect("public key missing"),
        encryption_key
    );
    service
        .seal_pending(&teacher.address)
        .await
        .expect("seal failed");

    // Student finds the assignment and hands in encrypted work
    let visible = service.assignments_for(Some(&student.address)).await;
    assert_eq!(visible.len(), 1);
    let assignment_id = visible[0].transaction.transaction_id.clone();

    let plaintext = b"My answers: 1b 2c 3a";
    let ciphertext =
        crypto::encrypt_for(&encryption_key, plaintext).expect("encryption failed");
    let submission = service
        .submit_assignment(NewSubmission {
            student_address: student.address.clone(),
            assignment_id: assignment_id.clone(),
            content: ciphertext.clone(),
        })
        .await
        .expect("submission failed");
    assert_eq!(submission.sender, student.address);
    assert_eq!(submission.receiver, SYSTEM);
    assert_eq!(submission.data_str("student_name"), Some("Alan"));
    // the service signed it with the student's stored wallet
    assert!(submission.verify(&student.public_pem));

    // Grading an unsealed submission is refused
    let premature = service
        .grade_submission(NewGrade {
            teacher_address: teacher.address.clone(),
            submission_id: submission.transaction_id.clone(),
            grade: "A".to_string(),
            comment: "".to_string(),
        })
        .await;
    assert!(matches!(premature, Err(ChainError::NotFound(_))));

    service
        .seal_pending(&teacher.address)
        .await
        .expect("seal failed");
    let sealed_submissions = service.submissions_for(&assignment_id).await;
    assert_eq!(sealed_submissions.len(), 1);
    assert!(service
        .submission_by_id(&submission.transaction_id)
        .await
        .is_some());

    // Teacher decrypts the content and grades it
    let recovered = service
        .decrypt_submission(&teacher.address, &ciphertext)
        .expect("decryption failed");
    assert_eq!(recovered, plaintext);

    let grade = service
        .grade_submission(NewGrade {
            teacher_address: teacher.address.clone(),
            submission_id: submission.transaction_id.clone(),
            grade: "A".to_string(),
            comment: "Well reasoned".to_string(),
        })
        .await
        .expect("grading failed");
    assert_eq!(grade.receiver, student.address);

    // The grade only shows up in queries once sealed
    assert!(service.grades_for(&student.address).await.is_empty());
    service
        .seal_pending(&teacher.address)
        .await
        .expect("seal failed");
    let grades = service.grades_for(&student.address).await;
    assert_eq!(grades.len(), 1);
    assert_eq!(grades[0].transaction.data_str("grade"), Some("A"));

    // registration, submission and grade all touch the student; the
    // broadcast assignment does not match their address directly
    let history = service.transactions_for(&student.address).await;
    assert_eq!(history.len(), 3);

    // A second grade for the same assignment and student is refused
    let duplicate = service
        .grade_submission(NewGrade {
            teacher_address: teacher.address.clone(),
            submission_id: submission.transaction_id.clone(),
            grade: "B".to_string(),
            comment: "second thoughts".to_string(),
        })
        .await;
    assert!(matches!(duplicate, Err(ChainError::AlreadyGraded { .. })));

    assert!(service.validate().await);
    assert_eq!(service.blocks_sealed(), 4);
    assert!(!service.is_sealing());

    println!("✅ Full coursework lifecycle sealed and verified");
}

#[tokio::test]
async fn test_role_and_registration_guards() {
    let service = test_service();
    let student = service
        .register(Role::Student, "Alan", "alan@school.edu")
        .await
        .expect("student registration failed");

    // Students cannot author assignments, grade or announce
    let refused = service
        .create_assignment(NewAssignment {
            teacher_address: student.address.clone(),
            title: "Rogue homework".to_string(),
            description: "".to_string(),
            due_date: "".to_string(),
        })
        .await;
    assert!(matches!(refused, Err(ChainError::RoleViolation(_))));

    let refused = service
        .grade_submission(NewGrade {
            teacher_address: student.address.clone(),
            submission_id: "anything".to_string(),
            grade: "A".to_string(),
            comment: "".to_string(),
        })
        .await;
    assert!(matches!(refused, Err(ChainError::RoleViolation(_))));

    let refused = service
        .create_announcement(NewAnnouncement {
            teacher_address: student.address.clone(),
            title: "Hello".to_string(),
            message: "".to_string(),
            targets: None,
        })
        .await;
    assert!(matches!(refused, Err(ChainError::RoleViolation(_))));

    // Unknown addresses are not-found, not role violations
    let refused = service
        .create_assignment(NewAssignment {
            teacher_address: "0000000000000000000000000000000000000000".to_string(),
            title: "Ghost homework".to_string(),
            description: "".to_string(),
            due_date: "".to_string(),
        })
        .await;
    assert!(matches!(refused, Err(ChainError::NotFound(_))));

    let refused = service
        .submit_assignment(NewSubmission {
            student_address: "0000000000000000000000000000000000000000".to_string(),
            assignment_id: "anything".to_string(),
            content: "work".to_string(),
        })
        .await;
    assert!(matches!(refused, Err(ChainError::NotFound(_))));

    // no encryption keys exist until an issuer creates them
    let missing = service.encryption_public_key(&student.address);
    assert!(matches!(missing, Err(ChainError::NotFound(_))));
    let missing = service.decrypt_submission(&student.address, "AAAA");
    assert!(matches!(missing, Err(ChainError::NotFound(_))));
}

#[tokio::test]
async fn test_announcement_targeting() {
    let service = test_service();
    let teacher = service
        .register(Role::Teacher, "Grace", "grace@school.edu")
        .await
        .expect("teacher registration failed");

    let broadcast = service
        .create_announcement(NewAnnouncement {
            teacher_address: teacher.address.clone(),
            title: "Welcome".to_string(),
            message: "Course starts Monday".to_string(),
            targets: None,
        })
        .await
        .expect("broadcast failed");
    assert_eq!(broadcast.receiver, BROADCAST);
    assert_eq!(broadcast.kind, TxKind::Announcement);

    let targeted = service
        .create_announcement(NewAnnouncement {
            teacher_address: teacher.address.clone(),
            title: "Office hours".to_string(),
            message: "Moved to 3pm".to_string(),
            targets: Some(vec!["addr-one".to_string(), "addr-two".to_string()]),
        })
        .await
        .expect("targeted announcement failed");
    assert_eq!(targeted.receiver, "addr-one,addr-two");

    // an explicit empty target list falls back to broadcast
    let fallback = service
        .create_announcement(NewAnnouncement {
            teacher_address: teacher.address.clone(),
            title: "Reminder".to_string(),
            message: "Bring calculators".to_string(),
            targets: Some(Vec::new()),
        })
        .await
        .expect("fallback announcement failed");
    assert_eq!(fallback.receiver, BROADCAST);
}

#[tokio::test]
async fn test_sealing_an_empty_buffer_is_refused() {
    let service = test_service();

    let refused = service.seal_pending("sealer-address").await;
    assert!(matches!(refused, Err(ChainError::NothingToSeal)));
    // the guard is released even when sealing fails
    assert!(!service.is_sealing());
    assert_eq!(service.blocks_sealed(), 0);
}

#[tokio::test]
async fn test_concurrent_seal_is_refused() {
    let service = slow_sealing_service();
    service
        .submit(plain_announcement())
        .await
        .expect("submit failed");

    let background = service.clone();
    let first = tokio::spawn(async move { background.seal_pending("addr-one").await });

    // wait for the spawned seal to take the guard
    let deadline = Instant::now() + Duration::from_secs(10);
    while !service.is_sealing() {
        assert!(Instant::now() < deadline, "first seal never started");
        sleep(Duration::from_millis(1)).await;
    }

    // a second seal is turned away while the first is in flight
    let refused = service.seal_pending("addr-two").await;
    assert!(matches!(refused, Err(ChainError::SealInProgress)));

    let sealed = first
        .await
        .expect("seal task panicked")
        .expect("first seal failed");
    assert_eq!(sealed.index, 1);
    assert!(!service.is_sealing());

    // the guard is free again, so the reseeded reward seals normally
    service
        .seal_pending("addr-one")
        .await
        .expect("follow-up seal failed");
    assert_eq!(service.blocks_sealed(), 2);
}

#[tokio::test]
async fn test_abandoned_seal_completes_and_releases_guard() {
    let service = slow_sealing_service();
    service
        .submit(plain_announcement())
        .await
        .expect("submit failed");

    // the caller stops waiting almost immediately; the seal keeps
    // running on its own task
    let _ = timeout(
        Duration::from_millis(5),
        service.seal_pending("sealer-address"),
    )
    .await;

    let deadline = Instant::now() + Duration::from_secs(60);
    while service.is_sealing() {
        assert!(Instant::now() < deadline, "seal never released the guard");
        sleep(Duration::from_millis(20)).await;
    }

    // the abandoned seal still landed its block and advanced the counter
    assert_eq!(service.blocks_sealed(), 1);
    assert_eq!(service.info().await.length, 2);
    assert!(service.validate().await);

    // later seals proceed as usual
    service
        .seal_pending("sealer-address")
        .await
        .expect("follow-up seal failed");
    assert_eq!(service.blocks_sealed(), 2);
}

#[tokio::test]
async fn test_reward_reseeds_the_pending_buffer() {
    let service = test_service();
    service
        .submit(plain_announcement())
        .await
        .expect("submit failed");

    service
        .seal_pending("sealer-address")
        .await
        .expect("seal failed");

    // the only pending entry is now the sealer's reward
    let pending = service.pending_transactions().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, TxKind::Reward);
    assert_eq!(pending[0].sender, SYSTEM);
    assert_eq!(pending[0].receiver, "sealer-address");
    assert_eq!(pending[0].data["amount"], json!(10));
    assert_eq!(service.blocks_sealed(), 1);

    // sealing again folds the reward itself into the next block
    service
        .seal_pending("sealer-address")
        .await
        .expect("second seal failed");
    let tally = service.tally_by_kind().await;
    assert_eq!(tally[&TxKind::Announcement], 1);
    assert_eq!(tally[&TxKind::Reward], 1);
    let exported = service.export_chain().await;
    assert_eq!(exported.len(), 3);
}
