//! Verification workflow tests against the engine

mod common;

use common::{fields, root, second_admin, sign_up, submit, test_state};
use marketplace_core::{
    AdminAction, Decision, Error, NotificationKind, RequestStatus, Role, SubscriptionPlan,
    VerificationStatus,
};
use marketplace_server::RecordStore;

/// Submit, approve, and watch contact access switch on for a paying user
#[test]
fn test_submit_then_approve_grants_contact_access() {
    let state = test_state();
    let user = sign_up(&state, "ada@example.com", Role::Seeker);
    state
        .subscribe_to_plan(Some(&user), user.user_id, SubscriptionPlan::Yearly)
        .unwrap();
    assert!(!state.contact_entitlement(Some(&user)));

    let request = submit(&state, &user);
    let profile = state.read_profile(user.user_id).unwrap();
    assert_eq!(profile.verification_status, VerificationStatus::Pending);
    assert_eq!(request.status, RequestStatus::Pending);

    state
        .review_verification(root(&state), request.id, Decision::Approve, None)
        .unwrap();

    let profile = state.read_profile(user.user_id).unwrap();
    assert_eq!(profile.verification_status, VerificationStatus::Verified);
    assert!(profile.is_verified());
    assert!(profile.can_access_contact);
    assert!(state.contact_entitlement(Some(&user)));

    let request = state
        .store
        .get_verification_request(request.id)
        .unwrap()
        .unwrap();
    assert_eq!(request.status, RequestStatus::Verified);
    assert_eq!(request.review.unwrap().reviewed_by, root(&state));

    let notifications = state.notifications(Some(&user)).unwrap();
    assert_eq!(notifications[0].kind, NotificationKind::VerificationApproved);

    let audit = state.audit_log(root(&state)).unwrap();
    assert!(audit
        .iter()
        .any(|a| a.action == AdminAction::Approve && a.target == user.user_id));
}

#[test]
fn test_submit_requires_owner() {
    let state = test_state();
    let owner = sign_up(&state, "owner@example.com", Role::Provider);
    let other = sign_up(&state, "other@example.com", Role::Seeker);

    let result = state.submit_verification(None, owner.user_id, fields());
    assert_eq!(result.unwrap_err(), Error::AuthenticationRequired);

    let result = state.submit_verification(Some(&other), owner.user_id, fields());
    assert!(matches!(result, Err(Error::AuthorizationDenied(_))));
    assert!(state.store.requests_for_user(owner.user_id).unwrap().is_empty());
}

#[test]
fn test_blank_identity_fields_write_nothing() {
    let state = test_state();
    let user = sign_up(&state, "blank@example.com", Role::Provider);

    let mut bad = fields();
    bad.phone = "   ".to_string();
    let result = state.submit_verification(Some(&user), user.user_id, bad);

    assert!(matches!(result, Err(Error::ValidationFailed(_))));
    let profile = state.read_profile(user.user_id).unwrap();
    assert_eq!(profile.verification_status, VerificationStatus::NotVerified);
    assert!(state.store.requests_for_user(user.user_id).unwrap().is_empty());
}

#[test]
fn test_second_submission_while_pending_conflicts() {
    let state = test_state();
    let user = sign_up(&state, "twice@example.com", Role::Provider);
    submit(&state, &user);

    let result = state.submit_verification(Some(&user), user.user_id, fields());
    assert!(matches!(result, Err(Error::ConflictOrStale(_))));
    assert_eq!(state.store.requests_for_user(user.user_id).unwrap().len(), 1);
}

#[test]
fn test_verified_user_cannot_resubmit() {
    let state = test_state();
    let user = sign_up(&state, "done@example.com", Role::Provider);
    submit(&state, &user);
    state.verify_user(root(&state), user.user_id).unwrap();

    let result = state.submit_verification(Some(&user), user.user_id, fields());
    assert!(matches!(result, Err(Error::ConflictOrStale(_))));
}

#[test]
fn test_resubmission_after_rejection() {
    let state = test_state();
    let user = sign_up(&state, "retry@example.com", Role::Provider);
    submit(&state, &user);
    state
        .reject_user(root(&state), user.user_id, Some("blurry scan".to_string()))
        .unwrap();

    let profile = state.read_profile(user.user_id).unwrap();
    assert_eq!(profile.verification_status, VerificationStatus::Rejected);
    let notifications = state.notifications(Some(&user)).unwrap();
    assert!(notifications[0].message.contains("blurry scan"));

    let second = submit(&state, &user);
    assert_eq!(
        state.my_verification(Some(&user)).unwrap().map(|r| r.id),
        Some(second.id)
    );
    let profile = state.read_profile(user.user_id).unwrap();
    assert_eq!(profile.verification_status, VerificationStatus::Pending);
}

/// Reviewing an already decided request is refused and leaves the review alone
#[test]
fn test_second_review_conflicts_and_keeps_first_reviewer() {
    let state = test_state();
    let other_admin = second_admin(&state);
    let user = sign_up(&state, "idem@example.com", Role::Provider);
    let request = submit(&state, &user);

    state
        .review_verification(root(&state), request.id, Decision::Approve, Some("ok".into()))
        .unwrap();
    let result = state.review_verification(
        other_admin,
        request.id,
        Decision::Approve,
        Some("again".into()),
    );

    assert!(matches!(result, Err(Error::ConflictOrStale(_))));
    let review = state
        .store
        .get_verification_request(request.id)
        .unwrap()
        .unwrap()
        .review
        .unwrap();
    assert_eq!(review.reviewed_by, root(&state));
    assert_eq!(review.notes.as_deref(), Some("ok"));
}

/// A failure between the request update and the profile update rolls back both
#[test]
fn test_failed_approval_leaves_both_records_untouched() {
    let state = test_state();
    let user = sign_up(&state, "atomic@example.com", Role::Provider);
    let request = submit(&state, &user);
    let profile_before = state.read_profile(user.user_id).unwrap();

    state.store.fail_after_writes(1);
    let result = state.review_verification(root(&state), request.id, Decision::Approve, None);

    assert!(matches!(result, Err(Error::TransientStoreFailure(_))));
    assert!(result.unwrap_err().is_retryable());

    let stored = state
        .store
        .get_verification_request(request.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
    assert!(stored.review.is_none());
    assert_eq!(state.read_profile(user.user_id).unwrap(), profile_before);
    assert!(state.notifications(Some(&user)).unwrap().is_empty());

    // The injection is one-shot; a retry goes through
    state
        .review_verification(root(&state), request.id, Decision::Approve, None)
        .unwrap();
    assert!(state.read_profile(user.user_id).unwrap().is_verified());
}

#[test]
fn test_non_admin_cannot_review() {
    let state = test_state();
    let user = sign_up(&state, "self@example.com", Role::Provider);
    let request = submit(&state, &user);

    let result = state.review_verification(user.user_id, request.id, Decision::Approve, None);

    assert!(matches!(result, Err(Error::AuthorizationDenied(_))));
    let profile = state.read_profile(user.user_id).unwrap();
    assert_eq!(profile.verification_status, VerificationStatus::Pending);
}

#[test]
fn test_demoted_admin_loses_access_immediately() {
    let state = test_state();
    let other_admin = second_admin(&state);
    state
        .change_user_role(root(&state), other_admin, Role::Seeker, "left the team")
        .unwrap();

    let result = state.list_profiles(other_admin);
    assert!(matches!(result, Err(Error::AuthorizationDenied(_))));
}

#[test]
fn test_review_of_unknown_request_is_not_found() {
    let state = test_state();
    let result = state.review_verification(
        root(&state),
        marketplace_core::RequestId::new(),
        Decision::Reject,
        None,
    );
    assert!(matches!(result, Err(Error::NotFound(_))));
}

/// Two admins race to decide the same request; exactly one wins
#[test]
fn test_concurrent_reviews_have_single_winner() {
    for _ in 0..20 {
        let state = test_state();
        let approver = root(&state);
        let rejecter = second_admin(&state);
        let user = sign_up(&state, "race@example.com", Role::Provider);
        let request = submit(&state, &user);

        let (approved, rejected) = std::thread::scope(|s| {
            let a = s.spawn(|| {
                state.review_verification(approver, request.id, Decision::Approve, None)
            });
            let r = s.spawn(|| {
                state.review_verification(rejecter, request.id, Decision::Reject, None)
            });
            (a.join().unwrap(), r.join().unwrap())
        });

        assert!(approved.is_ok() != rejected.is_ok());
        let loser = if approved.is_ok() { &rejected } else { &approved };
        assert!(matches!(loser, Err(Error::ConflictOrStale(_))));

        let stored = state
            .store
            .get_verification_request(request.id)
            .unwrap()
            .unwrap();
        let profile = state.read_profile(user.user_id).unwrap();
        if approved.is_ok() {
            assert_eq!(stored.status, RequestStatus::Verified);
            assert_eq!(stored.review.unwrap().reviewed_by, approver);
            assert_eq!(profile.verification_status, VerificationStatus::Verified);
        } else {
            assert_eq!(stored.status, RequestStatus::Rejected);
            assert_eq!(stored.review.unwrap().reviewed_by, rejecter);
            assert_eq!(profile.verification_status, VerificationStatus::Rejected);
        }
    }
}
