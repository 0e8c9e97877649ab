//! Common test utilities for marketplace integration tests
#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use marketplace_core::{
    Role, SessionIdentity, SubmissionFields, SubscriptionPlan, UserId, VerificationRequest,
};
use marketplace_server::{
    routes, AppState, InMemorySessionStore, InMemoryStore, SignUp, DEFAULT_PROTECTED_ACCOUNT,
};
use serde_json::json;

pub type TestState = AppState<InMemoryStore, InMemorySessionStore>;

pub const ADMIN_EMAIL: &str = "root@example.com";
pub const ADMIN_PASSWORD: &str = "rootpassword";
pub const PASSWORD: &str = "testpassword";

/// Engine with a bootstrapped protected admin and the cheapest bcrypt cost
pub fn test_state() -> TestState {
    let state = AppState::new(
        InMemoryStore::new(),
        InMemorySessionStore::new(),
        DEFAULT_PROTECTED_ACCOUNT,
    )
    .with_password_cost(4);
    assert!(state
        .ensure_protected_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
        .unwrap());
    state
}

/// The protected super-account
pub fn root(state: &TestState) -> UserId {
    state.protected_account
}

pub fn sign_up(state: &TestState, email: &str, role: Role) -> SessionIdentity {
    let (profile, _) = state
        .sign_up(SignUp {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            role,
            full_name: None,
        })
        .unwrap();
    SessionIdentity {
        user_id: profile.id,
    }
}

/// A regular account promoted to admin by the protected one
pub fn second_admin(state: &TestState) -> UserId {
    let admin = sign_up(state, "admin2@example.com", Role::Seeker);
    state
        .change_user_role(root(state), admin.user_id, Role::Admin, "second reviewer")
        .unwrap();
    admin.user_id
}

pub fn fields() -> SubmissionFields {
    SubmissionFields {
        full_name: "Ada Lovelace".to_string(),
        phone: "555-0100".to_string(),
        additional_info: Some("Licensed plumber".to_string()),
    }
}

pub fn submit(state: &TestState, user: &SessionIdentity) -> VerificationRequest {
    state
        .submit_verification(Some(user), user.user_id, fields())
        .unwrap()
}

/// A user who is verified and on a yearly plan
pub fn entitled_user(state: &TestState, email: &str) -> SessionIdentity {
    let user = sign_up(state, email, Role::Seeker);
    state
        .subscribe_to_plan(Some(&user), user.user_id, SubscriptionPlan::Yearly)
        .unwrap();
    submit(state, &user);
    state.verify_user(root(state), user.user_id).unwrap();
    user
}

/// Create a test server around a fresh engine
pub fn create_test_server() -> (TestServer, Arc<TestState>) {
    let state = Arc::new(test_state());
    let app = routes::create_router(state.clone());
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, state)
}

/// Sign up over HTTP and return the session cookie value
pub async fn create_user(server: &TestServer, email: &str, role: &str) -> String {
    let response = server
        .post("/api/sign_up")
        .json(&json!({
            "email": email,
            "password": PASSWORD,
            "role": role,
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    response
        .maybe_cookie("marketplace_session")
        .expect("No session cookie")
        .value()
        .to_string()
}

/// Sign in over HTTP and return the session cookie value
pub async fn sign_in(server: &TestServer, email: &str, password: &str) -> String {
    let response = server
        .post("/api/sign_in")
        .json(&json!({ "email": email, "password": password }))
        .await;
    assert_eq!(response.status_code(), 200);

    response
        .maybe_cookie("marketplace_session")
        .expect("No session cookie")
        .value()
        .to_string()
}

pub fn session_cookie(value: &str) -> cookie::Cookie<'static> {
    cookie::Cookie::new("marketplace_session", value.to_string())
}

/// User id behind a session cookie, as reported by `/api/session`
pub async fn session_user_id(server: &TestServer, session: &str) -> String {
    let body: serde_json::Value = server
        .get("/api/session")
        .add_cookie(session_cookie(session))
        .await
        .json();
    body["user_id"].as_str().expect("No user id").to_string()
}
