//! Hosted storage against a mock row/auth service.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tempfile::tempdir;
use todowheel_core::cli::Command;
use todowheel_core::commands::Workspace;
use todowheel_core::config::Config;
use todowheel_core::hosted::auth::{AuthUser, Authenticator};
use todowheel_core::hosted::{HostedBackend, HostedConfig};
use todowheel_core::mirror::WriteBehind;
use todowheel_core::render::Renderer;
use todowheel_core::snapshot::Snapshot;
use todowheel_core::store::{Backend, StoreError};
use todowheel_core::task::Task;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user() -> AuthUser {
    AuthUser {
        id: "u1".to_string(),
        email: Some("me@example.com".to_string()),
        access_token: "tok".to_string(),
        refresh_token: None,
        expires_at: None,
    }
}

fn backend(server: &MockServer) -> HostedBackend {
    let config = HostedConfig::new(server.uri(), "anon");
    HostedBackend::new(reqwest::Client::new(), &config, &user())
}

fn hosted_config(server: &MockServer) -> Config {
    let mut cfg = Config::default();
    cfg.apply_overrides([
        ("storage".to_string(), "hosted".to_string()),
        ("hosted.url".to_string(), server.uri()),
        ("hosted.anon_key".to_string(), "anon".to_string()),
    ]);
    cfg
}

fn cache_session(dir: &Path, user: &AuthUser) {
    let raw = serde_json::to_string(user).expect("encode session");
    std::fs::write(dir.join("session.json"), raw).expect("write session");
}

fn task(title: &str) -> Task {
    Task::new(Uuid::new_v4(), title.to_string(), "Work".to_string(), Utc::now())
}

#[tokio::test]
async fn sign_in_caches_the_session_for_later_invocations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", "anon"))
        .and(body_partial_json(json!({"email": "me@example.com", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "ref",
            "user": {"id": "u1", "email": "me@example.com"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let config = HostedConfig::new(server.uri(), "anon");
    let mut auth = Authenticator::new(config.clone(), temp.path()).expect("authenticator");
    let signed_in = auth
        .sign_in("me@example.com", "hunter2")
        .await
        .expect("sign in")
        .clone();
    assert_eq!(signed_in.id, "u1");
    assert!(!auth.is_loading());
    assert!(temp.path().join("session.json").exists());

    let mut later = Authenticator::new(config, temp.path()).expect("authenticator");
    let restored = later.restore().expect("restore").cloned();
    assert_eq!(restored, Some(signed_in));
}

#[tokio::test]
async fn rejected_credentials_surface_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut auth = Authenticator::new(HostedConfig::new(server.uri(), "anon"), temp.path())
        .expect("authenticator");
    match auth.sign_in("me@example.com", "wrong").await {
        Err(StoreError::Status { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("unexpected sign-in result: {other:?}"),
    }
    assert!(auth.current_user().is_none());
    assert!(!temp.path().join("session.json").exists());
}

#[tokio::test]
async fn load_splits_rows_into_active_and_newest_first_completed() {
    let server = MockServer::start().await;
    let active = Uuid::new_v4();
    let older = Uuid::new_v4();
    let newer = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/tasks"))
        .and(query_param("user_id", "eq.u1"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": older, "title": "older", "goal": "Work", "completed": true,
                "created_at": "2026-03-01T09:00:00Z", "completed_at": "2026-03-02T09:00:00Z",
                "user_id": "u1"
            },
            {
                "id": active, "title": "Write report", "duration_minutes": 120,
                "duration_unit": "hours", "goal": "Work", "completed": false,
                "created_at": "2026-03-01T10:00:00Z", "completed_at": null, "user_id": "u1"
            },
            {
                "id": newer, "title": "newer", "goal": "Personal", "completed": true,
                "created_at": "2026-03-01T11:00:00Z", "completed_at": "2026-03-03T09:00:00Z",
                "user_id": "u1"
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/goals"))
        .and(query_param("user_id", "eq.u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": Uuid::new_v4(), "name": "Personal", "user_id": "u1"},
            {"id": Uuid::new_v4(), "name": "Work", "user_id": "u1"}
        ])))
        .mount(&server)
        .await;

    let snapshot = backend(&server).load().await.expect("load");
    assert_eq!(snapshot.tasks.len(), 1);
    assert_eq!(snapshot.tasks[0].id, active);
    assert_eq!(
        snapshot.tasks[0].duration.map(|d| d.to_string()).as_deref(),
        Some("2 hours")
    );
    let completed: Vec<Uuid> = snapshot.completed.iter().map(|task| task.id).collect();
    assert_eq!(completed, vec![newer, older]);
    assert_eq!(snapshot.goals, vec!["Personal", "Work"]);
}

#[tokio::test]
async fn completion_is_sent_as_a_single_upsert() {
    let server = MockServer::start().await;
    let todo = task("Write report");
    let done = todo.clone().into_completed(Utc::now());

    Mock::given(method("POST"))
        .and(path("/rest/v1/tasks"))
        .and(query_param("on_conflict", "id"))
        .and(header("prefer", "resolution=merge-duplicates,return=minimal"))
        .and(body_partial_json(json!([
            {"id": todo.id, "completed": true, "user_id": "u1"}
        ])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let previous = Snapshot {
        tasks: vec![todo],
        ..Snapshot::default()
    };
    let mut mirror = WriteBehind::new(previous, Duration::ZERO);
    mirror.observe(
        Snapshot {
            completed: vec![done],
            ..Snapshot::default()
        },
        std::time::Instant::now(),
    );
    mirror.flush(&backend(&server)).await.expect("flush");
    assert!(!mirror.has_pending());
}

#[tokio::test]
async fn deletions_and_new_goals_are_sent_as_deltas() {
    let server = MockServer::start().await;
    let gone = task("gone");
    let kept = task("kept");

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/tasks"))
        .and(query_param("user_id", "eq.u1"))
        .and(query_param("id", format!("in.({})", gone.id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/goals"))
        .and(query_param("on_conflict", "user_id,name"))
        .and(body_partial_json(json!([{"name": "Fitness", "user_id": "u1"}])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let previous = Snapshot {
        tasks: vec![gone, kept.clone()],
        goals: vec!["Work".to_string()],
        completed: vec![],
    };
    let mut mirror = WriteBehind::new(previous, Duration::ZERO);
    mirror.observe(
        Snapshot {
            tasks: vec![kept],
            goals: vec!["Work".to_string(), "Fitness".to_string()],
            completed: vec![],
        },
        std::time::Instant::now(),
    );
    mirror.flush(&backend(&server)).await.expect("flush");
}

#[tokio::test]
async fn server_errors_keep_the_batch_for_the_next_flush() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut mirror = WriteBehind::new(Snapshot::default(), Duration::ZERO);
    mirror.observe(
        Snapshot {
            tasks: vec![task("retry me")],
            ..Snapshot::default()
        },
        std::time::Instant::now(),
    );
    let hosted = backend(&server);

    let err = mirror.flush(&hosted).await.expect_err("first flush fails");
    assert!(err.is_transient());
    assert!(mirror.has_pending());

    mirror.flush(&hosted).await.expect("second flush");
    assert!(!mirror.has_pending());
}

#[tokio::test]
async fn signed_out_workspace_only_accepts_account_commands() {
    let server = MockServer::start().await;
    let temp = tempdir().expect("tempdir");
    let cfg = hosted_config(&server);

    let mut ws = Workspace::open(cfg, temp.path().to_path_buf(), Renderer::plain())
        .await
        .expect("open hosted workspace");
    assert!(ws.session().is_none());

    let mut out = Vec::new();
    let err = ws
        .execute(Command::List { goal: None }, &mut out)
        .await
        .expect_err("list needs a user");
    assert!(err.to_string().contains("not signed in"));

    ws.execute(Command::Whoami, &mut out).await.expect("whoami");
    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains("not signed in"));
}

#[tokio::test]
async fn rejected_cached_session_leaves_the_workspace_signed_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tasks"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "JWT expired"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/goals"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let stale = AuthUser {
        access_token: "stale".to_string(),
        ..user()
    };
    cache_session(temp.path(), &stale);

    let cfg = hosted_config(&server);
    let mut ws = Workspace::open(cfg, temp.path().to_path_buf(), Renderer::plain())
        .await
        .expect("a rejected token does not block the workspace");
    assert!(ws.session().is_none());
    assert!(!temp.path().join("session.json").exists());

    let mut out = Vec::new();
    ws.execute(Command::Whoami, &mut out).await.expect("whoami");
    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains("not signed in"));
}

#[tokio::test]
async fn fresh_hosted_account_starts_with_default_goals() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/goals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/goals"))
        .and(query_param("on_conflict", "user_id,name"))
        .and(body_partial_json(json!([
            {"name": "Personal", "user_id": "u1"},
            {"name": "Work", "user_id": "u1"}
        ])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    cache_session(temp.path(), &user());

    let cfg = hosted_config(&server);
    let mut ws = Workspace::open(cfg, temp.path().to_path_buf(), Renderer::plain())
        .await
        .expect("open hosted workspace");
    let session = ws.session().expect("signed in");
    assert_eq!(session.state().goals().labels(), ["Personal", "Work"]);
    assert!(session.has_pending());

    ws.flush().await.expect("flush seeded goals");
    assert!(!ws.session().expect("signed in").has_pending());
}
