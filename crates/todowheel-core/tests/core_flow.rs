use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use tempfile::tempdir;
use todowheel_core::app::AppSession;
use todowheel_core::cli::{Command, GoalAction, HistoryAction};
use todowheel_core::commands::{Flow, Workspace};
use todowheel_core::config::Config;
use todowheel_core::datastore::DataStore;
use todowheel_core::duration::TaskDuration;
use todowheel_core::render::Renderer;
use todowheel_core::session::TaskDraft;
use todowheel_core::store::StoreBackend;

async fn workspace(dir: &Path) -> Workspace {
    Workspace::open(Config::default(), dir.to_path_buf(), Renderer::plain())
        .await
        .expect("open workspace")
}

async fn run(ws: &mut Workspace, command: Command) -> anyhow::Result<String> {
    let mut out = Vec::new();
    let flow = ws.execute(command, &mut out).await?;
    assert_eq!(flow, Flow::Continue);
    Ok(String::from_utf8(out).expect("utf8 output"))
}

fn add(title: &str, time: Option<&str>, unit: Option<&str>, goal: Option<&str>) -> Command {
    Command::Add {
        title: title.split_whitespace().map(String::from).collect(),
        time: time.map(String::from),
        unit: unit.map(String::from),
        goal: goal.map(String::from),
    }
}

#[tokio::test]
async fn completed_task_survives_reopen_of_the_local_store() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let mut session = AppSession::open(StoreBackend::Local(store), std::time::Duration::ZERO)
        .await
        .expect("open session");

    let draft = TaskDraft::new("Write report")
        .with_duration(TaskDuration::from_parts("2", "hours").expect("duration"))
        .with_goal("Work");
    let id = draft.id;
    session
        .update(Instant::now(), |state| state.add_task(draft, Utc::now()))
        .expect("add");
    session
        .update(Instant::now(), |state| state.complete_task(id, Utc::now()))
        .expect("complete");
    session.flush().await.expect("flush");

    let reopened = DataStore::open(temp.path()).expect("reopen datastore");
    let snapshot = reopened.load_snapshot().expect("load snapshot");
    assert!(snapshot.tasks.is_empty());
    assert_eq!(snapshot.completed.len(), 1);
    let done = &snapshot.completed[0];
    assert_eq!(done.title, "Write report");
    assert!(done.completed);
    assert!(done.completed_at.is_some());
    assert_eq!(done.duration.map(|d| d.to_string()).as_deref(), Some("2 hours"));
}

#[tokio::test]
async fn commands_add_list_complete_and_show_history() {
    let temp = tempdir().expect("tempdir");
    let mut ws = workspace(temp.path()).await;

    let added = run(&mut ws, add("Write report", Some("2"), Some("hours"), Some("Work")))
        .await
        .expect("add");
    assert!(added.contains("Write report"));
    run(&mut ws, add("Call mom", Some("30 mins"), None, Some("Personal")))
        .await
        .expect("add second");

    let listed = run(&mut ws, Command::List { goal: None }).await.expect("list");
    assert!(listed.starts_with("All Goals"));
    assert!(listed.contains("2 hours"));
    assert!(listed.contains("30 minutes"));

    let work_only = run(&mut ws, Command::List { goal: Some("Work".into()) })
        .await
        .expect("filtered list");
    assert!(work_only.contains("Write report"));
    assert!(!work_only.contains("Call mom"));

    let id = {
        let session = ws.session().expect("signed in");
        session.state().tasks()[0].short_id()
    };
    let done = run(&mut ws, Command::Done { id })
        .await
        .expect("done");
    assert!(done.contains("Completed task"));

    let history = run(&mut ws, Command::History { action: None })
        .await
        .expect("history");
    assert!(history.contains("Write report"));

    ws.flush().await.expect("flush");
    let reopened = workspace(temp.path()).await;
    let state = reopened.session().expect("signed in").state();
    assert_eq!(state.tasks().len(), 1);
    assert_eq!(state.completed().len(), 1);
    assert_eq!(state.completed()[0].title, "Write report");
}

#[tokio::test]
async fn validation_errors_fail_without_touching_state() {
    let temp = tempdir().expect("tempdir");
    let mut ws = workspace(temp.path()).await;

    let err = run(&mut ws, add("   ", None, None, None))
        .await
        .expect_err("empty title");
    assert!(err.to_string().contains("please enter a task title"));

    let err = run(&mut ws, add("Stretch", Some("0"), Some("hours"), None))
        .await
        .expect_err("zero duration");
    assert!(!err.to_string().is_empty());

    let err = run(&mut ws, add("Stretch", None, None, Some("Gardening")))
        .await
        .expect_err("unknown goal");
    assert!(err.to_string().contains("Gardening"));

    let session = ws.session().expect("signed in");
    assert!(session.state().tasks().is_empty());
    assert!(!session.has_pending());
}

#[tokio::test]
async fn missing_ids_are_reported_not_failed() {
    let temp = tempdir().expect("tempdir");
    let mut ws = workspace(temp.path()).await;

    let done = run(&mut ws, Command::Done { id: "deadbeef".into() })
        .await
        .expect("done on missing id");
    assert!(done.contains("No active task matches"));

    let deleted = run(&mut ws, Command::Delete { id: "deadbeef".into() })
        .await
        .expect("delete on missing id");
    assert!(deleted.contains("No active task matches"));

    let removed = run(
        &mut ws,
        Command::History {
            action: Some(HistoryAction::Remove { id: "deadbeef".into() }),
        },
    )
    .await
    .expect("history remove on missing id");
    assert!(removed.contains("No completed task matches"));
}

#[tokio::test]
async fn selected_goal_is_remembered_and_scopes_new_tasks() {
    let temp = tempdir().expect("tempdir");
    let mut ws = workspace(temp.path()).await;

    run(
        &mut ws,
        Command::Goal {
            action: GoalAction::Add { name: vec!["Fitness".into()] },
        },
    )
    .await
    .expect("add goal");
    let again = run(
        &mut ws,
        Command::Goal {
            action: GoalAction::Add { name: vec!["Fitness".into()] },
        },
    )
    .await
    .expect("duplicate goal is a no-op");
    assert!(again.contains("already exists"));

    run(
        &mut ws,
        Command::Goal {
            action: GoalAction::Use { label: vec!["Fitness".into()] },
        },
    )
    .await
    .expect("use goal");
    run(&mut ws, add("Run 5k", None, None, None)).await.expect("add");
    ws.flush().await.expect("flush");

    let mut reopened = workspace(temp.path()).await;
    let tabs = run(&mut reopened, Command::Goals).await.expect("goals");
    assert!(tabs.contains("* Fitness"));
    let state = reopened.session().expect("signed in").state();
    assert_eq!(state.tasks()[0].goal, "Fitness");
    assert_eq!(state.goals().labels(), ["Personal", "Work", "Fitness"]);
}

#[tokio::test]
async fn spin_picks_a_visible_task_or_reports_an_empty_wheel() {
    let temp = tempdir().expect("tempdir");
    let mut ws = workspace(temp.path()).await;

    let empty = run(&mut ws, Command::Spin { goal: None }).await.expect("spin");
    assert!(empty.contains("Nothing to spin"));

    run(&mut ws, add("Only task", None, None, Some("Work")))
        .await
        .expect("add");
    let landed = run(&mut ws, Command::Spin { goal: Some("Work".into()) })
        .await
        .expect("spin");
    assert!(landed.contains("The wheel landed on: Only task"));

    let clear = run(
        &mut ws,
        Command::History {
            action: Some(HistoryAction::Clear),
        },
    )
    .await
    .expect("clear history");
    assert!(clear.contains("Cleared 0 completed tasks"));
}

#[tokio::test]
async fn account_commands_need_hosted_storage() {
    let temp = tempdir().expect("tempdir");
    let mut ws = workspace(temp.path()).await;

    let err = run(&mut ws, Command::Logout).await.expect_err("local logout");
    assert!(err.to_string().contains("storage = hosted"));

    let who = run(&mut ws, Command::Whoami).await.expect("whoami");
    assert!(who.contains("local:"));
    assert!(who.contains("not signed in"));
}
