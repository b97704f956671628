#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use consolekit_client::{
    Console, ConsoleUpdate, DirectorySelection, DirectorySelector, Notice, NoticeLevel, Phase,
    TaskService,
};
use consolekit_core::{
    ConsoleError, ConsoleResult, ContinueRequest, EntryKind, ExecutionMode, StartRequest,
    StartResponse,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};

/// Task service double that records calls and can be told to fail or to
/// hold the start response until released.
struct ScriptedService {
    session_id: String,
    fail_start: AtomicBool,
    fail_continue: AtomicBool,
    fail_stop: AtomicBool,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    starts: Mutex<Vec<StartRequest>>,
    continues: Mutex<Vec<(String, String)>>,
    stops: Mutex<Vec<String>>,
}

impl ScriptedService {
    fn new(session_id: &str) -> Arc<Self> {
        Arc::new(Self {
            session_id: session_id.to_string(),
            fail_start: AtomicBool::new(false),
            fail_continue: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            gate: Mutex::new(None),
            starts: Mutex::new(Vec::new()),
            continues: Mutex::new(Vec::new()),
            stops: Mutex::new(Vec::new()),
        })
    }

    fn gated(session_id: &str) -> (Arc<Self>, oneshot::Sender<()>) {
        let service = Self::new(session_id);
        let (tx, rx) = oneshot::channel();
        *service.gate.lock() = Some(rx);
        (service, tx)
    }
}

#[async_trait]
impl TaskService for ScriptedService {
    async fn start_session(&self, request: &StartRequest) -> ConsoleResult<StartResponse> {
        self.starts.lock().push(request.clone());
        let gate = self.gate.lock().take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(ConsoleError::Service {
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(StartResponse {
            session_id: self.session_id.clone(),
        })
    }

    async fn continue_session(&self, session_id: &str, request: &ContinueRequest) -> ConsoleResult<()> {
        self.continues
            .lock()
            .push((session_id.to_string(), request.message.clone()));
        if self.fail_continue.load(Ordering::SeqCst) {
            return Err(ConsoleError::Http("connection reset".into()));
        }
        Ok(())
    }

    async fn stop_session(&self, session_id: &str) -> ConsoleResult<()> {
        self.stops.lock().push(session_id.to_string());
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(ConsoleError::Service {
                status: 404,
                body: "unknown session".into(),
            });
        }
        Ok(())
    }
}

fn notices(rx: &mut broadcast::Receiver<ConsoleUpdate>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(update) = rx.try_recv() {
        if let ConsoleUpdate::Notice(notice) = update {
            out.push(notice);
        }
    }
    out
}

async fn wait_for_phase(console: &Console, phase: Phase) {
    for _ in 0..1000 {
        if console.phase() == phase {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("console never reached {phase:?}");
}

fn thinking(session: &str, content: &str, done: bool) -> String {
    serde_json::json!({
        "type": "console_assistant_thinking",
        "session_id": session,
        "content": content,
        "done": done,
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// start
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_start_binds_session_and_runs() {
    let service = ScriptedService::new("S1");
    let console = Console::new(service.clone());
    let mut rx = console.subscribe();

    let session_id = console.start("hi").await.unwrap();
    assert_eq!(session_id, "S1");
    assert_eq!(console.session_id().as_deref(), Some("S1"));
    assert_eq!(console.phase(), Phase::Running);
    assert!(console.is_running());

    let entries = console.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, EntryKind::User);
    assert_eq!(entries[0].content, "hi");

    let starts = service.starts.lock().clone();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].prompt, "hi");
    assert!(starts[0].auto_approve);
    assert!(starts[0].project_path.is_none());

    assert_eq!(notices(&mut rx), vec![Notice::success("Console session started")]);
}

#[tokio::test]
async fn test_hello_scenario_through_console() {
    let console = Console::new(ScriptedService::new("S1"));
    console.start("hi").await.unwrap();
    console.ingest(&thinking("S1", "Hel", false));
    console.ingest(&thinking("S1", "lo", true));

    let entries = console.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].content, "hi");
    assert_eq!(entries[1].kind, EntryKind::Assistant);
    assert_eq!(entries[1].content, "Hello");
    assert_eq!(entries[1].done, Some(true));
}

#[tokio::test]
async fn test_failed_start_keeps_optimistic_entry() {
    let service = ScriptedService::new("S1");
    service.fail_start.store(true, Ordering::SeqCst);
    let console = Console::new(service);
    let mut rx = console.subscribe();

    let err = console.start("hi").await.unwrap_err();
    assert!(err.is_request_failure());
    assert_eq!(console.phase(), Phase::Idle);
    assert!(console.session_id().is_none());
    assert_eq!(console.entries().len(), 1);

    let notes = notices(&mut rx);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn test_start_applies_options() {
    let service = ScriptedService::new("S1");
    let console = Console::new(service.clone());
    console.set_execution_mode(ExecutionMode::Do).unwrap();
    console.set_project_path("/srv/app").unwrap();

    console.start("tidy up").await.unwrap();

    let starts = service.starts.lock().clone();
    assert_eq!(starts[0].prompt, "/task-mind.do tidy up");
    assert_eq!(starts[0].project_path.as_deref(), Some("/srv/app"));
    assert_eq!(console.entries()[0].content, "/task-mind.do tidy up");
}

#[tokio::test]
async fn test_start_refused_while_bound() {
    let console = Console::new(ScriptedService::new("S1"));
    console.start("hi").await.unwrap();
    let err = console.start("again").await.unwrap_err();
    assert!(matches!(err, ConsoleError::InvalidState(_)));
    assert_eq!(console.entries().len(), 1);
}

// ---------------------------------------------------------------------------
// Races between the start request and the event channel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_events_stream_while_start_is_pending() {
    let (service, release) = ScriptedService::gated("S1");
    let console = Arc::new(Console::new(service));

    let task = {
        let console = console.clone();
        tokio::spawn(async move { console.start("hi").await })
    };
    wait_for_phase(&console, Phase::Starting).await;

    console.ingest(&thinking("S1", "early", false));
    assert_eq!(console.session_id().as_deref(), Some("S1"));
    assert_eq!(console.entries().len(), 2);

    release.send(()).unwrap();
    assert_eq!(task.await.unwrap().unwrap(), "S1");
    assert_eq!(console.phase(), Phase::Running);
}

#[tokio::test]
async fn test_event_bound_session_wins_over_start_response() {
    let (service, release) = ScriptedService::gated("S-response");
    let console = Arc::new(Console::new(service));

    let task = {
        let console = console.clone();
        tokio::spawn(async move { console.start("hi").await })
    };
    wait_for_phase(&console, Phase::Starting).await;
    console.ingest(&thinking("S-event", "x", false));

    release.send(()).unwrap();
    assert_eq!(task.await.unwrap().unwrap(), "S-event");
    assert_eq!(console.session_id().as_deref(), Some("S-event"));
}

#[tokio::test]
async fn test_completion_before_start_response_is_not_lost() {
    let (service, release) = ScriptedService::gated("S1");
    let console = Arc::new(Console::new(service));

    let task = {
        let console = console.clone();
        tokio::spawn(async move { console.start("hi").await })
    };
    wait_for_phase(&console, Phase::Starting).await;
    console.ingest(r#"{"type":"console_session_status","session_id":"S1","status":"completed"}"#);

    release.send(()).unwrap();
    task.await.unwrap().unwrap();
    assert!(!console.is_running());
    assert_eq!(console.phase(), Phase::Idle);
    assert_eq!(console.session_id().as_deref(), Some("S1"));
}

#[tokio::test]
async fn test_new_session_discards_pending_start() {
    let (service, release) = ScriptedService::gated("S1");
    let console = Arc::new(Console::new(service));

    let task = {
        let console = console.clone();
        tokio::spawn(async move { console.start("hi").await })
    };
    wait_for_phase(&console, Phase::Starting).await;
    console.new_session();

    release.send(()).unwrap();
    assert!(matches!(task.await.unwrap(), Err(ConsoleError::Superseded)));
    assert!(console.entries().is_empty());
    assert!(console.session_id().is_none());
    assert_eq!(console.phase(), Phase::Idle);
}

// ---------------------------------------------------------------------------
// send
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_send_is_blocked_mid_turn() {
    let service = ScriptedService::new("S1");
    let console = Console::new(service.clone());
    console.start("hi").await.unwrap();

    console.ingest(&thinking("S1", "Working", false));
    assert!(console.is_input_blocked());
    assert!(matches!(console.send("more").await, Err(ConsoleError::InputBlocked)));
    assert_eq!(console.entries().len(), 2);

    console.ingest(&thinking("S1", "...", true));
    console.send("more").await.unwrap();

    let entries = console.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].kind, EntryKind::User);
    assert_eq!(entries[2].content, "more");
    assert_eq!(
        service.continues.lock().clone(),
        vec![("S1".to_string(), "more".to_string())]
    );
}

#[tokio::test]
async fn test_send_after_completion_resumes_running() {
    let console = Console::new(ScriptedService::new("S1"));
    console.start("hi").await.unwrap();
    console.ingest(r#"{"type":"console_session_status","session_id":"S1","status":"completed"}"#);
    assert_eq!(console.phase(), Phase::Idle);

    console.send("follow up").await.unwrap();
    assert!(console.is_running());
    assert_eq!(console.phase(), Phase::Running);
}

#[tokio::test]
async fn test_failed_send_keeps_entry_and_notifies() {
    let service = ScriptedService::new("S1");
    let console = Console::new(service.clone());
    console.start("hi").await.unwrap();
    service.fail_continue.store(true, Ordering::SeqCst);
    let mut rx = console.subscribe();

    assert!(console.send("more").await.is_err());
    assert_eq!(console.entries().len(), 2);
    assert_eq!(console.session_id().as_deref(), Some("S1"));
    assert_eq!(notices(&mut rx), vec![Notice::error("Failed to send message")]);
}

#[tokio::test]
async fn test_submit_dispatches_on_binding() {
    let service = ScriptedService::new("S1");
    let console = Console::new(service.clone());

    assert!(matches!(console.submit("  ").await, Err(ConsoleError::EmptyInput)));
    console.submit("first").await.unwrap();
    console.submit("second").await.unwrap();

    assert_eq!(service.starts.lock().len(), 1);
    assert_eq!(service.continues.lock().len(), 1);
    assert_eq!(console.entries().len(), 2);
}

// ---------------------------------------------------------------------------
// stop / new session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stop_clears_binding_and_running() {
    let service = ScriptedService::new("S1");
    let console = Console::new(service.clone());
    console.start("hi").await.unwrap();
    let mut rx = console.subscribe();

    console.stop().await.unwrap();
    assert!(console.session_id().is_none());
    assert!(!console.is_running());
    assert_eq!(console.phase(), Phase::Idle);
    assert_eq!(console.entries().len(), 1);
    assert_eq!(service.stops.lock().clone(), vec!["S1".to_string()]);
    assert_eq!(notices(&mut rx), vec![Notice::success("Session stopped")]);

    assert!(matches!(console.send("more").await, Err(ConsoleError::NoSession)));
}

#[tokio::test]
async fn test_trailing_echo_after_stop_does_not_rebind() {
    let service = ScriptedService::new("S1");
    let console = Console::new(service.clone());
    console.start("hi").await.unwrap();
    console.stop().await.unwrap();

    console.ingest(r#"{"type":"console_session_status","session_id":"S1","status":"completed"}"#);
    console.ingest(&thinking("S1", "late", false));
    assert!(console.session_id().is_none());
    assert_eq!(console.entries().len(), 1);

    console.submit("next task").await.unwrap();
    assert_eq!(service.starts.lock().len(), 2);
    assert!(service.continues.lock().is_empty());
    assert_eq!(console.phase(), Phase::Running);
}

#[tokio::test]
async fn test_failed_stop_keeps_session() {
    let service = ScriptedService::new("S1");
    service.fail_stop.store(true, Ordering::SeqCst);
    let console = Console::new(service);
    console.start("hi").await.unwrap();

    assert!(console.stop().await.is_err());
    assert_eq!(console.session_id().as_deref(), Some("S1"));
    assert!(console.is_running());
}

#[tokio::test]
async fn test_new_session_clears_everything() {
    let console = Console::new(ScriptedService::new("S1"));
    console.start("hi").await.unwrap();
    console.ingest(&thinking("S1", "partial", false));

    console.new_session();
    assert!(console.entries().is_empty());
    assert!(console.session_id().is_none());
    assert!(!console.is_running());

    console.ingest(&thinking("S2", "fresh", false));
    assert_eq!(console.session_id().as_deref(), Some("S2"));
}

// ---------------------------------------------------------------------------
// Directory selection
// ---------------------------------------------------------------------------

struct FixedSelector(DirectorySelection);

#[async_trait]
impl DirectorySelector for FixedSelector {
    async fn select_directory(&self) -> ConsoleResult<DirectorySelection> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_directory_selection_updates_project_path() {
    let console = Console::new(ScriptedService::new("S1"));
    let mut rx = console.subscribe();

    let picked = console
        .select_directory(&FixedSelector(DirectorySelection::Selected(PathBuf::from("/work"))))
        .await
        .unwrap();
    assert_eq!(picked, Some(PathBuf::from("/work")));
    assert_eq!(console.options().project_path, Some(PathBuf::from("/work")));

    let cancelled = console
        .select_directory(&FixedSelector(DirectorySelection::Cancelled))
        .await
        .unwrap();
    assert!(cancelled.is_none());
    assert_eq!(console.options().project_path, Some(PathBuf::from("/work")));

    console
        .select_directory(&FixedSelector(DirectorySelection::Failed(String::new())))
        .await
        .unwrap();
    assert_eq!(notices(&mut rx), vec![Notice::error("Failed to select directory")]);
}

#[tokio::test]
async fn test_directory_selection_refused_while_bound() {
    let console = Console::new(ScriptedService::new("S1"));
    console.start("hi").await.unwrap();
    let result = console
        .select_directory(&FixedSelector(DirectorySelection::Selected(PathBuf::from("/x"))))
        .await;
    assert!(matches!(result, Err(ConsoleError::InvalidState(_))));
}
