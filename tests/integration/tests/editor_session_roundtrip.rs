use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use httpmock::prelude::*;
use pseudo_remote::{HttpApiClient, RemoteConfig};
use pseudo_session::{
    shared_file_session, ExecutionOutcome, ExecutionSession, ExecutionStatus, FileListing,
    FileSessionConfig, FileSessionManager, InputPrompter, RunOptions, SessionMode,
    SessionModeController, EXECUTION_ABORTED_MESSAGE,
};
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;

struct ScriptedPrompter {
    answers: AsyncMutex<VecDeque<Option<String>>>,
    prompts: AsyncMutex<Vec<String>>,
}

impl ScriptedPrompter {
    fn new(answers: &[&str]) -> Self {
        Self {
            answers: AsyncMutex::new(
                answers
                    .iter()
                    .map(|answer| Some(answer.to_string()))
                    .collect(),
            ),
            prompts: AsyncMutex::new(Vec::new()),
        }
    }

    async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl InputPrompter for ScriptedPrompter {
    async fn prompt(&self, prompt: &str) -> Option<String> {
        self.prompts.lock().await.push(prompt.to_string());
        self.answers.lock().await.pop_front().flatten()
    }
}

fn client_for(server: &MockServer) -> Arc<HttpApiClient> {
    Arc::new(
        HttpApiClient::new(RemoteConfig {
            api_base: server.base_url(),
            request_timeout_ms: 10_000,
            execution_timeout_ms: None,
            user_agent: None,
        })
        .expect("api client should be created"),
    )
}

#[tokio::test]
async fn integration_interactive_program_completes_through_http() {
    let server = MockServer::start();
    let run = server.mock(|when, then| {
        when.method(POST).path("/api/run").json_body(json!({
            "code": "INPUT a\nINPUT b\nOUTPUT a + b",
            "debug": false,
            "strict": false
        }));
        then.status(200).json_body(json!({
            "status": "input_required",
            "prompt": "Enter a:",
            "execution_id": "exec-1"
        }));
    });
    let first_input = server.mock(|when, then| {
        when.method(POST).path("/api/input").json_body(json!({
            "execution_id": "exec-1",
            "input": "4"
        }));
        then.status(200).json_body(json!({
            "status": "input_required",
            "prompt": "Enter b:",
            "execution_id": "exec-1"
        }));
    });
    let second_input = server.mock(|when, then| {
        when.method(POST).path("/api/input").json_body(json!({
            "execution_id": "exec-1",
            "input": "5"
        }));
        then.status(200)
            .json_body(json!({ "status": "success", "output": ["9"] }));
    });

    let session = ExecutionSession::new(client_for(&server));
    let prompter = ScriptedPrompter::new(&["4", "5"]);
    let outcome = session
        .run_interactive(
            "  INPUT a\nINPUT b\nOUTPUT a + b\n",
            RunOptions::default(),
            &prompter,
        )
        .await
        .expect("interactive run");

    assert_eq!(
        outcome,
        ExecutionOutcome::Succeeded {
            output: vec!["9".to_string()]
        }
    );
    assert_eq!(
        prompter.prompts().await,
        vec!["Enter a:".to_string(), "Enter b:".to_string()]
    );
    run.assert();
    first_input.assert();
    second_input.assert();
}

#[tokio::test]
async fn integration_cancel_aborts_slow_run_and_session_restarts() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/run").json_body(json!({
            "code": "WHILE TRUE\nENDWHILE",
            "debug": false,
            "strict": false
        }));
        then.status(200)
            .delay(Duration::from_secs(5))
            .json_body(json!({ "status": "success", "output": ["late"] }));
    });
    let quick = server.mock(|when, then| {
        when.method(POST).path("/api/run").json_body(json!({
            "code": "OUTPUT 2",
            "debug": false,
            "strict": false
        }));
        then.status(200)
            .json_body(json!({ "status": "success", "output": ["2"] }));
    });

    let session = Arc::new(ExecutionSession::new(client_for(&server)));
    let canceller = Arc::clone(&session);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let outcome = session
        .start("WHILE TRUE\nENDWHILE", RunOptions::default())
        .await
        .expect("start");

    assert_eq!(outcome, ExecutionOutcome::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(2));
    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, ExecutionStatus::Cancelled);
    assert_eq!(snapshot.notice.as_deref(), Some(EXECUTION_ABORTED_MESSAGE));
    assert!(snapshot.output.is_empty());

    let outcome = session
        .start("OUTPUT 2", RunOptions::default())
        .await
        .expect("restart after cancel");
    assert_eq!(
        outcome,
        ExecutionOutcome::Succeeded {
            output: vec!["2".to_string()]
        }
    );
    quick.assert();
}

#[tokio::test]
async fn integration_login_edit_switch_delete_logout_round_trip() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/auth/status");
        then.status(200).json_body(json!({ "logged_in": false }));
    });
    let login = server.mock(|when, then| {
        when.method(POST).path("/api/auth/login");
        then.status(200)
            .header("set-cookie", "session=alice-token; Path=/")
            .json_body(json!({ "success": true, "user": { "username": "alice" } }));
    });
    let listing = server.mock(|when, then| {
        when.method(GET)
            .path("/api/files")
            .header("cookie", "session=alice-token");
        then.status(200)
            .json_body(json!({ "success": true, "files": [] }));
    });
    let create_default = server.mock(|when, then| {
        when.method(POST)
            .path("/api/files")
            .json_body(json!({ "name": "untitled_0.pseudo" }));
        then.status(200).json_body(json!({
            "success": true,
            "file": {"id": "file_1", "name": "untitled_0.pseudo", "content": ""}
        }));
    });
    let create_second = server.mock(|when, then| {
        when.method(POST)
            .path("/api/files")
            .json_body(json!({ "name": "untitled_1.pseudo" }));
        then.status(200).json_body(json!({
            "success": true,
            "file": {"id": "file_2", "name": "untitled_1.pseudo", "content": ""}
        }));
    });
    let save_first = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/files/file_1")
            .json_body(json!({ "content": "OUTPUT 1" }));
        then.status(200).json_body(json!({ "success": true }));
    });
    let delete_first = server.mock(|when, then| {
        when.method(DELETE).path("/api/files/file_1");
        then.status(200).json_body(json!({ "success": true }));
    });
    let logout = server.mock(|when, then| {
        when.method(POST).path("/api/auth/logout");
        then.status(200).json_body(json!({ "success": true }));
    });

    let client = client_for(&server);
    let files = shared_file_session(FileSessionManager::new(
        client.clone(),
        FileSessionConfig::default(),
    ));
    let mut controller = SessionModeController::new(client, files.clone()).await;
    assert_eq!(controller.initialize().await, &SessionMode::Anonymous);

    controller.login("alice", "secret1").await.expect("login");
    assert!(controller.autosave_running());
    {
        let mut files = files.lock().await;
        assert_eq!(files.current_id(), Some("file_1"));
        files.set_buffer("OUTPUT 1");
        let second = files.create_file().await.expect("create second");
        assert_eq!(second, "file_2");
        files.delete("file_1").await.expect("delete first");
        assert_eq!(
            files.listing(),
            FileListing::Entries(vec![pseudo_session::FileListItem {
                id: "file_2".to_string(),
                name: "untitled_1.pseudo".to_string(),
                is_current: true,
            }])
        );
        files.set_buffer("OUTPUT 'draft'");
    }

    controller.logout().await;
    assert!(!controller.autosave_running());
    let files = files.lock().await;
    assert_eq!(files.listing(), FileListing::SignInPlaceholder);
    assert_eq!(files.buffer(), "OUTPUT 'draft'");

    login.assert();
    listing.assert();
    create_default.assert();
    create_second.assert();
    save_first.assert();
    delete_first.assert();
    logout.assert();
}

#[tokio::test]
async fn regression_rejected_login_surfaces_server_text() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/auth/login");
        then.status(401).json_body(json!({
            "success": false,
            "error": "invalid username or password"
        }));
    });

    let client = client_for(&server);
    let files = shared_file_session(FileSessionManager::new(
        client.clone(),
        FileSessionConfig::default(),
    ));
    let mut controller = SessionModeController::new(client, files.clone()).await;

    let error = controller
        .login("alice", "wrong")
        .await
        .expect_err("login should be rejected");

    assert_eq!(error.to_string(), "invalid username or password");
    assert_eq!(controller.mode(), &SessionMode::Anonymous);
    assert_eq!(files.lock().await.current_id(), Some("default"));
}
