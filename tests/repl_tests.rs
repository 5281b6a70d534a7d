mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;

use mi_bridge::debugger::{ExecState, Session, SessionOptions};
use mi_bridge::repl;

async fn run_script(backend: MockBackend, source: &str, script: &str) -> (Arc<MockBackend>, ExecState, String) {
    let backend = Arc::new(backend);
    let options = SessionOptions {
        resolve_addresses: false,
        ..SessionOptions::default()
    };
    let mut session = Session::start_shared(Arc::clone(&backend), options).await.unwrap();
    let mut out: Vec<u8> = Vec::new();

    repl::load(&mut session, source, &mut out).await.unwrap();
    repl::run(&mut session, BufReader::new(script.as_bytes()), &mut out)
        .await
        .unwrap();

    let state = session.state().exec_state;
    (backend, state, String::from_utf8(out).unwrap())
}

async fn exited_session() -> Session<MockBackend> {
    let backend = ScriptedProgram::default()
        .into_backend()
        .with_load(vec![stopped("exited-normally", None)]);
    let mut session = Session::start(backend, SessionOptions::default()).await.unwrap();
    repl::load(&mut session, "int main(){return 0;}", &mut Vec::<u8>::new())
        .await
        .unwrap();
    session
}

#[cfg(test)]
mod repl_tests {
    use super::*;

    #[tokio::test]
    async fn test_load_then_step_over_with_empty_line() {
        let program = ScriptedProgram::default()
            .frame("main", 3, &[("x", "0", "int", "0x64", 4)])
            .on("-exec-next", vec![running(None), stopped("end-stepping-range", Some(4))]);
        let backend = program
            .into_backend()
            .with_load(vec![stopped("breakpoint-hit", Some(3))]);

        let (backend, state, out) = run_script(backend, "int main(){int x=0;}", "\nq\n").await;

        assert_eq!(state, ExecState::Stopped);
        assert!(out.contains("next line 3"), "load shows the breakpoint: {}", out);
        assert!(out.contains("next line 4"), "empty line steps over: {}", out);
        assert!(backend.commands().iter().any(|c| c.ends_with("-exec-next")));
    }

    #[tokio::test]
    async fn test_step_refused_after_exit() {
        let backend = ScriptedProgram::default()
            .into_backend()
            .with_load(vec![stopped("exited-normally", None)]);

        let (backend, state, out) = run_script(backend, "int main(){return 0;}", "s\n").await;

        assert_eq!(state, ExecState::ExitedNormally);
        assert!(out.contains("cannot step while program is exited-normally"));
        assert!(backend.commands().is_empty());
    }

    #[tokio::test]
    async fn test_raw_and_unknown_commands() {
        let backend = MockBackend::new(Box::new(|token, _| {
            vec![done(token, serde_json::json!({"value": "42"}))]
        }));

        let (backend, _, out) =
            run_script(backend, "int main(){}", "raw -data-evaluate-expression 6*7\nbogus\nedit\n").await;

        assert_eq!(backend.commands(), vec!["1-data-evaluate-expression 6*7"]);
        assert!(out.contains("42"));
        assert!(out.contains("Unknown command: bogus"));
        assert!(out.contains("edit mode"));
    }

    #[tokio::test]
    async fn test_cancelled_session_leaves_idle_prompt() {
        let mut session = exited_session().await;
        session.cancellation_token().cancel();

        // The writer half stays open, so the reader never yields a line or EOF.
        let (_writer, reader) = tokio::io::duplex(64);
        let mut out: Vec<u8> = Vec::new();
        let finished = tokio::time::timeout(
            Duration::from_millis(500),
            repl::run(&mut session, BufReader::new(reader), &mut out),
        )
        .await;

        assert!(finished.is_ok(), "prompt must end once the session is cancelled");
        assert!(finished.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_interrupt_while_waiting_for_input() {
        let mut session = exited_session().await;
        let cancel = session.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let (_writer, reader) = tokio::io::duplex(64);
        let mut out: Vec<u8> = Vec::new();
        let finished = tokio::time::timeout(
            Duration::from_secs(2),
            repl::run(&mut session, BufReader::new(reader), &mut out),
        )
        .await;

        assert!(finished.is_ok(), "interrupt must end a prompt blocked on input");
    }

    #[tokio::test]
    async fn test_cancelled_session_ignores_pending_lines() {
        let mut session = exited_session().await;
        session.cancellation_token().cancel();

        let mut out: Vec<u8> = Vec::new();
        repl::run(&mut session, BufReader::new(&b"n\nn\n"[..]), &mut out)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(!out.contains("cannot next"), "no command runs after cancel: {}", out);
    }
}
