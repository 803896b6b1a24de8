use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tether_core::cancel::{CancellationController, CancellationSignal, SIGINT};
use tether_core::input::InputMediator;
use tether_core::output::SharedOutput;
use tether_core::{
    CancelReason, Completion, Computation, ComputationError, ConsoleConfig, ConsoleError,
    ConsoleEvent, ConsoleIo, InputError, OutputBuffer, RunController, RunOutcome, RunState,
    SessionId,
};

// ============================================================================
// Test computation
// ============================================================================

/// Interprets one command per source line:
///
/// - `print <text>`  write text + newline
/// - `write <text>`  write text as-is
/// - `read <prompt>` await a line and print it
/// - `spin`          poll the checkpoint until stopped
/// - `fail <msg>`    report a semantic failure
/// - `fault <msg>`   break outside the error channel
/// - `panic`         panic
struct Scripted;

#[async_trait]
impl Computation for Scripted {
    async fn run(
        &self,
        _session: SessionId,
        source: &str,
        io: ConsoleIo,
    ) -> anyhow::Result<Completion> {
        for line in source.lines() {
            let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
            match cmd {
                "print" => io.write(&format!("{arg}\n")),
                "write" => io.write(arg),
                "read" => match io.await_input(arg).await {
                    Ok(value) => io.write(&format!("got {value}\n")),
                    Err(e) if e.is_cancellation() => {
                        return Ok(Completion::failed(ComputationError::cancelled("")));
                    }
                    Err(e) => return Err(e.into()),
                },
                "spin" => loop {
                    if io.checkpoint().is_err() {
                        return Ok(Completion::failed(ComputationError::cancelled(
                            "stopped at checkpoint",
                        )));
                    }
                    tokio::task::yield_now().await;
                },
                "fail" => return Ok(Completion::failed(ComputationError::new(arg))),
                "fault" => anyhow::bail!("{}", arg),
                "panic" => panic!("computation exploded"),
                _ => {}
            }
        }
        Ok(Completion::ok(Some("done".to_string())))
    }
}

fn controller() -> RunController {
    RunController::new(ConsoleConfig::default(), Arc::new(Scripted))
}

async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition never held");
}

// ============================================================================
// Output Buffer
// ============================================================================

#[test]
fn test_multi_line_write() {
    let mut buf = OutputBuffer::new();
    buf.append("a\nb");
    buf.append("c\n");
    let lines = buf.render();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].text, "a");
    assert_eq!(lines[1].text, "bc");
    assert!(lines.iter().all(|l| l.closed));
}

#[test]
fn test_blank_line_is_empty_closed_line() {
    let mut buf = OutputBuffer::new();
    buf.append("top\n\nbottom\n");
    let lines = buf.render();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1].text, "");
    assert!(lines[1].closed);
    assert_eq!(lines[1].ordinal, 2);
}

#[test]
fn test_leading_newline_on_empty_buffer() {
    let mut buf = OutputBuffer::new();
    buf.append("\n");
    assert_eq!(buf.len(), 1);
    assert!(buf.lines()[0].closed);
    assert_eq!(buf.lines()[0].text, "");
}

#[test]
fn test_output_round_trip() {
    let writes = [
        "",
        "Enter a number: ",
        "42\n",
        "\n",
        "x = 1\ny = 2\n\n",
        "partial",
        " tail",
        "\n\n",
        "end",
    ];
    let mut buf = OutputBuffer::new();
    let mut expected = String::new();
    for w in writes {
        buf.append(w);
        expected.push_str(w);
        assert_eq!(buf.text(), expected);
    }
    assert!(buf.is_line_open());
}

#[test]
fn test_empty_append_is_noop_on_content() {
    let mut buf = OutputBuffer::new();
    buf.append("abc");
    buf.append("");
    assert_eq!(buf.len(), 1);
    assert_eq!(buf.text(), "abc");
}

#[test]
fn test_clear_is_idempotent_and_resets_ordinals() {
    let mut buf = OutputBuffer::new();
    buf.append("one\ntwo\n");
    buf.clear();
    let once = buf.render();
    buf.clear();
    assert_eq!(buf.render(), once);
    assert!(buf.is_empty());

    buf.append("again");
    assert_eq!(buf.lines()[0].ordinal, 1);
}

#[test]
fn test_shared_output_signals_even_on_empty_append() {
    let (tx, mut rx) = tokio::sync::broadcast::channel(8);
    let output = SharedOutput::new(tx);
    output.append("");
    assert!(matches!(rx.try_recv(), Ok(ConsoleEvent::OutputChanged)));
    output.clear();
    assert!(matches!(rx.try_recv(), Ok(ConsoleEvent::OutputChanged)));
}

// ============================================================================
// Input Mediator
// ============================================================================

#[tokio::test]
async fn test_buffered_input_resolves_without_suspension() {
    let mediator = InputMediator::new();
    mediator.supply("5");
    let handle = mediator.request("");
    assert!(handle.is_ready());
    assert_eq!(handle.await, Ok("5".to_string()));
}

#[tokio::test]
async fn test_blocking_input_then_late_supply() {
    let mediator = Arc::new(InputMediator::new());
    let handle = mediator.request("n=");
    assert!(!handle.is_ready());
    assert_eq!(mediator.pending_prompt().as_deref(), Some("n="));

    let supplier = mediator.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        supplier.supply("7");
    });

    assert_eq!(handle.await, Ok("7".to_string()));
    assert_eq!(mediator.waiting_len(), 0);
    assert_eq!(mediator.queued_len(), 0);
}

#[tokio::test]
async fn test_fifo_pairing_across_interleavings() {
    // Every arrangement of three supplies and three requests.
    for mask in 0u32..64 {
        if mask.count_ones() != 3 {
            continue;
        }
        let mediator = InputMediator::new();
        let mut handles = Vec::new();
        let mut supplied = 0;

        for bit in 0..6 {
            if mask & (1 << bit) != 0 {
                supplied += 1;
                mediator.supply(format!("v{supplied}"));
            } else {
                handles.push(mediator.request(""));
            }
            assert!(
                mediator.queued_len() == 0 || mediator.waiting_len() == 0,
                "both queues non-empty for mask {mask:#b}"
            );
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await, Ok(format!("v{}", i + 1)), "mask {mask:#b}");
        }
    }
}

#[tokio::test]
async fn test_cancel_all_rejects_every_waiter() {
    let mediator = InputMediator::new();
    let handles: Vec<_> = (0..3).map(|i| mediator.request(format!("p{i}"))).collect();
    assert_eq!(mediator.waiting_len(), 3);

    let rejected = mediator.cancel_all(CancelReason::StopRequested);
    assert_eq!(rejected, 3);
    assert_eq!(mediator.waiting_len(), 0);

    for handle in handles {
        assert_eq!(
            handle.await,
            Err(InputError::Cancelled(CancelReason::StopRequested))
        );
    }
}

#[test]
fn test_cancel_all_discards_buffered_values() {
    let mediator = InputMediator::new();
    mediator.supply("typed ahead");
    mediator.cancel_all(CancelReason::StopRequested);
    assert_eq!(mediator.queued_len(), 0);
    assert!(!mediator.request("").is_ready());
}

#[tokio::test]
async fn test_reset_rejects_stale_waiter() {
    let mediator = InputMediator::new();
    let stale = mediator.request("old");
    mediator.supply("ignored");
    let survivor = mediator.request("older");

    assert_eq!(mediator.reset(), 1);
    assert_eq!(survivor.await, Err(InputError::StaleWaiter));
    assert_eq!(stale.await, Ok("ignored".to_string()));
    assert_eq!(mediator.queued_len(), 0);
    assert_eq!(mediator.waiting_len(), 0);
}

// ============================================================================
// Cancellation Controller
// ============================================================================

#[tokio::test]
async fn test_request_stop_raises_both_channels() {
    let mediator = Arc::new(InputMediator::new());
    let signal = Arc::new(CancellationSignal::new(true));
    let ctl = CancellationController::new(signal.clone(), mediator.clone());

    let pending = mediator.request("");
    assert!(ctl.request_stop());
    assert!(signal.is_stop_requested());
    assert_eq!(signal.interrupt_cell().map(|c| c.load()), Some(SIGINT));
    assert!(pending.await.is_err());

    // Idempotent.
    assert!(!ctl.request_stop());

    ctl.clear();
    assert!(!signal.is_raised());
    assert_eq!(signal.interrupt_cell().map(|c| c.load()), Some(0));
    assert!(signal.checkpoint().is_ok());
}

// ============================================================================
// Run Controller
// ============================================================================

#[tokio::test]
async fn test_run_completes_and_returns_to_idle() {
    let ctl = controller();
    let report = ctl.start("print hello\nwrite no newline").await.unwrap();

    assert_eq!(
        report.outcome,
        RunOutcome::Completed {
            value: Some("done".to_string())
        }
    );
    assert_eq!(ctl.state(), RunState::Idle);
    // The open line is terminated on settle.
    assert_eq!(ctl.output().text(), "hello\nno newline\n");
}

#[tokio::test]
async fn test_start_clears_previous_output() {
    let ctl = controller();
    ctl.start("print first").await.unwrap();
    ctl.start("print second").await.unwrap();
    assert_eq!(ctl.output().text(), "second\n");
}

#[tokio::test]
async fn test_input_round_trip_through_controller() {
    let ctl = controller();
    let mut events = ctl.subscribe();
    let run = ctl.spawn("read name? \nprint bye");

    eventually(|| ctl.is_awaiting_input()).await;
    assert_eq!(ctl.pending_prompt().as_deref(), Some("name? "));
    assert!(ctl.submit_line("Ada"));

    let report = run.await.unwrap().unwrap();
    assert!(report.outcome.is_success());
    assert_eq!(ctl.output().text(), "name? Ada\ngot Ada\nbye\n");

    let mut saw_request = false;
    while let Ok(event) = events.try_recv() {
        if let ConsoleEvent::InputRequested { prompt } = event {
            assert_eq!(prompt, "name? ");
            saw_request = true;
        }
    }
    assert!(saw_request);
}

#[tokio::test]
async fn test_session_exclusivity() {
    let ctl = controller();
    let run = ctl.spawn("print started\nread x");
    eventually(|| ctl.is_awaiting_input()).await;

    let before = ctl.output().text();
    let second = ctl.start("print intruder").await;
    assert!(matches!(second, Err(ConsoleError::Busy)));
    assert_eq!(ctl.output().text(), before);
    assert_eq!(ctl.state(), RunState::Running);
    assert!(ctl.is_awaiting_input());

    ctl.supply("1");
    let report = run.await.unwrap().unwrap();
    assert!(report.outcome.is_success());
}

#[tokio::test]
async fn test_stop_during_block_then_fresh_session() {
    let ctl = controller();
    let run = ctl.spawn("read first");
    eventually(|| ctl.is_awaiting_input()).await;

    assert!(ctl.stop());
    assert_eq!(ctl.state(), RunState::StopRequested);
    assert!(!ctl.stop());

    let report = run.await.unwrap().unwrap();
    assert!(matches!(report.outcome, RunOutcome::Cancelled { .. }));
    assert_eq!(ctl.state(), RunState::Idle);
    assert!(ctl.output().text().contains("Execution stopped by user"));

    // The next session's first request must suspend, not be answered by
    // anything left over from the cancelled one.
    let run = ctl.spawn("read second");
    eventually(|| ctl.is_awaiting_input()).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(ctl.is_awaiting_input());

    ctl.supply("fresh");
    let report = run.await.unwrap().unwrap();
    assert!(report.outcome.is_success());
    assert!(ctl.output().text().contains("got fresh"));
}

#[tokio::test]
async fn test_stop_observed_at_checkpoint() {
    let ctl = controller();
    let run = ctl.spawn("print looping\nspin");
    eventually(|| ctl.output().text().contains("looping")).await;

    assert!(ctl.interrupt());
    let report = run.await.unwrap().unwrap();
    assert_eq!(
        report.outcome,
        RunOutcome::Cancelled {
            text: "stopped at checkpoint".to_string()
        }
    );
    assert_eq!(
        ctl.output().text(),
        "looping\n^C\nstopped at checkpoint\n"
    );
}

#[tokio::test]
async fn test_interrupt_ignored_while_awaiting_line() {
    let ctl = controller();
    let run = ctl.spawn("read x");
    eventually(|| ctl.is_awaiting_input()).await;

    assert!(!ctl.interrupt());
    assert_eq!(ctl.state(), RunState::Running);

    ctl.submit_line("ok");
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_stop_and_interrupt_are_noops_when_idle() {
    let ctl = controller();
    assert!(!ctl.stop());
    assert!(!ctl.interrupt());
    assert!(!ctl.submit_line("nobody listening"));
    assert_eq!(ctl.state(), RunState::Idle);
    assert!(ctl.output().is_empty());
}

#[tokio::test]
async fn test_semantic_failure_is_reported_verbatim() {
    let ctl = controller();
    let report = ctl.start("write partial\nfail Division by zero").await.unwrap();
    assert_eq!(
        report.outcome,
        RunOutcome::Failed {
            text: "Division by zero".to_string()
        }
    );
    assert_eq!(ctl.output().text(), "partial\nDivision by zero\n");
}

#[tokio::test]
async fn test_host_fault_from_entry_point() {
    let ctl = controller();
    let report = ctl.start("fault bridge unavailable").await.unwrap();
    assert!(matches!(report.outcome, RunOutcome::HostFault { .. }));
    assert_eq!(ctl.output().text(), "Host error: bridge unavailable\n");
    assert_eq!(ctl.state(), RunState::Idle);
}

#[tokio::test]
async fn test_host_fault_from_panic_forces_idle() {
    let ctl = controller();
    let report = ctl.start("panic").await.unwrap();
    assert_eq!(
        report.outcome,
        RunOutcome::HostFault {
            text: "computation exploded".to_string()
        }
    );
    assert_eq!(ctl.state(), RunState::Idle);

    // The controller is still usable.
    let report = ctl.start("print recovered").await.unwrap();
    assert!(report.outcome.is_success());
}

#[tokio::test]
async fn test_supply_ahead_of_request_is_consumed_in_order() {
    let ctl = controller();
    let run = ctl.spawn("read a\nread b");
    eventually(|| ctl.is_awaiting_input()).await;

    // The second value arrives before the second request exists.
    ctl.supply("1");
    ctl.supply("2");
    run.await.unwrap().unwrap();
    assert_eq!(ctl.output().text(), "got 1\ngot 2\n");
}

#[tokio::test]
async fn test_report_serializes() {
    let ctl = controller();
    let report = ctl.start("print x").await.unwrap();
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"kind\":\"completed\""));
    assert!(report.duration_ms >= 0);
}

// ============================================================================
// Configuration
// ============================================================================

fn scratch_path() -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("tether-test-{}", uuid::Uuid::new_v4()))
        .join("config.json")
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let path = scratch_path();
    let config = ConsoleConfig::load(Some(&path));
    assert_eq!(config.stopped_message, "Execution stopped by user");
    assert_eq!(config.host_fault_prefix, "Host error: ");
    assert!(config.echo_input);
}

#[test]
fn test_config_save_then_read() {
    let path = scratch_path();
    let config = ConsoleConfig {
        interrupt_echo: "<break>".to_string(),
        echo_input: false,
        ..ConsoleConfig::default()
    };
    config.save(&path).unwrap();

    let loaded = ConsoleConfig::read(&path).unwrap();
    assert_eq!(loaded, config);

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

#[test]
fn test_config_partial_file_fills_defaults() {
    let path = scratch_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{ "stopped_message": "halted" }"#).unwrap();

    let loaded = ConsoleConfig::read(&path).unwrap();
    assert_eq!(loaded.stopped_message, "halted");
    assert_eq!(loaded.event_capacity, 1024);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_config_rejects_zero_capacity() {
    let config = ConsoleConfig {
        event_capacity: 0,
        ..ConsoleConfig::default()
    };
    assert!(matches!(config.validate(), Err(ConsoleError::Config(_))));
}

#[test]
fn test_config_corrupt_file_falls_back() {
    let path = scratch_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert!(ConsoleConfig::read(&path).is_err());
    let config = ConsoleConfig::load(Some(&path));
    assert_eq!(config.interrupt_echo, "^C");

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
