// End-to-end runs against a scripted engine

use crate::common::fake_engine::Script;
use crate::common::helpers::{
    drain, harness, harness_with_failing_inhibitor, harness_with_failing_killer, job,
    log_messages, run_config, statuses, subtitled_job, wait_for,
};
use upscaler::dashboard::{self, Dashboard};
use upscaler::engine::{
    ErrorKind, JobStatus, LogLevel, OutputFormat, QueueError, RunEnd, RunError, RunEvent,
    RunOutcome,
};

#[test]
fn test_single_mp4_job_finishes() {
    let mut h = harness(vec![job("/videos/clip.mp4")], vec![Script::success()]);
    let cfg = run_config(OutputFormat::Mp4);
    let mut dash = Dashboard::new(h.orchestrator.queue().jobs(), false);

    let outcome = h.orchestrator.run(&cfg);
    assert!(matches!(outcome, RunOutcome::Completed { processed: 1 }));
    assert_eq!(statuses(h.orchestrator.queue()), vec![JobStatus::Finished]);
    assert!(!h.orchestrator.control().is_running());
    assert_eq!(h.inhibitor.acquired(), 1);
    assert_eq!(h.inhibitor.held(), 0, "sleep inhibition ends with the run");

    let calls = h.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].last().unwrap(), "/videos/clip_upscaled.mp4");

    let events = drain(&h.events);
    for event in &events {
        dash.apply(event);
    }
    assert_eq!(dash.total_progress, "1 / 1");
    assert_eq!(dash.rows[0].status, JobStatus::Finished);
    assert_eq!(dash.button_label, dashboard::IDLE_LABEL);
    assert!(events.contains(&RunEvent::RunEnded(RunEnd::Completed)));
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::Progress { index: 0, snapshot } if snapshot.fraction == 0.2
    )));

    let info = log_messages(&events, LogLevel::Info);
    assert!(info.iter().any(|m| m == "Processing clip.mp4 (1 / 1)..."));
    assert_eq!(info.last().unwrap(), "Upscaling finished!");
}

#[test]
fn test_subtitles_require_mkv() {
    let mut h = harness(vec![subtitled_job("/videos/movie.mkv")], vec![]);
    let outcome = h.orchestrator.run(&run_config(OutputFormat::Mp4));

    match outcome {
        RunOutcome::Failed(err @ RunError::IncompatibleSubtitles { .. }) => {
            assert_eq!(err.kind(), ErrorKind::UserInput);
        }
        other => panic!("expected compatibility failure, got {:?}", other),
    }
    assert_eq!(statuses(h.orchestrator.queue()), vec![JobStatus::Waiting]);
    assert!(h.calls.lock().unwrap().is_empty(), "no engine may be started");

    let events = drain(&h.events);
    assert!(!events.iter().any(|e| matches!(e, RunEvent::ErrorReport { .. })));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, RunEvent::JobStatus { status: JobStatus::Processing, .. }))
    );
    assert!(events.contains(&RunEvent::RunEnded(RunEnd::Failed)));
}

#[test]
fn test_subtitles_pass_with_mkv() {
    let mut h = harness(vec![subtitled_job("/videos/movie.mkv")], vec![]);
    let outcome = h.orchestrator.run(&run_config(OutputFormat::Mkv));
    assert!(matches!(outcome, RunOutcome::Completed { processed: 1 }));

    let calls = h.calls.lock().unwrap();
    assert!(calls[0].iter().any(|a| a == "0:s?"));
    assert_eq!(calls[0].last().unwrap(), "/videos/movie_upscaled.mkv");
}

#[test]
fn test_cancel_mid_run_resets_remaining_jobs() {
    let h = harness(
        vec![job("/v/one.mp4"), job("/v/two.mp4"), job("/v/three.mp4")],
        vec![Script::success(), Script::until_killed()],
    );
    let handle = h.orchestrator.spawn(run_config(OutputFormat::Mkv));

    let seen = wait_for(&h.events, |e| matches!(e, RunEvent::Progress { index: 1, .. }));
    assert!(seen.contains(&RunEvent::JobStatus {
        index: 1,
        status: JobStatus::Processing
    }));
    assert_eq!(h.inhibitor.held(), 1);
    assert!(handle.cancel());

    let (orchestrator, outcome) = handle.join().unwrap();
    assert!(matches!(outcome, RunOutcome::Cancelled));
    assert_eq!(h.inhibitor.held(), 0);
    assert_eq!(
        statuses(orchestrator.queue()),
        vec![JobStatus::Finished, JobStatus::NotStarted, JobStatus::NotStarted]
    );
    assert_eq!(h.killer.kills(), 1);
    assert_eq!(h.calls.lock().unwrap().len(), 2, "job 3 must never start");
    assert!(!orchestrator.control().is_running());

    let events = drain(&h.events);
    assert!(events.contains(&RunEvent::RunEnded(RunEnd::Cancelled)));
    assert!(!events.iter().any(|e| matches!(e, RunEvent::ErrorReport { .. })));
    assert!(
        log_messages(&events, LogLevel::Info)
            .iter()
            .any(|m| m == "Upscaling cancelled!")
    );
}

#[test]
fn test_failed_kill_is_soft_error() {
    let h = harness_with_failing_killer(vec![job("/v/one.mp4")], vec![Script::until_killed()]);
    let handle = h.orchestrator.spawn(run_config(OutputFormat::Mkv));

    wait_for(&h.events, |e| matches!(e, RunEvent::Progress { index: 0, .. }));
    assert!(handle.cancel());

    let (orchestrator, outcome) = handle.join().unwrap();
    assert!(matches!(outcome, RunOutcome::Cancelled));
    assert_eq!(statuses(orchestrator.queue()), vec![JobStatus::NotStarted]);

    let warnings = log_messages(&drain(&h.events), LogLevel::Warn);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("Taskkill error:"));
}

#[test]
fn test_cancel_between_jobs_starts_nothing_new() {
    // The first engine exits cleanly just as the kill lands
    let h = harness(
        vec![job("/v/one.mp4"), job("/v/two.mp4")],
        vec![Script::finishes_on_kill()],
    );
    let handle = h.orchestrator.spawn(run_config(OutputFormat::Mkv));

    wait_for(&h.events, |e| matches!(e, RunEvent::Progress { index: 0, .. }));
    assert!(handle.cancel());

    let (orchestrator, outcome) = handle.join().unwrap();
    assert!(matches!(outcome, RunOutcome::Cancelled));
    assert_eq!(
        statuses(orchestrator.queue()),
        vec![JobStatus::Finished, JobStatus::NotStarted]
    );
    assert_eq!(h.calls.lock().unwrap().len(), 1, "job 2 must never start");
    assert_eq!(h.inhibitor.held(), 0);

    let events = drain(&h.events);
    assert!(events.contains(&RunEvent::RunEnded(RunEnd::Cancelled)));
    assert!(
        log_messages(&events, LogLevel::Info)
            .iter()
            .any(|m| m == "Finished one.mp4")
    );
}

#[test]
fn test_failed_kill_on_last_clean_exit_completes() {
    let h = harness_with_failing_killer(vec![job("/v/one.mp4")], vec![Script::finishes_on_kill()]);
    let handle = h.orchestrator.spawn(run_config(OutputFormat::Mkv));

    wait_for(&h.events, |e| matches!(e, RunEvent::Progress { index: 0, .. }));
    assert!(handle.cancel());

    let (orchestrator, outcome) = handle.join().unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { processed: 1 }));
    assert_eq!(statuses(orchestrator.queue()), vec![JobStatus::Finished]);
    assert!(!orchestrator.control().is_running());
    assert!(
        !orchestrator.control().take_cancel(),
        "the late cancel is dropped with the run"
    );

    let events = drain(&h.events);
    assert!(events.contains(&RunEvent::RunEnded(RunEnd::Completed)));
    let warnings = log_messages(&events, LogLevel::Warn);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("Taskkill error:"));
}

#[test]
fn test_cancel_when_idle_does_nothing() {
    let h = harness(vec![job("/v/one.mp4")], vec![]);
    assert!(!h.orchestrator.canceller().cancel());
    assert_eq!(h.killer.kills(), 0);
    assert!(drain(&h.events).is_empty());
}

#[test]
fn test_engine_failure_reports_diagnostics() {
    let stderr = "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'a.mp4':\n\
                  [libplacebo @ 0x55d] Failed creating Vulkan device\n";
    let mut h = harness(
        vec![job("/v/a.mp4"), job("/v/b.mp4")],
        vec![Script::failure(stderr)],
    );

    let outcome = h.orchestrator.run(&run_config(OutputFormat::Mkv));
    let RunOutcome::Failed(err) = outcome else {
        panic!("expected engine failure");
    };
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert!(err.engine_log().unwrap().contains("Failed creating Vulkan device"));
    assert_eq!(h.inhibitor.acquired(), 1);
    assert_eq!(h.inhibitor.held(), 0);

    // The failing job is released; the untouched job stays queued
    assert_eq!(
        statuses(h.orchestrator.queue()),
        vec![JobStatus::NotStarted, JobStatus::Waiting]
    );
    assert_eq!(h.calls.lock().unwrap().len(), 1);

    let events = drain(&h.events);
    let report = events.iter().find_map(|e| match e {
        RunEvent::ErrorReport { message, detail } => Some((message.clone(), detail.clone())),
        _ => None,
    });
    let (message, detail) = report.expect("engine failure must attach its log");
    assert_eq!(message, "FFmpeg logs:");
    assert!(detail.starts_with("Input #0"));
}

#[test]
fn test_spawn_failure_is_environment_error() {
    let mut h = harness(vec![job("/v/a.mp4")], vec![Script::SpawnError]);
    let RunOutcome::Failed(err) = h.orchestrator.run(&run_config(OutputFormat::Mkv)) else {
        panic!("expected spawn failure");
    };
    assert_eq!(err.kind(), ErrorKind::Environment);
    assert!(err.to_string().contains("/v/a.mp4"));
    assert_eq!(statuses(h.orchestrator.queue()), vec![JobStatus::NotStarted]);
}

#[test]
fn test_rerun_skips_finished_jobs() {
    let mut h = harness(vec![job("/v/a.mp4")], vec![]);
    let cfg = run_config(OutputFormat::Mkv);

    assert!(matches!(h.orchestrator.run(&cfg), RunOutcome::Completed { processed: 1 }));
    assert!(matches!(h.orchestrator.run(&cfg), RunOutcome::Completed { processed: 0 }));
    assert_eq!(h.calls.lock().unwrap().len(), 1);
    assert_eq!(statuses(h.orchestrator.queue()), vec![JobStatus::Finished]);
}

#[test]
fn test_retry_after_failure() {
    let mut h = harness(
        vec![job("/v/a.mp4"), job("/v/b.mp4")],
        vec![Script::success(), Script::failure("boom\n")],
    );
    let cfg = run_config(OutputFormat::Mkv);

    assert!(matches!(h.orchestrator.run(&cfg), RunOutcome::Failed(_)));
    assert!(matches!(h.orchestrator.run(&cfg), RunOutcome::Completed { processed: 1 }));
    assert_eq!(
        statuses(h.orchestrator.queue()),
        vec![JobStatus::Finished, JobStatus::Finished]
    );
    assert_eq!(h.calls.lock().unwrap().len(), 3);
}

#[test]
fn test_empty_queue_is_rejected() {
    let mut h = harness(vec![], vec![]);
    let outcome = h.orchestrator.run(&run_config(OutputFormat::Mkv));
    assert!(matches!(outcome, RunOutcome::Rejected(RunError::EmptyQueue)));
    assert!(!h.orchestrator.control().is_running());
    assert_eq!(h.inhibitor.acquired(), 0, "a rejected run never inhibits sleep");

    let events = drain(&h.events);
    assert!(!events.contains(&RunEvent::RunStarted));
    assert_eq!(log_messages(&events, LogLevel::Info).len(), 1);
}

#[test]
fn test_queue_is_locked_while_running() {
    let mut h = harness(vec![job("/v/a.mp4")], vec![]);
    let control = h.orchestrator.control();
    assert!(control.try_begin());

    assert_eq!(h.orchestrator.remove_job(0), Err(QueueError::RunActive));
    assert_eq!(
        h.orchestrator.add_job(job("/v/b.mp4")),
        Err(QueueError::RunActive)
    );
    assert!(matches!(
        h.orchestrator.run(&run_config(OutputFormat::Mkv)),
        RunOutcome::Rejected(RunError::AlreadyRunning)
    ));
    assert_eq!(h.inhibitor.acquired(), 0);

    control.finish();
    assert!(h.orchestrator.remove_job(0).is_ok());
    assert!(h.orchestrator.queue().is_empty());
}

#[test]
fn test_sleep_inhibition_failure_is_soft() {
    let mut h = harness_with_failing_inhibitor(vec![job("/v/a.mp4")], vec![]);
    let outcome = h.orchestrator.run(&run_config(OutputFormat::Mkv));

    assert!(matches!(outcome, RunOutcome::Completed { processed: 1 }));
    assert_eq!(h.inhibitor.acquired(), 1);
    let warnings = log_messages(&drain(&h.events), LogLevel::Warn);
    assert_eq!(
        warnings,
        vec!["Preventing system sleep failed: no logind session".to_string()]
    );
}

#[test]
fn test_debug_run_logs_command() {
    let mut h = harness(vec![job("/v/a.mp4")], vec![]);
    let mut cfg = run_config(OutputFormat::Mp4);
    cfg.debug = true;
    h.orchestrator.run(&cfg);

    let debug = log_messages(&drain(&h.events), LogLevel::Debug);
    assert!(debug.iter().any(|m| m.starts_with("Working directory: ")));
    assert!(debug.iter().any(|m| m == "Output path: /v/a_upscaled.mp4"));
    assert!(
        debug
            .iter()
            .any(|m| m.starts_with("FFmpeg command: ffmpeg -hide_banner -y"))
    );
}

#[test]
fn test_quiet_run_has_no_debug_lines() {
    let mut h = harness(vec![job("/v/a.mp4")], vec![]);
    h.orchestrator.run(&run_config(OutputFormat::Mp4));
    assert!(log_messages(&drain(&h.events), LogLevel::Debug).is_empty());
}
