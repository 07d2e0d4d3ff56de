//! Integration tests for the harness
//!
//! Every test runs a registry end to end with real forks and checks the
//! report text and the aggregated outcome.

use nix::sys::signal::{raise, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use traitbox::{
    FailureCause, FeatureVerdict, Fixture, HarnessConfig, RunOutcome, Subject, SuiteExecutor,
    Trait,
};

fn run(subject: &Subject, names: &[&str]) -> (RunOutcome, String) {
    run_with(subject, names, &HarnessConfig::default())
}

fn run_with(subject: &Subject, names: &[&str], config: &HarnessConfig) -> (RunOutcome, String) {
    let mut out = Vec::new();
    let outcome = SuiteExecutor::new(subject, config)
        .run(names, &mut out)
        .expect("harness fault");
    (outcome, String::from_utf8(out).expect("report is UTF-8"))
}

fn scratch(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "traitbox-it-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

fn pass_and_crash() -> Subject {
    Subject::new("S").with_trait(
        Trait::new("T")
            .run("pass", |_| {})
            .run("crash", |_| traitbox::abort!("crash requested")),
    )
}

#[test]
fn test_pass_and_crash_scenario() {
    let (outcome, text) = run(&pass_and_crash(), &[]);

    assert!(outcome.loaded);
    assert_eq!(outcome.tally.succeed, 1);
    assert_eq!(outcome.tally.failed, 1);
    assert_eq!(outcome.tally.skipped, 0);
    assert_eq!(outcome.tally.all, 2);
    assert_eq!(outcome.exit_code(), 1);

    assert!(text.starts_with("Describing: S\n  Trait: T\n    Feature: pass... succeed\n"));
    assert!(text.contains(&format!(
        "    Feature: crash... (terminated by signal {} - SIGABRT) failed\n",
        libc::SIGABRT
    )));
    assert!(text.contains("Cause: crash requested\n"));
    assert!(text.ends_with("\nSucceed: 1\nSkipped: 0\n Failed: 1\n    All: 2\n"));
}

#[test]
fn test_unknown_trait_is_a_load_failure() {
    let (outcome, text) = run(&pass_and_crash(), &["Nope"]);

    assert!(!outcome.loaded);
    assert_eq!(outcome.tally.all, 0);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(text, "Unknown trait: `Nope`\n");
}

#[test]
fn test_too_many_traits_is_a_load_failure() {
    let config = HarnessConfig {
        max_selected_traits: 1,
        ..HarnessConfig::default()
    };
    let (outcome, text) = run_with(&pass_and_crash(), &["T", "T"], &config);

    assert!(!outcome.loaded);
    assert_eq!(outcome.exit_code(), 1);
    assert!(text.starts_with("Too many traits specified"));
}

#[test]
fn test_selection_runs_only_named_traits_in_registry_order() {
    let subject = Subject::new("S")
        .with_trait(Trait::new("A").run("a", |_| {}))
        .with_trait(Trait::new("B").run("b", |_| {}))
        .with_trait(Trait::new("C").run("c", |_| {}));

    let (outcome, text) = run(&subject, &["C", "A"]);

    assert_eq!(outcome.tally.all, 2);
    assert_eq!(outcome.exit_code(), 0);
    let a = text.find("Trait: A").expect("A ran");
    let c = text.find("Trait: C").expect("C ran");
    assert!(a < c);
    assert!(!text.contains("Trait: B"));
}

#[test]
fn test_skipped_feature_is_never_forked() {
    let marker = scratch("skip-marker");
    let path = marker.clone();
    let subject = Subject::new("S").with_trait(Trait::new("T").skip("later", move |_| {
        std::fs::write(&path, b"ran").unwrap();
    }));

    let (outcome, text) = run(&subject, &[]);

    assert_eq!(outcome.tally.skipped, 1);
    assert_eq!(outcome.tally.all, 1);
    assert_eq!(outcome.exit_code(), 0);
    assert!(text.contains("Feature: later... skipped\n"));
    assert!(!marker.exists());
}

#[test]
fn test_failed_feature_diagnostics_are_reported_verbatim() {
    let subject = Subject::new("S").with_trait(Trait::new("T").run("noisy", |_| {
        let _ = std::io::stderr().write_all(b"line one\nline two\n");
        std::process::exit(1);
    }));

    let (outcome, text) = run(&subject, &[]);

    assert_eq!(outcome.tally.failed, 1);
    assert!(text.contains("    Feature: noisy... failed\n\nline one\nline two\n\n"));
}

#[test]
fn test_panicking_feature_fails_and_run_continues() {
    let subject = Subject::new("S").with_trait(
        Trait::new("T")
            .run("panics", |_| assert_eq!(1 + 1, 3, "arithmetic is broken"))
            .run("after", |_| {}),
    );

    let (outcome, text) = run(&subject, &[]);

    assert_eq!(outcome.tally.failed, 1);
    assert_eq!(outcome.tally.succeed, 1);
    assert!(text.contains("arithmetic is broken"));
    assert!(text.contains("Feature: after... succeed\n"));
    assert!(matches!(
        outcome.records[0].verdict,
        FeatureVerdict::Failed {
            cause: FailureCause::ExitCode(101),
            ..
        }
    ));
}

#[test]
fn test_escape_scope_keeps_feature_alive() {
    let subject = Subject::new("S").with_trait(Trait::new("Signals").run("aborts twice", |cx| {
        cx.escape(Signal::SIGABRT, || traitbox::abort!("first"));
        assert_eq!(cx.wrapped_signals(), 1);
        cx.escape(Signal::SIGABRT, || std::process::abort());
        assert_eq!(cx.wrapped_signals(), 2);
    }));

    let (outcome, text) = run(&subject, &[]);

    assert_eq!(outcome.tally.succeed, 1, "report was:\n{}", text);
    assert_eq!(outcome.exit_code(), 0);
}

static OWN_HANDLER_RAN: AtomicBool = AtomicBool::new(false);

extern "C" fn own_usr1_handler(_: libc::c_int) {
    OWN_HANDLER_RAN.store(true, Ordering::SeqCst);
}

#[test]
fn test_feature_handler_survives_escape_scopes() {
    let subject = Subject::new("S").with_trait(Trait::new("Signals").run("own handler", |cx| {
        let action = SigAction::new(
            SigHandler::Handler(own_usr1_handler),
            SaFlags::empty(),
            SigSet::empty(),
        );
        unsafe { sigaction(Signal::SIGUSR1, &action) }.unwrap();

        cx.escape(Signal::SIGUSR1, || {
            let _ = raise(Signal::SIGUSR1);
        });
        cx.escape(Signal::SIGUSR1, || {});
        assert_eq!(cx.wrapped_signals(), 1);
        assert!(!OWN_HANDLER_RAN.load(Ordering::SeqCst));

        raise(Signal::SIGUSR1).unwrap();
        assert!(OWN_HANDLER_RAN.load(Ordering::SeqCst));
    }));

    let (outcome, text) = run(&subject, &[]);

    assert_eq!(outcome.tally.succeed, 1, "report was:\n{}", text);
    assert_eq!(outcome.exit_code(), 0);
}

#[test]
fn test_unwrapped_signal_inside_scope_fails_feature() {
    let subject = Subject::new("S").with_trait(Trait::new("Signals").run("wrong signal", |cx| {
        cx.escape(Signal::SIGUSR1, || {
            let _ = raise(Signal::SIGTERM);
        });
    }));

    let (outcome, text) = run(&subject, &[]);

    assert_eq!(outcome.tally.failed, 1);
    assert!(text.contains("SIGTERM) failed"));
}

#[test]
fn test_fixture_teardown_runs_even_when_body_panics() {
    let marker = scratch("teardown-marker");
    let path = marker.clone();
    let fixture = Fixture::new(
        "marker",
        move || path.clone(),
        |path: PathBuf| std::fs::write(path, b"torn down").unwrap(),
    );
    let subject = Subject::new("S").with_trait(Trait::new("T").run_with(
        "panics",
        &fixture,
        |cx| {
            assert!(cx.context::<PathBuf>().is_absolute());
            panic!("body failed");
        },
    ));

    let (outcome, _) = run(&subject, &[]);

    assert_eq!(outcome.tally.failed, 1);
    assert_eq!(std::fs::read(&marker).unwrap(), b"torn down");
    let _ = std::fs::remove_file(&marker);
}

#[test]
fn test_small_buffer_truncates_report_diagnostics() {
    let config = HarnessConfig {
        buffer_capacity: 4,
        ..HarnessConfig::default()
    };
    let subject = Subject::new("S").with_trait(Trait::new("T").run("chatty", |_| {
        let _ = std::io::stderr().write_all(b"abcdefgh");
        std::process::exit(1);
    }));

    let (_, text) = run_with(&subject, &[], &config);

    assert!(text.contains("chatty... failed\n\nabcd\n"));
    assert!(!text.contains("abcde"));
}

#[test]
fn test_tally_is_consistent_across_traits() {
    let subject = Subject::new("S")
        .with_trait(Trait::new("A").run("ok", |_| {}).skip("skip", |_| {}))
        .with_trait(
            Trait::new("B")
                .run("bad", |_| std::process::exit(4))
                .run("ok", |_| {}),
        );

    let (outcome, _) = run(&subject, &[]);

    assert!(outcome.tally.is_consistent());
    assert_eq!(outcome.tally.all, subject.feature_count());
    assert_eq!(outcome.records.len(), 4);
}
