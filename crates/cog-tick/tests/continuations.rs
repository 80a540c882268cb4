//! Integration tests for cooperative continuations.

use cog_tick::{ContinuationHost, ContinuationQueue, RunReport, advance, run_due};

// =========================================================================
// Mock context: a round with a meeting flag.
// =========================================================================

#[derive(Default)]
struct Round {
    queue: ContinuationQueue<Round>,
    meeting: bool,
    log: Vec<String>,
}

impl ContinuationHost for Round {
    fn continuations(&mut self) -> &mut ContinuationQueue<Self> {
        &mut self.queue
    }
}

// =========================================================================
// Ordering
// =========================================================================

#[test]
fn test_resume_order_is_due_tick_then_schedule_order() {
    let mut r = Round::default();
    r.queue.schedule(2, "b", |r: &mut Round| r.log.push("b".into()));
    r.queue.schedule(1, "a", |r: &mut Round| r.log.push("a".into()));
    r.queue.schedule(2, "c", |r: &mut Round| r.log.push("c".into()));

    let report = run_due(&mut r, 5);
    assert_eq!(report, RunReport { resumed: 3, aborted: 0 });
    assert_eq!(r.log, vec!["a", "b", "c"]);
}

#[test]
fn test_nothing_runs_before_due() {
    let mut r = Round::default();
    r.queue.schedule(3, "later", |r: &mut Round| r.log.push("later".into()));

    assert_eq!(advance(&mut r, 2).resumed, 0);
    assert_eq!(advance(&mut r, 1).resumed, 1);
    assert_eq!(r.queue.current_tick(), 3);
}

#[test]
fn test_chained_continuation_runs_on_a_later_tick() {
    let mut r = Round::default();
    r.queue.schedule(1, "first", |r: &mut Round| {
        let now = r.queue.current_tick();
        r.log.push(format!("first@{now}"));
        r.queue.schedule(0, "second", |r: &mut Round| {
            let now = r.queue.current_tick();
            r.log.push(format!("second@{now}"));
        });
    });

    assert_eq!(run_due(&mut r, 1).resumed, 1);
    assert_eq!(r.log, vec!["first@1"]);

    assert_eq!(advance(&mut r, 1).resumed, 1);
    assert_eq!(r.log, vec!["first@1", "second@2"]);
}

#[test]
fn test_advance_steps_each_tick() {
    let mut r = Round::default();
    r.queue.schedule(1, "first", |r: &mut Round| {
        r.queue.schedule(1, "second", |r: &mut Round| r.log.push("second".into()));
    });

    // Both the original and the one it schedules fit inside three ticks.
    let report = advance(&mut r, 3);
    assert_eq!(report.resumed, 2);
    assert_eq!(r.log, vec!["second"]);
}

// =========================================================================
// Guards and cancellation
// =========================================================================

#[test]
fn test_false_guard_aborts() {
    let mut r = Round::default();
    r.queue.schedule_guarded(
        10,
        "revive",
        |r: &Round| !r.meeting,
        |r: &mut Round| r.log.push("revived".into()),
    );

    advance(&mut r, 5);
    r.meeting = true;
    let report = advance(&mut r, 5);

    assert_eq!(report, RunReport { resumed: 0, aborted: 1 });
    assert!(r.log.is_empty());
    assert!(r.queue.is_empty());
}

#[test]
fn test_true_guard_resumes() {
    let mut r = Round::default();
    r.queue.schedule_guarded(
        2,
        "revive",
        |r: &Round| !r.meeting,
        |r: &mut Round| r.log.push("revived".into()),
    );

    assert_eq!(advance(&mut r, 2).resumed, 1);
    assert_eq!(r.log, vec!["revived"]);
}

#[test]
fn test_cancel_before_due() {
    let mut r = Round::default();
    let keep = r.queue.schedule(1, "keep", |r: &mut Round| r.log.push("keep".into()));
    let drop = r.queue.schedule(1, "drop", |r: &mut Round| r.log.push("drop".into()));

    assert!(r.queue.cancel(drop));
    assert_eq!(r.queue.due_tick(keep), Some(1));
    assert_eq!(r.queue.due_tick(drop), None);

    run_due(&mut r, 1);
    assert_eq!(r.log, vec!["keep"]);
    assert!(!r.queue.cancel(keep));
}
