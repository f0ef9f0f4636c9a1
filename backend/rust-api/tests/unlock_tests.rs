use skillpath_api::models::progress::ProgressStatus;
use skillpath_api::services::progress_service::{compute_locked, UnlockRow};

fn row(order: u32, progress: Option<ProgressStatus>, has_quiz: bool, passed: bool) -> UnlockRow {
    UnlockRow {
        order,
        progress,
        has_quiz,
        latest_attempt_passed: passed,
    }
}

#[test]
fn first_chapter_is_always_unlocked() {
    let rows = vec![row(1, None, true, false)];
    assert_eq!(compute_locked(&rows), vec![false]);
}

#[test]
fn next_chapter_stays_locked_until_previous_completed() {
    let rows = vec![
        row(1, Some(ProgressStatus::InProgress), false, false),
        row(2, None, false, false),
    ];
    assert_eq!(compute_locked(&rows), vec![false, true]);

    let rows = vec![
        row(1, Some(ProgressStatus::Completed), false, false),
        row(2, None, false, false),
    ];
    assert_eq!(compute_locked(&rows), vec![false, false]);
}

#[test]
fn quiz_gate_requires_passed_latest_attempt() {
    // Completed chapter with a quiz whose latest attempt failed keeps
    // the next chapter locked.
    let rows = vec![
        row(1, Some(ProgressStatus::Completed), true, false),
        row(2, None, false, false),
    ];
    assert_eq!(compute_locked(&rows), vec![false, true]);

    let rows = vec![
        row(1, Some(ProgressStatus::Completed), true, true),
        row(2, None, false, false),
    ];
    assert_eq!(compute_locked(&rows), vec![false, false]);
}

#[test]
fn unlock_is_chained_not_transitive() {
    // Chapter 3 looks only at chapter 2; an incomplete chapter 2 locks
    // chapter 3 even though chapter 1 is fully cleared.
    let rows = vec![
        row(1, Some(ProgressStatus::Completed), true, true),
        row(2, Some(ProgressStatus::InProgress), false, false),
        row(3, None, true, false),
    ];
    assert_eq!(compute_locked(&rows), vec![false, false, true]);
}

#[test]
fn fully_cleared_sequence_unlocks_everything() {
    let rows = vec![
        row(1, Some(ProgressStatus::Completed), true, true),
        row(2, Some(ProgressStatus::Completed), false, false),
        row(3, Some(ProgressStatus::Completed), true, true),
        row(4, None, false, false),
    ];
    assert_eq!(compute_locked(&rows), vec![false, false, false, false]);
}

#[test]
fn empty_course_yields_empty_locks() {
    assert!(compute_locked(&[]).is_empty());
}
