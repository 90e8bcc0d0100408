use studio_core::{EditHistory, EncodedAsset};

fn asset(tag: &str) -> EncodedAsset {
    EncodedAsset::from_parts("image/png", tag)
}

fn history_after_edits(tags: &[&str]) -> EditHistory {
    let mut history = EditHistory::new(asset("v0"));
    for tag in tags {
        history.record(asset(tag));
    }
    history
}

#[test]
fn record_pushes_previous_and_clears_redo() {
    let mut history = history_after_edits(&["v1", "v2"]);
    assert_eq!(history.displayed(), &asset("v2"));
    assert_eq!(history.undo_stack(), &[asset("v0"), asset("v1")]);

    history.undo();
    assert!(history.can_redo());
    history.record(asset("v3"));
    assert!(!history.can_redo());
    assert_eq!(history.undo_stack(), &[asset("v0"), asset("v1")]);
    assert_eq!(history.displayed(), &asset("v3"));
}

#[test]
fn undo_and_redo_on_empty_stacks_are_noops() {
    let mut history = EditHistory::new(asset("v0"));
    let before = history.clone();
    assert!(history.undo().is_none());
    assert!(history.redo().is_none());
    assert_eq!(history, before);
}

#[test]
fn undo_then_redo_round_trips() {
    for edits in [vec!["v1"], vec!["v1", "v2", "v3"]] {
        let mut history = history_after_edits(&edits);
        let before = history.clone();
        history.undo();
        history.redo();
        assert_eq!(history, before);
    }
}

#[test]
fn undo_walks_back_to_the_original() {
    let mut history = history_after_edits(&["v1", "v2"]);
    assert_eq!(history.undo(), Some(&asset("v1")));
    assert_eq!(history.undo(), Some(&asset("v0")));
    assert_eq!(history.undo(), None);
    assert_eq!(history.redo_stack(), &[asset("v2"), asset("v1")]);
    assert_eq!(history.redo(), Some(&asset("v1")));
    assert_eq!(history.redo(), Some(&asset("v2")));
    assert_eq!(history.redo(), None);
}

#[test]
fn abandoned_edit_restores_undo_but_keeps_redo_cleared() {
    let mut history = history_after_edits(&["v1"]);
    history.undo();
    assert_eq!(history.redo_stack(), &[asset("v1")]);

    history.begin_edit();
    assert_eq!(history.undo_stack(), &[asset("v0")]);
    assert!(!history.can_redo());

    history.abandon_edit();
    assert!(!history.can_undo());
    assert!(!history.can_redo());
    assert_eq!(history.displayed(), &asset("v0"));
}
