use navtree::core::dispatch::{self, Dispatcher};
use navtree::core::state::{self, Route};
use navtree::core::{Action, ActionMessage, NavError, Props, Reducer, SceneRegistry, SceneSpec};
use serde_json::json;
use std::sync::Arc;

// ============================================================================
// Helper Functions
// ============================================================================

/// Tab bar with a home stack and a profile stack, plus a three-tab settings
/// group nested under profile.
fn app_registry() -> Arc<SceneRegistry> {
    let spec = SceneSpec::new("root")
        .tabs()
        .child(
            SceneSpec::new("home")
                .child(SceneSpec::new("feed"))
                .child(SceneSpec::new("detail"))
                .child(SceneSpec::new("comments"))
                .child(SceneSpec::new("author")),
        )
        .child(
            SceneSpec::new("profile")
                .child(SceneSpec::new("me"))
                .child(
                    SceneSpec::new("settings")
                        .tabs()
                        .child(SceneSpec::new("account"))
                        .child(SceneSpec::new("privacy"))
                        .child(SceneSpec::new("about")),
                ),
        );
    Arc::new(SceneRegistry::build(spec, Props::new()).unwrap())
}

fn keys(node: &Route) -> Vec<&str> {
    node.routes().iter().map(|r| r.scene_key.as_str()).collect()
}

/// Parses each JSON line into an action and reduces it in order.
fn replay(reducer: &Reducer, lines: &[&str]) -> Result<Route, NavError> {
    let mut state = reducer.initial().clone();
    for line in lines {
        let msg: ActionMessage = serde_json::from_str(line).unwrap();
        state = reducer.reduce(Some(&state), &Action::try_from(msg)?)?;
    }
    Ok(state)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_push_pop_jump_scenario() {
    let reducer = Reducer::new(app_registry()).unwrap();
    let start = reducer.initial().clone();
    assert_eq!(start.index, 0);

    let pushed = reducer
        .reduce(Some(&start), &Action::push("detail").with_parent("home"))
        .unwrap();
    assert_eq!(keys(&pushed.routes()[0]), vec!["feed", "detail"]);
    assert_eq!(pushed.routes()[0].index, 1);
    assert_eq!(pushed.index, 0);

    let popped = reducer.reduce(Some(&pushed), &Action::pop()).unwrap();
    assert_eq!(keys(&popped.routes()[0]), vec!["feed"]);
    assert_eq!(popped.routes()[0].index, 0);

    let jumped = reducer.reduce(Some(&popped), &Action::jump("profile")).unwrap();
    assert_eq!(jumped.index, 1);
    assert_eq!(keys(&jumped), keys(&popped));
}

#[test]
fn test_noops_return_same_tree() {
    let reducer = Reducer::new(app_registry()).unwrap();
    let state = reducer.reduce(None, &Action::push("detail")).unwrap();

    for action in [Action::push("detail"), Action::replace("detail")] {
        let next = reducer.reduce(Some(&state), &action).unwrap();
        assert!(Arc::ptr_eq(&state, &next), "{} changed the tree", action.kind());
    }

    let initial = reducer.initial().clone();
    let next = reducer
        .reduce(Some(&initial), &Action::pop().with_key("feed"))
        .unwrap();
    assert!(Arc::ptr_eq(&initial, &next));

    let reset = reducer.reduce(Some(&state), &Action::reset("feed")).unwrap();
    let again = reducer.reduce(Some(&reset), &Action::reset("feed")).unwrap();
    assert!(Arc::ptr_eq(&reset, &again));
}

#[test]
fn test_push_then_pop_is_inverse() {
    let reducer = Reducer::new(app_registry()).unwrap();
    let state = reducer.reduce(None, &Action::push("detail")).unwrap();
    let before = &state.routes()[0];

    let pushed = reducer.reduce(Some(&state), &Action::push("comments")).unwrap();
    let popped = reducer.reduce(Some(&pushed), &Action::pop()).unwrap();
    let after = &popped.routes()[0];

    assert_eq!(after.routes().len(), before.routes().len());
    assert_eq!(after.index, before.index);
    assert_eq!(after.from.as_ref().unwrap().scene_key, "comments");
}

#[test]
fn test_pop_to_truncates() {
    let reducer = Reducer::new(app_registry()).unwrap();
    let mut state = reducer.initial().clone();
    for key in ["detail", "comments", "author"] {
        state = reducer.reduce(Some(&state), &Action::push(key)).unwrap();
    }

    for (target, index) in [("author", 3), ("comments", 2), ("detail", 1), ("feed", 0)] {
        let next = reducer.reduce(Some(&state), &Action::pop_to(target)).unwrap();
        let home = &next.routes()[0];
        assert_eq!(home.routes().len(), index + 1, "pop to {target}");
        assert_eq!(home.index, index);
        state::validate(&next).unwrap();
    }
}

#[test]
fn test_jump_only_moves_focus() {
    let reducer = Reducer::new(app_registry()).unwrap();
    let state = reducer.reduce(None, &Action::push("settings")).unwrap();
    let settings = state::find_element(&state, "settings", state::Lookup::SceneKey).unwrap();
    assert_eq!(keys(settings), vec!["account", "privacy", "about"]);
    assert_eq!(settings.index, 0);

    let next = reducer.reduce(Some(&state), &Action::jump("privacy")).unwrap();
    let after = state::find_element(&next, "settings", state::Lookup::SceneKey).unwrap();
    assert_eq!(after.index, 1);
    assert_eq!(after.routes().len(), 3);
    for (a, b) in after.routes().iter().zip(settings.routes()) {
        assert!(Arc::ptr_eq(a, b));
    }
    assert_eq!(state::current(&next).scene_key, "privacy");
}

#[test]
fn test_sibling_branches_keep_identity() {
    let reducer = Reducer::new(app_registry()).unwrap();
    let state = reducer.initial().clone();
    let next = reducer
        .reduce(Some(&state), &Action::push("settings").with_parent("profile"))
        .unwrap();

    assert!(Arc::ptr_eq(&next.routes()[0], &state.routes()[0]));
    assert!(!Arc::ptr_eq(&next.routes()[1], &state.routes()[1]));
    assert!(Arc::ptr_eq(
        &next.routes()[1].routes()[0],
        &state.routes()[1].routes()[0]
    ));
}

#[test]
fn test_pop_walks_past_tab_group() {
    let reducer = Reducer::new(app_registry()).unwrap();
    let state = reducer.reduce(None, &Action::jump("profile")).unwrap();
    let state = reducer.reduce(Some(&state), &Action::push("settings")).unwrap();
    assert_eq!(state::current(&state).scene_key, "account");

    // account -> settings (tabs) -> profile [me, settings]
    let popped = reducer.reduce(Some(&state), &Action::pop()).unwrap();
    assert_eq!(keys(&popped.routes()[1]), vec!["me"]);
    assert_eq!(state::current(&popped).scene_key, "me");
}

#[test]
fn test_invariants_hold_through_mixed_sequence() {
    let registry = app_registry();
    let reducer = Reducer::new(registry.clone()).unwrap();
    let actions = [
        Action::push("detail"),
        Action::jump("profile"),
        Action::push("settings"),
        Action::push("me"),
        Action::push("settings"),
        Action::jump("about"),
        Action::refresh().with_prop("seen", true),
        Action::pop(),
        Action::jump("home"),
        Action::replace("comments"),
        Action::pop_to("feed"),
        Action::reset("author"),
    ];

    let mut state = reducer.initial().clone();
    for action in &actions {
        state = reducer.reduce(Some(&state), action).unwrap();
        state::validate_with(&state, &registry)
            .unwrap_or_else(|e| panic!("{} broke the tree: {e}", action.kind()));
    }
    assert_eq!(keys(&state.routes()[0]), vec!["author"]);
    assert_eq!(keys(&state.routes()[1]), vec!["me", "settings", "me"]);
}

#[test]
fn test_tab_groups_keep_their_tabs() {
    let reducer = Reducer::new(app_registry()).unwrap();
    let state = reducer.reduce(None, &Action::push("settings")).unwrap();
    for target in ["root", "about"] {
        assert!(matches!(
            reducer.reduce(Some(&state), &Action::pop_to(target)),
            Err(NavError::Assertion(msg)) if msg.contains("tab bar")
        ));
    }
}

#[test]
fn test_replay_action_messages() {
    let reducer = Reducer::new(app_registry()).unwrap();
    let state = replay(
        &reducer,
        &[
            r#"{"type":"PUSH","key":"detail","parent":"home","id":7}"#,
            r#"{"type":"PUSH","key":"comments"}"#,
            r#"{"type":"POP_TO","data":"detail"}"#,
            r#"{"type":"REFRESH","title":"Item 7"}"#,
            r#"{"type":"JUMP","key":"profile"}"#,
        ],
    )
    .unwrap();

    assert_eq!(state.index, 1);
    let detail = &state.routes()[0].routes()[1];
    assert_eq!(detail.prop("id"), Some(&json!(7)));
    assert_eq!(detail.prop("title"), Some(&json!("Item 7")));
    assert_eq!(keys(&state.routes()[0]), vec!["feed", "detail"]);
}

#[test]
fn test_replay_rejects_pop_to_without_target() {
    let reducer = Reducer::new(app_registry()).unwrap();
    let err = replay(&reducer, &[r#"{"type":"POP_TO"}"#]).unwrap_err();
    assert!(matches!(err, NavError::Assertion(msg) if msg.contains("scene name")));
}

// ============================================================================
// Dispatcher Tests
// ============================================================================

#[tokio::test]
async fn test_dispatcher_publishes_changes() {
    let reducer = Reducer::new(app_registry()).unwrap();
    let (handle, task) = dispatch::spawn(Dispatcher::new(reducer));
    let mut updates = handle.subscribe();

    assert_eq!(handle.dispatch(Action::push("detail")).await, Ok(true));
    updates.changed().await.unwrap();
    assert_eq!(keys(&updates.borrow_and_update().routes()[0]), vec!["feed", "detail"]);

    assert_eq!(handle.dispatch(Action::push("detail")).await, Ok(false));
    assert!(!updates.has_changed().unwrap());

    assert_eq!(handle.back().await, Ok(true));
    drop(handle);
    let dispatcher = task.await.unwrap();
    assert_eq!(keys(&dispatcher.state().routes()[0]), vec!["feed"]);
}

#[test]
fn test_dispatcher_reports_closed_channel() {
    tokio_test::block_on(async {
        let reducer = Reducer::new(app_registry()).unwrap();
        let (handle, task) = dispatch::spawn(Dispatcher::new(reducer));
        task.abort();
        let _ = task.await;
        assert_eq!(
            handle.dispatch(Action::push("detail")).await,
            Err(NavError::DispatcherClosed)
        );
    });
}
