//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::Arc;

use crate::core::reducer::Reducer;
use crate::core::scene::{Props, SceneRegistry, SceneSpec};
use crate::core::state::RouteNode;

/// Tab bar with two stacks:
///
/// ```text
/// root [tabs]
/// ├── home     feed*, detail, comments, author, post [clone]
/// └── profile  me*, settings, meBadge [base=me]
/// ```
pub fn tab_app_spec() -> SceneSpec {
    SceneSpec::new("root")
        .tabs()
        .child(
            SceneSpec::new("home")
                .prop("title", "Home")
                .prop("nav_color", "teal")
                .child(SceneSpec::new("feed").prop("title", "Feed"))
                .child(SceneSpec::new("detail").prop("title", "Detail"))
                .child(SceneSpec::new("comments"))
                .child(SceneSpec::new("author"))
                .child(SceneSpec::new("post").cloned()),
        )
        .child(
            SceneSpec::new("profile")
                .prop("title", "Profile")
                .child(SceneSpec::new("me").prop("title", "Me").prop("visits", 0))
                .child(SceneSpec::new("settings"))
                .child(SceneSpec::new("meBadge").base("me").prop("title", "Me (badge)")),
        )
}

pub fn tab_app_registry() -> SceneRegistry {
    let mut defaults = Props::new();
    defaults.insert("theme".into(), "light".into());
    SceneRegistry::build(tab_app_spec(), defaults).unwrap()
}

/// Root stack with a tab bar that gets pushed over a welcome screen:
///
/// ```text
/// root
/// ├── welcome*
/// ├── main [tabs]
/// │   ├── inbox    threads*, thread [clone]
/// │   └── archive  archived*
/// └── compose
/// ```
pub fn modal_app_spec() -> SceneSpec {
    SceneSpec::new("root")
        .child(SceneSpec::new("welcome").initial())
        .child(
            SceneSpec::new("main")
                .tabs()
                .child(
                    SceneSpec::new("inbox")
                        .child(SceneSpec::new("threads"))
                        .child(SceneSpec::new("thread").cloned()),
                )
                .child(SceneSpec::new("archive").child(SceneSpec::new("archived"))),
        )
        .child(SceneSpec::new("compose"))
}

pub fn modal_app_registry() -> SceneRegistry {
    SceneRegistry::build(modal_app_spec(), Props::new()).unwrap()
}

/// Tab bar whose profile stack can push a nested tab group, a nested stack
/// and aliases of both:
///
/// ```text
/// root [tabs]
/// ├── home     feed*, detail
/// └── profile  me*, settings [tabs], settingsCopy [base=settings],
///              drawer, drawerCopy [base=drawer]
///     settings [tabs]  account*, privacy
///     drawer           menu*, entry
/// ```
pub fn nested_app_spec() -> SceneSpec {
    SceneSpec::new("root")
        .tabs()
        .child(
            SceneSpec::new("home")
                .child(SceneSpec::new("feed"))
                .child(SceneSpec::new("detail")),
        )
        .child(
            SceneSpec::new("profile")
                .child(SceneSpec::new("me"))
                .child(
                    SceneSpec::new("settings")
                        .tabs()
                        .child(SceneSpec::new("account"))
                        .child(SceneSpec::new("privacy")),
                )
                .child(SceneSpec::new("settingsCopy").base("settings"))
                .child(
                    SceneSpec::new("drawer")
                        .child(SceneSpec::new("menu"))
                        .child(SceneSpec::new("entry")),
                )
                .child(SceneSpec::new("drawerCopy").base("drawer")),
        )
}

pub fn nested_app_registry() -> SceneRegistry {
    SceneRegistry::build(nested_app_spec(), Props::new()).unwrap()
}

pub fn reducer_for(registry: SceneRegistry) -> Reducer {
    Reducer::new(Arc::new(registry)).unwrap()
}

/// Scene keys of a container's routes, in order.
pub fn scene_keys(node: &RouteNode) -> Vec<String> {
    node.routes().iter().map(|r| r.scene_key.clone()).collect()
}
