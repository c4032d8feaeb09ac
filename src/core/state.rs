//! # Navigation State
//!
//! The route tree threaded through every reduction. Nodes are immutable and
//! shared through `Arc`, so an unchanged subtree keeps its pointer across
//! transitions and renderers can skip it with `Arc::ptr_eq`.
//!
//! ```text
//! RouteNode (root, tabs)                     index: 0
//! ├── RouteNode (home, stack)                index: 1   <- focused
//! │   ├── RouteNode (feed, leaf)
//! │   └── RouteNode (detail, leaf)                      <- focused leaf
//! └── RouteNode (profile, stack)             index: 0
//!     └── RouteNode (me, leaf)
//! ```
//!
//! State changes only happen through `Reducer::reduce` in reducer.rs. This
//! module builds the initial tree and answers read-only queries about it.

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::core::error::{NavError, ensure};
use crate::core::scene::{Props, Scene, SceneRegistry};

pub type Route = Arc<RouteNode>;

fn is_false(value: &bool) -> bool {
    !*value
}

/// One materialized scene instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNode {
    /// Unique within the whole tree.
    pub key: String,
    pub scene_key: String,
    /// Scene key of the enclosing container. `None` at the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub tabs: bool,
    /// `None` for leaves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Route>>,
    #[serde(default)]
    pub index: usize,
    /// The route most recently popped off this stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Route>,
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub props: Props,
}

impl RouteNode {
    pub fn is_leaf(&self) -> bool {
        self.routes.is_none()
    }

    pub fn is_stack(&self) -> bool {
        self.routes.is_some() && !self.tabs
    }

    /// Children in order; empty for leaves.
    pub fn routes(&self) -> &[Route] {
        self.routes.as_deref().unwrap_or(&[])
    }

    /// The focused child, if this is a container.
    pub fn active(&self) -> Option<&Route> {
        self.routes.as_ref().and_then(|routes| routes.get(self.index))
    }

    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }
}

// ============================================================================
// Initial State Builder
// ============================================================================

/// Where a freshly materialized node will sit in the tree.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Placement<'a> {
    /// Scene key of the enclosing container.
    pub parent: Option<&'a str>,
    /// Node key of the enclosing container.
    pub parent_key: Option<&'a str>,
    pub position: usize,
}

/// `"{position}_{scene_key}"` at the root, prefixed with the parent's key below it.
pub fn node_key(parent_key: Option<&str>, position: usize, scene_key: &str) -> String {
    match parent_key {
        Some(parent) => format!("{parent}/{position}_{scene_key}"),
        None => format!("{position}_{scene_key}"),
    }
}

/// Builds the initial route tree from the registry's root scene.
pub fn build_initial(registry: &SceneRegistry) -> Result<Route, NavError> {
    let root = registry.root()?;
    let mut state = materialize(registry, root, Placement::default(), &Props::new())?;

    if !registry.root_props().is_empty() {
        let node = Arc::make_mut(&mut state);
        let mut props = registry.root_props().clone();
        props.extend(std::mem::take(&mut node.props));
        node.props = props;
    }

    info!("Initial state built: root={}", state.key);
    Ok(state)
}

/// Materializes `scene` and its declared children.
///
/// Tab groups get every child; stacks get only their initial child. The
/// initial child is the last one flagged `initial`, or the first.
/// `overrides` apply to every node in the materialized subtree.
pub(crate) fn materialize(
    registry: &SceneRegistry,
    scene: &Scene,
    at: Placement<'_>,
    overrides: &Props,
) -> Result<Route, NavError> {
    let key = node_key(at.parent_key, at.position, &scene.scene_key);
    let mut props = scene.props.clone();
    props.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

    if !scene.is_container() {
        return Ok(Arc::new(RouteNode {
            key,
            scene_key: scene.scene_key.clone(),
            parent: at.parent.map(str::to_string),
            tabs: scene.tabs,
            routes: None,
            index: 0,
            from: None,
            props,
        }));
    }

    let children = scene
        .children
        .iter()
        .map(|child| {
            registry.get(child).ok_or_else(|| {
                NavError::Configuration(format!("Empty scene {child} for key={}", scene.key))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let initial = children.iter().rposition(|c| c.initial).unwrap_or(0);

    let place = |position| Placement {
        parent: Some(scene.scene_key.as_str()),
        parent_key: Some(key.as_str()),
        position,
    };
    let (routes, index) = if scene.tabs {
        let routes = children
            .iter()
            .enumerate()
            .map(|(i, child)| materialize(registry, child, place(i), overrides))
            .collect::<Result<Vec<_>, _>>()?;
        (routes, initial)
    } else {
        (
            vec![materialize(registry, children[initial], place(0), overrides)?],
            0,
        )
    };

    Ok(Arc::new(RouteNode {
        key,
        scene_key: scene.scene_key.clone(),
        parent: at.parent.map(str::to_string),
        tabs: scene.tabs,
        routes: Some(routes),
        index,
        from: None,
        props,
    }))
}

// ============================================================================
// Queries
// ============================================================================

/// How `find_element` matches nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    SceneKey,
    /// Node key or scene key (used by refresh).
    NodeOrSceneKey,
}

/// Depth-first, pre-order search for the first node matching `key`.
pub fn find_element<'a>(state: &'a Route, key: &str, lookup: Lookup) -> Option<&'a Route> {
    if (lookup == Lookup::NodeOrSceneKey && state.key == key) || state.scene_key == key {
        return Some(state);
    }
    state
        .routes()
        .iter()
        .find_map(|child| find_element(child, key, lookup))
}

/// The deepest focused node, following `index` at every container.
pub fn current(state: &Route) -> &Route {
    let mut node = state;
    while let Some(next) = node.active() {
        node = next;
    }
    node
}

/// Root-to-leaf focused path.
pub fn focused_path(state: &Route) -> Vec<&Route> {
    let mut path = vec![state];
    let mut node = state;
    while let Some(next) = node.active() {
        path.push(next);
        node = next;
    }
    path
}

/// Root-to-node path to the node with the given node key.
pub fn path_to<'a>(state: &'a Route, node_key: &str) -> Option<Vec<&'a Route>> {
    if state.key == node_key {
        return Some(vec![state]);
    }
    state.routes().iter().find_map(|child| {
        path_to(child, node_key).map(|mut path| {
            path.insert(0, state);
            path
        })
    })
}

/// Property lookup for headers and bars: the queried node first, then each
/// ancestor up to the root. Returns the first explicitly set value.
pub fn inherited_prop<'a>(state: &'a Route, node_key: &str, name: &str) -> Option<&'a Value> {
    path_to(state, node_key)?
        .into_iter()
        .rev()
        .find_map(|node| node.prop(name))
}

/// Checks the structural invariants of a tree (bounds, unique keys, stack focus).
pub fn validate(state: &Route) -> Result<(), NavError> {
    let mut keys = HashSet::new();
    validate_node(state, &mut keys)
}

fn validate_node<'a>(node: &'a RouteNode, keys: &mut HashSet<&'a str>) -> Result<(), NavError> {
    ensure!(keys.insert(node.key.as_str()), "Duplicate node key={}", node.key);
    let Some(routes) = &node.routes else {
        return Ok(());
    };
    ensure!(!routes.is_empty(), "Container key={} has no routes", node.key);
    ensure!(
        node.index < routes.len(),
        "Container key={} has index={} but {} routes",
        node.key,
        node.index,
        routes.len()
    );
    if !node.tabs {
        ensure!(
            node.index == routes.len() - 1,
            "Stack key={} is focused on index={} instead of its top",
            node.key,
            node.index
        );
    }
    for child in routes {
        ensure!(
            child.parent.as_deref() == Some(node.scene_key.as_str()),
            "Node key={} does not point back to parent={}",
            child.key,
            node.scene_key
        );
        validate_node(child, keys)?;
    }
    Ok(())
}

/// `validate` plus the checks that need the registry: every tab group still
/// holds exactly its declared tabs, in declaration order.
pub fn validate_with(state: &Route, registry: &SceneRegistry) -> Result<(), NavError> {
    validate(state)?;
    validate_tabs(state, registry)
}

fn validate_tabs(node: &RouteNode, registry: &SceneRegistry) -> Result<(), NavError> {
    if node.tabs {
        if let Some(scene) = registry.get(&node.scene_key) {
            let declared: Vec<&str> = scene
                .children
                .iter()
                .map(|child| registry.scene_key_for(child))
                .collect();
            let mounted: Vec<&str> = node.routes().iter().map(|r| r.scene_key.as_str()).collect();
            ensure!(
                declared == mounted,
                "Tab group key={} holds {:?} instead of its declared tabs {:?}",
                node.key,
                mounted,
                declared
            );
        }
    }
    for child in node.routes() {
        validate_tabs(child, registry)?;
    }
    Ok(())
}

/// Indented text view of the tree; `*` marks the focused path.
pub fn outline(state: &Route) -> String {
    let mut out = String::new();
    outline_node(state, 0, true, &mut out);
    out
}

fn outline_node(node: &RouteNode, depth: usize, focused: bool, out: &mut String) {
    let marker = if focused { '*' } else { '-' };
    let kind = match (&node.routes, node.tabs) {
        (None, _) => "",
        (Some(_), true) => " [tabs]",
        (Some(_), false) => " [stack]",
    };
    let _ = writeln!(
        out,
        "{:indent$}{marker} {} ({}){kind}",
        "",
        node.scene_key,
        node.key,
        indent = depth * 2
    );
    for (i, child) in node.routes().iter().enumerate() {
        outline_node(child, depth + 1, focused && i == node.index, out);
    }
}
