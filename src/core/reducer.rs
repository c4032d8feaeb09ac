//! # Reducer
//!
//! The pure transition `(Route, Action, SceneRegistry) -> Route`.
//!
//! A reduction runs in two passes:
//!
//! ```text
//! Action ──normalize──▶ Resolved { transition, target, scene, props }
//!                                   │
//! Route  ──────────inject──────────▶ Route'
//! ```
//!
//! `normalize` works out *where* the action lands (clone parents, pop
//! walk-up, pop-to index, refresh aliases) and pins it to one node key,
//! preferring the focused path when a scene is mounted more than once.
//! `inject` walks down to that node, applies the transition and rebuilds only
//! the nodes on the path back to the root. Everything else keeps its `Arc`, and a no-op
//! returns the very same root.

use log::debug;
use std::sync::Arc;

use crate::core::action::{Action, Derivations};
use crate::core::error::{NavError, ensure};
use crate::core::scene::{Props, Scene, SceneRegistry};
use crate::core::state::{
    Placement, Route, RouteNode, build_initial, current, focused_path, materialize, path_to,
};

/// Builds a reducer from an initial tree and a registry.
///
/// Fails with `NavError::Configuration` if either is missing or the initial
/// tree has no key.
pub fn create_reducer(
    initial_state: Option<Route>,
    registry: Option<Arc<SceneRegistry>>,
) -> Result<Reducer, NavError> {
    let initial = initial_state
        .ok_or_else(|| NavError::Configuration("initialState should not be null".to_string()))?;
    if initial.key.is_empty() {
        return Err(NavError::Configuration(
            "initialState.key should not be null".to_string(),
        ));
    }
    let registry =
        registry.ok_or_else(|| NavError::Configuration("scenes should not be null".to_string()))?;
    Ok(Reducer { initial, registry })
}

#[derive(Debug, Clone)]
pub struct Reducer {
    initial: Route,
    registry: Arc<SceneRegistry>,
}

impl Reducer {
    /// Reducer starting from the registry's built initial state.
    pub fn new(registry: Arc<SceneRegistry>) -> Result<Self, NavError> {
        let initial = build_initial(&registry)?;
        create_reducer(Some(initial), Some(registry))
    }

    pub fn initial(&self) -> &Route {
        &self.initial
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    /// Applies `action` to `state` (or to the initial state when `None`).
    ///
    /// Returns the same `Arc` when nothing changed. On error the input is
    /// untouched.
    pub fn reduce(&self, state: Option<&Route>, action: &Action) -> Result<Route, NavError> {
        let state = state.unwrap_or(&self.initial);
        let resolved = normalize(state, action, &self.registry)?;
        debug!("{} normalized: {:?}", action.kind(), resolved);

        let mut injector = Injector {
            resolved: &resolved,
            registry: self.registry.as_ref(),
            matched: 0,
        };
        let next = injector.inject(state)?;
        if injector.matched == 0 {
            return Err(NavError::NotFound(format!(
                "No mounted node matches {} for {} action",
                resolved.target,
                action.kind()
            )));
        }

        if Arc::ptr_eq(&next, state) {
            debug!("{} left the state unchanged", action.kind());
        }
        Ok(next)
    }
}

// ============================================================================
// Normalization
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Push,
    Pop,
    PopTo(usize),
    Jump,
    Replace,
    Reset,
    /// `base` is set when the refresh went through a `base` alias.
    Refresh { base: bool },
}

#[derive(Debug)]
struct Resolved<'a> {
    transition: Transition,
    /// Node key of the one node the transition applies to.
    target: String,
    /// Every tab group above the target already shows it, so a transition
    /// that leaves the target untouched changes nothing visible.
    settled: bool,
    /// Scene the action names; materialized by push/replace/reset.
    scene: Option<&'a Scene>,
    /// Overrides for new nodes, or the fully merged props for refresh.
    props: Props,
}

impl Resolved<'_> {
    fn at(transition: Transition, state: &Route, node: &Route) -> Self {
        Self {
            transition,
            target: node.key.clone(),
            settled: settled(state, node),
            scene: None,
            props: Props::new(),
        }
    }

    fn scene_key(&self) -> &str {
        self.scene.map(|s| s.scene_key.as_str()).unwrap_or_default()
    }

    fn scene(&self) -> Result<&Scene, NavError> {
        self.scene
            .ok_or_else(|| NavError::Assertion("Transition needs a scene to build".to_string()))
    }
}

/// The node an action lands on: the deepest match on the focused path,
/// otherwise the first match in pre-order.
fn locate<'s>(state: &'s Route, matches: impl Fn(&RouteNode) -> bool) -> Option<&'s Route> {
    focused_path(state)
        .into_iter()
        .rev()
        .find(|node| matches(node))
        .or_else(|| find_node(state, &matches))
}

fn find_node<'s>(node: &'s Route, matches: &impl Fn(&RouteNode) -> bool) -> Option<&'s Route> {
    if matches(node) {
        return Some(node);
    }
    node.routes()
        .iter()
        .find_map(|child| find_node(child, matches))
}

/// True if no tab group between the root and `node` points elsewhere.
fn settled(state: &Route, node: &Route) -> bool {
    path_to(state, &node.key).is_some_and(|path| {
        path.windows(2).all(|pair| {
            !pair[0].tabs || pair[0].active().is_some_and(|a| Arc::ptr_eq(a, pair[1]))
        })
    })
}

fn normalize<'a>(
    state: &Route,
    action: &Action,
    registry: &'a SceneRegistry,
) -> Result<Resolved<'a>, NavError> {
    let no_props = Props::new();
    match action {
        Action::Push { key, parent, props } => {
            resolve_scene(Transition::Push, state, key, parent.as_deref(), props, registry)
        }
        Action::Replace { key, parent, props } => {
            resolve_scene(Transition::Replace, state, key, parent.as_deref(), props, registry)
        }
        Action::Reset { key, parent, props } => {
            resolve_scene(Transition::Reset, state, key, parent.as_deref(), props, registry)
        }
        Action::Jump { key, parent } => {
            resolve_scene(Transition::Jump, state, key, parent.as_deref(), &no_props, registry)
        }
        Action::Pop {
            key: Some(key),
            parent,
        } => resolve_scene(Transition::Pop, state, key, parent.as_deref(), &no_props, registry),
        Action::Pop { key: None, parent } => resolve_pop(state, parent.as_deref(), registry),
        Action::PopTo { target } => resolve_pop_to(state, target),
        Action::Refresh { key, props, derive } => {
            resolve_refresh(state, key.as_deref(), props, derive, registry)
        }
    }
}

/// Keyed, non-refresh actions land on one container: the scene's declared
/// parent, an explicit parent, or (for clones) the parent of the focused leaf.
/// Aliases of the parent scene count as the parent.
fn resolve_scene<'a>(
    transition: Transition,
    state: &Route,
    key: &str,
    parent: Option<&str>,
    props: &Props,
    registry: &'a SceneRegistry,
) -> Result<Resolved<'a>, NavError> {
    let scene = registry.resolve(key)?;
    let parent = if scene.clone {
        current(state).parent.clone()
    } else {
        parent
            .or(scene.parent.as_deref())
            .map(|p| registry.scene_key_for(p).to_string())
    };
    let parent =
        parent.ok_or_else(|| NavError::Assertion(format!("No parent is defined for route={key}")))?;

    let node = locate(state, |node| registry.is_instance_of(&node.scene_key, &parent))
        .ok_or_else(|| {
            NavError::NotFound(format!("No mounted node matches parent={parent} for route={key}"))
        })?;

    Ok(Resolved {
        scene: Some(scene),
        props: props.clone(),
        ..Resolved::at(transition, state, node)
    })
}

fn poppable(node: &RouteNode) -> bool {
    node.is_stack() && node.routes().len() > 1
}

/// Keyless pop: start at the focused leaf's parent (or the named parent) and
/// climb past tab groups and single-route stacks.
fn resolve_pop<'a>(
    state: &Route,
    parent: Option<&str>,
    registry: &SceneRegistry,
) -> Result<Resolved<'a>, NavError> {
    let path = match parent {
        Some(parent) => {
            let parent = registry.scene_key_for(parent);
            let el = locate(state, |node| node.scene_key == parent).ok_or_else(|| {
                NavError::NotFound(format!(
                    "Cannot find element for parent={parent} within current state"
                ))
            })?;
            path_to(state, &el.key).unwrap_or_default()
        }
        None => {
            let mut path = focused_path(state);
            path.pop();
            path
        }
    };
    let start = path
        .last()
        .map(|node| node.scene_key.clone())
        .ok_or_else(|| NavError::Assertion(format!("Cannot pop: root {} is focused", state.key)))?;

    let el = path.into_iter().rev().find(|node| poppable(node)).ok_or_else(|| {
        NavError::Assertion(format!("No stack with more than one route above parent={start}"))
    })?;
    debug!("Pop walked from {start} up to {}", el.key);

    Ok(Resolved::at(Transition::Pop, state, el))
}

/// A container target truncates itself to its first route; a leaf target
/// truncates its parent back to the leaf.
fn resolve_pop_to<'a>(state: &Route, target: &str) -> Result<Resolved<'a>, NavError> {
    let el = locate(state, |node| node.scene_key == target).ok_or_else(|| {
        NavError::NotFound(format!("Cannot find element named {target} within current state"))
    })?;

    if !el.is_leaf() {
        return Ok(Resolved::at(Transition::PopTo(0), state, el));
    }

    let path = path_to(state, &el.key).unwrap_or_default();
    let parent = path
        .len()
        .checked_sub(2)
        .map(|i| path[i])
        .ok_or_else(|| NavError::NotFound(format!("Cannot find parent for target {target}")))?;
    let index = parent
        .routes()
        .iter()
        .position(|r| Arc::ptr_eq(r, el))
        .ok_or_else(|| {
            NavError::Assertion(format!("{target} does not belong to {}", parent.scene_key))
        })?;

    Ok(Resolved::at(Transition::PopTo(index), state, parent))
}

fn resolve_refresh<'a>(
    state: &Route,
    key: Option<&str>,
    props: &Props,
    derive: &Derivations,
    registry: &'a SceneRegistry,
) -> Result<Resolved<'a>, NavError> {
    let Some(key) = key else {
        let leaf = current(state);
        let mut merged = props.clone();
        merged.extend(derive.evaluate(&leaf.props));
        return Ok(Resolved {
            props: merged,
            ..Resolved::at(Transition::Refresh { base: false }, state, leaf)
        });
    };

    let found = locate(state, |node| node.key == key || node.scene_key == key);
    let (mut child_props, base) = match found {
        Some(node) => (
            node.props.clone(),
            registry
                .get(&node.scene_key)
                .and_then(|scene| scene.base.clone()),
        ),
        None => {
            let scene = registry
                .resolve(key)
                .map_err(|_| NavError::NotFound(format!("missed child data for key={key}")))?;
            (scene.props.clone(), scene.base.clone())
        }
    };

    let mut target = found;
    if let Some(base) = &base {
        let base_scene = registry.resolve(base)?;
        let mut layered = base_scene.props.clone();
        layered.extend(child_props);
        child_props = layered;
        // an unmounted alias refreshes the node of its base
        if target.is_none() {
            target = locate(state, |node| node.scene_key == base_scene.scene_key);
            debug!("Refresh of alias {key} rewritten to base {}", base_scene.scene_key);
        }
    }
    let node = target.ok_or_else(|| {
        NavError::NotFound(format!("No mounted node matches {key} for REFRESH action"))
    })?;

    let evaluated = derive.evaluate(&child_props);
    let mut merged = child_props;
    merged.extend(props.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged.extend(evaluated);

    Ok(Resolved {
        props: merged,
        ..Resolved::at(
            Transition::Refresh {
                base: base.is_some(),
            },
            state,
            node,
        )
    })
}

// ============================================================================
// Injection
// ============================================================================

struct Injector<'r, 'a> {
    resolved: &'r Resolved<'a>,
    registry: &'r SceneRegistry,
    /// Number of nodes the transition was applied to.
    matched: usize,
}

impl Injector<'_, '_> {
    fn inject(&mut self, node: &Route) -> Result<Route, NavError> {
        if self.matched > 0 {
            return Ok(Arc::clone(node));
        }
        if node.key == self.resolved.target {
            self.matched += 1;
            return self.apply(node);
        }

        let Some(routes) = &node.routes else {
            return Ok(Arc::clone(node));
        };
        let mut next = Vec::with_capacity(routes.len());
        let mut changed = None;
        for (i, child) in routes.iter().enumerate() {
            let injected = self.inject(child)?;
            if changed.is_none() && !Arc::ptr_eq(&injected, child) {
                changed = Some(i);
            }
            next.push(injected);
        }

        Ok(match changed {
            // a tab group moves focus to the changed branch; a stack stays on its top
            Some(index) => {
                let index = if node.tabs { index } else { node.index };
                rebuild(node, next, index, node.from.clone())
            }
            None => Arc::clone(node),
        })
    }

    fn apply(&self, node: &Route) -> Result<Route, NavError> {
        let resolved = self.resolved;
        debug!("Applying {:?} at {}", resolved.transition, node.key);

        match resolved.transition {
            Transition::Push => {
                ensure!(
                    node.is_stack(),
                    "Parent={} is not a stack, push action is not valid",
                    node.key
                );
                let routes = node.routes();
                let active = active_child(node)?;
                let scene = resolved.scene()?;
                if active.scene_key == scene.scene_key
                    && !scene.clone
                    && overrides_match(&resolved.props, active)
                {
                    return Ok(Arc::clone(node));
                }
                let child = self.build(scene, node, routes.len())?;
                let mut next = routes.to_vec();
                next.push(child);
                let index = next.len() - 1;
                Ok(rebuild(node, next, index, None))
            }
            Transition::Pop => {
                ensure!(
                    !node.tabs,
                    "pop() operation cannot be run on tab bar (tabs=true)"
                );
                ensure!(
                    !node.is_leaf(),
                    "Parent={} is not a stack, pop action is not valid",
                    node.key
                );
                if node.index == 0 {
                    return Ok(Arc::clone(node));
                }
                let mut next = node.routes().to_vec();
                let dropped = next.pop();
                Ok(rebuild(node, next, node.index - 1, dropped))
            }
            Transition::PopTo(index) => {
                ensure!(
                    !node.tabs,
                    "popTo() cannot truncate tab bar key={} (tabs=true)",
                    node.key
                );
                let routes = node.routes();
                ensure!(
                    index < routes.len(),
                    "Cannot pop to index={index} of {} with {} routes",
                    node.key,
                    routes.len()
                );
                if resolved.settled && routes.len() == index + 1 && node.index == index {
                    return Ok(Arc::clone(node));
                }
                Ok(rebuild(node, routes[..=index].to_vec(), index, node.from.clone()))
            }
            Transition::Jump => {
                ensure!(
                    node.tabs,
                    "Parent={} is not tab bar, jump action is not valid",
                    node.key
                );
                let key = resolved.scene_key();
                let index = node
                    .routes()
                    .iter()
                    .position(|r| r.scene_key == key)
                    .ok_or_else(|| {
                        NavError::Assertion(format!(
                            "Cannot find route with key={key} for parent={}",
                            node.key
                        ))
                    })?;
                if resolved.settled && node.index == index {
                    return Ok(Arc::clone(node));
                }
                Ok(rebuild(node, node.routes().to_vec(), index, node.from.clone()))
            }
            Transition::Replace => {
                let active = active_child(node)?;
                let scene = resolved.scene()?;
                if active.scene_key == scene.scene_key {
                    return Ok(Arc::clone(node));
                }
                let mut next = node.routes().to_vec();
                let last = next.len() - 1;
                next[last] = self.build(scene, node, last)?;
                Ok(rebuild(node, next, node.index, node.from.clone()))
            }
            Transition::Reset => {
                let active = active_child(node)?;
                let scene = resolved.scene()?;
                if active.scene_key == scene.scene_key {
                    return Ok(Arc::clone(node));
                }
                let child = self.build(scene, node, 0)?;
                Ok(rebuild(node, vec![child], 0, None))
            }
            Transition::Refresh { base } => {
                let mut props = if base {
                    self.registry.root_props().clone()
                } else {
                    Props::new()
                };
                props.extend(node.props.iter().map(|(k, v)| (k.clone(), v.clone())));
                props.extend(resolved.props.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(Arc::new(RouteNode {
                    key: node.key.clone(),
                    scene_key: node.scene_key.clone(),
                    parent: node.parent.clone(),
                    tabs: node.tabs,
                    routes: node.routes.clone(),
                    index: node.index,
                    from: None,
                    props,
                }))
            }
        }
    }

    /// Materializes `scene` as a child of `parent` at `position`.
    fn build(&self, scene: &Scene, parent: &RouteNode, position: usize) -> Result<Route, NavError> {
        materialize(
            self.registry,
            scene,
            Placement {
                parent: Some(&parent.scene_key),
                parent_key: Some(&parent.key),
                position,
            },
            &self.resolved.props,
        )
    }
}

fn active_child(node: &RouteNode) -> Result<&Route, NavError> {
    node.active().ok_or_else(|| {
        NavError::Assertion(format!(
            "Parent={} has no focused route at index={}",
            node.key, node.index
        ))
    })
}

/// Push dedup: every explicit override already holds on the focused child.
fn overrides_match(overrides: &Props, node: &RouteNode) -> bool {
    overrides
        .iter()
        .all(|(name, value)| node.props.get(name) == Some(value))
}

fn rebuild(node: &RouteNode, routes: Vec<Route>, index: usize, from: Option<Route>) -> Route {
    Arc::new(RouteNode {
        key: node.key.clone(),
        scene_key: node.scene_key.clone(),
        parent: node.parent.clone(),
        tabs: node.tabs,
        routes: Some(routes),
        index,
        from,
        props: node.props.clone(),
    })
}
