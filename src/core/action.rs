//! # Actions
//!
//! Everything that can happen to the navigation tree becomes an `Action`.
//! User taps a list row? That's `Action::Push`. Hardware back button? That's
//! `Action::Pop`.
//!
//! `Reducer::reduce()` takes the current tree and an action, then returns the
//! next tree. No side effects here. I/O happens elsewhere.
//!
//! ```text
//! Route + Action  →  reduce()  →  Route
//! ```
//!
//! Hosts that speak JSON send an `ActionMessage` instead, which is converted
//! with `Action::try_from` and rejected if a required field is missing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::core::error::NavError;
use crate::core::scene::Props;

/// Computes a refreshed value from the target's prior value and its props.
pub type Derivation = Arc<dyn Fn(&Value, &Props) -> Value + Send + Sync>;

/// Named derivation callbacks carried by a refresh.
#[derive(Clone, Default)]
pub struct Derivations(Vec<(String, Derivation)>);

impl Derivations {
    pub fn push(&mut self, field: impl Into<String>, derive: Derivation) {
        self.0.push((field.into(), derive));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluates every callback whose field is already set on `target`.
    pub fn evaluate(&self, target: &Props) -> Props {
        let mut evaluated = Props::new();
        for (field, derive) in &self.0 {
            if let Some(prior) = target.get(field) {
                evaluated.insert(field.clone(), derive(prior, target));
            }
        }
        evaluated
    }
}

impl fmt::Debug for Derivations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|(field, _)| field))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Push,
    Pop,
    PopTo,
    Jump,
    Replace,
    Reset,
    Refresh,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Push => "PUSH",
            ActionKind::Pop => "POP",
            ActionKind::PopTo => "POP_TO",
            ActionKind::Jump => "JUMP",
            ActionKind::Replace => "REPLACE",
            ActionKind::Reset => "RESET",
            ActionKind::Refresh => "REFRESH",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    /// Push scene `key` onto its parent stack.
    Push {
        key: String,
        parent: Option<String>,
        props: Props,
    },
    /// Pop the focused stack, or the stack holding scene `key`.
    Pop {
        key: Option<String>,
        parent: Option<String>,
    },
    /// Truncate back to the scene named `target`.
    PopTo { target: String },
    /// Select tab `key` in its tab group.
    Jump { key: String, parent: Option<String> },
    /// Swap the top of the parent stack for scene `key`.
    Replace {
        key: String,
        parent: Option<String>,
        props: Props,
    },
    /// Make scene `key` the only route of its parent.
    Reset {
        key: String,
        parent: Option<String>,
        props: Props,
    },
    /// Merge `props` into node `key` (or the focused leaf) without changing shape.
    Refresh {
        key: Option<String>,
        props: Props,
        derive: Derivations,
    },
}

impl Action {
    pub fn push(key: impl Into<String>) -> Self {
        Action::Push {
            key: key.into(),
            parent: None,
            props: Props::new(),
        }
    }

    pub fn pop() -> Self {
        Action::Pop {
            key: None,
            parent: None,
        }
    }

    pub fn pop_to(target: impl Into<String>) -> Self {
        Action::PopTo {
            target: target.into(),
        }
    }

    pub fn jump(key: impl Into<String>) -> Self {
        Action::Jump {
            key: key.into(),
            parent: None,
        }
    }

    pub fn replace(key: impl Into<String>) -> Self {
        Action::Replace {
            key: key.into(),
            parent: None,
            props: Props::new(),
        }
    }

    pub fn reset(key: impl Into<String>) -> Self {
        Action::Reset {
            key: key.into(),
            parent: None,
            props: Props::new(),
        }
    }

    /// Refresh the focused leaf.
    pub fn refresh() -> Self {
        Action::Refresh {
            key: None,
            props: Props::new(),
            derive: Derivations::default(),
        }
    }

    /// Refresh the node with this node key or scene key.
    pub fn refresh_key(key: impl Into<String>) -> Self {
        Action::Refresh {
            key: Some(key.into()),
            props: Props::new(),
            derive: Derivations::default(),
        }
    }

    /// Sets the target key on a pop (pop from the stack holding that scene).
    pub fn with_key(mut self, new_key: impl Into<String>) -> Self {
        match &mut self {
            Action::Pop { key, .. } | Action::Refresh { key, .. } => *key = Some(new_key.into()),
            Action::Push { key, .. }
            | Action::Jump { key, .. }
            | Action::Replace { key, .. }
            | Action::Reset { key, .. } => *key = new_key.into(),
            Action::PopTo { target } => *target = new_key.into(),
        }
        self
    }

    /// Overrides the container the action lands in. Ignored by pop-to and refresh.
    pub fn with_parent(mut self, new_parent: impl Into<String>) -> Self {
        match &mut self {
            Action::Push { parent, .. }
            | Action::Pop { parent, .. }
            | Action::Jump { parent, .. }
            | Action::Replace { parent, .. }
            | Action::Reset { parent, .. } => *parent = Some(new_parent.into()),
            Action::PopTo { .. } | Action::Refresh { .. } => {}
        }
        self
    }

    /// Adds a property override. Ignored by actions that carry no props.
    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Some(props) = self.props_mut() {
            props.insert(name.into(), value.into());
        }
        self
    }

    /// Adds a derivation callback to a refresh.
    pub fn with_derived<F>(mut self, field: impl Into<String>, derive: F) -> Self
    where
        F: Fn(&Value, &Props) -> Value + Send + Sync + 'static,
    {
        if let Action::Refresh { derive: derivations, .. } = &mut self {
            derivations.push(field, Arc::new(derive));
        }
        self
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Push { .. } => ActionKind::Push,
            Action::Pop { .. } => ActionKind::Pop,
            Action::PopTo { .. } => ActionKind::PopTo,
            Action::Jump { .. } => ActionKind::Jump,
            Action::Replace { .. } => ActionKind::Replace,
            Action::Reset { .. } => ActionKind::Reset,
            Action::Refresh { .. } => ActionKind::Refresh,
        }
    }

    /// The scene key the action names, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Action::Push { key, .. }
            | Action::Jump { key, .. }
            | Action::Replace { key, .. }
            | Action::Reset { key, .. } => Some(key),
            Action::Pop { key, .. } | Action::Refresh { key, .. } => key.as_deref(),
            Action::PopTo { target } => Some(target),
        }
    }

    pub fn props(&self) -> Option<&Props> {
        match self {
            Action::Push { props, .. }
            | Action::Replace { props, .. }
            | Action::Reset { props, .. }
            | Action::Refresh { props, .. } => Some(props),
            Action::Pop { .. } | Action::PopTo { .. } | Action::Jump { .. } => None,
        }
    }

    fn props_mut(&mut self) -> Option<&mut Props> {
        match self {
            Action::Push { props, .. }
            | Action::Replace { props, .. }
            | Action::Reset { props, .. }
            | Action::Refresh { props, .. } => Some(props),
            Action::Pop { .. } | Action::PopTo { .. } | Action::Jump { .. } => None,
        }
    }
}

// ============================================================================
// Wire Format
// ============================================================================

/// JSON shape of an action:
/// `{ "type": "PUSH", "key": "detail", "parent": "home", "title": "..." }`.
///
/// Unknown fields become property overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMessage {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Pop-to target scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Computed by the reducer; accepted on input and ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_index: Option<usize>,
    #[serde(flatten)]
    pub props: Props,
}

fn required_key(kind: ActionKind, key: Option<String>) -> Result<String, NavError> {
    key.ok_or_else(|| NavError::Assertion(format!("{kind} action requires a key")))
}

impl TryFrom<ActionMessage> for Action {
    type Error = NavError;

    fn try_from(msg: ActionMessage) -> Result<Self, Self::Error> {
        let ActionMessage {
            kind,
            key,
            parent,
            data,
            props,
            ..
        } = msg;

        Ok(match kind {
            ActionKind::Push => Action::Push {
                key: required_key(kind, key)?,
                parent,
                props,
            },
            ActionKind::Replace => Action::Replace {
                key: required_key(kind, key)?,
                parent,
                props,
            },
            ActionKind::Reset => Action::Reset {
                key: required_key(kind, key)?,
                parent,
                props,
            },
            ActionKind::Jump => Action::Jump {
                key: required_key(kind, key)?,
                parent,
            },
            ActionKind::Pop => Action::Pop { key, parent },
            ActionKind::PopTo => match data {
                Some(Value::String(target)) if !target.is_empty() => Action::PopTo { target },
                _ => {
                    return Err(NavError::Assertion(
                        "PopTo() must be called with scene name".to_string(),
                    ));
                }
            },
            ActionKind::Refresh => Action::Refresh {
                key,
                props,
                derive: Derivations::default(),
            },
        })
    }
}
