//! # Dispatcher
//!
//! Funnels actions into the reducer one at a time and republishes the
//! resulting tree.
//!
//! ```text
//!  host ──Action──▶ mpsc ──▶ Dispatcher task ──reduce()──▶ watch ──Route──▶ renderer
//!                              │
//!                              └──oneshot── Ok(changed) / Err(NavError) ──▶ host
//! ```
//!
//! Each action is reduced to completion before the next one is received, so
//! actions apply in arrival order and a failed action leaves the last
//! published state in place.
//!
//! Hosts can swap in their own reduction (`with_reduce_fn`) and tap the action
//! stream (`observe`) before spawning.

use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::core::action::Action;
use crate::core::error::NavError;
use crate::core::reducer::Reducer;
use crate::core::state::Route;

/// Capacity of the action queue feeding a spawned dispatcher.
pub const ACTION_QUEUE_DEPTH: usize = 64;

/// Replaces the plain `Reducer::reduce` call, e.g. to veto, rewrite or log
/// actions around the default reduction.
pub type ReduceFn =
    Arc<dyn Fn(&Reducer, &Route, &Action) -> Result<Route, NavError> + Send + Sync>;

/// What an observer sees for every dispatched action.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub action: Action,
    pub result: Result<bool, NavError>,
}

/// Owns the current tree and applies actions to it synchronously.
#[derive(Clone)]
pub struct Dispatcher {
    reducer: Reducer,
    reduce_fn: Option<ReduceFn>,
    observers: Vec<mpsc::UnboundedSender<Dispatched>>,
    state: Route,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("reducer", &self.reducer)
            .field("custom_reduce", &self.reduce_fn.is_some())
            .field("observers", &self.observers.len())
            .field("state", &self.state.key)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(reducer: Reducer) -> Self {
        let state = reducer.initial().clone();
        Self::with_state(reducer, state)
    }

    /// Starts from an externally supplied tree (e.g. a restored snapshot).
    pub fn with_state(reducer: Reducer, state: Route) -> Self {
        Self {
            reducer,
            reduce_fn: None,
            observers: Vec::new(),
            state,
        }
    }

    /// Routes every action through `reduce` instead of the reducer directly.
    pub fn with_reduce_fn<F>(mut self, reduce: F) -> Self
    where
        F: Fn(&Reducer, &Route, &Action) -> Result<Route, NavError> + Send + Sync + 'static,
    {
        self.reduce_fn = Some(Arc::new(reduce));
        self
    }

    /// Receives every dispatched action with its outcome, failures included.
    /// Register before `spawn`; dropped receivers are pruned on the next dispatch.
    pub fn observe(&mut self) -> mpsc::UnboundedReceiver<Dispatched> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    pub fn state(&self) -> &Route {
        &self.state
    }

    pub fn reducer(&self) -> &Reducer {
        &self.reducer
    }

    /// Reduces `action` against the current tree.
    ///
    /// Returns `Ok(true)` if the tree changed, `Ok(false)` for a no-op.
    pub fn dispatch(&mut self, action: &Action) -> Result<bool, NavError> {
        let result = self.apply(action);
        if !self.observers.is_empty() {
            let seen = Dispatched {
                action: action.clone(),
                result: result.clone(),
            };
            self.observers.retain(|tx| tx.send(seen.clone()).is_ok());
        }
        result
    }

    /// Back navigation (hardware back button, swipe back).
    pub fn back(&mut self) -> Result<bool, NavError> {
        self.dispatch(&Action::pop())
    }

    fn apply(&mut self, action: &Action) -> Result<bool, NavError> {
        let next = match &self.reduce_fn {
            Some(reduce) => reduce(&self.reducer, &self.state, action)?,
            None => self.reducer.reduce(Some(&self.state), action)?,
        };
        if Arc::ptr_eq(&next, &self.state) {
            return Ok(false);
        }
        self.state = next;
        Ok(true)
    }
}

struct Request {
    action: Action,
    reply: Option<oneshot::Sender<Result<bool, NavError>>>,
}

/// Cloneable sender side of a spawned dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<Request>,
    state: watch::Receiver<Route>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("action", &self.action.kind())
            .field("awaits_reply", &self.reply.is_some())
            .finish()
    }
}

impl DispatchHandle {
    /// Sends `action` and waits until it has been reduced.
    pub async fn dispatch(&self, action: Action) -> Result<bool, NavError> {
        let (reply, result) = oneshot::channel();
        self.tx
            .send(Request {
                action,
                reply: Some(reply),
            })
            .await
            .map_err(|_| NavError::DispatcherClosed)?;
        result.await.map_err(|_| NavError::DispatcherClosed)?
    }

    /// Queues `action` without waiting; failures are only logged.
    pub async fn send(&self, action: Action) -> Result<(), NavError> {
        self.tx
            .send(Request {
                action,
                reply: None,
            })
            .await
            .map_err(|_| NavError::DispatcherClosed)
    }

    pub async fn back(&self) -> Result<bool, NavError> {
        self.dispatch(Action::pop()).await
    }

    /// The most recently published tree.
    pub fn state(&self) -> Route {
        self.state.borrow().clone()
    }

    /// Receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.state.clone()
    }
}

/// Runs `dispatcher` on a tokio task.
///
/// The task ends once every `DispatchHandle` is dropped and hands the
/// dispatcher back through the join handle.
pub fn spawn(dispatcher: Dispatcher) -> (DispatchHandle, JoinHandle<Dispatcher>) {
    let (tx, mut rx) = mpsc::channel::<Request>(ACTION_QUEUE_DEPTH);
    let (state_tx, state_rx) = watch::channel(dispatcher.state().clone());

    let task = tokio::spawn(async move {
        let mut dispatcher = dispatcher;
        while let Some(request) = rx.recv().await {
            let kind = request.action.kind();
            let result = dispatcher.dispatch(&request.action);
            match &result {
                Ok(true) => {
                    debug!("{kind} accepted, publishing new state");
                    state_tx.send_replace(dispatcher.state().clone());
                }
                Ok(false) => debug!("{kind} was a no-op"),
                Err(e) => warn!("{kind} rejected: {e}"),
            }
            if let Some(reply) = request.reply {
                // caller may have stopped waiting
                let _ = reply.send(result);
            }
        }
        debug!("Dispatcher channel closed");
        dispatcher
    });

    (
        DispatchHandle {
            tx,
            state: state_rx,
        },
        task,
    )
}
