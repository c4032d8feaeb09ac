//! # Core Navigation Logic
//!
//! This module contains navtree's business logic.
//! It knows nothing about how the tree is rendered.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • SceneRegistry        │
//!                    │  • Route tree (state)   │
//!                    │  • Action (events)      │
//!                    │  • reduce() (reducer)   │
//!                    │                         │
//!                    │  No I/O. No UI. Pure.   │
//!                    └───────────┬─────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!     ┌────────────┐      ┌────────────┐      ┌────────────┐
//!     │ Dispatcher │      │  Snapshot  │      │    CLI     │
//!     │  (tokio)   │      │   (JSON)   │      │  (clap)    │
//!     └────────────┘      └────────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`scene`]: `SceneRegistry`, the flattened scene descriptors
//! - [`state`]: `RouteNode`, the initial state builder and tree queries
//! - [`action`]: the `Action` enum and its JSON wire shape
//! - [`reducer`]: `Reducer`, the pure transition function
//! - [`dispatch`]: serializes actions into the reducer
//! - [`snapshot`]: save/restore a tree
//! - [`config`]: settings and scene file loading

pub mod action;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod reducer;
pub mod scene;
pub mod snapshot;
pub mod state;

// Re-export commonly used types for convenience
pub use action::{Action, ActionKind, ActionMessage};
pub use error::NavError;
pub use reducer::{Reducer, create_reducer};
pub use scene::{Props, Scene, SceneRegistry, SceneSpec};
pub use state::{Route, RouteNode};
