use std::fmt;

/// Errors raised while building a registry or reducing an action.
///
/// All of these are programmer/configuration errors: a malformed scene
/// registry, an action naming a scene that does not exist, or an operation
/// the target node does not support. None are retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    /// Registry or reducer misconfigured (missing root, duplicate keys, bad alias).
    Configuration(String),
    /// A scene or node referenced by key could not be located.
    NotFound(String),
    /// A transition precondition was violated (e.g. pop on a tab bar).
    Assertion(String),
    /// The dispatcher task is gone (its receiver was dropped).
    DispatcherClosed,
}

impl fmt::Display for NavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            NavError::NotFound(msg) => write!(f, "not found: {msg}"),
            NavError::Assertion(msg) => write!(f, "assertion failed: {msg}"),
            NavError::DispatcherClosed => write!(f, "dispatcher closed"),
        }
    }
}

impl std::error::Error for NavError {}

/// Returns `Err(NavError::Assertion)` with the formatted message unless `cond` holds.
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::core::error::NavError::Assertion(format!($($arg)+)));
        }
    };
}

pub(crate) use ensure;
