//! navtree library exports for testing

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod core;

#[cfg(test)]
pub mod test_support;

/// How the CLI prints a route tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Pretty,
    #[default]
    Outline,
}
