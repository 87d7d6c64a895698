//! Flight mission plan engine: plan items, connecting lines, statistics, plan files and
//! vehicle synchronization.

pub mod config;
pub mod error;
pub mod export;
pub mod geo;
pub mod legacy;
pub mod lines;
pub mod logging;
pub mod mission;
pub mod model;
pub mod plan;
pub mod runtime;
pub mod sim;
pub mod stats;
pub mod storage;
pub mod survey;
pub mod sync;
