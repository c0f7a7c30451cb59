//! Gridwalk: parallel simulated annealing over 8x14 digit grids.
//!
//! The objective counts how many numbers from a fixed basis set can be
//! traced as 8-connected walks over the grid. Each worker thread runs an
//! independent annealing island with an adaptive operator portfolio;
//! elite boards and thermodynamic telemetry stream to a SQLite store,
//! and a memory-mapped monitor block exposes live worker state to an
//! external dashboard.

pub mod basis;
pub mod board;
pub mod constants;
pub mod db;
pub mod monitor;
pub mod mutations;
pub mod physics;
pub mod scoring;
pub mod solver;
