//! # Cadence Robot
//!
//! Composition of the `cadence_core` framework into a concrete robot:
//! an immutable TOML-loadable parameter set, five subsystems (launcher,
//! elevator, hang, wrist, intake), the [`robot::Robot`] aggregate that
//! drives the scheduler once per externally paced control cycle, and a
//! simulated hardware layer for tests and the demo binary.

pub mod clock;
pub mod config;
pub mod hardware;
pub mod robot;
pub mod subsystems;
