//! Core domain types
//!
//! This module contains the core domain structures used across DevFlow
//! services. These types represent the fundamental business entities and are
//! shared between the engine (which owns them) and the server (which
//! projects them for polling clients).

pub mod log;
pub mod pipeline;
pub mod run;
