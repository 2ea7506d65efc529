//! Data Transfer Objects
//!
//! This module contains DTOs used at the HTTP surface: requests from trigger
//! sources and configuration UIs, and the projections returned to polling
//! dashboards. DTOs are lightweight representations of domain entities
//! optimized for network transfer.

pub mod pipeline;
pub mod run;
pub mod status;
