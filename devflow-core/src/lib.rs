//! DevFlow Core
//!
//! Core types and abstractions for the DevFlow deployment pipeline engine.
//!
//! This crate contains:
//! - Domain types: Core business entities (Pipeline, PipelineRun, etc.)
//! - DTOs: Data transfer objects for the HTTP surface and status polling

pub mod domain;
pub mod dto;
