//! Core library components.
//!
//! This module contains the document model, the two-pass engine that moves
//! Secret payloads into a store, the restoration path used by `read`, and
//! the store backends behind both.

pub mod backend;
pub mod batch;
pub mod codec;
pub mod config;
pub mod constants;
pub mod document;
pub mod engine;
pub mod files;
pub mod locate;
pub mod resolver;
pub mod restore;
pub mod types;
