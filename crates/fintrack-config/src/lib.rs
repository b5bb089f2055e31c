// crates/fintrack-config/src/lib.rs
// ============================================================================
// Module: Fintrack Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for fintrack.toml semantics.
// Dependencies: fintrack-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `fintrack-config` defines the `fintrack.toml` model: `[storage]`,
//! `[recovery]`, and `[audit]`. Validation fails closed; a valid config
//! converts into the store configuration and audit sink.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
