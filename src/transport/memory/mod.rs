// src/transport/memory/mod.rs

//! In-memory transport implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `TransportSession` trait. It is intended primarily for testing, local
//! execution, and as a reference for transport semantics.
//!
//! ## Reference Semantics
//!
//! The in-memory transport defines the **reference behavior** for the
//! transport layer. All other transport implementations are expected to
//! approximate this behavior as closely as their underlying systems allow and
//! to document any unavoidable deviations.
//!
//! In particular, the in-memory transport establishes the following
//! expectations:
//!
//! - A persistent session must be connected before `publish()` succeeds; a
//!   publish on a lost session fails with `SessionLost`.
//! - A request/response session has no standing state and is always usable.
//! - `pump()` returns queued inbound messages in arrival order and never
//!   blocks.
//!
//! ## Non-Goals
//!
//! This transport does not attempt to emulate broker persistence or network
//! timing. Failures are scripted explicitly through [`MemoryHub`].

mod transport;

pub use transport::{create_transport, create_transport_with_hub, MemoryHub};
