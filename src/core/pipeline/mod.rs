//! # Pipeline Module
//!
//! The parallel driver (C4) and scan orchestrator (C9): `scan()` is the
//! crate's single public entry point, discovering, analyzing, caching, and
//! grouping everything under a root directory according to `ScanOptions`.
//!
//! ## Orchestrator interface
//! Three capabilities are exposed to callers: `scan` itself, `CacheOps` for
//! cache maintenance independent of an in-flight scan, and
//! `new_cancel_token`/`cancel` for cooperative cancellation.

mod executor;

pub use executor::{cancel, new_cancel_token, scan, CacheOps};
