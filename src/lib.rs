//! Workspace facade crate.
//!
//! Re-exports [`core_service`] behind the `desktop-shims` feature so a host
//! application can depend on `rample-workspace` alone and get the desktop
//! wiring of the kit sync core.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
