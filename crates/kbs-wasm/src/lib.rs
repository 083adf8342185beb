//! Browser bridge for the KBS menuconfig console.
//!
//! Binds the host-agnostic cores (`kbs-session`, `kbs-revdb`) to the page
//! hosting the emulated machine: the emulator's filesystem import shims and
//! terminal handler on `globalThis`, `fetch()` for bundles and revision
//! tables, and two exported classes (`MenuconfigConsole`, `RevisionIndex`)
//! the page chrome drives.
//!
//! All modules are wasm32-only; on native targets this crate is an empty
//! rlib so workspace-wide builds and tests stay cheap.

mod console_bridge;
mod fetch;
mod machine;
mod revdb_bridge;

#[cfg(target_arch = "wasm32")]
pub use console_bridge::MenuconfigConsole;
#[cfg(target_arch = "wasm32")]
pub use machine::EmachineFs;
#[cfg(target_arch = "wasm32")]
pub use revdb_bridge::RevisionIndex;
