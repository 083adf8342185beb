//! Session core for the KBS menuconfig browser console.
//!
//! The emulated machine in the page multiplexes a handful of reserved control
//! bytes into its console output stream; this crate turns that side channel
//! into a coarse session lifecycle, and orchestrates the file-exchange
//! handshake that stages a starting configuration plus a kconfig bundle into
//! the machine's filesystem and captures the generated artifact back out.
//!
//! Everything here is host-agnostic: the machine filesystem, the console
//! input channel and the bundle transport are trait seams implemented by the
//! wasm bridge in `kbs-wasm` (and by plain mocks in tests).

mod error;
mod session;
mod state;

pub use error::{ConfigReadError, FetchError, SessionError};
pub use session::{
    run_handshake, static_bundle_path, BundleSource, ConfigSource, ConsoleTx, ExportArtifact,
    ExportOutcome, GuestFs, SessionController, SessionObserver, BUNDLE_GUEST_PATH,
    CONFIG_GUEST_PATH, EXPORT_ARTIFACT,
};
pub use state::{ControlByte, SessionEvent, SessionState, WAKE_CHAR};
