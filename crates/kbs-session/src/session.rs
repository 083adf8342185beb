//! File-exchange handshake and session controller.
//!
//! One session: stage an optional starting configuration and a kconfig
//! bundle into the machine's filesystem, wake the in-guest wrapper, then wait
//! for the machine to export the generated configuration. The machine's side
//! of the contract is narrow: it blocks on console input until the wake
//! character arrives, reads `kconfig.tar` and (optionally) `klipper.config`
//! out of its filesystem, and exports `klipper.config` when the user is done.

use std::cell::RefCell;
use std::future::Future;

use crate::error::{ConfigReadError, FetchError, SessionError};
use crate::state::{ControlByte, SessionEvent, SessionState, WAKE_CHAR};

/// Guest path the starting configuration is staged at.
pub const CONFIG_GUEST_PATH: &str = "klipper.config";

/// Guest path the kconfig bundle archive is staged at.
pub const BUNDLE_GUEST_PATH: &str = "kconfig.tar";

/// The one export filename that is the artifact of a session. The in-guest
/// wrapper runs menuconfig with `KCONFIG_CONFIG=klipper.config`, so anything
/// else coming back out is an anomaly.
pub const EXPORT_ARTIFACT: &str = "klipper.config";

/// Static-mode bundle location: a fixed local directory keyed by bundle name,
/// used when no revision index is consulted.
pub fn static_bundle_path(bundle_name: &str) -> String {
    format!("kconfig_bundles/{bundle_name}.tar")
}

/// Staging of files into the emulated machine's filesystem.
///
/// Best-effort by contract: the machine side reports nothing back, so there
/// is no error channel here.
pub trait GuestFs {
    fn import_file(&mut self, path: &str, bytes: &[u8]);
}

/// Outbound half of the console channel.
pub trait ConsoleTx {
    /// Inject characters as if typed at the terminal.
    fn send_chars(&mut self, chars: &str);

    /// Move input focus to the terminal widget. No-op by default; only the
    /// browser bridge has a real widget to focus.
    fn focus(&mut self) {}
}

/// Source of the user-supplied starting configuration (a local file in the
/// browser).
pub trait ConfigSource {
    fn read(&mut self) -> impl Future<Output = Result<Vec<u8>, ConfigReadError>> + '_;
}

/// Transport for the kconfig bundle archive.
pub trait BundleSource {
    fn fetch<'a>(&'a self, url: &'a str)
        -> impl Future<Output = Result<Vec<u8>, FetchError>> + 'a;
}

/// Host-side observers of session progress (status line, lamps, export UI).
pub trait SessionObserver {
    /// The lifecycle state changed. Indicators are derived from the new
    /// value via [`SessionState::powered`] / [`SessionState::working`].
    fn state_changed(&self, state: SessionState);

    /// The session artifact was captured and can be offered for download.
    fn result_ready(&self, filename: &str);
}

/// A captured session artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub payload: Vec<u8>,
}

/// What became of a file the machine exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// It was the session artifact and is now the captured result.
    Captured,
    /// Unexpected filename; the payload was discarded.
    Ignored,
}

/// Owns the session lifecycle, the captured result, and the machine-facing
/// channels. All methods are synchronous; the asynchronous handshake is
/// driven by [`run_handshake`] so no borrow is held across a suspension
/// point (console output keeps arriving while a fetch is pending).
pub struct SessionController<F, C, O> {
    fs: F,
    console: C,
    observer: O,
    state: SessionState,
    transfer_in_flight: bool,
    result: Option<ExportArtifact>,
}

impl<F, C, O> SessionController<F, C, O>
where
    F: GuestFs,
    C: ConsoleTx,
    O: SessionObserver,
{
    pub fn new(fs: F, console: C, observer: O) -> Self {
        Self {
            fs,
            console,
            observer,
            state: SessionState::Off,
            transfer_in_flight: false,
            result: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The host booted the emulated machine (`Off -> Booting`).
    pub fn power_on(&mut self) {
        self.apply(SessionEvent::StartRequested);
    }

    /// Scan a chunk of console output for control bytes, in order. The
    /// caller forwards the chunk to the terminal renderer unmodified;
    /// interpretation here is a side channel, not a filter. Order matters
    /// within a chunk: an ACK is only honored if a READY earlier in the same
    /// chunk (or any earlier chunk) was seen first.
    pub fn observe_console(&mut self, chunk: &str) {
        for c in chunk.chars() {
            if let Some(byte) = ControlByte::from_char(c) {
                self.apply(SessionEvent::Control(byte));
            }
        }
    }

    /// The machine exported a file. Only [`EXPORT_ARTIFACT`] is captured;
    /// a second capture before a discard overwrites the first.
    pub fn on_export(&mut self, filename: &str, payload: Vec<u8>) -> ExportOutcome {
        if filename != EXPORT_ARTIFACT {
            return ExportOutcome::Ignored;
        }
        self.result = Some(ExportArtifact {
            filename: filename.to_owned(),
            payload,
        });
        self.observer.result_ready(filename);
        ExportOutcome::Captured
    }

    pub fn result(&self) -> Option<&ExportArtifact> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<ExportArtifact> {
        self.result.take()
    }

    pub fn discard_result(&mut self) {
        self.result = None;
    }

    /// Single mutation point for the lifecycle; observers are notified on
    /// every effective transition.
    fn apply(&mut self, event: SessionEvent) {
        let next = self.state.next(event);
        if next != self.state {
            self.state = next;
            self.observer.state_changed(next);
        }
    }

    fn begin_transfer(&mut self) -> Result<(), SessionError> {
        let machine_busy = matches!(
            self.state,
            SessionState::Running | SessionState::Resetting
        );
        if self.transfer_in_flight || machine_busy {
            return Err(SessionError::Busy);
        }
        self.transfer_in_flight = true;
        Ok(())
    }

    fn import_file(&mut self, path: &str, bytes: &[u8]) {
        self.fs.import_file(path, bytes);
    }

    fn send_wake(&mut self) {
        let mut wake = [0u8; 4];
        self.console.send_chars(WAKE_CHAR.encode_utf8(&mut wake));
        self.console.focus();
    }
}

/// Drive one file-exchange handshake.
///
/// Sequence: stage the starting configuration (if any), fetch the bundle,
/// stage it, send the wake character, focus the terminal. The lifecycle
/// state is deliberately untouched: "we told it to start" and "it confirmed
/// it started" are independent events, and only control bytes observed from
/// the machine advance the state.
///
/// A config read failure is non-fatal (the source logs it; the session
/// proceeds from scratch). A bundle fetch failure aborts the handshake with
/// no filesystem import and no wake character.
pub async fn run_handshake<F, C, O, Cfg, B>(
    controller: &RefCell<SessionController<F, C, O>>,
    config: Option<Cfg>,
    bundle: &B,
    bundle_url: &str,
) -> Result<(), SessionError>
where
    F: GuestFs,
    C: ConsoleTx,
    O: SessionObserver,
    Cfg: ConfigSource,
    B: BundleSource,
{
    controller.borrow_mut().begin_transfer()?;
    // Releases the guard on every exit path, including this future being
    // dropped mid-await; a stranded flag would reject all later sessions.
    let _transfer = TransferGuard { controller };

    if let Some(mut config) = config {
        if let Ok(bytes) = config.read().await {
            controller.borrow_mut().import_file(CONFIG_GUEST_PATH, &bytes);
        }
    }

    let archive = bundle.fetch(bundle_url).await?;

    let mut ctl = controller.borrow_mut();
    ctl.import_file(BUNDLE_GUEST_PATH, &archive);
    ctl.send_wake();
    Ok(())
}

/// Clears the in-flight flag when the handshake ends, however it ends.
struct TransferGuard<'a, F, C, O> {
    controller: &'a RefCell<SessionController<F, C, O>>,
}

impl<F, C, O> Drop for TransferGuard<'_, F, C, O> {
    fn drop(&mut self) {
        self.controller.borrow_mut().transfer_in_flight = false;
    }
}
