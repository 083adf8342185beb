//! Session lifecycle state machine.
//!
//! The machine signals lifecycle changes with single reserved characters in
//! its console output:
//!
//! - `\x02` (STX) — boot finished, menuconfig wrapper is waiting for input
//! - `\x06` (ACK) — the start command was accepted, menuconfig is running
//! - `\x03` (ETX) — menuconfig exited, the machine is resetting
//!
//! The host injects `\x07` (BEL) as the wake character to kick off a run.
//! All other console bytes are ordinary terminal payload.

/// Control character the host sends into the console to start a run.
pub const WAKE_CHAR: char = '\x07';

/// Reserved control bytes recognized in the machine's console output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlByte {
    /// `\x02`: the machine is booted and waiting for a bundle.
    Ready,
    /// `\x06`: the machine acknowledged the wake command.
    Ack,
    /// `\x03`: the run finished and the machine is resetting.
    Done,
}

impl ControlByte {
    /// Recognize a control byte; any other character is terminal payload.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '\x02' => Some(ControlByte::Ready),
            '\x06' => Some(ControlByte::Ack),
            '\x03' => Some(ControlByte::Done),
            _ => None,
        }
    }
}

/// Events that drive the lifecycle: one local, one remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The host started (or restarted) the emulated machine.
    StartRequested,
    /// A control byte was observed in the console output stream.
    Control(ControlByte),
}

/// Coarse lifecycle of the emulated machine, as far as the host can tell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Off,
    Booting,
    Ready,
    Running,
    Resetting,
}

impl SessionState {
    /// Pure transition function. Events without a row for the current state
    /// leave it unchanged; in particular a spurious ACK outside `Ready` is
    /// ignored.
    pub fn next(self, event: SessionEvent) -> SessionState {
        match event {
            SessionEvent::StartRequested => match self {
                SessionState::Off => SessionState::Booting,
                other => other,
            },
            SessionEvent::Control(ControlByte::Ready) => SessionState::Ready,
            SessionEvent::Control(ControlByte::Done) => SessionState::Resetting,
            SessionEvent::Control(ControlByte::Ack) => match self {
                SessionState::Ready => SessionState::Running,
                other => other,
            },
        }
    }

    /// Display name for the status line.
    pub fn label(self) -> &'static str {
        match self {
            SessionState::Off => "OFF",
            SessionState::Booting => "BOOTING",
            SessionState::Ready => "READY",
            SessionState::Running => "RUNNING",
            SessionState::Resetting => "RESETTING",
        }
    }

    /// Power lamp: lit whenever the machine is not off.
    ///
    /// Indicators are derived on demand, never stored, so they cannot drift
    /// from the state value.
    pub fn powered(self) -> bool {
        self != SessionState::Off
    }

    /// Activity lamp: lit while the machine is doing something (booting,
    /// running menuconfig, or resetting).
    pub fn working(self) -> bool {
        !matches!(self, SessionState::Off | SessionState::Ready)
    }
}
