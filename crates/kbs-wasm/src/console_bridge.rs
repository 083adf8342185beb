//! Exported session console driven by the page chrome.

#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Uint8Array;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::console;

use kbs_session::{
    run_handshake, ConfigReadError, ConfigSource, ExportOutcome, SessionController, SessionError,
    SessionObserver, SessionState,
};

use crate::fetch::{describe_js, WebFetch};
use crate::machine::{EmachineFs, TerminalTx};

/// Forwards lifecycle changes to JS callbacks. Indicator values are derived
/// from the state on every call, never cached on either side of the
/// boundary.
struct JsObserver {
    on_state_change: Option<js_sys::Function>,
    on_result_ready: Option<js_sys::Function>,
}

impl SessionObserver for JsObserver {
    fn state_changed(&self, state: SessionState) {
        if let Some(cb) = &self.on_state_change {
            let _ = cb.call3(
                &JsValue::NULL,
                &JsValue::from_str(state.label()),
                &JsValue::from_bool(state.powered()),
                &JsValue::from_bool(state.working()),
            );
        }
    }

    fn result_ready(&self, filename: &str) {
        if let Some(cb) = &self.on_result_ready {
            let _ = cb.call1(&JsValue::NULL, &JsValue::from_str(filename));
        }
    }
}

/// A user-picked local file as the starting configuration.
struct FileConfigSource {
    file: web_sys::File,
}

impl ConfigSource for FileConfigSource {
    fn read(&mut self) -> impl std::future::Future<Output = Result<Vec<u8>, ConfigReadError>> + '_ {
        let buffer = self.file.array_buffer();
        async move {
            match JsFuture::from(buffer).await {
                Ok(buffer) => Ok(Uint8Array::new(&buffer).to_vec()),
                Err(err) => {
                    // Non-fatal: the handshake proceeds from scratch.
                    let reason = describe_js(&err);
                    console::log_1(&format!("config read failed: {reason}").into());
                    Err(ConfigReadError(reason))
                }
            }
        }
    }
}

type Controller = SessionController<EmachineFs, TerminalTx, JsObserver>;

/// The session console: lifecycle tracking, file-exchange handshake, export
/// capture. One instance per page, owning the machine's console-input and
/// filesystem channels.
#[wasm_bindgen]
pub struct MenuconfigConsole {
    controller: Rc<RefCell<Controller>>,
}

#[wasm_bindgen]
impl MenuconfigConsole {
    /// `on_state_change(label, powered, working)` fires on every lifecycle
    /// transition; `on_result_ready(filename)` when the session artifact is
    /// captured.
    #[wasm_bindgen(constructor)]
    pub fn new(
        on_state_change: Option<js_sys::Function>,
        on_result_ready: Option<js_sys::Function>,
    ) -> Self {
        let observer = JsObserver {
            on_state_change,
            on_result_ready,
        };
        Self {
            controller: Rc::new(RefCell::new(SessionController::new(
                EmachineFs,
                TerminalTx,
                observer,
            ))),
        }
    }

    /// The page booted the emulated machine.
    pub fn power_on(&self) {
        self.controller.borrow_mut().power_on();
    }

    /// Scan one chunk of machine console output for control bytes and hand
    /// it back unmodified for the terminal renderer. Wire this into the
    /// terminal write path.
    pub fn process_console_output(&self, chunk: &str) -> String {
        self.controller.borrow_mut().observe_console(chunk);
        chunk.to_owned()
    }

    /// Form-submit entry point. In file mode a missing file is a user input
    /// error surfaced as a blocking alert; nothing starts.
    pub fn submit_form(
        &self,
        bundle_url: String,
        file_mode: bool,
        config_file: Option<web_sys::File>,
    ) -> bool {
        if file_mode && config_file.is_none() {
            if let Some(window) = web_sys::window() {
                let _ = window.alert_with_message(
                    "File mode selected, but no file uploaded. Please check input and try again!",
                );
            }
            return false;
        }
        self.start_session(bundle_url, if file_mode { config_file } else { None });
        true
    }

    /// Stage inputs into the machine and wake it. Fire-and-forget from the
    /// caller's point of view; failures land in the console log and the
    /// lifecycle state is left to the machine's own control bytes.
    pub fn start_session(&self, bundle_url: String, config_file: Option<web_sys::File>) {
        let controller = self.controller.clone();
        spawn_local(async move {
            let config = config_file.map(|file| FileConfigSource { file });
            match run_handshake(&controller, config, &WebFetch, &bundle_url).await {
                Ok(()) => {}
                Err(SessionError::Busy) => {
                    console::warn_1(&"session already in flight, ignoring start".into());
                }
                Err(SessionError::Bundle(err)) => {
                    console::log_1(&format!("failed to retrieve bundle: {err}").into());
                }
            }
        });
    }

    /// Export callback wired to the machine runtime. Anything that is not
    /// the session artifact is logged and dropped.
    pub fn on_file_export(&self, filename: String, payload: Vec<u8>) {
        let outcome = self.controller.borrow_mut().on_export(&filename, payload);
        if outcome == ExportOutcome::Ignored {
            console::warn_1(&format!("unexpected export {filename:?}, discarding").into());
        }
    }

    pub fn state_label(&self) -> String {
        self.controller.borrow().state().label().to_owned()
    }

    pub fn powered(&self) -> bool {
        self.controller.borrow().state().powered()
    }

    pub fn working(&self) -> bool {
        self.controller.borrow().state().working()
    }

    pub fn result_filename(&self) -> Option<String> {
        self.controller
            .borrow()
            .result()
            .map(|artifact| artifact.filename.clone())
    }

    /// Hand the captured artifact to the page (for download) and clear it.
    pub fn take_result(&self) -> Option<Vec<u8>> {
        self.controller
            .borrow_mut()
            .take_result()
            .map(|artifact| artifact.payload)
    }

    pub fn discard_result(&self) {
        self.controller.borrow_mut().discard_result();
    }
}
