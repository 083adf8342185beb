//! Emulated-machine shims installed by the hosting page.
//!
//! The emulator runtime exposes an emscripten-style surface on `globalThis`:
//! `_malloc` / `HEAPU8` for staging bytes in its linear memory,
//! `fs_import_file` to hand a staged region to its virtual filesystem, and
//! `term_handler` to inject characters into the console input channel.
//! `HEAPU8` and `vm_terminal` are installed after this module instantiates,
//! so they are resolved reflectively at call time rather than imported.

#![cfg(target_arch = "wasm32")]

use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::console;

use kbs_session::{ConsoleTx, GuestFs};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = globalThis, js_name = _malloc)]
    fn emachine_malloc(len: u32) -> u32;

    #[wasm_bindgen(js_namespace = globalThis, js_name = fs_import_file)]
    fn emachine_fs_import_file(path: &str, addr: u32, len: u32);

    #[wasm_bindgen(js_namespace = globalThis, js_name = term_handler)]
    fn emachine_term_handler(chars: &str);
}

fn machine_heap() -> Option<Uint8Array> {
    let heap = Reflect::get(&js_sys::global(), &JsValue::from_str("HEAPU8")).ok()?;
    heap.dyn_into::<Uint8Array>().ok()
}

/// Filesystem staging into the emulated machine. Best-effort: the machine
/// reports nothing back, so failures inside its filesystem are invisible
/// here.
pub struct EmachineFs;

impl GuestFs for EmachineFs {
    fn import_file(&mut self, path: &str, bytes: &[u8]) {
        let len = bytes.len() as u32;
        let addr = emachine_malloc(len);
        // `_malloc` can grow the emulator's linear memory, which detaches
        // any previously obtained `HEAPU8` view; resolve the heap only after
        // the allocation.
        let Some(heap) = machine_heap() else {
            console::warn_1(
                &format!("machine heap not available, dropping import of {path}").into(),
            );
            return;
        };
        console::log_1(&format!("importing {len}b into {path}...").into());
        heap.subarray(addr, addr + len).copy_from(bytes);
        emachine_fs_import_file(path, addr, len);
        console::log_1(&format!("import of {path} complete").into());
    }
}

/// Outbound console channel: characters injected as if typed.
pub struct TerminalTx;

impl ConsoleTx for TerminalTx {
    fn send_chars(&mut self, chars: &str) {
        emachine_term_handler(chars);
    }

    fn focus(&mut self) {
        let Ok(terminal) = Reflect::get(&js_sys::global(), &JsValue::from_str("vm_terminal"))
        else {
            return;
        };
        if terminal.is_undefined() || terminal.is_null() {
            return;
        }
        let Ok(focus) = Reflect::get(&terminal, &JsValue::from_str("focus")) else {
            return;
        };
        if let Some(focus) = focus.dyn_ref::<js_sys::Function>() {
            let _ = focus.call0(&terminal);
        }
    }
}
