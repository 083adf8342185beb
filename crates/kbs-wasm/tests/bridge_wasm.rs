#![cfg(target_arch = "wasm32")]

// Browser-only bridge tests. These exercise the exported classes without a
// live emulator: nothing here reaches the filesystem or terminal shims.

wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Reflect, Uint8Array};
use kbs_session::GuestFs;
use kbs_wasm::{EmachineFs, MenuconfigConsole};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::wasm_bindgen_test;

fn recording_console() -> (MenuconfigConsole, Rc<RefCell<Vec<(String, bool, bool)>>>) {
    let seen: Rc<RefCell<Vec<(String, bool, bool)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let on_state = Closure::<dyn FnMut(String, bool, bool)>::new(
        move |label: String, powered: bool, working: bool| {
            sink.borrow_mut().push((label, powered, working));
        },
    );
    let console = MenuconfigConsole::new(
        Some(on_state.as_ref().unchecked_ref::<js_sys::Function>().clone()),
        None,
    );
    // The bridge holds its own reference to the JS function.
    on_state.forget();
    (console, seen)
}

#[wasm_bindgen_test]
fn lifecycle_callbacks_carry_derived_indicators() {
    let (console, seen) = recording_console();
    assert_eq!(console.state_label(), "OFF");
    assert!(!console.powered());

    console.power_on();
    let echoed = console.process_console_output("linux 6.1 booting\x02$ ");
    assert_eq!(echoed, "linux 6.1 booting\x02$ ");
    console.process_console_output("\x06");

    assert_eq!(console.state_label(), "RUNNING");
    assert!(console.powered());
    assert!(console.working());

    assert_eq!(
        *seen.borrow(),
        vec![
            ("BOOTING".to_owned(), true, true),
            ("READY".to_owned(), true, false),
            ("RUNNING".to_owned(), true, true),
        ]
    );
}

#[wasm_bindgen_test]
fn imports_stage_into_the_heap_installed_by_malloc() {
    let global = js_sys::global();

    // Emulator heap as it exists before the allocation.
    let old_heap = Uint8Array::new_with_length(64);
    Reflect::set(&global, &"HEAPU8".into(), &old_heap).unwrap();

    // `_malloc` grows the emulator's memory: it swaps in a fresh, larger
    // `HEAPU8`, detaching the old view. Bytes staged into the old view
    // would be lost.
    let grown_heap: Rc<RefCell<Option<Uint8Array>>> = Rc::new(RefCell::new(None));
    let grown = grown_heap.clone();
    let malloc = Closure::<dyn FnMut(u32) -> u32>::new(move |_len: u32| {
        let heap = Uint8Array::new_with_length(256);
        Reflect::set(&js_sys::global(), &"HEAPU8".into(), &heap).unwrap();
        *grown.borrow_mut() = Some(heap);
        8u32
    });
    Reflect::set(&global, &"_malloc".into(), malloc.as_ref()).unwrap();

    let imports: Rc<RefCell<Vec<(String, u32, u32)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = imports.clone();
    let import_file =
        Closure::<dyn FnMut(String, u32, u32)>::new(move |path: String, addr: u32, len: u32| {
            sink.borrow_mut().push((path, addr, len));
        });
    Reflect::set(&global, &"fs_import_file".into(), import_file.as_ref()).unwrap();

    EmachineFs.import_file("kconfig.tar", b"tar bytes");

    assert_eq!(*imports.borrow(), vec![("kconfig.tar".to_owned(), 8, 9)]);
    let heap = grown_heap.borrow().clone().unwrap();
    assert_eq!(heap.subarray(8, 17).to_vec(), b"tar bytes");
}

#[wasm_bindgen_test]
fn only_the_session_artifact_is_captured() {
    let (console, _seen) = recording_console();

    console.on_file_export("core.1234".to_owned(), vec![1, 2, 3]);
    assert!(console.result_filename().is_none());

    console.on_file_export("klipper.config".to_owned(), b"CONFIG_FOO=y\n".to_vec());
    assert_eq!(console.result_filename().as_deref(), Some("klipper.config"));

    assert_eq!(console.take_result().as_deref(), Some(&b"CONFIG_FOO=y\n"[..]));
    assert!(console.result_filename().is_none());
    assert!(console.take_result().is_none());
}
