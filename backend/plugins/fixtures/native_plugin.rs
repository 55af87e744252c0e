//! Stand-alone plugin library for the native loader tests.
//!
//! Built with `rustc --crate-type cdylib`. `--cfg wrong_shape` exports a `Plugin`
//! symbol that is not a declaration; `--cfg no_symbol` exports no `Plugin` at all.
#![allow(non_upper_case_globals, dead_code)]

use std::ffi::c_char;

#[repr(C)]
pub struct PluginDeclaration {
    magic: u32,
    abi_version: u32,
    greet: Option<unsafe extern "C" fn() -> *const c_char>,
    destroy: Option<unsafe extern "C" fn(*const u8, usize) -> i32>,
}

unsafe extern "C" fn greet() -> *const c_char {
    c"native fixture".as_ptr()
}

unsafe extern "C" fn destroy(payload: *const u8, len: usize) -> i32 {
    if !payload.is_null() && len == 4 && unsafe { std::slice::from_raw_parts(payload, len) } == b"fail" {
        1
    } else {
        0
    }
}

#[cfg(not(any(wrong_shape, no_symbol)))]
#[no_mangle]
pub static Plugin: PluginDeclaration = PluginDeclaration {
    magic: 0x4B44_504C,
    abi_version: 1,
    greet: Some(greet),
    destroy: Some(destroy),
};

#[cfg(wrong_shape)]
#[no_mangle]
pub static Plugin: [u32; 8] = [7; 8];

#[cfg(no_symbol)]
#[no_mangle]
pub static NotAPlugin: u32 = 0;
