//! C ABI shared by the host and plugin libraries.
//!
//! Every plugin library exports a static named [`PLUGIN_SYMBOL`] holding a
//! [`PluginDeclaration`]. Plugin authors should use [`declare_plugin!`](crate::declare_plugin)
//! rather than building the declaration by hand.

use std::ffi::c_char;

/// Name of the exported symbol every plugin library must provide.
pub const PLUGIN_SYMBOL: &str = "Plugin";

/// Marks a symbol as a Kadende plugin declaration ("KDPL").
pub const PLUGIN_MAGIC: u32 = 0x4B44_504C;

/// Bumped whenever the layout of [`PluginDeclaration`] changes.
pub const ABI_VERSION: u32 = 1;

/// Returns a static NUL-terminated identity string.
pub type GreetFn = unsafe extern "C" fn() -> *const c_char;

/// Releases plugin resources. Receives an opaque payload, returns 0 on success.
pub type DestroyFn = unsafe extern "C" fn(payload: *const u8, len: usize) -> i32;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PluginDeclaration {
    pub magic: u32,
    pub abi_version: u32,
    pub greet: Option<GreetFn>,
    pub destroy: Option<DestroyFn>,
}

impl PluginDeclaration {
    /// Checks the declaration against the capability set the host requires.
    pub fn check(&self) -> Result<(), String> {
        if self.magic != PLUGIN_MAGIC {
            return Err(format!("bad magic {:#010x}", self.magic));
        }
        if self.abi_version != ABI_VERSION {
            return Err(format!(
                "abi version {} (host expects {ABI_VERSION})",
                self.abi_version
            ));
        }
        if self.greet.is_none() {
            return Err("missing `greet` operation".to_string());
        }
        if self.destroy.is_none() {
            return Err("missing `destroy` operation".to_string());
        }
        Ok(())
    }

    /// Reads a declaration from the address of an exported symbol.
    ///
    /// The magic word is read first so a symbol of some other shape is rejected
    /// before the full struct is copied.
    ///
    /// # Safety
    ///
    /// `ptr` must be the address of a symbol in a library that stays mapped for the
    /// duration of the call, readable for at least four bytes.
    pub unsafe fn read(ptr: *const PluginDeclaration) -> Result<PluginDeclaration, String> {
        if ptr.is_null() {
            return Err("symbol resolves to a null address".to_string());
        }
        let magic = unsafe { std::ptr::read_unaligned(ptr.cast::<u32>()) };
        if magic != PLUGIN_MAGIC {
            return Err(format!("bad magic {magic:#010x}"));
        }
        let declaration = unsafe { std::ptr::read_unaligned(ptr) };
        declaration.check()?;
        Ok(declaration)
    }
}

/// Exports a conforming `Plugin` symbol from two safe functions.
///
/// `greet` is `fn() -> &'static CStr`; `destroy` is `fn(&[u8]) -> Result<(), E>`.
///
/// ```rust,ignore
/// fn greet() -> &'static std::ffi::CStr { c"file provider" }
/// fn destroy(_payload: &[u8]) -> Result<(), String> { Ok(()) }
///
/// kadende_core::declare_plugin!(greet: greet, destroy: destroy);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    (greet: $greet:path, destroy: $destroy:path $(,)?) => {
        #[unsafe(no_mangle)]
        #[allow(non_upper_case_globals)]
        pub static Plugin: $crate::abi::PluginDeclaration = {
            unsafe extern "C" fn __kadende_greet() -> *const ::std::ffi::c_char {
                let name: &'static ::std::ffi::CStr = $greet();
                name.as_ptr()
            }

            unsafe extern "C" fn __kadende_destroy(payload: *const u8, len: usize) -> i32 {
                let payload: &[u8] = if payload.is_null() {
                    &[]
                } else {
                    unsafe { ::std::slice::from_raw_parts(payload, len) }
                };
                match $destroy(payload) {
                    Ok(()) => 0,
                    Err(_) => 1,
                }
            }

            $crate::abi::PluginDeclaration {
                magic: $crate::abi::PLUGIN_MAGIC,
                abi_version: $crate::abi::ABI_VERSION,
                greet: Some(__kadende_greet),
                destroy: Some(__kadende_destroy),
            }
        };
    };
}
