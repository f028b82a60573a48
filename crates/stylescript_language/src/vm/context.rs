//! Host access for the VM.
//!
//! Host objects are script objects whose property reads are answered by the
//! embedder. The VM never stores a pointer back into the embedder; instead
//! every entry point that runs script code takes a `&mut dyn HostContext`
//! and forwards host-object traps to it synchronously.

use crate::value::Value;

// =============================================================================
// HostContext Trait
// =============================================================================

/// Answers property traps for host objects.
///
/// `object` is the id the host object was created with
/// (see [`Vm::new_host_object`](super::Vm::new_host_object)).
pub trait HostContext {
    /// Reads property `key` (`obj.key`, `obj[key]`).
    ///
    /// Missing properties read as `undefined`.
    fn get(&mut self, object: u32, key: &str) -> Value;

    /// Answers `key in obj`.
    fn has(&mut self, object: u32, key: &str) -> bool;
}

// =============================================================================
// NoHost
// =============================================================================

/// A host without properties.
///
/// Used when evaluating code that never touches host objects; every trap
/// reports a missing property.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHost;

impl HostContext for NoHost {
    fn get(&mut self, _object: u32, _key: &str) -> Value {
        Value::Undefined
    }

    fn has(&mut self, _object: u32, _key: &str) -> bool {
        false
    }
}
