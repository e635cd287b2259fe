//! Strict-mode escalation tests.
//!
//! Strict mode is process-global, so these live in their own test binary
//! where no other test emits diagnostics concurrently.

use std::sync::Arc;

use aliasalloc::diagnostics::{init_from_env, strict_mode, StrictMode, StrictModeGuard};
use aliasalloc::heap::dummy::{DummyAliasedHeap, DummyDevice};
use aliasalloc::{
    AliasedAttachmentAllocator, AllocatorDescriptor, AttachmentId, Device, ScopeId,
};

#[test]
#[should_panic(expected = "AA002")]
fn strict_mode_escalates_error_diagnostics_to_panics() {
    std::env::set_var("ALIASALLOC_STRICT", "warn");
    init_from_env();
    assert_eq!(strict_mode(), StrictMode::Warn);

    let device: Arc<dyn Device> = Arc::new(DummyDevice::default());
    let mut allocator = AliasedAttachmentAllocator::<DummyAliasedHeap>::init(
        device,
        AllocatorDescriptor::new("StrictPool"),
    )
    .unwrap();

    let _guard = StrictModeGuard::panic_on_error();
    // Deactivating an attachment that was never activated is an error
    // diagnostic; under panic-on-error it must abort the test here.
    allocator.deactivate_buffer(&AttachmentId::from("never_activated"), &ScopeId::from("pass"));
}
