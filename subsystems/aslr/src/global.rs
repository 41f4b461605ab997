//! # Process-wide ASLR State
//!
//! Loader-facing entry points over a single context, for startup code that
//! does not thread an [`AslrContext`] through its call chain.
//!
//! The lock only serializes the rare embedder that maps images from several
//! threads; the normal loader path is single-threaded.

use spin::Mutex;

use crate::context::AslrContext;
use crate::entropy::OsEntropy;
use crate::hint::generate_hint;
use crate::tunables::AslrTunables;
use crate::VirtAddr;

static ASLR: Mutex<AslrContext> = Mutex::new(AslrContext::new());

/// Record the lowest address of the loader's own mappings
///
/// Call once during early startup, before the first [`aslr_get_hint`].
pub fn aslr_init(ldso_addr: VirtAddr) {
    ASLR.lock().init_reference(ldso_addr);
}

/// Set the window width; out-of-range values are clamped
pub fn aslr_set_space(space: usize) {
    ASLR.lock().set_space(space);
}

/// Apply `noaslr` / `aslr_space=` settings
pub fn aslr_apply_tunables(input: &str) {
    AslrTunables::parse(input).apply(&mut ASLR.lock());
}

/// Placement hint for a mapping of `maplength` bytes
pub fn aslr_get_hint(maplength: usize) -> VirtAddr {
    let ctx = ASLR.lock();
    generate_hint(&ctx, &mut OsEntropy::new(), maplength)
}

/// Snapshot of the current context
pub fn aslr_context() -> AslrContext {
    ASLR.lock().clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ASLR_SPACE_MIN, PAGE_SIZE};

    // Single test: the state is shared by every test thread.
    #[test]
    fn test_global_lifecycle() {
        aslr_init(VirtAddr::new(0x4000_0000));
        aslr_set_space(1);

        let ctx = aslr_context();
        assert!(ctx.is_initialized());
        assert_eq!(ctx.effective_space(), ASLR_SPACE_MIN);

        for _ in 0..16 {
            let hint = aslr_get_hint(3 * PAGE_SIZE);
            assert!(hint.is_page_aligned());
            assert!(hint >= ctx.window_base());
            assert!(hint < ctx.reference());
        }

        aslr_apply_tunables("noaslr aslr_space=2m");
        let ctx = aslr_context();
        assert!(!ctx.is_enabled());
        assert_eq!(ctx.effective_space(), 2 << 20);
        assert!(aslr_get_hint(PAGE_SIZE).is_null());
    }
}
