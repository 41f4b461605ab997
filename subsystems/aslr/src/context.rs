//! # Randomization Context
//!
//! State consulted by the hint generator: the reference address below which
//! hints are placed, and the width of the window searched below it.
//!
//! The loader's startup sequence owns one context, records the reference
//! point once, optionally tunes the window, and then hands the context by
//! reference to every hint request.

use crate::constants::{ASLR_SPACE_MAX, ASLR_SPACE_MIN};
use crate::VirtAddr;

// ============================================================================
// CONTEXT STATE
// ============================================================================

/// Lifecycle of the reference point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No reference address recorded yet
    Uninitialized,
    /// Reference address recorded, hints can be generated
    Initialized,
}

impl Default for ContextState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

// ============================================================================
// ASLR CONTEXT
// ============================================================================

/// Randomization context for placement hints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AslrContext {
    /// Address the window is anchored below (lowest loader mapping)
    reference: VirtAddr,
    /// Configured window width; zero until explicitly configured
    space: usize,
    /// Randomization switch; a disabled context yields null hints
    enabled: bool,
    state: ContextState,
}

impl AslrContext {
    /// Create an empty, enabled context
    pub const fn new() -> Self {
        Self {
            reference: VirtAddr::null(),
            space: 0,
            enabled: true,
            state: ContextState::Uninitialized,
        }
    }

    /// Create a context whose hints are always null
    ///
    /// A null hint lets the kernel pick the placement itself, which is
    /// what a loader built without ASLR passes to `mmap()`.
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Record the reference address below which hints are drawn
    ///
    /// The caller vouches for the address: it must be non-zero and at least
    /// [`effective_space`](Self::effective_space) bytes above zero. Calling
    /// this again overwrites the previous value.
    pub fn init_reference(&mut self, addr: VirtAddr) {
        self.reference = addr;
        self.state = ContextState::Initialized;
    }

    /// Store the window width, clamped into `[ASLR_SPACE_MIN, ASLR_SPACE_MAX]`
    ///
    /// Out-of-range values are never rejected.
    pub fn set_space(&mut self, space: usize) {
        let clamped = clamp_space(space);
        if clamped != space {
            log::debug!(
                "aslr: space {:#x} out of range, clamped to {:#x}",
                space,
                clamped
            );
        }
        self.space = clamped;
    }

    /// Reference address recorded by [`init_reference`](Self::init_reference)
    pub fn reference(&self) -> VirtAddr {
        self.reference
    }

    /// Window width as configured, or `None` if never configured
    pub fn configured_space(&self) -> Option<usize> {
        if self.space == 0 {
            None
        } else {
            Some(self.space)
        }
    }

    /// Window width used for hints; defaults to [`ASLR_SPACE_MAX`]
    pub fn effective_space(&self) -> usize {
        if self.space == 0 {
            ASLR_SPACE_MAX
        } else {
            self.space
        }
    }

    /// Lowest address of the window
    pub fn window_base(&self) -> VirtAddr {
        self.reference - self.effective_space()
    }

    /// Check whether hints are randomized
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turn randomization on or off
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Current lifecycle state
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Check if the reference point has been recorded
    pub fn is_initialized(&self) -> bool {
        self.state == ContextState::Initialized
    }
}

impl Default for AslrContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp a window width into `[ASLR_SPACE_MIN, ASLR_SPACE_MAX]`
#[inline]
pub const fn clamp_space(space: usize) -> usize {
    if space > ASLR_SPACE_MAX {
        ASLR_SPACE_MAX
    } else if space < ASLR_SPACE_MIN {
        ASLR_SPACE_MIN
    } else {
        space
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let ctx = AslrContext::new();
        assert!(ctx.is_enabled());
        assert!(!ctx.is_initialized());
        assert_eq!(ctx.state(), ContextState::Uninitialized);
        assert_eq!(ctx.configured_space(), None);
        assert_eq!(ctx.effective_space(), ASLR_SPACE_MAX);
    }

    #[test]
    fn test_init_reference() {
        let mut ctx = AslrContext::new();
        ctx.init_reference(VirtAddr::new(0x4000_0000));
        assert!(ctx.is_initialized());
        assert_eq!(ctx.reference(), VirtAddr::new(0x4000_0000));

        // Re-initialization overwrites
        ctx.init_reference(VirtAddr::new(0x5000_0000));
        assert_eq!(ctx.reference(), VirtAddr::new(0x5000_0000));
    }

    #[test]
    fn test_clamp_below_min() {
        let mut ctx = AslrContext::new();
        ctx.set_space(0);
        assert_eq!(ctx.configured_space(), Some(ASLR_SPACE_MIN));
        ctx.set_space(ASLR_SPACE_MIN - 1);
        assert_eq!(ctx.effective_space(), ASLR_SPACE_MIN);
    }

    #[test]
    fn test_clamp_above_max() {
        let mut ctx = AslrContext::new();
        ctx.set_space(ASLR_SPACE_MAX + 1);
        assert_eq!(ctx.effective_space(), ASLR_SPACE_MAX);
        ctx.set_space(usize::MAX);
        assert_eq!(ctx.effective_space(), ASLR_SPACE_MAX);
    }

    #[test]
    fn test_space_in_range_unchanged() {
        let mut ctx = AslrContext::new();
        for space in [ASLR_SPACE_MIN, 0x40_0000, 0x123_4567, ASLR_SPACE_MAX] {
            ctx.set_space(space);
            assert_eq!(ctx.effective_space(), space);
        }
    }

    #[test]
    fn test_window_base() {
        let mut ctx = AslrContext::new();
        ctx.init_reference(VirtAddr::new(0x4000_0000));
        ctx.set_space(0x100_0000);
        assert_eq!(ctx.window_base(), VirtAddr::new(0x3f00_0000));
    }

    #[test]
    fn test_disabled_context() {
        let mut ctx = AslrContext::disabled();
        assert!(!ctx.is_enabled());
        ctx.set_enabled(true);
        assert!(ctx.is_enabled());
    }
}
