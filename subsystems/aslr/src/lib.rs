//! # ld.so ASLR - Randomized Placement Hints
//!
//! When the dynamic loader maps a position-independent image (`ET_DYN`), the
//! first argument of `mmap()` is only a *hint*: a POSIX kernel that finds the
//! hinted range occupied falls back to its own placement, exactly as if a
//! null hint had been passed. This crate uses that to implement an
//! opportunistic, non-invasive ASLR for loaded images.
//!
//! ## Placement Window
//!
//! ```text
//!  reference - space                                     reference
//!        │                                                   │
//!        ▼                                                   ▼
//!        ┌───────────────────────────────────────────────────┬──────────┐
//!        │         ASLR window (space bytes)                 │  ld.so   │
//!        │    ┌─────────┐                                    │ mappings │
//!        │    │  image  │ ◄── base + (rnd % (space - len))   │          │
//!        │    └─────────┘     aligned down to a page         │          │
//!        └───────────────────────────────────────────────────┴──────────┘
//! ```
//!
//! The generator is a Monte-Carlo algorithm: it produces one candidate and
//! never checks whether the range is free. Collisions are resolved by the
//! kernel's own fallback.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ldso_aslr::{AslrContext, OsEntropy, VirtAddr, generate_hint};
//!
//! let mut ctx = AslrContext::new();
//! ctx.init_reference(VirtAddr::new(0x7f00_0000_0000));
//! ctx.set_space(0x1000_0000);
//!
//! let hint = generate_hint(&ctx, &mut OsEntropy::new(), 0x5000);
//! assert!(hint.is_page_aligned());
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

#[cfg(test)]
extern crate std;

pub mod constants;
pub mod context;
pub mod entropy;
pub mod global;
pub mod hint;
pub mod tunables;

use core::fmt;
use core::ops::{Add, Sub};

pub use constants::{ASLR_SPACE_MAX, ASLR_SPACE_MIN, PAGE_SHIFT, PAGE_SIZE};
pub use context::{clamp_space, AslrContext, ContextState};
pub use entropy::{
    EntropyError, EntropyQuality, EntropySource, FailingEntropy, FixedEntropy, OsEntropy,
};
pub use global::{aslr_apply_tunables, aslr_context, aslr_get_hint, aslr_init, aslr_set_space};
pub use hint::{generate_hint, generate_hint_detailed, HintReport};
pub use tunables::{AslrTunables, TunableError};

// =============================================================================
// Virtual Address
// =============================================================================

/// An address-width virtual address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(usize);

impl VirtAddr {
    /// Create a new virtual address
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Create a null (zero) virtual address
    #[inline]
    pub const fn null() -> Self {
        Self(0)
    }

    /// Check if this is a null address
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Get the raw address value
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check if the address is page aligned
    #[inline]
    pub const fn is_page_aligned(self) -> bool {
        self.0 & (PAGE_SIZE - 1) == 0
    }

    /// Align the address down to a page boundary
    #[inline]
    pub const fn align_down(self) -> Self {
        Self(page_align_down(self.0))
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<usize> for VirtAddr {
    type Output = Self;

    #[inline]
    fn add(self, rhs: usize) -> Self {
        Self(self.0.wrapping_add(rhs))
    }
}

impl Sub<usize> for VirtAddr {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: usize) -> Self {
        Self(self.0.wrapping_sub(rhs))
    }
}

impl From<usize> for VirtAddr {
    fn from(addr: usize) -> Self {
        Self(addr)
    }
}

impl From<VirtAddr> for usize {
    fn from(addr: VirtAddr) -> Self {
        addr.0
    }
}

// =============================================================================
// Page Helpers
// =============================================================================

/// Round a length up to the next multiple of [`PAGE_SIZE`]
///
/// Saturates at the largest page-aligned value instead of wrapping.
#[inline]
pub const fn page_round_up(len: usize) -> usize {
    match len.checked_add(PAGE_SIZE - 1) {
        Some(v) => v & !(PAGE_SIZE - 1),
        None => usize::MAX & !(PAGE_SIZE - 1),
    }
}

/// Clear the low page-offset bits of an address
#[inline]
pub const fn page_align_down(addr: usize) -> usize {
    addr & !(PAGE_SIZE - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_round_up() {
        assert_eq!(page_round_up(0), 0);
        assert_eq!(page_round_up(1), PAGE_SIZE);
        assert_eq!(page_round_up(PAGE_SIZE - 1), PAGE_SIZE);
        assert_eq!(page_round_up(PAGE_SIZE + 1), 2 * PAGE_SIZE);
    }

    #[test]
    fn test_round_up_keeps_aligned_lengths() {
        for pages in [1usize, 2, 7, 256, 4096] {
            let len = pages * PAGE_SIZE;
            assert_eq!(page_round_up(len), len);
        }
    }

    #[test]
    fn test_round_up_saturates() {
        let top = usize::MAX & !(PAGE_SIZE - 1);
        assert_eq!(page_round_up(usize::MAX), top);
        assert_eq!(page_round_up(top + 1), top);
    }

    #[test]
    fn test_virt_addr_alignment() {
        let addr = VirtAddr::new(0x1234_5678);
        assert!(!addr.is_page_aligned());
        assert_eq!(addr.align_down(), VirtAddr::new(0x1234_5000));
        assert!(addr.align_down().is_page_aligned());
        assert!(VirtAddr::null().is_null());
    }

    #[test]
    fn test_virt_addr_format() {
        let addr = VirtAddr::new(0xdead_b000);
        assert_eq!(std::format!("{}", addr), "0xdeadb000");
        assert_eq!(std::format!("{:?}", addr), "VirtAddr(0xdeadb000)");
        assert_eq!(std::format!("{:x}", addr), "deadb000");
    }
}
