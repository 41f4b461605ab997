//! # Placement Hint Generation
//!
//! Computes the address passed as the first argument of `mmap()` when a
//! position-independent image is mapped.
//!
//! ## Algorithm
//!
//! ```text
//! len    = round_up(maplength, PAGE_SIZE)
//! rnd    = (read_u32() << 32) | read_u32()
//! offset = rnd % (space - len)
//! hint   = (reference - space + offset) & !(PAGE_SIZE - 1)
//! ```
//!
//! One candidate, no retries: if the range is taken, `mmap()` places the
//! image elsewhere just as it would for a null hint.

use crate::context::AslrContext;
use crate::entropy::{draw_u64, EntropyQuality, EntropySource};
use crate::{page_round_up, VirtAddr};

/// Breakdown of a generated hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintReport {
    /// Page-aligned placement hint
    pub hint: VirtAddr,
    /// Lowest address of the window (`reference - space`)
    pub window_base: VirtAddr,
    /// Window width used for this hint
    pub window_size: usize,
    /// Mapping length rounded up to a page multiple
    pub rounded_length: usize,
    /// Offset into the window, before page alignment
    pub offset: usize,
    /// Raw 64-bit value drawn from the source
    pub random_value: u64,
    /// How much of `random_value` came from the source
    pub quality: EntropyQuality,
}

impl HintReport {
    /// Report for a context with randomization turned off
    fn null(rounded_length: usize) -> Self {
        Self {
            hint: VirtAddr::null(),
            window_base: VirtAddr::null(),
            window_size: 0,
            rounded_length,
            offset: 0,
            random_value: 0,
            quality: EntropyQuality::None,
        }
    }

    /// Number of distinct page-aligned positions the hint could take
    pub fn slots(&self) -> usize {
        self.window_size.saturating_sub(self.rounded_length) / crate::PAGE_SIZE
    }
}

/// Generate a randomized placement hint for a mapping of `maplength` bytes
///
/// The result is page aligned and lies in `[reference - space, reference)`.
/// It is only a hint: nothing checks that the range is free.
pub fn generate_hint<S>(ctx: &AslrContext, source: &mut S, maplength: usize) -> VirtAddr
where
    S: EntropySource + ?Sized,
{
    generate_hint_detailed(ctx, source, maplength).hint
}

/// Generate a placement hint and report how it was derived
pub fn generate_hint_detailed<S>(ctx: &AslrContext, source: &mut S, maplength: usize) -> HintReport
where
    S: EntropySource + ?Sized,
{
    let len = page_round_up(maplength);

    if !ctx.is_enabled() {
        return HintReport::null(len);
    }

    if !ctx.is_initialized() {
        log::warn!("aslr: hint requested before the reference point was recorded");
    }

    let space = ctx.effective_space();
    let base = ctx.window_base();
    let (random_value, quality) = draw_u64(source);

    // An image as large as the window goes at its base.
    let offset = match space.checked_sub(len) {
        Some(range) if range > 0 => (random_value % range as u64) as usize,
        _ => 0,
    };

    let mut hint = (base + offset).align_down();
    if hint < base {
        // Unaligned window base: first page boundary inside the window.
        hint = hint + crate::PAGE_SIZE;
    }

    debug_assert!(hint.is_page_aligned());

    #[cfg(feature = "debug")]
    log::trace!(
        "aslr: hint {} for {:#x} bytes (window {}..{}, quality {:?})",
        hint,
        len,
        base,
        ctx.reference(),
        quality
    );

    HintReport {
        hint,
        window_base: base,
        window_size: space,
        rounded_length: len,
        offset,
        random_value,
        quality,
    }
}

// ============================================================================
// TESTS
// ============================================================================
