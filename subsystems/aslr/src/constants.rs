//! # Placement Constants
//!
//! Page geometry and the bounds of the ASLR window.

use static_assertions::const_assert;

/// log2 of [`PAGE_SIZE`]
pub const PAGE_SHIFT: u32 = 12;

/// Granularity of mappings and of every generated hint
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Smallest window the configurator will store (1 MiB)
pub const ASLR_SPACE_MIN: usize = 0x10_0000;

cfg_if::cfg_if! {
    if #[cfg(target_pointer_width = "64")] {
        /// Largest window below the reference address (128 GiB)
        pub const ASLR_SPACE_MAX: usize = 0x20_0000_0000;
    } else {
        /// Largest window below the reference address (128 MiB)
        pub const ASLR_SPACE_MAX: usize = 0x800_0000;
    }
}

const_assert!(PAGE_SIZE.is_power_of_two());
const_assert!(ASLR_SPACE_MIN <= ASLR_SPACE_MAX);
const_assert!(ASLR_SPACE_MIN > PAGE_SIZE);
const_assert!(ASLR_SPACE_MIN % PAGE_SIZE == 0);
const_assert!(ASLR_SPACE_MAX % PAGE_SIZE == 0);
