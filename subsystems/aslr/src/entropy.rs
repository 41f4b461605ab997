//! # Entropy Sources
//!
//! Randomness for placement hints comes from an [`EntropySource`]. The
//! loader uses [`OsEntropy`], which reads the kernel's blocking true-entropy
//! pool through `getrandom(2)`; tests and embedders can substitute any other
//! source.
//!
//! ## Failure Policy
//!
//! ```text
//! ┌──────────────────────┬────────────────────────────────────────┐
//! │ Outcome of a read    │ Treatment                              │
//! ├──────────────────────┼────────────────────────────────────────┤
//! │ Ok(n)                │ use the bytes (short reads zero-fill)  │
//! │ Err(Interrupted)     │ retry, bounded by MAX_INTERRUPT_RETRIES│
//! │ Err(Unavailable(_))  │ degrade: that half of the value is 0   │
//! └──────────────────────┴────────────────────────────────────────┘
//! ```
//!
//! A process must still start when entropy is scarce early in boot, so no
//! error ever leaves this module.

use core::fmt;

use bitflags::bitflags;

/// Upper bound on retries after an interrupted read
pub const MAX_INTERRUPT_RETRIES: usize = 64;

// ============================================================================
// ERRORS
// ============================================================================

/// Failure reported by an entropy source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyError {
    /// Read interrupted by a signal; retryable
    Interrupted,
    /// Source is permanently unavailable (carries the OS error number)
    Unavailable(i32),
}

impl fmt::Display for EntropyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => write!(f, "entropy read interrupted"),
            Self::Unavailable(errno) => write!(f, "entropy source unavailable (errno {})", errno),
        }
    }
}

/// How much of a drawn value came from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntropyQuality {
    /// Both reads failed; the value is zero
    None = 0,
    /// One of the two reads failed; half the bits are zero
    Partial = 1,
    /// Both reads succeeded
    Full = 2,
}

// ============================================================================
// SOURCE TRAIT
// ============================================================================

/// A source of random bytes
pub trait EntropySource {
    /// Fill `buf` with random bytes, returning how many were written
    ///
    /// Fewer bytes than requested is not an error; the caller keeps the
    /// bytes it got and leaves the rest zero.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, EntropyError>;
}

impl<S: EntropySource + ?Sized> EntropySource for &mut S {
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, EntropyError> {
        (**self).fill(buf)
    }
}

/// Read 32 random bits, retrying interrupted reads
///
/// Returns `None` if the source is unavailable or keeps getting interrupted.
pub fn read_u32<S: EntropySource + ?Sized>(source: &mut S) -> Option<u32> {
    let mut buf = [0u8; 4];

    for _ in 0..MAX_INTERRUPT_RETRIES {
        match source.fill(&mut buf) {
            Ok(_) => return Some(u32::from_le_bytes(buf)),
            Err(EntropyError::Interrupted) => continue,
            Err(err @ EntropyError::Unavailable(_)) => {
                log::warn!("aslr: {}, randomization degraded", err);
                return None;
            },
        }
    }

    log::warn!("aslr: entropy read kept being interrupted, randomization degraded");
    None
}

/// Draw a 64-bit random value from two independent 32-bit reads
///
/// The first read supplies the high half. A failed read contributes zeros.
pub fn draw_u64<S: EntropySource + ?Sized>(source: &mut S) -> (u64, EntropyQuality) {
    let hi = read_u32(source);
    let lo = read_u32(source);

    let quality = match (hi.is_some(), lo.is_some()) {
        (true, true) => EntropyQuality::Full,
        (false, false) => EntropyQuality::None,
        _ => EntropyQuality::Partial,
    };

    let value = ((hi.unwrap_or(0) as u64) << 32) | lo.unwrap_or(0) as u64;
    (value, quality)
}

// ============================================================================
// OS SOURCE
// ============================================================================

bitflags! {
    /// Flags accepted by `getrandom(2)`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GetRandomFlags: u32 {
        /// Fail with `EAGAIN` instead of blocking
        const NONBLOCK = 0x0001;
        /// Draw from the blocking true-entropy pool
        const RANDOM = 0x0002;
        /// Read the insecure pool, never blocks
        const INSECURE = 0x0004;
    }
}

/// Kernel entropy via `getrandom(2)`
#[derive(Debug, Clone, Copy)]
pub struct OsEntropy {
    flags: GetRandomFlags,
}

impl OsEntropy {
    /// Blocking true-entropy source (`GRND_RANDOM`)
    pub const fn new() -> Self {
        Self {
            flags: GetRandomFlags::RANDOM,
        }
    }

    /// Source with explicit `getrandom(2)` flags
    pub const fn with_flags(flags: GetRandomFlags) -> Self {
        Self { flags }
    }

    /// Flags passed on every read
    pub fn flags(&self) -> GetRandomFlags {
        self.flags
    }
}

impl Default for OsEntropy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
impl EntropySource for OsEntropy {
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, EntropyError> {
        // SAFETY: buf is a valid, writable region of buf.len() bytes.
        let rc = unsafe { libc::getrandom(buf.as_mut_ptr().cast(), buf.len(), self.flags.bits()) };

        if rc >= 0 {
            return Ok(rc as usize);
        }

        // SAFETY: errno is thread-local and valid right after the failed call.
        let errno = unsafe { *libc::__errno_location() };
        if errno == libc::EINTR {
            Err(EntropyError::Interrupted)
        } else {
            Err(EntropyError::Unavailable(errno))
        }
    }
}

/// `ENOSYS`: no `getrandom(2)` on this target
#[cfg(not(target_os = "linux"))]
const ENOSYS: i32 = 38;

#[cfg(not(target_os = "linux"))]
impl EntropySource for OsEntropy {
    fn fill(&mut self, _buf: &mut [u8]) -> Result<usize, EntropyError> {
        Err(EntropyError::Unavailable(ENOSYS))
    }
}

// ============================================================================
// DETERMINISTIC SOURCES
// ============================================================================

/// Source that always yields the same bytes
///
/// Every read fills the buffer from the start of `value.to_le_bytes()`,
/// repeating as needed, so a 32-bit read returns the low half of `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedEntropy(pub u64);

impl EntropySource for FixedEntropy {
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, EntropyError> {
        let bytes = self.0.to_le_bytes();
        for (dst, src) in buf.iter_mut().zip(bytes.iter().cycle()) {
            *dst = *src;
        }
        Ok(buf.len())
    }
}

/// Source that is never available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailingEntropy {
    /// Error number reported on every read
    pub errno: i32,
}

impl FailingEntropy {
    /// Failing source reporting `ENOSYS`
    pub const fn new() -> Self {
        Self { errno: 38 }
    }
}

impl Default for FailingEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for FailingEntropy {
    fn fill(&mut self, _buf: &mut [u8]) -> Result<usize, EntropyError> {
        Err(EntropyError::Unavailable(self.errno))
    }
}

// ============================================================================
// TESTS
// ============================================================================
