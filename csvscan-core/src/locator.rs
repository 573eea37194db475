/*!
Locating special characters.

The parser never looks at bytes one at a time. Instead, it asks a `Locate`
implementation for a bitmask of every special byte in the next window of
`WINDOW` bytes, and then visits only the positions that are set.

Every implementation in this module produces the same mask for the same
window. Picking one is purely a matter of speed, and that choice is made
exactly once when a `Locator` is built.
*/

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dialect::{Specials, MAX_SPECIALS};

/// The number of bytes examined by a single call to `Locate::locate`.
pub const WINDOW: usize = 32;

/// Locate special bytes in a window of input.
pub trait Locate {
    /// Return a mask where bit `i` is set if and only if `window[i]` is a
    /// special byte.
    ///
    /// `window` must not be longer than `WINDOW`. Bits at or beyond
    /// `window.len()` are never set.
    fn locate(&self, window: &[u8]) -> u32;
}

/// The scanning strategy used by a `Locator`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Strategy {
    /// Pick the fastest strategy supported by the current CPU.
    ///
    /// This is the default.
    Auto,
    /// Test each byte against a lookup table.
    Scalar,
    /// Compare eight bytes at a time using ordinary 64-bit arithmetic.
    Swar,
    /// Compare sixteen bytes at a time using SSE2. x86_64 only.
    Sse2,
    /// Compare thirty-two bytes at a time using AVX2. x86_64 only.
    Avx2,
}

impl Default for Strategy {
    fn default() -> Strategy {
        Strategy::Auto
    }
}

/// A portable locator that tests every byte against a 256 entry table.
#[derive(Clone, Debug)]
pub struct Scalar {
    specials: Specials,
}

impl Scalar {
    /// Create a new scalar locator for the given special bytes.
    pub fn new(specials: Specials) -> Scalar {
        Scalar { specials }
    }
}

impl Locate for Scalar {
    #[inline]
    fn locate(&self, window: &[u8]) -> u32 {
        debug_assert!(window.len() <= WINDOW);
        let mut mask = 0u32;
        for (i, &b) in window.iter().enumerate() {
            mask |= (self.specials.contains(b) as u32) << i;
        }
        mask
    }
}

const LO7: u64 = 0x7F7F_7F7F_7F7F_7F7F;
const ONES: u64 = 0x0101_0101_0101_0101;
const GATHER: u64 = 0x0102_0408_1020_4080;

/// A portable locator that compares a machine word at a time.
#[derive(Clone, Debug)]
pub struct Swar {
    scalar: Scalar,
    splats: [u64; MAX_SPECIALS],
    len: usize,
}

impl Swar {
    /// Create a new word-at-a-time locator for the given special bytes.
    pub fn new(specials: Specials) -> Swar {
        let mut splats = [0; MAX_SPECIALS];
        let bytes = specials.as_bytes();
        for (splat, &b) in splats.iter_mut().zip(bytes) {
            *splat = ONES.wrapping_mul(b as u64);
        }
        Swar { scalar: Scalar::new(specials), splats, len: bytes.len() }
    }

    /// Returns the high bit of every byte in `word` that is zero.
    ///
    /// Unlike the classic "has zero byte" trick, this has no false
    /// positives, so it can be used to compute exact positions.
    #[inline(always)]
    fn zero_bytes(word: u64) -> u64 {
        let nonzero = ((word & LO7).wrapping_add(LO7)) | word;
        !(nonzero | LO7)
    }

    /// Compress the high bit of each byte into the low 8 bits.
    #[inline(always)]
    fn movemask(high_bits: u64) -> u32 {
        ((high_bits >> 7).wrapping_mul(GATHER) >> 56) as u32
    }
}

impl Locate for Swar {
    #[inline]
    fn locate(&self, window: &[u8]) -> u32 {
        if window.len() < WINDOW {
            return self.scalar.locate(window);
        }
        let mut mask = 0u32;
        for (i, chunk) in window.chunks_exact(8).enumerate() {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            let word = u64::from_le_bytes(buf);
            let mut hits = 0u64;
            for &splat in &self.splats[..self.len] {
                hits |= Swar::zero_bytes(word ^ splat);
            }
            mask |= Swar::movemask(hits) << (i * 8);
        }
        mask
    }
}

/// A locator that uses SSE2 vector compares.
///
/// This can only be constructed when the CPU supports SSE2.
#[cfg(target_arch = "x86_64")]
#[derive(Clone, Debug)]
pub struct Sse2 {
    scalar: Scalar,
}

#[cfg(target_arch = "x86_64")]
impl Sse2 {
    /// Create a new SSE2 locator, if the current CPU supports it.
    pub fn new(specials: Specials) -> Option<Sse2> {
        if is_x86_feature_detected!("sse2") {
            Some(Sse2 { scalar: Scalar::new(specials) })
        } else {
            None
        }
    }

    #[target_feature(enable = "sse2")]
    unsafe fn locate_full(&self, window: &[u8]) -> u32 {
        use core::arch::x86_64::*;

        let p = window.as_ptr();
        let lo = _mm_loadu_si128(p as *const __m128i);
        let hi = _mm_loadu_si128(p.add(16) as *const __m128i);
        let mut lo_hits = _mm_setzero_si128();
        let mut hi_hits = _mm_setzero_si128();
        for &b in self.scalar.specials.as_bytes() {
            let needle = _mm_set1_epi8(b as i8);
            lo_hits = _mm_or_si128(lo_hits, _mm_cmpeq_epi8(lo, needle));
            hi_hits = _mm_or_si128(hi_hits, _mm_cmpeq_epi8(hi, needle));
        }
        let lo_mask = _mm_movemask_epi8(lo_hits) as u32 & 0xFFFF;
        let hi_mask = _mm_movemask_epi8(hi_hits) as u32 & 0xFFFF;
        lo_mask | (hi_mask << 16)
    }
}

#[cfg(target_arch = "x86_64")]
impl Locate for Sse2 {
    #[inline]
    fn locate(&self, window: &[u8]) -> u32 {
        if window.len() < WINDOW {
            return self.scalar.locate(window);
        }
        // SAFETY: SSE2 support was verified in the constructor and the
        // window has exactly WINDOW bytes, so both unaligned loads are in
        // bounds.
        unsafe { self.locate_full(window) }
    }
}

/// A locator that uses AVX2 vector compares.
///
/// This can only be constructed when the CPU supports AVX2.
#[cfg(target_arch = "x86_64")]
#[derive(Clone, Debug)]
pub struct Avx2 {
    scalar: Scalar,
}

#[cfg(target_arch = "x86_64")]
impl Avx2 {
    /// Create a new AVX2 locator, if the current CPU supports it.
    pub fn new(specials: Specials) -> Option<Avx2> {
        if is_x86_feature_detected!("avx2") {
            Some(Avx2 { scalar: Scalar::new(specials) })
        } else {
            None
        }
    }

    #[target_feature(enable = "avx2")]
    unsafe fn locate_full(&self, window: &[u8]) -> u32 {
        use core::arch::x86_64::*;

        let chunk = _mm256_loadu_si256(window.as_ptr() as *const __m256i);
        let mut hits = _mm256_setzero_si256();
        for &b in self.scalar.specials.as_bytes() {
            let needle = _mm256_set1_epi8(b as i8);
            hits = _mm256_or_si256(hits, _mm256_cmpeq_epi8(chunk, needle));
        }
        _mm256_movemask_epi8(hits) as u32
    }
}

#[cfg(target_arch = "x86_64")]
impl Locate for Avx2 {
    #[inline]
    fn locate(&self, window: &[u8]) -> u32 {
        if window.len() < WINDOW {
            return self.scalar.locate(window);
        }
        // SAFETY: AVX2 support was verified in the constructor and the
        // window has exactly WINDOW bytes.
        unsafe { self.locate_full(window) }
    }
}

/// A locator whose strategy was fixed when it was built.
#[derive(Clone)]
pub enum Locator {
    /// See `Scalar`.
    Scalar(Scalar),
    /// See `Swar`.
    Swar(Swar),
    /// See `Sse2`.
    #[cfg(target_arch = "x86_64")]
    Sse2(Sse2),
    /// See `Avx2`.
    #[cfg(target_arch = "x86_64")]
    Avx2(Avx2),
}

impl Locator {
    /// Build a locator for the given special bytes.
    ///
    /// When the requested strategy isn't supported by this CPU, the
    /// portable word-at-a-time strategy is used instead.
    pub fn new(specials: Specials, strategy: Strategy) -> Locator {
        match strategy {
            Strategy::Scalar => Locator::Scalar(Scalar::new(specials)),
            Strategy::Swar => Locator::Swar(Swar::new(specials)),
            Strategy::Sse2 => Locator::sse2(specials),
            Strategy::Avx2 => Locator::avx2(specials),
            Strategy::Auto => Locator::auto(specials),
        }
    }

    /// The strategy this locator actually uses.
    pub fn strategy(&self) -> Strategy {
        match *self {
            Locator::Scalar(_) => Strategy::Scalar,
            Locator::Swar(_) => Strategy::Swar,
            #[cfg(target_arch = "x86_64")]
            Locator::Sse2(_) => Strategy::Sse2,
            #[cfg(target_arch = "x86_64")]
            Locator::Avx2(_) => Strategy::Avx2,
        }
    }

    #[cfg(target_arch = "x86_64")]
    fn auto(specials: Specials) -> Locator {
        if let Some(avx2) = Avx2::new(specials) {
            return Locator::Avx2(avx2);
        }
        Locator::sse2(specials)
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn auto(specials: Specials) -> Locator {
        Locator::Swar(Swar::new(specials))
    }

    #[cfg(target_arch = "x86_64")]
    fn sse2(specials: Specials) -> Locator {
        match Sse2::new(specials) {
            Some(sse2) => Locator::Sse2(sse2),
            None => Locator::Swar(Swar::new(specials)),
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn sse2(specials: Specials) -> Locator {
        Locator::Swar(Swar::new(specials))
    }

    #[cfg(target_arch = "x86_64")]
    fn avx2(specials: Specials) -> Locator {
        match Avx2::new(specials) {
            Some(avx2) => Locator::Avx2(avx2),
            None => Locator::sse2(specials),
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn avx2(specials: Specials) -> Locator {
        Locator::Swar(Swar::new(specials))
    }
}

impl Locate for Locator {
    #[inline]
    fn locate(&self, window: &[u8]) -> u32 {
        match *self {
            Locator::Scalar(ref l) => l.locate(window),
            Locator::Swar(ref l) => l.locate(window),
            #[cfg(target_arch = "x86_64")]
            Locator::Sse2(ref l) => l.locate(window),
            #[cfg(target_arch = "x86_64")]
            Locator::Avx2(ref l) => l.locate(window),
        }
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Locator({:?})", self.strategy())
    }
}
