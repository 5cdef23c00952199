//! Salsa20/8 core and scrypt's BlockMix.
//!
//! Blocks are handled as little-endian `u32` words: one Salsa block is 16
//! words (64 bytes) and a BlockMix input of `128 * r` bytes is `32 * r` words.
//!
//! The XOR of whole blocks and the Salsa20/8 feed-forward addition can run on
//! wide registers. [`Backend::scalar`] is the reference path; the vector
//! backends must produce identical words.

/// Words per 64-byte Salsa block.
pub const BLOCK_WORDS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(target_arch = "x86_64"), allow(dead_code))]
enum Kind {
    Scalar,
    Sse2,
    Avx2,
}

/// Implementation used for block XOR and word-wise addition.
///
/// Only constructible for instruction sets the running CPU supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backend(Kind);

impl Default for Backend {
    fn default() -> Self {
        Self::detect()
    }
}

impl Backend {
    pub const fn scalar() -> Self {
        Backend(Kind::Scalar)
    }

    /// Widest backend available on this CPU.
    pub fn detect() -> Self {
        Self::supported().last().copied().unwrap_or(Self::scalar())
    }

    /// Every backend usable on this CPU, scalar first.
    pub fn supported() -> Vec<Backend> {
        #[allow(unused_mut)]
        let mut backends = vec![Backend(Kind::Scalar)];
        #[cfg(target_arch = "x86_64")]
        {
            if std::arch::is_x86_feature_detected!("sse2") {
                backends.push(Backend(Kind::Sse2));
            }
            if std::arch::is_x86_feature_detected!("avx2") {
                backends.push(Backend(Kind::Avx2));
            }
        }
        backends
    }

    pub fn name(&self) -> &'static str {
        match self.0 {
            Kind::Scalar => "scalar",
            Kind::Sse2 => "sse2",
            Kind::Avx2 => "avx2",
        }
    }

    /// `dst ^= src`, word by word. Lengths must match and be a multiple of
    /// [`BLOCK_WORDS`].
    #[inline]
    pub fn xor(&self, dst: &mut [u32], src: &[u32]) {
        debug_assert_eq!(dst.len(), src.len());
        debug_assert_eq!(dst.len() % BLOCK_WORDS, 0);
        match self.0 {
            // SAFETY: the variant is only handed out after runtime detection.
            #[cfg(target_arch = "x86_64")]
            Kind::Avx2 => unsafe { x86::xor_avx2(dst, src) },
            #[cfg(target_arch = "x86_64")]
            Kind::Sse2 => unsafe { x86::xor_sse2(dst, src) },
            _ => {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d ^= s;
                }
            }
        }
    }

    /// `dst[i] = dst[i] + src[i] mod 2^32` over one block.
    #[inline]
    pub fn add(&self, dst: &mut [u32; BLOCK_WORDS], src: &[u32; BLOCK_WORDS]) {
        match self.0 {
            // SAFETY: as above.
            #[cfg(target_arch = "x86_64")]
            Kind::Avx2 => unsafe { x86::add_avx2(dst, src) },
            #[cfg(target_arch = "x86_64")]
            Kind::Sse2 => unsafe { x86::add_sse2(dst, src) },
            _ => {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = d.wrapping_add(*s);
                }
            }
        }
    }
}

#[inline(always)]
fn quarter_round(x: &mut [u32; BLOCK_WORDS], a: usize, b: usize, c: usize, d: usize) {
    x[b] ^= x[a].wrapping_add(x[d]).rotate_left(7);
    x[c] ^= x[b].wrapping_add(x[a]).rotate_left(9);
    x[d] ^= x[c].wrapping_add(x[b]).rotate_left(13);
    x[a] ^= x[d].wrapping_add(x[c]).rotate_left(18);
}

/// Salsa20/8 core: four double rounds, then the input is added back in.
pub fn salsa20_8(block: &mut [u32; BLOCK_WORDS], backend: Backend) {
    let mut x = *block;
    for _ in 0..4 {
        // columns
        quarter_round(&mut x, 0, 4, 8, 12);
        quarter_round(&mut x, 5, 9, 13, 1);
        quarter_round(&mut x, 10, 14, 2, 6);
        quarter_round(&mut x, 15, 3, 7, 11);
        // rows
        quarter_round(&mut x, 0, 1, 2, 3);
        quarter_round(&mut x, 5, 6, 7, 4);
        quarter_round(&mut x, 10, 11, 8, 9);
        quarter_round(&mut x, 15, 12, 13, 14);
    }
    backend.add(block, &x);
}

/// scrypt BlockMix with Salsa20/8.
///
/// `input` and `output` are `32 * r` words. Even-numbered intermediate blocks
/// go to the first half of `output`, odd-numbered ones to the second half.
pub fn block_mix(input: &[u32], output: &mut [u32], r: usize, backend: Backend) {
    debug_assert_eq!(input.len(), 2 * r * BLOCK_WORDS);
    debug_assert_eq!(output.len(), input.len());

    let mut acc = [0u32; BLOCK_WORDS];
    acc.copy_from_slice(&input[(2 * r - 1) * BLOCK_WORDS..]);

    for (i, lane) in input.chunks_exact(BLOCK_WORDS).enumerate() {
        backend.xor(&mut acc, lane);
        salsa20_8(&mut acc, backend);
        let pos = if i % 2 == 0 { i / 2 } else { r + i / 2 };
        output[pos * BLOCK_WORDS..(pos + 1) * BLOCK_WORDS].copy_from_slice(&acc);
    }
}

/// Reads little-endian words from `bytes` into `words`.
pub fn load_words(bytes: &[u8], words: &mut [u32]) {
    for (w, c) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *w = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
    }
}

/// Writes `words` back to `bytes` in little-endian order.
pub fn store_words(words: &[u32], bytes: &mut [u8]) {
    for (w, c) in words.iter().zip(bytes.chunks_exact_mut(4)) {
        c.copy_from_slice(&w.to_le_bytes());
    }
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use super::BLOCK_WORDS;
    use std::arch::x86_64::*;

    #[target_feature(enable = "sse2")]
    pub unsafe fn xor_sse2(dst: &mut [u32], src: &[u32]) {
        for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            unsafe {
                let dp = d.as_mut_ptr() as *mut __m128i;
                let v = _mm_xor_si128(
                    _mm_loadu_si128(dp),
                    _mm_loadu_si128(s.as_ptr() as *const __m128i),
                );
                _mm_storeu_si128(dp, v);
            }
        }
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn xor_avx2(dst: &mut [u32], src: &[u32]) {
        for (d, s) in dst.chunks_exact_mut(8).zip(src.chunks_exact(8)) {
            unsafe {
                let dp = d.as_mut_ptr() as *mut __m256i;
                let v = _mm256_xor_si256(
                    _mm256_loadu_si256(dp),
                    _mm256_loadu_si256(s.as_ptr() as *const __m256i),
                );
                _mm256_storeu_si256(dp, v);
            }
        }
    }

    #[target_feature(enable = "sse2")]
    pub unsafe fn add_sse2(dst: &mut [u32; BLOCK_WORDS], src: &[u32; BLOCK_WORDS]) {
        for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            unsafe {
                let dp = d.as_mut_ptr() as *mut __m128i;
                let v = _mm_add_epi32(
                    _mm_loadu_si128(dp),
                    _mm_loadu_si128(s.as_ptr() as *const __m128i),
                );
                _mm_storeu_si128(dp, v);
            }
        }
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn add_avx2(dst: &mut [u32; BLOCK_WORDS], src: &[u32; BLOCK_WORDS]) {
        for (d, s) in dst.chunks_exact_mut(8).zip(src.chunks_exact(8)) {
            unsafe {
                let dp = d.as_mut_ptr() as *mut __m256i;
                let v = _mm256_add_epi32(
                    _mm256_loadu_si256(dp),
                    _mm256_loadu_si256(s.as_ptr() as *const __m256i),
                );
                _mm256_storeu_si256(dp, v);
            }
        }
    }
}
