//! Keccak-f[1600] permutation and sponge.
//!
//! The sponge is parameterised by an output size, which fixes the rate
//! (`(1600 - 2 * bits) / 8` bytes), and a domain suffix byte appended before
//! padding. Keystore MACs use the legacy Keccak suffix [`KECCAK_DOMAIN`], not
//! the NIST SHA-3 suffix [`SHA3_DOMAIN`]; the two are not interchangeable.

use zeroize::Zeroize;

/// Legacy Keccak suffix byte (pre-standardisation, used by keystore MACs).
pub const KECCAK_DOMAIN: u8 = 0x01;
/// NIST FIPS 202 SHA-3 suffix byte.
pub const SHA3_DOMAIN: u8 = 0x06;
/// NIST FIPS 202 SHAKE suffix byte.
pub const SHAKE_DOMAIN: u8 = 0x1F;

const LANES: usize = 25;
const STATE_BYTES: usize = LANES * 8;
const ROUNDS: usize = 24;

const ROUND_CONSTANTS: [u64; ROUNDS] = [
    0x0000_0000_0000_0001,
    0x0000_0000_0000_8082,
    0x8000_0000_0000_808A,
    0x8000_0000_8000_8000,
    0x0000_0000_0000_808B,
    0x0000_0000_8000_0001,
    0x8000_0000_8000_8081,
    0x8000_0000_0000_8009,
    0x0000_0000_0000_008A,
    0x0000_0000_0000_0088,
    0x0000_0000_8000_8009,
    0x0000_0000_8000_000A,
    0x0000_0000_8000_808B,
    0x8000_0000_0000_008B,
    0x8000_0000_0000_8089,
    0x8000_0000_0000_8003,
    0x8000_0000_0000_8002,
    0x8000_0000_0000_0080,
    0x0000_0000_0000_800A,
    0x8000_0000_8000_000A,
    0x8000_0000_8000_8081,
    0x8000_0000_0000_8080,
    0x0000_0000_8000_0001,
    0x8000_0000_8000_8008,
];

/// ρ rotation amounts, in the order lanes are visited by the π walk.
const RHO: [u32; 24] = [
    1, 3, 6, 10, 15, 21, 28, 36, 45, 55, 2, 14, 27, 41, 56, 8, 25, 43, 62, 18, 39, 61, 20, 44,
];

/// π lane walk starting from lane 1.
const PI: [usize; 24] = [
    10, 7, 11, 17, 18, 3, 5, 16, 8, 21, 24, 4, 15, 23, 19, 13, 12, 2, 20, 14, 22, 9, 6, 1,
];

/// Output sizes supported by the sponge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeccakBits {
    K128,
    K224,
    K256,
    K288,
    K384,
    K512,
}

impl KeccakBits {
    pub const fn bits(self) -> usize {
        match self {
            KeccakBits::K128 => 128,
            KeccakBits::K224 => 224,
            KeccakBits::K256 => 256,
            KeccakBits::K288 => 288,
            KeccakBits::K384 => 384,
            KeccakBits::K512 => 512,
        }
    }

    /// Sponge rate in bytes; the capacity is twice the output size.
    pub const fn rate(self) -> usize {
        (1600 - 2 * self.bits()) / 8
    }

    /// Digest length in bytes.
    pub const fn output_len(self) -> usize {
        self.bits() / 8
    }
}

/// Applies the 24-round Keccak-f[1600] permutation in place.
pub fn keccak_f1600(a: &mut [u64; LANES]) {
    for rc in ROUND_CONSTANTS {
        // θ
        let mut c = [0u64; 5];
        for x in 0..5 {
            c[x] = a[x] ^ a[x + 5] ^ a[x + 10] ^ a[x + 15] ^ a[x + 20];
        }
        for x in 0..5 {
            let d = c[(x + 4) % 5] ^ c[(x + 1) % 5].rotate_left(1);
            for y in 0..5 {
                a[x + 5 * y] ^= d;
            }
        }

        // ρ and π
        let mut carry = a[1];
        for (&rot, &lane) in RHO.iter().zip(PI.iter()) {
            let next = a[lane];
            a[lane] = carry.rotate_left(rot);
            carry = next;
        }

        // χ
        for y in 0..5 {
            let row = [a[5 * y], a[5 * y + 1], a[5 * y + 2], a[5 * y + 3], a[5 * y + 4]];
            for x in 0..5 {
                a[5 * y + x] = row[x] ^ (!row[(x + 1) % 5] & row[(x + 2) % 5]);
            }
        }

        // ι
        a[0] ^= rc;
    }
}

fn xor_block(state: &mut [u64; LANES], block: &[u8]) {
    for (lane, word) in state.iter_mut().zip(block.chunks_exact(8)) {
        *lane ^= u64::from_le_bytes([
            word[0], word[1], word[2], word[3], word[4], word[5], word[6], word[7],
        ]);
    }
}

/// Incremental sponge in the absorbing phase.
///
/// Input is buffered until a full rate-sized block is available, XORed into
/// the state lane by lane (little-endian words) and permuted.
/// [`Keccak1600::finalize`] pads and switches to the squeezing phase.
#[derive(Clone)]
pub struct Keccak1600 {
    state: [u64; LANES],
    rate: usize,
    domain: u8,
    buffer: [u8; STATE_BYTES],
    buffered: usize,
}

impl Keccak1600 {
    pub fn new(bits: KeccakBits, domain: u8) -> Self {
        Self {
            state: [0u64; LANES],
            rate: bits.rate(),
            domain,
            buffer: [0u8; STATE_BYTES],
            buffered: 0,
        }
    }

    pub fn rate(&self) -> usize {
        self.rate
    }

    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let take = (self.rate - self.buffered).min(data.len());
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&data[..take]);
            self.buffered += take;
            data = &data[take..];

            if self.buffered == self.rate {
                xor_block(&mut self.state, &self.buffer[..self.rate]);
                keccak_f1600(&mut self.state);
                self.buffered = 0;
            }
        }
    }

    /// Pads the trailing partial block and permutes once.
    ///
    /// The domain byte lands right after the last message byte; bit 63 of the
    /// last rate lane closes the multi-rate padding. When the trailing block
    /// is `rate - 1` bytes long both marks share the final byte.
    pub fn finalize(mut self) -> Squeezer {
        let rate = self.rate;
        self.buffer[self.buffered..rate].fill(0);
        self.buffer[self.buffered] ^= self.domain;
        self.buffer[rate - 1] ^= 0x80;

        xor_block(&mut self.state, &self.buffer[..rate]);
        keccak_f1600(&mut self.state);

        Squeezer::new(self.state, rate)
    }
}

impl Drop for Keccak1600 {
    fn drop(&mut self) {
        self.state.zeroize();
        self.buffer.zeroize();
    }
}

/// Sponge in the squeezing phase.
///
/// Holds one rate of extracted output; once it is used up the state is
/// permuted again and re-extracted, so any output length can be produced.
pub struct Squeezer {
    state: [u64; LANES],
    rate: usize,
    extracted: [u8; STATE_BYTES],
    offset: usize,
}

impl Squeezer {
    fn new(state: [u64; LANES], rate: usize) -> Self {
        let mut squeezer = Self {
            state,
            rate,
            extracted: [0u8; STATE_BYTES],
            offset: 0,
        };
        squeezer.extract();
        squeezer
    }

    fn extract(&mut self) {
        for (chunk, lane) in self.extracted[..self.rate]
            .chunks_exact_mut(8)
            .zip(self.state.iter())
        {
            chunk.copy_from_slice(&lane.to_le_bytes());
        }
        self.offset = 0;
    }

    /// Fills `out` with the next `out.len()` bytes of sponge output.
    pub fn squeeze(&mut self, out: &mut [u8]) {
        let mut written = 0;
        while written < out.len() {
            if self.offset == self.rate {
                keccak_f1600(&mut self.state);
                self.extract();
            }
            let take = (self.rate - self.offset).min(out.len() - written);
            out[written..written + take]
                .copy_from_slice(&self.extracted[self.offset..self.offset + take]);
            self.offset += take;
            written += take;
        }
    }
}

impl Drop for Squeezer {
    fn drop(&mut self) {
        self.state.zeroize();
        self.extracted.zeroize();
    }
}

/// One-shot sponge hash; returns exactly `bits.output_len()` bytes.
pub fn hash(bits: KeccakBits, domain: u8, message: &[u8]) -> Vec<u8> {
    let mut sponge = Keccak1600::new(bits, domain);
    sponge.update(message);
    let mut digest = vec![0u8; bits.output_len()];
    sponge.finalize().squeeze(&mut digest);
    digest
}

/// Legacy Keccak-256, as used for keystore MACs.
pub fn keccak256(message: &[u8]) -> [u8; 32] {
    let mut sponge = Keccak1600::new(KeccakBits::K256, KECCAK_DOMAIN);
    sponge.update(message);
    let mut digest = [0u8; 32];
    sponge.finalize().squeeze(&mut digest);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_BITS: [KeccakBits; 6] = [
        KeccakBits::K128,
        KeccakBits::K224,
        KeccakBits::K256,
        KeccakBits::K288,
        KeccakBits::K384,
        KeccakBits::K512,
    ];

    fn hex_digest(bits: KeccakBits, domain: u8, msg: &[u8]) -> String {
        hex::encode(hash(bits, domain, msg))
    }

    fn shake(bits: KeccakBits, msg: &[u8], len: usize) -> Vec<u8> {
        let mut sponge = Keccak1600::new(bits, SHAKE_DOMAIN);
        sponge.update(msg);
        let mut out = vec![0u8; len];
        sponge.finalize().squeeze(&mut out);
        out
    }

    #[test]
    fn keccak256_empty_string() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn keccak256_known_messages() {
        assert_eq!(
            hex::encode(keccak256(b"abc")),
            "4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
        );
        assert_eq!(
            hex::encode(keccak256(b"The quick brown fox jumps over the lazy dog")),
            "4d741b6f1eb29cb2a9b9911c82f56fa8d73b04959d3d9d222895df6c0b28aa15"
        );
    }

    #[test]
    fn keccak256_matches_generic_hash() {
        let msg = b"keystore mac input";
        assert_eq!(
            keccak256(msg).to_vec(),
            hash(KeccakBits::K256, KECCAK_DOMAIN, msg)
        );
    }

    #[test]
    fn sha3_vectors_share_the_permutation() {
        assert_eq!(
            hex_digest(KeccakBits::K256, SHA3_DOMAIN, b""),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
        assert_eq!(
            hex_digest(KeccakBits::K256, SHA3_DOMAIN, b"abc"),
            "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532"
        );
        assert_eq!(
            hex_digest(KeccakBits::K512, SHA3_DOMAIN, b""),
            "a69f73cca23a9ac5c8b567dc185a756e97c982164fe25859e0d1dcc1475c80a6\
             15b2123af1f5f94c11e3e9402c3ac558f500199d95b6d3e301758586281dcd26"
        );
    }

    #[test]
    fn sha3_256_multi_block_message() {
        // 200 bytes of 0xA3 spans two SHA3-256 blocks
        let msg = [0xA3u8; 200];
        assert_eq!(
            hex_digest(KeccakBits::K256, SHA3_DOMAIN, &msg),
            "79f38adec5c20307a98ef76e8324afbfd46cfd81b22e3973c65fa1bd9de31787"
        );
    }

    #[test]
    fn legacy_and_sha3_domains_differ() {
        assert_ne!(
            hash(KeccakBits::K256, KECCAK_DOMAIN, b"abc"),
            hash(KeccakBits::K256, SHA3_DOMAIN, b"abc")
        );
    }

    #[test]
    fn rates_follow_capacity() {
        assert_eq!(KeccakBits::K128.rate(), 168);
        assert_eq!(KeccakBits::K224.rate(), 144);
        assert_eq!(KeccakBits::K256.rate(), 136);
        assert_eq!(KeccakBits::K288.rate(), 128);
        assert_eq!(KeccakBits::K384.rate(), 104);
        assert_eq!(KeccakBits::K512.rate(), 72);
    }

    #[test]
    fn output_length_and_purity_at_rate_boundaries() {
        for bits in ALL_BITS {
            let rate = bits.rate();
            for len in [0, 1, rate - 1, rate, rate + 1, 2 * rate] {
                let msg: Vec<u8> = (0..len).map(|i| (i * 31 + 7) as u8).collect();
                let first = hash(bits, KECCAK_DOMAIN, &msg);
                let second = hash(bits, KECCAK_DOMAIN, &msg);
                assert_eq!(first.len(), bits.output_len(), "{bits:?} len {len}");
                assert_eq!(first, second, "{bits:?} len {len}");
            }
        }
    }

    #[test]
    fn shake_vectors() {
        assert_eq!(
            hex::encode(shake(KeccakBits::K128, b"", 32)),
            "7f9c2ba4e88f827d616045507605853ed73b8093f6efbc88eb1a6eacfa66ef26"
        );
        assert_eq!(
            hex::encode(shake(KeccakBits::K256, b"", 64)),
            "46b9dd2b0ba88d13233b3feb743eeb243fcd52ea62b81b82b50c27646ed5762f\
             d75dc4ddd8c0f200cb05019d67b592f6fc821c49479ab48640292eacb3b7c4be"
        );
    }

    #[test]
    fn squeeze_refills_past_one_rate() {
        let long = shake(KeccakBits::K128, b"refill", 500);
        let short = shake(KeccakBits::K128, b"refill", 32);
        assert_eq!(long.len(), 500);
        assert_eq!(&long[..32], &short[..]);

        let mut sponge = Keccak1600::new(KeccakBits::K128, SHAKE_DOMAIN);
        sponge.update(b"refill");
        let mut squeezer = sponge.finalize();
        let mut pieces = Vec::new();
        let mut chunk = [0u8; 7];
        while pieces.len() < 500 {
            squeezer.squeeze(&mut chunk);
            pieces.extend_from_slice(&chunk);
        }
        assert_eq!(&pieces[..500], &long[..]);
    }

    #[test]
    fn padding_when_trailing_block_is_one_short_of_rate() {
        let rate = KeccakBits::K256.rate();
        let a = hash(KeccakBits::K256, KECCAK_DOMAIN, &vec![0u8; rate - 1]);
        let b = hash(KeccakBits::K256, KECCAK_DOMAIN, &vec![0u8; rate]);
        assert_ne!(a, b);
    }

    mod proptest_suite {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn incremental_absorb_matches_one_shot(
                msg in prop::collection::vec(any::<u8>(), 0..600),
                split in 0usize..600,
            ) {
                let split = split.min(msg.len());
                let mut sponge = Keccak1600::new(KeccakBits::K256, KECCAK_DOMAIN);
                sponge.update(&msg[..split]);
                sponge.update(&msg[split..]);
                let mut digest = [0u8; 32];
                sponge.finalize().squeeze(&mut digest);
                prop_assert_eq!(digest, keccak256(&msg));
            }

            #[test]
            fn chunked_squeeze_matches_one_shot(
                msg in prop::collection::vec(any::<u8>(), 0..64),
                step in 1usize..200,
            ) {
                let expected = shake(KeccakBits::K256, &msg, 600);

                let mut sponge = Keccak1600::new(KeccakBits::K256, SHAKE_DOMAIN);
                sponge.update(&msg);
                let mut squeezer = sponge.finalize();
                let mut out = vec![0u8; 600];
                for piece in out.chunks_mut(step) {
                    squeezer.squeeze(piece);
                }
                prop_assert_eq!(out, expected);
            }
        }
    }
}
