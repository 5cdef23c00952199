//! scrypt key derivation (RFC 7914).
//!
//! PBKDF2-HMAC-SHA256 stretches the password into `p` blocks of `128 * r`
//! bytes, each block is run through SMix, and a second PBKDF2 pass over the
//! mixed blocks produces the derived key. Both PBKDF2 passes use a single
//! iteration.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use super::salsa::{self, BLOCK_WORDS, Backend};
use crate::error::{RecoveryError, RecoveryResult};

type HmacSha256 = Hmac<Sha256>;

/// Upper bound for both `N * r` and `r * p`.
const MAX_COST: u64 = (1 << 24) - 1;
/// HMAC-SHA256 output length.
const HASH_LEN: usize = 32;

/// Validated scrypt cost parameters.
///
/// Construction fails before any memory is reserved, so a [`Scratch`] (and
/// its `128 * r * N` byte lookup table) only ever exists for valid values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScryptParams {
    n: u64,
    r: u32,
    p: u32,
}

impl ScryptParams {
    pub fn new(n: u64, r: u32, p: u32) -> RecoveryResult<Self> {
        if n < 2 || !n.is_power_of_two() {
            return Err(RecoveryError::InvalidKdfParams(format!(
                "N must be a power of two greater than 1, got {n}"
            )));
        }
        if r == 0 {
            return Err(RecoveryError::InvalidKdfParams("r must be >= 1".into()));
        }
        if p == 0 {
            return Err(RecoveryError::InvalidKdfParams("p must be >= 1".into()));
        }
        if n > MAX_COST / u64::from(r) {
            return Err(RecoveryError::InvalidKdfParams(format!(
                "N * r must not exceed {MAX_COST} (N = {n}, r = {r})"
            )));
        }
        if u64::from(r) > MAX_COST / u64::from(p) {
            return Err(RecoveryError::InvalidKdfParams(format!(
                "r * p must not exceed {MAX_COST} (r = {r}, p = {p})"
            )));
        }
        Ok(Self { n, r, p })
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn r(&self) -> u32 {
        self.r
    }

    pub fn p(&self) -> u32 {
        self.p
    }

    /// Size in bytes of the SMix lookup table.
    pub fn table_len(&self) -> usize {
        128 * self.r as usize * self.n as usize
    }
}

/// Reusable working memory for one scrypt computation at a time.
///
/// Holds the stretched blocks, the `X`/`Y` BlockMix buffers and the `V`
/// lookup table. A worker allocates one and reuses it for every candidate;
/// every buffer is fully rewritten before it is read. Contents are zeroized
/// on drop.
pub struct Scratch {
    params: ScryptParams,
    backend: Backend,
    blocks: Vec<u8>,
    xy: Vec<u32>,
    v: Vec<u32>,
}

impl Scratch {
    pub fn new(params: ScryptParams) -> Self {
        Self::with_backend(params, Backend::detect())
    }

    pub fn with_backend(params: ScryptParams, backend: Backend) -> Self {
        let r = params.r as usize;
        let p = params.p as usize;
        Self {
            params,
            backend,
            blocks: vec![0u8; 128 * r * p],
            xy: vec![0u32; 2 * 32 * r],
            v: vec![0u32; params.table_len() / 4],
        }
    }

    pub fn params(&self) -> &ScryptParams {
        &self.params
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.blocks.zeroize();
        self.xy.zeroize();
        self.v.zeroize();
    }
}

pub(crate) fn check_output_len(len: usize) -> RecoveryResult<()> {
    if len == 0 {
        return Err(RecoveryError::InvalidKdfParams(
            "derived key length must be > 0".into(),
        ));
    }
    if len as u64 > u64::from(u32::MAX) * HASH_LEN as u64 {
        return Err(RecoveryError::InvalidKdfParams(format!(
            "derived key length {len} is too long"
        )));
    }
    Ok(())
}

fn keyed_prf(password: &[u8]) -> RecoveryResult<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(password).map_err(|e| RecoveryError::Kdf(e.to_string()))
}

/// PBKDF2 over an already keyed HMAC, so both scrypt passes share one key
/// schedule.
fn pbkdf2_with(prf: &HmacSha256, salt: &[u8], rounds: u32, out: &mut [u8]) {
    for (i, chunk) in out.chunks_mut(HASH_LEN).enumerate() {
        let index = i as u32 + 1;

        let mut mac = prf.clone();
        mac.update(salt);
        mac.update(&index.to_be_bytes());
        let mut u = mac.finalize().into_bytes();

        let mut t = [0u8; HASH_LEN];
        t.copy_from_slice(&u);
        for _ in 1..rounds {
            let mut mac = prf.clone();
            mac.update(&u);
            u = mac.finalize().into_bytes();
            for (a, b) in t.iter_mut().zip(u.iter()) {
                *a ^= b;
            }
        }

        chunk.copy_from_slice(&t[..chunk.len()]);
        t.zeroize();
    }
}

/// PBKDF2-HMAC-SHA256 filling `out`.
pub fn pbkdf2_hmac_sha256(
    password: &[u8],
    salt: &[u8],
    rounds: u32,
    out: &mut [u8],
) -> RecoveryResult<()> {
    if rounds == 0 {
        return Err(RecoveryError::InvalidKdfParams(
            "PBKDF2 iteration count must be >= 1".into(),
        ));
    }
    check_output_len(out.len())?;
    let prf = keyed_prf(password)?;
    pbkdf2_with(&prf, salt, rounds, out);
    Ok(())
}

/// scrypt into `output`, allocating fresh working memory.
pub fn scrypt(
    password: &[u8],
    salt: &[u8],
    params: &ScryptParams,
    output: &mut [u8],
) -> RecoveryResult<()> {
    check_output_len(output.len())?;
    let mut scratch = Scratch::new(*params);
    scrypt_with(&mut scratch, password, salt, output)
}

/// scrypt into `output`, reusing `scratch`.
pub fn scrypt_with(
    scratch: &mut Scratch,
    password: &[u8],
    salt: &[u8],
    output: &mut [u8],
) -> RecoveryResult<()> {
    check_output_len(output.len())?;
    let prf = keyed_prf(password)?;

    let r = scratch.params.r as usize;
    let n = scratch.params.n as usize;
    let Scratch {
        backend,
        blocks,
        xy,
        v,
        ..
    } = scratch;

    pbkdf2_with(&prf, salt, 1, blocks);
    for block in blocks.chunks_exact_mut(128 * r) {
        smix(block, r, n, v, xy, *backend);
    }
    pbkdf2_with(&prf, blocks, 1, output);

    Ok(())
}

/// SMix: fill `v` with successive BlockMix states, then mix `N` pseudo-randomly
/// chosen entries back in.
fn smix(block: &mut [u8], r: usize, n: usize, v: &mut [u32], xy: &mut [u32], backend: Backend) {
    let len = 32 * r;
    let (mut x, mut y) = xy.split_at_mut(len);
    salsa::load_words(block, x);

    for slot in v.chunks_exact_mut(len) {
        slot.copy_from_slice(x);
        salsa::block_mix(x, y, r, backend);
        std::mem::swap(&mut x, &mut y);
    }

    for _ in 0..n {
        // integerify: first word of the last 64-byte lane
        let j = x[(2 * r - 1) * BLOCK_WORDS] as usize & (n - 1);
        backend.xor(x, &v[j * len..(j + 1) * len]);
        salsa::block_mix(x, y, r, backend);
        std::mem::swap(&mut x, &mut y);
    }

    salsa::store_words(x, block);
}
