// SPDX-License-Identifier: CC0-1.0

//! BLAKE-256 (14 rounds, no salt) as specified in the SHA-3 submission.

use core::fmt;

const BLOCK_SIZE: usize = 64;

const IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

#[rustfmt::skip]
const C: [u32; 16] = [
    0x243f6a88, 0x85a308d3, 0x13198a2e, 0x03707344,
    0xa4093822, 0x299f31d0, 0x082efa98, 0xec4e6c89,
    0x452821e6, 0x38d01377, 0xbe5466cf, 0x34e90c6c,
    0xc0ac29b7, 0xc97c50dd, 0x3f84d5b5, 0xb5470917,
];

#[rustfmt::skip]
const SIGMA: [[usize; 16]; 10] = [
    [ 0,  1,  2,  3,  4,  5,  6,  7,  8,  9, 10, 11, 12, 13, 14, 15],
    [14, 10,  4,  8,  9, 15, 13,  6,  1, 12,  0,  2, 11,  7,  5,  3],
    [11,  8, 12,  0,  5,  2, 15, 13, 10, 14,  3,  6,  7,  1,  9,  4],
    [ 7,  9,  3,  1, 13, 12, 11, 14,  2,  6,  5, 10,  4,  0, 15,  8],
    [ 9,  0,  5,  7,  2,  4, 10, 15, 14,  1, 11, 12,  6,  8,  3, 13],
    [ 2, 12,  6, 10,  0, 11,  8,  3,  4, 13,  7,  5, 15, 14,  1,  9],
    [12,  5,  1, 15, 14, 13,  4, 10,  0,  7,  6,  3,  9,  2,  8, 11],
    [13, 11,  7, 14, 12,  1,  3,  9,  5,  0, 15,  4,  8,  6,  2, 10],
    [ 6, 15, 14,  9, 11,  3,  0,  8, 12,  2, 13,  7,  1,  4, 10,  5],
    [10,  2,  8,  4,  7,  6,  1,  5, 15, 11,  9, 14,  3, 12, 13,  0],
];

const ROUNDS: usize = 14;

/// Engine to compute BLAKE-256 hash function.
#[derive(Clone)]
pub struct HashEngine {
    h: [u32; 8],
    buffer: [u8; BLOCK_SIZE],
    buffer_len: usize,
    /// Total number of message bytes absorbed so far.
    length: u64,
}

impl Default for HashEngine {
    fn default() -> Self {
        HashEngine {
            h: IV,
            buffer: [0; BLOCK_SIZE],
            buffer_len: 0,
            length: 0,
        }
    }
}

impl HashEngine {
    /// Creates a fresh engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes absorbed so far.
    pub fn n_bytes_hashed(&self) -> u64 {
        self.length
    }

    /// Adds data to the engine.
    pub fn input(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let take = core::cmp::min(BLOCK_SIZE - self.buffer_len, data.len());
            self.buffer[self.buffer_len..self.buffer_len + take].copy_from_slice(&data[..take]);
            self.buffer_len += take;
            self.length += take as u64;
            data = &data[take..];

            // Keep a full block buffered until more data arrives so that the
            // last message block is compressed by `finalize` with its padding.
            if self.buffer_len == BLOCK_SIZE && !data.is_empty() {
                let block = self.buffer;
                self.compress(&block, self.length * 8);
                self.buffer_len = 0;
            }
        }
    }

    /// Pads the message and returns the 32-byte digest.
    pub fn finalize(mut self) -> [u8; 32] {
        let bit_len = self.length * 8;

        if self.buffer_len == BLOCK_SIZE {
            let block = self.buffer;
            self.compress(&block, bit_len);
            self.buffer_len = 0;
        }

        let mut tail = [0u8; 2 * BLOCK_SIZE];
        let used = self.buffer_len;
        tail[..used].copy_from_slice(&self.buffer[..used]);
        tail[used] = 0x80;

        // Padding needs a second block when fewer than 9 bytes remain after the data.
        let blocks = if used < 56 { 1 } else { 2 };
        let end = blocks * BLOCK_SIZE;
        tail[end - 9] |= 0x01;
        tail[end - 8..end].copy_from_slice(&bit_len.to_be_bytes());

        let mut first = [0u8; BLOCK_SIZE];
        first.copy_from_slice(&tail[..BLOCK_SIZE]);
        // A block without message bits is compressed with a zero counter.
        let first_counter = if used == 0 { 0 } else { bit_len };
        self.compress(&first, first_counter);

        if blocks == 2 {
            let mut second = [0u8; BLOCK_SIZE];
            second.copy_from_slice(&tail[BLOCK_SIZE..]);
            self.compress(&second, 0);
        }

        let mut out = [0u8; 32];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.h.iter()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        out
    }

    fn compress(&mut self, block: &[u8; BLOCK_SIZE], counter: u64) {
        let mut m = [0u32; 16];
        for (word, chunk) in m.iter_mut().zip(block.chunks_exact(4)) {
            *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        let t0 = counter as u32;
        let t1 = (counter >> 32) as u32;

        let mut v = [0u32; 16];
        v[..8].copy_from_slice(&self.h);
        v[8..12].copy_from_slice(&C[..4]);
        v[12] = t0 ^ C[4];
        v[13] = t0 ^ C[5];
        v[14] = t1 ^ C[6];
        v[15] = t1 ^ C[7];

        for round in 0..ROUNDS {
            let s = &SIGMA[round % 10];
            g(&mut v, &m, s, 0, 0, 4, 8, 12);
            g(&mut v, &m, s, 1, 1, 5, 9, 13);
            g(&mut v, &m, s, 2, 2, 6, 10, 14);
            g(&mut v, &m, s, 3, 3, 7, 11, 15);
            g(&mut v, &m, s, 4, 0, 5, 10, 15);
            g(&mut v, &m, s, 5, 1, 6, 11, 12);
            g(&mut v, &m, s, 6, 2, 7, 8, 13);
            g(&mut v, &m, s, 7, 3, 4, 9, 14);
        }

        for i in 0..8 {
            self.h[i] ^= v[i] ^ v[i + 8];
        }
    }
}

#[allow(clippy::too_many_arguments)]
#[inline(always)]
fn g(
    v: &mut [u32; 16],
    m: &[u32; 16],
    s: &[usize; 16],
    i: usize,
    a: usize,
    b: usize,
    c: usize,
    d: usize,
) {
    let j = s[2 * i];
    let k = s[2 * i + 1];

    v[a] = v[a].wrapping_add(v[b]).wrapping_add(m[j] ^ C[k]);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(12);
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(m[k] ^ C[j]);
    v[d] = (v[d] ^ v[a]).rotate_right(8);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(7);
}

/// Output of the BLAKE-256 hash function.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Length of the hash, in bytes.
    pub const LEN: usize = 32;

    /// Hashes some bytes.
    pub fn hash(data: &[u8]) -> Self {
        let mut engine = Self::engine();
        engine.input(data);
        Self::from_engine(engine)
    }

    /// Constructs a new engine.
    pub fn engine() -> HashEngine {
        HashEngine::new()
    }

    /// Produces a hash from the current state of a given engine.
    pub fn from_engine(engine: HashEngine) -> Self {
        Hash(engine.finalize())
    }

    /// Constructs a hash from the underlying byte array.
    pub fn from_byte_array(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Returns the underlying byte array.
    pub fn to_byte_array(self) -> [u8; 32] {
        self.0
    }

    /// Returns a reference to the underlying byte array.
    pub fn as_byte_array(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl core::ops::Index<core::ops::RangeTo<usize>> for Hash {
    type Output = [u8];

    fn index(&self, index: core::ops::RangeTo<usize>) -> &[u8] {
        &self.0[index]
    }
}

impl fmt::LowerHex for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blake256::Hash({:x})", self)
    }
}
