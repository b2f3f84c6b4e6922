//! Conversion between logical bit sequences and packed bytes.
//!
//! Bits are packed most significant bit first. The last byte is padded with
//! zeros, which is why unpacking needs the exact bit count: padding is
//! otherwise indistinguishable from data.

use bitvec::prelude::*;

/// A packed bit sequence: the bytes, and how many of their bits are meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedBits {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl PackedBits {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Accumulates bits, most significant bit of each byte first.
#[derive(Debug, Default)]
pub struct BitPacker {
    bits: BitVec<u8, Msb0>,
}

impl BitPacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bits: BitVec::with_capacity(bits),
        }
    }

    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    pub fn extend(&mut self, bits: &BitSlice<u8, Msb0>) {
        self.bits.extend_from_bitslice(bits);
    }

    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    /// Zero-pad the final byte and hand over the bytes.
    pub fn finish(mut self) -> PackedBits {
        let bit_len = self.bits.len();
        self.bits.set_uninitialized(false);

        PackedBits {
            bytes: self.bits.into_vec(),
            bit_len,
        }
    }
}

/// Pack a sequence of bits.
pub fn pack(bits: impl IntoIterator<Item = bool>) -> PackedBits {
    let mut packer = BitPacker::new();
    for bit in bits {
        packer.push(bit);
    }
    packer.finish()
}

/// Yields the first `bit_len` bits of a byte buffer, most significant bit of
/// each byte first.
#[derive(Debug, Clone)]
pub struct BitUnpacker<'a> {
    bits: &'a BitSlice<u8, Msb0>,
    position: usize,
}

impl<'a> BitUnpacker<'a> {
    /// `None` if `bytes` holds fewer than `bit_len` bits.
    pub fn new(bytes: &'a [u8], bit_len: usize) -> Option<Self> {
        let bits = bytes.view_bits::<Msb0>().get(..bit_len)?;
        Some(Self { bits, position: 0 })
    }

    /// Bits yielded so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total bits this unpacker yields.
    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    pub fn remaining(&self) -> usize {
        self.bits.len() - self.position
    }
}

impl Iterator for BitUnpacker<'_> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        let bit = *self.bits.get(self.position)?;
        self.position += 1;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl ExactSizeIterator for BitUnpacker<'_> {}

/// Unpack the first `bit_len` bits of `bytes`; `None` if there aren't that many.
pub fn unpack(bytes: &[u8], bit_len: usize) -> Option<Vec<bool>> {
    BitUnpacker::new(bytes, bit_len).map(Iterator::collect)
}

/// Bytes needed to hold `bit_len` bits.
pub fn byte_len(bit_len: usize) -> usize {
    bit_len.div_ceil(8)
}
