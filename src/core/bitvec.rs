//! Fixed-length packed bit vector.
//!
//! Outcome vectors ("which tests kill this mutant"), reach vectors and element
//! sets are all `BitVector`s. Bit `i` lives in byte `i / 8` under mask
//! `1 << (i % 8)`. Unused high bits of the last byte are always zero, so
//! derived equality and hashing compare exactly the logical bits.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::{Error, Result};

/// A fixed-length sequence of bits backed by packed bytes.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct BitVector {
    bytes: Vec<u8>,
    len: usize,
}

impl BitVector {
    /// Create an all-zero vector of `len` bits.
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len.div_ceil(8)],
            len,
        }
    }

    /// Create a vector from a slice of booleans (index 0 is bit 0).
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut bv = Self::new(bits.len());
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                bv.bytes[i / 8] |= 1 << (i % 8);
            }
        }
        bv
    }

    /// Create a vector of `len` bits with the listed positions set.
    pub fn from_ones(len: usize, ones: impl IntoIterator<Item = usize>) -> Result<Self> {
        let mut bv = Self::new(len);
        for i in ones {
            bv.set(i, true)?;
        }
        Ok(bv)
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the vector holds zero bits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of backing bytes, always `ceil(len / 8)`.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Raw packed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read one backing byte.
    pub fn byte(&self, index: usize) -> Result<u8> {
        self.bytes
            .get(index)
            .copied()
            .ok_or_else(|| Error::out_of_range(index, self.bytes.len()))
    }

    /// Read bit `i`.
    pub fn get(&self, i: usize) -> Result<bool> {
        if i >= self.len {
            return Err(Error::out_of_range(i, self.len));
        }
        Ok(self.bit(i))
    }

    /// Write bit `i`.
    pub fn set(&mut self, i: usize, value: bool) -> Result<()> {
        if i >= self.len {
            return Err(Error::out_of_range(i, self.len));
        }
        let mask = 1u8 << (i % 8);
        if value {
            self.bytes[i / 8] |= mask;
        } else {
            self.bytes[i / 8] &= !mask;
        }
        Ok(())
    }

    /// Bitwise AND of two equal-length vectors.
    pub fn and(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a & b)
    }

    /// Bitwise OR of two equal-length vectors.
    pub fn or(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a | b)
    }

    /// Bitwise complement.
    pub fn not(&self) -> Self {
        let mut out = Self {
            bytes: self.bytes.iter().map(|b| !b).collect(),
            len: self.len,
        };
        out.clear_tail();
        out
    }

    /// In-place OR, used to accumulate reach vectors.
    pub fn union_with(&mut self, other: &Self) -> Result<()> {
        self.check_len(other)?;
        for (a, b) in self.bytes.iter_mut().zip(&other.bytes) {
            *a |= b;
        }
        Ok(())
    }

    /// True iff every bit set in `self` is also set in `other`.
    pub fn is_subset_of(&self, other: &Self) -> Result<bool> {
        self.check_len(other)?;
        Ok(self.is_subset_of_unchecked(other))
    }

    /// True iff the two vectors share at least one set bit.
    pub fn intersects(&self, other: &Self) -> Result<bool> {
        self.check_len(other)?;
        Ok(self
            .bytes
            .iter()
            .zip(&other.bytes)
            .any(|(a, b)| a & b != 0))
    }

    /// Inclusion test for callers that already validated lengths.
    pub(crate) fn is_subset_of_unchecked(&self, other: &Self) -> bool {
        debug_assert_eq!(self.len, other.len);
        self.bytes
            .iter()
            .zip(&other.bytes)
            .all(|(a, b)| a & !b == 0)
    }

    /// Number of set bits.
    pub fn popcount(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// True if no bit is set.
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    /// Copy bits `[start, end)` into a fresh vector of length `end - start`.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(Error::invalid_argument(format!(
                "slice start {start} is past end {end}"
            )));
        }
        if end > self.len {
            return Err(Error::out_of_range(end, self.len));
        }
        let mut out = Self::new(end - start);
        for (j, i) in (start..end).enumerate() {
            if self.bit(i) {
                out.bytes[j / 8] |= 1 << (j % 8);
            }
        }
        Ok(out)
    }

    /// Gather the bits selected by `mask` into a vector of length
    /// `mask.popcount()`, keeping their relative order.
    ///
    /// Inclusion is preserved for any two vectors that are both subsets of
    /// `mask`, which is what makes per-block projections safe.
    pub fn compress(&self, mask: &Self) -> Result<Self> {
        self.check_len(mask)?;
        let mut out = Self::new(mask.popcount());
        for (j, i) in mask.ones().enumerate() {
            if self.bit(i) {
                out.bytes[j / 8] |= 1 << (j % 8);
            }
        }
        Ok(out)
    }

    /// Positions of set bits, ascending.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bytes.iter().enumerate().flat_map(|(byte_idx, &byte)| {
            let mut rest = byte;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(byte_idx * 8 + bit)
            })
        })
    }

    #[inline]
    pub(crate) fn bit(&self, i: usize) -> bool {
        self.bytes[i / 8] & (1 << (i % 8)) != 0
    }

    fn check_len(&self, other: &Self) -> Result<()> {
        if self.len != other.len {
            return Err(Error::length_mismatch(self.len, other.len));
        }
        Ok(())
    }

    fn zip_with(&self, other: &Self, op: impl Fn(u8, u8) -> u8) -> Result<Self> {
        self.check_len(other)?;
        Ok(Self {
            bytes: self
                .bytes
                .iter()
                .zip(&other.bytes)
                .map(|(&a, &b)| op(a, b))
                .collect(),
            len: self.len,
        })
    }

    fn clear_tail(&mut self) {
        let used = self.len % 8;
        if used != 0 {
            if let Some(last) = self.bytes.last_mut() {
                *last &= (1u8 << used) - 1;
            }
        }
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len {
            f.write_str(if self.bit(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({self})")
    }
}

impl FromStr for BitVector {
    type Err = Error;

    /// Parse a `0`/`1` string, first character is bit 0.
    fn from_str(s: &str) -> Result<Self> {
        let bits = s
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(Error::invalid_argument(format!(
                    "unexpected character {other:?} in bit string"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_bits(&bits))
    }
}

impl Serialize for BitVector {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv(s: &str) -> BitVector {
        s.parse().unwrap()
    }

    #[test]
    fn test_new_is_zero() {
        let v = BitVector::new(13);
        assert_eq!(v.len(), 13);
        assert_eq!(v.byte_len(), 2);
        assert!(v.is_zero());
        assert_eq!(v.popcount(), 0);
    }

    #[test]
    fn test_get_set() {
        let mut v = BitVector::new(10);
        v.set(0, true).unwrap();
        v.set(9, true).unwrap();
        assert!(v.get(0).unwrap());
        assert!(!v.get(1).unwrap());
        assert!(v.get(9).unwrap());
        v.set(9, false).unwrap();
        assert!(!v.get(9).unwrap());
    }

    #[test]
    fn test_get_set_out_of_range() {
        let mut v = BitVector::new(4);
        assert!(matches!(
            v.get(4),
            Err(Error::OutOfRange { index: 4, len: 4 })
        ));
        assert!(matches!(v.set(7, true), Err(Error::OutOfRange { .. })));
        assert!(v.is_zero());
        assert!(matches!(v.byte(1), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_and_or_not() {
        let a = bv("1100");
        let b = bv("1010");
        assert_eq!(a.and(&b).unwrap(), bv("1000"));
        assert_eq!(a.or(&b).unwrap(), bv("1110"));
        assert_eq!(a.not(), bv("0011"));
    }

    #[test]
    fn test_not_keeps_tail_clear() {
        let v = BitVector::new(3).not();
        assert_eq!(v.popcount(), 3);
        assert_eq!(v.as_bytes(), &[0b0000_0111]);
        assert_eq!(v, bv("111"));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let a = bv("110");
        let b = bv("1100");
        assert!(matches!(a.and(&b), Err(Error::InvalidArgument(_))));
        assert!(matches!(a.or(&b), Err(Error::InvalidArgument(_))));
        assert!(matches!(a.is_subset_of(&b), Err(Error::InvalidArgument(_))));
        assert!(matches!(a.intersects(&b), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_is_subset_of() {
        assert!(bv("1100").is_subset_of(&bv("1110")).unwrap());
        assert!(!bv("1110").is_subset_of(&bv("1100")).unwrap());
        assert!(bv("0000").is_subset_of(&bv("1010")).unwrap());
        assert!(bv("1010").is_subset_of(&bv("1010")).unwrap());
        assert!(!bv("0110").is_subset_of(&bv("1010")).unwrap());
    }

    #[test]
    fn test_popcount_spans_bytes() {
        let v = BitVector::from_ones(20, [0, 7, 8, 19]).unwrap();
        assert_eq!(v.popcount(), 4);
        assert_eq!(v.ones().collect::<Vec<_>>(), vec![0, 7, 8, 19]);
    }

    #[test]
    fn test_slice() {
        let v = bv("0110100111");
        assert_eq!(v.slice(1, 5).unwrap(), bv("1101"));
        assert_eq!(v.slice(3, 3).unwrap().len(), 0);
        assert!(matches!(v.slice(5, 2), Err(Error::InvalidArgument(_))));
        assert!(matches!(v.slice(2, 11), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_compress() {
        let mask = bv("101101");
        let v = bv("100100");
        assert_eq!(v.compress(&mask).unwrap(), bv("1010"));
    }

    #[test]
    fn test_intersects() {
        assert!(bv("0110").intersects(&bv("0010")).unwrap());
        assert!(!bv("0110").intersects(&bv("1001")).unwrap());
    }

    #[test]
    fn test_display_parse() {
        let v = bv("10011");
        assert_eq!(v.to_string(), "10011");
        assert_eq!(format!("{v:?}"), "BitVector(10011)");
        assert!("10x".parse::<BitVector>().is_err());
    }

    #[test]
    fn test_serialize_as_bit_string() {
        let json = serde_json::to_string(&bv("0101")).unwrap();
        assert_eq!(json, "\"0101\"");
    }
}
