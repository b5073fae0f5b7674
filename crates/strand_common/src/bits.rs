//! Fixed-width two's-complement bit vectors with HDL-style arithmetic.
//!
//! [`Bits`] is the value type of every simulated signal. A value has a fixed
//! positive width and is stored as little-endian `u64` words; bits above the
//! width are always zero. Operators follow Verilog promotion rules: the
//! result of a binary operation takes the wider operand's width and wraps.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, BitAnd, BitOr, BitXor, Mul, Not, Shl, Shr, Sub};

/// Number of bits per storage word.
const WORD_BITS: u32 = 64;

/// Errors produced when a value does not fit a fixed-width vector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WidthError {
    /// A vector was requested with zero width.
    #[error("bit width must be positive")]
    ZeroWidth,

    /// A value needs more bits than the destination provides.
    #[error("value {value} needs {required} bits but only {width} are available")]
    ValueTooWide {
        /// The offending value, rendered for display.
        value: String,
        /// The number of bits the value needs.
        required: u32,
        /// The number of bits available.
        width: u32,
    },

    /// A bit range does not lie inside the vector.
    #[error("bit range [{lo}, {hi}) is out of bounds for width {width}")]
    RangeOutOfBounds {
        /// Inclusive low bit.
        lo: u32,
        /// Exclusive high bit.
        hi: u32,
        /// Width of the vector being addressed.
        width: u32,
    },

    /// An extension was asked to produce fewer bits than it started with.
    #[error("cannot extend a {from}-bit value to {to} bits")]
    Narrowing {
        /// Original width.
        from: u32,
        /// Requested width.
        to: u32,
    },

    /// A truncation was asked to produce more bits than it started with.
    #[error("cannot truncate a {from}-bit value to {to} bits")]
    Widening {
        /// Original width.
        from: u32,
        /// Requested width.
        to: u32,
    },

    /// Two widths that must agree do not.
    #[error("width mismatch: expected {expected} bits, found {found}")]
    Mismatch {
        /// The width required by the destination.
        expected: u32,
        /// The width actually supplied.
        found: u32,
    },
}

/// A fixed-width bit vector with two's-complement interpretation.
///
/// Every mutation masks its result into range. Construction from an integer
/// fails with [`WidthError::ValueTooWide`] unless truncation is requested
/// explicitly through [`Bits::truncating`] or one of the `*_trunc` methods.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBits")]
pub struct Bits {
    width: u32,
    words: Vec<u64>,
}

/// Unchecked serialized form, validated through [`Bits::from_words`].
#[derive(Deserialize)]
struct RawBits {
    width: u32,
    words: Vec<u64>,
}

impl TryFrom<RawBits> for Bits {
    type Error = WidthError;

    fn try_from(raw: RawBits) -> Result<Self, Self::Error> {
        Bits::from_words(raw.width, &raw.words)
    }
}

impl Bits {
    /// Creates an all-zero vector of the given width.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero.
    pub fn zero(width: u32) -> Self {
        assert!(width > 0, "Bits width must be positive");
        Self {
            width,
            words: vec![0; word_count(width)],
        }
    }

    /// Creates an all-one vector of the given width.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero.
    pub fn ones(width: u32) -> Self {
        let mut b = Self::zero(width);
        b.words.iter_mut().for_each(|w| *w = u64::MAX);
        b.normalize();
        b
    }

    /// Creates a vector holding `value`, failing if it needs more than `width` bits.
    ///
    /// Negative values are stored in two's complement; `-8` fits in four bits,
    /// `-9` does not. Non-negative values must fit as unsigned numbers, so
    /// `15` also fits in four bits.
    pub fn new(width: u32, value: i128) -> Result<Self, WidthError> {
        if width == 0 {
            return Err(WidthError::ZeroWidth);
        }
        let required = required_bits(value);
        if required > width {
            return Err(WidthError::ValueTooWide {
                value: value.to_string(),
                required,
                width,
            });
        }
        Ok(Self::truncating(width, value))
    }

    /// Creates a vector holding the low `width` bits of `value`.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero.
    pub fn truncating(width: u32, value: i128) -> Self {
        let mut b = Self::zero(width);
        let raw = value as u128;
        let fill = if value < 0 { u64::MAX } else { 0 };
        for (i, w) in b.words.iter_mut().enumerate() {
            *w = match i {
                0 => raw as u64,
                1 => (raw >> 64) as u64,
                _ => fill,
            };
        }
        b.normalize();
        b
    }

    /// Creates a vector from an unsigned value, failing if it does not fit.
    pub fn from_u64(width: u32, value: u64) -> Result<Self, WidthError> {
        Self::new(width, i128::from(value))
    }

    /// Creates a single-bit vector from a boolean.
    pub fn from_bool(value: bool) -> Self {
        let mut b = Self::zero(1);
        b.words[0] = u64::from(value);
        b
    }

    /// Creates the narrowest vector (at least one bit) that holds `value`.
    pub fn fitting(value: u64) -> Self {
        let width = (WORD_BITS - value.leading_zeros()).max(1);
        let mut b = Self::zero(width);
        b.words[0] = value;
        b
    }

    /// Creates a vector from little-endian words.
    ///
    /// Missing words are zero. Fails if any bit at or above `width` is set.
    pub fn from_words(width: u32, words: &[u64]) -> Result<Self, WidthError> {
        if width == 0 {
            return Err(WidthError::ZeroWidth);
        }
        let mut b = Self::zero(width);
        for (dst, src) in b.words.iter_mut().zip(words) {
            *dst = *src;
        }
        let extra = words.iter().skip(b.words.len()).any(|w| *w != 0);
        let before = b.clone();
        b.normalize();
        if extra || b != before {
            let wide = Self {
                width: (words.len() as u32 * WORD_BITS).max(width),
                words: words.to_vec(),
            };
            return Err(WidthError::ValueTooWide {
                value: format!("0x{wide}"),
                required: wide.significant_bits(),
                width,
            });
        }
        Ok(b)
    }

    /// Returns the width in bits.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the little-endian storage words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Returns bit `index` as a boolean.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn bit(&self, index: u32) -> bool {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        (self.words[(index / WORD_BITS) as usize] >> (index % WORD_BITS)) & 1 == 1
    }

    /// Returns bit `index` as a new one-bit vector.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn get(&self, index: u32) -> Bits {
        Bits::from_bool(self.bit(index))
    }

    /// Returns bits `[lo, hi)` as a new vector of width `hi - lo`.
    ///
    /// # Panics
    ///
    /// Panics if the range is empty or extends past the width.
    pub fn slice(&self, lo: u32, hi: u32) -> Bits {
        if let Err(e) = self.check_range(lo, hi) {
            panic!("{e}");
        }
        let width = hi - lo;
        let mut b = Self {
            width,
            words: shr_words(&self.words, lo, word_count(width)),
        };
        b.normalize();
        b
    }

    /// Sets bit `index` to `value`, leaving all other bits unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn set_bit(&mut self, index: u32, value: bool) {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        let word = &mut self.words[(index / WORD_BITS) as usize];
        let mask = 1u64 << (index % WORD_BITS);
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Writes `value` into bits `[lo, hi)`, leaving other bits unchanged.
    ///
    /// Fails if the range is invalid or `value` has set bits at or above
    /// `hi - lo`.
    pub fn set_slice(&mut self, lo: u32, hi: u32, value: &Bits) -> Result<(), WidthError> {
        self.check_range(lo, hi)?;
        let width = hi - lo;
        let required = value.significant_bits();
        if required > width {
            return Err(WidthError::ValueTooWide {
                value: format!("0x{value}"),
                required,
                width,
            });
        }
        self.merge(lo, hi, value);
        Ok(())
    }

    /// Writes the low `hi - lo` bits of `value` into bits `[lo, hi)`.
    ///
    /// Fails only if the range is invalid.
    pub fn set_slice_trunc(&mut self, lo: u32, hi: u32, value: &Bits) -> Result<(), WidthError> {
        self.check_range(lo, hi)?;
        self.merge(lo, hi, value);
        Ok(())
    }

    /// Returns an error unless `[lo, hi)` is a non-empty range inside the width.
    pub fn check_range(&self, lo: u32, hi: u32) -> Result<(), WidthError> {
        if lo >= hi || hi > self.width {
            return Err(WidthError::RangeOutOfBounds {
                lo,
                hi,
                width: self.width,
            });
        }
        Ok(())
    }

    /// Returns the number of bits needed to hold this value as unsigned.
    ///
    /// Zero needs zero bits.
    pub fn significant_bits(&self) -> u32 {
        for (i, w) in self.words.iter().enumerate().rev() {
            if *w != 0 {
                return i as u32 * WORD_BITS + (WORD_BITS - w.leading_zeros());
            }
        }
        0
    }

    /// Returns `true` if every bit is zero.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Returns the most significant bit (the sign bit of the signed view).
    pub fn msb(&self) -> bool {
        self.bit(self.width - 1)
    }

    /// Returns the unsigned value if it fits in a `u64`.
    pub fn to_u64(&self) -> Option<u64> {
        if self.words[1..].iter().any(|w| *w != 0) {
            return None;
        }
        Some(self.words[0])
    }

    /// Returns the low 64 bits of the unsigned value.
    pub fn as_u64(&self) -> u64 {
        self.words[0]
    }

    /// Returns the signed (two's-complement) value if it fits in an `i64`.
    pub fn to_i64(&self) -> Option<i64> {
        let negative = self.msb();
        if self.width <= WORD_BITS {
            let raw = self.words[0];
            let value = if negative && self.width < WORD_BITS {
                raw | (u64::MAX << self.width)
            } else {
                raw
            };
            return Some(value as i64);
        }
        let fill = if negative { u64::MAX } else { 0 };
        let extended = self.sign_extended(word_count(self.width) as u32 * WORD_BITS);
        let low = extended.words[0];
        let upper_ok = extended.words[1..].iter().all(|w| *w == fill);
        let sign_ok = ((low >> 63) == 1) == negative;
        (upper_ok && sign_ok).then_some(low as i64)
    }

    /// Zero-extends to `width` bits.
    pub fn zext(&self, width: u32) -> Result<Bits, WidthError> {
        if width < self.width {
            return Err(WidthError::Narrowing {
                from: self.width,
                to: width,
            });
        }
        Ok(self.resized(width))
    }

    /// Sign-extends to `width` bits by replicating the most significant bit.
    pub fn sext(&self, width: u32) -> Result<Bits, WidthError> {
        if width < self.width {
            return Err(WidthError::Narrowing {
                from: self.width,
                to: width,
            });
        }
        Ok(self.sign_extended(width))
    }

    /// Keeps the low `width` bits.
    pub fn trunc(&self, width: u32) -> Result<Bits, WidthError> {
        if width == 0 {
            return Err(WidthError::ZeroWidth);
        }
        if width > self.width {
            return Err(WidthError::Widening {
                from: self.width,
                to: width,
            });
        }
        Ok(self.resized(width))
    }

    /// Concatenates `parts`, the first part being most significant.
    ///
    /// # Panics
    ///
    /// Panics if `parts` is empty.
    pub fn concat(parts: &[&Bits]) -> Bits {
        assert!(!parts.is_empty(), "cannot concatenate zero values");
        let width = parts.iter().map(|p| p.width).sum();
        let mut result = Bits::zero(width);
        let mut lo = 0;
        for part in parts.iter().rev() {
            result.merge(lo, lo + part.width, part);
            lo += part.width;
        }
        result
    }

    /// Adds with wraparound at the wider operand's width.
    pub fn wrapping_add(&self, rhs: &Bits) -> Bits {
        let width = self.width.max(rhs.width);
        let (a, b) = (self.resized(width), rhs.resized(width));
        let mut carry = false;
        let words = a
            .words
            .iter()
            .zip(&b.words)
            .map(|(x, y)| {
                let (s1, c1) = x.overflowing_add(*y);
                let (s2, c2) = s1.overflowing_add(u64::from(carry));
                carry = c1 || c2;
                s2
            })
            .collect();
        Self::with_words(width, words)
    }

    /// Subtracts with wraparound at the wider operand's width.
    pub fn wrapping_sub(&self, rhs: &Bits) -> Bits {
        let width = self.width.max(rhs.width);
        let (a, b) = (self.resized(width), rhs.resized(width));
        let mut borrow = false;
        let words = a
            .words
            .iter()
            .zip(&b.words)
            .map(|(x, y)| {
                let (d1, b1) = x.overflowing_sub(*y);
                let (d2, b2) = d1.overflowing_sub(u64::from(borrow));
                borrow = b1 || b2;
                d2
            })
            .collect();
        Self::with_words(width, words)
    }

    /// Multiplies, keeping the low bits at the wider operand's width.
    pub fn wrapping_mul(&self, rhs: &Bits) -> Bits {
        let width = self.width.max(rhs.width);
        let (a, b) = (self.resized(width), rhs.resized(width));
        let n = a.words.len();
        let mut out = vec![0u64; n];
        for i in 0..n {
            let mut carry: u128 = 0;
            for j in 0..(n - i) {
                let k = i + j;
                let t = u128::from(a.words[i]) * u128::from(b.words[j])
                    + u128::from(out[k])
                    + carry;
                out[k] = t as u64;
                carry = t >> 64;
            }
        }
        Self::with_words(width, out)
    }

    /// Shifts left by `amount`; shifting by the width or more yields zero.
    pub fn shl_by(&self, amount: u32) -> Bits {
        if amount >= self.width {
            return Bits::zero(self.width);
        }
        Self::with_words(self.width, shl_words(&self.words, amount, self.words.len()))
    }

    /// Logical right shift; shifting by the width or more yields zero.
    pub fn shr_by(&self, amount: u32) -> Bits {
        if amount >= self.width {
            return Bits::zero(self.width);
        }
        Self::with_words(self.width, shr_words(&self.words, amount, self.words.len()))
    }

    /// Arithmetic right shift; vacated bits copy the sign bit.
    pub fn ashr_by(&self, amount: u32) -> Bits {
        if !self.msb() || amount == 0 {
            return self.shr_by(amount);
        }
        if amount >= self.width {
            return Bits::ones(self.width);
        }
        let mut result = self.shr_by(amount);
        result.merge(self.width - amount, self.width, &Bits::ones(amount));
        result
    }

    /// Shifts left by a vector amount.
    pub fn shl_bits(&self, amount: &Bits) -> Bits {
        match shift_amount(amount) {
            Some(n) => self.shl_by(n),
            None => Bits::zero(self.width),
        }
    }

    /// Logical right shift by a vector amount.
    pub fn shr_bits(&self, amount: &Bits) -> Bits {
        match shift_amount(amount) {
            Some(n) => self.shr_by(n),
            None => Bits::zero(self.width),
        }
    }

    /// Compares as unsigned numbers after zero-extension to the wider width.
    pub fn ucmp(&self, other: &Bits) -> Ordering {
        let width = self.width.max(other.width);
        let (a, b) = (self.resized(width), other.resized(width));
        a.words.iter().rev().cmp(b.words.iter().rev())
    }

    /// Compares as signed numbers after sign-extension to the wider width.
    pub fn scmp(&self, other: &Bits) -> Ordering {
        match (self.msb(), other.msb()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => {
                let width = self.width.max(other.width);
                self.sign_extended(width)
                    .ucmp(&other.sign_extended(width))
            }
        }
    }

    /// Returns `true` if both vectors hold the same unsigned value,
    /// regardless of width.
    pub fn value_eq(&self, other: &Bits) -> bool {
        self.ucmp(other) == Ordering::Equal
    }

    /// Renders the value in binary, zero-padded to the width.
    pub fn to_bin_string(&self) -> String {
        (0..self.width)
            .rev()
            .map(|i| if self.bit(i) { '1' } else { '0' })
            .collect()
    }

    fn with_words(width: u32, words: Vec<u64>) -> Bits {
        let mut b = Self { width, words };
        b.normalize();
        b
    }

    fn resized(&self, width: u32) -> Bits {
        let mut words = self.words.clone();
        words.resize(word_count(width), 0);
        Self::with_words(width, words)
    }

    fn sign_extended(&self, width: u32) -> Bits {
        let mut result = self.resized(width);
        if width > self.width && self.msb() {
            result.merge(self.width, width, &Bits::ones(width - self.width));
        }
        result
    }

    /// Copies the low `hi - lo` bits of `value` into `[lo, hi)`. The range
    /// must already be validated.
    fn merge(&mut self, lo: u32, hi: u32, value: &Bits) {
        let n = self.words.len();
        let field_width = hi - lo;
        let mask = shl_words(&Bits::ones(field_width).words, lo, n);
        let field = shl_words(&value.resized(field_width).words, lo, n);
        for i in 0..n {
            self.words[i] = (self.words[i] & !mask[i]) | (field[i] & mask[i]);
        }
    }

    fn normalize(&mut self) {
        let rem = self.width % WORD_BITS;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }

    fn bitwise(&self, rhs: &Bits, op: impl Fn(u64, u64) -> u64) -> Bits {
        let width = self.width.max(rhs.width);
        let (a, b) = (self.resized(width), rhs.resized(width));
        let words = a.words.iter().zip(&b.words).map(|(x, y)| op(*x, *y)).collect();
        Self::with_words(width, words)
    }

    fn and_with(&self, rhs: &Bits) -> Bits {
        self.bitwise(rhs, |x, y| x & y)
    }

    fn or_with(&self, rhs: &Bits) -> Bits {
        self.bitwise(rhs, |x, y| x | y)
    }

    fn xor_with(&self, rhs: &Bits) -> Bits {
        self.bitwise(rhs, |x, y| x ^ y)
    }

    fn invert(&self) -> Bits {
        Self::with_words(self.width, self.words.iter().map(|w| !w).collect())
    }
}

/// Returns the number of `u64` words needed for `width` bits.
fn word_count(width: u32) -> usize {
    width.div_ceil(WORD_BITS) as usize
}

/// Minimal two's-complement width for a signed value; zero needs no bits.
fn required_bits(value: i128) -> u32 {
    if value >= 0 {
        128 - value.leading_zeros()
    } else {
        128 - (!value).leading_zeros() + 1
    }
}

/// Converts a vector shift amount to `u32`, or `None` if it is too large to matter.
fn shift_amount(amount: &Bits) -> Option<u32> {
    amount.to_u64().and_then(|n| u32::try_from(n).ok())
}

fn shl_words(words: &[u64], amount: u32, out_len: usize) -> Vec<u64> {
    let word_shift = (amount / WORD_BITS) as usize;
    let bit_shift = amount % WORD_BITS;
    let at = |i: usize| words.get(i).copied().unwrap_or(0);
    (0..out_len)
        .map(|i| {
            if i < word_shift {
                return 0;
            }
            let src = i - word_shift;
            let mut v = at(src) << bit_shift;
            if bit_shift > 0 && src > 0 {
                v |= at(src - 1) >> (WORD_BITS - bit_shift);
            }
            v
        })
        .collect()
}

fn shr_words(words: &[u64], amount: u32, out_len: usize) -> Vec<u64> {
    let word_shift = (amount / WORD_BITS) as usize;
    let bit_shift = amount % WORD_BITS;
    let at = |i: usize| words.get(i).copied().unwrap_or(0);
    (0..out_len)
        .map(|i| {
            let src = i + word_shift;
            let mut v = at(src) >> bit_shift;
            if bit_shift > 0 {
                v |= at(src + 1) << (WORD_BITS - bit_shift);
            }
            v
        })
        .collect()
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $func:ident) => {
        impl $trait<&Bits> for &Bits {
            type Output = Bits;

            fn $method(self, rhs: &Bits) -> Bits {
                self.$func(rhs)
            }
        }

        impl $trait<Bits> for Bits {
            type Output = Bits;

            fn $method(self, rhs: Bits) -> Bits {
                (&self).$func(&rhs)
            }
        }

        impl $trait<u64> for &Bits {
            type Output = Bits;

            fn $method(self, rhs: u64) -> Bits {
                self.$func(&Bits::fitting(rhs))
            }
        }

        impl $trait<u64> for Bits {
            type Output = Bits;

            fn $method(self, rhs: u64) -> Bits {
                (&self).$func(&Bits::fitting(rhs))
            }
        }
    };
}

impl_binary_op!(Add, add, wrapping_add);
impl_binary_op!(Sub, sub, wrapping_sub);
impl_binary_op!(Mul, mul, wrapping_mul);
impl_binary_op!(BitAnd, bitand, and_with);
impl_binary_op!(BitOr, bitor, or_with);
impl_binary_op!(BitXor, bitxor, xor_with);

impl Not for &Bits {
    type Output = Bits;

    fn not(self) -> Bits {
        self.invert()
    }
}

impl Not for Bits {
    type Output = Bits;

    fn not(self) -> Bits {
        self.invert()
    }
}

impl Shl<u32> for &Bits {
    type Output = Bits;

    fn shl(self, amount: u32) -> Bits {
        self.shl_by(amount)
    }
}

impl Shl<u32> for Bits {
    type Output = Bits;

    fn shl(self, amount: u32) -> Bits {
        self.shl_by(amount)
    }
}

impl Shr<u32> for &Bits {
    type Output = Bits;

    fn shr(self, amount: u32) -> Bits {
        self.shr_by(amount)
    }
}

impl Shr<u32> for Bits {
    type Output = Bits;

    fn shr(self, amount: u32) -> Bits {
        self.shr_by(amount)
    }
}

impl PartialEq<u64> for Bits {
    fn eq(&self, other: &u64) -> bool {
        self.to_u64() == Some(*other)
    }
}

impl From<bool> for Bits {
    fn from(value: bool) -> Self {
        Bits::from_bool(value)
    }
}

/// Zero-padded hexadecimal, one digit per started nibble.
impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.width.div_ceil(4);
        for d in (0..digits).rev() {
            let bit = d * 4;
            let nibble = (self.words[(bit / WORD_BITS) as usize] >> (bit % WORD_BITS)) & 0xF;
            write!(f, "{nibble:x}")?;
        }
        Ok(())
    }
}

impl fmt::LowerHex for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Binary for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bin_string())
    }
}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bits(w={}, 0x{self})", self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(width: u32, value: i128) -> Bits {
        Bits::new(width, value).unwrap()
    }

    // ---- Construction ----

    #[test]
    fn new_masks_into_range() {
        for width in [1u32, 3, 8, 63, 64, 65, 130] {
            for value in [0i128, 1, 5, 255, -1, -2, -128] {
                let expected = value.rem_euclid(1i128 << width.min(126));
                let v = Bits::truncating(width, value);
                if width <= 64 {
                    assert_eq!(i128::from(v.as_u64()), expected, "w={width} v={value}");
                }
                assert_eq!(v.width(), width);
            }
        }
    }

    #[test]
    fn new_accepts_unsigned_and_signed_extremes() {
        assert_eq!(b(4, 15).as_u64(), 15);
        assert_eq!(b(4, -8).as_u64(), 0b1000);
        assert_eq!(b(4, -1).as_u64(), 0b1111);
        assert_eq!(b(1, -1).as_u64(), 1);
    }

    #[test]
    fn new_rejects_values_too_wide() {
        let err = Bits::new(4, 16).unwrap_err();
        assert_eq!(
            err,
            WidthError::ValueTooWide {
                value: "16".into(),
                required: 5,
                width: 4
            }
        );
        assert!(Bits::new(4, -9).is_err());
    }

    #[test]
    fn zero_width_is_rejected() {
        assert_eq!(Bits::new(0, 0).unwrap_err(), WidthError::ZeroWidth);
        assert_eq!(Bits::from_words(0, &[]).unwrap_err(), WidthError::ZeroWidth);
    }

    #[test]
    fn truncating_drops_high_bits() {
        assert_eq!(Bits::truncating(4, 0x1F).as_u64(), 0xF);
        assert_eq!(Bits::truncating(8, -1).as_u64(), 0xFF);
    }

    #[test]
    fn negative_values_fill_wide_vectors() {
        let v = Bits::truncating(130, -1);
        assert_eq!(v, Bits::ones(130));
        assert_eq!(v.significant_bits(), 130);
    }

    #[test]
    fn from_words_checks_high_bits() {
        let v = Bits::from_words(70, &[u64::MAX, 0x3F]).unwrap();
        assert_eq!(v.significant_bits(), 70);
        assert!(Bits::from_words(70, &[0, 0x40]).is_err());
        assert!(Bits::from_words(8, &[1, 1]).is_err());
    }

    #[test]
    fn fitting_uses_minimal_width() {
        assert_eq!(Bits::fitting(0).width(), 1);
        assert_eq!(Bits::fitting(1).width(), 1);
        assert_eq!(Bits::fitting(15).width(), 4);
        assert_eq!(Bits::fitting(16).width(), 5);
    }

    // ---- Views ----

    #[test]
    fn signed_view_uses_top_bit() {
        assert_eq!(b(4, -3).to_i64(), Some(-3));
        assert_eq!(b(4, 5).to_i64(), Some(5));
        assert_eq!(b(64, -1).to_i64(), Some(-1));
        assert_eq!(Bits::truncating(100, -7).to_i64(), Some(-7));
        let big = Bits::from_words(100, &[0, 1]).unwrap();
        assert_eq!(big.to_i64(), None);
    }

    #[test]
    fn to_u64_rejects_wide_values() {
        assert_eq!(Bits::from_words(100, &[3, 0]).unwrap().to_u64(), Some(3));
        assert_eq!(Bits::from_words(100, &[3, 1]).unwrap().to_u64(), None);
    }

    // ---- Range access ----

    #[test]
    fn get_and_slice_return_new_values() {
        let v = b(8, 0b1011_0110);
        assert_eq!(v.get(1), Bits::from_bool(true));
        assert_eq!(v.get(0), Bits::from_bool(false));
        let s = v.slice(2, 6);
        assert_eq!(s.width(), 4);
        assert_eq!(s.as_u64(), 0b1101);
    }

    #[test]
    fn slice_across_word_boundary() {
        let mut v = Bits::zero(128);
        v.set_slice(60, 68, &b(8, 0xA5)).unwrap();
        assert_eq!(v.slice(60, 68).as_u64(), 0xA5);
        assert_eq!(v.words()[0] >> 60, 0x5);
        assert_eq!(v.words()[1], 0xA);
    }

    #[test]
    fn set_slice_leaves_other_bits() {
        let mut v = b(8, 0xFF);
        v.set_slice(2, 5, &b(3, 0b010)).unwrap();
        assert_eq!(v.as_u64(), 0b1110_1011);
        assert_eq!(v.slice(2, 5).as_u64(), 0b010);
    }

    #[test]
    fn set_slice_rejects_wide_values() {
        let mut v = b(8, 0);
        let err = v.set_slice(0, 2, &b(4, 0b100)).unwrap_err();
        assert!(matches!(err, WidthError::ValueTooWide { required: 3, width: 2, .. }));
        // Leading zeros in a wider operand are fine.
        v.set_slice(0, 2, &b(16, 0b11)).unwrap();
        assert_eq!(v.as_u64(), 0b11);
    }

    #[test]
    fn set_slice_trunc_masks_value() {
        let mut v = b(8, 0);
        v.set_slice_trunc(4, 6, &b(4, 0b1111)).unwrap();
        assert_eq!(v.as_u64(), 0b0011_0000);
    }

    #[test]
    fn set_slice_rejects_bad_range() {
        let mut v = b(8, 0);
        assert!(matches!(
            v.set_slice(4, 4, &b(1, 0)),
            Err(WidthError::RangeOutOfBounds { .. })
        ));
        assert!(v.set_slice(6, 9, &b(1, 0)).is_err());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn slice_out_of_range_panics() {
        b(4, 0).slice(2, 5);
    }

    #[test]
    fn set_bit_single() {
        let mut v = b(4, 0);
        v.set_bit(3, true);
        assert_eq!(v.as_u64(), 0b1000);
        v.set_bit(3, false);
        assert!(v.is_zero());
    }

    // ---- Concatenation and extension ----

    #[test]
    fn concat_first_is_most_significant() {
        let v = Bits::concat(&[&b(4, 0xA), &b(8, 0x5C), &b(1, 1)]);
        assert_eq!(v.width(), 13);
        assert_eq!(v.as_u64(), (0xA << 9) | (0x5C << 1) | 1);
    }

    #[test]
    fn zext_and_sext() {
        let v = b(4, -2);
        assert_eq!(v.zext(8).unwrap().as_u64(), 0x0E);
        assert_eq!(v.sext(8).unwrap().as_u64(), 0xFE);
        assert_eq!(b(4, 3).sext(8).unwrap().as_u64(), 3);
        assert_eq!(
            v.zext(2).unwrap_err(),
            WidthError::Narrowing { from: 4, to: 2 }
        );
    }

    #[test]
    fn sext_across_words() {
        let v = b(8, -1).sext(100).unwrap();
        assert_eq!(v, Bits::ones(100));
    }

    #[test]
    fn trunc_is_explicit() {
        assert_eq!(b(8, 0xAB).trunc(4).unwrap().as_u64(), 0xB);
        assert!(matches!(b(4, 0).trunc(8), Err(WidthError::Widening { .. })));
    }

    // ---- Arithmetic ----

    #[test]
    fn add_promotes_to_max_width_and_wraps() {
        let r = &b(4, 15) + &b(2, 1);
        assert_eq!(r.width(), 4);
        assert_eq!(r.as_u64(), 0);
        let r = b(4, 7) + 1;
        assert_eq!(r.as_u64(), 8);
    }

    #[test]
    fn add_carries_between_words() {
        let r = &Bits::from_words(128, &[u64::MAX, 0]).unwrap() + 1;
        assert_eq!(r.words(), &[0, 1]);
    }

    #[test]
    fn sub_wraps() {
        let r = b(4, 0) - 1;
        assert_eq!(r.as_u64(), 0xF);
        let r = &Bits::from_words(128, &[0, 1]).unwrap() - 1;
        assert_eq!(r.words(), &[u64::MAX, 0]);
    }

    #[test]
    fn mul_truncates_to_max_width() {
        assert_eq!((b(8, 20) * 13).as_u64(), (20 * 13) & 0xFF);
        let a = Bits::from_words(128, &[u64::MAX, 0]).unwrap();
        let r = &a * &a;
        // (2^64 - 1)^2 = 2^128 - 2^65 + 1
        assert_eq!(r.words(), &[1, u64::MAX - 1]);
    }

    #[test]
    fn bitwise_ops() {
        let x = b(4, 0b1100);
        let y = b(4, 0b1010);
        assert_eq!((&x & &y).as_u64(), 0b1000);
        assert_eq!((&x | &y).as_u64(), 0b1110);
        assert_eq!((&x ^ &y).as_u64(), 0b0110);
        assert_eq!((!&x).as_u64(), 0b0011);
        assert_eq!((b(2, 1) | b(8, 0x80)).width(), 8);
    }

    // ---- Shifts ----

    #[test]
    fn shifts_saturate_at_width() {
        let v = b(4, 0b0110);
        assert_eq!((&v << 1).as_u64(), 0b1100);
        assert_eq!((&v << 3).as_u64(), 0);
        assert_eq!((&v << 4).as_u64(), 0);
        assert_eq!((&v >> 1).as_u64(), 0b0011);
        assert_eq!((&v >> 9).as_u64(), 0);
        assert_eq!(v.shl_bits(&b(64, 1 << 40)).as_u64(), 0);
    }

    #[test]
    fn arithmetic_shift_keeps_sign() {
        let v = b(8, -16);
        assert_eq!(v.ashr_by(2).to_i64(), Some(-4));
        assert_eq!(v.ashr_by(20), Bits::ones(8));
        assert_eq!(b(8, 16).ashr_by(2).as_u64(), 4);
    }

    #[test]
    fn wide_shift_crosses_words() {
        let v = Bits::fitting(1).zext(130).unwrap();
        let shifted = v.shl_by(129);
        assert!(shifted.bit(129));
        assert_eq!(shifted.shr_by(129).as_u64(), 1);
    }

    // ---- Comparison ----

    #[test]
    fn unsigned_and_signed_compare() {
        assert_eq!(b(4, -1).ucmp(&b(4, 1)), Ordering::Greater);
        assert_eq!(b(4, -1).scmp(&b(4, 1)), Ordering::Less);
        assert_eq!(b(4, -3).scmp(&b(8, -2)), Ordering::Less);
        assert_eq!(b(4, 3).ucmp(&b(8, 3)), Ordering::Equal);
        assert!(b(4, 3).value_eq(&b(16, 3)));
        assert_ne!(b(4, 3), b(16, 3));
        assert_eq!(b(4, 3), 3u64);
    }

    // ---- Formatting ----

    #[test]
    fn display_is_zero_padded_hex() {
        assert_eq!(b(12, 0xA).to_string(), "00a");
        assert_eq!(b(5, 0x1F).to_string(), "1f");
        assert_eq!(format!("{:?}", b(4, 5)), "Bits(w=4, 0x5)");
        assert_eq!(format!("{:b}", b(5, 0b101)), "00101");
    }

    #[test]
    fn serde_roundtrip() {
        let v = Bits::from_words(70, &[0xDEAD_BEEF, 0x21]).unwrap();
        let json = serde_json::to_string(&v).unwrap();
        let back: Bits = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn deserialize_enforces_width() {
        let err = serde_json::from_str::<Bits>(r#"{"width":4,"words":[255]}"#).unwrap_err();
        assert!(err.to_string().contains("needs 8 bits"), "{err}");
        assert!(serde_json::from_str::<Bits>(r#"{"width":0,"words":[]}"#).is_err());
        let ok: Bits = serde_json::from_str(r#"{"width":4,"words":[9]}"#).unwrap();
        assert_eq!(ok.as_u64(), 9);
    }
}
