use std::sync::LazyLock;

use num_bigint::BigUint;
use num_integer::Integer;
use num_rational::Ratio;
use num_traits::{One, Zero};

use super::CompactTarget;
use crate::error::{ParseError, Result};

/// Exact difficulty ratio. Never rounded until rendered.
pub type Difficulty = Ratio<BigUint>;

/// Non-truncated genesis target, the pdifficulty numerator.
pub static GENESIS_TARGET: LazyLock<BigUint> = LazyLock::new(|| (BigUint::one() << 224u32) - 1u32);

/// Truncated genesis target (`0xffff * 256^26`), the bdifficulty numerator.
pub static GENESIS_TARGET_TRUNCATED: LazyLock<BigUint> =
    LazyLock::new(|| BigUint::from(0xffff_u32) << (8 * (0x1d - 3)));

/// Smallest exponent for which `256^(exponent - 3)` is a whole number.
pub const MIN_EXPONENT: u8 = 3;

/// Largest exponent whose target still fits 256 bits.
pub const MAX_EXPONENT: u8 = 32;

/// Significant digits kept when a ratio doesn't terminate.
pub const DECIMAL_PRECISION: usize = 28;

/// Convert compact bits (little-endian on the wire) to the full target.
///
/// The sign bit (0x800000 of the mantissa) is ignored, targets are treated as
/// unsigned. Exponents outside `[3, 32]` are rejected.
pub fn compute_target(bits: &[u8; 4]) -> Result<BigUint> {
    let compact = CompactTarget(*bits);
    let exponent = compact.exponent();
    if exponent < MIN_EXPONENT {
        return Err(ParseError::InvalidDifficultyEncoding {
            bits: *bits,
            reason: "exponent below 3",
        });
    }
    if exponent > MAX_EXPONENT {
        return Err(ParseError::InvalidDifficultyEncoding {
            bits: *bits,
            reason: "exponent above 32",
        });
    }

    Ok(BigUint::from(compact.mantissa()) << (8 * u32::from(exponent - MIN_EXPONENT)))
}

/// Pool difficulty: `GENESIS_TARGET / target`.
pub fn compute_pdifficulty(target: &BigUint) -> Result<Difficulty> {
    ratio(&GENESIS_TARGET, target)
}

/// Bitcoin difficulty: `GENESIS_TARGET_TRUNCATED / target`.
pub fn compute_bdifficulty(target: &BigUint) -> Result<Difficulty> {
    ratio(&GENESIS_TARGET_TRUNCATED, target)
}

fn ratio(numerator: &BigUint, target: &BigUint) -> Result<Difficulty> {
    if target.is_zero() {
        return Err(ParseError::DivisionByZero);
    }
    Ok(Ratio::new(numerator.clone(), target.clone()))
}

/// Render a target as `0x` followed by 64 zero-padded hex digits.
pub fn format_target(target: &BigUint) -> String {
    format!("0x{:0>64}", target.to_str_radix(16))
}

/// Render a ratio in plain decimal notation, rounded half-to-even to
/// `precision` significant digits.
///
/// Values that are exact at that precision lose their trailing zeros, never past
/// the units digit (`1`, `0.5`, `100`).
pub fn to_decimal_string(value: &Difficulty, precision: usize) -> String {
    let (numer, denom) = (value.numer(), value.denom());
    if numer.is_zero() {
        return "0".to_string();
    }
    let precision = precision.max(1);
    let ten = BigUint::from(10u32);
    let low = ten.pow(precision as u32 - 1);
    let high = &low * &ten;

    // Pick `scale` so that numer * 10^scale / denom has `precision` integer digits.
    let mut scale = precision as i64 - 1 - (digits(numer) as i64 - digits(denom) as i64);
    let (mut quotient, mut remainder) = scaled_div_rem(numer, denom, scale);
    while quotient >= high {
        scale -= 1;
        (quotient, remainder) = scaled_div_rem(numer, denom, scale);
    }
    while quotient < low {
        scale += 1;
        (quotient, remainder) = scaled_div_rem(numer, denom, scale);
    }

    if remainder.is_zero() {
        while scale > 0 && quotient.is_multiple_of(&ten) {
            quotient /= &ten;
            scale -= 1;
        }
    } else {
        let twice = &remainder << 1u32;
        let divisor = scaled_denominator(denom, scale);
        if twice > divisor || (twice == divisor && quotient.is_odd()) {
            quotient += 1u32;
            if quotient == high {
                quotient /= &ten;
                scale -= 1;
            }
        }
    }

    place_point(quotient.to_str_radix(10), scale)
}

/// `numer * 10^scale` divided by `denom`, with negative scales applied to the divisor.
fn scaled_div_rem(numer: &BigUint, denom: &BigUint, scale: i64) -> (BigUint, BigUint) {
    if scale >= 0 {
        (numer * BigUint::from(10u32).pow(scale as u32)).div_rem(denom)
    } else {
        numer.div_rem(&scaled_denominator(denom, scale))
    }
}

fn scaled_denominator(denom: &BigUint, scale: i64) -> BigUint {
    if scale >= 0 {
        denom.clone()
    } else {
        denom * BigUint::from(10u32).pow((-scale) as u32)
    }
}

fn digits(value: &BigUint) -> usize {
    value.to_str_radix(10).len()
}

fn place_point(mut digits: String, scale: i64) -> String {
    if scale <= 0 {
        digits.extend(std::iter::repeat_n('0', (-scale) as usize));
        return digits;
    }
    let scale = scale as usize;
    if digits.len() <= scale {
        let zeros = "0".repeat(scale - digits.len());
        format!("0.{zeros}{digits}")
    } else {
        let (int, frac) = digits.split_at(digits.len() - scale);
        format!("{int}.{frac}")
    }
}

/// How the sign bit of a compact encoding is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignPolicy {
    /// Ignore the bit, targets are unsigned.
    #[default]
    Ignore,
    /// Refuse encodings with the bit set.
    Reject,
}

/// Target and both difficulty ratios derived from one header's bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifficultyMetrics {
    pub target: BigUint,
    pub pdifficulty: Difficulty,
    pub bdifficulty: Difficulty,
}

impl DifficultyMetrics {
    pub fn from_bits(bits: &CompactTarget, policy: SignPolicy) -> Result<Self> {
        if policy == SignPolicy::Reject && bits.is_negative() {
            return Err(ParseError::InvalidDifficultyEncoding {
                bits: *bits.as_bytes(),
                reason: "sign bit set",
            });
        }
        let target = compute_target(bits.as_bytes())?;
        Ok(Self {
            pdifficulty: compute_pdifficulty(&target)?,
            bdifficulty: compute_bdifficulty(&target)?,
            target,
        })
    }

    pub fn target_hex(&self) -> String {
        format_target(&self.target)
    }

    pub fn pdifficulty_string(&self) -> String {
        to_decimal_string(&self.pdifficulty, DECIMAL_PRECISION)
    }

    pub fn bdifficulty_string(&self) -> String {
        to_decimal_string(&self.bdifficulty, DECIMAL_PRECISION)
    }
}
