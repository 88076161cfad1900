//! Saturating fixed-point helpers - no unwrap, no panics

/// Basis-point denominator (100% = 10_000 bps)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Fixed-point 1.0 for scores, weights and sensitivity
pub const SCALE: u128 = 1_000_000;

/// Add u128 with saturation at MAX
pub fn add_u128(a: u128, b: u128) -> u128 {
    a.saturating_add(b)
}

/// Subtract u128 with saturation at 0
pub fn sub_u128(a: u128, b: u128) -> u128 {
    a.saturating_sub(b)
}

/// Multiply u128 with saturation
pub fn mul_u128(a: u128, b: u128) -> u128 {
    a.saturating_mul(b)
}

/// Divide u128 (returns 0 if divisor is 0)
pub fn div_u128(a: u128, b: u128) -> u128 {
    if b == 0 {
        0
    } else {
        a / b
    }
}

/// Distance between two values
pub fn abs_diff(a: u128, b: u128) -> u128 {
    if a > b { a - b } else { b - a }
}

/// floor(a * b / denom), falling back to a split computation when the
/// product overflows. Returns 0 when `denom` is 0.
pub fn mul_div(a: u128, b: u128, denom: u128) -> u128 {
    if denom == 0 {
        return 0;
    }
    match a.checked_mul(b) {
        Some(product) => product / denom,
        None => {
            let whole = mul_u128(a / denom, b);
            let rest = mul_u128(a % denom, b) / denom;
            add_u128(whole, rest)
        }
    }
}

/// Fee of `bps` basis points on `amount`, rounded down
pub fn bps_of(amount: u128, bps: u16) -> u128 {
    mul_div(amount, bps as u128, BPS_DENOMINATOR)
}
