// Back-off interval policy.
//
// Pure functions of (variant, retry streak, exponent cap, current slot) plus
// an injected random source. Only the medium-busy back-off differs by CSMA
// variant; binary exponential back-off is the universal collision-recovery
// rule.

use rand::Rng;

use crate::csma_interface::{CsmaType, SimTime};

// A draw range of 2^64 slots does not fit in the interval type; the exponent
// saturates here long before the configured cap of 1024 matters.
const MAX_INTERVAL_SHIFT: u32 = 63;

/// Reattempt slot for a node that sensed the medium busy.
///
/// The persistent variants resense on the very next slot; non-persistent
/// nodes draw a binary exponential interval from the current retry streak.
pub fn medium_busy_backoff(
    csma: CsmaType,
    retries: u32,
    max_exponent: u32,
    now: SimTime,
    rng: &mut impl Rng,
) -> SimTime {
    match csma {
        CsmaType::OnePersistent | CsmaType::PPersistent => now + 1,
        CsmaType::NonPersistent => now + exponential_interval(retries, max_exponent, rng),
    }
}

/// Reattempt slot after a collision, identical for every variant.
pub fn collision_backoff(
    retries: u32,
    max_exponent: u32,
    now: SimTime,
    rng: &mut impl Rng,
) -> SimTime {
    now + exponential_interval(retries, max_exponent, rng)
}

/// Uniform draw from [1, 2^min(retries, max_exponent)], both bounds
/// inclusive. A streak of 0 yields the degenerate range [1, 1].
fn exponential_interval(retries: u32, max_exponent: u32, rng: &mut impl Rng) -> u64 {
    let exponent = retries.min(max_exponent).min(MAX_INTERVAL_SHIFT);
    rng.gen_range(1..=1u64 << exponent)
}

// ============================================================================
// Unit Tests
// ============================================================================
