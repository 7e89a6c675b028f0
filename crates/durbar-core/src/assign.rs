use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::player::PlayerId;
use crate::role::Role;
use crate::roster::SEAT_COUNT;

/// Role assignment called with other than four distinct seats. This is a
/// programming defect, never a runtime condition: callers check roster size
/// before dealing.
#[derive(Debug, PartialEq, Eq)]
pub struct SeatCountViolation {
    pub expected: usize,
    pub got: usize,
}

impl std::fmt::Display for SeatCountViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "role assignment requires {} distinct seats, got {}",
            self.expected, self.got
        )
    }
}

impl std::error::Error for SeatCountViolation {}

/// Deal the four roles over the four seats as a uniformly random bijection:
/// each of the 24 permutations equally likely.
///
/// Uses `SliceRandom::shuffle` (Fisher–Yates with uniform swap indices). A
/// sort with a random comparator does NOT produce a uniform permutation and
/// must never be substituted here.
pub fn assign_roles<R: Rng + ?Sized>(
    rng: &mut R,
    ids: &[PlayerId],
) -> Result<HashMap<PlayerId, Role>, SeatCountViolation> {
    let mut distinct = ids.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if ids.len() != SEAT_COUNT || distinct.len() != SEAT_COUNT {
        return Err(SeatCountViolation {
            expected: SEAT_COUNT,
            got: distinct.len().min(ids.len()),
        });
    }

    let mut roles = Role::ALL;
    roles.shuffle(rng);
    Ok(ids.iter().copied().zip(roles).collect())
}
