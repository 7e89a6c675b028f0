use std::collections::HashMap;

use crate::player::{Player, PlayerId};
use crate::role::{Role, RolePoints};

/// Score one completed round. Pure: identical inputs produce identical
/// outputs, and nothing outside the returned map is touched.
///
/// King and Minister take their base values regardless of the verdict. The
/// Soldier and Thief swap values when the Soldier accuses the wrong seat:
/// a correct verdict pays each their own base value, an incorrect one pays
/// the Soldier the Thief's value and the Thief the Soldier's. Points move
/// between those two seats, they are never created or destroyed.
pub fn score_round(
    points: &RolePoints,
    assignment: &HashMap<PlayerId, Role>,
    verdict_correct: bool,
) -> HashMap<PlayerId, i64> {
    assignment
        .iter()
        .map(|(&id, &role)| {
            let earned = match role {
                Role::King | Role::Minister => points.base(role),
                Role::Soldier if verdict_correct => points.soldier,
                Role::Soldier => points.thief,
                Role::Thief if verdict_correct => points.thief,
                Role::Thief => points.soldier,
            };
            (id, earned)
        })
        .collect()
}

/// The player with strictly highest total. Exact ties go to the
/// earliest-joined seat: a deliberate, simple tie-break, `players` being in
/// join order.
pub fn winner(players: &[Player]) -> Option<&Player> {
    let mut best: Option<&Player> = None;
    for p in players {
        match best {
            Some(b) if p.total_points <= b.total_points => {},
            _ => best = Some(p),
        }
    }
    best
}
