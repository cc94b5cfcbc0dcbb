//! Pluggable combination scoring and winner selection.

use serde::{Deserialize, Serialize};

use super::dice::Die;
use crate::auth::AccountId;

/// Combination value of a roll; higher is better
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Score(pub u64);

/// Maps a roll to its combination value.
///
/// No scoring table is built into the engine; hosts plug in the ranking
/// their game variant uses.
pub trait Scorer: Send + Sync {
    fn score(&self, dice: &[Die]) -> Score;
}

impl<F> Scorer for F
where
    F: Fn(&[Die]) -> Score + Send + Sync,
{
    fn score(&self, dice: &[Die]) -> Score {
        self(dice)
    }
}

/// Players achieving the best value.
///
/// A player without any roll ranks below every scored player. Ties keep
/// the input order.
pub fn best_players(values: &[(AccountId, Option<Score>)]) -> Vec<AccountId> {
    let Some(best) = values.iter().map(|(_, value)| *value).max() else {
        return vec![];
    };

    values
        .iter()
        .filter(|(_, value)| *value == best)
        .map(|(player, _)| *player)
        .collect()
}
