//! Dice and dice rollers.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Mutex};

/// A six-sided die showing one face
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Die(u8);

impl Die {
    pub const FACES: u8 = 6;

    #[must_use]
    pub const fn new(face: u8) -> Option<Self> {
        if face >= 1 && face <= Self::FACES {
            Some(Self(face))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn face(self) -> u8 {
        self.0
    }

    /// Build dice from faces, `None` if any face is out of range
    pub fn from_faces(faces: &[u8]) -> Option<Vec<Self>> {
        faces.iter().map(|&face| Self::new(face)).collect()
    }
}

impl TryFrom<u8> for Die {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("die face {value} out of range"))
    }
}

impl From<Die> for u8 {
    fn from(value: Die) -> Self {
        value.0
    }
}

impl fmt::Display for Die {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of fresh dice
pub trait DiceRoller: Send + Sync {
    fn roll(&self, count: usize) -> Vec<Die>;
}

/// Uniformly random dice from the thread RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDiceRoller;

impl DiceRoller for RandomDiceRoller {
    fn roll(&self, count: usize) -> Vec<Die> {
        let mut rng = rand::rng();
        (0..count)
            .map(|_| Die(rng.random_range(1..=Die::FACES)))
            .collect()
    }
}

/// Replays a fixed sequence of dice, wrapping around when exhausted.
///
/// Used for simulations and tests that need reproducible games.
#[derive(Debug)]
pub struct ScriptedDiceRoller {
    script: Vec<Die>,
    cursor: Mutex<usize>,
}

impl ScriptedDiceRoller {
    /// # Panics
    ///
    /// Panics if `script` is empty
    pub fn new(script: Vec<Die>) -> Self {
        assert!(!script.is_empty(), "dice script must not be empty");
        Self {
            script,
            cursor: Mutex::new(0),
        }
    }
}

impl DiceRoller for ScriptedDiceRoller {
    fn roll(&self, count: usize) -> Vec<Die> {
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        let mut dice = Vec::with_capacity(count);
        for _ in 0..count {
            dice.push(self.script[*cursor % self.script.len()]);
            *cursor += 1;
        }
        dice
    }
}
