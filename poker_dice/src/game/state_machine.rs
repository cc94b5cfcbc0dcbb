//! Game / round / turn state machine.
//!
//! [`GameMachine`] is pure and synchronous: it owns one game, its current
//! round and the round's turns, and turns player actions into a list of
//! [`GameTransition`]s. Credits, persistence, timers and event delivery are
//! applied by the lobby actor that drives the machine.

use log::debug;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

use super::{
    dice::{DiceRoller, Die},
    errors::{GameError, GameResult},
    models::{
        Game, GameEndReason, GameId, GameSnapshot, GameStatus, Round, RoundId, RoundStatus, Turn,
        TurnEnd, TurnStatus,
    },
    scoring::{Score, Scorer, best_players},
};
use crate::{auth::AccountId, config::GameRules};

/// Why a player left the game before it ended
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForfeitReason {
    /// Player left the lobby
    Left,
    /// Player could not cover the round bet
    CannotAnte,
}

/// A single state change produced by the machine
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameTransition {
    Started {
        game_id: GameId,
        players: Vec<AccountId>,
    },
    PlayerForfeited {
        player: AccountId,
        reason: ForfeitReason,
    },
    RoundOpened {
        round_id: RoundId,
        number: u8,
        bet: i64,
        pot: i64,
        order: Vec<AccountId>,
    },
    DiceRolled {
        player: AccountId,
        roll_count: u8,
        kept: Vec<usize>,
        dice: Vec<Die>,
        value: Score,
    },
    TurnFinished {
        player: AccountId,
        end: TurnEnd,
        value: Option<Score>,
        next_player: Option<AccountId>,
    },
    RoundClosed {
        round_id: RoundId,
        number: u8,
        winners: Vec<AccountId>,
        pot: i64,
        values: Vec<(AccountId, Option<Score>)>,
    },
    Ended {
        winners: Vec<AccountId>,
        reason: GameEndReason,
        round_wins: BTreeMap<AccountId, u32>,
    },
}

/// Split a pot evenly among winners.
///
/// Winners are given in rotation order; the remainder goes to the first one.
pub fn split_pot(pot: i64, winners: &[AccountId]) -> Vec<(AccountId, i64)> {
    let Some(count) = i64::try_from(winners.len()).ok().filter(|&n| n > 0) else {
        return vec![];
    };

    let share = pot / count;
    let remainder = pot % count;
    winners
        .iter()
        .enumerate()
        .map(|(idx, &winner)| {
            let amount = if idx == 0 { share + remainder } else { share };
            (winner, amount)
        })
        .collect()
}

pub struct GameMachine {
    game: Game,
    round: Option<Round>,
    rules: GameRules,
    scorer: Arc<dyn Scorer>,
    /// Bumped whenever a new turn becomes active
    turn_serial: u64,
}

impl GameMachine {
    pub fn new(game: Game, rules: GameRules, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            game,
            round: None,
            rules,
            scorer,
            turn_serial: 0,
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn is_ended(&self) -> bool {
        self.game.status == GameStatus::Ended
    }

    /// Active player and the serial identifying their turn
    pub fn active_turn(&self) -> Option<(AccountId, u64)> {
        if self.game.status != GameStatus::Running {
            return None;
        }
        self.round
            .as_ref()
            .filter(|round| !round.is_closed())
            .and_then(Round::active_turn)
            .map(|turn| (turn.player_id, self.turn_serial))
    }

    /// Whether the next round should be opened
    pub fn needs_round(&self) -> bool {
        self.game.status == GameStatus::Running
            && self.round.as_ref().is_none_or(Round::is_closed)
            && self.game.round_counter < self.game.total_rounds
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            game_id: self.game.id,
            status: self.game.status,
            players: self.game.players.clone(),
            round_number: self.game.round_counter,
            total_rounds: self.game.total_rounds,
            active_player: self.active_turn().map(|(player, _)| player),
            round_wins: self.game.round_wins.clone(),
            current_round: self.round.clone(),
            winners: self.game.winners.clone(),
        }
    }

    /// Waiting → Running
    pub fn start(&mut self) -> GameResult<Vec<GameTransition>> {
        if self.game.status != GameStatus::Waiting {
            return Err(GameError::AlreadyStarted);
        }

        self.game.status = GameStatus::Running;
        debug!("Game {} running with {:?}", self.game.id, self.game.players);
        Ok(vec![GameTransition::Started {
            game_id: self.game.id,
            players: self.game.players.clone(),
        }])
    }

    /// Open the next round with the players who covered the bet.
    ///
    /// Players missing from `paid` forfeit. If fewer than two players remain
    /// the game ends instead and no round is opened.
    pub fn open_round(
        &mut self,
        round_id: RoundId,
        paid: &[AccountId],
        time_budget_secs: u64,
    ) -> GameResult<Vec<GameTransition>> {
        if self.game.status != GameStatus::Running {
            return Err(GameError::NotRunning);
        }
        if !self.needs_round() {
            return Err(GameError::RoundInProgress);
        }
        let bet = self.game.min_credit;
        let seats = self.game.players.len();
        if i64::try_from(seats)
            .ok()
            .and_then(|seats| bet.checked_mul(seats))
            .is_none()
        {
            return Err(GameError::PotOverflow {
                bet,
                players: seats,
            });
        }

        let mut transitions = vec![];
        let unpaid: Vec<AccountId> = self
            .game
            .players
            .iter()
            .copied()
            .filter(|player| !paid.contains(player))
            .collect();
        for player in unpaid {
            self.game.players.retain(|&p| p != player);
            transitions.push(GameTransition::PlayerForfeited {
                player,
                reason: ForfeitReason::CannotAnte,
            });
        }

        if self.game.players.len() < 2 {
            transitions.extend(self.end_game(GameEndReason::Forfeit));
            return Ok(transitions);
        }

        self.game.round_counter += 1;
        let number = self.game.round_counter;
        let players = &self.game.players;
        let start = usize::from(number - 1) % players.len();
        let order: Vec<AccountId> = players[start..]
            .iter()
            .chain(&players[..start])
            .copied()
            .collect();

        // Fits: order is never longer than the seats checked above
        let pot = bet * order.len() as i64;
        let first = Turn::new(round_id, order[0]);
        self.round = Some(Round {
            id: round_id,
            game_id: self.game.id,
            number,
            bet,
            pot,
            status: RoundStatus::Open,
            winners: vec![],
            time_budget_secs,
            order: order.clone(),
            turns: vec![first],
        });
        self.turn_serial += 1;

        debug!(
            "Game {} round {number}/{} opened, order {order:?}",
            self.game.id, self.game.total_rounds
        );
        transitions.push(GameTransition::RoundOpened {
            round_id,
            number,
            bet,
            pot,
            order,
        });
        Ok(transitions)
    }

    /// End a running game between rounds without winners, used when the next
    /// round cannot be opened. No-op while a round is in play.
    pub fn abandon(&mut self) -> Vec<GameTransition> {
        if self.game.status != GameStatus::Running || !self.needs_round() {
            return vec![];
        }
        self.end_game(GameEndReason::Aborted)
    }

    /// Roll the dice, keeping the dice at `keep` positions of the previous roll
    pub fn roll(
        &mut self,
        player: AccountId,
        keep: &[usize],
        roller: &dyn DiceRoller,
    ) -> GameResult<Vec<GameTransition>> {
        self.check_actor(player)?;

        let dice_per_roll = self.rules.dice_per_roll;
        let max_rolls = self.rules.max_rolls_per_turn;
        let scorer = Arc::clone(&self.scorer);
        let turn = self.active_turn_mut()?;

        let previous = turn.last_roll().map(<[Die]>::to_vec);
        validate_hold(previous.as_deref(), keep)?;

        let mut fresh = roller.roll(dice_per_roll - keep.len()).into_iter();
        let mut dice = Vec::with_capacity(dice_per_roll);
        for position in 0..dice_per_roll {
            let die = match &previous {
                Some(previous) if keep.contains(&position) => Some(previous[position]),
                _ => fresh.next(),
            };
            dice.extend(die);
        }

        let value = scorer.score(&dice);
        turn.rolls.push(dice.clone());
        turn.roll_count += 1;
        turn.value = Some(value);
        let roll_count = turn.roll_count;

        let mut transitions = vec![GameTransition::DiceRolled {
            player,
            roll_count,
            kept: keep.to_vec(),
            dice,
            value,
        }];
        if roll_count >= max_rolls {
            transitions.extend(self.finish_turn(TurnEnd::RollsExhausted));
        }
        Ok(transitions)
    }

    /// End the active player's turn with their latest roll
    pub fn stand(&mut self, player: AccountId) -> GameResult<Vec<GameTransition>> {
        self.check_actor(player)?;
        Ok(self.finish_turn(TurnEnd::Stood))
    }

    /// Force the turn identified by `serial` to finish.
    ///
    /// A stale serial (the turn already ended) is ignored.
    pub fn time_out(&mut self, serial: u64) -> Vec<GameTransition> {
        match self.active_turn() {
            Some((player, active)) if active == serial => {
                debug!("Game {} turn of {player} timed out", self.game.id);
                self.finish_turn(TurnEnd::TimedOut)
            }
            _ => vec![],
        }
    }

    /// Remove a player who left the lobby while the game runs
    pub fn remove_player(&mut self, player: AccountId) -> GameResult<Vec<GameTransition>> {
        if self.game.status == GameStatus::Ended {
            return Err(GameError::NotRunning);
        }
        if !self.game.is_player(player) {
            return Err(GameError::NotAPlayer);
        }

        self.game.players.retain(|&p| p != player);
        let mut transitions = vec![GameTransition::PlayerForfeited {
            player,
            reason: ForfeitReason::Left,
        }];

        let mut was_active = false;
        if let Some(round) = self.round.as_mut().filter(|round| !round.is_closed()) {
            match round.turns.iter_mut().find(|turn| turn.player_id == player) {
                Some(turn) => {
                    was_active = turn.is_active();
                    turn.status = TurnStatus::Done(TurnEnd::Forfeited);
                }
                None => round.order.retain(|&p| p != player),
            }
        }

        if self.game.players.len() < 2 {
            transitions.extend(self.end_game(GameEndReason::Forfeit));
        } else if was_active {
            transitions.extend(self.advance(player, TurnEnd::Forfeited, None));
        } else if self.round_complete() {
            transitions.extend(self.close_round());
        }
        Ok(transitions)
    }

    fn check_actor(&self, player: AccountId) -> GameResult<()> {
        if self.game.status != GameStatus::Running {
            return Err(GameError::NotRunning);
        }
        let round = self
            .round
            .as_ref()
            .filter(|round| !round.is_closed())
            .ok_or(GameError::NoOpenRound)?;
        if !self.game.is_player(player) {
            return Err(GameError::NotAPlayer);
        }

        match round.active_turn() {
            Some(turn) if turn.player_id == player => Ok(()),
            _ if round.turn_of(player).is_some() => Err(GameError::TurnAlreadyFinished),
            _ => Err(GameError::NotYourTurn),
        }
    }

    fn active_turn_mut(&mut self) -> GameResult<&mut Turn> {
        self.round
            .as_mut()
            .and_then(Round::active_turn_mut)
            .ok_or(GameError::NoOpenRound)
    }

    fn round_complete(&self) -> bool {
        self.round.as_ref().is_some_and(|round| {
            !round.is_closed()
                && round.active_turn().is_none()
                && round.turns.len() >= round.order.len()
        })
    }

    fn finish_turn(&mut self, end: TurnEnd) -> Vec<GameTransition> {
        let Some(turn) = self.round.as_mut().and_then(Round::active_turn_mut) else {
            return vec![];
        };
        turn.status = TurnStatus::Done(end);
        let player = turn.player_id;
        let value = turn.value;
        self.advance(player, end, value)
    }

    /// Activate the next player of the round, or close it
    fn advance(
        &mut self,
        player: AccountId,
        end: TurnEnd,
        value: Option<Score>,
    ) -> Vec<GameTransition> {
        let Some(round) = self.round.as_mut() else {
            return vec![];
        };

        let next_player = round.order.get(round.turns.len()).copied();
        if let Some(next) = next_player {
            round.turns.push(Turn::new(round.id, next));
            self.turn_serial += 1;
        }

        let mut transitions = vec![GameTransition::TurnFinished {
            player,
            end,
            value,
            next_player,
        }];
        if next_player.is_none() {
            transitions.extend(self.close_round());
        }
        transitions
    }

    fn close_round(&mut self) -> Vec<GameTransition> {
        let Some(round) = self.round.as_ref() else {
            return vec![];
        };
        let values: Vec<(AccountId, Option<Score>)> = round
            .turns
            .iter()
            .filter(|turn| turn.counts())
            .map(|turn| (turn.player_id, turn.value))
            .collect();
        let winners = best_players(&values);

        let mut transitions = self.settle_round(winners, values);
        if self.game.round_counter >= self.game.total_rounds {
            transitions.extend(self.end_game(GameEndReason::RoundsPlayed));
        }
        transitions
    }

    fn settle_round(
        &mut self,
        winners: Vec<AccountId>,
        values: Vec<(AccountId, Option<Score>)>,
    ) -> Vec<GameTransition> {
        let Some(round) = self.round.as_mut().filter(|round| !round.is_closed()) else {
            return vec![];
        };

        round.status = RoundStatus::Closed;
        round.winners = winners.clone();
        for winner in &winners {
            *self.game.round_wins.entry(*winner).or_insert(0) += 1;
        }

        debug!(
            "Game {} round {} closed, winners {winners:?}",
            self.game.id, round.number
        );
        vec![GameTransition::RoundClosed {
            round_id: round.id,
            number: round.number,
            winners,
            pot: round.pot,
            values,
        }]
    }

    fn end_game(&mut self, reason: GameEndReason) -> Vec<GameTransition> {
        let mut transitions = vec![];

        if reason == GameEndReason::Forfeit {
            if let Some(turn) = self.round.as_mut().and_then(Round::active_turn_mut) {
                turn.status = TurnStatus::Done(TurnEnd::Aborted);
            }
            let remaining = self.game.players.clone();
            let values = self
                .round
                .as_ref()
                .map(|round| {
                    remaining
                        .iter()
                        .map(|&player| (player, round.turn_of(player).and_then(|t| t.value)))
                        .collect()
                })
                .unwrap_or_default();
            transitions.extend(self.settle_round(remaining, values));
        }

        let winners = match reason {
            GameEndReason::Forfeit => self.game.players.clone(),
            GameEndReason::Aborted => vec![],
            GameEndReason::RoundsPlayed => {
                let best = self
                    .game
                    .players
                    .iter()
                    .map(|player| self.round_wins_of(*player))
                    .max()
                    .unwrap_or(0);
                self.game
                    .players
                    .iter()
                    .copied()
                    .filter(|&player| self.round_wins_of(player) == best)
                    .collect()
            }
        };

        self.game.status = GameStatus::Ended;
        self.game.winners = winners.clone();
        self.game.end_reason = Some(reason);

        debug!("Game {} ended ({reason:?}), winners {winners:?}", self.game.id);
        transitions.push(GameTransition::Ended {
            winners,
            reason,
            round_wins: self.game.round_wins.clone(),
        });
        transitions
    }

    fn round_wins_of(&self, player: AccountId) -> u32 {
        self.game.round_wins.get(&player).copied().unwrap_or(0)
    }
}

fn validate_hold(previous: Option<&[Die]>, keep: &[usize]) -> GameResult<()> {
    if keep.is_empty() {
        return Ok(());
    }

    let previous = previous
        .ok_or_else(|| GameError::InvalidHold("no previous roll to keep dice from".to_string()))?;

    for (idx, &position) in keep.iter().enumerate() {
        if position >= previous.len() {
            return Err(GameError::InvalidHold(format!(
                "position {position} out of range"
            )));
        }
        if keep[..idx].contains(&position) {
            return Err(GameError::InvalidHold(format!(
                "position {position} kept twice"
            )));
        }
    }

    Ok(())
}
