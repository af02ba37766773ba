//! Turn loop, rematch negotiation and result recording for one pair of players
//!
//! A match owns both player connections from the moment their lobby fills
//! until both are closed. Each game inside the match is a fresh
//! [`GameSession`] over the same two connections; the match loops while both
//! players keep asking for a rematch.
//!
//! Every read from a player is bounded by the turn timeout. A timeout is an
//! ordinary outcome: during a turn it loses the game, during the rematch
//! question it counts as "no", during the name prompt it means "Unknown".

use crate::dictionary::WordValidator;
use crate::game::WordChain;
use crate::player::{PlayerHandle, Received};
use crate::records::{RecordStore, UNKNOWN_PLAYER};
use log::{debug, info, warn};
use shared::{is_rematch_yes, EndReason, GameMessage, TurnSubmission, HIGH_SCORE_COUNT};
use std::sync::Arc;
use std::time::Duration;

/// Collaborators every session needs
pub struct GameContext {
    pub validator: Arc<dyn WordValidator>,
    pub records: Arc<RecordStore>,
    pub turn_timeout: Duration,
}

impl GameContext {
    pub fn new(
        validator: Arc<dyn WordValidator>,
        records: Arc<RecordStore>,
        turn_timeout: Duration,
    ) -> Self {
        Self {
            validator,
            records,
            turn_timeout,
        }
    }
}

/// A player seated in a match: connection plus the name used in the lobby
#[derive(Debug, Clone)]
pub struct Seat {
    pub name: String,
    pub handle: PlayerHandle,
}

/// How one game ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutcome {
    /// A rule violation or timeout produced a loser
    Decided {
        loser: usize,
        reason: EndReason,
        round_num: u32,
    },
    /// A player's connection went away mid-game
    Abandoned { by: usize },
}

pub struct GameSession<'a> {
    seats: &'a [Seat; 2],
    ctx: &'a GameContext,
    chain: WordChain,
}

impl<'a> GameSession<'a> {
    pub fn new(seats: &'a [Seat; 2], ctx: &'a GameContext) -> Self {
        Self {
            seats,
            ctx,
            chain: WordChain::new(),
        }
    }

    pub fn chain(&self) -> &WordChain {
        &self.chain
    }

    fn player(&self, index: usize) -> &PlayerHandle {
        &self.seats[index].handle
    }

    /// Runs turns until someone loses or disconnects
    pub async fn play(&mut self) -> GameOutcome {
        let seconds = self.ctx.turn_timeout.as_secs().max(1);

        loop {
            let current = self.chain.current_turn;
            let other = self.chain.other_turn();

            let prompt = GameMessage::TurnPrompt {
                required: self.chain.last_letter,
                seconds,
            };
            if !self.player(current).send_best_effort(prompt).await {
                return GameOutcome::Abandoned { by: current };
            }
            self.chain.begin_turn();

            let line = match self.player(current).recv_line_timeout(self.ctx.turn_timeout).await {
                Received::Line(line) => line,
                Received::TimedOut => return self.lose(EndReason::Timeout),
                Received::Closed => return GameOutcome::Abandoned { by: current },
            };

            let word = match TurnSubmission::parse(&line) {
                TurnSubmission::TimerExpired => return self.lose(EndReason::Timeout),
                TurnSubmission::Empty => return self.lose(EndReason::EmptySubmission),
                TurnSubmission::Word(word) => word,
            };

            match self.chain.submit(&word, self.ctx.validator.as_ref()) {
                Ok(accepted) => {
                    debug!("Player {} played '{}'", current + 1, accepted);
                    if !self.player(current).send_best_effort(GameMessage::WordAccepted).await {
                        return GameOutcome::Abandoned { by: current };
                    }
                    let notice = GameMessage::OpponentMove { word: accepted };
                    if !self.player(other).send_best_effort(notice).await {
                        return GameOutcome::Abandoned { by: other };
                    }
                }
                Err(reason) => return self.lose(reason),
            }
        }
    }

    fn lose(&self, reason: EndReason) -> GameOutcome {
        GameOutcome::Decided {
            loser: self.chain.current_turn,
            reason,
            round_num: self.chain.round_num,
        }
    }
}

/// Drives games between two seated players until they stop rematching, then
/// records the last result and closes both connections.
pub async fn run_match(seats: [Seat; 2], ctx: Arc<GameContext>) {
    info!(
        "Match starting: {} ({}) vs {} ({})",
        seats[0].name,
        seats[0].handle.peer(),
        seats[1].name,
        seats[1].handle.peer()
    );
    // Tracks which seats can still be reached
    let mut connected = [true, true];

    for (index, seat) in seats.iter().enumerate() {
        let welcome = GameMessage::Welcome {
            player_number: index + 1,
        };
        if !seat.handle.send_best_effort(welcome).await {
            connected[index] = false;
        }
    }

    loop {
        if let Some(gone) = connected.iter().position(|c| !c) {
            abandon(&seats, gone).await;
            return;
        }

        seats[0].handle.send_best_effort(GameMessage::FirstMove).await;
        seats[1]
            .handle
            .send_best_effort(GameMessage::WaitingForFirstMove)
            .await;

        let mut session = GameSession::new(&seats, &ctx);
        let outcome = session.play().await;
        let rounds = session.chain().completed_rounds();

        let (loser, reason, round_num) = match outcome {
            GameOutcome::Abandoned { by } => {
                info!("Player {} ({}) disconnected mid-game", by + 1, seats[by].name);
                abandon(&seats, by).await;
                return;
            }
            GameOutcome::Decided {
                loser,
                reason,
                round_num,
            } => (loser, reason, round_num),
        };
        let winner = 1 - loser;
        info!(
            "Game over: {} beat {} ({:?}, {} turns)",
            seats[winner].name, seats[loser].name, reason, round_num
        );

        connected[loser] = seats[loser]
            .handle
            .send_best_effort(GameMessage::Lost(reason))
            .await;
        connected[winner] = seats[winner]
            .handle
            .send_best_effort(GameMessage::Won(reason))
            .await;

        if negotiate_rematch(&seats, &ctx, loser, winner, &mut connected).await {
            info!("Rematch accepted by {} and {}", seats[0].name, seats[1].name);
            for seat in &seats {
                seat.handle.send_best_effort(GameMessage::NewGame).await;
            }
            continue;
        }

        let winner_name = ask_name(&seats[winner], &ctx, connected[winner]).await;
        let loser_name = ask_name(&seats[loser], &ctx, connected[loser]).await;
        if let Err(e) = ctx.records.record_result(&winner_name, &loser_name, rounds).await {
            warn!("Could not record result: {}", e);
        }

        let scores = high_scores(&ctx).await;
        for (index, seat) in seats.iter().enumerate() {
            if connected[index] {
                seat.handle.send_best_effort(GameMessage::Farewell).await;
                if let Some(scores) = &scores {
                    seat.handle.send_best_effort(scores).await;
                }
            }
            seat.handle.shutdown().await;
        }
        info!("Match between {} and {} closed", seats[0].name, seats[1].name);
        return;
    }
}

/// Asks both players for a rematch, loser first. Only two "yes" answers
/// continue the match. A disconnect stops all further questions.
async fn negotiate_rematch(
    seats: &[Seat; 2],
    ctx: &GameContext,
    loser: usize,
    winner: usize,
    connected: &mut [bool; 2],
) -> bool {
    for index in [loser, winner] {
        if connected[index] {
            connected[index] = seats[index]
                .handle
                .send_best_effort(GameMessage::RematchPrompt)
                .await;
        }
    }

    let mut wants_rematch = true;
    for index in [loser, winner] {
        if !connected[index] {
            return false;
        }
        match seats[index].handle.recv_line_timeout(ctx.turn_timeout).await {
            Received::Line(answer) => {
                debug!("{} answered rematch with '{}'", seats[index].name, answer);
                wants_rematch &= is_rematch_yes(&answer);
            }
            Received::TimedOut => wants_rematch = false,
            Received::Closed => {
                connected[index] = false;
                return false;
            }
        }
    }
    wants_rematch
}

async fn ask_name(seat: &Seat, ctx: &GameContext, reachable: bool) -> String {
    if !reachable || !seat.handle.send_best_effort(GameMessage::NamePrompt).await {
        return UNKNOWN_PLAYER.to_string();
    }
    match seat.handle.recv_line_timeout(ctx.turn_timeout).await {
        Received::Line(name) if name.trim().is_empty() => seat.name.clone(),
        Received::Line(name) => name.trim().to_string(),
        Received::TimedOut | Received::Closed => UNKNOWN_PLAYER.to_string(),
    }
}

/// The high-score line for the farewell, or `None` when there is nothing to show
async fn high_scores(ctx: &GameContext) -> Option<GameMessage> {
    match ctx.records.top_scores(HIGH_SCORE_COUNT).await {
        Ok(records) if records.is_empty() => None,
        Ok(records) => Some(GameMessage::HighScores(
            records
                .into_iter()
                .map(|r| (r.name, r.best_round_count))
                .collect(),
        )),
        Err(e) => {
            warn!("Could not read high scores: {}", e);
            None
        }
    }
}

/// Tears a match down after a player vanished before a result was decided
async fn abandon(seats: &[Seat; 2], gone: usize) {
    let remaining = &seats[1 - gone];
    if remaining
        .handle
        .send_best_effort(GameMessage::OpponentDisconnected)
        .await
    {
        remaining.handle.send_best_effort(GameMessage::Farewell).await;
    }
    for seat in seats {
        seat.handle.shutdown().await;
    }
}
