//! Per-connection lobby command loop
//!
//! Each accepted connection starts here. The handler answers lobby commands
//! until the connection either closes or is seated in a game. From then on the
//! game session is the only reader and writer of that connection.

use crate::lobby::{JoinOutcome, LobbyRegistry};
use crate::player::PlayerHandle;
use crate::session::{run_match, GameContext};
use log::{debug, info, warn};
use shared::{JoinFailure, LobbyCommand, LobbyReply, HIGH_SCORE_COUNT};
use std::sync::Arc;

/// Whether the handler keeps reading commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    HandedOff,
}

/// Lobby membership remembered so a dropped connection can be cleaned up
#[derive(Debug, Clone)]
struct Membership {
    lobby: String,
    name: String,
}

pub struct ConnectionHandler {
    handle: PlayerHandle,
    registry: Arc<LobbyRegistry>,
    ctx: Arc<GameContext>,
    membership: Option<Membership>,
}

impl ConnectionHandler {
    pub fn new(handle: PlayerHandle, registry: Arc<LobbyRegistry>, ctx: Arc<GameContext>) -> Self {
        Self {
            handle,
            registry,
            ctx,
            membership: None,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.handle.session_started() => {
                    debug!("{} seated in a game by another player", self.handle.peer());
                    return;
                }

                line = self.handle.recv_line() => {
                    let Some(line) = line else {
                        self.disconnected().await;
                        return;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if self.dispatch(&line).await == Flow::HandedOff {
                        return;
                    }
                }
            }
        }
    }

    async fn reply(&self, reply: LobbyReply) {
        self.handle.send_best_effort(reply).await;
    }

    async fn dispatch(&mut self, line: &str) -> Flow {
        let command = match LobbyCommand::parse(line) {
            Ok(command) => command,
            Err(err) => {
                debug!("Bad command from {}: {}", self.handle.peer(), err);
                self.reply(LobbyReply::Error(err)).await;
                return Flow::Continue;
            }
        };

        match command {
            LobbyCommand::ListLobbies => {
                let lobbies = self.registry.list_lobbies().await;
                self.reply(LobbyReply::LobbyList(lobbies)).await;
            }
            LobbyCommand::HighScores => {
                let scores = match self.ctx.records.top_scores(HIGH_SCORE_COUNT).await {
                    Ok(records) => records
                        .into_iter()
                        .map(|r| (r.name, r.best_round_count))
                        .collect(),
                    Err(e) => {
                        warn!("Could not read high scores: {}", e);
                        Vec::new()
                    }
                };
                self.reply(LobbyReply::HighScores(scores)).await;
            }
            LobbyCommand::CreateLobby { lobby, name } => {
                if let Some(current) = &self.membership {
                    let lobby = current.lobby.clone();
                    self.reply(LobbyReply::AlreadyInLobby { lobby }).await;
                    return Flow::Continue;
                }
                match self
                    .registry
                    .create_lobby(&lobby, &name, self.handle.clone())
                    .await
                {
                    Ok(()) => {
                        self.membership = Some(Membership {
                            lobby: lobby.clone(),
                            name,
                        });
                        self.reply(LobbyReply::LobbyCreated { lobby }).await;
                    }
                    Err(err) => self.reply(LobbyReply::JoinFailed(JoinFailure::from(err))).await,
                }
            }
            LobbyCommand::JoinLobby { lobby, name } => {
                if let Some(current) = &self.membership {
                    let lobby = current.lobby.clone();
                    self.reply(LobbyReply::AlreadyInLobby { lobby }).await;
                    return Flow::Continue;
                }
                match self
                    .registry
                    .join_lobby(&lobby, &name, self.handle.clone())
                    .await
                {
                    Ok(JoinOutcome::Waiting) => {
                        self.membership = Some(Membership {
                            lobby: lobby.clone(),
                            name,
                        });
                        self.reply(LobbyReply::LobbyJoined { lobby }).await;
                    }
                    Ok(JoinOutcome::GameStarting { lobby, seats }) => {
                        self.reply(LobbyReply::LobbyJoined {
                            lobby: lobby.clone(),
                        })
                        .await;
                        // Stop the other members' handlers before anyone can
                        // answer START_GAME with a first word.
                        for seat in &seats {
                            if !seat.handle.same_connection(&self.handle) {
                                seat.handle.begin_session();
                            }
                        }
                        let start = LobbyReply::StartGame { lobby };
                        for seat in &seats {
                            seat.handle.send_best_effort(&start).await;
                        }
                        tokio::spawn(run_match(seats, Arc::clone(&self.ctx)));
                        return Flow::HandedOff;
                    }
                    Err(err) => self.reply(LobbyReply::JoinFailed(JoinFailure::from(err))).await,
                }
            }
            LobbyCommand::LeaveLobby { lobby, name } => {
                if !self.registry.leave_lobby(&lobby, &name, &self.handle).await {
                    self.reply(LobbyReply::NotInLobby { lobby }).await;
                    return Flow::Continue;
                }
                if self
                    .membership
                    .as_ref()
                    .is_some_and(|current| current.lobby == lobby)
                {
                    self.membership = None;
                }
                self.reply(LobbyReply::LobbyLeft { lobby }).await;
            }
        }
        Flow::Continue
    }

    async fn disconnected(&mut self) {
        info!("Connection {} closed", self.handle.peer());
        if let Some(current) = self.membership.take() {
            self.registry
                .leave_lobby(&current.lobby, &current.name, &self.handle)
                .await;
        }
    }
}
