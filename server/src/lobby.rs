//! Lobby directory shared by every connection handler
//!
//! Two lock levels keep unrelated lobbies from blocking each other:
//! - the directory lock guards insertion, removal and lookup of lobbies
//! - each lobby has its own lock guarding its member list and state
//!
//! Lock order is always lobby then directory. Operations that only need the
//! directory (create, list) never hold a lobby lock while holding the
//! directory lock, so the order can't invert. Notifications to other members
//! are sent after every lock has been released, so a slow peer never stalls
//! the registry.

use crate::player::PlayerHandle;
use crate::session::Seat;
use log::{debug, info};
use shared::{JoinFailure, LobbyReply, LobbySummary, LOBBY_CAPACITY};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LobbyError {
    #[error("lobby name already taken")]
    NameTaken,
    #[error("no such lobby")]
    NoSuchLobby,
    #[error("lobby is full")]
    Full,
}

impl From<LobbyError> for JoinFailure {
    fn from(err: LobbyError) -> Self {
        match err {
            LobbyError::NameTaken => JoinFailure::NameTaken,
            LobbyError::NoSuchLobby => JoinFailure::NoSuchLobby,
            LobbyError::Full => JoinFailure::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyState {
    Waiting,
    /// Filled up and handed to a game session; never accepts members again
    InGame,
    /// Emptied and being removed from the directory
    Closed,
}

/// A waiting room that fills up to capacity
#[derive(Debug)]
pub struct Lobby {
    pub name: String,
    pub owner_name: String,
    pub capacity: usize,
    pub members: Vec<Seat>,
    pub state: LobbyState,
}

impl Lobby {
    fn new(name: &str, owner_name: &str, owner: PlayerHandle) -> Self {
        Self {
            name: name.to_string(),
            owner_name: owner_name.to_string(),
            capacity: LOBBY_CAPACITY,
            members: vec![Seat {
                name: owner_name.to_string(),
                handle: owner,
            }],
            state: LobbyState::Waiting,
        }
    }
}

/// Result of a successful join
#[derive(Debug)]
pub enum JoinOutcome {
    Waiting,
    /// The lobby is full and gone from the directory. Seats are in join
    /// order, owner first; the caller starts the game.
    GameStarting { lobby: String, seats: [Seat; 2] },
}

type SharedLobby = Arc<Mutex<Lobby>>;

#[derive(Default)]
pub struct LobbyRegistry {
    lobbies: Mutex<HashMap<String, SharedLobby>>,
}

impl LobbyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get(&self, name: &str) -> Option<SharedLobby> {
        self.lobbies.lock().await.get(name).cloned()
    }

    /// Removes `name` from the directory if it still maps to `lobby`
    async fn remove_entry(&self, name: &str, lobby: &SharedLobby) {
        let mut lobbies = self.lobbies.lock().await;
        if lobbies.get(name).is_some_and(|current| Arc::ptr_eq(current, lobby)) {
            lobbies.remove(name);
        }
    }

    /// Snapshot of lobbies still accepting players, sorted by name
    pub async fn list_lobbies(&self) -> Vec<LobbySummary> {
        let entries: Vec<SharedLobby> = self.lobbies.lock().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(entries.len());
        for entry in entries {
            let lobby = entry.lock().await;
            if lobby.state == LobbyState::Waiting {
                summaries.push(LobbySummary {
                    name: lobby.name.clone(),
                    owner: lobby.owner_name.clone(),
                    members: lobby.members.len(),
                });
            }
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    pub async fn create_lobby(
        &self,
        name: &str,
        owner_name: &str,
        owner: PlayerHandle,
    ) -> Result<(), LobbyError> {
        let mut lobbies = self.lobbies.lock().await;
        if lobbies.contains_key(name) {
            return Err(LobbyError::NameTaken);
        }

        let lobby = Lobby::new(name, owner_name, owner);
        lobbies.insert(name.to_string(), Arc::new(Mutex::new(lobby)));
        info!("Lobby '{}' created by {}", name, owner_name);
        Ok(())
    }

    /// Adds a player to a waiting lobby.
    ///
    /// The capacity check and the append happen under the lobby's lock, so
    /// exactly one join can fill a lobby. That join takes the lobby out of the
    /// directory and receives the seats for the new game.
    pub async fn join_lobby(
        &self,
        name: &str,
        player_name: &str,
        handle: PlayerHandle,
    ) -> Result<JoinOutcome, LobbyError> {
        let entry = self.get(name).await.ok_or(LobbyError::NoSuchLobby)?;

        let (others, outcome) = {
            let mut lobby = entry.lock().await;
            match lobby.state {
                LobbyState::Waiting => {}
                LobbyState::InGame => return Err(LobbyError::Full),
                LobbyState::Closed => return Err(LobbyError::NoSuchLobby),
            }
            if lobby.members.len() >= lobby.capacity {
                return Err(LobbyError::Full);
            }

            let others: Vec<PlayerHandle> = lobby.members.iter().map(|m| m.handle.clone()).collect();
            lobby.members.push(Seat {
                name: player_name.to_string(),
                handle,
            });
            debug!(
                "{} joined lobby '{}' ({}/{})",
                player_name,
                name,
                lobby.members.len(),
                lobby.capacity
            );

            let outcome = if lobby.members.len() == lobby.capacity {
                lobby.state = LobbyState::InGame;
                let members = std::mem::take(&mut lobby.members);
                self.remove_entry(name, &entry).await;
                match <[Seat; 2]>::try_from(members) {
                    Ok(seats) => JoinOutcome::GameStarting {
                        lobby: name.to_string(),
                        seats,
                    },
                    Err(_) => return Err(LobbyError::Full),
                }
            } else {
                JoinOutcome::Waiting
            };
            (others, outcome)
        };

        let info = LobbyReply::Info {
            name: player_name.to_string(),
            lobby: name.to_string(),
        };
        for other in others {
            other.send_best_effort(&info).await;
        }

        if let JoinOutcome::GameStarting { .. } = outcome {
            info!("Lobby '{}' is full, starting game", name);
        }
        Ok(outcome)
    }

    /// Removes the member on `handle`'s connection. Leaving a lobby that no
    /// longer exists is not an error. Returns true if a member was removed.
    pub async fn leave_lobby(&self, name: &str, player_name: &str, handle: &PlayerHandle) -> bool {
        let Some(entry) = self.get(name).await else {
            return false;
        };

        let mut lobby = entry.lock().await;
        if lobby.state != LobbyState::Waiting {
            return false;
        }
        let before = lobby.members.len();
        lobby.members.retain(|m| !m.handle.same_connection(handle));
        let removed = lobby.members.len() < before;
        if removed {
            debug!("{} left lobby '{}'", player_name, name);
        }

        if lobby.members.is_empty() {
            lobby.state = LobbyState::Closed;
            self.remove_entry(name, &entry).await;
            info!("Lobby '{}' closed", name);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.lobbies.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.lobbies.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split, AsyncBufReadExt, BufReader, DuplexStream, Lines, ReadHalf};

    fn handle() -> (PlayerHandle, Lines<BufReader<ReadHalf<DuplexStream>>>) {
        let (server_side, client_side) = duplex(4096);
        let (read_half, write_half) = split(server_side);
        let (client_read, _client_write) = split(client_side);
        (
            PlayerHandle::new("test", read_half, write_half),
            BufReader::new(client_read).lines(),
        )
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let registry = LobbyRegistry::new();
        let (alice, _a) = handle();

        registry.create_lobby("room1", "Alice", alice).await.unwrap();

        assert_eq!(
            registry.list_lobbies().await,
            vec![LobbySummary {
                name: "room1".to_string(),
                owner: "Alice".to_string(),
                members: 1
            }]
        );
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let registry = LobbyRegistry::new();
        let (alice, _a) = handle();
        let (bob, _b) = handle();

        registry.create_lobby("room1", "Alice", alice).await.unwrap();
        assert_eq!(
            registry.create_lobby("room1", "Bob", bob).await,
            Err(LobbyError::NameTaken)
        );
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_join_missing_lobby() {
        let registry = LobbyRegistry::new();
        let (bob, _b) = handle();

        let result = registry.join_lobby("nowhere", "Bob", bob).await;
        assert!(matches!(result, Err(LobbyError::NoSuchLobby)));
    }

    #[tokio::test]
    async fn test_filling_lobby_starts_game_once() {
        let registry = LobbyRegistry::new();
        let (alice, mut alice_lines) = handle();
        let (bob, _b) = handle();
        let (carol, _c) = handle();

        registry.create_lobby("room1", "Alice", alice.clone()).await.unwrap();
        let outcome = registry.join_lobby("room1", "Bob", bob.clone()).await.unwrap();

        match outcome {
            JoinOutcome::GameStarting { lobby, seats } => {
                assert_eq!(lobby, "room1");
                assert_eq!(seats[0].name, "Alice");
                assert!(seats[0].handle.same_connection(&alice));
                assert_eq!(seats[1].name, "Bob");
                assert!(seats[1].handle.same_connection(&bob));
            }
            JoinOutcome::Waiting => panic!("lobby should have filled"),
        }

        assert_eq!(alice_lines.next_line().await.unwrap().unwrap(), "INFO Bob joined room1");
        assert!(registry.list_lobbies().await.is_empty());
        assert!(registry.is_empty().await);

        let late = registry.join_lobby("room1", "Carol", carol).await;
        assert!(matches!(late, Err(LobbyError::NoSuchLobby)));
    }

    #[tokio::test]
    async fn test_leave_by_connection_not_name() {
        let registry = LobbyRegistry::new();
        let (alice, _a) = handle();
        let (impostor, _i) = handle();

        registry.create_lobby("room1", "Alice", alice.clone()).await.unwrap();

        assert!(!registry.leave_lobby("room1", "Alice", &impostor).await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.leave_lobby("room1", "Alice", &alice).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_leave_missing_lobby_is_noop() {
        let registry = LobbyRegistry::new();
        let (alice, _a) = handle();
        assert!(!registry.leave_lobby("ghost", "Alice", &alice).await);
    }

    #[tokio::test]
    async fn test_name_reusable_after_close() {
        let registry = LobbyRegistry::new();
        let (alice, _a) = handle();
        let (bob, _b) = handle();

        registry.create_lobby("room1", "Alice", alice.clone()).await.unwrap();
        registry.leave_lobby("room1", "Alice", &alice).await;
        registry.create_lobby("room1", "Bob", bob).await.unwrap();

        assert_eq!(registry.list_lobbies().await[0].owner, "Bob");
    }

    #[tokio::test]
    async fn test_list_sorted_by_name() {
        let registry = LobbyRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            let (h, _lines) = handle();
            registry.create_lobby(name, "Owner", h).await.unwrap();
        }

        let names: Vec<String> = registry
            .list_lobbies()
            .await
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_fill_exactly_once() {
        let registry = Arc::new(LobbyRegistry::new());
        let (owner, _o) = handle();
        registry.create_lobby("arena", "Owner", owner).await.unwrap();

        let mut tasks = Vec::new();
        let mut keep = Vec::new();
        for i in 0..8 {
            let (h, lines) = handle();
            keep.push(lines);
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.join_lobby("arena", &format!("p{}", i), h).await
            }));
        }

        let mut started = 0;
        let mut refused = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(JoinOutcome::GameStarting { .. }) => started += 1,
                Ok(JoinOutcome::Waiting) => panic!("capacity is two"),
                Err(LobbyError::Full) | Err(LobbyError::NoSuchLobby) => refused += 1,
                Err(e) => panic!("unexpected error {:?}", e),
            }
        }

        assert_eq!(started, 1);
        assert_eq!(refused, 7);
        assert!(registry.is_empty().await);
    }
}
