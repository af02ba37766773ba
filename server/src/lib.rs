//! # Word Chain Server Library
//!
//! Server side of a two-player word chain game played over TCP. Players meet
//! in named lobbies, and once a lobby holds two players a game session takes
//! over both connections. Players alternate submitting dictionary words; each
//! word must be new to the game and start with the last letter of the
//! previous word. Breaking a rule, or letting the turn timer run out, loses
//! the game.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Binds the TCP listener and spawns a connection handler per player.
//!
//! ### Connection Module (`connection`)
//! Lobby command loop for one connection (`LIST_LOBBIES`, `CREATE_LOBBY`,
//! `JOIN_LOBBY`, `LEAVE_LOBBY`, `HIGH_SCORES`). Hands the connection over to
//! a game session once its lobby fills.
//!
//! ### Lobby Module (`lobby`)
//! Process-wide lobby directory with a directory lock plus one lock per
//! lobby, so joins on different lobbies never wait on each other.
//!
//! ### Session Module (`session`)
//! Turn loop with per-turn timeouts, rematch negotiation, name prompts and
//! result recording for one pair of players.
//!
//! ### Game Module (`game`)
//! The word chain rules and per-game state, free of any I/O.
//!
//! ### Records Module (`records`)
//! Win/loss/best-round file, rewritten atomically on every result.
//!
//! ### Dictionary Module (`dictionary`)
//! `WordValidator` trait and a word-list implementation.
//!
//! ### Player Module (`player`)
//! Cloneable connection handles with line-oriented, timeout-bounded reads.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig, DEFAULT_BACKLOG};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         addr: "0.0.0.0:12005".parse()?,
//!         backlog: DEFAULT_BACKLOG,
//!         records_path: "WordChainRecords.txt".into(),
//!         dictionary_path: "/usr/share/dict/words".into(),
//!         turn_timeout: Duration::from_secs(15),
//!     };
//!
//!     let server = Server::from_config(&config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod dictionary;
pub mod game;
pub mod lobby;
pub mod network;
pub mod player;
pub mod records;
pub mod session;
