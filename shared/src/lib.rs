//! Wire protocol shared by the word-chain server and anything that talks to it.
//!
//! Everything travels as newline-terminated UTF-8 text. Lobby traffic uses
//! space-separated keyword commands; in-game traffic uses fixed phrases that
//! clients pattern-match on ("Your turn.", "Game over!", ...). Internally the
//! server never builds those strings by hand: it works with the typed
//! variants below and renders them through `Display`.

use std::fmt;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 12005;
pub const LOBBY_CAPACITY: usize = 2;
pub const TURN_TIMEOUT_SECS: u64 = 15;
pub const RECORD_FILE: &str = "WordChainRecords.txt";
pub const HIGH_SCORE_COUNT: usize = 5;

/// Token a client sends when its local countdown runs out.
pub const TIMER_EXPIRED: &str = "TimerExpired";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("UnknownCommand {0}")]
    UnknownCommand(String),
    #[error("MalformedCommand {0}")]
    MalformedCommand(String),
}

/// Commands accepted while a connection is in lobby mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyCommand {
    ListLobbies,
    CreateLobby { lobby: String, name: String },
    JoinLobby { lobby: String, name: String },
    LeaveLobby { lobby: String, name: String },
    HighScores,
}

impl LobbyCommand {
    /// Parses one command line.
    ///
    /// Keywords are case-sensitive. Lobby-carrying commands take exactly two
    /// arguments; anything else is reported as malformed so the client can
    /// tell a typo in the keyword apart from a bad argument list.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let raw = line.trim();
        let mut parts = raw.split_whitespace();
        let keyword = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        let lobby_args = |args: &[&str]| match args {
            [lobby, name] => Ok((lobby.to_string(), name.to_string())),
            _ => Err(ProtocolError::MalformedCommand(raw.to_string())),
        };

        match keyword {
            "LIST_LOBBIES" if args.is_empty() => Ok(LobbyCommand::ListLobbies),
            "HIGH_SCORES" if args.is_empty() => Ok(LobbyCommand::HighScores),
            "LIST_LOBBIES" | "HIGH_SCORES" => {
                Err(ProtocolError::MalformedCommand(raw.to_string()))
            }
            "CREATE_LOBBY" => {
                let (lobby, name) = lobby_args(&args)?;
                Ok(LobbyCommand::CreateLobby { lobby, name })
            }
            "JOIN_LOBBY" => {
                let (lobby, name) = lobby_args(&args)?;
                Ok(LobbyCommand::JoinLobby { lobby, name })
            }
            "LEAVE_LOBBY" => {
                let (lobby, name) = lobby_args(&args)?;
                Ok(LobbyCommand::LeaveLobby { lobby, name })
            }
            _ => Err(ProtocolError::UnknownCommand(raw.to_string())),
        }
    }
}

impl fmt::Display for LobbyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LobbyCommand::ListLobbies => write!(f, "LIST_LOBBIES"),
            LobbyCommand::HighScores => write!(f, "HIGH_SCORES"),
            LobbyCommand::CreateLobby { lobby, name } => write!(f, "CREATE_LOBBY {} {}", lobby, name),
            LobbyCommand::JoinLobby { lobby, name } => write!(f, "JOIN_LOBBY {} {}", lobby, name),
            LobbyCommand::LeaveLobby { lobby, name } => write!(f, "LEAVE_LOBBY {} {}", lobby, name),
        }
    }
}

/// Why a lobby create or join was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinFailure {
    NameTaken,
    NoSuchLobby,
    Full,
}

impl fmt::Display for JoinFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            JoinFailure::NameTaken => "NameTaken",
            JoinFailure::NoSuchLobby => "NoSuchLobby",
            JoinFailure::Full => "Full",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbySummary {
    pub name: String,
    pub owner: String,
    pub members: usize,
}

/// Server replies while a connection is in lobby mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyReply {
    LobbyList(Vec<LobbySummary>),
    LobbyCreated { lobby: String },
    LobbyJoined { lobby: String },
    LobbyLeft { lobby: String },
    JoinFailed(JoinFailure),
    Info { name: String, lobby: String },
    StartGame { lobby: String },
    HighScores(Vec<(String, u32)>),
    AlreadyInLobby { lobby: String },
    /// A leave that matched no member of this connection
    NotInLobby { lobby: String },
    Error(ProtocolError),
}

impl fmt::Display for LobbyReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LobbyReply::LobbyList(lobbies) => {
                let entries: Vec<String> = lobbies
                    .iter()
                    .map(|l| format!("{},{},{}", l.name, l.owner, l.members))
                    .collect();
                if entries.is_empty() {
                    write!(f, "LOBBY_LIST")
                } else {
                    write!(f, "LOBBY_LIST {}", entries.join("|"))
                }
            }
            LobbyReply::LobbyCreated { lobby } => write!(f, "LOBBY_CREATED {}", lobby),
            LobbyReply::LobbyJoined { lobby } => write!(f, "LOBBY_JOINED {}", lobby),
            LobbyReply::LobbyLeft { lobby } => write!(f, "LOBBY_LEFT {}", lobby),
            LobbyReply::JoinFailed(reason) => write!(f, "LOBBY_JOIN_FAILED {}", reason),
            LobbyReply::Info { name, lobby } => write!(f, "INFO {} joined {}", name, lobby),
            LobbyReply::StartGame { lobby } => write!(f, "START_GAME {}", lobby),
            LobbyReply::HighScores(scores) => {
                let entries: Vec<String> = scores
                    .iter()
                    .map(|(name, best)| format!("{},{}", name, best))
                    .collect();
                if entries.is_empty() {
                    write!(f, "HIGH_SCORES")
                } else {
                    write!(f, "HIGH_SCORES {}", entries.join("|"))
                }
            }
            LobbyReply::AlreadyInLobby { lobby } => write!(f, "ERROR AlreadyInLobby {}", lobby),
            LobbyReply::NotInLobby { lobby } => write!(f, "ERROR NotInLobby {}", lobby),
            LobbyReply::Error(err) => write!(f, "ERROR {}", err),
        }
    }
}

/// Why a game ended with a definite loser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Timeout,
    EmptySubmission,
    InvalidWord,
    WordReused,
    ChainBroken { expected: char },
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Timeout => write!(f, "Time's up!"),
            EndReason::EmptySubmission => write!(f, "Empty submission."),
            EndReason::InvalidWord => write!(f, "Invalid word."),
            EndReason::WordReused => write!(f, "Word already used."),
            EndReason::ChainBroken { expected } => write!(f, "Word must start with '{}'.", expected),
        }
    }
}

/// Messages the server sends once a game has taken over a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameMessage {
    Welcome { player_number: usize },
    FirstMove,
    WaitingForFirstMove,
    TurnPrompt { required: Option<char>, seconds: u64 },
    WordAccepted,
    OpponentMove { word: String },
    Lost(EndReason),
    Won(EndReason),
    OpponentDisconnected,
    RematchPrompt,
    NewGame,
    NamePrompt,
    Farewell,
    HighScores(Vec<(String, u32)>),
}

impl fmt::Display for GameMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMessage::Welcome { player_number } => {
                write!(f, "Welcome to Word Chain! You are Player {}.", player_number)
            }
            GameMessage::FirstMove => write!(f, "Game starts! Please enter the first word."),
            GameMessage::WaitingForFirstMove => write!(f, "Waiting for Player 1 to start..."),
            GameMessage::TurnPrompt { required: None, seconds } => {
                write!(f, "Your turn. Enter a word ({}s):", seconds)
            }
            GameMessage::TurnPrompt { required: Some(letter), seconds } => write!(
                f,
                "Your turn. Enter a word starting with '{}' ({}s):",
                letter, seconds
            ),
            GameMessage::WordAccepted => write!(f, "Accepted!"),
            GameMessage::OpponentMove { word } => write!(f, "Player used '{}'. Your turn next!", word),
            GameMessage::Lost(reason) => write!(f, "Game over! You lost. {}", reason),
            GameMessage::Won(reason) => write!(f, "Game over! You won! Opponent: {}", reason),
            GameMessage::OpponentDisconnected => write!(f, "Your opponent disconnected."),
            GameMessage::RematchPrompt => write!(f, "Rematch? (yes/no)"),
            GameMessage::NewGame => write!(f, "New game starting!"),
            GameMessage::NamePrompt => write!(f, "Please enter your name for the record: "),
            GameMessage::Farewell => write!(f, "Thanks for playing!"),
            GameMessage::HighScores(scores) => {
                let entries: Vec<String> = scores
                    .iter()
                    .enumerate()
                    .map(|(i, (name, best))| format!("{}. {} ({})", i + 1, name, best))
                    .collect();
                if entries.is_empty() {
                    write!(f, "High Scores:")
                } else {
                    write!(f, "High Scores: {}", entries.join(" | "))
                }
            }
        }
    }
}

/// What a player sent during their turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnSubmission {
    TimerExpired,
    Empty,
    Word(String),
}

impl TurnSubmission {
    pub fn parse(line: &str) -> Self {
        let word = line.trim();
        if word.eq_ignore_ascii_case(TIMER_EXPIRED) {
            TurnSubmission::TimerExpired
        } else if word.is_empty() {
            TurnSubmission::Empty
        } else {
            TurnSubmission::Word(word.to_string())
        }
    }
}

/// Interprets a rematch answer. Only a case-insensitive "yes" counts.
pub fn is_rematch_yes(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("yes")
}
