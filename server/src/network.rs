//! TCP listener accepting player connections

use crate::connection::ConnectionHandler;
use crate::dictionary::WordList;
use crate::lobby::LobbyRegistry;
use crate::player::PlayerHandle;
use crate::records::RecordStore;
use crate::session::GameContext;
use log::{error, info};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket};

pub const DEFAULT_BACKLOG: u32 = 128;

/// Everything needed to start a server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub backlog: u32,
    pub records_path: PathBuf,
    pub dictionary_path: PathBuf,
    pub turn_timeout: Duration,
}

/// Accepts connections and gives each one a lobby command handler
pub struct Server {
    listener: TcpListener,
    registry: Arc<LobbyRegistry>,
    ctx: Arc<GameContext>,
}

impl Server {
    /// Loads the dictionary named in `config` and binds the listener
    pub async fn from_config(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let words = WordList::load(&config.dictionary_path)?;
        let ctx = GameContext::new(
            Arc::new(words),
            Arc::new(RecordStore::new(config.records_path.clone())),
            config.turn_timeout,
        );
        let server = Self::bind(
            config.addr,
            config.backlog,
            Arc::new(LobbyRegistry::new()),
            Arc::new(ctx),
        )?;
        Ok(server)
    }

    pub fn bind(
        addr: SocketAddr,
        backlog: u32,
        registry: Arc<LobbyRegistry>,
        ctx: Arc<GameContext>,
    ) -> std::io::Result<Self> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(backlog)?;
        info!("Word chain server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            registry,
            ctx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<LobbyRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accepts connections forever
    pub async fn run(self) -> std::io::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("Player connected from {}", addr);
                    if let Err(e) = stream.set_nodelay(true) {
                        error!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                    }
                    let (read_half, write_half) = stream.into_split();
                    let handle = PlayerHandle::new(addr.to_string(), read_half, write_half);
                    let handler = ConnectionHandler::new(
                        handle,
                        Arc::clone(&self.registry),
                        Arc::clone(&self.ctx),
                    );
                    tokio::spawn(handler.run());
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    fn test_context(dir: &tempfile::TempDir) -> Arc<GameContext> {
        Arc::new(GameContext::new(
            Arc::new(WordList::from_words(["apple"])),
            Arc::new(RecordStore::new(dir.path().join("records.txt"))),
            Duration::from_secs(5),
        ))
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::bind(
            "127.0.0.1:0".parse().unwrap(),
            DEFAULT_BACKLOG,
            Arc::new(LobbyRegistry::new()),
            test_context(&dir),
        )
        .unwrap();

        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_accepts_and_answers_commands() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::bind(
            "127.0.0.1:0".parse().unwrap(),
            DEFAULT_BACKLOG,
            Arc::new(LobbyRegistry::new()),
            test_context(&dir),
        )
        .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        write_half.write_all(b"LIST_LOBBIES\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "LOBBY_LIST");
    }

    #[tokio::test]
    async fn test_from_config_loads_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let dictionary_path = dir.path().join("words.txt");
        let mut file = std::fs::File::create(&dictionary_path).unwrap();
        writeln!(file, "apple\neagle").unwrap();

        let config = ServerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            backlog: DEFAULT_BACKLOG,
            records_path: dir.path().join("records.txt"),
            dictionary_path,
            turn_timeout: Duration::from_secs(15),
        };
        let server = Server::from_config(&config).await.unwrap();
        assert!(server.ctx.validator.is_valid_word("EAGLE"));
    }

    #[tokio::test]
    async fn test_from_config_missing_dictionary_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            backlog: DEFAULT_BACKLOG,
            records_path: dir.path().join("records.txt"),
            dictionary_path: dir.path().join("absent.txt"),
            turn_timeout: Duration::from_secs(15),
        };
        assert!(Server::from_config(&config).await.is_err());
    }
}
