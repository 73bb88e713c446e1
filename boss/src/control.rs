//! Control socket for talking to the running TTY supervisor.
//!
//! One JSON command per line in, one JSON response per line out, over a
//! Unix domain socket.

use crate::error::{Error, Result};
use crate::tty::TtyStatus;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

/// Commands that can be sent to the supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlCommand {
    /// Re-read TTY configuration
    Reload,
    /// Switch runlevel
    SetRunlevel { level: String },
    /// Get status of all TTYs
    Status,
    /// Ping to check if the supervisor is responding
    Ping,
}

/// Response from the supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlResponse {
    /// Command succeeded
    Success { message: String },
    /// Command failed
    Error { message: String },
    /// TTY status
    Status {
        runlevel: String,
        fallback_pid: Option<i32>,
        ttys: Vec<TtyStatus>,
    },
    /// Pong response
    Pong,
}

/// Control socket server (runs in the supervisor)
pub struct ControlServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
}

impl ControlServer {
    /// Create a new control server
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            listener: None,
        }
    }

    /// Start listening for connections
    pub fn start(&mut self) -> Result<()> {
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Stale socket from a previous run
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path.display(), "Control socket listening");

        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, permissions)?;
        }

        self.listener = Some(listener);
        Ok(())
    }

    /// Accept a single connection
    pub async fn accept(&self) -> Result<UnixStream> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| Error::Other("Control server not started".to_string()))?;

        let (stream, _addr) = listener.accept().await?;
        debug!("Accepted control connection");
        Ok(stream)
    }

    /// Read a command from a stream
    pub async fn read_command(stream: &mut UnixStream) -> Result<ControlCommand> {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await?;

        let command: ControlCommand = serde_json::from_str(line.trim())?;
        debug!(command = ?command, "Received control command");
        Ok(command)
    }

    /// Write a response to a stream
    pub async fn write_response(stream: &mut UnixStream, response: &ControlResponse) -> Result<()> {
        let json = serde_json::to_string(response)?;

        stream.write_all(json.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;

        debug!(response = ?response, "Sent control response");
        Ok(())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        if self.listener.is_some() && self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(error = %e, "Failed to remove control socket");
            }
        }
    }
}

/// Control socket client (used by the CLI)
pub struct ControlClient {
    socket_path: PathBuf,
}

impl ControlClient {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Connect to the supervisor
    pub async fn connect(&self) -> Result<UnixStream> {
        if !self.socket_path.exists() {
            return Err(Error::Other(format!(
                "Control socket not found at {}. Is the TTY supervisor running?",
                self.socket_path.display()
            )));
        }

        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            Error::Other(format!(
                "Failed to connect to control socket: {}. Is the TTY supervisor running?",
                e
            ))
        })?;

        debug!("Connected to control socket");
        Ok(stream)
    }

    /// Send a command and receive a response
    pub async fn send_command(&self, command: ControlCommand) -> Result<ControlResponse> {
        let mut stream = self.connect().await?;

        let json = serde_json::to_string(&command)?;
        stream.write_all(json.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;

        let mut reader = BufReader::new(&mut stream);
        let mut line = String::new();
        reader.read_line(&mut line).await?;

        let response: ControlResponse = serde_json::from_str(line.trim())?;
        Ok(response)
    }

    pub async fn reload(&self) -> Result<ControlResponse> {
        self.send_command(ControlCommand::Reload).await
    }

    pub async fn set_runlevel(&self, level: &str) -> Result<ControlResponse> {
        self.send_command(ControlCommand::SetRunlevel {
            level: level.to_string(),
        })
        .await
    }

    pub async fn status(&self) -> Result<ControlResponse> {
        self.send_command(ControlCommand::Status).await
    }

    pub async fn ping(&self) -> Result<bool> {
        match self.send_command(ControlCommand::Ping).await {
            Ok(ControlResponse::Pong) => Ok(true),
            Ok(_) => Ok(false),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let cmd = ControlCommand::SetRunlevel {
            level: "3".to_string(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let parsed: ControlCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cmd);
    }

    #[test]
    fn test_status_response() {
        let resp = ControlResponse::Status {
            runlevel: "3".to_string(),
            fallback_pid: None,
            ttys: Vec::new(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        let parsed: ControlResponse = serde_json::from_str(&json).unwrap();
        match parsed {
            ControlResponse::Status { runlevel, ttys, .. } => {
                assert_eq!(runlevel, "3");
                assert!(ttys.is_empty());
            }
            other => panic!("Wrong response type: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_round_trip_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tty.sock");

        let mut server = ControlServer::new(&path);
        server.start().unwrap();

        let client = ControlClient::new(&path);
        let serve = async {
            let mut stream = server.accept().await.unwrap();
            let cmd = ControlServer::read_command(&mut stream).await.unwrap();
            assert_eq!(cmd, ControlCommand::Ping);
            ControlServer::write_response(&mut stream, &ControlResponse::Pong)
                .await
                .unwrap();
        };

        let (pong, ()) = tokio::join!(client.ping(), serve);
        assert!(pong.unwrap());
    }

    #[tokio::test]
    async fn test_client_without_server() {
        let client = ControlClient::new("/nonexistent/tty.sock");
        assert!(client.status().await.is_err());
        assert!(!client.ping().await.unwrap());
    }
}
