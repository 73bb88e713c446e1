//! TTY supervisor daemon - event loop and signal handling.

use crate::accounting::{Accounting, NoAccounting, UtmpAccounting};
use crate::config::{collect_lines, BossConfig, DEFAULT_CONFIG_FILE};
use crate::control::{ControlCommand, ControlResponse, ControlServer};
use crate::device::SysDevices;
use crate::error::Result;
use crate::process::{reap_children, ProcessLauncher};
use crate::runlevel::Runlevel;
use crate::tty::TtySupervisor;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};

/// How long a control client gets to send its command.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct InitConfig {
    /// Configuration file, re-read on reload
    pub config_file: PathBuf,
    /// Settings loaded from `config_file`
    pub settings: BossConfig,
    /// Listen on the control socket
    pub control: bool,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            settings: BossConfig::default(),
            control: true,
        }
    }
}

/// The TTY supervisor daemon.
pub struct Init {
    config: InitConfig,
    supervisor: TtySupervisor,
}

impl Init {
    /// Create the daemon with the real device, process and utmp backends.
    pub fn new(config: InitConfig) -> Self {
        let settings = &config.settings;

        let accounting: Box<dyn Accounting> = if settings.utmp {
            Box::new(UtmpAccounting)
        } else {
            Box::new(NoAccounting)
        };

        let supervisor = TtySupervisor::new(
            Box::new(SysDevices::new(&settings.dev_dir)),
            Box::new(ProcessLauncher::new(&settings.getty, &settings.shell)),
            accounting,
        )
        .with_console(settings.console.clone())
        .with_fallback_shell(settings.fallback_shell)
        .with_runlevel(settings.runlevel);

        Self { config, supervisor }
    }

    pub fn supervisor(&self) -> &TtySupervisor {
        &self.supervisor
    }

    /// Run until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        info!(runlevel = %self.supervisor.runlevel(), "Boss TTY supervisor starting");

        self.reload();

        let mut control = if self.config.control {
            let mut server = ControlServer::new(&self.config.settings.control_socket);
            match server.start() {
                Ok(()) => Some(server),
                Err(e) => {
                    warn!(error = %e, "Control socket unavailable");
                    None
                }
            }
        } else {
            None
        };

        self.event_loop(&mut control).await?;

        info!("Stopping all TTYs");
        self.supervisor.stop_all();
        Ok(())
    }

    /// Re-read configuration and reconcile the TTY set.
    pub fn reload(&mut self) {
        match collect_lines(&self.config.config_file, &self.config.settings.conf_dir) {
            Ok(lines) => self.supervisor.reload(lines),
            Err(e) => error!(error = %e, "Failed to read TTY configuration, keeping current set"),
        }
    }

    async fn event_loop(&mut self, control: &mut Option<ControlServer>) -> Result<()> {
        let mut sigchld = signal(SignalKind::child())?;
        let mut sighup = signal(SignalKind::hangup())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        // Children that died before the handler was installed
        self.handle_sigchld();

        info!("TTY supervisor ready, entering event loop");

        loop {
            tokio::select! {
                _ = sigchld.recv() => {
                    self.handle_sigchld();
                }

                _ = sighup.recv() => {
                    info!("Received SIGHUP, reloading TTYs");
                    self.reload();
                }

                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                    break;
                }

                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down");
                    break;
                }

                stream = accept(control) => {
                    match stream {
                        Ok(stream) => self.handle_connection(stream).await,
                        Err(e) => {
                            warn!(error = %e, "Control socket failed, closing it");
                            *control = None;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Reap exited children and hand them to the supervisor.
    fn handle_sigchld(&mut self) {
        for status in reap_children() {
            if !self.supervisor.on_process_exit(status.pid) {
                debug!(
                    pid = %status.pid,
                    code = ?status.code,
                    signal = ?status.signal,
                    "Unknown process exited"
                );
            }
        }
    }

    async fn handle_connection(&mut self, mut stream: UnixStream) {
        let command =
            match tokio::time::timeout(CONTROL_TIMEOUT, ControlServer::read_command(&mut stream))
                .await
            {
                Ok(Ok(command)) => command,
                Ok(Err(e)) => {
                    let response = ControlResponse::Error {
                        message: e.to_string(),
                    };
                    if let Err(e) = ControlServer::write_response(&mut stream, &response).await {
                        warn!(error = %e, "Failed to send control response");
                    }
                    return;
                }
                Err(_) => {
                    warn!("Control client timed out");
                    return;
                }
            };

        let response = self.handle_command(command);
        if let Err(e) = ControlServer::write_response(&mut stream, &response).await {
            warn!(error = %e, "Failed to send control response");
        }
    }

    /// Execute a control command.
    pub fn handle_command(&mut self, command: ControlCommand) -> ControlResponse {
        match command {
            ControlCommand::Reload => {
                self.reload();
                ControlResponse::Success {
                    message: format!("Reloaded {} TTYs", self.supervisor.registry().count()),
                }
            }
            ControlCommand::SetRunlevel { level } => match level.parse::<Runlevel>() {
                Ok(level) => {
                    self.supervisor.set_runlevel(level);
                    ControlResponse::Success {
                        message: format!("Runlevel {}", level),
                    }
                }
                Err(e) => ControlResponse::Error {
                    message: e.to_string(),
                },
            },
            ControlCommand::Status => ControlResponse::Status {
                runlevel: self.supervisor.runlevel().to_string(),
                fallback_pid: self.supervisor.fallback_pid().map(|p| p.as_raw()),
                ttys: self.supervisor.registry().status(),
            },
            ControlCommand::Ping => ControlResponse::Pong,
        }
    }
}

/// Accept on the control socket, or never resolve if there is none.
async fn accept(control: &Option<ControlServer>) -> Result<UnixStream> {
    match control {
        Some(server) => server.accept().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn test_malformed_command_gets_error() {
        let mut init = Init::new(InitConfig::default());
        let (server, mut client) = UnixStream::pair().unwrap();

        client.write_all(b"not json\n").await.unwrap();
        init.handle_connection(server).await;

        let mut line = String::new();
        BufReader::new(client).read_line(&mut line).await.unwrap();
        let response: ControlResponse = serde_json::from_str(line.trim()).unwrap();
        assert_matches!(response, ControlResponse::Error { .. });
    }

    #[tokio::test]
    async fn test_client_gone_before_error_reply() {
        let mut init = Init::new(InitConfig::default());
        let (server, mut client) = UnixStream::pair().unwrap();

        client.write_all(b"not json\n").await.unwrap();
        drop(client);

        // Write failure is logged, not propagated
        init.handle_connection(server).await;
    }

    #[test]
    fn test_status_command() {
        let mut init = Init::new(InitConfig::default());
        match init.handle_command(ControlCommand::Status) {
            ControlResponse::Status {
                runlevel,
                fallback_pid,
                ttys,
            } => {
                assert_eq!(runlevel, "2");
                assert_eq!(fallback_pid, None);
                assert!(ttys.is_empty());
            }
            other => panic!("Wrong response type: {:?}", other),
        }
        assert_matches!(init.handle_command(ControlCommand::Ping), ControlResponse::Pong);
    }
}
