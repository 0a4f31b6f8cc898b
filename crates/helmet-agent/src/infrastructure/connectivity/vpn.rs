//! Tunnel subprocess supervision.
//!
//! The tunnel daemon is spawned with its config file and watched through
//! its stdout: initialization is considered complete when the daemon prints
//! its completion line, and the address it assigns to the tun device is
//! captured on the way. The daemon keeps running after `start` returns;
//! `stop` hunts it down by process name, which also catches instances left
//! over from a previous agent run.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info, warn};

use crate::infrastructure::system::SystemControl;

/// Line the tunnel daemon prints once the tunnel is usable.
const INIT_COMPLETED: &str = "Initialization Sequence Completed";

/// How long to wait for the daemon to finish initializing.
const INIT_TIMEOUT: Duration = Duration::from_secs(20);

fn tunnel_address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ip addr add dev tun0 ([^/]+)/24").unwrap())
}

#[derive(Debug, thiserror::Error)]
pub enum VpnError {
    #[error("failed to spawn tunnel daemon: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("tunnel daemon has no stdout")]
    NoStdout,

    #[error("config i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the stdout listener observed before signalling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    pub success: bool,
    /// Address the daemon assigned to the tun device, when it got that far.
    pub tunnel_address: Option<String>,
}

pub struct VpnSupervisor {
    binary: String,
    child: Mutex<Option<Child>>,
}

impl VpnSupervisor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            child: Mutex::new(None),
        }
    }

    /// Spawns the tunnel daemon and waits up to 20 s for initialization.
    ///
    /// Returns the listener's outcome; on timeout a failed outcome is
    /// returned and the daemon is left for `stop` to reap.
    pub async fn start(&self, config_path: &Path) -> Result<InitOutcome, VpnError> {
        let mut child = Command::new(&self.binary)
            .arg("--config")
            .arg(config_path)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(VpnError::Spawn)?;
        let stdout = child.stdout.take().ok_or(VpnError::NoStdout)?;
        info!(binary = %self.binary, config = %config_path.display(), "tunnel daemon spawned");

        let (tx, rx) = oneshot::channel();
        tokio::spawn(listen_for_init(BufReader::new(stdout), tx));
        *self.child.lock().await = Some(child);

        match tokio::time::timeout(INIT_TIMEOUT, rx).await {
            Ok(Ok(outcome)) => {
                if outcome.success {
                    info!(address = ?outcome.tunnel_address, "tunnel initialized");
                } else {
                    error!("tunnel daemon exited before initialization completed");
                }
                Ok(outcome)
            }
            Ok(Err(_)) | Err(_) => {
                error!("timed out waiting for tunnel initialization");
                Ok(InitOutcome {
                    success: false,
                    tunnel_address: None,
                })
            }
        }
    }

    /// Terminates every running instance of the tunnel daemon. Safe to call
    /// when none is running, and called before every bring-up to clear
    /// leftovers.
    pub async fn stop(&self, system: &dyn SystemControl) {
        let pids = match system.pids_of(&self.binary).await {
            Ok(pids) => pids,
            Err(error) => {
                warn!(%error, "failed to enumerate tunnel processes");
                return;
            }
        };
        if pids.is_empty() {
            info!("no tunnel daemon running");
        }
        for pid in pids {
            if !system.process_exists(pid) {
                warn!(pid, "tunnel process already gone");
                continue;
            }
            match system.terminate(pid).await {
                Ok(()) => info!(pid, "tunnel process terminated"),
                Err(error) => error!(pid, %error, "failed to terminate tunnel process"),
            }
        }
        if let Some(mut child) = self.child.lock().await.take() {
            let _ = child.wait().await;
        }
    }

    /// Rewrites the tunnel config for this deployment: performance
    /// directives pinned and the remote pointed at `host`.
    pub async fn prepare_config(&self, config_path: &Path, host: &str) -> Result<(), VpnError> {
        let text = tokio::fs::read_to_string(config_path).await?;
        let text = rewrite_performance(&text);
        let text = rewrite_remote(&text, host);
        tokio::fs::write(config_path, text).await?;
        info!(config = %config_path.display(), %host, "tunnel config rewritten");
        Ok(())
    }
}

/// Watches the daemon's stdout until init completes or the stream ends.
///
/// The assigned tunnel address appears before the completion line, so it is
/// captured along the way and handed back with the outcome. EOF before the
/// completion line means the daemon died; that is reported as failure.
async fn listen_for_init<R>(reader: R, outcome: oneshot::Sender<InitOutcome>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut tunnel_address = None;

    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(captures) = tunnel_address_regex().captures(&line) {
            let address = captures[1].to_string();
            info!(%address, "tunnel address assigned");
            tunnel_address = Some(address);
        }
        if line.contains(INIT_COMPLETED) {
            let _ = outcome.send(InitOutcome {
                success: true,
                tunnel_address,
            });
            return;
        }
    }
    let _ = outcome.send(InitOutcome {
        success: false,
        tunnel_address,
    });
}

/// Pins the MTU/MSS/keepalive directives, replacing existing ones in place
/// and appending missing ones at the first blank line of their section.
fn rewrite_performance(text: &str) -> String {
    let mut tun_mtu_found = false;
    let mut mssfix_found = false;
    let mut keepalive_found = false;

    let mut lines: Vec<String> = text
        .lines()
        .map(|line| {
            if line.contains("tun-mtu") {
                tun_mtu_found = true;
                "tun-mtu 1500".to_string()
            } else if line.contains("mssfix") {
                mssfix_found = true;
                "mssfix 1450".to_string()
            } else if line.contains("keepalive") {
                keepalive_found = true;
                "keepalive 10 60".to_string()
            } else {
                line.to_string()
            }
        })
        .collect();

    let mut in_speed_section = false;
    let mut in_connection_main = false;
    for line in &mut lines {
        if line.contains("# speed session") {
            in_speed_section = true;
            continue;
        }
        if in_speed_section && line.is_empty() {
            if !tun_mtu_found {
                tun_mtu_found = true;
                *line = format!("tun-mtu 1500\n{line}");
            }
            if !mssfix_found {
                mssfix_found = true;
                *line = format!("mssfix 1360\n{line}");
            }
        }
        if line.contains("# connection main") {
            in_connection_main = true;
            continue;
        }
        if in_connection_main && line.is_empty() && !keepalive_found {
            keepalive_found = true;
            *line = format!("keepalive 10 60\n{line}");
        }
    }

    let mut result = lines.join("\n");
    result.push('\n');
    result
}

/// Points every `remote` directive at the given host over TCP port 1194.
fn rewrite_remote(text: &str, host: &str) -> String {
    let mut result: String = text
        .lines()
        .map(|line| {
            if line.starts_with("remote ") {
                format!("remote {host} 1194 tcp4")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    result.push('\n');
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listener_success_carries_tunnel_address() {
        let log = b"\
some noise\n\
/sbin/ip addr add dev tun0 10.8.0.14/24 broadcast 10.8.0.255\n\
more noise\n\
2024-01-01 Initialization Sequence Completed\n" as &[u8];
        let (tx, rx) = oneshot::channel();
        listen_for_init(log, tx).await;

        let outcome = rx.await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.tunnel_address.as_deref(), Some("10.8.0.14"));
    }

    #[tokio::test]
    async fn test_listener_eof_is_failure() {
        let log = b"TLS error: handshake failed\n" as &[u8];
        let (tx, rx) = oneshot::channel();
        listen_for_init(log, tx).await;

        let outcome = rx.await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.tunnel_address, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_times_out_when_daemon_hangs() {
        // `tail -f /dev/null` produces no output at all, so the listener
        // never signals and the 20 s timeout must fire.
        let mut child = Command::new("tail")
            .arg("-f")
            .arg("/dev/null")
            .stdout(std::process::Stdio::piped())
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();

        let (tx, rx) = oneshot::channel();
        tokio::spawn(listen_for_init(BufReader::new(stdout), tx));

        let outcome = tokio::time::timeout(INIT_TIMEOUT, rx).await;
        assert!(outcome.is_err());

        child.kill().await.unwrap();
    }

    #[test]
    fn test_rewrite_replaces_existing_directives() {
        let config = "client\ntun-mtu 1400\nmssfix 1300\nkeepalive 5 30\n";
        let rewritten = rewrite_performance(config);
        assert!(rewritten.contains("tun-mtu 1500\n"));
        assert!(rewritten.contains("mssfix 1450\n"));
        assert!(rewritten.contains("keepalive 10 60\n"));
        assert!(!rewritten.contains("1400"));
    }

    #[test]
    fn test_rewrite_appends_missing_directives_in_sections() {
        let config = "\
client\n\
# speed session\n\
\n\
# connection main\n\
\n\
verb 3\n";
        let rewritten = rewrite_performance(config);
        let speed = rewritten.find("# speed session").unwrap();
        let main = rewritten.find("# connection main").unwrap();
        let tun = rewritten.find("tun-mtu 1500").unwrap();
        let mss = rewritten.find("mssfix 1360").unwrap();
        let keep = rewritten.find("keepalive 10 60").unwrap();
        assert!(speed < tun && tun < main);
        assert!(speed < mss && mss < main);
        assert!(main < keep);
    }

    #[test]
    fn test_rewrite_remote_line() {
        let config = "client\nremote old.example.com 443 udp\nverb 3\n";
        let rewritten = rewrite_remote(config, "vpn.example.com");
        assert!(rewritten.contains("remote vpn.example.com 1194 tcp4\n"));
        assert!(!rewritten.contains("old.example.com"));
    }
}
