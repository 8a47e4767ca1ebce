//! The collector child process.

use std::io;
use std::net::SocketAddr;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};

/// Environment variable telling the collector where the control surface is.
pub const SCRAPER_ADDRESS_VAR: &str = "SCRAPER_ADDRESS";

/// A running collector.
#[derive(Debug)]
pub struct Collector {
    child: Child,
}

impl Collector {
    /// Start `command` with inherited stdio and `SCRAPER_ADDRESS` pointing at `address`.
    pub fn spawn(command: &[String], address: SocketAddr) -> io::Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no collector command given"))?;

        let scraper_address = format!("http://{address}");
        let child = Command::new(program)
            .args(args)
            .env(SCRAPER_ADDRESS_VAR, &scraper_address)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        tracing::info!(program = %program, scraper_address = %scraper_address, pid = ?child.id(), "Collector started");
        Ok(Self { child })
    }

    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Kill the collector and reap it.
    pub async fn stop(&mut self) -> io::Result<ExitStatus> {
        self.child.start_kill()?;
        self.child.wait().await
    }
}

/// Exit code to mirror; signals and unknown statuses map to 1.
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_collector_sees_scraper_address() {
        let address: SocketAddr = "127.0.0.1:4321".parse().unwrap();
        let mut collector = Collector::spawn(
            &sh(r#"test "$SCRAPER_ADDRESS" = "http://127.0.0.1:4321" && exit 3"#),
            address,
        )
        .unwrap();
        let status = collector.wait().await.unwrap();
        assert_eq!(exit_code(status), 3);
    }

    #[tokio::test]
    async fn test_stop_kills_collector() {
        let address: SocketAddr = "127.0.0.1:4321".parse().unwrap();
        let mut collector = Collector::spawn(&sh("sleep 30"), address).unwrap();
        let status = collector.stop().await.unwrap();
        assert!(!status.success());
        assert_eq!(exit_code(status), 1);
    }

    #[test]
    fn test_empty_command_rejected() {
        let address: SocketAddr = "127.0.0.1:4321".parse().unwrap();
        let err = Collector::spawn(&[], address).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
