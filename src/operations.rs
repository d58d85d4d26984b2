//! Real implementations of the collaborator traits.
//!
//! Both the status query and the administrative actions are invocations of
//! the node tooling. Every invocation is bounded by the configured command
//! timeout.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tickwatch::testing::{ActionDispatcher, StatusSource};
use tickwatch::{NodeEndpoint, RecoveryAction, WatchdogConfig, WatchdogError};
use tokio::process::Command;
use tracing::debug;

/// Node tooling driven through subprocesses.
#[derive(Debug, Clone)]
pub struct NodeTooling {
    cli_path: PathBuf,
    broadcaster_path: PathBuf,
    seed: String,
    timeout: Duration,
}

impl NodeTooling {
    /// Create tooling from the resolved configuration.
    #[must_use]
    pub fn new(config: &WatchdogConfig) -> Self {
        Self {
            cli_path: config.cli_path.clone(),
            broadcaster_path: config.broadcaster_path.clone(),
            seed: config.seed.clone(),
            timeout: config.command_timeout(),
        }
    }

    fn node_args(endpoint: &NodeEndpoint) -> Vec<OsString> {
        vec![
            "-nodeip".into(),
            endpoint.address.clone().into(),
            "-nodeport".into(),
            endpoint.port.to_string().into(),
        ]
    }

    /// Program and arguments for an action.
    #[must_use]
    pub fn action_command(&self, action: &RecoveryAction) -> (PathBuf, Vec<OsString>) {
        match action {
            RecoveryAction::BroadcastEpoch { endpoint, epoch } => (
                self.broadcaster_path.clone(),
                vec![
                    endpoint.address.clone().into(),
                    epoch.to_string().into(),
                    endpoint.port.to_string().into(),
                ],
            ),
            RecoveryAction::ToggleMainAux { endpoint, roles } => {
                let mut args = self.seeded_args(endpoint);
                args.push("-tooglemainaux".into());
                args.extend(roles.iter().map(OsString::from));
                (self.cli_path.clone(), args)
            }
            RecoveryAction::RefreshPeerList { endpoint } => {
                let mut args = self.seeded_args(endpoint);
                args.push("-refreshpeerlist".into());
                (self.cli_path.clone(), args)
            }
            RecoveryAction::ReissueVote { endpoint } => {
                let mut args = self.seeded_args(endpoint);
                args.push("-reissuevote".into());
                (self.cli_path.clone(), args)
            }
        }
    }

    /// Program and arguments for the status query.
    #[must_use]
    pub fn status_command(&self, endpoint: &NodeEndpoint) -> (PathBuf, Vec<OsString>) {
        let mut args = Self::node_args(endpoint);
        args.push("-getcurrenttick".into());
        (self.cli_path.clone(), args)
    }

    fn seeded_args(&self, endpoint: &NodeEndpoint) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-seed".into(), self.seed.clone().into()];
        args.extend(Self::node_args(endpoint));
        args
    }

    async fn execute(&self, program: &Path, args: &[OsString]) -> Result<Output> {
        debug!(program = %program.display(), "Running node tool");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", program.display()))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                output.with_context(|| format!("Failed to wait for {}", program.display()))
            }
            Err(_) => Err(WatchdogError::CommandTimeout {
                command: program.display().to_string(),
                seconds: self.timeout.as_secs(),
            }
            .into()),
        }
    }
}

/// Stdout and stderr merged line-wise, trimmed.
fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text.trim().to_string()
}

#[async_trait]
impl StatusSource for NodeTooling {
    async fn query_status(&self, endpoint: &NodeEndpoint) -> Result<String> {
        let (program, args) = self.status_command(endpoint);
        let output = self.execute(&program, &args).await.map_err(|err| {
            WatchdogError::status_query(endpoint.to_string(), format!("{err:#}"))
        })?;

        // A non-zero exit still carries the tool's message for the parser
        Ok(combined_output(&output))
    }
}

#[async_trait]
impl ActionDispatcher for NodeTooling {
    async fn dispatch(&self, action: &RecoveryAction) -> Result<()> {
        let (program, args) = self.action_command(action);
        let output = self.execute(&program, &args).await?;
        let text = combined_output(&output);
        debug!(action = %action, output = %text, "Node tool finished");

        if output.status.success() {
            Ok(())
        } else {
            bail!(WatchdogError::dispatch(
                action.kind().to_string(),
                action.endpoint().to_string(),
                format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    text
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tooling() -> NodeTooling {
        let config = WatchdogConfig {
            seed: "seedvalue".to_string(),
            ..WatchdogConfig::default()
        };
        NodeTooling::new(&config)
    }

    fn node() -> NodeEndpoint {
        NodeEndpoint::new("10.0.0.1", 31841)
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_status_command() {
        let (program, args) = tooling().status_command(&node());
        assert_eq!(program, PathBuf::from("./qubic-cli"));
        assert_eq!(
            strings(&args),
            vec!["-nodeip", "10.0.0.1", "-nodeport", "31841", "-getcurrenttick"]
        );
    }

    #[test]
    fn test_broadcast_command() {
        let (program, args) = tooling().action_command(&RecoveryAction::BroadcastEpoch {
            endpoint: node(),
            epoch: 143,
        });
        assert_eq!(program, PathBuf::from("./broadcastComputorTestnet"));
        assert_eq!(strings(&args), vec!["10.0.0.1", "143", "31841"]);
    }

    #[test]
    fn test_toggle_command() {
        let (_, args) = tooling().action_command(&RecoveryAction::ToggleMainAux {
            endpoint: node(),
            roles: ["MAIN".to_string(), "AUX".to_string()],
        });
        assert_eq!(
            strings(&args),
            vec![
                "-seed",
                "seedvalue",
                "-nodeip",
                "10.0.0.1",
                "-nodeport",
                "31841",
                "-tooglemainaux",
                "MAIN",
                "AUX"
            ]
        );
    }

    #[test]
    fn test_refresh_and_reissue_commands() {
        let (_, refresh) =
            tooling().action_command(&RecoveryAction::RefreshPeerList { endpoint: node() });
        assert_eq!(strings(&refresh).last().map(String::as_str), Some("-refreshpeerlist"));

        let (_, reissue) =
            tooling().action_command(&RecoveryAction::ReissueVote { endpoint: node() });
        assert_eq!(strings(&reissue).last().map(String::as_str), Some("-reissuevote"));
        assert_eq!(strings(&reissue)[..2], ["-seed".to_string(), "seedvalue".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_tool_is_a_query_error() {
        let config = WatchdogConfig {
            cli_path: PathBuf::from("/nonexistent/qubic-cli"),
            ..WatchdogConfig::default()
        };
        let err = NodeTooling::new(&config)
            .query_status(&node())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WatchdogError>(),
            Some(WatchdogError::StatusQuery { endpoint, .. }) if endpoint == "10.0.0.1:31841"
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_status_split_across_streams_still_parses() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let script = temp.path().join("qubic-cli");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf 'Tick: 10\\nEpoch: 1'\nprintf 'Initial tick: 0\\n' >&2\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = WatchdogConfig {
            cli_path: script,
            ..WatchdogConfig::default()
        };
        let text = NodeTooling::new(&config)
            .query_status(&node())
            .await
            .unwrap();
        assert_eq!(text, "Tick: 10\nEpoch: 1\nInitial tick: 0");

        let snapshot = tickwatch::StatusParser::new().unwrap().parse(&text).unwrap();
        assert_eq!(snapshot, tickwatch::TickSnapshot::new(10, 1, 0));
    }

    #[tokio::test]
    async fn test_missing_tool_is_a_dispatch_failure() {
        let config = WatchdogConfig {
            cli_path: PathBuf::from("/nonexistent/qubic-cli"),
            ..WatchdogConfig::default()
        };
        let result = NodeTooling::new(&config)
            .dispatch(&RecoveryAction::ReissueVote { endpoint: node() })
            .await;
        assert!(result.is_err());
    }
}
