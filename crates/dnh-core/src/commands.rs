// ── Lifecycle command collections ──
//
// Shell commands configured to run at startup, on reset, on a fatal
// error, and at shutdown. Every command in a collection is spawned at
// once; the hub never waits on them.

use std::process::Stdio;

use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// A named batch of shell commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandsCollection {
    name: String,
    commands: Vec<String>,
}

impl CommandsCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn add_command(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Spawn every command through the platform shell, in order,
    /// without waiting. Returns how many started.
    ///
    /// Children are handed to the tokio runtime, which reaps them once
    /// they exit. Outside a runtime nothing is spawned.
    pub fn execute(&self) -> usize {
        if self.commands.is_empty() {
            return 0;
        }
        if Handle::try_current().is_err() {
            warn!(collection = %self.name, "no async runtime, commands not run");
            return 0;
        }

        let mut started = 0;
        for command in &self.commands {
            match shell(command).spawn() {
                Ok(child) => {
                    debug!(collection = %self.name, pid = ?child.id(), command = %command, "spawned command");
                    started += 1;
                }
                Err(e) => {
                    warn!(collection = %self.name, command = %command, error = %e, "failed to spawn command");
                }
            }
        }
        started
    }
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    detach(cmd)
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    detach(cmd)
}

fn detach(mut cmd: Command) -> Command {
    cmd.stdin(Stdio::null()).kill_on_drop(false);
    cmd
}

// ── LifecycleCommands ────────────────────────────────────────────────

/// The four collections a hub runs over its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleCommands {
    pub startup: CommandsCollection,
    pub reset: CommandsCollection,
    pub fatal: CommandsCollection,
    pub end: CommandsCollection,
}

impl Default for LifecycleCommands {
    fn default() -> Self {
        Self {
            startup: CommandsCollection::new("startupcmds"),
            reset: CommandsCollection::new("resetcmds"),
            fatal: CommandsCollection::new("fatalcmds"),
            end: CommandsCollection::new("endcmds"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collections_are_named_after_config_keys() {
        let cmds = LifecycleCommands::default();
        assert_eq!(cmds.startup.name(), "startupcmds");
        assert_eq!(cmds.reset.name(), "resetcmds");
        assert_eq!(cmds.fatal.name(), "fatalcmds");
        assert_eq!(cmds.end.name(), "endcmds");
    }

    #[test]
    fn add_and_clear() {
        let mut col = CommandsCollection::new("x");
        assert!(col.is_empty());
        col.add_command("echo one");
        col.add_command("echo two");
        assert_eq!(col.len(), 2);
        assert_eq!(col.commands(), ["echo one", "echo two"]);
        col.clear();
        assert!(col.is_empty());
        assert_eq!(col.execute(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_spawns_without_waiting() {
        let mut col = CommandsCollection::new("startupcmds");
        col.add_command("sleep 5");
        col.add_command("true");
        let started = std::time::Instant::now();
        assert_eq!(col.execute(), 2);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawned_commands_run_to_completion() {
        let marker = std::env::temp_dir().join(format!("dnh-cmd-{}.done", std::process::id()));
        let _ = std::fs::remove_file(&marker);

        let mut col = CommandsCollection::new("endcmds");
        col.add_command(format!("touch {}", marker.display()));
        assert_eq!(col.execute(), 1);

        for _ in 0..100 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(marker.exists());
        let _ = std::fs::remove_file(&marker);
    }

    #[test]
    fn execute_outside_runtime_starts_nothing() {
        let mut col = CommandsCollection::new("resetcmds");
        col.add_command("true");
        assert_eq!(col.execute(), 0);
    }
}
