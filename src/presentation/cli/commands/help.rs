use anyhow::{anyhow, Result};
use clap::CommandFactory;
use std::sync::Arc;

use crate::infrastructure::process::CommandRunner;
use crate::infrastructure::vcs::ClientRegistry;
use crate::presentation::cli::Cli;

/// Handler for the help command
pub struct HelpHandler {
    command: Option<String>,
    clients: bool,
    commands: bool,
}

impl HelpHandler {
    pub fn new(command: Option<String>, clients: bool, commands: bool) -> Self {
        Self {
            command,
            clients,
            commands,
        }
    }

    pub fn execute(&self) -> Result<bool> {
        if self.commands {
            println!("{}", Self::command_names().join(" "));
            return Ok(true);
        }
        if self.clients {
            println!("The available VCS clients are:");
            for name in Self::client_names() {
                println!("  {}", name);
            }
            return Ok(true);
        }

        let mut cli = Cli::command();
        match &self.command {
            None => cli.print_help()?,
            Some(name) => {
                let matches: Vec<String> = Self::command_names()
                    .into_iter()
                    .filter(|candidate| candidate.starts_with(name.as_str()))
                    .collect();
                let selected = match matches.as_slice() {
                    [single] => single.clone(),
                    _ if matches.iter().any(|m| m == name) => name.clone(),
                    [] => return Err(anyhow!("Unknown command '{}'", name)),
                    _ => {
                        return Err(anyhow!(
                            "Ambiguous command '{}': {}",
                            name,
                            matches.join(", ")
                        ))
                    }
                };
                let subcommand = cli
                    .find_subcommand_mut(&selected)
                    .ok_or_else(|| anyhow!("Unknown command '{}'", name))?;
                subcommand.print_help()?;
            }
        }
        Ok(true)
    }

    /// Subcommand names in declaration order
    pub fn command_names() -> Vec<String> {
        Cli::command()
            .get_subcommands()
            .map(|c| c.get_name().to_string())
            .collect()
    }

    /// Type tags of the registered clients
    pub fn client_names() -> Vec<&'static str> {
        ClientRegistry::with_default_clients(Arc::new(CommandRunner::new()))
            .types()
            .into_iter()
            .map(|t| t.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        let names = HelpHandler::command_names();
        for expected in [
            "import", "pull", "push", "status", "diff", "log", "branch", "remotes", "custom",
            "validate", "export", "help",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_client_names() {
        assert_eq!(
            HelpHandler::client_names(),
            vec!["bzr", "git", "hg", "svn", "tar", "zip"]
        );
    }

    #[test]
    fn test_unknown_command_is_an_error() {
        let handler = HelpHandler::new(Some("frobnicate".to_string()), false, false);
        assert!(handler.execute().is_err());
    }
}
