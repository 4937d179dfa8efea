//! CLI argument parsing for the leadwave-worker binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "leadwave-worker", about = "LeadWave CRM backend worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Admin account management
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Create or update the platform superadmin interactively
    CreateSuperadmin {
        /// Superadmin email address
        #[arg(long)]
        email: String,
        /// Display name for the account
        #[arg(long, default_value = "Platform Superadmin")]
        name: String,
    },
    /// Reset any account's password interactively
    ResetPassword {
        /// Account email address
        #[arg(long)]
        email: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["leadwave-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["leadwave-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_serve_command_parses() {
        let cli = Cli::parse_from(["leadwave-worker", "serve"]);
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn test_cli_create_superadmin_parses() {
        let cli = Cli::parse_from([
            "leadwave-worker",
            "admin",
            "create-superadmin",
            "--email",
            "root@example.com",
        ]);
        match cli.command {
            Some(Command::Admin {
                command: AdminCommand::CreateSuperadmin { email, name },
            }) => {
                assert_eq!(email, "root@example.com");
                assert_eq!(name, "Platform Superadmin");
            }
            _ => panic!("expected admin create-superadmin"),
        }
    }

    #[test]
    fn test_cli_reset_password_parses() {
        let cli = Cli::parse_from([
            "leadwave-worker",
            "admin",
            "reset-password",
            "--email",
            "sales@example.com",
        ]);
        match cli.command {
            Some(Command::Admin {
                command: AdminCommand::ResetPassword { email },
            }) => assert_eq!(email, "sales@example.com"),
            _ => panic!("expected admin reset-password"),
        }
    }
}
