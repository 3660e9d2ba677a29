use clap::{Parser, Subcommand};

/// clubgate: public-access API for the club attendance links
#[derive(Debug, Parser)]
#[command(name = "clubgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (overrides CLUBGATE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Mint a pass with these comma-separated scopes on startup (repeatable)
        #[arg(long = "seed-pass", value_name = "SCOPES")]
        seed_passes: Vec<String>,
    },

    /// Manage access passes
    Pass {
        #[command(subcommand)]
        command: PassCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum PassCommands {
    /// Mint a new access pass
    Create {
        /// Comma-separated scopes, e.g. students:read,attendance:write
        #[arg(long, value_delimiter = ',', required = true)]
        scopes: Vec<String>,
        /// Free-form note shown in `pass list`
        #[arg(long)]
        label: Option<String>,
        /// Hours until the pass expires; omit for a pass that never expires
        #[arg(long)]
        ttl_hours: Option<u32>,
    },
    /// List access passes
    List,
    /// Disable an access pass
    Revoke {
        #[arg(long)]
        token: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pass_create() {
        let cli = Cli::try_parse_from([
            "clubgate",
            "pass",
            "create",
            "--scopes",
            "students:read,attendance:write",
            "--label",
            "friday volunteers",
            "--ttl-hours",
            "48",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Pass {
                command: PassCommands::Create { scopes, label, ttl_hours },
            }) => {
                assert_eq!(scopes, vec!["students:read", "attendance:write"]);
                assert_eq!(label.as_deref(), Some("friday volunteers"));
                assert_eq!(ttl_hours, Some(48));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_seed_passes() {
        let cli = Cli::try_parse_from([
            "clubgate",
            "serve",
            "--seed-pass",
            "students:read,attendance:read",
            "--seed-pass",
            "attendance:write",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Serve { port, seed_passes }) => {
                assert_eq!(port, None);
                assert_eq!(seed_passes, vec!["students:read,attendance:read", "attendance:write"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_pass_create_requires_scopes() {
        assert!(Cli::try_parse_from(["clubgate", "pass", "create"]).is_err());
    }

    #[test]
    fn test_no_command_defaults_to_none() {
        let cli = Cli::try_parse_from(["clubgate"]).unwrap();
        assert!(cli.command.is_none());
    }
}
