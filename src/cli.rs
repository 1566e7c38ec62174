//! Command-line interface definitions.

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::{prompt::PromptTool, session::OutputFormat};

/// AWS session credentials backed by the OS keyring.
///
/// Long-lived access keys are stored in the system secret store by `setup`.
/// `session` exchanges them, with an MFA code when required, for temporary
/// credentials in the `credential_process` format and caches the result until
/// it expires.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store credentials for a profile and register it as a credential process
    Setup {
        /// Profile name [default: default]
        #[arg(env = "AWS_PROFILE")]
        profile: Option<String>,
    },

    /// Print session credentials for a profile
    Session {
        /// Profile name [default: default]
        #[arg(env = "AWS_PROFILE")]
        profile: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Run a command with session credentials in its environment
    Exec {
        /// Profile name [default: default]
        #[arg(long, env = "AWS_PROFILE")]
        profile: Option<String>,

        #[command(flatten)]
        common: CommonArgs,

        /// Command to run
        command: String,

        /// Arguments for the command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// Options shared by every subcommand.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct CommonArgs {
    /// AWS region used for the token exchange
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Preferred tool for MFA prompts
    #[arg(long, value_enum, env = "AWS_CREDENTIALS_PROMPT")]
    pub prompt: Option<PromptTool>,

    /// Allow MFA prompts on the terminal
    #[arg(long, hide = true)]
    pub terminal: bool,
}
