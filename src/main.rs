//! AWS session credentials backed by the OS keyring.
//!
//! Long-lived access keys never touch `~/.aws/credentials`. `setup` stores
//! them in the platform secret store and registers this executable as the
//! profile's `credential_process`; the AWS SDKs and CLI then call `session`,
//! which hands back a cached session token or exchanges the keys (with an MFA
//! code when the profile has a device) for a fresh one.
//!
//! The program performs the following operations:
//! 1. Parses command-line arguments for the subcommand and its profile
//! 2. Installs the log sinks that subcommand uses
//! 3. Runs the subcommand
//! 4. Reports any failure as a single line and sets the exit code

use std::{
    env,
    io::{self, Write},
    process,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{Level, LevelFilter, error, warn};

mod cli;
mod config;
mod credentials;
mod error;
mod output;
mod profile;
mod prompt;
mod session;
mod setup;
mod sts;
mod totp;
mod validation;
mod vault;

use cli::{Args, Command, CommonArgs};
use config::{AwsConfig, RegionLookup};
use credentials::SessionPayload;
use output::{ConditionalLogger, Console, FileLogger, LoggerStack};
use profile::ProfileKey;
use prompt::{PromptContext, PromptSelector};
use session::Negotiator;
use setup::TerminalForm;
use sts::StsExchange;
use vault::{KeyRing, KeyringStore};

const EXIT_FAILURE: i32 = 1;

#[tokio::main]
async fn main() {
    let Args { command } = Args::parse();
    install_logger(&command);

    let code = match run(command).await {
        Ok(code) => code,
        Err(e) => {
            report(&e);
            EXIT_FAILURE
        }
    };

    log::logger().flush();
    let _ = io::stdout().flush();
    process::exit(code);
}

/// Composes and installs the log sinks for `command`.
///
/// `setup` is interactive and logs to the console and the log file. `session`
/// and `exec` write their output for other programs, so only errors reach the
/// console and everything else goes to the file.
fn install_logger(command: &Command) {
    let console = Console::new();
    let file = FileLogger::default_path()
        .context("Could not determine a directory for the log file")
        .and_then(|path| {
            FileLogger::open(&path, LevelFilter::Info)
                .with_context(|| format!("Could not open log file {}", path.display()))
        });
    let (file, file_error) = match file {
        Ok(file) => (Some(file), None),
        Err(e) => (None, Some(e)),
    };

    let stack = match command {
        Command::Setup { .. } => {
            let stack = LoggerStack::new().push(console);
            match file {
                Some(file) => stack.push(file),
                None => stack,
            }
        }
        Command::Session { .. } | Command::Exec { .. } => {
            let stack = match file {
                Some(file) => LoggerStack::new().push(file),
                None => LoggerStack::new(),
            };
            stack.push(ConditionalLogger::new(console, &[Level::Error]))
        }
    };

    if output::install(stack).is_err() {
        return;
    }
    if let Some(e) = file_error {
        warn!("{e:#}");
    }
}

/// Runs the subcommand and returns the exit code on success.
async fn run(command: Command) -> Result<i32> {
    match command {
        Command::Setup { profile } => {
            let profile = ProfileKey::new(profile.as_deref());
            let exe = env::current_exe().context("Could not locate this executable")?;
            let config = AwsConfig::from_env()?;
            let keyring = KeyRing::new(KeyringStore);

            setup::run(&keyring, &config, &TerminalForm, &profile, &exe).await?;
            Ok(0)
        }
        Command::Session {
            profile,
            output,
            common,
        } => {
            let payload = login(profile.as_deref(), common, false).await?;
            println!("{}", session::render(&payload, output)?);
            Ok(0)
        }
        Command::Exec {
            profile,
            common,
            command,
            args,
        } => {
            let payload = login(profile.as_deref(), common, true).await?;
            let status = tokio::process::Command::new(&command)
                .args(&args)
                .envs(payload.env_vars())
                .status()
                .await
                .with_context(|| format!("Failed to run {command}"))?;

            Ok(status.code().unwrap_or(EXIT_FAILURE))
        }
    }
}

/// Resolves everything the login state machine needs and runs it.
///
/// `terminal` sets whether the terminal may be used for MFA prompts when the
/// `--terminal` flag is absent.
async fn login(profile: Option<&str>, common: CommonArgs, terminal: bool) -> Result<SessionPayload> {
    let CommonArgs {
        region,
        prompt,
        terminal: allow_terminal,
    } = common;

    let profile = ProfileKey::new(profile);
    // Read only if the cache misses.
    let region = RegionLookup::new(region, AwsConfig::from_env()?);

    let negotiator = Negotiator::new(
        KeyRing::new(KeyringStore),
        StsExchange,
        PromptSelector::new(PromptContext::detect(prompt, allow_terminal || terminal)),
    );

    Ok(negotiator.login(&profile, &region).await?)
}

/// Prints a failure as one line. Cancellation is not an error and is echoed
/// without going through the error log.
fn report(e: &anyhow::Error) {
    match e.downcast_ref::<error::Error>() {
        Some(error::Error::Cancelled) => eprintln!("{e}"),
        _ => error!("{e:#}"),
    }
}
