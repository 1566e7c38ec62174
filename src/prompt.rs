//! Interactive MFA code entry.
//!
//! When a one-time code cannot be derived from a stored seed, one prompt
//! mechanism is chosen per invocation:
//!
//! 1. Every known mechanism whose executable is not installed is dropped. This
//!    is re-evaluated on each run since tools come and go.
//! 2. The rest are scored by summing the weights of the signals that hold for
//!    them (user choice, matching OS or desktop family, hidden input, ...).
//! 3. The highest score wins. Equal scores go to the mechanism listed first in
//!    [`MECHANISMS`].

use std::{cmp::Reverse, env, path::PathBuf, process::Stdio};

use async_trait::async_trait;
use clap::ValueEnum;
use inquire::{InquireError, Password, PasswordDisplayMode};
use log::{debug, warn};
use tokio::process::Command;

use crate::error::{Error, Result};

/// A way of asking the user for a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum PromptTool {
    /// GNOME dialog tool
    Zenity,
    /// GTK dialog tool, a Zenity fork
    Yad,
    /// KDE dialog tool
    Kdialog,
    /// AppleScript dialog on macOS
    Osascript,
    /// Masked input on the controlling terminal
    Terminal,
}

impl PromptTool {
    pub fn name(self) -> &'static str {
        match self {
            PromptTool::Zenity => "zenity",
            PromptTool::Yad => "yad",
            PromptTool::Kdialog => "kdialog",
            PromptTool::Osascript => "osascript",
            PromptTool::Terminal => "terminal",
        }
    }
}

/// Toolkit family of the running desktop session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopFamily {
    Gtk,
    Qt,
}

impl DesktopFamily {
    const GTK: &'static [&'static str] =
        &["gnome", "unity", "xfce", "mate", "cinnamon", "budgie", "pantheon", "lxde"];
    const QT: &'static [&'static str] = &["kde", "plasma", "lxqt", "deepin", "trinity"];

    /// Reads `XDG_CURRENT_DESKTOP` and `DESKTOP_SESSION`.
    pub fn detect() -> Option<Self> {
        Self::from_session(
            env::var("XDG_CURRENT_DESKTOP").ok().as_deref(),
            env::var("DESKTOP_SESSION").ok().as_deref(),
        )
    }

    fn from_session(current_desktop: Option<&str>, session: Option<&str>) -> Option<Self> {
        current_desktop
            .into_iter()
            .flat_map(|value| value.split(':'))
            .chain(session)
            .map(str::to_ascii_lowercase)
            .find_map(|name| {
                if Self::GTK.iter().any(|gtk| name.contains(gtk)) {
                    Some(DesktopFamily::Gtk)
                } else if Self::QT.iter().any(|qt| name.contains(qt)) {
                    Some(DesktopFamily::Qt)
                } else {
                    None
                }
            })
    }
}

/// What is known about the current run when scoring mechanisms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub os: &'static str,
    pub desktop: Option<DesktopFamily>,
    pub chosen: Option<PromptTool>,
    pub allow_terminal: bool,
}

impl PromptContext {
    pub fn detect(chosen: Option<PromptTool>, allow_terminal: bool) -> Self {
        Self {
            os: env::consts::OS,
            desktop: DesktopFamily::detect(),
            chosen,
            allow_terminal,
        }
    }
}

/// A condition contributing weight to a mechanism when it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The user asked for this mechanism.
    Chosen,
    /// The run is on this OS.
    Os(&'static str),
    /// The desktop session belongs to this family.
    Desktop(DesktopFamily),
    /// The mechanism hides the code while it is typed.
    Secure,
    /// Worth trying even when nothing else points to it.
    Keep,
    /// The caller allowed prompting on the terminal.
    TerminalAllowed,
}

impl Signal {
    fn holds(self, tool: PromptTool, context: &PromptContext) -> bool {
        match self {
            Signal::Chosen => context.chosen == Some(tool),
            Signal::Os(os) => context.os == os,
            Signal::Desktop(family) => context.desktop == Some(family),
            Signal::Secure | Signal::Keep => true,
            Signal::TerminalAllowed => context.allow_terminal,
        }
    }
}

const CHOSEN: u32 = 20;
const NATIVE: u32 = 8;
const SECURE: u32 = 1;
const KEEP: u32 = 1;
const TERMINAL: u32 = 1;

const UNIX_DESKTOPS: &[&str] = &["linux", "freebsd", "openbsd", "netbsd", "dragonfly"];

/// Static description of one prompt mechanism.
#[derive(Debug)]
pub struct Mechanism {
    pub tool: PromptTool,
    /// Executable to probe for. `None` means the mechanism needs no program.
    pub binary: Option<&'static str>,
    /// Operating systems where the user could install the tool.
    pub installable_on: &'static [&'static str],
    pub weights: &'static [(Signal, u32)],
    /// Exit codes the tool uses when the user dismisses the dialog.
    pub cancel_codes: &'static [i32],
}

impl Mechanism {
    pub fn weight(&self, context: &PromptContext) -> u32 {
        self.weights
            .iter()
            .filter(|(signal, _)| signal.holds(self.tool, context))
            .map(|(_, weight)| weight)
            .sum()
    }
}

/// Every supported mechanism. Order breaks ties.
pub static MECHANISMS: [Mechanism; 5] = [
    Mechanism {
        tool: PromptTool::Zenity,
        binary: Some("zenity"),
        installable_on: UNIX_DESKTOPS,
        weights: &[
            (Signal::Chosen, CHOSEN),
            (Signal::Desktop(DesktopFamily::Gtk), NATIVE),
            (Signal::Secure, SECURE),
            (Signal::Keep, KEEP),
        ],
        cancel_codes: &[1],
    },
    Mechanism {
        tool: PromptTool::Yad,
        binary: Some("yad"),
        installable_on: UNIX_DESKTOPS,
        weights: &[
            (Signal::Chosen, CHOSEN),
            (Signal::Desktop(DesktopFamily::Gtk), NATIVE - 1),
            (Signal::Secure, SECURE),
        ],
        cancel_codes: &[1, 252],
    },
    Mechanism {
        tool: PromptTool::Kdialog,
        binary: Some("kdialog"),
        installable_on: UNIX_DESKTOPS,
        weights: &[
            (Signal::Chosen, CHOSEN),
            (Signal::Desktop(DesktopFamily::Qt), NATIVE),
            (Signal::Secure, SECURE),
        ],
        cancel_codes: &[1],
    },
    Mechanism {
        tool: PromptTool::Osascript,
        binary: Some("osascript"),
        installable_on: &[],
        weights: &[
            (Signal::Chosen, CHOSEN),
            (Signal::Os("macos"), NATIVE),
            (Signal::Secure, SECURE),
            (Signal::Keep, KEEP),
        ],
        cancel_codes: &[1],
    },
    Mechanism {
        tool: PromptTool::Terminal,
        binary: None,
        installable_on: &[],
        weights: &[
            (Signal::Chosen, CHOSEN),
            (Signal::TerminalAllowed, TERMINAL),
            (Signal::Secure, SECURE),
        ],
        cancel_codes: &[],
    },
];

/// Source of one-time codes typed in by a human.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OtpSource: Send + Sync {
    async fn one_time_code(&self, instructions: &str, title: &str) -> Result<String>;
}

type Locate = dyn Fn(&str) -> Option<PathBuf> + Send + Sync;

/// Picks and runs the best prompt mechanism available on this system.
pub struct PromptSelector {
    context: PromptContext,
    locate: Box<Locate>,
    mechanisms: &'static [Mechanism],
    terminal: Box<dyn OtpSource>,
}

impl PromptSelector {
    /// Probes `PATH` for each dialog tool.
    pub fn new(context: PromptContext) -> Self {
        Self::with_locator(context, |binary| which::which(binary).ok())
    }

    pub fn with_locator<F>(context: PromptContext, locate: F) -> Self
    where
        F: Fn(&str) -> Option<PathBuf> + Send + Sync + 'static,
    {
        Self {
            context,
            locate: Box::new(locate),
            mechanisms: &MECHANISMS,
            terminal: Box::new(TerminalPrompt),
        }
    }

    /// Replaces the terminal input, which otherwise reads from the TTY.
    #[cfg(test)]
    pub fn with_terminal(mut self, terminal: impl OtpSource + 'static) -> Self {
        self.terminal = Box::new(terminal);
        self
    }

    #[cfg(test)]
    fn with_mechanisms(mut self, mechanisms: &'static [Mechanism]) -> Self {
        self.mechanisms = mechanisms;
        self
    }

    /// Mechanisms usable on this run, in table order.
    pub fn available(&self) -> Vec<Prompter> {
        self.mechanisms
            .iter()
            .filter_map(|mechanism| match mechanism.binary {
                Some(binary) => (self.locate)(binary).map(|path| Prompter {
                    mechanism,
                    path: Some(path),
                }),
                // Needs no executable. Consent only adds weight.
                None => Some(Prompter {
                    mechanism,
                    path: None,
                }),
            })
            .collect()
    }

    /// Chooses the mechanism to prompt with on this run.
    ///
    /// # Returns
    /// The highest scoring available mechanism. Equal scores go to the one
    /// listed first. A chosen tool that is not installed is replaced by the
    /// best remaining one with a warning.
    ///
    /// # Errors
    /// [`Error::NoPrompter`] when nothing is available, listing the tools the
    /// user could install on this OS.
    pub fn select(&self) -> Result<Prompter> {
        let winner = self
            .available()
            .into_iter()
            .enumerate()
            .max_by_key(|(index, prompter)| {
                (prompter.mechanism.weight(&self.context), Reverse(*index))
            })
            .map(|(_, prompter)| prompter)
            .ok_or_else(|| Error::NoPrompter {
                installable: self.installable(),
            })?;

        if let Some(chosen) = self.context.chosen {
            if chosen != winner.tool() {
                warn!(
                    "{} is not available, prompting with {} instead",
                    chosen.name(),
                    winner.tool().name()
                );
            }
        }

        debug!("Prompting with {}", winner.tool().name());
        Ok(winner)
    }

    fn installable(&self) -> Vec<&'static str> {
        self.mechanisms
            .iter()
            .filter(|mechanism| mechanism.installable_on.contains(&self.context.os))
            .map(|mechanism| mechanism.tool.name())
            .collect()
    }
}

#[async_trait]
impl OtpSource for PromptSelector {
    async fn one_time_code(&self, instructions: &str, title: &str) -> Result<String> {
        let prompter = self.select()?;
        match prompter.tool() {
            PromptTool::Terminal => self.terminal.one_time_code(instructions, title).await,
            _ => prompter.prompt(instructions, title).await,
        }
    }
}

/// A mechanism that was found on this system.
#[derive(Debug)]
pub struct Prompter {
    mechanism: &'static Mechanism,
    path: Option<PathBuf>,
}

impl Prompter {
    pub fn tool(&self) -> PromptTool {
        self.mechanism.tool
    }

    /// Shows a single masked input and returns what was entered.
    pub async fn prompt(&self, instructions: &str, title: &str) -> Result<String> {
        let Some(path) = &self.path else {
            return TerminalPrompt.one_time_code(instructions, title).await;
        };

        let output = Command::new(path)
            .args(self.arguments(instructions, title))
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .await?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned());
        }

        match output.status.code() {
            Some(code) if self.mechanism.cancel_codes.contains(&code) => Err(Error::Cancelled),
            _ => Err(Error::Prompt(format!(
                "{} exited with {}",
                self.tool().name(),
                output.status
            ))),
        }
    }

    fn arguments(&self, instructions: &str, title: &str) -> Vec<String> {
        match self.tool() {
            PromptTool::Zenity | PromptTool::Yad => owned(&[
                "--entry",
                "--hide-text",
                "--text",
                instructions,
                "--title",
                title,
            ]),
            PromptTool::Kdialog => owned(&["--title", title, "--password", instructions]),
            PromptTool::Osascript => vec![
                "-e".to_owned(),
                format!(
                    "text returned of (display dialog {} with title {} default answer \"\" with hidden answer)",
                    apple_script_string(instructions),
                    apple_script_string(title)
                ),
            ],
            PromptTool::Terminal => Vec::new(),
        }
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| (*arg).to_owned()).collect()
}

fn apple_script_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Masked input on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl OtpSource for TerminalPrompt {
    async fn one_time_code(&self, instructions: &str, title: &str) -> Result<String> {
        let (instructions, title) = (instructions.to_owned(), title.to_owned());
        let answer = tokio::task::spawn_blocking(move || {
            Password::new(&instructions)
                .with_display_mode(PasswordDisplayMode::Masked)
                .without_confirmation()
                .with_help_message(&title)
                .prompt()
        })
        .await
        .map_err(|e| Error::Prompt(e.to_string()))?;

        match answer {
            Ok(code) => Ok(code.trim().to_owned()),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                Err(Error::Cancelled)
            }
            Err(e) => Err(Error::Prompt(e.to_string())),
        }
    }
}
