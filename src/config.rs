//! AWS shared config file access.
//!
//! The config file is only touched for two things: looking up a profile's
//! region and recording the `credential_process` command that makes the AWS
//! SDKs and CLI call back into this tool. Section names are the profile keys
//! (`default`, `profile <name>`).

use std::{
    env, fmt, io,
    path::{Path, PathBuf},
};

use configparser::ini::{Ini, IniDefault};
use log::debug;
use tokio::fs;

use crate::{
    error::{Error, Result},
    profile::ProfileKey,
};

/// Key managed by this tool in each profile section.
pub const CREDENTIAL_PROCESS: &str = "credential_process";

// configparser writes its default section without a header. The AWS `default`
// profile must keep its `[default]` header, so the parser's own default is
// moved out of the way.
const PARSER_DEFAULT_SECTION: &str = "\u{0}top-level";

/// Whether a profile section existed before it was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    Updated,
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Registration::Created => "created",
            Registration::Updated => "updated",
        })
    }
}

/// The AWS config file (`~/.aws/config` unless `AWS_CONFIG_FILE` says otherwise).
#[derive(Debug, Clone)]
pub struct AwsConfig {
    path: PathBuf,
}

impl AwsConfig {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn from_env() -> Result<Self> {
        let path = resolve_path(env::var("AWS_CONFIG_FILE").ok(), dirs::home_dir())?;
        debug!("Using AWS config at {}", path.display());
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the config file. A missing file reads as empty.
    ///
    /// Values are kept verbatim: `#` and `;` only start a comment at the
    /// beginning of a line (SSO start URLs end in `#/`), and indented
    /// sub-settings such as `s3 =` blocks stay attached to their key.
    pub async fn load(&self) -> Result<Ini> {
        let mut defaults = IniDefault::default();
        defaults.default_section = PARSER_DEFAULT_SECTION.to_owned();
        defaults.case_sensitive = true;
        defaults.multiline = true;
        defaults.enable_inline_comments = false;
        let mut ini = Ini::new_from_defaults(defaults);

        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ini),
            Err(e) => return Err(e.into()),
        };

        ini.read(content)
            .map_err(|e| Error::Config(format!("{}: {e}", self.path.display())))?;
        Ok(ini)
    }

    /// Region configured for the profile, else for `[default]`.
    pub async fn region(&self, profile: &ProfileKey) -> Result<Option<String>> {
        Ok(configured_region(&self.load().await?, profile))
    }

    /// Points the profile's `credential_process` at `command`, keeping every
    /// other key and section, and rewrites the whole file.
    ///
    /// # Arguments
    /// * `profile` - Section to create or update
    /// * `command` - Full command line the AWS tooling should run
    ///
    /// # Returns
    /// Whether the section was created or already existed.
    ///
    /// # Errors
    /// Fails if the existing file cannot be read or parsed, or the new one
    /// cannot be written. The file is left untouched when parsing fails.
    pub async fn register_credential_process(
        &self,
        profile: &ProfileKey,
        command: &str,
    ) -> Result<Registration> {
        let mut ini = self.load().await?;
        let registration = if ini.sections().iter().any(|s| s == profile.as_str()) {
            Registration::Updated
        } else {
            Registration::Created
        };

        ini.set(profile.as_str(), CREDENTIAL_PROCESS, Some(command.to_owned()));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, ini.writes()).await?;

        Ok(registration)
    }
}

fn resolve_path(configured: Option<String>, home_dir: Option<PathBuf>) -> Result<PathBuf> {
    let home = || {
        home_dir
            .clone()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))
    };

    match configured.filter(|path| !path.is_empty()) {
        None => Ok(home()?.join(".aws").join("config")),
        Some(path) if path == "~" => home(),
        Some(path) => match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
            Some(rest) => Ok(home()?.join(rest)),
            None if path.starts_with('~') => Err(Error::Config(format!(
                "{path}: only ~ expansion to the current user's home is supported"
            ))),
            None => Ok(PathBuf::from(path)),
        },
    }
}

fn configured_region(ini: &Ini, profile: &ProfileKey) -> Option<String> {
    ini.get(profile.as_str(), "region")
        .or_else(|| ini.get("default", "region"))
        .filter(|region| !region.is_empty())
}

/// Region for the token exchange, looked up only once an exchange is needed.
///
/// Precedence: explicit value (`--region` or `AWS_REGION`), the profile's
/// config section, `[default]`, then `AWS_DEFAULT_REGION`.
#[derive(Debug, Clone)]
pub struct RegionLookup {
    explicit: Option<String>,
    config: Option<AwsConfig>,
}

impl RegionLookup {
    pub fn new(explicit: Option<String>, config: AwsConfig) -> Self {
        Self {
            explicit,
            config: Some(config),
        }
    }

    /// Never reads the config file or the environment.
    #[cfg(test)]
    pub fn fixed(region: Option<&str>) -> Self {
        Self {
            explicit: region.map(str::to_owned),
            config: None,
        }
    }

    /// # Errors
    /// Fails if the config file has to be read and cannot be parsed.
    pub async fn resolve(&self, profile: &ProfileKey) -> Result<Option<String>> {
        if let Some(region) = self.explicit.as_deref().filter(|region| !region.is_empty()) {
            return Ok(Some(region.to_owned()));
        }
        let Some(config) = &self.config else {
            return Ok(None);
        };
        if let Some(region) = config.region(profile).await? {
            return Ok(Some(region));
        }
        Ok(env::var("AWS_DEFAULT_REGION").ok().filter(|region| !region.is_empty()))
    }
}
