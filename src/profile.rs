//! Profile naming.
//!
//! The keyring entries and the AWS config sections of one profile share a
//! single key so either side can be found from the profile name alone.

use std::fmt;

/// Lookup key shared by the secret store and the AWS config file.
///
/// `default` when no profile name is given, `profile <name>` otherwise. Setup
/// and session must derive it the same way or stored credentials become
/// unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProfileKey {
    key: String,
    name: Option<String>,
}

impl ProfileKey {
    pub fn new(profile: Option<&str>) -> Self {
        match profile.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => Self {
                key: format!("profile {name}"),
                name: Some(name.to_owned()),
            },
            None => Self {
                key: "default".to_owned(),
                name: None,
            },
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The user-facing profile name, `None` for the default profile.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("default")
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_empty_profile_is_default() {
        assert_eq!(ProfileKey::new(None).as_str(), "default");
        assert_eq!(ProfileKey::new(Some("")).as_str(), "default");
        assert_eq!(ProfileKey::new(Some("  ")).as_str(), "default");
        assert_eq!(ProfileKey::new(None).name(), None);
    }

    #[test]
    fn named_profile_gets_section_prefix() {
        let key = ProfileKey::new(Some("work"));
        assert_eq!(key.as_str(), "profile work");
        assert_eq!(key.name(), Some("work"));
        assert_eq!(key.to_string(), "profile work");
    }
}
