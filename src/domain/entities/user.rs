use std::fmt;

use super::Snowflake;

/// Represents a user (or guild member) on the chat platform
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub id: Snowflake,
    pub name: String,
    pub discriminator: Option<u16>,
    pub global_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bot: bool,
}

impl User {
    pub fn new(id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            discriminator: None,
            global_name: None,
            avatar_url: None,
            bot: false,
        }
    }

    pub fn with_discriminator(mut self, discriminator: u16) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    pub fn with_global_name(mut self, name: impl Into<String>) -> Self {
        self.global_name = Some(name.into());
        self
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    pub fn as_bot(mut self) -> Self {
        self.bot = true;
        self
    }

    /// Name shown in the client: global display name if set, else the username
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.name)
    }

    /// `<@id>` mention markup
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.discriminator {
            Some(d) if d != 0 => write!(f, "{}#{}", self.name, d),
            _ => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let legacy = User::new(1, "Mock Member 0").with_discriminator(1000);
        assert_eq!(legacy.to_string(), "Mock Member 0#1000");

        let migrated = User::new(2, "roomba").with_discriminator(0);
        assert_eq!(migrated.to_string(), "roomba");
    }

    #[test]
    fn test_display_name_prefers_global_name() {
        let user = User::new(1, "roomba");
        assert_eq!(user.display_name(), "roomba");
        assert_eq!(user.with_global_name("Roomba!").display_name(), "Roomba!");
    }
}
