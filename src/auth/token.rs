/// A GitHub API token. Never printed, not even in debug output.
pub struct Token(String);

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.trim().to_owned())
    }
}

impl Token {
    /// Builds a token from an optional CLI/env value, treating blank input as
    /// no token at all.
    pub fn from_optional(value: Option<&str>) -> Option<Self> {
        value.map(Self::from).filter(|t| !t.0.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}
