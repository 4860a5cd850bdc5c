use std::fmt;

/// Opaque vendor bearer credential.
///
/// Carries no expiry; the only way to learn whether it is still accepted
/// is to present it to the vendor API.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Returns `None` for empty or whitespace-only values.
    pub fn new(value: impl AsRef<str>) -> Option<Self> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.chars().count() <= 8 {
            return write!(f, "Token(***)");
        }
        let shown: String = self.0.chars().take(4).collect();
        write!(f, "Token({}***)", shown)
    }
}
