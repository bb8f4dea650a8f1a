use serde::Serialize;

/// Advisory password strength. Never blocks registration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl PasswordStrength {
    /// Score a password: 25 points each for length, lowercase, uppercase,
    /// digits and symbols.
    pub fn of(password: &str) -> Self {
        let checks = [
            password.chars().count() >= 8,
            password.chars().any(|c| c.is_ascii_lowercase()),
            password.chars().any(|c| c.is_ascii_uppercase()),
            password.chars().any(|c| c.is_ascii_digit()),
            password.chars().any(|c| !c.is_ascii_alphanumeric()),
        ];
        let score = 25 * checks.iter().filter(|&&passed| passed).count();
        match score {
            0..=25 => Self::Weak,
            26..=50 => Self::Medium,
            51..=75 => Self::Strong,
            _ => Self::VeryStrong,
        }
    }

    /// Fill level of the strength meter.
    pub fn percentage(self) -> u8 {
        match self {
            Self::Weak => 25,
            Self::Medium => 50,
            Self::Strong => 75,
            Self::VeryStrong => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Weak => "Weak",
            Self::Medium => "Medium",
            Self::Strong => "Strong",
            Self::VeryStrong => "Very Strong",
        }
    }
}
