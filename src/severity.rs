use serde::Serialize;

/// PHQ-9 score at or above which a clinical referral should be suggested.
pub const REFERRAL_THRESHOLD: u8 = 20;

/// Conventional PHQ-9 severity bands. Used as a reporting signal only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phq9Severity {
    None,
    Minimal,
    Mild,
    Moderate,
    ModeratelySevere,
    Severe,
}

impl Phq9Severity {
    /// Band for a 0-27 score. Scores above 27 count as severe.
    pub fn from_score(score: u8) -> Self {
        match score {
            0 => Self::None,
            1..=4 => Self::Minimal,
            5..=9 => Self::Mild,
            10..=14 => Self::Moderate,
            15..=19 => Self::ModeratelySevere,
            _ => Self::Severe,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "no symptoms",
            Self::Minimal => "minimal",
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::ModeratelySevere => "moderately severe",
            Self::Severe => "severe",
        }
    }
}

/// Whether a score warrants suggesting professional help.
pub fn needs_referral(score: u8) -> bool {
    score >= REFERRAL_THRESHOLD
}
