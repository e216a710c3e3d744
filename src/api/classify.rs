//! Response-length categories returned by the classifier model.

use std::fmt;
use std::str::FromStr;

/// Token budget used when classification fails or returns an unknown label.
pub const FALLBACK_MAX_TOKENS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseLength {
    Brief,
    Short,
    Medium,
    Detailed,
    Comprehensive,
    Extensive,
}

impl ResponseLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brief => "BRIEF",
            Self::Short => "SHORT",
            Self::Medium => "MEDIUM",
            Self::Detailed => "DETAILED",
            Self::Comprehensive => "COMPREHENSIVE",
            Self::Extensive => "EXTENSIVE",
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            Self::Brief => 25,
            Self::Short => 50,
            Self::Medium => 120,
            Self::Detailed => 250,
            Self::Comprehensive => 400,
            Self::Extensive => 600,
        }
    }
}

impl fmt::Display for ResponseLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseLength {
    type Err = String;

    /// Accepts the bare label with surrounding whitespace or punctuation, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphabetic())
            .to_ascii_uppercase();
        match label.as_str() {
            "BRIEF" => Ok(Self::Brief),
            "SHORT" => Ok(Self::Short),
            "MEDIUM" => Ok(Self::Medium),
            "DETAILED" => Ok(Self::Detailed),
            "COMPREHENSIVE" => Ok(Self::Comprehensive),
            "EXTENSIVE" => Ok(Self::Extensive),
            _ => Err(format!("unknown response length: {s}")),
        }
    }
}

/// Token budget for a classifier reply; unknown labels fall back to [`FALLBACK_MAX_TOKENS`].
pub fn budget_for(label: &str) -> (u32, ResponseLength) {
    match label.parse::<ResponseLength>() {
        Ok(length) => (length.max_tokens(), length),
        Err(_) => (FALLBACK_MAX_TOKENS, ResponseLength::Detailed),
    }
}
