/// Service name written into every row
pub(crate) const SERVICE_NAME: &str = "xlayer-fp-challenger";

/// Fixed chain name
pub(crate) const CHAIN_NAME: &str = "X Layer";

/// Decision stage in the challenge lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeStage {
    /// Output proposal received from the oracle
    OutputObserved = 16010,

    /// Proposed root differs from the trusted root
    MismatchDetected = 16020,

    /// No trusted root was known for the proposed block
    UnknownRoot = 16022,

    /// Mismatch already has a pending or in-flight challenge
    DuplicateSkipped = 16024,

    /// `createGame` confirmed and recorded
    ChallengeSubmitted = 16030,

    /// `createGame` failed or its receipt could not be interpreted
    ChallengeFailed = 16032,

    /// Resolving proof confirmed and record retired
    ResolutionSubmitted = 16040,

    /// Proof construction or submission failed
    ResolutionFailed = 16042,

    /// Resolution window closed before the game was resolved
    ChallengeExpired = 16050,
}

impl ChallengeStage {
    /// Returns the string representation of the stage.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OutputObserved => "output_observed",
            Self::MismatchDetected => "mismatch_detected",
            Self::UnknownRoot => "unknown_root",
            Self::DuplicateSkipped => "challenge_skipped_duplicate",
            Self::ChallengeSubmitted => "challenge_submitted",
            Self::ChallengeFailed => "challenge_failed",
            Self::ResolutionSubmitted => "resolution_submitted",
            Self::ResolutionFailed => "resolution_failed",
            Self::ChallengeExpired => "challenge_expired",
        }
    }

    /// Returns the numeric code of the stage.
    pub const fn as_u64(&self) -> u64 {
        *self as u64
    }

    /// Whether the stage records a failed attempt.
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::ChallengeFailed | Self::ResolutionFailed | Self::ChallengeExpired)
    }
}
