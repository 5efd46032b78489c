use std::fmt;

/// One end of a score range; both ends are inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBound {
    /// No lower limit
    NegInfinity,
    /// Scores up to and including this value
    Inclusive(i64),
    /// No upper limit
    PosInfinity,
}

impl ScoreBound {
    /// Whether `score` is at or above this bound when used as a minimum
    pub fn admits_from_below(&self, score: i64) -> bool {
        match self {
            ScoreBound::NegInfinity => true,
            ScoreBound::Inclusive(min) => score >= *min,
            ScoreBound::PosInfinity => false,
        }
    }

    /// Whether `score` is at or below this bound when used as a maximum
    pub fn admits_from_above(&self, score: i64) -> bool {
        match self {
            ScoreBound::NegInfinity => false,
            ScoreBound::Inclusive(max) => score <= *max,
            ScoreBound::PosInfinity => true,
        }
    }
}

impl fmt::Display for ScoreBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreBound::NegInfinity => f.write_str("-inf"),
            ScoreBound::Inclusive(score) => write!(f, "{}", score),
            ScoreBound::PosInfinity => f.write_str("+inf"),
        }
    }
}

/// A single operation against a subject's ordered log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Add `member` with the given score
    InsertScored { member: String, score: i64 },
    /// Remove every member whose score lies in `[min, max]`
    RemoveScoreRange { min: ScoreBound, max: ScoreBound },
    /// Count the members currently stored
    Cardinality,
    /// Let the whole log lapse after `ttl_ms` without further writes
    ExpireAfter { ttl_ms: u64 },
}

/// Reply to a [`StoreOp`], in the same position as the op in its batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreReply {
    /// Number of members newly added (0 when the member already existed)
    Inserted(u64),
    /// Number of members removed
    Removed(u64),
    /// Number of members in the log
    Cardinality(u64),
    /// Whether an expiry was set
    ExpirySet(bool),
}

/// Outcome of recording one hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitOutcome {
    /// Whether the hit is within the limit
    pub allowed: bool,
    /// Hits currently in the window, including this one
    pub hits: u64,
    /// Configured limit
    pub max_hits: u64,
    /// Hits still available in the current window
    pub remaining: u64,
}

impl HitOutcome {
    /// Build the outcome for a post-insertion count
    pub fn from_count(hits: u64, max_hits: u64) -> Self {
        Self {
            allowed: hits <= max_hits,
            hits,
            max_hits,
            remaining: max_hits.saturating_sub(hits),
        }
    }
}
