/// Default namespace for every key the limiter writes
pub const DEFAULT_KEY_PREFIX: &str = "sliding-limiter:";

/// Maps a subject and a limiter policy onto the key of its log.
///
/// Implementations must be deterministic, stable across restarts, and
/// injective over `(name, window_size_ms, max_hits)`.
pub trait SubjectKeys: Send + Sync {
    fn subject_key(&self, name: &str, window_size_ms: f64, max_hits: u64) -> String;
}

impl<F> SubjectKeys for F
where
    F: Fn(&str, f64, u64) -> String + Send + Sync,
{
    fn subject_key(&self, name: &str, window_size_ms: f64, max_hits: u64) -> String {
        self(name, window_size_ms, max_hits)
    }
}

/// Prefixed key layout: `<prefix>limiter:<name>:<window_size_ms>:<max_hits>`
///
/// The two trailing fields are numeric, so a name containing `:` cannot be
/// confused with another policy's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    prefix: String,
}

impl KeySchema {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the sliding-window log for `name` under the given policy
    pub fn sliding_window_rate_limiter_key(
        &self,
        name: &str,
        window_size_ms: f64,
        max_hits: u64,
    ) -> String {
        // `{}` on f64 is the shortest round-trip form: 1000.0 -> "1000", 0.5 -> "0.5"
        format!(
            "{}limiter:{}:{}:{}",
            self.prefix, name, window_size_ms, max_hits
        )
    }
}

impl Default for KeySchema {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl SubjectKeys for KeySchema {
    fn subject_key(&self, name: &str, window_size_ms: f64, max_hits: u64) -> String {
        self.sliding_window_rate_limiter_key(name, window_size_ms, max_hits)
    }
}
