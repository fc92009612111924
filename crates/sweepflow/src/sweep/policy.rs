use chrono::{DateTime, Duration, Utc};

/// Age threshold deciding which records are eligible for removal.
///
/// The boundary is computed once per run with [`RetentionPolicy::cutoff_at`]
/// and handed to the sources, so records that age past the threshold while a
/// sweep is running are left for the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window: Duration,
}

impl RetentionPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn days(days: i64) -> Self {
        Self::new(Duration::try_days(days).unwrap_or(Duration::MAX))
    }

    pub fn millis(ms: i64) -> Self {
        Self::new(Duration::try_milliseconds(ms).unwrap_or(Duration::MAX))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Eligibility boundary for a run started at `run_started`.
    /// A window reaching past the earliest representable instant makes nothing eligible.
    pub fn cutoff_at(&self, run_started: DateTime<Utc>) -> DateTime<Utc> {
        run_started
            .checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_eligible(&self, retention_key: DateTime<Utc>, cutoff: DateTime<Utc>) -> bool {
        retention_key < cutoff
    }
}
