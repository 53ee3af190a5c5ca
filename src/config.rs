//! Configuration options for the CountDb engine.

use std::time::Duration;

/// Configuration options for opening a service.
#[derive(Debug, Clone)]
pub struct Options {
    /// Create the data directory if it doesn't exist.
    /// Default: true
    pub create_if_missing: bool,

    /// Interval between durability pipeline cycles.
    /// Default: 5 seconds
    pub flush_interval: Duration,

    /// File name of the epoch journal inside the data directory.
    /// Default: "epochs.log"
    pub journal_filename: String,

    /// Sync journal writes to disk.
    /// Disabling reduces durability but increases performance.
    /// Default: true
    pub sync_journal: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            flush_interval: Duration::from_secs(5),
            journal_filename: "epochs.log".to_string(),
            sync_journal: true,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the data directory if it doesn't exist.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the durability pipeline cycle interval.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the journal file name.
    pub fn journal_filename(mut self, name: impl Into<String>) -> Self {
        self.journal_filename = name.into();
        self
    }

    /// Enables or disables syncing journal writes.
    pub fn sync_journal(mut self, value: bool) -> Self {
        self.sync_journal = value;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.flush_interval.is_zero() {
            return Err(crate::Error::invalid_argument("flush_interval must be > 0"));
        }
        if self.journal_filename.is_empty() {
            return Err(crate::Error::invalid_argument("journal_filename must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert!(opts.create_if_missing);
        assert_eq!(opts.flush_interval, Duration::from_secs(5));
        assert_eq!(opts.journal_filename, "epochs.log");
        assert!(opts.sync_journal);
    }

    #[test]
    fn test_options_builder() {
        let opts = Options::new()
            .flush_interval(Duration::from_millis(50))
            .journal_filename("test.log")
            .sync_journal(false);

        assert_eq!(opts.flush_interval, Duration::from_millis(50));
        assert_eq!(opts.journal_filename, "test.log");
        assert!(!opts.sync_journal);
    }

    #[test]
    fn test_options_validation() {
        let mut opts = Options::default();
        assert!(opts.validate().is_ok());

        opts.flush_interval = Duration::ZERO;
        assert!(opts.validate().is_err());

        opts.flush_interval = Duration::from_secs(1);
        opts.journal_filename = String::new();
        assert!(opts.validate().is_err());
    }
}
