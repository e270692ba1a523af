use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    /// Numeric item id taken from the `/seiga/im<id>` link
    pub id: String,
    pub source_page: u32,
    /// 1-based position among the valid links of its page
    pub rank_on_page: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadStatus {
    Saved { path: PathBuf },
    /// Parameter is the error kind name, e.g. `FetchError`
    Failed { kind: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub item: ItemRef,
    pub status: DownloadStatus,
}

impl DownloadOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self.status, DownloadStatus::Saved { .. })
    }

    pub fn saved_path(&self) -> Option<&Path> {
        match &self.status {
            DownloadStatus::Saved { path } => Some(path),
            DownloadStatus::Failed { .. } => None,
        }
    }
}

/// Run-wide counters. `attempts == successes + failures` holds after every
/// recorded outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTally {
    attempts: u64,
    successes: u64,
    failures: u64,
    output_directory: PathBuf,
}

impl RunTally {
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            attempts: 0,
            successes: 0,
            failures: 0,
            output_directory: output_directory.into(),
        }
    }

    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn record(&mut self, outcome: &DownloadOutcome) {
        debug_assert!(self.successes + self.failures < self.attempts);
        if outcome.is_saved() {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn is_balanced(&self) -> bool {
        self.attempts == self.successes + self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> ItemRef {
        ItemRef {
            id: id.into(),
            source_page: 1,
            rank_on_page: 1,
        }
    }

    #[test]
    fn attempt_is_counted_before_outcome() {
        let mut tally = RunTally::new("images/1");
        tally.begin_attempt();
        assert_eq!(tally.attempts(), 1);
        assert!(!tally.is_balanced());

        tally.record(&DownloadOutcome {
            item: item("101"),
            status: DownloadStatus::Saved {
                path: PathBuf::from("images/1/1-101.jpg"),
            },
        });
        assert!(tally.is_balanced());
        assert_eq!(tally.successes(), 1);
    }

    #[test]
    fn failures_are_counted_separately() {
        let mut tally = RunTally::new("images/1");
        for id in ["1", "2"] {
            tally.begin_attempt();
            tally.record(&DownloadOutcome {
                item: item(id),
                status: DownloadStatus::Failed {
                    kind: "FetchError",
                },
            });
        }
        assert_eq!(tally.attempts(), 2);
        assert_eq!(tally.successes(), 0);
        assert_eq!(tally.failures(), 2);
        assert!(tally.is_balanced());
    }

    #[test]
    fn outcome_exposes_saved_path() {
        let saved = DownloadOutcome {
            item: item("7"),
            status: DownloadStatus::Saved {
                path: PathBuf::from("a/b.jpg"),
            },
        };
        assert_eq!(saved.saved_path(), Some(Path::new("a/b.jpg")));
        let failed = DownloadOutcome {
            item: item("7"),
            status: DownloadStatus::Failed {
                kind: "StorageError",
            },
        };
        assert_eq!(failed.saved_path(), None);
    }
}
