use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error reading {0}: {1}")]
    Io(PathBuf, std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one specialty must be configured")]
    EmptySpecialties,
    #[error("specialty '{0}' is configured more than once")]
    DuplicateSpecialty(String),
    #[error("month table must list exactly 12 names, got {0}")]
    InvalidMonthTable(usize),
    #[error("invalid threshold '{name}': {reason}")]
    InvalidThreshold { name: &'static str, reason: String },
    #[error("I/O error reading {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
