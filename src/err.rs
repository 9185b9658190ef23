//! Error types for the pre-flight submission gate.

/// Errors that abort a job submission before any pipeline work starts.
#[derive(thiserror::Error, Debug)]
pub enum PreflightError {
    /// The declared merge strategy is not a member of the supported set.
    #[error("{value:?} is not a recognized variant merge strategy")]
    UnknownMergeStrategy { value: String },
    /// The INFO key pattern handed to the move-to-calls strategy is malformed.
    #[error("invalid --info-keys-to-move-to-calls-regex: {source}")]
    InvalidInfoKeysRegex {
        #[from]
        source: regex::Error,
    },
    /// A call-level merge flag was given without the strategy that consumes it.
    #[error("{flag} requires --variant-merge-strategy MOVE_TO_CALLS")]
    MergeFlagRequiresMoveToCalls { flag: &'static str },
    #[error("annotation output directory {path:?} already exists")]
    AnnotationOutputDirExists { path: String },
    #[error(
        "Could not find any of --num_workers, --max_num_workers among the pipeline flags; \
         annotation runs start a separate distributed job and need an explicit worker count"
    )]
    MissingWorkerCountFlags,
    /// The storage backend could not answer the existence check.
    #[error("could not check annotation output directory {path:?}: {source}")]
    StorageCheck {
        path: String,
        source: anyhow::Error,
    },
}
