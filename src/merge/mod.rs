//! Selection of the variant merge strategy for an import job.

use crate::err::PreflightError;

pub mod move_to_calls;

pub use move_to_calls::MoveToCallsStrategy;

/// Supported values of `--variant-merge-strategy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
pub enum MergeOption {
    /// Do not merge; each input record becomes one warehouse row.
    #[strum(serialize = "NONE")]
    None,
    /// Merge duplicate records, moving INFO fields into the per-sample calls.
    #[strum(serialize = "MOVE_TO_CALLS")]
    MoveToCalls,
}

/// Command line arguments controlling record merging.
#[derive(Debug, Clone, clap::Parser)]
pub struct MergeArgs {
    /// Strategy for merging duplicate variant records across input files.
    /// One of NONE, MOVE_TO_CALLS.
    #[clap(long, default_value = "NONE")]
    pub variant_merge_strategy: String,
    /// Regular expression selecting the INFO keys to move into the calls.
    #[clap(long)]
    pub info_keys_to_move_to_calls_regex: Option<String>,
    /// Name of the call field to copy the record QUAL value into.
    #[clap(long)]
    pub copy_quality_to_calls: Option<String>,
    /// Name of the call field to copy the record FILTER value into.
    #[clap(long)]
    pub copy_filter_to_calls: Option<String>,
}

/// A configured merge strategy; "no merge" is represented as absence.
#[derive(Debug, Clone)]
pub enum VariantMergeStrategy {
    /// Move selected INFO fields into each call record while merging.
    MoveToCalls(MoveToCallsStrategy),
}

/// Resolve the declared merge strategy into a configured strategy value.
///
/// The declared value is validated here rather than in the CLI layer so that
/// an unrecognized strategy always fails loudly instead of falling back to a
/// default.
pub fn select_merge_strategy(
    args: &MergeArgs,
) -> Result<Option<VariantMergeStrategy>, PreflightError> {
    let option: MergeOption = args.variant_merge_strategy.parse().map_err(|_| {
        PreflightError::UnknownMergeStrategy {
            value: args.variant_merge_strategy.clone(),
        }
    })?;
    match option {
        MergeOption::None => Ok(None),
        MergeOption::MoveToCalls => Ok(Some(VariantMergeStrategy::MoveToCalls(
            MoveToCallsStrategy::new(
                args.info_keys_to_move_to_calls_regex.as_deref(),
                args.copy_quality_to_calls.clone(),
                args.copy_filter_to_calls.clone(),
            )?,
        ))),
    }
}

/// Reject call-level merge flags when no strategy consumes them.
pub fn validate_merge_args(args: &MergeArgs) -> Result<(), PreflightError> {
    if matches!(
        args.variant_merge_strategy.parse(),
        Ok(MergeOption::MoveToCalls)
    ) {
        return Ok(());
    }

    let call_level_flags = [
        (
            "--info-keys-to-move-to-calls-regex",
            &args.info_keys_to_move_to_calls_regex,
        ),
        ("--copy-quality-to-calls", &args.copy_quality_to_calls),
        ("--copy-filter-to-calls", &args.copy_filter_to_calls),
    ];
    for (flag, value) in call_level_flags {
        if value.is_some() {
            return Err(PreflightError::MergeFlagRequiresMoveToCalls { flag });
        }
    }

    Ok(())
}
