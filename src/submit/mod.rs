//! Implementation of the `submit` subcommand.
//!
//! Runs the pre-flight gate for a VCF-to-warehouse import job: resolves the
//! variant merge strategy, validates the annotation-related configuration,
//! and writes out the resolved job plan for the pipeline runner.

use crate::common::{self, storage::storage_for_path};
use crate::err::PreflightError;
use crate::merge::{self, MergeArgs, MergeOption, VariantMergeStrategy};

/// Command line arguments for the `submit` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "validate and plan a VCF import job", long_about = None)]
pub struct Args {
    /// Path or glob pattern of the input VCF files.
    #[clap(long)]
    pub path_in: String,
    /// Fully qualified name of the destination warehouse table.
    #[clap(long)]
    pub output_table: String,
    /// Path to write the resolved job plan to; stdout if absent.
    #[clap(long)]
    pub path_plan_out: Option<String>,
    /// Directory that the annotation run writes its outputs to.
    #[clap(long)]
    pub annotation_output_dir: Option<String>,
    /// Merge configuration.
    #[clap(flatten)]
    pub merge: MergeArgs,
    /// Remaining arguments handed through to the pipeline runner, after `--`.
    #[clap(last = true)]
    pub pipeline_args: Vec<String>,
}

/// Flags whose presence marks an explicit worker-count configuration.
const WORKER_COUNT_FLAGS: &[&str] = &["--num_workers", "--max_num_workers"];

/// Whether any worker-count flag occurs in `pipeline_args`.
///
/// The tokens are opaque to this tool; each flag is accepted standalone or in
/// `flag=value` form, at any position.
fn has_worker_count_flag(pipeline_args: &[String]) -> bool {
    pipeline_args.iter().any(|token| {
        WORKER_COUNT_FLAGS.iter().any(|flag| {
            token
                .strip_prefix(flag)
                .map(|rest| rest.is_empty() || rest.starts_with('='))
                .unwrap_or(false)
        })
    })
}

/// Validate the annotation-related part of the job configuration.
///
/// A no-op unless an annotation output directory was requested. The requested
/// directory must not exist yet, and the pipeline arguments must configure an
/// explicit worker count since the annotation run starts a separate
/// distributed job.
pub fn validate_annotation_pipeline_args(
    known_args: &Args,
    pipeline_args: &[String],
) -> Result<(), PreflightError> {
    let annotation_output_dir = match known_args.annotation_output_dir.as_deref() {
        None | Some("") => return Ok(()),
        Some(dir) => dir,
    };

    let storage = storage_for_path(annotation_output_dir);
    let exists = storage.exists(annotation_output_dir).map_err(|source| {
        PreflightError::StorageCheck {
            path: annotation_output_dir.to_string(),
            source,
        }
    })?;
    if exists {
        return Err(PreflightError::AnnotationOutputDirExists {
            path: annotation_output_dir.to_string(),
        });
    }

    if !has_worker_count_flag(pipeline_args) {
        return Err(PreflightError::MissingWorkerCountFlags);
    }

    Ok(())
}

/// Resolved job plan, consumed by the pipeline runner.
#[derive(Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
struct JobPlan {
    /// Tool and version that produced the plan.
    pub created_by: String,
    /// Path or glob pattern of the input VCF files.
    pub path_in: String,
    /// Fully qualified name of the destination warehouse table.
    pub output_table: String,
    /// Resolved merge strategy name.
    pub variant_merge_strategy: String,
    /// INFO key pattern of the MOVE_TO_CALLS strategy, if configured.
    pub info_keys_to_move_to_calls_regex: Option<String>,
    /// Call field receiving the record QUAL value, if configured.
    pub copy_quality_to_calls: Option<String>,
    /// Call field receiving the record FILTER value, if configured.
    pub copy_filter_to_calls: Option<String>,
    /// Validated annotation output directory, if requested.
    pub annotation_output_dir: Option<String>,
    /// Pass-through arguments for the pipeline runner.
    pub pipeline_args: Vec<String>,
}

/// Assemble the job plan from validated arguments and the resolved strategy.
fn build_job_plan(args: &Args, strategy: Option<&VariantMergeStrategy>) -> JobPlan {
    let (variant_merge_strategy, info_keys_regex, copy_quality, copy_filter) = match strategy {
        None => (MergeOption::None.to_string(), None, None, None),
        Some(VariantMergeStrategy::MoveToCalls(strategy)) => (
            MergeOption::MoveToCalls.to_string(),
            strategy
                .info_keys_regex()
                .map(|regex| regex.as_str().to_string()),
            strategy.copy_quality_to_calls().map(String::from),
            strategy.copy_filter_to_calls().map(String::from),
        ),
    };

    JobPlan {
        created_by: format!("vcf-warehouse-loader {}", common::worker_version()),
        path_in: args.path_in.clone(),
        output_table: args.output_table.clone(),
        variant_merge_strategy,
        info_keys_to_move_to_calls_regex: info_keys_regex,
        copy_quality_to_calls: copy_quality,
        copy_filter_to_calls: copy_filter,
        annotation_output_dir: args
            .annotation_output_dir
            .clone()
            .filter(|dir| !dir.is_empty()),
        pipeline_args: args.pipeline_args.clone(),
    }
}

/// Main entry point for the `submit` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    tracing::info!("checking merge configuration...");
    merge::validate_merge_args(&args.merge)?;
    let strategy = merge::select_merge_strategy(&args.merge)?;

    tracing::info!("checking annotation configuration...");
    validate_annotation_pipeline_args(args, &args.pipeline_args)?;

    tracing::info!("writing job plan...");
    let plan = build_job_plan(args, strategy.as_ref());
    let plan_json = serde_json::to_string_pretty(&plan)
        .map_err(|e| anyhow::anyhow!("could not serialize job plan: {}", e))?;
    match args.path_plan_out.as_deref() {
        Some(path) => std::fs::write(path, &plan_json)
            .map_err(|e| anyhow::anyhow!("could not write job plan to {}: {}", path, e))?,
        None => println!("{}", plan_json),
    }

    common::trace_rss_now();

    tracing::info!(
        "All of `submit` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn submit_args(annotation_output_dir: Option<&str>, pipeline_args: &[&str]) -> Args {
        Args {
            path_in: "variants/*.vcf".into(),
            output_table: "warehouse.variants.calls".into(),
            path_plan_out: None,
            annotation_output_dir: annotation_output_dir.map(String::from),
            merge: MergeArgs {
                variant_merge_strategy: "NONE".into(),
                info_keys_to_move_to_calls_regex: None,
                copy_quality_to_calls: None,
                copy_filter_to_calls: None,
            },
            pipeline_args: pipeline_args.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn existing_annotation_output_dir_fails() {
        let tmp_dir = temp_testdir::TempDir::default();
        let args = submit_args(Some(tmp_dir.to_path_buf().to_str().unwrap()), &[]);

        let err = validate_annotation_pipeline_args(&args, &args.pipeline_args).unwrap_err();

        assert!(matches!(
            err,
            PreflightError::AnnotationOutputDirExists { .. }
        ));
        assert!(regex::Regex::new("directory .* already exists")
            .unwrap()
            .is_match(&err.to_string()));
    }

    #[test]
    fn missing_worker_count_flags_fails() {
        let args = submit_args(Some("dummy"), &[]);

        let err = validate_annotation_pipeline_args(&args, &args.pipeline_args).unwrap_err();

        assert!(matches!(err, PreflightError::MissingWorkerCountFlags));
        assert!(regex::Regex::new("Could not .* pipeline flags")
            .unwrap()
            .is_match(&err.to_string()));
    }

    #[rstest::rstest]
    #[case(&["--num_workers", "2"])]
    #[case(&["--max_num_workers", "2"])]
    #[case(&["--num_workers=2"])]
    #[case(&["--runner", "dataflow", "--max_num_workers", "2"])]
    fn worker_count_flags_pass(#[case] pipeline_args: &[&str]) -> Result<(), anyhow::Error> {
        let args = submit_args(Some("dummy"), pipeline_args);

        validate_annotation_pipeline_args(&args, &args.pipeline_args)?;

        Ok(())
    }

    #[rstest::rstest]
    #[case(None)]
    #[case(Some(""))]
    fn no_annotation_output_dir_skips_checks(
        #[case] annotation_output_dir: Option<&str>,
    ) -> Result<(), anyhow::Error> {
        let args = submit_args(annotation_output_dir, &[]);

        validate_annotation_pipeline_args(&args, &args.pipeline_args)?;

        Ok(())
    }

    #[test]
    fn validation_is_idempotent() {
        let tmp_dir = temp_testdir::TempDir::default();
        let args = submit_args(Some(tmp_dir.to_path_buf().to_str().unwrap()), &[]);

        let first = validate_annotation_pipeline_args(&args, &args.pipeline_args).unwrap_err();
        let second = validate_annotation_pipeline_args(&args, &args.pipeline_args).unwrap_err();

        assert_eq!(first.to_string(), second.to_string());
    }

    #[rstest::rstest]
    #[case(&[], false)]
    #[case(&["--runner", "dataflow"], false)]
    #[case(&["--num_workersextra"], false)]
    #[case(&["--num_workers"], true)]
    #[case(&["--max_num_workers=8"], true)]
    fn worker_count_flag_scan(#[case] pipeline_args: &[&str], #[case] expected: bool) {
        let pipeline_args = pipeline_args
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();

        assert_eq!(expected, has_worker_count_flag(&pipeline_args));
    }

    #[test]
    fn job_plan_echoes_move_to_calls_configuration() -> Result<(), anyhow::Error> {
        let mut args = submit_args(Some("dummy"), &["--num_workers", "2"]);
        args.merge = MergeArgs {
            variant_merge_strategy: "MOVE_TO_CALLS".into(),
            info_keys_to_move_to_calls_regex: Some("^(AF|AC)$".into()),
            copy_quality_to_calls: Some("quality".into()),
            copy_filter_to_calls: Some("filter".into()),
        };
        let strategy = merge::select_merge_strategy(&args.merge)?;

        let plan = build_job_plan(&args, strategy.as_ref());

        assert_eq!(
            JobPlan {
                created_by: "vcf-warehouse-loader x.y.z".into(),
                path_in: "variants/*.vcf".into(),
                output_table: "warehouse.variants.calls".into(),
                variant_merge_strategy: "MOVE_TO_CALLS".into(),
                info_keys_to_move_to_calls_regex: Some("^(AF|AC)$".into()),
                copy_quality_to_calls: Some("quality".into()),
                copy_filter_to_calls: Some("filter".into()),
                annotation_output_dir: Some("dummy".into()),
                pipeline_args: vec!["--num_workers".into(), "2".into()],
            },
            plan
        );

        Ok(())
    }

    #[test]
    fn job_plan_without_merge_strategy() {
        let args = submit_args(None, &[]);

        let plan = build_job_plan(&args, None);

        assert_eq!("NONE", plan.variant_merge_strategy);
        assert_eq!(None, plan.info_keys_to_move_to_calls_regex);
        assert_eq!(None, plan.annotation_output_dir);
    }

    #[test]
    fn run_writes_job_plan() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let plan_path = tmp_dir.join("plan.json");

        let mut args = submit_args(None, &["--num_workers", "2"]);
        args.path_plan_out = Some(plan_path.to_str().unwrap().to_string());
        args.merge.variant_merge_strategy = "MOVE_TO_CALLS".into();
        args.merge.info_keys_to_move_to_calls_regex = Some("^AF$".into());

        run(&crate::common::Args::default(), &args)?;

        let plan: JobPlan = serde_json::from_str(&std::fs::read_to_string(&plan_path)?)?;
        assert_eq!("vcf-warehouse-loader x.y.z", plan.created_by);
        assert_eq!("MOVE_TO_CALLS", plan.variant_merge_strategy);
        assert_eq!(Some("^AF$".into()), plan.info_keys_to_move_to_calls_regex);
        assert_eq!(
            vec!["--num_workers".to_string(), "2".to_string()],
            plan.pipeline_args
        );

        Ok(())
    }

    #[test]
    fn run_aborts_on_unknown_merge_strategy() {
        let mut args = submit_args(None, &[]);
        args.merge.variant_merge_strategy = "NotAMergeStrategy".into();

        assert!(run(&crate::common::Args::default(), &args).is_err());
    }
}
