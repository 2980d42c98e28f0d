//! List job executions started within a time window

use std::pin::pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use tracing::debug;

use sfcc_runtime::config::Environment;
use sfcc_runtime::deps::{MessageStyle, UserInterface};
use sfcc_runtime::ocapi::DataApi;
use sfcc_runtime::ocapi::types::{JobExecution, StatusKind};
use sfcc_runtime::search::{PageFetcher, SearchRequest, SearchResults};

use crate::ui::RealUserInterface;

/// Jobs command arguments (matches CLI parser)
#[derive(Debug, Clone)]
pub struct JobsArgs {
    /// Window start, exclusive
    pub start: DateTime<Utc>,
    /// Window end, exclusive
    pub end: DateTime<Utc>,
    /// Only executions of this job
    pub job_id: Option<String>,
    /// Results requested per page
    pub page_size: Option<usize>,
}

/// Dependencies for the jobs command
pub struct JobsDependencies {
    /// Job execution search
    pub jobs: Arc<dyn PageFetcher<JobExecution>>,
    /// User interface for output
    pub ui: Arc<dyn UserInterface>,
}

/// Execute the jobs command with injected dependencies.
///
/// Returns the number of executions printed.
pub async fn execute_with_deps(args: &JobsArgs, deps: &JobsDependencies) -> Result<usize> {
    let mut request = SearchRequest::between("start_time", &args.start, &args.end);
    if let Some(page_size) = args.page_size {
        request = request.with_count(page_size);
    }

    let results = SearchResults::fetch(deps.jobs.as_ref(), request)
        .await
        .context("Failed to search job executions")?;
    let total = results.total();
    debug!(total, "job execution search");

    let mut executions = pin!(results.into_stream());
    let mut printed = 0;
    while let Some(execution) = executions
        .try_next()
        .await
        .context("Failed to fetch job executions")?
    {
        if args
            .job_id
            .as_deref()
            .is_some_and(|job_id| job_id != execution.job_id)
        {
            continue;
        }
        print_execution(deps.ui.as_ref(), &execution);
        printed += 1;
    }

    deps.ui
        .print(&format!("{printed} of {total} job executions"));
    Ok(printed)
}

fn print_execution(ui: &dyn UserInterface, execution: &JobExecution) {
    let started = execution
        .start_time
        .map(|time| time.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default();
    let line = format!(
        "{started}\t{}\t{}\t{}",
        execution.job_id,
        execution.id,
        execution.execution_status.as_deref().unwrap_or("-")
    );
    match execution.exit_status.as_ref().map(|status| status.status) {
        Some(StatusKind::Ok) => ui.print_styled(&line, MessageStyle::Green),
        Some(StatusKind::Error) => ui.print_styled(&line, MessageStyle::Red),
        None => ui.print(&line),
    }
}

/// Execute the jobs command with default dependencies
pub async fn execute(env: &Environment, args: JobsArgs) -> Result<()> {
    let api = DataApi::new(env).context("Cannot reach the Data API")?;
    let deps = JobsDependencies {
        jobs: Arc::new(api),
        ui: Arc::new(RealUserInterface),
    };
    execute_with_deps(&args, &deps).await.map(|_| ())
}
