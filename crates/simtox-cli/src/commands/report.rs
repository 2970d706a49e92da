use simtox_pipeline::{CancelSignal, Pipeline};

use crate::bootstrap;
use crate::cli::{GlobalFlags, ReportArgs};
use crate::output::output;

/// Handle `simtox report`.
pub async fn handle(args: &ReportArgs, flags: &GlobalFlags) -> anyhow::Result<()> {
    let mut config = bootstrap::load_config(flags)?;
    if args.partial {
        config.pipeline.partial_on_cancel = true;
    }
    let providers = bootstrap::providers(&config, args.catalog.as_deref())?;
    let pipeline = Pipeline::new(providers.structure, providers.events, &config);

    let defaults = pipeline.settings();
    let similarity_limit = args.similarity_limit.unwrap_or(defaults.similarity_limit);
    let event_limit = args.events.unwrap_or(defaults.per_compound_event_limit);

    let (handle, cancel) = CancelSignal::pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; cancelling outstanding lookups");
            handle.cancel();
        }
    });

    let result = pipeline
        .build_aggregation_report_with_cancel(
            &args.identifier,
            args.kind.map(Into::into),
            similarity_limit,
            event_limit,
            &cancel,
        )
        .await;
    interrupt.abort();
    tracing::debug!(stats = ?pipeline.stats(), "provider guard counters");

    let report = match result {
        Err(err) if cancel.is_cancelled() => {
            return Err(anyhow::Error::new(err).context("report interrupted"));
        }
        result => result?,
    };
    if report.partial {
        tracing::warn!(
            processed = report.similarity_set_size,
            "report is partial: cancelled before all lookups finished"
        );
    }
    output(&report, flags.format)
}
