/*!
 * Event Processor - Main Entry Point
 *
 * Runs a generated-event job through the framework modules:
 * - EventInfoSetter producing two runs
 * - Progress logging on the main path
 * - Prescale branching into a condition path for every tenth event
 */

use evproc::modules::{EventInfoSetter, Prescale, Progress};
use evproc::{
    init_tracing, AfterConditionPath, EventProcessor, FrameworkError, JobSpan, Module, ModuleCondition,
    PathGraph, ProcessSummary, ProcessingConfig, Stage,
};
use std::process::ExitCode;
use tracing::{info, warn};

fn build_job() -> anyhow::Result<(PathGraph, evproc::PathId)> {
    let mut graph = PathGraph::new();
    let main = graph.create_path("main");
    let selected = graph.create_path("selected");

    let setter = graph.register(EventInfoSetter::new().with_runs(&[(0, 1, 100), (0, 2, 50)])?);
    let progress = graph.register(Progress::new());
    let prescale = graph.register(Prescale::new().with_prescale(10)?);

    let mut selected_progress = Progress::new();
    selected_progress.info_mut().set_name("SelectedProgress");
    let selected_progress = graph.register(selected_progress);

    graph.append(main, setter)?;
    graph.append(main, progress)?;
    graph.append(main, prescale)?;
    graph.append(selected, selected_progress)?;
    graph.add_condition(
        prescale,
        ModuleCondition::if_true(selected).with_after(AfterConditionPath::Continue),
    )?;

    Ok((graph, main))
}

fn report(summary: &ProcessSummary) -> anyhow::Result<()> {
    if std::env::var("EVPROC_SUMMARY_JSON").map_or(false, |v| v == "1" || v == "true") {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    for stats in &summary.modules {
        info!(
            module = %stats.name,
            events = stats.calls(Stage::Event),
            event_time_us = stats.time(Stage::Event).as_micros() as u64,
            mean_us = stats.stage(Stage::Event).mean_time().as_micros() as u64,
            "Module statistics"
        );
    }
    info!(
        events = summary.events_processed,
        runs = summary.runs,
        last = %summary.last_event,
        "Job summary"
    );
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let config = ProcessingConfig::from_env()?;
    init_tracing(config.log_level, config.trace_json);

    let job = JobSpan::new("init");
    let _entered = job.enter();
    info!(job_id = %job.job_id(), "Event processor starting");

    if config.parallel() {
        warn!(
            n_processes = config.n_processes,
            "No event bridge available in this binary, processing in a single process"
        );
    }

    let (mut graph, main) = build_job()?;
    let mut processor = EventProcessor::from_config(&config);
    let summary = processor.process(&mut graph, main)?;
    job.record_events(summary.events_processed);

    report(&summary)
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast::<FrameworkError>() {
                Ok(error) => eprintln!("{:?}", miette::Report::new(error)),
                Err(other) => eprintln!("Error: {:#}", other),
            }
            ExitCode::FAILURE
        }
    }
}
