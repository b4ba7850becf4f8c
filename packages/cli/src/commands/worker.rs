//! Worker process entry point.

use std::io::{self, Write};

use pi_core::{ReportCadence, WorkerReport, estimate_pi};

use crate::cli::WorkerArgs;

fn emit(out: &mut impl Write, report: &WorkerReport) -> anyhow::Result<()> {
    writeln!(out, "{}", report.to_line()?)?;
    Ok(())
}

/// Run the estimation, reporting progress on stdout.
///
/// There is no cancellation: the run ends when the loop does or when the
/// owner signals the process.
pub(crate) fn run(args: WorkerArgs) -> anyhow::Result<()> {
    let total = args.iterations;
    let cadence = match args.report_every {
        Some(every) => ReportCadence::new(total, every),
        None => ReportCadence::per_mille(total),
    };
    tracing::debug!("Worker starting: {} drops, reporting every {}", total, cadence.every());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut write_failed = false;
    let mut rng = rand::thread_rng();

    let estimate = estimate_pi(&mut rng, total, |completed| {
        if write_failed || !cadence.should_report(completed) {
            return;
        }
        if let Err(e) = emit(&mut out, &WorkerReport::Progress { completed }) {
            tracing::warn!("Owner stopped reading progress: {}", e);
            write_failed = true;
        }
    });

    emit(&mut out, &WorkerReport::finished(estimate))?;
    out.flush()?;
    Ok(())
}
