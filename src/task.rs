//! Timing for arbitrary async work such as scheduled jobs.
//!
//! ```ignore
//! use meterwire::task::timed_task;
//! use meterwire::web::Timed;
//!
//! let timings = [
//!     Timed::named("beeper"),
//!     Timed::named("longBeep").long_task(),
//! ];
//! timed_task(&registry, &timings, beep()).await;
//! ```

use crate::clock::elapsed_since;
use crate::registry::{LongTaskSample, MeterRegistry};
use crate::web::Timed;
use std::future::Future;
use tracing::warn;

/// Run `task`, timing it with every named descriptor.
///
/// Short timers are tagged with the descriptor's extra tags only. Long-task
/// descriptors count the task as active while it runs. Descriptors without
/// an explicit name, including [`Timed::server_requests`], are skipped.
pub async fn timed_task<F: Future>(registry: &MeterRegistry, timings: &[Timed], task: F) -> F::Output {
    let long_tasks: Vec<LongTaskSample> = timings
        .iter()
        .filter(|timed| timed.is_long_task())
        .filter_map(|timed| {
            let name = timed.resolve_name(None)?;
            match registry.long_task_timer(name, timed.tags()) {
                Ok(timer) => Some(timer.start()),
                Err(e) => {
                    warn!(name, error = %e, "Failed to start long task timer");
                    None
                }
            }
        })
        .collect();

    let clock = registry.clock();
    let start = clock.monotonic_nanos();
    let output = task.await;
    let elapsed = elapsed_since(clock.as_ref(), start);

    for sample in long_tasks {
        sample.stop();
    }

    for timed in timings.iter().filter(|timed| !timed.is_long_task()) {
        let Some(name) = timed.resolve_name(None) else {
            continue;
        };
        match registry.timer_with_quantiles(name, timed.tags(), timed.quantile_list()) {
            Ok(timer) => timer.record(elapsed),
            Err(e) => warn!(name, error = %e, "Failed to record task timing"),
        }
    }
    output
}
