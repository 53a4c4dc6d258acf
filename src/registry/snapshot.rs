//! Point-in-time readings of registered meters, consumed by exporters.

use super::types::{Meter, MeterId};
use std::time::Duration;

/// Reading of one meter.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterSnapshot {
    pub id: MeterId,
    pub value: MeterValue,
}

/// Kind-specific values of a [`MeterSnapshot`].
#[derive(Debug, Clone, PartialEq)]
pub enum MeterValue {
    Counter {
        count: u64,
    },
    Gauge {
        value: f64,
    },
    Timer {
        count: u64,
        total: Duration,
        max: Duration,
        quantiles: Vec<(f64, Duration)>,
    },
    LongTaskTimer {
        active_tasks: usize,
        duration: Duration,
    },
}

/// Which aspect of a meter a [`Measurement`] describes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    Count,
    Value,
    TotalTime,
    Max,
    Mean,
    ActiveTasks,
    Duration,
    Quantile(f64),
}

impl Statistic {
    /// Name suffix used by hierarchical backends.
    pub fn suffix(&self) -> String {
        match self {
            Self::Count => "count".into(),
            Self::Value => "value".into(),
            Self::TotalTime => "sum".into(),
            Self::Max => "max".into(),
            Self::Mean => "mean".into(),
            Self::ActiveTasks => "activeTasks".into(),
            Self::Duration => "duration".into(),
            Self::Quantile(q) => format!("p{}", (q * 1000.0).round() as u64),
        }
    }
}

/// One numeric sample; durations are expressed in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub statistic: Statistic,
    pub value: f64,
}

impl Measurement {
    fn new(statistic: Statistic, value: f64) -> Self {
        Self { statistic, value }
    }
}

impl MeterSnapshot {
    pub(crate) fn of(meter: &Meter) -> Self {
        let value = match meter {
            Meter::Counter(c) => MeterValue::Counter { count: c.count() },
            Meter::Gauge(g) => MeterValue::Gauge { value: g.value() },
            Meter::Timer(t) => MeterValue::Timer {
                count: t.count(),
                total: t.total_time(),
                max: t.max(),
                quantiles: t.quantile_values(),
            },
            Meter::LongTaskTimer(t) => MeterValue::LongTaskTimer {
                active_tasks: t.active_tasks(),
                duration: t.duration(),
            },
        };
        Self {
            id: meter.id().clone(),
            value,
        }
    }

    /// Flatten into individual measurements.
    pub fn measurements(&self) -> Vec<Measurement> {
        match &self.value {
            MeterValue::Counter { count } => vec![Measurement::new(Statistic::Count, *count as f64)],
            MeterValue::Gauge { value } => vec![Measurement::new(Statistic::Value, *value)],
            MeterValue::Timer {
                count,
                total,
                max,
                quantiles,
            } => {
                let mean = if *count == 0 {
                    0.0
                } else {
                    total.as_secs_f64() / *count as f64
                };
                let mut out = vec![
                    Measurement::new(Statistic::Count, *count as f64),
                    Measurement::new(Statistic::TotalTime, total.as_secs_f64()),
                    Measurement::new(Statistic::Max, max.as_secs_f64()),
                    Measurement::new(Statistic::Mean, mean),
                ];
                out.extend(
                    quantiles
                        .iter()
                        .map(|(q, d)| Measurement::new(Statistic::Quantile(*q), d.as_secs_f64())),
                );
                out
            }
            MeterValue::LongTaskTimer {
                active_tasks,
                duration,
            } => vec![
                Measurement::new(Statistic::ActiveTasks, *active_tasks as f64),
                Measurement::new(Statistic::Duration, duration.as_secs_f64()),
            ],
        }
    }
}
