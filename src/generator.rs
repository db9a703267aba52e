//! Pressure profile generation
//!
//! Turns a sparse [`TestSettings`] description (initial rise, hold,
//! intermediate stages, depressurization) into a dense, time-ordered series of
//! [`DataPoint`]s suitable for plotting.

use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::noise::{DEFAULT_MAX_NOISE, add_noise, clamp_pressure, jitter};
use crate::settings::{PressureStage, TestSettings, checked_offset_millis, offset_millis};

/// Every ramp spans this many milliseconds (pump/valve response time)
pub const RAMP_DURATION_MS: i64 = 30_000;

/// Ramps are sampled at `RAMP_STEPS + 1` points
pub const RAMP_STEPS: usize = 5;

/// Gaps at or below this length get no hold segment
pub const MIN_GAP_MS: i64 = 60_000;

const INITIAL_HOLD_INTERVALS: usize = 20;
const STAGE_HOLD_INTERVALS: usize = 15;
const MIN_GAP_INTERVALS: usize = 10;
const INTERVALS_PER_HOUR: usize = 2;

const INITIAL_RAMP_NOISE: f64 = 1.0;
const STAGE_RAMP_NOISE: f64 = 0.5;
const FINAL_RAMP_NOISE: f64 = 0.25;

/// A single pressure sample
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct DataPoint {
    pub time: NaiveDateTime,
    pub pressure: f64,
}

impl DataPoint {
    pub fn new(time: NaiveDateTime, pressure: f64) -> Self {
        Self { time, pressure }
    }
}

/// Generated series plus the window it was generated for
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphData {
    pub points: Vec<DataPoint>,
    pub start_date_time: NaiveDateTime,
    pub end_date_time: NaiveDateTime,
}

impl GraphData {
    /// Highest pressure in the series, 0 for an empty series
    pub fn max_pressure(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.pressure)
            .fold(0.0, f64::max)
    }

    /// Points as (hours since start, pressure) pairs for charting
    pub fn hour_series(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|p| {
                let hours =
                    (p.time - self.start_date_time).num_milliseconds() as f64 / 3_600_000.0;
                (hours, p.pressure)
            })
            .collect()
    }
}

/// Generates a pressure profile using the thread-local RNG for noise
///
/// # Errors
/// * [`GraphError::InvalidTimeRange`] if the end is not after the start
///
/// # Examples
/// ```
/// use pressure_graph::generator::generate;
/// use pressure_graph::settings::{TestSettings, resolve_date_time};
///
/// let settings = TestSettings::new(
///     resolve_date_time("2025-10-31", "10:00:00").unwrap(),
///     resolve_date_time("2025-10-31", "14:00:00").unwrap(),
///     50.0,
///     60.0,
/// );
/// let graph = generate(&settings).unwrap();
/// assert_eq!(graph.points.first().unwrap().pressure, 0.0);
/// assert_eq!(graph.points.last().unwrap().pressure, 0.0);
/// ```
pub fn generate(settings: &TestSettings) -> GraphResult<GraphData> {
    generate_with_rng(settings, &mut rand::thread_rng())
}

/// Generates a pressure profile drawing noise from `rng`
///
/// Passing a seeded RNG makes the output reproducible. Phases that run past
/// the end of the test window are cut off there, so the series always ends
/// with `(end, 0)`.
///
/// # Errors
/// * [`GraphError::InvalidTimeRange`] if the end is not after the start
/// * [`GraphError::OutOfRange`] if a hold or stage lands outside the
///   representable calendar range
pub fn generate_with_rng<R: Rng + ?Sized>(
    settings: &TestSettings,
    rng: &mut R,
) -> GraphResult<GraphData> {
    let start = settings.start_date_time;
    let end = settings.end_date_time;
    if end <= start {
        return Err(GraphError::InvalidTimeRange { start, end });
    }

    let working = settings.working_pressure;
    let mut points = vec![DataPoint::new(start, 0.0)];

    // Initial rise, hold at working pressure, and release.
    push_ramp(&mut points, rng, start, 0.0, working, INITIAL_RAMP_NOISE);
    let hold_start = offset_millis(start, RAMP_DURATION_MS as f64);
    let hold_end = shift(
        hold_start,
        settings.pressure_hold_duration * 60_000.0,
        "pressureHoldDuration",
    )?;
    push_stable_hold(
        &mut points,
        rng,
        hold_start,
        hold_end,
        working,
        INITIAL_HOLD_INTERVALS,
    );
    push_ramp(&mut points, rng, hold_end, working, 0.0, INITIAL_RAMP_NOISE);

    let mut last_drop_time = offset_millis(hold_end, RAMP_DURATION_MS as f64);
    let mut last_drop_pressure = 0.0;

    let mut stages: Vec<&PressureStage> = settings.intermediate_tests.iter().collect();
    stages.sort_by(|a, b| a.time.total_cmp(&b.time));

    for stage in stages {
        let stage_start = shift(start, stage.time * 3_600_000.0, "stage time")?;
        let rise_start = offset_millis(stage_start, -(RAMP_DURATION_MS as f64));
        let stage_pressure = stage.pressure.unwrap_or(working);
        let drop_target = stage.target_pressure.unwrap_or(0.0);
        let hold_end_pressure = last_drop_pressure + stage.hold_drift.unwrap_or(0.0);

        let gap_ms = (rise_start - last_drop_time).num_milliseconds();
        if gap_ms > MIN_GAP_MS {
            let count = gap_intervals(gap_ms);
            match stage.hold_drift {
                Some(drift) if drift != 0.0 => push_drift_hold(
                    &mut points,
                    rng,
                    last_drop_time,
                    rise_start,
                    last_drop_pressure,
                    hold_end_pressure,
                    count,
                ),
                _ => push_stable_hold(
                    &mut points,
                    rng,
                    last_drop_time,
                    rise_start,
                    last_drop_pressure,
                    count,
                ),
            }
        }

        push_ramp(
            &mut points,
            rng,
            rise_start,
            hold_end_pressure,
            stage_pressure,
            STAGE_RAMP_NOISE,
        );

        let stage_end = shift(stage_start, stage.duration * 60_000.0, "stage duration")?;
        let final_hold_pressure = stage.final_hold_pressure(stage_pressure);
        if stage.has_drift_bounds() {
            push_drift_hold(
                &mut points,
                rng,
                stage_start,
                stage_end,
                stage_pressure,
                final_hold_pressure,
                STAGE_HOLD_INTERVALS,
            );
        } else {
            push_stable_hold(
                &mut points,
                rng,
                stage_start,
                stage_end,
                stage_pressure,
                STAGE_HOLD_INTERVALS,
            );
        }

        push_ramp(
            &mut points,
            rng,
            stage_end,
            final_hold_pressure,
            drop_target,
            STAGE_RAMP_NOISE,
        );

        last_drop_time = offset_millis(stage_end, RAMP_DURATION_MS as f64);
        last_drop_pressure = drop_target;
    }

    // A residual pressure is released in the last ramp before the end, so the
    // final hold stops where that ramp begins. The release never starts before
    // the previous drop has finished.
    let needs_final_drop = last_drop_pressure > 0.0;
    let final_hold_end = if needs_final_drop {
        offset_millis(end, -(RAMP_DURATION_MS as f64)).max(last_drop_time)
    } else {
        end
    };
    let gap_ms = (end - last_drop_time).num_milliseconds();
    if gap_ms > MIN_GAP_MS && final_hold_end > last_drop_time {
        push_stable_hold(
            &mut points,
            rng,
            last_drop_time,
            final_hold_end,
            last_drop_pressure,
            gap_intervals(gap_ms),
        );
    }

    if needs_final_drop {
        push_ramp(
            &mut points,
            rng,
            final_hold_end,
            last_drop_pressure,
            0.0,
            FINAL_RAMP_NOISE,
        );
    }

    let points = finalize(points, start, end);
    log::debug!(
        "Generated {} points for {} intermediate stages",
        points.len(),
        settings.intermediate_tests.len()
    );

    Ok(GraphData {
        points,
        start_date_time: start,
        end_date_time: end,
    })
}

/// Number of hold intervals for a gap: at least 10, two more per full hour
pub fn gap_intervals(gap_ms: i64) -> usize {
    let hours = (gap_ms.max(0) / 3_600_000) as usize;
    MIN_GAP_INTERVALS.max(hours * INTERVALS_PER_HOUR)
}

/// Appends a 30-second linear ramp of `RAMP_STEPS + 1` points
///
/// Endpoints keep their exact pressures; interior points get uniform noise of
/// up to `noise_amplitude` in either direction.
pub fn push_ramp<R: Rng + ?Sized>(
    points: &mut Vec<DataPoint>,
    rng: &mut R,
    start: NaiveDateTime,
    from: f64,
    to: f64,
    noise_amplitude: f64,
) {
    let step_ms = RAMP_DURATION_MS as f64 / RAMP_STEPS as f64;
    for i in 0..=RAMP_STEPS {
        let fraction = i as f64 / RAMP_STEPS as f64;
        let nominal = from * (1.0 - fraction) + to * fraction;
        let pressure = if i == 0 || i == RAMP_STEPS {
            nominal
        } else {
            nominal + jitter(rng, noise_amplitude)
        };
        points.push(DataPoint::new(
            offset_millis(start, i as f64 * step_ms),
            clamp_pressure(pressure),
        ));
    }
}

/// Appends `intervals + 1` evenly spaced samples around a constant pressure
pub fn push_stable_hold<R: Rng + ?Sized>(
    points: &mut Vec<DataPoint>,
    rng: &mut R,
    start: NaiveDateTime,
    end: NaiveDateTime,
    pressure: f64,
    intervals: usize,
) {
    push_drift_hold(points, rng, start, end, pressure, pressure, intervals);
}

/// Appends `intervals + 1` evenly spaced samples whose nominal pressure moves
/// linearly from `from` to `to`
pub fn push_drift_hold<R: Rng + ?Sized>(
    points: &mut Vec<DataPoint>,
    rng: &mut R,
    start: NaiveDateTime,
    end: NaiveDateTime,
    from: f64,
    to: f64,
    intervals: usize,
) {
    let intervals = intervals.max(1);
    let step_ms = (end - start).num_milliseconds() as f64 / intervals as f64;
    for i in 0..=intervals {
        let fraction = i as f64 / intervals as f64;
        let nominal = from + (to - from) * fraction;
        points.push(DataPoint::new(
            offset_millis(start, i as f64 * step_ms),
            clamp_pressure(add_noise(rng, nominal, DEFAULT_MAX_NOISE)),
        ));
    }
}

/// Shifts `instant` by `millis`, failing when the result is not representable
fn shift(instant: NaiveDateTime, millis: f64, what: &str) -> GraphResult<NaiveDateTime> {
    checked_offset_millis(instant, millis).ok_or_else(|| {
        GraphError::OutOfRange(format!("{} overflows the calendar from {}", what, instant))
    })
}

/// Clips to the test window, appends the terminal `(end, 0)` point, sorts by
/// time (stable) and keeps the first point for each timestamp
fn finalize(
    mut points: Vec<DataPoint>,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<DataPoint> {
    let before = points.len();
    points.retain(|p| p.time >= start && p.time < end);
    if points.len() < before {
        log::debug!(
            "Dropped {} points outside {} - {}",
            before - points.len(),
            start,
            end
        );
    }
    points.push(DataPoint::new(end, 0.0));

    points.sort_by(|a, b| a.time.cmp(&b.time));
    points.dedup_by(|later, earlier| later.time == earlier.time);
    points
}
