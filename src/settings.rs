use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Date format accepted for start/end dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time format accepted for start/end times
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// An intermediate pressure test performed during the main test window
///
/// Each stage has its own rise, hold and depressurization. Stages may be
/// listed in any order; the generator sorts them by `time`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PressureStage {
    /// Identifier, unique within one set of settings
    pub id: String,

    /// Offset from the test start, in hours
    pub time: f64,

    /// Hold duration at the stage pressure, in minutes
    pub duration: f64,

    /// Stage target pressure; the working pressure is used when absent
    #[serde(default)]
    pub pressure: Option<f64>,

    /// Lower drift bound for the stage hold
    #[serde(default)]
    pub min_pressure: Option<f64>,

    /// Upper drift bound for the stage hold
    #[serde(default)]
    pub max_pressure: Option<f64>,

    /// Pressure to settle at after this stage's depressurization (default 0)
    #[serde(default)]
    pub target_pressure: Option<f64>,

    /// Signed pressure change applied linearly over the hold before this stage
    #[serde(default)]
    pub hold_drift: Option<f64>,
}

impl PressureStage {
    /// Creates a stage with only the required fields set
    pub fn new(id: impl Into<String>, time: f64, duration: f64) -> Self {
        Self {
            id: id.into(),
            time,
            duration,
            pressure: None,
            min_pressure: None,
            max_pressure: None,
            target_pressure: None,
            hold_drift: None,
        }
    }

    /// Sets the stage pressure
    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = Some(pressure);
        self
    }

    /// Sets the pressure reached after depressurization
    pub fn with_target_pressure(mut self, target: f64) -> Self {
        self.target_pressure = Some(target);
        self
    }

    /// Sets the drift applied to the hold preceding this stage
    pub fn with_hold_drift(mut self, drift: f64) -> Self {
        self.hold_drift = Some(drift);
        self
    }

    /// Pressure the stage hold ends at: the first drift bound that is set,
    /// otherwise the stage pressure itself
    pub fn final_hold_pressure(&self, stage_pressure: f64) -> f64 {
        self.min_pressure.or(self.max_pressure).unwrap_or(stage_pressure)
    }

    /// Whether the stage hold drifts towards a bound instead of holding flat
    pub fn has_drift_bounds(&self) -> bool {
        self.min_pressure.is_some() || self.max_pressure.is_some()
    }
}

/// Resolved configuration of one pressure test
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestSettings {
    pub start_date_time: NaiveDateTime,
    pub end_date_time: NaiveDateTime,

    /// Nominal operating pressure (MPa)
    pub working_pressure: f64,

    /// Minutes held at working pressure right after the initial rise
    pub pressure_hold_duration: f64,

    #[serde(default)]
    pub intermediate_tests: Vec<PressureStage>,

    /// Chart title
    #[serde(default)]
    pub title: Option<String>,

    /// Equipment under test, shown in the chart info box
    #[serde(default)]
    pub equipment: Option<String>,

    #[serde(default)]
    pub test_number: Option<String>,

    /// Ambient temperature in °C
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl TestSettings {
    /// Creates settings without intermediate stages or presentation metadata
    pub fn new(
        start_date_time: NaiveDateTime,
        end_date_time: NaiveDateTime,
        working_pressure: f64,
        pressure_hold_duration: f64,
    ) -> Self {
        Self {
            start_date_time,
            end_date_time,
            working_pressure,
            pressure_hold_duration,
            intermediate_tests: Vec::new(),
            title: None,
            equipment: None,
            test_number: None,
            temperature: None,
        }
    }

    /// Adds an intermediate stage
    pub fn with_stage(mut self, stage: PressureStage) -> Self {
        self.intermediate_tests.push(stage);
        self
    }

    /// Total test length in hours (negative when the range is reversed)
    pub fn duration_hours(&self) -> f64 {
        (self.end_date_time - self.start_date_time).num_milliseconds() as f64 / 3_600_000.0
    }

    /// Instant at which a stage reaches its pressure
    pub fn stage_start(&self, stage: &PressureStage) -> NaiveDateTime {
        offset_hours(self.start_date_time, stage.time)
    }

    /// Title used for rendering and history listings
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) if !title.trim().is_empty() => title.clone(),
            _ => format!(
                "Pressure test {}",
                self.start_date_time.format("%Y-%m-%d %H:%M")
            ),
        }
    }

    /// Converts back into the string-based form used for JSON export
    pub fn to_form(&self) -> TestSettingsForm {
        TestSettingsForm {
            start_date: self.start_date_time.format(DATE_FORMAT).to_string(),
            start_time: self.start_date_time.format(TIME_FORMAT).to_string(),
            end_date: self.end_date_time.format(DATE_FORMAT).to_string(),
            end_time: self.end_date_time.format(TIME_FORMAT).to_string(),
            working_pressure: self.working_pressure,
            pressure_hold_duration: self.pressure_hold_duration,
            intermediate_tests: self.intermediate_tests.clone(),
            title: self.title.clone(),
            equipment: self.equipment.clone(),
            test_number: self.test_number.clone(),
            temperature: self.temperature,
        }
    }
}

/// Test settings as submitted by clients, with separate date and time strings
///
/// This is also the JSON export format, so an exported file can be loaded
/// back and regenerated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestSettingsForm {
    pub start_date: String,
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
    pub working_pressure: f64,
    pub pressure_hold_duration: f64,
    #[serde(default)]
    pub intermediate_tests: Vec<PressureStage>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub equipment: Option<String>,
    #[serde(default)]
    pub test_number: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Combines a `YYYY-MM-DD` date and a `HH:MM:SS` (or `HH:MM`) time
///
/// # Examples
/// ```
/// use pressure_graph::settings::resolve_date_time;
///
/// let dt = resolve_date_time("2025-10-31", "10:00:00").unwrap();
/// assert_eq!(dt.to_string(), "2025-10-31 10:00:00");
/// assert!(resolve_date_time("2025-02-30", "10:00").is_none());
/// ```
pub fn resolve_date_time(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).ok()?;
    let time = NaiveTime::parse_from_str(time.trim(), TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M"))
        .ok()?;
    Some(date.and_time(time))
}

/// Shifts an instant by a (possibly fractional) number of milliseconds,
/// truncating to whole milliseconds
///
/// Returns `None` when the offset is not finite or the result falls outside
/// the calendar range `NaiveDateTime` can represent.
///
/// # Examples
/// ```
/// use pressure_graph::settings::{checked_offset_millis, resolve_date_time};
///
/// let start = resolve_date_time("2025-10-31", "10:00:00").unwrap();
/// assert_eq!(
///     checked_offset_millis(start, 1_500.9).unwrap().to_string(),
///     "2025-10-31 10:00:01.500"
/// );
/// assert!(checked_offset_millis(start, 1e15 * 60_000.0).is_none());
/// ```
pub fn checked_offset_millis(instant: NaiveDateTime, millis: f64) -> Option<NaiveDateTime> {
    if !millis.is_finite() {
        return None;
    }
    let delta = Duration::try_milliseconds(millis as i64)?;
    instant.checked_add_signed(delta)
}

/// Like [`checked_offset_millis`], but saturates at the ends of the
/// representable range instead of failing
pub fn offset_millis(instant: NaiveDateTime, millis: f64) -> NaiveDateTime {
    checked_offset_millis(instant, millis).unwrap_or(if millis < 0.0 {
        NaiveDateTime::MIN
    } else {
        NaiveDateTime::MAX
    })
}

/// Shifts an instant by a fractional number of minutes, `None` on overflow
pub fn checked_offset_minutes(instant: NaiveDateTime, minutes: f64) -> Option<NaiveDateTime> {
    checked_offset_millis(instant, minutes * 60_000.0)
}

/// Shifts an instant by a fractional number of hours
pub fn offset_hours(instant: NaiveDateTime, hours: f64) -> NaiveDateTime {
    offset_millis(instant, hours * 3_600_000.0)
}
