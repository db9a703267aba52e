use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::generator::RAMP_DURATION_MS;
use crate::settings::{
    PressureStage, TestSettings, TestSettingsForm, checked_offset_millis, checked_offset_minutes,
    resolve_date_time,
};

lazy_static! {
    static ref DATE_REGEX: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref TIME_REGEX: Regex = Regex::new(r"^\d{2}:\d{2}(:\d{2})?$").unwrap();
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]{3,32}$").unwrap();
}

/// A single rejected field
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FieldError {
    /// Field path, e.g. `startDate` or `intermediateTests[1].duration`
    pub field: String,
    pub message: String,
}

/// All field errors found in one submission
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// True if any error concerns `field`
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Checks a submitted form and resolves it into [`TestSettings`]
///
/// Every rule is checked and all failures are reported together.
///
/// # Examples
/// ```
/// use pressure_graph::settings::TestSettingsForm;
/// use pressure_graph::validation::validate_form;
///
/// let form = TestSettingsForm {
///     start_date: "2025-10-31".to_string(),
///     start_time: "10:00:00".to_string(),
///     end_date: "2025-10-31".to_string(),
///     end_time: "14:00:00".to_string(),
///     working_pressure: 50.0,
///     pressure_hold_duration: 60.0,
///     intermediate_tests: Vec::new(),
///     title: None,
///     equipment: None,
///     test_number: None,
///     temperature: None,
/// };
/// let settings = validate_form(&form).unwrap();
/// assert_eq!(settings.duration_hours(), 4.0);
/// ```
pub fn validate_form(form: &TestSettingsForm) -> Result<TestSettings, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let start = resolve_field(&mut errors, "start", &form.start_date, &form.start_time);
    let end = resolve_field(&mut errors, "end", &form.end_date, &form.end_time);

    let (Some(start), Some(end)) = (start, end) else {
        // Without both instants the remaining rules cannot be evaluated.
        check_pressures(&mut errors, form.working_pressure, form.pressure_hold_duration);
        return Err(errors);
    };

    let settings = TestSettings {
        start_date_time: start,
        end_date_time: end,
        working_pressure: form.working_pressure,
        pressure_hold_duration: form.pressure_hold_duration,
        intermediate_tests: form.intermediate_tests.clone(),
        title: form.title.clone(),
        equipment: form.equipment.clone(),
        test_number: form.test_number.clone(),
        temperature: form.temperature,
    };

    errors.errors.extend(validate_settings(&settings));
    if errors.is_empty() {
        Ok(settings)
    } else {
        Err(errors)
    }
}

/// Checks already-resolved settings, returning every rule violation
pub fn validate_settings(settings: &TestSettings) -> Vec<FieldError> {
    let mut errors = ValidationErrors::default();

    if settings.end_date_time <= settings.start_date_time {
        errors.push("endDateTime", "End must be after start");
    }
    check_pressures(
        &mut errors,
        settings.working_pressure,
        settings.pressure_hold_duration,
    );
    if settings.end_date_time > settings.start_date_time {
        check_initial_hold_fits(&mut errors, settings);
    }

    let total_hours = settings.duration_hours();
    let mut seen = HashSet::new();
    for (index, stage) in settings.intermediate_tests.iter().enumerate() {
        let prefix = format!("intermediateTests[{}]", index);
        if stage.id.trim().is_empty() {
            errors.push(format!("{}.id", prefix), "Stage id is required");
        } else if !seen.insert(stage.id.as_str()) {
            errors.push(
                format!("{}.id", prefix),
                format!("Duplicate stage id '{}'", stage.id),
            );
        }
        check_stage(&mut errors, &prefix, stage, settings, total_hours);
    }

    errors.errors
}

fn check_stage(
    errors: &mut ValidationErrors,
    prefix: &str,
    stage: &PressureStage,
    settings: &TestSettings,
    total_hours: f64,
) {
    if !stage.time.is_finite() || stage.time < 0.0 {
        errors.push(format!("{}.time", prefix), "Time must be non-negative");
    } else if stage.time > total_hours {
        errors.push(
            format!("{}.time", prefix),
            format!("Time exceeds test duration of {:.2} h", total_hours),
        );
    }

    if !stage.duration.is_finite() || stage.duration <= 0.0 {
        errors.push(format!("{}.duration", prefix), "Duration must be positive");
    } else if stage.time.is_finite() && stage.time >= 0.0 {
        // The stage's drop, and the final release of any residual pressure,
        // must both finish by the test end.
        let ramps = match stage.target_pressure {
            Some(target) if target > 0.0 => 2,
            _ => 1,
        };
        let latest_end = checked_offset_millis(
            settings.end_date_time,
            -((ramps * RAMP_DURATION_MS) as f64),
        );
        match checked_offset_minutes(settings.stage_start(stage), stage.duration) {
            Some(stage_end) if latest_end.is_some_and(|latest| stage_end <= latest) => {}
            Some(_) => errors.push(
                format!("{}.duration", prefix),
                "Stage hold and depressurization must finish before the test end",
            ),
            None => errors.push(
                format!("{}.duration", prefix),
                "Duration is out of range",
            ),
        }
    }

    if let Some(pressure) = stage.pressure {
        if pressure <= 0.0 {
            errors.push(format!("{}.pressure", prefix), "Pressure must be positive");
        }
    }
    if let (Some(min), Some(max)) = (stage.min_pressure, stage.max_pressure) {
        if min > max {
            errors.push(
                format!("{}.minPressure", prefix),
                "Minimum pressure exceeds maximum pressure",
            );
        }
    }
    for (name, value) in [
        ("minPressure", stage.min_pressure),
        ("maxPressure", stage.max_pressure),
        ("targetPressure", stage.target_pressure),
    ] {
        if matches!(value, Some(v) if v < 0.0) {
            errors.push(format!("{}.{}", prefix, name), "Pressure cannot be negative");
        }
    }
}

/// Initial rise, hold at working pressure and release must fit in the window
fn check_initial_hold_fits(errors: &mut ValidationErrors, settings: &TestSettings) {
    let hold = settings.pressure_hold_duration;
    if !hold.is_finite() || hold <= 0.0 {
        return;
    }
    let release_end = checked_offset_millis(
        settings.start_date_time,
        2.0 * RAMP_DURATION_MS as f64 + hold * 60_000.0,
    );
    match release_end {
        Some(release_end) if release_end <= settings.end_date_time => {}
        _ => errors.push(
            "pressureHoldDuration",
            "Rise, hold and release must finish before the test end",
        ),
    }
}

fn check_pressures(errors: &mut ValidationErrors, working_pressure: f64, hold_duration: f64) {
    if !working_pressure.is_finite() || working_pressure <= 0.0 {
        errors.push("workingPressure", "Working pressure must be positive");
    }
    if !hold_duration.is_finite() || hold_duration <= 0.0 {
        errors.push("pressureHoldDuration", "Hold duration must be positive");
    }
}

fn resolve_field(
    errors: &mut ValidationErrors,
    prefix: &str,
    date: &str,
    time: &str,
) -> Option<chrono::NaiveDateTime> {
    let mut ok = true;
    if !DATE_REGEX.is_match(date.trim()) {
        errors.push(format!("{}Date", prefix), "Expected format YYYY-MM-DD");
        ok = false;
    }
    if !TIME_REGEX.is_match(time.trim()) {
        errors.push(format!("{}Time", prefix), "Expected format HH:MM:SS");
        ok = false;
    }
    if !ok {
        return None;
    }
    let resolved = resolve_date_time(date, time);
    if resolved.is_none() {
        errors.push(format!("{}Date", prefix), "Not a valid calendar date/time");
    }
    resolved
}

/// Usernames double as directory names, so only a safe character set is allowed
pub fn is_valid_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}
