//! Advisory range checks for vital signs captured at task completion.
//!
//! Out-of-range values are logged and surfaced, never blocking: the
//! caregiver on site decides what to do, the system only flags.

use hearth_db::values::VitalSigns;

const MAX_SYSTOLIC: i32 = 180;
const MAX_DIASTOLIC: i32 = 120;
const MIN_SPO2_PERCENT: f32 = 90.0;
const MIN_TEMP_F: f32 = 95.0;
const MAX_TEMP_F: f32 = 103.0;

/// Warnings for vital signs outside safe ranges. Absent measurements
/// produce no warning.
pub fn vital_warnings(vitals: &VitalSigns) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(systolic) = vitals.systolic_bp {
        if systolic > MAX_SYSTOLIC {
            warnings.push(format!(
                "systolic blood pressure {systolic} exceeds {MAX_SYSTOLIC} mmHg"
            ));
        }
    }
    if let Some(diastolic) = vitals.diastolic_bp {
        if diastolic > MAX_DIASTOLIC {
            warnings.push(format!(
                "diastolic blood pressure {diastolic} exceeds {MAX_DIASTOLIC} mmHg"
            ));
        }
    }
    if let Some(spo2) = vitals.spo2_percent {
        if spo2 < MIN_SPO2_PERCENT {
            warnings.push(format!("SpO2 {spo2}% is below {MIN_SPO2_PERCENT}%"));
        }
    }
    if let Some(temp) = vitals.temperature_f {
        if !(MIN_TEMP_F..=MAX_TEMP_F).contains(&temp) {
            warnings.push(format!(
                "temperature {temp}F is outside {MIN_TEMP_F}-{MAX_TEMP_F}F"
            ));
        }
    }

    warnings
}
