//! Recurrence evaluator: decides whether a frequency description produces
//! an occurrence on a given calendar date.
//!
//! Pure function of (frequency, date); the caller supplies the candidate
//! date and owns any notion of "today".

use chrono::NaiveDate;

use hearth_db::values::{DayOfWeek, Frequency, FrequencyPattern};

/// Whether a template with this frequency fires on `date`.
///
/// - `Daily` always fires.
/// - `Weekly` fires on the listed weekdays; with no weekdays listed it
///   fires every day.
/// - `AsNeeded` never fires -- occurrences are created manually.
/// - `BiWeekly`, `Monthly`, and `Custom` currently fire on every date;
///   interval membership against an anchor date is not computed.
pub fn fires_on(frequency: &Frequency, date: NaiveDate) -> bool {
    match frequency.pattern {
        FrequencyPattern::Daily => true,
        FrequencyPattern::AsNeeded => false,
        FrequencyPattern::Weekly => {
            if frequency.days_of_week.is_empty() {
                true
            } else {
                frequency
                    .days_of_week
                    .contains(&DayOfWeek::from_date(date))
            }
        }
        FrequencyPattern::BiWeekly | FrequencyPattern::Monthly | FrequencyPattern::Custom => true,
    }
}
