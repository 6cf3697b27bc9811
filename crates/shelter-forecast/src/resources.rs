//! Supply requirements derived from predicted shelter occupancy.
//!
//! Pure arithmetic with no model involvement:
//!
//! | Supply        | Rule                                                       |
//! |---------------|------------------------------------------------------------|
//! | water, litres | `people × 1.5`                                             |
//! | meals         | `people × 2`                                               |
//! | medical kits  | `max(1, people / 5 + round(vulnerability / 5))`            |
//!
//! `people / 5` is integer division. Every shelter gets at least one kit.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::features::VULNERABILITY_RANGE;

/// Drinking water per sheltered person, litres.
pub const WATER_LITERS_PER_PERSON: f64 = 1.5;
/// Meals per sheltered person.
pub const MEALS_PER_PERSON: u64 = 2;
/// One medical kit covers this many people.
pub const PEOPLE_PER_MEDICAL_KIT: u64 = 5;
/// Vulnerability points that add one extra medical kit (rounded).
pub const VULNERABILITY_KIT_DIVISOR: f64 = 5.0;
/// Floor on the medical kit count.
pub const MIN_MEDICAL_KITS: u64 = 1;

/// Supplies needed for one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceEstimate {
    /// Drinking water, litres.
    pub water_liters: f64,
    /// Meals.
    pub meals: u64,
    /// Medical kits, never below one.
    pub medical_kits: u64,
}

/// Resources needed for `people` occupants of a site with the given
/// vulnerability index.
///
/// # Errors
///
/// [`ValidationError::Negative`] if `people < 0`, and
/// [`ValidationError::OutOfRange`] if `vulnerability_index > 10`.
///
/// # Example
///
/// ```rust
/// use shelter_forecast::resources::calculate_resources;
///
/// let r = calculate_resources(12, 7).unwrap();
/// assert_eq!(r.water_liters, 18.0);
/// assert_eq!(r.meals, 24);
/// assert_eq!(r.medical_kits, 3);
/// ```
pub fn calculate_resources(people: i64, vulnerability_index: u8) -> Result<ResourceEstimate, ValidationError> {
    let people = u64::try_from(people).map_err(|_| ValidationError::Negative { field: "people", value: people })?;
    let (min_vi, max_vi) = VULNERABILITY_RANGE;
    if vulnerability_index > max_vi {
        return Err(ValidationError::out_of_range(
            "vulnerability_index",
            f64::from(vulnerability_index),
            f64::from(min_vi),
            f64::from(max_vi),
        ));
    }

    let vulnerability_kits = (f64::from(vulnerability_index) / VULNERABILITY_KIT_DIVISOR).round_ties_even() as u64;
    let medical_kits = (people / PEOPLE_PER_MEDICAL_KIT + vulnerability_kits).max(MIN_MEDICAL_KITS);

    Ok(ResourceEstimate {
        water_liters: people as f64 * WATER_LITERS_PER_PERSON,
        meals: people * MEALS_PER_PERSON,
        medical_kits,
    })
}
