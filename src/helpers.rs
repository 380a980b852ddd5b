//! Shared unit-conversion and rounding helpers.
//!
//! OpenWeatherMap reports temperatures in Kelvin; everything downstream of the
//! provider boundary works in Celsius. Rounding is centralised here so the
//! provider and the aggregation code agree on precision:
//!
//! - temperatures: 1 decimal at the provider boundary, 2 decimals for
//!   aggregated day/night means
//! - wind speed: 1 decimal
//! - humidity / pressure: nearest integer

/// Convert a Kelvin temperature to Celsius, rounded to 1 decimal place.
pub(crate) fn celsius_from_kelvin(kelvin: f64) -> f64 {
    round1(kelvin - 273.15)
}

/// Round to 1 decimal place.
pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Round to 2 decimal places.
pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Arithmetic mean. Returns 0.0 for an empty slice so callers never divide
/// by zero; call sites in the aggregation code guard for emptiness anyway.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_celsius_from_kelvin_freezing_point() {
        assert_eq!(celsius_from_kelvin(273.15), 0.0);
    }

    #[test]
    fn test_celsius_from_kelvin_summer_day() {
        assert_eq!(celsius_from_kelvin(300.0), 26.9);
    }

    #[test]
    fn test_celsius_from_kelvin_below_freezing() {
        assert_eq!(celsius_from_kelvin(263.15), -10.0);
    }

    #[test]
    fn test_celsius_from_kelvin_within_rounding_of_exact() {
        // The conversion is exact up to the declared 0.1° rounding.
        for k in [0.0, 100.0, 255.37, 273.15, 288.7, 310.15] {
            let exact = k - 273.15;
            assert!(
                (celsius_from_kelvin(k) - exact).abs() <= 0.05 + 1e-9,
                "conversion of {} drifted from {}",
                k,
                exact
            );
        }
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(3.14), 3.1);
        assert_eq!(round1(3.16), 3.2);
        assert_eq!(round1(-2.26), -2.3);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(24.666666), 24.67);
        assert_eq!(round2(19.0), 19.0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[22.0, 25.0, 27.0]), 24.666666666666668);
        assert_eq!(mean(&[19.0]), 19.0);
        assert_eq!(mean(&[]), 0.0);
    }
}
