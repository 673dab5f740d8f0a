use thiserror::Error;

/// Tolerance on the normalized sum. Raw percentages usually come out of a
/// spreadsheet rounded to two decimal places, so the raw sum can be off by a
/// few parts in ten thousand before normalization.
const SUM_TOLERANCE: f64 = 1e-3;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("monthly profile does not sum to 100%: {percent:.2}%")]
    BadSum { percent: f64 },
    #[error("month {month} fraction {fraction} is outside (0, 1)")]
    BadFraction { month: u32, fraction: f64 },
}

/// Normalized monthly generation distribution, January first.
///
/// Construction divides each raw percentage by the raw sum, so a raw set
/// summing to 0.9999 validates as exactly 100%. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyProfile {
    fractions: [f64; 12],
}

impl MonthlyProfile {
    pub fn from_raw(raw: [f64; 12]) -> Self {
        let total: f64 = raw.iter().sum();
        let mut fractions = raw;
        for f in &mut fractions {
            *f /= total;
        }
        Self { fractions }
    }

    /// Fraction for a calendar month in 1..=12.
    pub fn fraction(&self, month: u32) -> f64 {
        self.fractions[(month - 1) as usize]
    }

    /// Iterate `(month, fraction)` in calendar order.
    pub fn months(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.fractions
            .iter()
            .enumerate()
            .map(|(i, f)| (i as u32 + 1, *f))
    }

    /// Structural check. Runs once at startup, before any calculation.
    pub fn validate(&self) -> Result<(), ProfileError> {
        for (month, fraction) in self.months() {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(ProfileError::BadFraction { month, fraction });
            }
        }
        let total: f64 = self.fractions.iter().sum();
        if (total - 1.0).abs() > SUM_TOLERANCE {
            return Err(ProfileError::BadSum {
                percent: total * 100.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The scheme's own raw percentages; they sum to 0.9999 before
    // normalization.
    fn scheme_raw() -> [f64; 12] {
        [
            0.0285, 0.0588, 0.0801, 0.1177, 0.1467, 0.1152, 0.1230, 0.1210, 0.0957, 0.0603,
            0.0278, 0.0251,
        ]
    }

    #[test]
    fn normalization_fixes_rounding_in_raw_percentages() {
        let raw = scheme_raw();
        assert!((raw.iter().sum::<f64>() - 0.9999).abs() < 1e-12);

        let profile = MonthlyProfile::from_raw(raw);
        let total: f64 = profile.months().map(|(_, f)| f).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn fractions_preserve_relative_weights() {
        let profile = MonthlyProfile::from_raw(scheme_raw());
        let may = profile.fraction(5);
        let dec = profile.fraction(12);
        assert!((may / dec - 0.1467 / 0.0251).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_zero_month() {
        let mut raw = scheme_raw();
        raw[3] = 0.0;
        let profile = MonthlyProfile::from_raw(raw);
        assert!(matches!(
            profile.validate(),
            Err(ProfileError::BadFraction { month: 4, .. })
        ));
    }

    #[test]
    fn uniform_profile_splits_evenly() {
        let profile = MonthlyProfile::from_raw([0.10; 12]);
        for (_, f) in profile.months() {
            assert!((f - 1.0 / 12.0).abs() < 1e-12);
        }
        assert!(profile.validate().is_ok());
    }
}
