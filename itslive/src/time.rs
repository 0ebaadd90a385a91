//! Date conversions for the `date` mosaic variable.

use crate::ItsLiveError;
use chrono::{Datelike, Duration, NaiveDate};

/// Converts a MATLAB style day number (day 1 is 0000-01-01) to a
/// decimal year.
///
/// Fractional days carry through, so noon on 2018-07-02 lands half a
/// day past midnight. NaN day numbers (filled cells) stay NaN.
pub fn datenum_to_decimal_year(datenum: f64) -> Result<f64, ItsLiveError> {
    if datenum.is_nan() {
        return Ok(f64::NAN);
    }
    if !datenum.is_finite() || !(1.0..=3_652_425.0).contains(&datenum) {
        return Err(ItsLiveError::OutOfRange(format!(
            "day number {datenum} outside years 0..10000"
        )));
    }
    let whole = datenum.floor();
    let epoch = NaiveDate::from_ymd_opt(0, 1, 1).ok_or_else(|| range(datenum))?;
    #[allow(clippy::cast_possible_truncation)]
    let date = epoch
        .checked_add_signed(Duration::days(whole as i64 - 1))
        .ok_or_else(|| range(datenum))?;
    let year = date.year();
    let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| range(datenum))?;
    let next = NaiveDate::from_ymd_opt(year + 1, 1, 1).ok_or_else(|| range(datenum))?;
    #[allow(clippy::cast_precision_loss)]
    let days_in_year = (next - start).num_days() as f64;
    let day_of_year = f64::from(date.ordinal0()) + (datenum - whole);
    Ok(f64::from(year) + day_of_year / days_in_year)
}

fn range(datenum: f64) -> ItsLiveError {
    ItsLiveError::OutOfRange(format!("day number {datenum}"))
}

#[cfg(test)]
mod tests {
    use super::datenum_to_decimal_year;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_known_dates() {
        // datenum(2000, 1, 1)
        assert_abs_diff_eq!(datenum_to_decimal_year(730_486.0).unwrap(), 2000.0);
        // datenum(2018, 7, 2) is day 182 of 365, at noon.
        assert_abs_diff_eq!(
            datenum_to_decimal_year(737_243.5).unwrap(),
            2018.0 + 182.5 / 365.0,
            epsilon = 1e-12
        );
        // datenum(2020, 7, 2) is day 183 of 366.
        assert_abs_diff_eq!(
            datenum_to_decimal_year(737_974.0).unwrap(),
            2020.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_fill_and_range() {
        assert!(datenum_to_decimal_year(f64::NAN).unwrap().is_nan());
        assert!(datenum_to_decimal_year(0.0).is_err());
        assert!(datenum_to_decimal_year(f64::INFINITY).is_err());
    }
}
