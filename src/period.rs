use crate::model::{PeriodWindow, YearMonth};
use chrono::NaiveDate;
use std::iter;

/// Computes the `months_back` most recent months, oldest first.
///
/// With `include_current_month` the window ends at the month containing
/// `now` (MOLIT publishes the running month incrementally); otherwise it
/// ends at the last complete month.
pub fn compute_period_window(
    now: NaiveDate,
    months_back: u32,
    include_current_month: bool,
) -> PeriodWindow {
    if months_back == 0 {
        return Vec::new();
    }

    let current = YearMonth::from_date(&now);
    let end = if include_current_month {
        current
    } else {
        current.prev()
    };

    let start = end.minus_months(months_back - 1);
    iter::successors(Some(start), |month| Some(month.next()))
        .take_while(|month| *month <= end)
        .collect()
}

/// First and last month of the window, if non-empty.
pub fn window_bounds(window: &[YearMonth]) -> Option<(YearMonth, YearMonth)> {
    Some((*window.first()?, *window.last()?))
}
