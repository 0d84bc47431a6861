//! Partitions the request date range into chunks the ClimateSERV API accepts.

use chrono::{Datelike, NaiveDate};

/// An inclusive date range covering at most `chunk_years` calendar years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    /// Start date in the MM/DD/YYYY form the API expects.
    pub fn start_mdy(&self) -> String {
        self.start.format("%m/%d/%Y").to_string()
    }

    /// End date in the MM/DD/YYYY form the API expects.
    pub fn end_mdy(&self) -> String {
        self.end.format("%m/%d/%Y").to_string()
    }

    /// Filesystem-safe tag used in temporary chunk file names.
    pub fn file_tag(&self) -> String {
        format!(
            "{}_{}",
            self.start.format("%m-%d-%Y"),
            self.end.format("%m-%d-%Y")
        )
    }
}

/// Splits `start..=end` into consecutive intervals of at most `chunk_years`
/// calendar years. Interior boundaries fall on year boundaries; only the
/// first start and the last end keep their day-of-year.
pub fn generate_intervals(start: NaiveDate, end: NaiveDate, chunk_years: i32) -> Vec<DateInterval> {
    let mut intervals = Vec::new();
    let mut current_start = start;

    while current_start.year() + chunk_years <= end.year() {
        let current_end =
            NaiveDate::from_ymd_opt(current_start.year() + chunk_years - 1, 12, 31).unwrap();
        intervals.push(DateInterval {
            start: current_start,
            end: current_end,
        });
        current_start = NaiveDate::from_ymd_opt(current_start.year() + chunk_years, 1, 1).unwrap();
    }

    // Remainder shorter than a full chunk
    if current_start <= end {
        intervals.push(DateInterval {
            start: current_start,
            end,
        });
    }

    intervals
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn should_cover_range_without_gaps_or_overlaps() {
        let intervals = generate_intervals(date(1981, 1, 1), date(2024, 6, 10), 5);

        assert_eq!(intervals.first().unwrap().start, date(1981, 1, 1));
        assert_eq!(intervals.last().unwrap().end, date(2024, 6, 10));

        for pair in intervals.windows(2) {
            assert_eq!(
                pair[1].start,
                pair[0].end.checked_add_days(Days::new(1)).unwrap()
            );
        }
    }

    #[test]
    fn should_cap_intervals_at_five_calendar_years() {
        let intervals = generate_intervals(date(1981, 1, 1), date(2024, 6, 10), 5);

        for interval in &intervals {
            assert!(interval.end >= interval.start);
            assert!(interval.end.year() - interval.start.year() < 5);
        }
    }

    #[test]
    fn should_end_interior_intervals_on_year_boundaries() {
        let intervals = generate_intervals(date(1981, 1, 1), date(2024, 6, 10), 5);

        for interval in &intervals[..intervals.len() - 1] {
            assert_eq!((interval.end.month(), interval.end.day()), (12, 31));
        }
    }

    #[test]
    fn should_emit_single_interval_for_short_range() {
        let intervals = generate_intervals(date(2020, 3, 1), date(2021, 6, 30), 5);

        assert_eq!(
            intervals,
            vec![DateInterval {
                start: date(2020, 3, 1),
                end: date(2021, 6, 30),
            }]
        );
    }

    #[test]
    fn should_format_request_dates_and_file_tag() {
        let interval = DateInterval {
            start: date(1981, 1, 1),
            end: date(1985, 12, 31),
        };

        assert_eq!(interval.start_mdy(), "01/01/1981");
        assert_eq!(interval.end_mdy(), "12/31/1985");
        assert_eq!(interval.file_tag(), "01-01-1981_12-31-1985");
    }
}
