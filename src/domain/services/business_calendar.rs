use crate::domain::entities::CalendarSettings;
use crate::domain::errors::{DomainError, DomainResult};
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Answers which instants count as business time.
pub struct BusinessCalendar<'a> {
    settings: &'a CalendarSettings,
    tz: Tz,
}

impl<'a> BusinessCalendar<'a> {
    pub fn new(settings: &'a CalendarSettings) -> DomainResult<Self> {
        let tz: Tz = settings
            .timezone
            .parse()
            .map_err(|_| DomainError::Validation(format!("Invalid timezone: {}", settings.timezone)))?;
        Ok(Self { settings, tz })
    }

    /// Whether `date` (in the calendar's timezone) has a business window.
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        self.settings.weekdays.contains(&date.weekday())
            && !self.settings.holidays.iter().any(|h| h.matches(date))
    }

    /// Business hours elapsed between two instants. Never negative.
    pub fn business_hours_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
        if end <= start {
            return 0.0;
        }

        let first_day = start.with_timezone(&self.tz).date_naive();
        let last_day = end.with_timezone(&self.tz).date_naive();

        let mut millis: i64 = 0;
        for day in first_day.iter_days().take_while(|d| *d <= last_day) {
            if !self.is_business_day(day) {
                continue;
            }
            let opens = self.local_instant(day, self.settings.start_hour);
            let closes = self.local_instant(day, self.settings.end_hour);

            let from = start.max(opens);
            let to = end.min(closes);
            if to > from {
                millis += (to - from).num_milliseconds();
            }
        }

        millis as f64 / MILLIS_PER_HOUR
    }

    /// UTC instant of `hour` o'clock on a local `day`. Hour 24 is the
    /// following midnight.
    fn local_instant(&self, day: NaiveDate, hour: u32) -> DateTime<Utc> {
        let naive: NaiveDateTime = day.and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour));
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(t) => t.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            // Inside a DST gap: the wall clock skips ahead by an hour.
            LocalResult::None => self
                .tz
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|| naive.and_utc()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Holiday;

    fn settings() -> CalendarSettings {
        CalendarSettings::default()
    }

    // 2026-01-12 is a Monday.
    fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_zero_length_interval() {
        let s = settings();
        let calendar = BusinessCalendar::new(&s).unwrap();
        let t = utc(12, 10, 0);
        assert_eq!(calendar.business_hours_between(t, t), 0.0);
    }

    #[test]
    fn test_reversed_interval_is_zero() {
        let s = settings();
        let calendar = BusinessCalendar::new(&s).unwrap();
        assert_eq!(calendar.business_hours_between(utc(13, 10, 0), utc(12, 10, 0)), 0.0);
    }

    #[test]
    fn test_full_business_day() {
        let s = settings();
        let calendar = BusinessCalendar::new(&s).unwrap();
        assert_eq!(calendar.business_hours_between(utc(12, 8, 0), utc(12, 18, 0)), 10.0);
    }

    #[test]
    fn test_weekend_day_counts_nothing() {
        let s = settings();
        let calendar = BusinessCalendar::new(&s).unwrap();
        // Saturday 2026-01-17
        assert_eq!(calendar.business_hours_between(utc(17, 8, 0), utc(17, 18, 0)), 0.0);
        assert_eq!(calendar.business_hours_between(utc(17, 0, 0), utc(19, 0, 0)), 0.0);
    }

    #[test]
    fn test_same_day_clipped_to_window() {
        let s = settings();
        let calendar = BusinessCalendar::new(&s).unwrap();
        assert_eq!(calendar.business_hours_between(utc(12, 6, 0), utc(12, 9, 30)), 1.5);
        assert_eq!(calendar.business_hours_between(utc(12, 17, 0), utc(12, 23, 0)), 1.0);
        assert_eq!(calendar.business_hours_between(utc(12, 19, 0), utc(12, 23, 0)), 0.0);
    }

    #[test]
    fn test_friday_evening_to_monday_morning() {
        let s = settings();
        let calendar = BusinessCalendar::new(&s).unwrap();
        // Friday 2026-01-16 17:00 -> Monday 2026-01-19 09:00
        assert_eq!(calendar.business_hours_between(utc(16, 17, 0), utc(19, 9, 0)), 2.0);
    }

    #[test]
    fn test_multi_week_span() {
        let s = settings();
        let calendar = BusinessCalendar::new(&s).unwrap();
        // Two full working weeks, Monday 00:00 to Monday 00:00.
        assert_eq!(calendar.business_hours_between(utc(12, 0, 0), utc(26, 0, 0)), 100.0);
    }

    #[test]
    fn test_holiday_is_skipped() {
        let mut s = settings();
        s.holidays.push(Holiday {
            date: NaiveDate::from_ymd_opt(2026, 1, 13).unwrap(),
            name: "Company day".to_string(),
            recurring: false,
        });
        let calendar = BusinessCalendar::new(&s).unwrap();
        assert!(!calendar.is_business_day(NaiveDate::from_ymd_opt(2026, 1, 13).unwrap()));
        assert_eq!(calendar.business_hours_between(utc(12, 8, 0), utc(14, 18, 0)), 20.0);
    }

    #[test]
    fn test_end_hour_24() {
        let mut s = settings();
        s.start_hour = 0;
        s.end_hour = 24;
        let calendar = BusinessCalendar::new(&s).unwrap();
        assert_eq!(calendar.business_hours_between(utc(12, 0, 0), utc(13, 0, 0)), 24.0);
    }

    #[test]
    fn test_timezone_shifts_window() {
        let mut s = settings();
        s.timezone = "America/Sao_Paulo".to_string();
        let calendar = BusinessCalendar::new(&s).unwrap();
        // 08:00-18:00 in Sao Paulo (UTC-3) is 11:00-21:00 UTC.
        assert_eq!(calendar.business_hours_between(utc(12, 8, 0), utc(12, 11, 0)), 0.0);
        assert_eq!(calendar.business_hours_between(utc(12, 11, 0), utc(12, 21, 0)), 10.0);
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        let mut s = settings();
        s.timezone = "Nowhere/Land".to_string();
        assert!(BusinessCalendar::new(&s).is_err());
    }
}
