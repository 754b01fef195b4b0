use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::{America::La_Paz, Tz};

/// Bakery time zone
pub const BUSINESS_TZ: Tz = La_Paz;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Calendar date of `instant` at the bakery
pub fn business_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&BUSINESS_TZ).date_naive()
}

/// Accepts `2024-03-01`, `01/03/2024` and `2024/03/01`. Anything else is `None`.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// First instant of `date` at the bakery, in UTC
pub fn start_of_business_day(date: NaiveDate) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    BUSINESS_TZ
        .from_local_datetime(&local)
        .earliest()
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_three_accepted_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_flexible_date("2024-03-01"), Some(expected));
        assert_eq!(parse_flexible_date("01/03/2024"), Some(expected));
        assert_eq!(parse_flexible_date("2024/03/01"), Some(expected));
        assert_eq!(parse_flexible_date("03-01-2024"), None);
        assert_eq!(parse_flexible_date(""), None);
    }

    #[test]
    fn business_date_uses_la_paz_offset() {
        let late_evening = Utc.with_ymd_and_hms(2024, 3, 2, 2, 30, 0).unwrap();
        assert_eq!(
            business_date(late_evening),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn business_day_starts_at_four_utc() {
        let start = start_of_business_day(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 1, 4, 0, 0).unwrap());
    }

    #[test]
    fn day_boundaries_agree_with_business_date() {
        let day = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let start = start_of_business_day(day);
        assert_eq!(business_date(start), day);
        assert_eq!(
            business_date(start - chrono::Duration::seconds(1)),
            NaiveDate::from_ymd_opt(2024, 12, 30).unwrap()
        );
    }
}
