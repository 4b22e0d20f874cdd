/// Property-based tests using proptest
/// Tests invariants and properties that should hold for all inputs
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use proptest::prelude::*;
use rust_merchan_report::models::{AdherenceMetric, RawRow};
use rust_merchan_report::period::{is_reporting_day, reference_date, RunCalendar};
use rust_merchan_report::recipients::normalize_phone_to_e164;
use rust_merchan_report::report_builder::format_pct;
use serde_json::Value;

fn any_date() -> impl Strategy<Value = NaiveDate> {
    // 2020-01-01 .. ~2040
    (0i64..7300).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Duration::days(offset)
    })
}

fn any_json() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<f64>().prop_map(Value::from),
        "\\PC*".prop_map(Value::String),
    ]
}

// Property: Calendar rules hold for every date
proptest! {
    #[test]
    fn only_sunday_is_skipped(d in any_date()) {
        prop_assert_eq!(is_reporting_day(d), d.weekday() != Weekday::Sun);
        prop_assert_eq!(RunCalendar::for_today(d).is_some(), d.weekday() != Weekday::Sun);
    }

    #[test]
    fn reference_is_previous_working_day(d in any_date()) {
        prop_assume!(d.weekday() != Weekday::Sun);
        let expected = if d.weekday() == Weekday::Mon { 2 } else { 1 };
        prop_assert_eq!(reference_date(d), d - Duration::days(expected));
    }

    #[test]
    fn calendar_windows_are_well_formed(d in any_date()) {
        prop_assume!(d.weekday() != Weekday::Sun);
        let cal = RunCalendar::for_today(d).unwrap();

        prop_assert!(cal.yesterday.start() < cal.yesterday.end());
        prop_assert_eq!(cal.month_to_date.end(), d);
        prop_assert_eq!(cal.month_to_date.start().day(), 1);
        prop_assert_eq!(cal.month_to_date.start().month(), cal.reference.month());
        prop_assert_eq!(cal.previous_week.start().weekday(), Weekday::Mon);
        prop_assert_eq!(cal.previous_week.end() - cal.previous_week.start(), Duration::days(6));
        prop_assert!(cal.previous_week.end() <= cal.reference);
    }
}

// Property: Row coercion should never panic
proptest! {
    #[test]
    fn metric_from_row_never_panics(
        completed in any_json(),
        planned in any_json(),
        pct in any_json()
    ) {
        let mut row = RawRow::new();
        row.insert("visits_completed".to_string(), completed);
        row.insert("visits_planned".to_string(), planned);
        row.insert("adherence_pct".to_string(), pct);

        let metric = AdherenceMetric::from_row(&row);
        if let Some(p) = metric.adherence_pct {
            prop_assert!(p.is_finite());
        }
    }

    #[test]
    fn format_pct_placeholder_iff_none(pct in proptest::option::of(0.0f64..=100.0)) {
        let rendered = format_pct(pct, true);
        prop_assert_eq!(rendered == "—", pct.is_none());
    }
}

// Property: Phone normalization should never panic
proptest! {
    #[test]
    fn phone_normalization_never_panics(phone in "\\PC*") {
        let _ = normalize_phone_to_e164(&phone);
    }

    #[test]
    fn brazilian_local_numbers_get_country_code(ddd in 11u8..=99u8, number in 900000000u32..=999999999u32) {
        // A "55" area code is indistinguishable from the country code
        prop_assume!(ddd != 55);
        let raw = format!("({}) {}", ddd, number);
        let normalized = normalize_phone_to_e164(&raw);
        prop_assert_eq!(normalized, format!("+55{}{}", ddd, number));
    }

    #[test]
    fn normalized_phone_is_empty_or_plus_prefixed(phone in "[0-9 ()+.-]{0,20}") {
        let normalized = normalize_phone_to_e164(&phone);
        prop_assert!(normalized.is_empty() || normalized.starts_with('+'));
    }
}
