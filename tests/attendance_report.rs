//! Attendance resolver behavior over realistic event histories.

use chrono::NaiveDate;
use uuid::Uuid;

use sevak::attendance::{compute_attendance, AttendanceStatus, PresenceRecord};
use sevak::models::Amavasya;

/// Builds one event per month of `year`, most recent first.
fn year_of_events(year: i32) -> Vec<Amavasya> {
    (1..=12)
        .rev()
        .map(|month| Amavasya {
            id: Uuid::new_v4(),
            month,
            year,
            start_date: NaiveDate::from_ymd_opt(year, month as u32, 15)
                .unwrap()
                .and_hms_opt(6, 0, 0)
                .unwrap(),
            end_date: NaiveDate::from_ymd_opt(year, month as u32, 15)
                .unwrap()
                .and_hms_opt(20, 0, 0),
            start_time: Some("06:00".to_string()),
            end_time: Some("20:00".to_string()),
            is_active: true,
            created_at: NaiveDate::from_ymd_opt(year, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        })
        .collect()
}

fn record_for(event: &Amavasya) -> PresenceRecord {
    PresenceRecord {
        amavasya_id: event.id,
        location_name: "Akshar Hall".to_string(),
        note: None,
    }
}

#[test]
fn perfect_attendance_streak_spans_the_whole_year() {
    let events = year_of_events(2024);
    let records: Vec<PresenceRecord> = events.iter().map(record_for).collect();

    let report = compute_attendance(&events, &records);

    assert_eq!(report.total_amavasya, 12);
    assert_eq!(report.present, 12);
    assert_eq!(report.absent, 0);
    assert_eq!(report.continuous_present_count, 12);
}

#[test]
fn streak_counts_leading_presences_only() {
    let events = year_of_events(2024);
    // Present for Dec, Nov, Oct; absent Sep; present the rest of the year.
    let records: Vec<PresenceRecord> = events
        .iter()
        .filter(|e| e.month != 9)
        .map(record_for)
        .collect();

    let report = compute_attendance(&events, &records);

    assert_eq!(report.present, 11);
    assert_eq!(report.absent, 1);
    // Dec, Nov, Oct lead; the September gap freezes the streak even though
    // eight earlier months were present.
    assert_eq!(report.continuous_present_count, 3);
}

#[test]
fn missing_the_latest_event_resets_the_streak_to_zero() {
    let events = year_of_events(2024);
    let records: Vec<PresenceRecord> = events
        .iter()
        .filter(|e| e.month != 12)
        .map(record_for)
        .collect();

    let report = compute_attendance(&events, &records);

    assert_eq!(report.present, 11);
    assert_eq!(report.continuous_present_count, 0);
}

#[test]
fn items_are_returned_in_timeline_order() {
    let events = year_of_events(2024);
    let records = vec![record_for(&events[0])];

    let report = compute_attendance(&events, &records);

    let months: Vec<i32> = report.items.iter().map(|i| i.month).collect();
    assert_eq!(months, (1..=12).collect::<Vec<i32>>());

    // Only December carries a location; every other month is a bare absence.
    assert_eq!(report.items[11].status, AttendanceStatus::Present);
    assert_eq!(report.items[11].location.as_deref(), Some("Akshar Hall"));
    assert!(report.items[0].location.is_none());
}

#[test]
fn tallies_always_cover_every_event() {
    let events = year_of_events(2024);

    for present_months in [vec![], vec![12], vec![1, 6, 12], (1..=12).collect::<Vec<i32>>()] {
        let records: Vec<PresenceRecord> = events
            .iter()
            .filter(|e| present_months.contains(&e.month))
            .map(record_for)
            .collect();

        let report = compute_attendance(&events, &records);
        assert_eq!(report.present + report.absent, report.total_amavasya);
        assert_eq!(report.present as usize, present_months.len());
    }
}

#[test]
fn report_serializes_with_camel_case_keys() {
    let events = year_of_events(2024);
    let records = vec![record_for(&events[0])];

    let report = compute_attendance(&events, &records);
    let json = serde_json::to_value(&report).unwrap();

    assert!(json.get("totalAmavasya").is_some());
    assert!(json.get("continuousPresentCount").is_some());
    assert_eq!(json["items"].as_array().unwrap().len(), 12);
    assert!(json["items"][0].get("amavasyaId").is_some());
    assert!(json["items"][0].get("startDate").is_some());
}

#[test]
fn stray_records_for_unknown_events_are_ignored() {
    let events = year_of_events(2024);
    let mut records: Vec<PresenceRecord> = events.iter().map(record_for).collect();
    records.push(PresenceRecord {
        amavasya_id: Uuid::new_v4(),
        location_name: "Ghost Hall".to_string(),
        note: None,
    });

    let report = compute_attendance(&events, &records);
    assert_eq!(report.present, 12);
    assert_eq!(report.total_amavasya, 12);
}
