//! Attendance resolution over the chronological Amavasya list.
//!
//! Presence is encoded purely by the existence of an assignment record for
//! an (event, user) pair; there is no explicit "absent" row. The resolver is
//! a pure projection: it mutates nothing and cannot fail.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Amavasya;

/// An assignment row for one user, joined with its location name.
#[derive(Debug, Clone)]
pub struct PresenceRecord {
    pub amavasya_id: Uuid,
    pub location_name: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendance {
    pub amavasya_id: Uuid,
    pub month: i32,
    pub year: i32,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReport {
    pub total_amavasya: i64,
    pub present: i64,
    pub absent: i64,
    pub continuous_present_count: i64,
    /// Timeline order: oldest event first.
    pub items: Vec<EventAttendance>,
}

/// Computes per-event presence and the continuous-presence streak.
///
/// `events` must be sorted by `start_date` descending (most recent first);
/// the streak is counted from the head of that order and is permanently
/// broken by the first event without a record. The returned `items` are
/// reversed back to ascending order for timeline presentation.
///
/// Duplicate records for one event collapse to a single entry; the last one
/// seen wins. The write side rejects duplicates, so this only matters for
/// legacy rows.
pub fn compute_attendance(events: &[Amavasya], records: &[PresenceRecord]) -> AttendanceReport {
    let by_event: HashMap<Uuid, &PresenceRecord> = records
        .iter()
        .map(|record| (record.amavasya_id, record))
        .collect();

    let mut items = Vec::with_capacity(events.len());
    let mut present = 0i64;
    let mut absent = 0i64;
    let mut streak = 0i64;
    let mut streak_broken = false;

    for event in events {
        let record = by_event.get(&event.id);

        let status = if record.is_some() {
            present += 1;
            if !streak_broken {
                streak += 1;
            }
            AttendanceStatus::Present
        } else {
            absent += 1;
            streak_broken = true;
            AttendanceStatus::Absent
        };

        items.push(EventAttendance {
            amavasya_id: event.id,
            month: event.month,
            year: event.year,
            start_date: event.start_date,
            end_date: event.end_date,
            status,
            location: record.map(|r| r.location_name.clone()),
            note: record.and_then(|r| r.note.clone()),
        });
    }

    items.reverse();

    AttendanceReport {
        total_amavasya: events.len() as i64,
        present,
        absent,
        continuous_present_count: streak,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event(month: i32, year: i32) -> Amavasya {
        Amavasya {
            id: Uuid::new_v4(),
            month,
            year,
            start_date: NaiveDate::from_ymd_opt(year, month as u32, 15)
                .unwrap()
                .and_hms_opt(6, 0, 0)
                .unwrap(),
            end_date: None,
            start_time: None,
            end_time: None,
            is_active: true,
            created_at: NaiveDate::from_ymd_opt(year, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    fn record(amavasya_id: Uuid) -> PresenceRecord {
        PresenceRecord {
            amavasya_id,
            location_name: "Akshar Hall".to_string(),
            note: None,
        }
    }

    #[test]
    fn test_empty_event_list() {
        let report = compute_attendance(&[], &[]);
        assert_eq!(report.total_amavasya, 0);
        assert_eq!(report.present, 0);
        assert_eq!(report.absent, 0);
        assert_eq!(report.continuous_present_count, 0);
        assert!(report.items.is_empty());
    }

    #[test]
    fn test_streak_broken_by_middle_absence() {
        // Newest-first: [Mar present, Feb absent, Jan present]
        let e3 = event(3, 2025);
        let e2 = event(2, 2025);
        let e1 = event(1, 2025);
        let events = vec![e3.clone(), e2.clone(), e1.clone()];
        let records = vec![record(e3.id), record(e1.id)];

        let report = compute_attendance(&events, &records);

        assert_eq!(report.total_amavasya, 3);
        assert_eq!(report.present, 2);
        assert_eq!(report.absent, 1);
        // Only March counts; February breaks the streak and January cannot
        // resurrect it.
        assert_eq!(report.continuous_present_count, 1);

        // Items come back oldest-first.
        assert_eq!(report.items[0].amavasya_id, e1.id);
        assert_eq!(report.items[0].status, AttendanceStatus::Present);
        assert_eq!(report.items[1].amavasya_id, e2.id);
        assert_eq!(report.items[1].status, AttendanceStatus::Absent);
        assert_eq!(report.items[2].amavasya_id, e3.id);
        assert_eq!(report.items[2].status, AttendanceStatus::Present);
    }

    #[test]
    fn test_all_present() {
        let events: Vec<Amavasya> = (1..=4).rev().map(|m| event(m, 2025)).collect();
        let records: Vec<PresenceRecord> = events.iter().map(|e| record(e.id)).collect();

        let report = compute_attendance(&events, &records);
        assert_eq!(report.continuous_present_count, 4);
        assert_eq!(report.present, 4);
        assert_eq!(report.absent, 0);
    }

    #[test]
    fn test_most_recent_absent_zeroes_streak() {
        let events: Vec<Amavasya> = (1..=4).rev().map(|m| event(m, 2025)).collect();
        // Records for all but the most recent event.
        let records: Vec<PresenceRecord> = events[1..].iter().map(|e| record(e.id)).collect();

        let report = compute_attendance(&events, &records);
        assert_eq!(report.continuous_present_count, 0);
        assert_eq!(report.present, 3);
        assert_eq!(report.absent, 1);
    }

    #[test]
    fn test_present_plus_absent_equals_total() {
        let events: Vec<Amavasya> = (1..=12).rev().map(|m| event(m, 2024)).collect();
        let records: Vec<PresenceRecord> = events
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 3 == 0)
            .map(|(_, e)| record(e.id))
            .collect();

        let report = compute_attendance(&events, &records);
        assert_eq!(report.present + report.absent, report.total_amavasya);
    }

    #[test]
    fn test_idempotent() {
        let events: Vec<Amavasya> = (1..=6).rev().map(|m| event(m, 2025)).collect();
        let records = vec![record(events[0].id), record(events[2].id)];

        let first = compute_attendance(&events, &records);
        let second = compute_attendance(&events, &records);

        assert_eq!(first.present, second.present);
        assert_eq!(first.absent, second.absent);
        assert_eq!(
            first.continuous_present_count,
            second.continuous_present_count
        );
        assert_eq!(first.items.len(), second.items.len());
    }

    #[test]
    fn test_duplicate_records_collapse_to_one_presence() {
        let e = event(5, 2025);
        let events = vec![e.clone()];

        let mut older = record(e.id);
        older.location_name = "Old Hall".to_string();
        let mut newer = record(e.id);
        newer.location_name = "New Hall".to_string();

        let report = compute_attendance(&events, &[older, newer]);

        assert_eq!(report.present, 1);
        assert_eq!(report.absent, 0);
        // Last record in iteration order wins.
        assert_eq!(report.items[0].location.as_deref(), Some("New Hall"));
    }

    #[test]
    fn test_record_carries_location_and_note() {
        let e = event(7, 2025);
        let mut r = record(e.id);
        r.note = Some("arrived late".to_string());

        let report = compute_attendance(&[e], &[r]);
        assert_eq!(report.items[0].location.as_deref(), Some("Akshar Hall"));
        assert_eq!(report.items[0].note.as_deref(), Some("arrived late"));
    }

    #[test]
    fn test_status_serializes_as_words() {
        let json = serde_json::to_value(AttendanceStatus::Present).unwrap();
        assert_eq!(json, serde_json::json!("Present"));
        let json = serde_json::to_value(AttendanceStatus::Absent).unwrap();
        assert_eq!(json, serde_json::json!("Absent"));
    }
}
