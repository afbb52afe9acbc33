//! Tests for the trigger calendar.

use super::*;
use chrono::{Duration, TimeZone};

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 3, h, m, s).unwrap()
}

fn every_minute() -> Schedule {
    parse_cron("0 * * * * *").unwrap()
}

#[test]
fn test_parse_six_fields() {
    assert!(parse_cron("0 */5 * * * *").is_ok());
    assert!(parse_cron("0 0 9 * * MON-FRI").is_ok());
}

#[test]
fn test_parse_seven_fields_with_question_mark_and_year() {
    assert!(parse_cron("0 0 0 1 JAN ? 2099-2099").is_ok());
}

#[test]
fn test_parse_rejects_five_fields() {
    let err = parse_cron("* * * * *").unwrap_err();
    assert!(matches!(err, SchedulerError::IncorrectJobRequest(_)));
}

#[test]
fn test_parse_rejects_garbage() {
    let err = parse_cron("every day at noon please now").unwrap_err();
    assert!(matches!(err, SchedulerError::IncorrectJobRequest(_)));
}

#[test]
fn test_parse_rejects_schedule_that_never_fires() {
    let err = parse_cron("0 0 0 1 JAN ? 2001").unwrap_err();
    assert!(err.to_string().contains("never fire"));
}

#[test]
fn test_next_fire_after_is_strictly_later() {
    let schedule = every_minute();
    assert_eq!(next_fire_after(&schedule, at(10, 0, 0)), Some(at(10, 1, 0)));
    assert_eq!(next_fire_after(&schedule, at(10, 0, 30)), Some(at(10, 1, 0)));
}

#[test]
fn test_schedule_and_lookup() {
    let calendar = TriggerCalendar::new();
    assert!(calendar.is_empty());

    let next = calendar.schedule("a", every_minute(), 5, 1, at(10, 0, 10));
    assert_eq!(next, Some(at(10, 1, 0)));
    assert_eq!(calendar.next_fire_time("a"), Some(at(10, 1, 0)));
    assert_eq!(calendar.peek_next(), Some(at(10, 1, 0)));
    assert_eq!(calendar.len(), 1);

    let trigger = calendar.trigger("a").unwrap();
    assert_eq!(trigger.priority, 5);
}

#[test]
fn test_peek_next_is_earliest() {
    let calendar = TriggerCalendar::new();
    calendar.schedule("hourly", parse_cron("0 0 * * * *").unwrap(), 5, 1, at(10, 0, 10));
    calendar.schedule("minutely", every_minute(), 5, 2, at(10, 0, 10));

    assert_eq!(calendar.peek_next(), Some(at(10, 1, 0)));
}

#[test]
fn test_nothing_due_before_fire_time() {
    let calendar = TriggerCalendar::new();
    calendar.schedule("a", every_minute(), 5, 1, at(10, 0, 0));

    assert!(calendar.take_due(at(10, 0, 59)).is_empty());
    assert_eq!(calendar.next_fire_time("a"), Some(at(10, 1, 0)));
}

#[test]
fn test_simultaneous_fires_ordered_by_priority_then_registration() {
    let calendar = TriggerCalendar::new();
    let now = at(10, 0, 0);
    calendar.schedule("a", every_minute(), 5, 1, now);
    calendar.schedule("b", every_minute(), 10, 2, now);
    calendar.schedule("c", every_minute(), 5, 3, now);

    let due = calendar.take_due(at(10, 1, 0));
    let names: Vec<_> = due.iter().map(|d| d.job_name.as_str()).collect();
    assert_eq!(names, vec!["b", "a", "c"]);
    assert!(due.iter().all(|d| d.fire_time == at(10, 1, 0)));
}

#[test]
fn test_take_due_reschedules_after_now() {
    let calendar = TriggerCalendar::new();
    calendar.schedule("a", every_minute(), 5, 1, at(10, 0, 0));

    let due = calendar.take_due(at(10, 1, 0));
    assert_eq!(due.len(), 1);
    assert_eq!(calendar.next_fire_time("a"), Some(at(10, 2, 0)));
    assert!(calendar.take_due(at(10, 1, 0)).is_empty());
}

#[test]
fn test_missed_fires_collapse_into_one() {
    let calendar = TriggerCalendar::new();
    calendar.schedule("a", every_minute(), 5, 1, at(10, 0, 0));

    let late = at(10, 5, 30);
    let due = calendar.take_due(late);
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].fire_time, at(10, 1, 0));
    assert_eq!(calendar.next_fire_time("a"), Some(at(10, 6, 0)));
}

#[test]
fn test_unschedule_removes_trigger() {
    let calendar = TriggerCalendar::new();
    calendar.schedule("a", every_minute(), 5, 1, at(10, 0, 0));

    assert!(calendar.unschedule("a"));
    assert!(!calendar.unschedule("a"));
    assert!(calendar.take_due(at(11, 0, 0)).is_empty());
    assert!(calendar.peek_next().is_none());
}

#[test]
fn test_schedule_replaces_existing_trigger() {
    let calendar = TriggerCalendar::new();
    let now = at(10, 0, 0);
    calendar.schedule("a", every_minute(), 5, 1, now);
    calendar.schedule("a", parse_cron("0 0 * * * *").unwrap(), 8, 1, now);

    assert_eq!(calendar.len(), 1);
    assert_eq!(calendar.next_fire_time("a"), Some(at(11, 0, 0)));
    assert!(calendar.take_due(now + Duration::minutes(1)).is_empty());
    assert_eq!(calendar.trigger("a").unwrap().priority, 8);
}

#[tokio::test]
async fn test_changed_notifies_on_schedule() {
    let calendar = TriggerCalendar::new();
    calendar.schedule("a", every_minute(), 5, 1, Utc::now());

    // The stored permit resolves the first wait immediately.
    tokio::time::timeout(std::time::Duration::from_secs(1), calendar.changed())
        .await
        .unwrap();
}
