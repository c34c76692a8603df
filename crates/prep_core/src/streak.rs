//! crates/prep_core/src/streak.rs
//!
//! Study streak: consecutive calendar days, ending today, on which at least
//! one planner topic was completed.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::domain::Subject;

/// Longest streak reported. The walk stops once it has gone past a year.
pub const MAX_STREAK_DAYS: u32 = 366;

/// Counts back from `today` while each day has a completed topic. A day
/// without study today means a streak of zero.
pub fn calculate_streak(subjects: &[Subject], today: NaiveDate) -> u32 {
    let studied: HashSet<NaiveDate> = subjects
        .iter()
        .flat_map(|s| s.topics.iter())
        .filter(|t| t.completed)
        .filter_map(|t| t.completed_date)
        .collect();

    let mut streak = 0;
    let mut day = today;
    while streak < MAX_STREAK_DAYS && studied.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StudyTopic;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    fn done_on(name: &str, date: NaiveDate) -> StudyTopic {
        StudyTopic {
            name: name.to_string(),
            completed: true,
            completed_date: Some(date),
            completed_at: None,
        }
    }

    fn subject(topics: Vec<StudyTopic>) -> Subject {
        Subject {
            id: "s1".to_string(),
            name: "Polity".to_string(),
            start: "09:00".to_string(),
            end: "11:00".to_string(),
            start_date: None,
            end_date: None,
            topics,
        }
    }

    #[test]
    fn counts_consecutive_days_back_from_today() {
        let subjects = vec![
            subject(vec![done_on("Preamble", day(10)), done_on("Schedules", day(9))]),
            subject(vec![done_on("Budget", day(8)), done_on("GST", day(6))]),
        ];
        assert_eq!(calculate_streak(&subjects, day(10)), 3);
    }

    #[test]
    fn nothing_today_means_no_streak() {
        let subjects = vec![subject(vec![done_on("Preamble", day(9))])];
        assert_eq!(calculate_streak(&subjects, day(10)), 0);
        assert_eq!(calculate_streak(&[], day(10)), 0);
    }

    #[test]
    fn unticked_topics_do_not_count() {
        let mut topic = done_on("Preamble", day(10));
        topic.completed = false;
        assert_eq!(calculate_streak(&[subject(vec![topic])], day(10)), 0);
    }

    #[test]
    fn streak_is_capped() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let topics = (0..400)
            .map(|i| done_on("daily", start + chrono::Duration::days(i)))
            .collect();
        let today = start + chrono::Duration::days(399);
        assert_eq!(calculate_streak(&[subject(topics)], today), 366);
    }
}
