//! crates/prep_core/src/analytics.rs
//!
//! The scorer: reduces a finished question set and its answers to marks,
//! accuracy, a per-topic breakdown and rule-based study suggestions. Also
//! aggregates a user's test history for the dashboard.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::domain::{OverallStats, Question, TestHistoryEntry, TrendPoint};

/// Marks awarded for a correct answer.
pub const MARKS_PER_CORRECT: f64 = 2.0;
/// Marks deducted for a wrong answer.
pub const PENALTY_PER_WRONG: f64 = 0.66;
/// Topic accuracy (percent) at or above which a topic counts as a strength.
pub const STRENGTH_THRESHOLD: f64 = 70.0;
/// Topic accuracy (percent) below which a topic counts as a weakness.
pub const WEAKNESS_THRESHOLD: f64 = 50.0;
/// More unattempted questions than this adds the time-management advice.
pub const UNATTEMPTED_LIMIT: u32 = 2;
/// Number of recent tests shown in the dashboard trend.
pub const TREND_LENGTH: usize = 10;

const FOUNDATION_ADVICE: [&str; 2] = [
    "Focus on building fundamental concepts before attempting tests",
    "Spend more time on theory and basic understanding",
];
const MISTAKE_ADVICE: [&str; 2] = [
    "Good foundation! Work on eliminating silly mistakes",
    "Practice more questions from weak topics",
];
const PACING_ADVICE: [&str; 2] = [
    "Excellent progress! Focus on time management",
    "Work on advanced level questions",
];
const CONSISTENCY_ADVICE: [&str; 2] = [
    "Outstanding performance! Maintain consistency",
    "Focus on current affairs and recent developments",
];
const UNATTEMPTED_ADVICE: [&str; 2] = [
    "Improve time management - too many questions left unattempted",
    "Practice speed reading and quick elimination techniques",
];

//=========================================================================================
// Result types
//=========================================================================================

/// Correct/wrong/total counters for one topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    pub correct: u32,
    pub wrong: u32,
    pub total: u32,
}

impl TopicStats {
    /// Accuracy in percent, or `None` for a topic with no questions.
    pub fn accuracy(&self) -> Option<f64> {
        (self.total > 0).then(|| f64::from(self.correct) / f64::from(self.total) * 100.0)
    }

    fn absorb(&mut self, other: TopicStats) {
        self.correct += other.correct;
        self.wrong += other.wrong;
        self.total += other.total;
    }
}

/// Per-topic counters kept in first-encounter order.
///
/// Serialised as a JSON object (`{"Polity": {...}}`) so stored records keep
/// the shape the web client reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicBreakdown(Vec<(String, TopicStats)>);

impl TopicBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, topic: &str) -> Option<&TopicStats> {
        self.0.iter().find(|(t, _)| t == topic).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TopicStats)> {
        self.0.iter().map(|(t, s)| (t.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn entry(&mut self, topic: &str) -> &mut TopicStats {
        let pos = match self.0.iter().position(|(t, _)| t == topic) {
            Some(pos) => pos,
            None => {
                self.0.push((topic.to_string(), TopicStats::default()));
                self.0.len() - 1
            }
        };
        &mut self.0[pos].1
    }

    fn merge(&mut self, topic: &str, stats: TopicStats) {
        self.entry(topic).absorb(stats);
    }
}

impl Serialize for TopicBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (topic, stats) in &self.0 {
            map.serialize_entry(topic, stats)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TopicBreakdown {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BreakdownVisitor;

        impl<'de> Visitor<'de> for BreakdownVisitor {
            type Value = TopicBreakdown;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of topic names to counters")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((topic, stats)) = access.next_entry::<String, TopicStats>()? {
                    entries.push((topic, stats));
                }
                Ok(TopicBreakdown(entries))
            }
        }

        deserializer.deserialize_map(BreakdownVisitor)
    }
}

/// The scored outcome of one submitted test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResult {
    pub correct: u32,
    pub wrong: u32,
    pub not_attempted: u32,
    pub total_marks: f64,
    pub accuracy: f64,
    #[serde(default)]
    pub topic_wise_analysis: TopicBreakdown,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

//=========================================================================================
// Scoring
//=========================================================================================

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scores `answers` against `questions` in a single pass.
///
/// `answers[i] == None`, or a missing entry, counts as not attempted.
pub fn compute_analytics(questions: &[Question], answers: &[Option<String>]) -> AnalyticsResult {
    let mut correct = 0u32;
    let mut wrong = 0u32;
    let mut not_attempted = 0u32;
    let mut topics = TopicBreakdown::new();

    for (i, question) in questions.iter().enumerate() {
        let stats = topics.entry(question.topic_label());
        stats.total += 1;
        match answers.get(i).and_then(Option::as_deref) {
            None => not_attempted += 1,
            Some(given) if given == question.answer => {
                correct += 1;
                stats.correct += 1;
            }
            Some(_) => {
                wrong += 1;
                stats.wrong += 1;
            }
        }
    }

    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    for (topic, stats) in topics.iter() {
        match stats.accuracy() {
            Some(acc) if acc >= STRENGTH_THRESHOLD => strengths.push(topic.to_string()),
            Some(acc) if acc < WEAKNESS_THRESHOLD => weaknesses.push(topic.to_string()),
            _ => {}
        }
    }

    let total_marks = f64::from(correct) * MARKS_PER_CORRECT - f64::from(wrong) * PENALTY_PER_WRONG;
    let accuracy = if questions.is_empty() {
        0.0
    } else {
        f64::from(correct) / questions.len() as f64 * 100.0
    };
    let suggestions = suggestions_for(accuracy, &topics, not_attempted);

    AnalyticsResult {
        correct,
        wrong,
        not_attempted,
        total_marks: round2(total_marks),
        accuracy: round2(accuracy),
        topic_wise_analysis: topics,
        strengths,
        weaknesses,
        suggestions,
    }
}

/// Builds the ordered advice list for an (unrounded) overall accuracy.
fn suggestions_for(accuracy: f64, topics: &TopicBreakdown, not_attempted: u32) -> Vec<String> {
    let band = if accuracy < 40.0 {
        FOUNDATION_ADVICE
    } else if accuracy < 60.0 {
        MISTAKE_ADVICE
    } else if accuracy < 80.0 {
        PACING_ADVICE
    } else {
        CONSISTENCY_ADVICE
    };

    let mut suggestions: Vec<String> = band.iter().map(|s| s.to_string()).collect();

    if not_attempted > UNATTEMPTED_LIMIT {
        suggestions.extend(UNATTEMPTED_ADVICE.iter().map(|s| s.to_string()));
    }

    for (topic, stats) in topics.iter() {
        if stats.accuracy().is_some_and(|acc| acc < WEAKNESS_THRESHOLD) {
            suggestions.push(format!("Strengthen your {} concepts with focused study", topic));
        }
    }

    suggestions
}

//=========================================================================================
// History aggregation
//=========================================================================================

/// Aggregates a user's test history. Returns `None` when there is no history.
///
/// The trend covers the most recent [`TREND_LENGTH`] tests, oldest first.
pub fn aggregate_history(history: &[TestHistoryEntry]) -> Option<OverallStats> {
    if history.is_empty() {
        return None;
    }

    let mut newest_first: Vec<&TestHistoryEntry> = history.iter().collect();
    newest_first.sort_by(|a, b| b.date.cmp(&a.date));

    let total_tests = history.len();
    let total_questions = history.iter().map(|t| t.total_questions).sum();
    let total_correct = history
        .iter()
        .filter_map(|t| t.analytics.as_ref())
        .map(|a| a.correct)
        .sum();
    let total_wrong = history
        .iter()
        .filter_map(|t| t.analytics.as_ref())
        .map(|a| a.wrong)
        .sum();
    let average_score = history.iter().map(|t| t.score).sum::<f64>() / total_tests as f64;
    let average_accuracy = history
        .iter()
        .map(|t| t.analytics.as_ref().map_or(0.0, |a| a.accuracy))
        .sum::<f64>()
        / total_tests as f64;

    let mut topic_stats = TopicBreakdown::new();
    for entry in &newest_first {
        if let Some(analytics) = &entry.analytics {
            for (topic, stats) in analytics.topic_wise_analysis.iter() {
                topic_stats.merge(topic, *stats);
            }
        }
    }

    let trend = newest_first
        .iter()
        .take(TREND_LENGTH)
        .rev()
        .map(|t| TrendPoint {
            date: t.date,
            score: t.score,
            accuracy: t.analytics.as_ref().map_or(0.0, |a| a.accuracy),
        })
        .collect();

    Some(OverallStats {
        total_tests,
        total_questions,
        total_correct,
        total_wrong,
        average_score: round2(average_score),
        average_accuracy: round2(average_accuracy),
        topic_stats,
        trend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn question(topic: Option<&str>) -> Question {
        Question {
            question: "Consider the following statements:".to_string(),
            statements: vec!["one".to_string(), "two".to_string()],
            options: vec!["(a) 1 only".into(), "(b) 2 only".into(), "(c) Both".into()],
            answer: "(a) 1 only".to_string(),
            explanation: String::new(),
            topic: topic.map(str::to_string),
        }
    }

    fn right() -> Option<String> {
        Some("(a) 1 only".to_string())
    }

    fn wrong_answer() -> Option<String> {
        Some("(c) Both".to_string())
    }

    #[test]
    fn all_correct_scores_full_marks() {
        let questions: Vec<_> = (0..5).map(|_| question(None)).collect();
        let answers = vec![right(); 5];

        let result = compute_analytics(&questions, &answers);

        assert_eq!(result.correct, 5);
        assert_eq!(result.wrong, 0);
        assert_eq!(result.not_attempted, 0);
        assert_eq!(result.total_marks, 10.0);
        assert_eq!(result.accuracy, 100.0);
        assert_eq!(result.suggestions, CONSISTENCY_ADVICE.map(String::from).to_vec());
        assert_eq!(result.strengths, vec!["General".to_string()]);
    }

    #[test]
    fn weak_polity_attempt_collects_every_rule() {
        let questions: Vec<_> = (0..10).map(|_| question(Some("Polity"))).collect();
        let mut answers = vec![right(), right(), right(), wrong_answer(), wrong_answer()];
        answers.extend(vec![None; 5]);

        let result = compute_analytics(&questions, &answers);

        assert_eq!(
            result.topic_wise_analysis.get("Polity"),
            Some(&TopicStats { correct: 3, wrong: 2, total: 10 })
        );
        assert_eq!(result.accuracy, 30.0);
        assert_eq!(result.total_marks, 4.68);
        assert_eq!(result.weaknesses, vec!["Polity".to_string()]);
        assert!(result.strengths.is_empty());
        assert_eq!(
            result.suggestions,
            vec![
                FOUNDATION_ADVICE[0].to_string(),
                FOUNDATION_ADVICE[1].to_string(),
                UNATTEMPTED_ADVICE[0].to_string(),
                UNATTEMPTED_ADVICE[1].to_string(),
                "Strengthen your Polity concepts with focused study".to_string(),
            ]
        );
    }

    #[test]
    fn middle_band_topics_are_neither_strength_nor_weakness() {
        // 3/5 = 60% for Economy, 1/1 for History.
        let mut questions: Vec<_> = (0..5).map(|_| question(Some("Economy"))).collect();
        questions.push(question(Some("History")));
        let answers = vec![right(), right(), right(), wrong_answer(), wrong_answer(), right()];

        let result = compute_analytics(&questions, &answers);

        assert_eq!(result.strengths, vec!["History".to_string()]);
        assert!(result.weaknesses.is_empty());
        assert_eq!(&result.suggestions[..2], &PACING_ADVICE.map(String::from));
        assert_eq!(result.suggestions.len(), 2);
    }

    #[test]
    fn topics_keep_encounter_order() {
        let questions = vec![
            question(Some("Polity")),
            question(Some("Economy")),
            question(None),
            question(Some("Polity")),
        ];
        let result = compute_analytics(&questions, &[None, None, None, None]);

        let order: Vec<&str> = result.topic_wise_analysis.iter().map(|(t, _)| t).collect();
        assert_eq!(order, vec!["Polity", "Economy", "General"]);
        assert_eq!(result.weaknesses, vec!["Polity", "Economy", "General"]);
    }

    #[test]
    fn counts_always_partition_the_question_set() {
        let choices = [right(), wrong_answer(), None];
        for n in 1..=6usize {
            for seed in 0..27usize {
                let questions: Vec<_> = (0..n).map(|_| question(None)).collect();
                let answers: Vec<_> = (0..n).map(|i| choices[(seed + i * 7) % 3].clone()).collect();
                let r = compute_analytics(&questions, &answers);
                assert_eq!((r.correct + r.wrong + r.not_attempted) as usize, n);
                assert_eq!(r.accuracy == 0.0, r.correct == 0);
                assert_eq!(r.accuracy == 100.0, r.wrong == 0 && r.not_attempted == 0);
            }
        }
    }

    #[test]
    fn marks_move_with_correct_and_wrong_counts() {
        let questions: Vec<_> = (0..4).map(|_| question(None)).collect();
        let base = compute_analytics(&questions, &[right(), None, None, None]);
        let more_correct = compute_analytics(&questions, &[right(), right(), None, None]);
        let more_wrong = compute_analytics(&questions, &[right(), wrong_answer(), None, None]);

        assert!(more_correct.total_marks >= base.total_marks);
        assert!(more_wrong.total_marks <= base.total_marks);
        assert_eq!(more_wrong.total_marks, 1.34);
    }

    #[test]
    fn short_answer_list_counts_as_unattempted() {
        let questions: Vec<_> = (0..3).map(|_| question(None)).collect();
        let result = compute_analytics(&questions, &[right()]);
        assert_eq!(result.not_attempted, 2);
    }

    #[test]
    fn empty_question_set_has_zero_accuracy() {
        let result = compute_analytics(&[], &[]);
        assert_eq!(result.accuracy, 0.0);
        assert_eq!(result.total_marks, 0.0);
        assert_eq!(result.suggestions, FOUNDATION_ADVICE.map(String::from).to_vec());
    }

    #[test]
    fn breakdown_serialises_as_an_object() {
        let questions = vec![question(Some("Polity"))];
        let result = compute_analytics(&questions, &[right()]);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["topicWiseAnalysis"]["Polity"]["correct"], 1);
        assert_eq!(json["notAttempted"], 0);

        let back: AnalyticsResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    fn history_entry(day: u32, score: f64, topic: &str, correct: u32, total: u32) -> TestHistoryEntry {
        let mut topics = TopicBreakdown::new();
        topics.merge(topic, TopicStats { correct, wrong: total - correct, total });
        TestHistoryEntry {
            test_id: format!("test_{day}"),
            date: NaiveDate::from_ymd_opt(2025, 8, day).unwrap(),
            score,
            topics: vec![topic.to_string()],
            total_questions: total as usize,
            time_taken: 60,
            analytics: Some(AnalyticsResult {
                correct,
                wrong: total - correct,
                not_attempted: 0,
                total_marks: 0.0,
                accuracy: score,
                topic_wise_analysis: topics,
                strengths: vec![],
                weaknesses: vec![],
                suggestions: vec![],
            }),
        }
    }

    #[test]
    fn history_aggregates_totals_and_topics() {
        let history = vec![
            history_entry(1, 50.0, "Polity", 5, 10),
            history_entry(3, 80.0, "Polity", 4, 5),
            history_entry(2, 100.0, "Economy", 5, 5),
        ];

        let stats = aggregate_history(&history).unwrap();

        assert_eq!(stats.total_tests, 3);
        assert_eq!(stats.total_questions, 20);
        assert_eq!(stats.total_correct, 14);
        assert_eq!(stats.total_wrong, 6);
        assert_eq!(stats.average_score, 76.67);
        assert_eq!(
            stats.topic_stats.get("Polity"),
            Some(&TopicStats { correct: 9, wrong: 6, total: 15 })
        );
        let days: Vec<u32> = stats.trend.iter().map(|p| chrono::Datelike::day(&p.date)).collect();
        assert_eq!(days, vec![1, 2, 3]);
    }

    #[test]
    fn trend_is_capped_to_recent_tests() {
        let history: Vec<_> = (1..=12).map(|d| history_entry(d, 10.0, "Polity", 1, 2)).collect();
        let stats = aggregate_history(&history).unwrap();
        assert_eq!(stats.trend.len(), TREND_LENGTH);
        assert_eq!(chrono::Datelike::day(&stats.trend[0].date), 3);
        assert!(aggregate_history(&[]).is_none());
    }
}
