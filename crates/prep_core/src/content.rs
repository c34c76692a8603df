//! crates/prep_core/src/content.rs
//!
//! Turns raw model output into typed values. Generated text is treated as
//! untrusted: it is stripped of markdown fences, parsed as JSON and checked
//! item by item, so nothing loosely typed reaches the test engine.

use serde::Deserialize;

use crate::domain::{FlashcardDraft, Question};

/// Statement lists shorter or longer than this are rejected.
const STATEMENT_RANGE: std::ops::RangeInclusive<usize> = 2..=4;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("Generated content is not valid JSON: {0}")]
    Json(String),
    #[error("Generated content contained no items")]
    Empty,
    #[error("Item {index} is invalid: {reason}")]
    InvalidItem { index: usize, reason: String },
}

/// Removes markdown code fences the model tends to wrap JSON in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

//=========================================================================================
// Questions
//=========================================================================================

#[derive(Deserialize)]
struct RawQuestion {
    question: Option<String>,
    #[serde(default)]
    statements: Option<Vec<String>>,
    options: Option<Vec<String>>,
    answer: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    topic: Option<String>,
}

/// Parses a JSON array of generated questions.
///
/// The `answer` may be the full option text or just its label (`"b"`,
/// `"(b)"`); either way it is normalised to the option text.
pub fn parse_questions(text: &str) -> Result<Vec<Question>, ContentError> {
    let raw: Vec<RawQuestion> = serde_json::from_str(&strip_code_fences(text))
        .map_err(|e| ContentError::Json(e.to_string()))?;
    if raw.is_empty() {
        return Err(ContentError::Empty);
    }
    raw.into_iter()
        .enumerate()
        .map(|(index, item)| {
            validate_question(item).map_err(|reason| ContentError::InvalidItem { index, reason })
        })
        .collect()
}

fn validate_question(raw: RawQuestion) -> Result<Question, String> {
    let question = non_blank(raw.question).ok_or("missing question text")?;

    let options: Vec<String> = raw
        .options
        .unwrap_or_default()
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if options.len() < 2 {
        return Err(format!("expected at least 2 options, got {}", options.len()));
    }

    let statements: Vec<String> = raw
        .statements
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if !statements.is_empty() && !STATEMENT_RANGE.contains(&statements.len()) {
        return Err(format!("expected 2 to 4 statements, got {}", statements.len()));
    }

    let answer = non_blank(raw.answer).ok_or("missing answer")?;
    let answer = resolve_answer(&options, &answer)
        .ok_or_else(|| format!("answer '{}' does not match any option", answer))?;

    Ok(Question {
        question,
        statements,
        options,
        answer,
        explanation: raw.explanation.unwrap_or_default().trim().to_string(),
        topic: non_blank(raw.topic),
    })
}

/// Matches an answer to an option by full text, then by the letter label the
/// options carry. Only unlabelled options are matched by position.
fn resolve_answer(options: &[String], answer: &str) -> Option<String> {
    if let Some(exact) = options.iter().find(|o| o.as_str() == answer) {
        return Some(exact.clone());
    }
    if let Some(loose) = options.iter().find(|o| o.eq_ignore_ascii_case(answer)) {
        return Some(loose.clone());
    }
    let label = option_label(answer)?;
    if options.iter().any(|o| option_label(o).is_some()) {
        return options
            .iter()
            .find(|o| option_label(o) == Some(label))
            .cloned();
    }
    if answer.len() > 3 {
        return None;
    }
    options
        .iter()
        .enumerate()
        .find(|(i, _)| index_label(*i) == label)
        .map(|(_, o)| o.clone())
}

/// Extracts a leading `a`/`(a)`/`a)`/`a.` label, lowercased.
fn option_label(text: &str) -> Option<char> {
    let trimmed = text.trim().trim_start_matches('(');
    let mut chars = trimmed.chars();
    let first = chars.next()?.to_ascii_lowercase();
    if !('a'..='h').contains(&first) {
        return None;
    }
    match chars.next() {
        None | Some(')') | Some('.') => Some(first),
        _ => None,
    }
}

fn index_label(index: usize) -> char {
    (b'a' + (index as u8 % 26)) as char
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

//=========================================================================================
// Flashcards and topic lists
//=========================================================================================

#[derive(Deserialize)]
struct RawFlashcard {
    question: Option<String>,
    answer: Option<String>,
}

/// Parses a JSON array of `{question, answer}` cards.
pub fn parse_flashcards(text: &str) -> Result<Vec<FlashcardDraft>, ContentError> {
    let raw: Vec<RawFlashcard> = serde_json::from_str(&strip_code_fences(text))
        .map_err(|e| ContentError::Json(e.to_string()))?;
    if raw.is_empty() {
        return Err(ContentError::Empty);
    }
    raw.into_iter()
        .enumerate()
        .map(|(index, card)| match (non_blank(card.question), non_blank(card.answer)) {
            (Some(question), Some(answer)) => Ok(FlashcardDraft { question, answer }),
            _ => Err(ContentError::InvalidItem {
                index,
                reason: "a card needs both a question and an answer".to_string(),
            }),
        })
        .collect()
}

/// Parses a JSON array of topic names, dropping blanks and duplicates.
pub fn parse_topics(text: &str) -> Result<Vec<String>, ContentError> {
    let raw: Vec<String> = serde_json::from_str(&strip_code_fences(text))
        .map_err(|e| ContentError::Json(e.to_string()))?;
    let mut topics: Vec<String> = Vec::with_capacity(raw.len());
    for topic in raw {
        let topic = topic.trim();
        if !topic.is_empty() && !topics.iter().any(|t| t == topic) {
            topics.push(topic.to_string());
        }
    }
    if topics.is_empty() {
        return Err(ContentError::Empty);
    }
    Ok(topics)
}
