//! services/api/src/study/flashcards.rs

use chrono::{DateTime, Utc};
use prep_core::{
    domain::{Flashcard, FlashcardDraft, UserId},
    ports::{ContentGenerationService, PortError, PortResult},
    store::StudyRepository,
};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use super::WithId;

/// Cards sharing a topic, in the order the topic was first created.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TopicCards {
    pub topic: String,
    #[schema(value_type = Vec<Object>)]
    pub cards: Vec<WithId<Flashcard>>,
}

pub fn group_by_topic(cards: Vec<Flashcard>) -> Vec<TopicCards> {
    let mut groups: Vec<TopicCards> = Vec::new();
    for card in cards {
        match groups.iter_mut().find(|g| g.topic == card.topic) {
            Some(group) => group.cards.push(card.into()),
            None => groups.push(TopicCards {
                topic: card.topic.clone(),
                cards: vec![card.into()],
            }),
        }
    }
    groups
}

pub async fn list_grouped(repo: &StudyRepository, user: &UserId) -> PortResult<Vec<TopicCards>> {
    Ok(group_by_topic(repo.list_flashcards(user).await?))
}

pub async fn add(
    repo: &StudyRepository,
    user: &UserId,
    topic: &str,
    draft: FlashcardDraft,
    now: DateTime<Utc>,
) -> PortResult<Flashcard> {
    let topic = topic.trim();
    if topic.is_empty() || draft.question.trim().is_empty() || draft.answer.trim().is_empty() {
        return Err(PortError::InvalidInput(
            "A flash card needs a topic, a question and an answer.".to_string(),
        ));
    }
    repo.add_flashcard(user, topic, draft, now).await
}

/// Generates `count` cards for `topic` and stores every one of them.
pub async fn generate_and_save(
    generator: &dyn ContentGenerationService,
    repo: &StudyRepository,
    user: &UserId,
    topic: &str,
    count: usize,
    now: DateTime<Utc>,
) -> PortResult<Vec<Flashcard>> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(PortError::InvalidInput("Topic is required.".to_string()));
    }
    let drafts = generator.generate_flashcards(topic, count).await?;
    let mut saved = Vec::with_capacity(drafts.len());
    for draft in drafts {
        saved.push(repo.add_flashcard(user, topic, draft, now).await?);
    }
    info!("Saved {} generated flash cards on '{}' for {}", saved.len(), topic, user);
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDocumentStore;
    use async_trait::async_trait;
    use prep_core::domain::Question;
    use std::sync::Arc;

    struct CannedCards;

    #[async_trait]
    impl ContentGenerationService for CannedCards {
        async fn generate_questions(&self, _: &[String], _: usize) -> PortResult<Vec<Question>> {
            Ok(Vec::new())
        }

        async fn generate_flashcards(&self, topic: &str, count: usize) -> PortResult<Vec<FlashcardDraft>> {
            Ok((0..count)
                .map(|i| FlashcardDraft {
                    question: format!("{} #{}", topic, i),
                    answer: "Yes".to_string(),
                })
                .collect())
        }

        async fn generate_topics(&self, _: &str) -> PortResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn card(topic: &str, question: &str) -> Flashcard {
        Flashcard {
            id: question.to_string(),
            question: question.to_string(),
            answer: "a".to_string(),
            topic: topic.to_string(),
            created_at: 0,
        }
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let groups = group_by_topic(vec![
            card("Polity", "q1"),
            card("Economy", "q2"),
            card("Polity", "q3"),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].topic, "Polity");
        assert_eq!(groups[0].cards.len(), 2);
        assert_eq!(groups[0].cards[1].id, "q3");
        assert_eq!(groups[1].cards[0].value.question, "q2");
    }

    #[tokio::test]
    async fn generated_cards_are_stored() {
        let repo = StudyRepository::new(Arc::new(InMemoryDocumentStore::new()));
        let user = UserId::new("u1");
        let saved = generate_and_save(&CannedCards, &repo, &user, " Rivers ", 3, Utc::now())
            .await
            .unwrap();
        assert_eq!(saved.len(), 3);
        assert!(saved.iter().all(|c| c.topic == "Rivers" && !c.id.is_empty()));

        let groups = list_grouped(&repo, &user).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].cards.len(), 3);
    }

    #[tokio::test]
    async fn incomplete_cards_are_rejected() {
        let repo = StudyRepository::new(Arc::new(InMemoryDocumentStore::new()));
        let draft = FlashcardDraft {
            question: "What is Article 21?".to_string(),
            answer: " ".to_string(),
        };
        assert!(matches!(
            add(&repo, &UserId::new("u1"), "Polity", draft, Utc::now()).await,
            Err(PortError::InvalidInput(_))
        ));
    }
}
