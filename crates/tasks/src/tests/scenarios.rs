//! End-to-end strategy runs over a small in-memory knowledge base.

use crate::history::ConversationHistoryManager;
use crate::strategies::{
    ChattingStrategy, KeywordRagStrategy, QuestionStrategy, Strategy, StrategyKind,
    StrategyResult, SummarizationStrategy, TaskRequest,
};
use crate::{Complexity, Generator, LanguageDetector, Role, TaskProcessor};
use sift_core::AppError;
use sift_knowledge::{CancelFlag, Chunk, Embedder, EmbeddingConfig, FlatIndex, Retriever};
use sift_llm::StaticClient;
use sift_prompt::PromptCatalog;
use std::sync::Arc;
use tempfile::TempDir;

const MAMMALS: [&str; 3] = ["Cats are mammals", "Dogs are mammals", "Stars are far"];

const BIOLOGY: [&str; 4] = [
    "Photosynthesis turns light into chemical energy in plants",
    "The mitochondria is the powerhouse of the cell",
    "Cells release energy through respiration in the mitochondrial matrix",
    "Stars are far",
];

async fn retriever(texts: &[&str]) -> Retriever {
    let embedder = Embedder::from_config(&EmbeddingConfig::default()).unwrap();
    let retriever = Retriever::new(embedder, Arc::new(FlatIndex::new(384, true)));

    let chunks = texts
        .iter()
        .enumerate()
        .map(|(i, t)| Chunk::new("biology", i as u32, *t))
        .collect();
    retriever
        .index_chunks(chunks, &CancelFlag::new())
        .await
        .unwrap();
    retriever
}

fn catalog() -> Arc<PromptCatalog> {
    Arc::new(PromptCatalog::builtin().unwrap())
}

fn generator(client: &Arc<StaticClient>) -> Generator {
    Generator::new(client.clone(), "static")
}

async fn chatting(
    temp: &TempDir,
    client: &Arc<StaticClient>,
) -> (ChattingStrategy, Arc<ConversationHistoryManager>) {
    let history = Arc::new(ConversationHistoryManager::new(temp.path(), 50));
    let strategy = ChattingStrategy::new(
        retriever(&MAMMALS).await,
        generator(client),
        Arc::clone(&history),
        LanguageDetector::default(),
        catalog(),
    )
    .with_top_k(2);
    (strategy, history)
}

#[tokio::test]
async fn test_chat_answers_and_remembers() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(StaticClient::scripted([
        "RESPONSE: Yes, cats are mammals.\nREASONING: Source 1 states it.\nSOURCES: 1",
        "RESPONSE: Dogs are mammals as well.\nSOURCES: 2",
    ]));
    let (strategy, history) = chatting(&temp, &client).await;

    let first = strategy.run("Are cats mammals?", "c1").await.unwrap();
    assert_eq!(first.answer, "Yes, cats are mammals.");
    assert_eq!(first.reasoning, "Source 1 states it.");
    assert_eq!(first.source_ids, vec![1]);
    assert_eq!(first.source_documents.len(), 2);
    assert_eq!(first.source_documents[0].text, "Cats are mammals");
    assert_eq!(first.detected_language, "English");

    let prompt = &client.prompts()[0];
    assert!(prompt.contains("[Source 1 | doc biology]\nCats are mammals"));
    assert!(!prompt.contains("Previous Conversation"));

    strategy.run("And dogs?", "c1").await.unwrap();
    let followup = &client.prompts()[1];
    assert!(followup.contains("Previous Conversation:"));
    assert!(followup.contains("Human: Are cats mammals?\nAssistant: Yes, cats are mammals."));

    let messages = history.messages("c1", 10).unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[3].role, Role::Assistant);
    assert_eq!(messages[3].content, "Dogs are mammals as well.");
}

#[tokio::test]
async fn test_chat_failure_still_records_turn() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(StaticClient::failing("model offline"));
    let (strategy, history) = chatting(&temp, &client).await;

    let err = strategy.run("Are cats mammals?", "c2").await.unwrap_err();
    assert!(matches!(err, AppError::Llm(_)));

    let messages = history.messages("c2", 10).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "Are cats mammals?");
    assert!(messages[1]
        .content
        .starts_with("I apologize, but I encountered an error:"));
}

#[tokio::test]
async fn test_chat_unstructured_reply() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(StaticClient::new("Cats are mammals, yes."));
    let (strategy, _) = chatting(&temp, &client).await;

    let result = strategy.run("Are cats mammals?", "c3").await.unwrap();
    assert_eq!(result.answer, "Cats are mammals, yes.");
    assert!(result.reasoning.is_empty());
    assert!(result.source_ids.is_empty());
}

#[tokio::test]
async fn test_chat_answers_in_question_language() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(StaticClient::new("RESPONSE: نعم، القطط ثدييات."));
    let (strategy, _) = chatting(&temp, &client).await;

    let result = strategy.run("هل القطط ثدييات؟", "c4").await.unwrap();
    assert_eq!(result.detected_language, "Arabic");
    assert!(client.prompts()[0].starts_with("IMPORTANT: You must respond entirely in Arabic."));
}

async fn keyword_strategy(client: &Arc<StaticClient>, texts: &[&str]) -> KeywordRagStrategy {
    KeywordRagStrategy::new(
        retriever(texts).await,
        generator(client),
        LanguageDetector::default(),
        catalog(),
    )
    .await
    .unwrap()
    .with_top_k(2)
}

#[tokio::test]
async fn test_keyword_seed_and_expansion() {
    let client = Arc::new(StaticClient::new("**Keyword Context:** the powerhouse"));
    let strategy = keyword_strategy(&client, &BIOLOGY).await;

    let result = strategy.run("mitochondria").await.unwrap();
    assert_eq!(result.seed.text, BIOLOGY[1]);
    assert!((result.match_score - 100.0).abs() < 1e-9);
    assert_eq!(result.expansion.len(), 2);
    assert!(result.expansion.iter().all(|c| c.text != BIOLOGY[1]));
    assert_eq!(result.summary, "**Keyword Context:** the powerhouse");

    let prompt = &client.prompts()[0];
    assert!(prompt.contains("The user searched for the keyword: \"mitochondria\""));
    assert!(prompt.contains(&format!("[KEYWORD MATCH - Page N/A]\n{}", BIOLOGY[1])));
    assert!(prompt.contains("[SIMILAR CHUNK #1 - Page N/A (Similarity: "));
}

#[tokio::test]
async fn test_keyword_mammals_never_seeds_on_stars() {
    let corpus = ["cats are mammals", "dogs are mammals", "stars are far away"];
    let client = Arc::new(StaticClient::new("summary"));
    let strategy = keyword_strategy(&client, &corpus).await;

    let result = strategy.run("mammals").await.unwrap();
    assert_ne!(result.seed.text, "stars are far away");
    assert_eq!(result.seed.text, "cats are mammals");
    assert!((result.match_score - 100.0).abs() < 1e-9);
    assert!(result.expansion.iter().all(|c| c.text != "cats are mammals"));
}

#[tokio::test]
async fn test_keyword_typo_still_matches() {
    let client = Arc::new(StaticClient::new("summary"));
    let strategy = keyword_strategy(&client, &BIOLOGY).await;

    let result = strategy.run("photosynthsis").await.unwrap();
    assert_eq!(result.seed.chunk_index, 0);
    assert!(result.match_score >= 70.0);
}

#[tokio::test]
async fn test_keyword_no_match_skips_generator() {
    let client = Arc::new(StaticClient::new("unused"));
    let strategy = keyword_strategy(&client, &BIOLOGY).await;
    assert!(matches!(
        strategy.run("quasar").await,
        Err(AppError::NoMatch(_))
    ));

    assert!(matches!(
        strategy.run(&"mitochondria ".repeat(10)).await,
        Err(AppError::Task(_))
    ));

    let mut empty = keyword_strategy(&client, &[]).await;
    assert!(matches!(
        empty.run("mitochondria").await,
        Err(AppError::NoMatch(_))
    ));
    assert!(client.prompts().is_empty());

    // Snapshot is explicit: indexing more does not change it until refreshed
    empty
        .retriever()
        .index_chunks(vec![Chunk::new("late", 0, BIOLOGY[1])], &CancelFlag::new())
        .await
        .unwrap();
    assert!(empty.snapshot().is_empty());
    assert_eq!(empty.refresh_snapshot().await.unwrap(), 1);
    assert_eq!(
        empty.run("mitochondria").await.unwrap().seed.source_id,
        "late"
    );
}

#[tokio::test]
async fn test_processor_dispatch() {
    let mut processor = TaskProcessor::new();
    let summarize = TaskRequest::Summarize {
        text: "Cats are mammals.".to_string(),
        length: "short".to_string(),
        verbose: false,
        overview_level: None,
    };
    assert!(matches!(
        processor.execute_task(summarize.clone()).await,
        Err(AppError::NoStrategy)
    ));

    let client = Arc::new(StaticClient::scripted([
        "Cats are mammals.",
        "Q1: What are cats?\nA1: Mammals.\nQ2: What are stars?",
    ]));
    processor.set_strategy(Strategy::Summarization(SummarizationStrategy::new(
        generator(&client),
        LanguageDetector::default(),
        catalog(),
    )));

    match processor.execute_task(summarize).await.unwrap() {
        StrategyResult::Summary(summary) => assert_eq!(summary.text, "Cats are mammals."),
        other => panic!("expected a summary, got {:?}", other),
    }

    let questions = TaskRequest::Questions {
        chunk: Chunk::new("doc", 0, "Cats are mammals. Stars are far."),
        count: 2,
        complexity: None,
    };
    assert!(matches!(
        processor.execute_task(questions.clone()).await,
        Err(AppError::Task(_))
    ));

    processor.set_strategy(Strategy::Question(QuestionStrategy::new(
        generator(&client),
        LanguageDetector::default(),
        catalog(),
    )));
    assert_eq!(
        processor.strategy().map(|s| s.kind()),
        Some(StrategyKind::Question)
    );

    if let Some(Strategy::Question(strategy)) = processor.strategy_mut() {
        assert_eq!(strategy.set_complexity("challenging").unwrap(), Complexity::Hard);
        assert!(matches!(
            strategy.set_complexity("xyzzy"),
            Err(AppError::UnknownComplexity(_))
        ));
        assert_eq!(strategy.complexity(), Complexity::Hard);
    }

    match processor.execute_task(questions).await.unwrap() {
        StrategyResult::Questions(result) => {
            assert_eq!(result.pairs.len(), 1);
            assert_eq!(result.pairs[0].answer, "Mammals.");
            assert_eq!(result.complexity, Complexity::Hard);
        }
        other => panic!("expected questions, got {:?}", other),
    }

    let prompt = client.prompts().last().cloned().unwrap();
    assert!(prompt.contains(Complexity::Hard.instruction()));
    assert!(prompt.contains("Generate 2 meaningful questions"));
}

#[tokio::test]
async fn test_question_request_sets_its_own_complexity() {
    let client = Arc::new(StaticClient::scripted([
        "Q1: What are cats?\nA1: Mammals.",
        "Q1: Why are cats mammals?\nA1: They nurse their young.",
    ]));
    let processor = TaskProcessor::with_strategy(Strategy::Question(QuestionStrategy::new(
        generator(&client),
        LanguageDetector::default(),
        catalog(),
    )));
    let request = |complexity: Option<&str>| TaskRequest::Questions {
        chunk: Chunk::new("doc", 0, "Cats are mammals that nurse their young."),
        count: 1,
        complexity: complexity.map(str::to_string),
    };

    match processor.execute_task(request(Some("beginner"))).await.unwrap() {
        StrategyResult::Questions(result) => assert_eq!(result.complexity, Complexity::Easy),
        other => panic!("expected questions, got {:?}", other),
    }
    assert!(client.prompts()[0].contains(Complexity::Easy.instruction()));

    // The override applies to one request; the strategy keeps its own level
    match processor.execute_task(request(None)).await.unwrap() {
        StrategyResult::Questions(result) => assert_eq!(result.complexity, Complexity::Medium),
        other => panic!("expected questions, got {:?}", other),
    }
    assert!(client.prompts()[1].contains(Complexity::Medium.instruction()));

    assert!(matches!(
        processor.execute_task(request(Some("xyzzy"))).await,
        Err(AppError::UnknownComplexity(_))
    ));
    assert_eq!(client.prompts().len(), 2);
}
