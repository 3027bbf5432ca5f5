mod common;

use axum::http::StatusCode;
use common::{create_test_server, overloaded, rate_limited, reply, ScriptedProvider};
use language_tutor::{prompts::DETERMINISTIC_TEMPERATURE, AiError, SERVICE_BUSY_MESSAGE};
use serde_json::{json, Value};

fn vocab_reply() -> String {
    json!({
        "word": "perro",
        "meaning": "dog",
        "partOfSpeech": "noun",
        "usageNote": "Masculine; feminine is perra.",
        "examples": [{"sentence": "El perro ladra.", "translation": "The dog barks."}]
    })
    .to_string()
}

#[tokio::test]
async fn test_generate_story_injects_id() {
    let provider = ScriptedProvider::new(vec![reply(
        r#"{"title": "La playa", "paragraphs": ["Hace sol."], "vocabulary": []}"#,
    )]);
    let server = create_test_server(provider.clone()).await;

    let response = server
        .post("/api/ai/generate")
        .json(&json!({
            "feature": "generate_story",
            "params": {"level": "A2", "topic": "the beach", "vocabulary": ["sol"]}
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["feature"], "generate_story");
    assert_eq!(body["data"]["tokens"], 120);
    assert_eq!(body["data"]["data"]["title"], "La playa");
    assert!(body["data"]["data"]["id"].is_string());

    let requests = provider.requests();
    assert!(requests[0].prompt.contains("the beach"));
    assert!(requests[0].prompt.contains("sol"));
}

#[tokio::test]
async fn test_provider_supplied_id_is_kept() {
    let provider = ScriptedProvider::new(vec![reply(
        r#"{"id": "challenge-7", "theme": "Food", "exercises": []}"#,
    )]);
    let server = create_test_server(provider).await;

    let body: Value = server
        .post("/api/ai/generate")
        .json(&json!({"feature": "daily_challenge", "params": {"level": "B1"}}))
        .await
        .json();

    assert_eq!(body["data"]["data"]["id"], "challenge-7");
}

#[tokio::test]
async fn test_check_translation_uses_low_temperature() {
    let provider = ScriptedProvider::new(vec![reply(
        r#"{"isCorrect": true, "score": 95, "mistakes": [], "correctedTranslation": "Good morning", "feedback": "Great"}"#,
    )]);
    let server = create_test_server(provider.clone()).await;

    server
        .post("/api/ai/generate")
        .json(&json!({
            "feature": "check_translation",
            "params": {"source_text": "Buenos días", "user_translation": "Good morning"}
        }))
        .await
        .assert_status_ok();

    let requests = provider.requests();
    assert_eq!(requests[0].temperature, DETERMINISTIC_TEMPERATURE);
    assert!(requests[0].schema.is_some());
}

#[tokio::test]
async fn test_busy_provider_returns_friendly_503_after_retries() {
    let provider = ScriptedProvider::new(vec![overloaded(), rate_limited(), overloaded()]);
    let server = create_test_server(provider.clone()).await;

    let response = server
        .post("/api/ai/generate")
        .json(&json!({"feature": "explain_vocab", "params": {"word": "perro"}}))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], SERVICE_BUSY_MESSAGE);
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn test_transient_failure_recovers_within_budget() {
    let provider = ScriptedProvider::new(vec![overloaded(), reply(&vocab_reply())]);
    let server = create_test_server(provider.clone()).await;

    let response = server
        .post("/api/ai/generate")
        .json(&json!({"feature": "explain_vocab", "params": {"word": "perro"}}))
        .await;

    response.assert_status_ok();
    assert_eq!(provider.call_count(), 2);
    // Identical request on every attempt
    let requests = provider.requests();
    assert_eq!(requests[0], requests[1]);
}

#[tokio::test]
async fn test_invalid_structured_output_is_server_error() {
    let provider = ScriptedProvider::new(vec![reply("I'm not sure what you mean.")]);
    let server = create_test_server(provider.clone()).await;

    let response = server
        .post("/api/ai/generate")
        .json(&json!({"feature": "explain_vocab", "params": {"word": "perro"}}))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_unknown_model_is_configuration_error() {
    let provider = ScriptedProvider::new(vec![Err(AiError::provider(
        "Scripted",
        Some(404),
        "[404 Not Found] models/gemini-9 is not found",
    ))]);
    let server = create_test_server(provider.clone()).await;

    let response = server
        .post("/api/ai/generate")
        .json(&json!({"feature": "explain_vocab", "params": {"word": "perro"}}))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("model configuration"));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_empty_response_is_not_retried() {
    let provider = ScriptedProvider::new(vec![reply(""), reply(&vocab_reply())]);
    let server = create_test_server(provider.clone()).await;

    let response = server
        .post("/api/ai/generate")
        .json(&json!({"feature": "explain_vocab", "params": {"word": "perro"}}))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_blank_parameters_are_rejected_before_calling_provider() {
    let provider = ScriptedProvider::new(vec![]);
    let server = create_test_server(provider.clone()).await;

    let response = server
        .post("/api/ai/generate")
        .json(&json!({"feature": "explain_vocab", "params": {"word": " "}}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_dictionary_lookup_caches_analysis() {
    let provider = ScriptedProvider::new(vec![reply(&vocab_reply())]);
    let server = create_test_server(provider.clone()).await;

    let response = server
        .post("/api/dictionary/lookup")
        .json(&json!({"word": "perro", "context": "El perro ladra"}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["word"], "perro");
    assert_eq!(body["data"]["meaning"], "dog");
    assert_eq!(body["data"]["content"]["partOfSpeech"], "noun");
    assert!(provider.requests()[0].prompt.contains("El perro ladra"));

    // Second lookup and direct fetch are served from the store
    server
        .post("/api/dictionary/lookup")
        .json(&json!({"word": "perro"}))
        .await
        .assert_status_ok();
    let stored: Value = server.get("/api/dictionary/perro").await.json();
    assert_eq!(stored["data"]["meaning"], "dog");
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_dictionary_lookup_feeds_flashcard_meaning() {
    let provider = ScriptedProvider::new(vec![reply(&vocab_reply())]);
    let server = create_test_server(provider).await;

    server
        .post("/api/dictionary/lookup")
        .json(&json!({"word": "perro"}))
        .await
        .assert_status_ok();

    let body: Value = server
        .post("/api/flashcards")
        .json(&json!({"word": "perro", "sourceType": "DICTIONARY"}))
        .await
        .json();

    assert_eq!(body["data"]["meaning"], "dog");
}

#[tokio::test]
async fn test_unknown_dictionary_word_is_not_found() {
    let server = create_test_server(ScriptedProvider::new(vec![])).await;

    server
        .get("/api/dictionary/desconocido")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
