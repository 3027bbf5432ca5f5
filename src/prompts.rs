//! Feature-to-prompt mapping.
//!
//! Each AI-backed feature of the app is a [`FeatureRequest`] variant with typed
//! parameters. A variant knows how to render its prompt, which response schema
//! it expects and how deterministic the output should be. The invocation
//! pipeline never looks inside.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::ai_service::AiRequestConfig;

/// Temperature for grading and classification style tasks.
pub const DETERMINISTIC_TEMPERATURE: f32 = 0.2;

/// Temperature for free-form content generation.
pub const CREATIVE_TEMPERATURE: f32 = 0.8;

/// The language being learned and the language explanations are written in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePair {
    pub target: String,
    pub native: String,
}

impl Default for LanguagePair {
    fn default() -> Self {
        Self {
            target: "Spanish".to_string(),
            native: "English".to_string(),
        }
    }
}

/// Rendered prompt plus its response contract.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub prompt: String,
    pub schema: Option<Value>,
    pub temperature: f32,
}

impl PromptSpec {
    pub fn into_config(self) -> AiRequestConfig {
        let config = AiRequestConfig::new(self.prompt).with_temperature(self.temperature);
        match self.schema {
            Some(schema) => config.with_schema(schema),
            None => config,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "feature", content = "params", rename_all = "snake_case")]
pub enum FeatureRequest {
    ExplainVocab {
        word: String,
        #[serde(default)]
        context: Option<String>,
    },
    GenerateStory {
        level: String,
        #[serde(default)]
        topic: Option<String>,
        #[serde(default)]
        vocabulary: Vec<String>,
    },
    CheckTranslation {
        source_text: String,
        user_translation: String,
    },
    DailyChallenge {
        level: String,
        #[serde(default)]
        known_words: Vec<String>,
    },
}

impl FeatureRequest {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureRequest::ExplainVocab { .. } => "explain_vocab",
            FeatureRequest::GenerateStory { .. } => "generate_story",
            FeatureRequest::CheckTranslation { .. } => "check_translation",
            FeatureRequest::DailyChallenge { .. } => "daily_challenge",
        }
    }

    /// Empty required parameters are rejected before any provider call.
    pub fn validate(&self) -> Result<(), String> {
        let missing = match self {
            FeatureRequest::ExplainVocab { word, .. } if word.trim().is_empty() => Some("word"),
            FeatureRequest::GenerateStory { level, .. } if level.trim().is_empty() => Some("level"),
            FeatureRequest::CheckTranslation { source_text, .. } if source_text.trim().is_empty() => {
                Some("source_text")
            }
            FeatureRequest::CheckTranslation {
                user_translation, ..
            } if user_translation.trim().is_empty() => Some("user_translation"),
            FeatureRequest::DailyChallenge { level, .. } if level.trim().is_empty() => Some("level"),
            _ => None,
        };

        match missing {
            Some(field) => Err(format!("'{}' must not be empty for {}", field, self.name())),
            None => Ok(()),
        }
    }

    pub fn build_prompt(&self, languages: &LanguagePair) -> PromptSpec {
        match self {
            FeatureRequest::ExplainVocab { word, context } => {
                let context_line = context
                    .as_deref()
                    .map(|c| format!("\nThe word appeared in this sentence: \"{}\"", c))
                    .unwrap_or_default();

                PromptSpec {
                    prompt: format!(
                        r#"You are a {target} teacher helping a {native}-speaking learner.
Explain the {target} word "{word}".{context_line}

Give its most relevant meaning in {native}, its part of speech, a short usage note,
and two natural example sentences in {target} with {native} translations.
If a sentence was given, explain the meaning the word has in that sentence."#,
                        target = languages.target,
                        native = languages.native,
                        word = word.trim(),
                        context_line = context_line,
                    ),
                    schema: Some(vocab_schema()),
                    temperature: DETERMINISTIC_TEMPERATURE,
                }
            }
            FeatureRequest::GenerateStory {
                level,
                topic,
                vocabulary,
            } => {
                let topic_line = topic
                    .as_deref()
                    .map(|t| format!(" about {}", t))
                    .unwrap_or_default();
                let vocab_line = if vocabulary.is_empty() {
                    String::new()
                } else {
                    format!("\nNaturally include these words: {}.", vocabulary.join(", "))
                };

                PromptSpec {
                    prompt: format!(
                        r#"Write a short {target} story{topic_line} for a learner at CEFR level {level}.{vocab_line}
Keep sentences appropriate for the level. Split the story into short paragraphs and
list the key vocabulary with {native} meanings."#,
                        target = languages.target,
                        native = languages.native,
                        topic_line = topic_line,
                        level = level,
                        vocab_line = vocab_line,
                    ),
                    schema: Some(story_schema()),
                    temperature: CREATIVE_TEMPERATURE,
                }
            }
            FeatureRequest::CheckTranslation {
                source_text,
                user_translation,
            } => PromptSpec {
                prompt: format!(
                    r#"A learner translated a {target} text into {native}.

Original ({target}): {source}
Learner's translation ({native}): {translation}

Judge whether the translation preserves the meaning. Accept paraphrases and
synonyms. Point out each real mistake and give a corrected translation."#,
                    target = languages.target,
                    native = languages.native,
                    source = source_text,
                    translation = user_translation,
                ),
                schema: Some(translation_schema()),
                temperature: DETERMINISTIC_TEMPERATURE,
            },
            FeatureRequest::DailyChallenge { level, known_words } => {
                let known_line = if known_words.is_empty() {
                    String::new()
                } else {
                    format!(
                        "\nPrefer exercises that reuse these words the learner knows: {}.",
                        known_words.join(", ")
                    )
                };

                PromptSpec {
                    prompt: format!(
                        r#"Create today's {target} challenge for a learner at CEFR level {level}.{known_line}
Write three short exercises (fill in the blank, translation, or multiple choice)
with instructions in {native} and the expected answer for each."#,
                        target = languages.target,
                        native = languages.native,
                        level = level,
                        known_line = known_line,
                    ),
                    schema: Some(challenge_schema()),
                    temperature: CREATIVE_TEMPERATURE,
                }
            }
        }
    }

    /// Feature-specific fix-ups on parsed output. Freshly generated content
    /// gets an `id` if the provider did not supply one.
    pub fn post_process(&self, value: Value) -> Value {
        match self {
            FeatureRequest::GenerateStory { .. } | FeatureRequest::DailyChallenge { .. } => {
                inject_missing_id(value)
            }
            _ => value,
        }
    }
}

/// Add a generated `id` to a JSON object whose `id` is absent or null.
/// Any other provider-supplied value, even an empty string, is kept.
pub fn inject_missing_id(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        let has_id = map.get("id").is_some_and(|id| !id.is_null());
        if !has_id {
            map.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
    }
    value
}

fn vocab_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "word": { "type": "string" },
            "meaning": { "type": "string" },
            "partOfSpeech": { "type": "string" },
            "usageNote": { "type": "string" },
            "examples": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "sentence": { "type": "string" },
                        "translation": { "type": "string" }
                    },
                    "required": ["sentence", "translation"]
                }
            }
        },
        "required": ["word", "meaning", "partOfSpeech", "examples"]
    })
}

fn story_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "paragraphs": { "type": "array", "items": { "type": "string" } },
            "vocabulary": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "word": { "type": "string" },
                        "meaning": { "type": "string" }
                    },
                    "required": ["word", "meaning"]
                }
            }
        },
        "required": ["title", "paragraphs", "vocabulary"]
    })
}

fn translation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "isCorrect": { "type": "boolean" },
            "score": { "type": "integer" },
            "mistakes": { "type": "array", "items": { "type": "string" } },
            "correctedTranslation": { "type": "string" },
            "feedback": { "type": "string" }
        },
        "required": ["isCorrect", "score", "correctedTranslation", "feedback"]
    })
}

fn challenge_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "theme": { "type": "string" },
            "exercises": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "kind": { "type": "string" },
                        "instruction": { "type": "string" },
                        "question": { "type": "string" },
                        "options": { "type": "array", "items": { "type": "string" } },
                        "answer": { "type": "string" }
                    },
                    "required": ["kind", "instruction", "question", "answer"]
                }
            }
        },
        "required": ["theme", "exercises"]
    })
}
