use crate::analyzer::summary::InsightSummary;
use crate::config::Config;
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const API_KEY_ENV: &str = "MOODMIRROR_AI_API_KEY";

const NARRATIVE_SYSTEM_PROMPT: &str = "You write short weekly well-being notes for family caregivers of older adults. \
Use only the JSON summary you are given. Explain in plain, warm language which conditions went together with better and worse mood days. \
Treat features listed in reduced_confidence or marked imputed as tentative. If degenerate is true, describe a steady week instead of comparing groups. \
Do not diagnose, do not mention clustering or statistics terms, and keep it under 180 words.";

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Asks the configured model to phrase the weekly summary for a caregiver.
///
/// Returns `Ok(None)` when AI is disabled or no key is configured. The completion is
/// passed through untouched apart from trimming.
pub fn compose_narrative(config: &Config, summary: &InsightSummary) -> Result<Option<String>> {
    if !config.ai_enabled {
        return Ok(None);
    }

    let Some(api_key) = resolve_api_key(config) else {
        return Ok(None);
    };

    let user_payload = narrative_payload(summary)?;
    let content = chat_completion(config, &api_key, NARRATIVE_SYSTEM_PROMPT, &user_payload)?;

    Ok(Some(content))
}

pub fn test_connection(config: &Config) -> Result<String> {
    let api_key = resolve_api_key(config).context(
        "AI API key is missing. Set `MoodMirror config set ai.api_key <KEY>` or `MOODMIRROR_AI_API_KEY`.",
    )?;

    let system_prompt = "Return exactly one short sentence indicating AI API connectivity is healthy.";
    let user_prompt = "Health check for MoodMirror.";

    chat_completion(config, &api_key, system_prompt, user_prompt)
}

pub fn has_api_key(config: &Config) -> bool {
    resolve_api_key(config).is_some()
}

fn narrative_payload(summary: &InsightSummary) -> Result<String> {
    let payload = json!({
        "instruction": "Summarize this week for the caregiver.",
        "summary": summary,
    });

    serde_json::to_string(&payload).context("Failed to serialize insight summary")
}

fn resolve_api_key(config: &Config) -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            config
                .ai_api_key
                .clone()
                .filter(|value| !value.trim().is_empty())
        })
}

fn chat_completion(config: &Config, api_key: &str, system: &str, user: &str) -> Result<String> {
    let base_url = config.ai_api_base_url.clone();
    let model = config.ai_model.clone();
    let timeout_seconds = config.ai_timeout_seconds.max(5);
    let api_key = api_key.to_string();
    let system = system.to_string();
    let user = user.to_string();

    // The blocking client must not run on a tokio worker thread.
    std::thread::spawn(move || {
        chat_completion_blocking(&base_url, &model, timeout_seconds, &api_key, &system, &user)
    })
    .join()
    .map_err(|_| anyhow!("AI worker thread panicked"))?
}

fn chat_completion_blocking(
    base_url: &str,
    model: &str,
    timeout_seconds: u64,
    api_key: &str,
    system: &str,
    user: &str,
) -> Result<String> {
    if api_key.trim().is_empty() {
        bail!("AI API key is empty");
    }

    let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("Failed to build Authorization header")?,
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create AI HTTP client")?;

    let request_body = json!({
        "model": model,
        "temperature": 0.4,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user}
        ]
    });

    let response = client
        .post(endpoint)
        .json(&request_body)
        .send()
        .context("AI API request failed")?;

    let status = response.status();
    let body = response.text().context("Failed to read AI response body")?;

    if !status.is_success() {
        bail!("AI API error {}: {}", status, body);
    }

    let parsed: ChatCompletionResponse = serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse AI response: {body}"))?;

    extract_content(parsed)
}

fn extract_content(parsed: ChatCompletionResponse) -> Result<String> {
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| anyhow!("AI response did not include message.content"))
}
