//! The single LLM round trip of a run.
//!
//! [`orchestrate`] builds one prompt from the weather records and the
//! candidate headlines, sends it through [`AskAsync`] exactly once, and
//! turns the reply into an [`AiResponse`] with the tolerant
//! [`parser`]. Any request failure ends the run; there is no retry.

pub mod parser;
pub mod prompt;

use crate::api::AskAsync;
use crate::error::AiRequestError;
use crate::models::{AiResponse, NewsItem, WeatherRecord};
use rand::seq::IndexedRandom;
use tracing::{info, instrument, warn};

/// Used when the persona table is empty.
const FALLBACK_PERSONA: &str = "神秘来客";

/// Draw the greeting persona for this run.
pub fn pick_persona(personas: &[String]) -> String {
    personas
        .choose(&mut rand::rng())
        .cloned()
        .unwrap_or_else(|| FALLBACK_PERSONA.to_string())
}

/// Greeting used when the reply carried no greeting.
pub fn fallback_greeting(persona: &str) -> String {
    format!("{persona}祝您早安！新的一天开始了！")
}

/// Send the unified request and parse its reply.
///
/// # Errors
///
/// Whatever the [`AskAsync`] implementation returns, or
/// [`AiRequestError::Unparseable`] when the reply holds nothing usable.
#[instrument(level = "info", skip_all, fields(persona = %persona, candidates = candidates.len()))]
pub async fn orchestrate<A>(
    ask: &A,
    persona: &str,
    weather: &[WeatherRecord],
    candidates: &[NewsItem],
) -> Result<AiResponse, AiRequestError>
where
    A: AskAsync<Response = String>,
{
    let text = prompt::build_prompt(persona, weather, candidates);
    let reply = ask.ask(&text).await?;

    let cities: Vec<String> = weather.iter().map(|w| w.city.clone()).collect();
    let parsed = parser::parse_reply(&reply, candidates, &cities)?;
    for warning in &parsed.warnings {
        warn!(%warning, "LLM reply repaired");
    }

    let greeting = parsed
        .greeting
        .unwrap_or_else(|| fallback_greeting(persona));
    info!(
        selected = parsed.items.len(),
        warnings = parsed.warnings.len(),
        "LLM reply parsed"
    );

    Ok(AiResponse {
        persona: persona.to_string(),
        greeting,
        weather_advice: parsed.weather_advice,
        items: parsed.items,
        warnings: parsed.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::parser::ParseWarning;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct Recording {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl Recording {
        fn new(reply: serde_json::Value) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl AskAsync for Recording {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, AiRequestError> {
            self.prompts.lock().unwrap().push(text.to_string());
            Ok(self.reply.clone())
        }
    }

    struct Quota;

    impl AskAsync for Quota {
        type Response = String;

        async fn ask(&self, _text: &str) -> Result<String, AiRequestError> {
            Err(AiRequestError::QuotaExceeded("daily limit".to_string()))
        }
    }

    fn candidates() -> Vec<NewsItem> {
        (1..=3)
            .map(|i| {
                NewsItem::candidate(
                    "Nature News",
                    &format!("Story {i}"),
                    &format!("https://www.nature.com/articles/{i}"),
                    NaiveDate::from_ymd_opt(2025, 12, 3).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_pick_persona() {
        let personas = vec!["海格".to_string(), "多比".to_string()];
        for _ in 0..20 {
            assert!(personas.contains(&pick_persona(&personas)));
        }
        assert_eq!(pick_persona(&[]), FALLBACK_PERSONA);
    }

    #[tokio::test]
    async fn test_orchestrate_makes_one_call() {
        let ask = Recording::new(serde_json::json!({
            "greeting": "早上好！",
            "weather_advice": {"北京": "戴帽子"},
            "selected": [{"index": 2, "title_cn": "故事二", "summary": "摘要", "category": "B"}]
        }));
        let weather = vec![WeatherRecord::unknown("北京")];

        let response = orchestrate(&ask, "海格", &weather, &candidates()).await.unwrap();

        let prompts = ask.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Story 3"));
        assert_eq!(response.persona, "海格");
        assert_eq!(response.greeting, "早上好！");
        assert_eq!(response.advice_for("北京"), Some("戴帽子"));
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].title, "Story 2");
        assert_eq!(response.items[0].rank, Some(1));
    }

    #[tokio::test]
    async fn test_orchestrate_fills_missing_greeting() {
        let ask = Recording::new(serde_json::json!({"selected": [1]}));
        let response = orchestrate(&ask, "多比", &[WeatherRecord::unknown("北京")], &candidates())
            .await
            .unwrap();
        assert_eq!(response.greeting, fallback_greeting("多比"));
        assert!(response.warnings.contains(&ParseWarning::MissingGreeting));
    }

    #[tokio::test]
    async fn test_orchestrate_greeting_only_mode_falls_back() {
        let ask = Recording::new(serde_json::json!({"weather_advice": {"北京": "多穿点"}, "selected": []}));
        let response = orchestrate(&ask, "海格", &[WeatherRecord::unknown("北京")], &[])
            .await
            .unwrap();
        assert_eq!(response.greeting, fallback_greeting("海格"));
        assert_eq!(response.advice_for("北京"), Some("多穿点"));
        assert!(response.items.is_empty());
    }

    #[tokio::test]
    async fn test_orchestrate_propagates_failure() {
        let err = orchestrate(&Quota, "多比", &[WeatherRecord::unknown("北京")], &candidates())
            .await
            .unwrap_err();
        assert!(err.is_quota());
    }

    #[tokio::test]
    async fn test_orchestrate_unusable_reply() {
        let ask = Recording::new(serde_json::json!({"selected": [42]}));
        let err = orchestrate(&ask, "多比", &[WeatherRecord::unknown("北京")], &candidates())
            .await
            .unwrap_err();
        assert!(matches!(err, AiRequestError::Unparseable(_)));
    }
}
