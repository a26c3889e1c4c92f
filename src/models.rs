//! Data models shared by the collectors, the AI orchestrator and the renderer.
//!
//! - [`WeatherRecord`]: one scraped city forecast
//! - [`NewsItem`]: a candidate headline, enriched in place once the LLM selects it
//! - [`Category`]: the topic bucket the LLM assigns to a selected item
//! - [`AiResponse`]: everything the unified LLM request produced for one run

use crate::orchestrator::parser::ParseWarning;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Placeholder for weather fields the page did not provide.
pub const UNKNOWN: &str = "未知";

/// Forecast for one city, as scraped from its weather page.
///
/// Built once per city per run and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// Display name of the city (e.g. "北京").
    pub city: String,
    /// Live temperature including the unit, e.g. "5°C".
    pub current_temp: String,
    /// Daytime condition text, e.g. "晴".
    pub condition: String,
    /// Daytime high, without unit.
    pub high: String,
    /// Night low, without unit.
    pub low: String,
    /// Wind direction and force.
    pub wind: String,
    pub sunrise: String,
    pub sunset: String,
    /// Active weather alerts; empty when there are none.
    pub alerts: Vec<String>,
}

impl WeatherRecord {
    /// Record with every field unknown except the city name.
    pub fn unknown(city: &str) -> Self {
        Self {
            city: city.to_string(),
            current_temp: UNKNOWN.to_string(),
            condition: UNKNOWN.to_string(),
            high: UNKNOWN.to_string(),
            low: UNKNOWN.to_string(),
            wind: UNKNOWN.to_string(),
            sunrise: UNKNOWN.to_string(),
            sunset: UNKNOWN.to_string(),
            alerts: Vec::new(),
        }
    }

    /// Day range as "low~high°C", or [`UNKNOWN`] if either end is missing.
    pub fn temperature_range(&self) -> String {
        if self.low == UNKNOWN || self.high == UNKNOWN {
            UNKNOWN.to_string()
        } else {
            format!("{}~{}°C", self.low, self.high)
        }
    }
}

/// Topic bucket of a selected news item.
///
/// The LLM answers with a letter; anything it cannot classify lands in
/// [`Category::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// A: astrophysics and observational astronomy.
    Astrophysics,
    /// B: metacognition, psychology and neuroscience.
    MindBrain,
    /// C: any other notable discovery.
    Other,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Astrophysics, Category::MindBrain, Category::Other];

    /// Parse the letter code used in the LLM reply. Case and surrounding
    /// whitespace are ignored; unknown codes map to `Other`.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "A" => Category::Astrophysics,
            "B" => Category::MindBrain,
            _ => Category::Other,
        }
    }

    /// Section heading used in the e-mail.
    pub fn title(&self) -> &'static str {
        match self {
            Category::Astrophysics => "🔭 天体物理",
            Category::MindBrain => "🧠 元认知与心理学",
            Category::Other => "📰 其他科学发现",
        }
    }
}

/// A news headline.
///
/// The collector fills only the source fields. The orchestrator fills
/// `translated_title`, `summary`, `rank` and `category` on the items the LLM
/// selects; everything else is dropped from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Human name of the listing page, e.g. "Nature News".
    pub source: String,
    /// Headline as published.
    pub title: String,
    /// Absolute article URL; identity key for selection.
    pub link: String,
    pub date: NaiveDate,
    pub translated_title: Option<String>,
    pub summary: Option<String>,
    /// 1-based position in the LLM's selection.
    pub rank: Option<usize>,
    pub category: Option<Category>,
}

impl NewsItem {
    /// Candidate item with only the scraped fields set.
    pub fn candidate(source: &str, title: &str, link: &str, date: NaiveDate) -> Self {
        Self {
            source: source.to_string(),
            title: title.to_string(),
            link: link.to_string(),
            date,
            translated_title: None,
            summary: None,
            rank: None,
            category: None,
        }
    }

    /// Translated title when present and non-blank, otherwise the original.
    pub fn display_title(&self) -> &str {
        self.translated_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.title)
    }

    /// Short form of the source name for the secondary title line.
    pub fn short_source(&self) -> &str {
        match self.source.as_str() {
            "Nature News" | "Nature Research" | "Nature" => "Nature",
            "ScienceDaily" | "ScienceDaily Top" | "ScienceDaily Brain" => "ScienceDaily",
            other => other,
        }
    }
}

/// Output of the unified LLM request for one run.
#[derive(Debug, Clone)]
pub struct AiResponse {
    /// Harry Potter character whose voice the greeting uses.
    pub persona: String,
    pub greeting: String,
    /// Clothing advice keyed by city display name, in weather order.
    pub weather_advice: Vec<(String, String)>,
    /// Selected items in rank order; a subset of the candidates.
    pub items: Vec<NewsItem>,
    /// Problems the tolerant parser worked around.
    pub warnings: Vec<ParseWarning>,
}

impl AiResponse {
    pub fn advice_for(&self, city: &str) -> Option<&str> {
        self.weather_advice
            .iter()
            .find(|(c, _)| c == city)
            .map(|(_, advice)| advice.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_category_from_code() {
        assert_eq!(Category::from_code("A"), Category::Astrophysics);
        assert_eq!(Category::from_code(" b "), Category::MindBrain);
        assert_eq!(Category::from_code("C"), Category::Other);
        assert_eq!(Category::from_code("Z"), Category::Other);
        assert_eq!(Category::from_code(""), Category::Other);
    }

    #[test]
    fn test_display_title_falls_back_to_original() {
        let mut item = NewsItem::candidate(
            "Nature News",
            "Pulsar timing array",
            "https://www.nature.com/articles/x",
            day(2025, 12, 3),
        );
        assert_eq!(item.display_title(), "Pulsar timing array");

        item.translated_title = Some("   ".to_string());
        assert_eq!(item.display_title(), "Pulsar timing array");

        item.translated_title = Some("脉冲星计时阵列".to_string());
        assert_eq!(item.display_title(), "脉冲星计时阵列");
    }

    #[test]
    fn test_short_source() {
        let mut item = NewsItem::candidate("ScienceDaily Brain", "t", "l", day(2025, 1, 1));
        assert_eq!(item.short_source(), "ScienceDaily");
        item.source = "Nature Research".to_string();
        assert_eq!(item.short_source(), "Nature");
        item.source = "PsyPost".to_string();
        assert_eq!(item.short_source(), "PsyPost");
        item.source = "Nature Astronomy".to_string();
        assert_eq!(item.short_source(), "Nature Astronomy");
    }

    #[test]
    fn test_temperature_range() {
        let mut record = WeatherRecord::unknown("北京");
        assert_eq!(record.temperature_range(), UNKNOWN);
        record.low = "-3".to_string();
        record.high = "7".to_string();
        assert_eq!(record.temperature_range(), "-3~7°C");
    }

    #[test]
    fn test_news_item_serialization() {
        let item = NewsItem::candidate("Nature", "Title", "https://n.com/a", day(2025, 5, 6));
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("2025-05-06"));
        let back: NewsItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_advice_for() {
        let response = AiResponse {
            persona: "海格".to_string(),
            greeting: "早上好".to_string(),
            weather_advice: vec![("北京".to_string(), "多穿点".to_string())],
            items: vec![],
            warnings: vec![],
        };
        assert_eq!(response.advice_for("北京"), Some("多穿点"));
        assert_eq!(response.advice_for("济南"), None);
    }
}
