//! weather.com.cn one-day forecast scraper.
//!
//! Each configured city has a fixed forecast page such as
//! `https://www.weather.com.cn/weather1d/101011700.shtml`. The page is
//! scraped for the live temperature block (`div.sk`), the day/night
//! forecast list (`div.t ul li`), sunrise/sunset and alert banners.
//!
//! Fields the page does not carry become [`UNKNOWN`]. A page with neither
//! a condition nor a live temperature is treated as unparsable, since the
//! report cannot go out without weather.

use crate::error::FetchError;
use crate::models::{UNKNOWN, WeatherRecord};
use crate::scrapers::fetch_html;
use crate::utils::squash_whitespace;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, instrument};

/// A city and the page its forecast is scraped from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitySource {
    /// Display name used in the report and the prompt.
    pub name: String,
    pub url: String,
}

impl CitySource {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static weather selector")
}

static CURRENT_TEMP: Lazy<Selector> = Lazy::new(|| selector("div.sk div.tem span"));
static CONDITION: Lazy<Selector> = Lazy::new(|| selector("div.t ul li p.wea"));
static HIGH: Lazy<Selector> = Lazy::new(|| selector("div.t ul li:first-child p.tem span"));
static LOW: Lazy<Selector> = Lazy::new(|| selector("div.t ul li:nth-child(2) p.tem span"));
static WIND_LEVEL: Lazy<Selector> = Lazy::new(|| selector("div.t ul li p.win span"));
static WIND_DIR: Lazy<Selector> = Lazy::new(|| selector("div.t ul li p.win i"));
static SUNRISE: Lazy<Selector> = Lazy::new(|| selector("p.sunUp span"));
static SUNSET: Lazy<Selector> = Lazy::new(|| selector("p.sunDown span"));
static ALERTS: Lazy<Selector> = Lazy::new(|| selector("div.sk_alarm a"));

fn first_text(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .next()
        .map(|el| squash_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// Compass class used on the wind icon, mapped to the Chinese direction.
fn wind_direction(class: &str) -> Option<&'static str> {
    match class {
        "N" => Some("北风"),
        "NE" => Some("东北风"),
        "E" => Some("东风"),
        "SE" => Some("东南风"),
        "S" => Some("南风"),
        "SW" => Some("西南风"),
        "W" => Some("西风"),
        "NW" => Some("西北风"),
        _ => None,
    }
}

fn parse_wind(document: &Html) -> String {
    let Some(level_el) = document.select(&WIND_LEVEL).next() else {
        return UNKNOWN.to_string();
    };
    let level = squash_whitespace(&level_el.text().collect::<String>());

    let direction = document
        .select(&WIND_DIR)
        .next()
        .and_then(|i| i.value().classes().find_map(wind_direction));

    match direction {
        Some(dir) if !level.is_empty() => format!("{dir} {level}"),
        Some(dir) => dir.to_string(),
        None => match level_el.value().attr("title").map(str::trim) {
            Some(title) if !title.is_empty() && title != level => {
                if level.is_empty() {
                    title.to_string()
                } else {
                    format!("{title} {level}")
                }
            }
            _ if !level.is_empty() => level,
            _ => UNKNOWN.to_string(),
        },
    }
}

fn is_displayed(el: &ElementRef<'_>) -> bool {
    el.value()
        .attr("style")
        .map(|style| style.replace(' ', "").contains("display:block"))
        .unwrap_or(false)
}

fn parse_alerts(document: &Html) -> Vec<String> {
    document
        .select(&ALERTS)
        .filter(is_displayed)
        .filter_map(|a| {
            a.value()
                .attr("title")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .or_else(|| Some(squash_whitespace(&a.text().collect::<String>())))
                .filter(|t| !t.is_empty())
        })
        .collect()
}

/// Parse a forecast page into a [`WeatherRecord`] for `city`.
///
/// Returns the reason as `Err` when the page has neither a condition nor a
/// live temperature.
pub fn parse_weather(html: &str, city: &str) -> Result<WeatherRecord, String> {
    let document = Html::parse_document(html);

    let current_temp = first_text(&document, &CURRENT_TEMP).map(|t| format!("{t}°C"));
    let condition = first_text(&document, &CONDITION);
    if current_temp.is_none() && condition.is_none() {
        return Err("no live temperature and no condition on page".to_string());
    }

    let strip = |text: String, prefix: &str| text.trim_start_matches(prefix).trim().to_string();
    let unknown = || UNKNOWN.to_string();

    Ok(WeatherRecord {
        city: city.to_string(),
        current_temp: current_temp.unwrap_or_else(unknown),
        condition: condition.unwrap_or_else(unknown),
        high: first_text(&document, &HIGH).unwrap_or_else(unknown),
        low: first_text(&document, &LOW).unwrap_or_else(unknown),
        wind: parse_wind(&document),
        sunrise: first_text(&document, &SUNRISE)
            .map(|t| strip(t, "日出"))
            .unwrap_or_else(unknown),
        sunset: first_text(&document, &SUNSET)
            .map(|t| strip(t, "日落"))
            .unwrap_or_else(unknown),
        alerts: parse_alerts(&document),
    })
}

/// Fetch and parse the forecast page of one city.
#[instrument(level = "info", skip(client), fields(city = %source.name, url = %source.url))]
pub async fn fetch_weather(client: &Client, source: &CitySource) -> Result<WeatherRecord, FetchError> {
    let html = fetch_html(client, &source.url).await?;
    let record = parse_weather(&html, &source.name).map_err(|reason| FetchError::Unparsable {
        url: source.url.clone(),
        reason,
    })?;
    info!(
        condition = %record.condition,
        temp = %record.current_temp,
        alerts = record.alerts.len(),
        "Parsed weather"
    );
    Ok(record)
}

/// Fetch every configured city in order. The first failure aborts.
pub async fn collect_weather(
    client: &Client,
    sources: &[CitySource],
) -> Result<Vec<WeatherRecord>, FetchError> {
    let mut records = Vec::with_capacity(sources.len());
    for source in sources {
        records.push(fetch_weather(client, source).await?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::http_client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
<html><body>
  <div class="crumbs"><a>全国</a><a>北京</a></div>
  <div class="sk"><div class="tem"><span>5</span><em>°C</em></div></div>
  <div class="sk_alarm">
    <a style="display: block" title="北京市气象台发布大风蓝色预警">大风蓝色</a>
    <a style="display: none" title="旧预警">旧</a>
  </div>
  <div class="t"><ul>
    <li>
      <p class="wea">晴</p>
      <p class="tem"><span>7</span><em>°C</em></p>
      <p class="win"><i class="NW"></i><span title="西北风">3-4级</span></p>
      <p class="sunUp"><span>日出 07:21</span></p>
    </li>
    <li>
      <p class="wea">多云</p>
      <p class="tem"><span>-3</span><em>°C</em></p>
      <p class="win"><i class="N"></i><span title="北风">&lt;3级</span></p>
      <p class="sunDown"><span>日落 16:50</span></p>
    </li>
  </ul></div>
</body></html>
"#;

    #[test]
    fn test_parse_weather_full_page() {
        let record = parse_weather(PAGE, "北京").unwrap();
        assert_eq!(record.city, "北京");
        assert_eq!(record.current_temp, "5°C");
        assert_eq!(record.condition, "晴");
        assert_eq!(record.high, "7");
        assert_eq!(record.low, "-3");
        assert_eq!(record.temperature_range(), "-3~7°C");
        assert_eq!(record.wind, "西北风 3-4级");
        assert_eq!(record.sunrise, "07:21");
        assert_eq!(record.sunset, "16:50");
        assert_eq!(record.alerts, vec!["北京市气象台发布大风蓝色预警".to_string()]);
    }

    #[test]
    fn test_parse_weather_wind_title_fallback() {
        let html = r#"<div class="t"><ul><li>
            <p class="wea">小雨</p>
            <p class="win"><span title="东南风">2级</span></p>
        </li></ul></div>"#;
        let record = parse_weather(html, "济南").unwrap();
        assert_eq!(record.wind, "东南风 2级");
        assert_eq!(record.current_temp, UNKNOWN);
        assert_eq!(record.sunrise, UNKNOWN);
        assert!(record.alerts.is_empty());
    }

    #[test]
    fn test_parse_weather_unparsable_page() {
        let err = parse_weather("<html><body>maintenance</body></html>", "北京").unwrap_err();
        assert!(err.contains("no live temperature"));
    }

    #[tokio::test]
    async fn test_collect_weather_fetches_each_city() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather1d/bj.shtml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/weather1d/jn.shtml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let sources = vec![
            CitySource::new("北京", &format!("{}/weather1d/bj.shtml", server.uri())),
            CitySource::new("济南", &format!("{}/weather1d/jn.shtml", server.uri())),
        ];
        let client = http_client().unwrap();
        let records = collect_weather(&client, &sources).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].city, "北京");
        assert_eq!(records[1].city, "济南");
    }

    #[tokio::test]
    async fn test_collect_weather_unparsable_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let sources = vec![CitySource::new("北京", &server.uri())];
        let client = http_client().unwrap();
        let err = collect_weather(&client, &sources).await.unwrap_err();
        assert!(matches!(err, FetchError::Unparsable { .. }));
    }
}
