//! HTML rendering of the daily report.
//!
//! Both renderers are pure: the same inputs always give byte-identical
//! output, and every piece of scraped or generated text is escaped with
//! [`escape_html`] before it is interpolated.

use crate::error::TemplateError;
use crate::models::{AiResponse, Category, NewsItem, WeatherRecord};
use crate::utils::escape_html;
use chrono::NaiveDateTime;

/// Inline stylesheet; mail clients drop external CSS.
const STYLE: &str = r#"
body { font-family: 'Helvetica Neue', Helvetica, 'PingFang SC', 'Microsoft YaHei', Arial, sans-serif; line-height: 1.8; color: #444; max-width: 800px; margin: 0 auto; padding: 20px; background-color: #fcfcfc; }
.container { background-color: #ffffff; padding: 40px; border: 1px solid #eaeaea; }
.greeting { font-size: 15px; color: #555; margin-bottom: 40px; padding: 20px; background-color: #f9f9f9; border-left: 3px solid #999; }
.section-title { font-size: 18px; color: #444; margin: 40px 0 25px; font-weight: 500; letter-spacing: 1px; border-bottom: 1px solid #ccc; padding-bottom: 10px; }
.weather-container { display: flex; justify-content: space-between; gap: 20px; }
.weather-card { flex: 1; background-color: #fff; padding: 20px; border: 1px solid #e8e8e8; text-align: center; }
.weather-city { font-size: 16px; font-weight: 600; margin-bottom: 12px; padding-bottom: 8px; border-bottom: 1px solid #f0f0f0; }
.weather-main { font-size: 18px; margin: 10px 0; }
.weather-condition { font-weight: bold; color: #333; }
.weather-divider { color: #ccc; margin: 0 8px; }
.weather-temp { font-size: 16px; color: #666; }
.weather-detail { font-size: 13px; color: #666; margin: 4px 0; }
.weather-advice { margin-top: 12px; font-size: 12px; color: #555; background-color: #f9f9f9; padding: 10px; text-align: left; border: 1px solid #eee; }
.weather-alert { margin-top: 10px; padding: 8px; background-color: #fff8e1; border-left: 3px solid #ffa000; text-align: left; }
.alert-item { font-size: 12px; color: #6d4c00; margin: 3px 0; }
.category-section { margin: 30px 0 25px; }
.category-title { font-size: 15px; color: #555; font-weight: 600; margin-bottom: 15px; padding: 8px 12px; background-color: #f7f7f7; border-left: 3px solid #aaa; }
.news-item { margin-bottom: 20px; padding: 15px; background-color: #fcfcfc; border: 1px solid #ececec; }
.news-title { font-size: 15px; font-weight: 600; color: #333; margin-bottom: 8px; }
.news-link-btn { display: inline-block; margin-left: 4px; font-size: 10px; text-decoration: none; vertical-align: middle; color: #bbb; opacity: 0.7; }
.news-date { margin-left: 5px; font-size: 11px; color: #888; font-weight: normal; vertical-align: middle; }
.news-title-en { font-size: 12px; color: #777; margin-bottom: 8px; }
.news-summary { font-size: 13px; color: #444; line-height: 1.6; margin-bottom: 8px; }
@media (max-width: 600px) {
  body { padding: 10px; line-height: 1.6; }
  .container { padding: 15px; }
  .greeting { font-size: 14px; padding: 15px; margin-bottom: 20px; }
  .weather-container { flex-direction: column; gap: 15px; }
  .weather-card { padding: 15px; }
  .news-item { padding: 12px; margin-bottom: 12px; }
  .news-title { font-size: 14px; }
  .news-summary { font-size: 12px; line-height: 1.5; }
}
"#;

fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <style>{STYLE}</style>\n</head>\n<body>\n<div class=\"container\">\n{body}</div>\n</body>\n</html>\n"
    )
}

/// Escape and keep the model's line breaks.
fn paragraph(text: &str) -> String {
    escape_html(text.trim()).replace('\n', "<br>")
}

fn weather_card(record: &WeatherRecord, advice: Option<&str>) -> String {
    let mut card = format!(
        "<div class=\"weather-card\">\n\
         <div class=\"weather-city\">{city}</div>\n\
         <div class=\"weather-main\"><span class=\"weather-condition\">{condition}</span>\
         <span class=\"weather-divider\">|</span><span class=\"weather-temp\">{temp}</span></div>\n\
         <div class=\"weather-detail\">🌡️ {range}</div>\n\
         <div class=\"weather-detail\">{wind}</div>\n\
         <div class=\"weather-detail\">🌅 {sunrise} | 🌇 {sunset}</div>\n",
        city = escape_html(&record.city),
        condition = escape_html(&record.condition),
        temp = escape_html(&record.current_temp),
        range = escape_html(&record.temperature_range()),
        wind = escape_html(&record.wind),
        sunrise = escape_html(&record.sunrise),
        sunset = escape_html(&record.sunset),
    );

    if !record.alerts.is_empty() {
        card.push_str("<div class=\"weather-alert\">\n");
        for alert in &record.alerts {
            card.push_str(&format!("<div class=\"alert-item\">⚠️ {}</div>\n", escape_html(alert)));
        }
        card.push_str("</div>\n");
    }
    if let Some(advice) = advice.map(str::trim).filter(|a| !a.is_empty()) {
        card.push_str(&format!("<div class=\"weather-advice\">💡 {}</div>\n", paragraph(advice)));
    }
    card.push_str("</div>\n");
    card
}

fn news_entry(item: &NewsItem) -> String {
    let mut entry = format!(
        "<div class=\"news-item\">\n\
         <div class=\"news-title\">{title}\
         <a href=\"{link}\" class=\"news-link-btn\" target=\"_blank\">🔗</a>\
         <span class=\"news-date\">{date}</span></div>\n\
         <div class=\"news-title-en\">{original}, {source}</div>\n",
        title = escape_html(item.display_title()),
        link = escape_html(&item.link),
        date = item.date.format("%Y-%m-%d"),
        original = escape_html(&item.title),
        source = escape_html(item.short_source()),
    );
    if let Some(summary) = item.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        entry.push_str(&format!("<div class=\"news-summary\">{}</div>\n", paragraph(summary)));
    }
    entry.push_str("</div>\n");
    entry
}

/// Items grouped A, B, C; unclassified items count as C. Rank order is
/// kept inside each group and empty groups are left out.
fn news_section(items: &[NewsItem]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut section = String::from("<h2 class=\"section-title\">科学新闻</h2>\n");
    for category in Category::ALL {
        let group: Vec<&NewsItem> = items
            .iter()
            .filter(|item| item.category.unwrap_or(Category::Other) == category)
            .collect();
        if group.is_empty() {
            continue;
        }
        section.push_str(&format!(
            "<div class=\"category-section\">\n<div class=\"category-title\">{} ({})</div>\n",
            category.title(),
            group.len()
        ));
        for item in group {
            section.push_str(&news_entry(item));
        }
        section.push_str("</div>\n");
    }
    section
}

/// Render the full report.
///
/// # Errors
///
/// [`TemplateError::MissingGreeting`] for a blank greeting and
/// [`TemplateError::MissingWeather`] when there are no weather records.
pub fn render_report(response: &AiResponse, weather: &[WeatherRecord]) -> Result<String, TemplateError> {
    if response.greeting.trim().is_empty() {
        return Err(TemplateError::MissingGreeting);
    }
    if weather.is_empty() {
        return Err(TemplateError::MissingWeather);
    }

    let mut body = format!(
        "<div class=\"greeting\">\n<strong>{}</strong>：<br><br>\n{}\n</div>\n",
        escape_html(&response.persona),
        paragraph(&response.greeting)
    );
    body.push_str("<h2 class=\"section-title\">今日天气</h2>\n<div class=\"weather-container\">\n");
    for record in weather {
        body.push_str(&weather_card(record, response.advice_for(&record.city)));
    }
    body.push_str("</div>\n");
    body.push_str(&news_section(&response.items));

    Ok(page(&body))
}

/// Page for the SMTP connectivity check.
pub fn render_test_email(now: NaiveDateTime) -> String {
    page(&format!(
        "<div class=\"greeting\">\n<strong>邮件测试</strong>：<br><br>\n\
         这是一封测试邮件，发送于 {}。收到说明 SMTP 配置正确。\n</div>\n",
        now.format("%Y-%m-%d %H:%M:%S")
    ))
}
