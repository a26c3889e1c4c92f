//! Prompt for the unified request.
//!
//! One prompt carries the weather of every city and the metadata of every
//! candidate headline, numbered from 1. The model answers with a JSON
//! object holding the greeting, per-city advice and its selection keyed by
//! those numbers; see [`crate::orchestrator::parser`].

use crate::models::{NewsItem, WeatherRecord};
use crate::orchestrator::parser::{MAX_SELECTED, MIN_SELECTED};

const SELECTION_CRITERIA: &str = "\
   **优先领域A - 天体物理学**（以下关键词平权）：
   - 球状星团(globular cluster)、白矮星(white dwarf)、毫秒脉冲星(millisecond pulsar)
   - 观测天体物理学(observational astrophysics)、恒星演化(stellar evolution)
   - 望远镜(telescope)、星震学(asteroseismology)
   - 中子星(neutron star)、X射线天文学(X-ray astronomy)、引力波(gravitational wave)
   - 变星(variable star)、恒星物理(stellar physics)、脉冲星(pulsar)

   **优先领域B - 心理学与神经科学**（以下关键词平权）：
   - 元认知(metacognition)、fMRI、脑成像(brain imaging)
   - 认知神经科学(cognitive neuroscience)、工作记忆(working memory)
   - 注意力(attention)、决策(decision making)、意识(consciousness)
   - 成瘾(addiction)、奖赏系统(reward system)、多巴胺(dopamine)
   - 心理学(psychology)、神经科学(neuroscience)

   **筛选原则**：
   - 如果其他领域有重大科学发现，也应包含（归入C类）
   - **日期优先**：同等重要性下，优先选择日期更近的新闻（今天 > 昨天）";

fn weather_line(record: &WeatherRecord) -> String {
    let mut line = format!(
        "- {}：{}，当前{}，{}，{}",
        record.city,
        record.condition,
        record.current_temp,
        record.temperature_range(),
        record.wind
    );
    if !record.alerts.is_empty() {
        line.push_str("，预警：");
        line.push_str(&record.alerts.join("；"));
    }
    line
}

/// One numbered line per candidate: index, source, title, date, link.
fn news_lines(candidates: &[NewsItem]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "{}. [{}] {} ({}) {}",
                i + 1,
                item.source,
                item.title,
                item.date.format("%Y-%m-%d"),
                item.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the single combined prompt for `persona`.
pub fn build_prompt(persona: &str, weather: &[WeatherRecord], candidates: &[NewsItem]) -> String {
    let cities: Vec<&str> = weather.iter().map(|w| w.city.as_str()).collect();
    let city_list = cities.join("和");
    let weather_block = weather.iter().map(weather_line).collect::<Vec<_>>().join("\n");
    let advice_shape = cities
        .iter()
        .map(|c| format!("\"{c}\": \"{c}穿衣建议...\""))
        .collect::<Vec<_>>()
        .join(", ");

    let (selection_task, news_block) = if candidates.is_empty() {
        (
            "3. **新闻筛选**：今日没有可选的新闻，\"selected\" 请返回空数组 []，问候中也不要编造新闻。".to_string(),
            "（今日无新闻）".to_string(),
        )
    } else {
        (
            format!(
                "3. **新闻筛选**：从新闻列表中选出 {MIN_SELECTED}-{MAX_SELECTED} 条最重要的科学新闻（列表不足 {MIN_SELECTED} 条时全部保留），按重要性从高到低排列。\n{SELECTION_CRITERIA}\n\n\
                 4. **翻译与总结**：对每条选中的新闻，将标题准确、专业地翻译成中文，并用中文写一段简短总结，采用倒金字塔结构（先写最重要的发现或结论，再补充关键细节）。"
            ),
            news_lines(candidates),
        )
    };

    format!(
        "你是哈利波特世界中的{persona}。请完成以下任务（**请全程使用中文回答**）：

1. **角色问候**：以{persona}的第一人称口吻写一段开场白（100-150字）。
   - 总结今日天气（{city_list}）。
   - 简要提及今日科学界发生的有趣事情（根据新闻列表）。
   - 语气符合角色性格，清新自然。

2. **天气建议**：分别为{city_list}给出穿衣建议（2-3行），实用具体，包含穿衣和带伞/保暖提醒。

{selection_task}

输入数据：
【天气】
{weather_block}

【新闻列表】
{news_block}

请严格按照以下 JSON 格式返回（不要包含 Markdown 代码块标记）：
{{
    \"greeting\": \"角色开场白内容...\",
    \"weather_advice\": {{{advice_shape}}},
    \"selected\": [
        {{\"index\": 1, \"title_cn\": \"中文标题\", \"summary\": \"中文总结\", \"category\": \"A\"}}
    ]
}}
其中 index 是新闻列表中的编号；category 取 A（天体物理）、B（心理学与神经科学）或 C（其他）。
只能从上面的新闻列表中选择，不得编造列表之外的新闻。
"
    )
}
