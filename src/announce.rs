use crate::error::Result;
use crate::history::{HistoryStore, Storage};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Reverse;
use log::debug;
use serde::{Deserialize, Serialize};

pub const LAST_ENTRY_URL_KEY: &str = "lastEntryUrl";

const MOON_EMOJIS: [&str; 8] = [
    ":new_moon:",
    ":waxing_crescent_moon:",
    ":first_quarter_moon:",
    ":waxing_gibbous_moon:",
    ":full_moon:",
    ":waning_gibbous_moon:",
    ":last_quarter_moon:",
    ":waning_crescent_moon:",
];

/// Slack emoji for an AccuWeather icon id.
pub fn weather_emoji(weather_id: i32) -> Option<&'static str> {
    let emoji = match weather_id {
        1 | 2 | 30 | 31 | 32 => ":sunny:",
        3 => ":mostly_sunny:",
        4 => ":partly_sunny:",
        5 | 11 => ":fog:",
        6 | 20 | 21 => ":barely_sunny:",
        7 | 8 | 19 => ":cloud:",
        12 | 13 | 18 | 25 | 26 | 29 => ":umbrella_with_rain_drops:",
        14 => ":partly_sunny_rain:",
        15..=17 => ":thunder_cloud_and_rain:",
        22 | 23 => ":snowman:",
        24 => ":ice_skate:",
        _ => return None,
    };
    Some(emoji)
}

/// Emoji for a lunar phase in `[0, 1)`, 0 being new moon.
pub fn moon_emoji(phase: f64) -> &'static str {
    let index = (phase * 8.0).round().rem_euclid(8.0) as usize;
    MOON_EMOJIS[index % MOON_EMOJIS.len()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Publication time as listed, e.g. `2024年3月1日 10:00`
    #[serde(default)]
    pub date: Option<String>,
}

impl Article {
    /// Parses the listed `年月日` date; the time part is optional.
    pub fn published(&self) -> Option<NaiveDateTime> {
        let date = self.date.as_deref()?;
        let mut parts = date.split(['年', '月', '日']).map(str::trim);
        let year = parts.next()?.parse().ok()?;
        let month = parts.next()?.parse().ok()?;
        let day = parts.next()?.parse().ok()?;
        let time = match parts.next() {
            Some(time) if !time.is_empty() => NaiveTime::parse_from_str(time, "%H:%M").ok()?,
            _ => NaiveTime::from_hms_opt(0, 0, 0)?,
        };
        Some(NaiveDate::from_ymd_opt(year, month, day)?.and_time(time))
    }
}

/// Recent article listings per source.
///
/// tayori and tenkijp are taken newest first as given. saijiki is a flat list
/// across categories and is ordered by [`Article::published`], newest first,
/// before picking; undated articles go last in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleFeeds {
    #[serde(default)]
    pub tayori: Vec<Article>,
    #[serde(default)]
    pub saijiki: Vec<Article>,
    #[serde(default)]
    pub tenkijp: Vec<Article>,
}

/// Newest link already announced, per source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastEntryUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tayori: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saijiki: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenkijp: Option<String>,
}

/// An article to announce alongside the weather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub title: String,
    pub link: String,
}

/// Chooses at most one unannounced article.
///
/// Sources are tried in order tayori, saijiki, tenkijp; a source qualifies
/// when its newest link differs from the one last announced for it. Returns
/// the entry and the updated record of announced links.
pub fn pick_new_entry(feeds: &ArticleFeeds, seen: &LastEntryUrls) -> Option<(Entry, LastEntryUrls)> {
    let fresh = |articles: &[Article], last: &Option<String>| {
        articles
            .first()
            .filter(|article| last.as_deref() != Some(article.link.as_str()))
            .cloned()
    };

    let mut updated = seen.clone();
    if let Some(article) = fresh(feeds.tayori.as_slice(), &seen.tayori) {
        updated.tayori = Some(article.link.clone());
        return Some((
            Entry {
                title: article.title,
                link: article.link,
            },
            updated,
        ));
    }
    let mut saijiki = feeds.saijiki.clone();
    saijiki.sort_by_key(|article| Reverse(article.published()));
    if let Some(article) = fresh(saijiki.as_slice(), &seen.saijiki) {
        updated.saijiki = Some(article.link.clone());
        let title = match &article.category {
            Some(category) => format!("{}「{}」", category, article.title),
            None => article.title.clone(),
        };
        return Some((
            Entry {
                title,
                link: article.link,
            },
            updated,
        ));
    }
    if let Some(article) = fresh(feeds.tenkijp.as_slice(), &seen.tenkijp) {
        updated.tenkijp = Some(article.link.clone());
        return Some((
            Entry {
                title: article.title,
                link: article.link,
            },
            updated,
        ));
    }
    None
}

/// Picks an article with [`pick_new_entry`] and records it as announced.
pub fn announce_new_entry<S: Storage>(
    store: &mut HistoryStore<S>,
    feeds: &ArticleFeeds,
) -> Result<Option<Entry>> {
    let seen: LastEntryUrls = store.read(LAST_ENTRY_URL_KEY)?.unwrap_or_default();
    match pick_new_entry(feeds, &seen) {
        Some((entry, updated)) => {
            debug!("New article to announce: {}", entry.link);
            store.write(LAST_ENTRY_URL_KEY, &updated)?;
            Ok(Some(entry))
        }
        None => Ok(None),
    }
}

/// Sun and moon timings for the day, supplied by an astronomy source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Almanac {
    pub sunrise: DateTime<FixedOffset>,
    pub sunset: DateTime<FixedOffset>,
    pub moonrise: Option<DateTime<FixedOffset>>,
    pub moonset: Option<DateTime<FixedOffset>>,
    /// Lunar phase in `[0, 1)`
    pub moon_phase: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub color: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

/// Chat webhook body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

/// Poem of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Haiku {
    pub text: String,
    pub author: String,
}

/// Inputs for the morning message besides the chosen rule.
#[derive(Debug, Clone, Default)]
pub struct Announcement {
    pub location_id: Option<String>,
    pub image_url: Option<String>,
    pub almanac: Option<Almanac>,
    pub haiku: Option<Haiku>,
    pub entry: Option<Entry>,
}

pub fn build_payload(rule_name: &str, weather_id: i32, announcement: &Announcement) -> MessagePayload {
    let emoji = weather_emoji(weather_id).unwrap_or("");
    let mut attachments = vec![Attachment {
        color: "#FFA726".to_string(),
        title: format!("本日の天気{}「{}」", emoji, rule_name),
        title_link: announcement.location_id.as_ref().map(|id| {
            format!(
                "https://www.accuweather.com/ja/jp/tokyo/{}/daily-weather-forecast/{}",
                id, id
            )
        }),
        text: None,
        image_url: announcement.image_url.clone(),
        fallback: Some(rule_name.to_string()),
        footer: None,
    }];

    if let Some(almanac) = &announcement.almanac {
        attachments.push(Attachment {
            color: "#1976D2".to_string(),
            title: "本日のこよみ".to_string(),
            title_link: None,
            text: Some(almanac_text(almanac)),
            image_url: None,
            fallback: None,
            footer: None,
        });
    }

    if let Some(haiku) = &announcement.haiku {
        attachments.push(Attachment {
            color: "#6D4C41".to_string(),
            title: "本日の一句".to_string(),
            title_link: Some("http://sendan.kaisya.co.jp/".to_string()),
            text: Some(haiku.text.clone()),
            image_url: None,
            fallback: None,
            footer: Some(haiku.author.clone()),
        });
    }

    if let Some(entry) = &announcement.entry {
        attachments.push(Attachment {
            color: "#4DB6AC".to_string(),
            title: entry.title.clone(),
            title_link: Some(entry.link.clone()),
            text: None,
            image_url: None,
            fallback: None,
            footer: None,
        });
    }

    MessagePayload {
        text: "あさ！".to_string(),
        attachments,
    }
}

fn almanac_text(almanac: &Almanac) -> String {
    let time = |t: Option<DateTime<FixedOffset>>| {
        t.map_or_else(|| "--:--".to_string(), |t| t.format("%H:%M").to_string())
    };
    format!(
        ":sunrise_over_mountains: *日の出* {} ～ *日の入* {}\n{} *月の出* {} ～ *月の入* {}",
        time(Some(almanac.sunrise)),
        time(Some(almanac.sunset)),
        moon_emoji(almanac.moon_phase),
        time(almanac.moonrise),
        time(almanac.moonset)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryStorage;

    fn article(title: &str, link: &str) -> Article {
        Article {
            title: title.to_string(),
            link: link.to_string(),
            category: None,
            date: None,
        }
    }

    fn feeds() -> ArticleFeeds {
        ArticleFeeds {
            tayori: vec![article("t1", "https://t/1"), article("t0", "https://t/0")],
            saijiki: vec![Article {
                category: Some("季語".to_string()),
                ..article("桜", "https://s/1")
            }],
            tenkijp: vec![article("k1", "https://k/1")],
        }
    }

    #[test]
    fn emoji_tables() {
        assert_eq!(weather_emoji(1), Some(":sunny:"));
        assert_eq!(weather_emoji(16), Some(":thunder_cloud_and_rain:"));
        assert_eq!(weather_emoji(24), Some(":ice_skate:"));
        assert_eq!(weather_emoji(9), None);
        assert_eq!(moon_emoji(0.0), ":new_moon:");
        assert_eq!(moon_emoji(0.5), ":full_moon:");
        assert_eq!(moon_emoji(0.97), ":new_moon:");
    }

    #[test]
    fn entries_rotate_through_sources() {
        let feeds = feeds();
        let (first, seen) = pick_new_entry(&feeds, &LastEntryUrls::default()).unwrap();
        assert_eq!(first.link, "https://t/1");

        let (second, seen) = pick_new_entry(&feeds, &seen).unwrap();
        assert_eq!(second.title, "季語「桜」");

        let (third, seen) = pick_new_entry(&feeds, &seen).unwrap();
        assert_eq!(third.link, "https://k/1");

        assert!(pick_new_entry(&feeds, &seen).is_none());
    }

    #[test]
    fn empty_feeds_are_skipped() {
        let feeds = ArticleFeeds {
            tenkijp: vec![article("k1", "https://k/1")],
            ..Default::default()
        };
        let (entry, _) = pick_new_entry(&feeds, &LastEntryUrls::default()).unwrap();
        assert_eq!(entry.link, "https://k/1");
    }

    #[test]
    fn announced_links_are_persisted() {
        let mut store = HistoryStore::open(MemoryStorage::default(), None);
        let feeds = feeds();
        let entry = announce_new_entry(&mut store, &feeds).unwrap().unwrap();
        assert_eq!(entry.link, "https://t/1");
        let seen: LastEntryUrls = store.read(LAST_ENTRY_URL_KEY).unwrap().unwrap();
        assert_eq!(seen.tayori.as_deref(), Some("https://t/1"));
        assert!(seen.saijiki.is_none());
    }

    #[test]
    fn payload_shape() {
        let announcement = Announcement {
            location_id: Some("226396".to_string()),
            image_url: Some("https://img/1.png".to_string()),
            almanac: None,
            haiku: None,
            entry: Some(Entry {
                title: "t1".to_string(),
                link: "https://t/1".to_string(),
            }),
        };
        let payload = build_payload("快晴", 1, &announcement);
        assert_eq!(payload.attachments.len(), 2);
        assert_eq!(payload.attachments[0].title, "本日の天気:sunny:「快晴」");
        assert_eq!(payload.attachments[0].fallback.as_deref(), Some("快晴"));
        assert_eq!(payload.attachments[1].title_link.as_deref(), Some("https://t/1"));

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["attachments"][1].get("image_url").is_none());
    }

    #[test]
    fn haiku_sits_between_almanac_and_article() {
        let almanac = Almanac {
            sunrise: DateTime::parse_from_rfc3339("2024-06-15T04:25:00+09:00").unwrap(),
            sunset: DateTime::parse_from_rfc3339("2024-06-15T19:00:00+09:00").unwrap(),
            moonrise: None,
            moonset: None,
            moon_phase: 0.0,
        };
        let announcement = Announcement {
            almanac: Some(almanac),
            haiku: Some(Haiku {
                text: "古池や蛙飛びこむ水の音".to_string(),
                author: "芭蕉".to_string(),
            }),
            entry: Some(Entry {
                title: "t1".to_string(),
                link: "https://t/1".to_string(),
            }),
            ..Default::default()
        };
        let payload = build_payload("快晴", 1, &announcement);
        let titles: Vec<_> = payload.attachments.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["本日の天気:sunny:「快晴」", "本日のこよみ", "本日の一句", "t1"]);

        let haiku = &payload.attachments[2];
        assert_eq!(haiku.color, "#6D4C41");
        assert_eq!(haiku.title_link.as_deref(), Some("http://sendan.kaisya.co.jp/"));
        assert_eq!(haiku.text.as_deref(), Some("古池や蛙飛びこむ水の音"));
        assert_eq!(haiku.footer.as_deref(), Some("芭蕉"));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["attachments"][2]["footer"], "芭蕉");
        assert!(json["attachments"][3].get("footer").is_none());
    }

    #[test]
    fn saijiki_newest_dated_article_wins() {
        let dated = |title: &str, link: &str, date: &str| Article {
            category: Some("季語".to_string()),
            date: Some(date.to_string()),
            ..article(title, link)
        };
        let feeds = ArticleFeeds {
            saijiki: vec![
                dated("梅", "https://s/ume", "2024年2月10日 09:00"),
                article("undated", "https://s/none"),
                dated("桜", "https://s/sakura", "2024年3月25日 08:30"),
                dated("桃", "https://s/momo", "2024年3月3日"),
            ],
            ..Default::default()
        };
        let (entry, seen) = pick_new_entry(&feeds, &LastEntryUrls::default()).unwrap();
        assert_eq!(entry.title, "季語「桜」");
        assert_eq!(seen.saijiki.as_deref(), Some("https://s/sakura"));
        assert!(pick_new_entry(&feeds, &seen).is_none());

        let published = feeds.saijiki[3].published().unwrap();
        assert_eq!(published.to_string(), "2024-03-03 00:00:00");
        assert!(feeds.saijiki[1].published().is_none());
    }

    #[test]
    fn almanac_attachment() {
        let almanac = Almanac {
            sunrise: DateTime::parse_from_rfc3339("2024-06-15T04:25:00+09:00").unwrap(),
            sunset: DateTime::parse_from_rfc3339("2024-06-15T19:00:00+09:00").unwrap(),
            moonrise: None,
            moonset: Some(DateTime::parse_from_rfc3339("2024-06-15T23:40:00+09:00").unwrap()),
            moon_phase: 0.25,
        };
        let payload = build_payload(
            "晴れ",
            3,
            &Announcement {
                almanac: Some(almanac),
                ..Default::default()
            },
        );
        let text = payload.attachments[1].text.as_deref().unwrap();
        assert!(text.contains("*日の出* 04:25"));
        assert!(text.contains(":first_quarter_moon: *月の出* --:-- ～ *月の入* 23:40"));
    }
}
