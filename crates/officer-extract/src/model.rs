//! Canonical record schema shared by every stage.
//!
//! Source variants disagree on field names (`img` vs `image` vs `portrait`,
//! `crew` vs `group`). Those variants are folded into these types at the
//! extraction boundary and never travel further.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimal catalog entry discovered during list crawling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStub {
    pub id: String,
    /// Relative path or absolute URL of the detail page.
    #[serde(alias = "url", alias = "link", alias = "href")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// List-card hints; detail extraction replaces them when it finds values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portrait: Option<String>,
}

impl EntryStub {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            name: None,
            rarity: None,
            group: None,
            portrait: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = non_empty(name.into());
        self
    }
}

/// One synergy bonus row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynergyEntry {
    pub group: String,
    pub value: String,
}

/// Fields scraped from a single detail page or payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityDetail {
    pub name: Option<String>,
    pub class_name: String,
    pub rarity: String,
    pub group: String,
    pub captain_ability: String,
    pub officer_ability: String,
    pub traits: Vec<String>,
    pub stats: BTreeMap<String, String>,
    pub synergy: Vec<SynergyEntry>,
    pub portrait: Option<String>,
}

/// A stub merged with its detail, ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub path: String,
    pub name: Option<String>,
    #[serde(rename = "class")]
    pub class_name: String,
    pub rarity: String,
    pub group: String,
    pub captain_ability: String,
    pub officer_ability: String,
    pub traits: Vec<String>,
    pub stats: BTreeMap<String, String>,
    pub synergy: Vec<SynergyEntry>,
    pub portrait: Option<String>,
    /// Absolute locator the detail was extracted from.
    pub source: String,
    pub extracted_at: String,
}

impl Record {
    /// Merge a stub with its detail.
    ///
    /// Detail wins whenever it supplies a non-empty value; otherwise the
    /// stub's value survives. `id` and `path` always come from the stub.
    pub fn merge(
        stub: EntryStub,
        detail: EntityDetail,
        source: impl Into<String>,
        extracted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: stub.id,
            path: stub.path,
            name: prefer(detail.name, stub.name),
            class_name: detail.class_name,
            rarity: prefer_text(detail.rarity, stub.rarity),
            group: prefer_text(detail.group, stub.group),
            captain_ability: detail.captain_ability,
            officer_ability: detail.officer_ability,
            traits: detail.traits,
            stats: detail.stats,
            synergy: detail.synergy,
            portrait: prefer(detail.portrait, stub.portrait),
            source: source.into(),
            extracted_at: format_timestamp(extracted_at),
        }
    }
}

/// The complete output of one run, in stub discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Base origin the run was pointed at.
    pub source: String,
    pub last_run: String,
    pub count: usize,
    pub officers: Vec<Record>,
}

impl Dataset {
    pub fn new(source: impl Into<String>, last_run: DateTime<Utc>, officers: Vec<Record>) -> Self {
        Self {
            source: source.into(),
            last_run: format_timestamp(last_run),
            count: officers.len(),
            officers,
        }
    }
}

/// RFC 3339 with millisecond precision, always UTC.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `Some(trimmed)` unless the string is blank.
pub fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_string())
    }
}

fn prefer(detail: Option<String>, stub: Option<String>) -> Option<String> {
    detail.and_then(non_empty).or_else(|| stub.and_then(non_empty))
}

fn prefer_text(detail: String, stub: Option<String>) -> String {
    prefer(Some(detail), stub).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_null_detail_name_keeps_stub_name() {
        let stub = EntryStub::new("42", "/o/42").with_name("Kirk");
        let detail = EntityDetail {
            rarity: "Epic".into(),
            name: None,
            ..Default::default()
        };

        let record = Record::merge(stub, detail, "https://x.test/o/42", fixed_clock());

        assert_eq!(record.id, "42");
        assert_eq!(record.path, "/o/42");
        assert_eq!(record.name.as_deref(), Some("Kirk"));
        assert_eq!(record.rarity, "Epic");
    }

    #[test]
    fn test_detail_wins_when_non_empty() {
        let mut stub = EntryStub::new("7", "/o/7").with_name("Spock");
        stub.rarity = Some("Rare".into());
        stub.group = Some("Original Series".into());
        let detail = EntityDetail {
            name: Some("  Spock Prime ".into()),
            rarity: "Epic".into(),
            group: "   ".into(),
            ..Default::default()
        };

        let record = Record::merge(stub, detail, "src", fixed_clock());

        assert_eq!(record.name.as_deref(), Some("Spock Prime"));
        assert_eq!(record.rarity, "Epic");
        // blank detail value does not overwrite the list-card hint
        assert_eq!(record.group, "Original Series");
    }

    #[test]
    fn test_stub_portrait_survives_missing_detail_portrait() {
        let mut stub = EntryStub::new("9", "/o/9");
        stub.portrait = Some("https://x.test/img/9.png".into());

        let record = Record::merge(stub, EntityDetail::default(), "src", fixed_clock());

        assert_eq!(record.portrait.as_deref(), Some("https://x.test/img/9.png"));
        assert_eq!(record.extracted_at, "2026-01-02T03:04:05.000Z");
    }

    #[test]
    fn test_stub_accepts_locator_aliases() {
        let stubs: Vec<EntryStub> = serde_json::from_str(
            r#"[{"id":"1","url":"https://x.test/o/1"},{"id":"2","href":"/o/2"},{"id":"3","path":"/o/3","name":"Uhura"}]"#,
        )
        .unwrap();

        assert_eq!(stubs[0].path, "https://x.test/o/1");
        assert_eq!(stubs[1].path, "/o/2");
        assert_eq!(stubs[2].name.as_deref(), Some("Uhura"));
    }

    #[test]
    fn test_record_serializes_canonical_keys() {
        let record = Record::merge(EntryStub::new("1", "/o/1"), EntityDetail::default(), "s", fixed_clock());
        let value = serde_json::to_value(&record).unwrap();

        assert!(value.get("class").is_some());
        assert!(value.get("captainAbility").is_some());
        assert!(value.get("extractedAt").is_some());
        assert!(value.get("class_name").is_none());
    }
}
