//! Direct field mapping from JSON payloads.
//!
//! Each canonical field has an ordered alias list; the first key present
//! with a usable value wins. Missing keys produce empty values.

use super::absolutize;
use crate::model::{non_empty, EntityDetail, SynergyEntry};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Envelope keys that wrap the actual entity.
const ENVELOPES: &[&str] = &["data", "officer", "result", "item"];

const NAME_KEYS: &[&str] = &["name", "title", "displayName"];
const CLASS_KEYS: &[&str] = &["class", "officerClass", "officer_class", "className"];
const RARITY_KEYS: &[&str] = &["rarity", "rarityName"];
const GROUP_KEYS: &[&str] = &["group", "crew", "faction", "groupName"];
const CAPTAIN_KEYS: &[&str] = &["captainAbility", "captain_ability", "captainManeuver", "captain_maneuver"];
const OFFICER_KEYS: &[&str] = &["officerAbility", "officer_ability"];
const TRAITS_KEYS: &[&str] = &["traits", "tags"];
const STATS_KEYS: &[&str] = &["stats", "attributes"];
const SYNERGY_KEYS: &[&str] = &["synergy", "synergies"];
const PORTRAIT_KEYS: &[&str] = &["portrait", "image", "img", "imageUrl", "avatar"];

/// Keys that identify which entity a payload object describes.
const IDENTITY_KEYS: &[&str] = &["id", "slug", "officerId", "officer_id"];

/// Map a payload onto an `EntityDetail`. Relative portraits resolve against `page_url`.
///
/// `identity` lists the values the entity may be known by (stub id, path
/// segment). A payload object carrying an id that matches none of them is
/// rejected, as is a multi-entity array without a matching element. An empty
/// `identity` accepts objects and single-element arrays unchecked.
pub fn map_detail(payload: &Value, page_url: &str, identity: &[&str]) -> Option<EntityDetail> {
    let obj = select_entity(payload, identity)?;

    Some(EntityDetail {
        name: first(obj, NAME_KEYS).and_then(text).and_then(non_empty),
        class_name: first_text(obj, CLASS_KEYS),
        rarity: first_text(obj, RARITY_KEYS),
        group: first_text(obj, GROUP_KEYS),
        captain_ability: first(obj, CAPTAIN_KEYS).map(ability).unwrap_or_default(),
        officer_ability: first(obj, OFFICER_KEYS).map(ability).unwrap_or_default(),
        traits: first(obj, TRAITS_KEYS).map(traits).unwrap_or_default(),
        stats: first(obj, STATS_KEYS).map(stats).unwrap_or_default(),
        synergy: first(obj, SYNERGY_KEYS).map(synergy).unwrap_or_default(),
        portrait: first(obj, PORTRAIT_KEYS)
            .and_then(text)
            .and_then(non_empty)
            .map(|p| absolutize(&p, page_url)),
    })
}

/// Descend through known envelopes to the object describing the entity.
fn select_entity<'a>(payload: &'a Value, identity: &[&str]) -> Option<&'a Map<String, Value>> {
    match payload {
        Value::Array(items) => match items.as_slice() {
            [only] => select_entity(only, identity),
            // list endpoints: only an element naming this entity will do
            _ if identity.is_empty() => None,
            _ => items
                .iter()
                .filter_map(Value::as_object)
                .find(|obj| identifies(obj, identity) == Some(true)),
        },
        Value::Object(obj) => {
            if has_any(obj, NAME_KEYS) || has_any(obj, RARITY_KEYS) {
                return accepts(obj, identity).then_some(obj);
            }
            let inner = ENVELOPES
                .iter()
                .find_map(|k| obj.get(*k).filter(|v| v.is_object() || v.is_array()));
            match inner {
                Some(inner) => select_entity(inner, identity),
                None => accepts(obj, identity).then_some(obj),
            }
        }
        _ => None,
    }
}

/// `Some(true)` when an identity key matches, `None` when the object has none.
fn identifies(obj: &Map<String, Value>, identity: &[&str]) -> Option<bool> {
    let ids: Vec<String> = IDENTITY_KEYS
        .iter()
        .filter_map(|k| obj.get(*k).and_then(text))
        .map(|s| s.trim().to_string())
        .collect();
    if ids.is_empty() {
        return None;
    }
    Some(
        ids.iter()
            .any(|id| identity.iter().any(|want| id.eq_ignore_ascii_case(want.trim()))),
    )
}

fn accepts(obj: &Map<String, Value>, identity: &[&str]) -> bool {
    identity.is_empty() || identifies(obj, identity) != Some(false)
}

fn has_any(obj: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|k| obj.contains_key(*k))
}

fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> String {
    first(obj, keys)
        .and_then(text)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Scalar to string; objects contribute their `name`.
fn text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(o) => o.get("name").and_then(text),
        _ => None,
    }
}

/// Abilities come as plain strings or `{name, description}` objects.
fn ability(v: &Value) -> String {
    let s = match v {
        Value::Object(o) => o
            .get("description")
            .or_else(|| o.get("text"))
            .or_else(|| o.get("name"))
            .and_then(text),
        other => text(other),
    };
    s.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn traits(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items
            .iter()
            .filter_map(text)
            .filter_map(non_empty)
            .collect(),
        Value::String(s) => s
            .split(',')
            .filter_map(|t| non_empty(t.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

fn stats(v: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    match v {
        Value::Object(o) => {
            for (k, v) in o {
                if let Some(value) = text(v).and_then(non_empty) {
                    out.insert(k.trim().to_string(), value);
                }
            }
        }
        // [{name, value}] rows
        Value::Array(rows) => {
            for row in rows {
                let name = row.get("name").or_else(|| row.get("label")).and_then(text);
                let value = row.get("value").and_then(text);
                if let (Some(name), Some(value)) = (name.and_then(non_empty), value.and_then(non_empty)) {
                    out.insert(name, value);
                }
            }
        }
        _ => {}
    }
    out
}

fn synergy(v: &Value) -> Vec<SynergyEntry> {
    let Value::Array(rows) = v else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| {
            let obj = row.as_object()?;
            let group = first_text(obj, GROUP_KEYS);
            let value = first_text(obj, &["value", "bonus", "amount"]);
            if group.is_empty() && value.is_empty() {
                None
            } else {
                Some(SynergyEntry { group, value })
            }
        })
        .collect()
}
