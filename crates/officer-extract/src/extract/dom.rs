//! Label-anchored DOM scraping.
//!
//! Every field declares an ordered list of strategies, tried in order until
//! one yields a non-empty result. A strategy that finds nothing is a parse
//! miss: it is logged at debug level and the next one is tried; the field
//! ends up empty if none match.

use super::absolutize;
use crate::model::{non_empty, EntityDetail, SynergyEntry};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::debug;

/// How to find a single text value.
#[derive(Debug, Clone, Copy)]
pub enum TextStrategy {
    /// Element whose trimmed text equals the label; value is its next sibling element.
    Label(&'static str),
    /// First element matching the selector.
    Css(&'static str),
    /// First element matching the selector that has no ancestor matching the second.
    CssOutside(&'static str, &'static str),
}

/// How to find a repeated-item panel.
#[derive(Debug, Clone, Copy)]
pub enum ListStrategy {
    /// Items matching the item selector under the label's first sibling container.
    LabelItems(&'static str, &'static str),
    /// All elements matching the selector.
    Css(&'static str),
}

/// How to find an attribute value (images).
#[derive(Debug, Clone, Copy)]
pub struct AttrStrategy(pub &'static str, pub &'static str);

pub const NAME: &[TextStrategy] = &[TextStrategy::Css("h1"), TextStrategy::Css(".officer-name")];
pub const CLASS: &[TextStrategy] = &[TextStrategy::Label("Class"), TextStrategy::Css(".officer-class")];
pub const RARITY: &[TextStrategy] = &[
    TextStrategy::Label("Rarity"),
    TextStrategy::Css(".officer-card__rarity"),
    TextStrategy::Css(".rarity"),
];
pub const GROUP: &[TextStrategy] = &[
    TextStrategy::Label("Group"),
    TextStrategy::Label("Crew"),
    TextStrategy::Css(".officer-card__group"),
    TextStrategy::Css(".officer-group"),
    TextStrategy::CssOutside(".group", ".synergy"),
];
pub const CAPTAIN_ABILITY: &[TextStrategy] = &[
    TextStrategy::Label("Captain Maneuver"),
    TextStrategy::Label("Captain Ability"),
    TextStrategy::Css("#captain-ability .ability-description"),
    TextStrategy::Css(".ability--captain .ability__description"),
];
pub const OFFICER_ABILITY: &[TextStrategy] = &[
    TextStrategy::Label("Officer Ability"),
    TextStrategy::Css("#officer-ability .ability-description"),
    TextStrategy::Css(".ability--officer .ability__description"),
];
pub const TRAITS: &[ListStrategy] = &[
    ListStrategy::LabelItems("Traits", "li"),
    ListStrategy::Css(".traits__item"),
    ListStrategy::Css(".traits .trait"),
];
pub const SYNERGY: &[ListStrategy] = &[
    ListStrategy::LabelItems("Synergy", "li"),
    ListStrategy::Css(".synergy .synergy-item"),
];
pub const STATS: &[ListStrategy] = &[
    ListStrategy::LabelItems("Stats", "li, tr"),
    ListStrategy::Css(".stats__item"),
];
/// Fixed stat cells, read when no stats panel lists its rows.
pub const NAMED_STATS: &[(&str, &str)] = &[
    ("attack", ".stats .attack .value"),
    ("defense", ".stats .defense .value"),
    ("health", ".stats .health .value"),
];
pub const PORTRAIT: &[AttrStrategy] = &[
    AttrStrategy(".officer-portrait img", "src"),
    AttrStrategy("img.portrait", "src"),
    AttrStrategy("meta[property=\"og:image\"]", "content"),
];

/// Scrape all detail fields from rendered markup.
pub fn scrape_detail(html: &str, page_url: &str) -> EntityDetail {
    let doc = Html::parse_document(html);

    EntityDetail {
        name: non_empty(first_text(&doc, "name", NAME)),
        class_name: first_text(&doc, "class", CLASS),
        rarity: first_text(&doc, "rarity", RARITY),
        group: first_text(&doc, "group", GROUP),
        captain_ability: first_text(&doc, "captainAbility", CAPTAIN_ABILITY),
        officer_ability: first_text(&doc, "officerAbility", OFFICER_ABILITY),
        traits: first_items(&doc, "traits", TRAITS)
            .into_iter()
            .filter_map(|el| non_empty(element_text(el)))
            .collect(),
        stats: stats(&doc),
        synergy: first_items(&doc, "synergy", SYNERGY)
            .into_iter()
            .filter_map(synergy_entry)
            .collect(),
        portrait: first_attr(&doc, PORTRAIT).map(|src| absolutize(&src, page_url)),
    }
}

/// Trimmed text content of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// The deepest element whose trimmed text equals `label` exactly.
pub fn find_label<'a>(doc: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    let all = selector("body *")?;
    doc.select(&all).find(|el| {
        element_text(*el) == label
            && !el
                .children()
                .filter_map(ElementRef::wrap)
                .any(|child| element_text(child) == label)
    })
}

/// First sibling element after the label element.
pub fn label_sibling<'a>(doc: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    find_label(doc, label)?
        .next_siblings()
        .find_map(ElementRef::wrap)
}

/// Evaluate text strategies in order; empty string when none match.
pub fn first_text(doc: &Html, field: &str, strategies: &[TextStrategy]) -> String {
    for strategy in strategies {
        let value = match *strategy {
            TextStrategy::Label(label) => label_sibling(doc, label).map(element_text),
            TextStrategy::Css(css) => selector(css)
                .and_then(|sel| doc.select(&sel).next())
                .map(element_text),
            TextStrategy::CssOutside(css, outside) => match (selector(css), selector(outside)) {
                (Some(sel), Some(outer)) => doc
                    .select(&sel)
                    .find(|el| {
                        !el.ancestors()
                            .filter_map(ElementRef::wrap)
                            .any(|a| outer.matches(&a))
                    })
                    .map(element_text),
                _ => None,
            },
        };
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            return v;
        }
    }
    debug!(field, "no strategy matched");
    String::new()
}

/// Evaluate list strategies in order; empty list when none match.
pub fn first_items<'a>(doc: &'a Html, field: &str, strategies: &[ListStrategy]) -> Vec<ElementRef<'a>> {
    for strategy in strategies {
        let items: Vec<ElementRef<'a>> = match *strategy {
            ListStrategy::LabelItems(label, item) => {
                match (label_sibling(doc, label), selector(item)) {
                    (Some(container), Some(sel)) => container.select(&sel).collect(),
                    _ => Vec::new(),
                }
            }
            ListStrategy::Css(css) => match selector(css) {
                Some(sel) => doc.select(&sel).collect(),
                None => Vec::new(),
            },
        };
        if !items.is_empty() {
            return items;
        }
    }
    debug!(field, "no strategy matched");
    Vec::new()
}

fn first_attr(doc: &Html, strategies: &[AttrStrategy]) -> Option<String> {
    strategies.iter().find_map(|AttrStrategy(css, attr)| {
        let sel = selector(css)?;
        doc.select(&sel)
            .find_map(|el| el.value().attr(attr))
            .and_then(|v| non_empty(v.to_string()))
    })
}

fn child_elements(el: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    el.children().filter_map(ElementRef::wrap).collect()
}

/// Text of the first descendant matching `css`.
fn sub_text(el: ElementRef<'_>, css: &str) -> Option<String> {
    let sel = selector(css)?;
    el.select(&sel).next().map(element_text).and_then(non_empty)
}

fn stats(doc: &Html) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for row in first_items(doc, "stats", STATS) {
        let pair = match (sub_text(row, ".stats__label"), sub_text(row, ".stats__value")) {
            (Some(label), Some(value)) => Some((label, value)),
            _ => {
                let cells = child_elements(row);
                match (cells.first(), cells.last()) {
                    (Some(first), Some(last)) if cells.len() >= 2 => {
                        non_empty(element_text(*first)).zip(non_empty(element_text(*last)))
                    }
                    _ => None,
                }
            }
        };
        if let Some((label, value)) = pair {
            out.insert(label, value);
        }
    }
    if out.is_empty() {
        for (name, css) in NAMED_STATS {
            let value = selector(css)
                .and_then(|sel| doc.select(&sel).next())
                .and_then(|el| non_empty(element_text(el)));
            if let Some(value) = value {
                out.insert(name.to_string(), value);
            }
        }
    }
    out
}

fn synergy_entry(item: ElementRef<'_>) -> Option<SynergyEntry> {
    let (group, value) = match (sub_text(item, ".group"), sub_text(item, ".value")) {
        (Some(g), Some(v)) => (g, v),
        (g, v) => {
            let cells = child_elements(item);
            let group = g.or_else(|| cells.first().map(|c| element_text(*c)));
            let value = v.or_else(|| cells.get(1).map(|c| element_text(*c)));
            (group.unwrap_or_default(), value.unwrap_or_default())
        }
    };
    if group.is_empty() && value.is_empty() {
        None
    } else {
        Some(SynergyEntry { group, value })
    }
}
