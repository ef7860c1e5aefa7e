use crate::models::{UNKNOWN_FIELD, UNKNOWN_NAME};
use crate::scrapers::types::ListingDetails;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};
use tracing::debug;

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\d[\d,]*").unwrap());
static SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,]* ?sqft").unwrap());

/// Elements whose text is code or markup, not page copy
const SKIPPED_PARENTS: [&str; 3] = ["script", "style", "noscript"];

/// Extract name, price and size from a listing page.
///
/// Every field is independent: a miss on one never affects the others.
pub fn parse_listing(document: &Html, title_suffix: &str) -> ListingDetails {
    let name = parse_name(document, title_suffix);

    let price = first_text_node(document, |parent, text| {
        parent == "span" && PRICE.is_match(text)
    })
    .unwrap_or_else(|| {
        debug!("No price found on page");
        UNKNOWN_FIELD.to_string()
    });

    let size = first_text_node(document, |_, text| SIZE.is_match(text)).unwrap_or_else(|| {
        debug!("No size found on page");
        UNKNOWN_FIELD.to_string()
    });

    ListingDetails { name, price, size }
}

fn parse_name(document: &Html, title_suffix: &str) -> String {
    let title = document
        .select(&TITLE)
        .next()
        .map(|el| el.text().collect::<String>())
        .filter(|t| !t.trim().is_empty());

    match title {
        Some(title) => title.replace(title_suffix, "").trim().to_string(),
        None => {
            debug!("Page has no title");
            UNKNOWN_NAME.to_string()
        }
    }
}

/// First text node, in document order, accepted by `matches(parent_tag, text)`.
/// Returns the whole node text, trimmed.
fn first_text_node<F>(document: &Html, matches: F) -> Option<String>
where
    F: Fn(&str, &str) -> bool,
{
    document.tree.root().descendants().find_map(|node| {
        let text = match node.value() {
            Node::Text(text) => &**text,
            _ => return None,
        };
        let parent = node
            .parent()
            .and_then(|p| p.value().as_element().map(|el| el.name()))
            .unwrap_or("");

        if SKIPPED_PARENTS.contains(&parent) || !matches(parent, text) {
            return None;
        }
        Some(text.trim().to_string())
    })
}
