//! Postal address recovery from a listing page.
//!
//! Listing markup changes between templates and over time, so the address is
//! recovered by trying strategies from most to least structured. The first
//! strategy that yields a non-empty string wins.

use crate::models::UNKNOWN_NAME;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static META_STREET: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:street-address"]"#));
static META_LOCALITY: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:locality"]"#));
static META_REGION: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:region"]"#));
static META_POSTAL: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:postal-code"]"#));
static SUMMARY_WIDGET: Lazy<Selector> =
    Lazy::new(|| selector(r#"[data-testid="home-details-summary-address"]"#));
static LEGACY_HEADING: Lazy<Selector> = Lazy::new(|| selector("h1#ds-chip-property-address"));
static HEADINGS: Lazy<Selector> = Lazy::new(|| selector("h1[class], h2[class]"));
static POSTAL_ADDRESS: Lazy<Selector> = Lazy::new(|| selector("address"));
static ADDRESS_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)address").unwrap());

/// One way of recovering an address. Order in [`CASCADE`] is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressStrategy {
    /// Street, locality, region and postal code meta tags, all four required
    StructuredMeta,
    /// The property header summary widget, text taken as-is
    SummaryWidget,
    /// Older heading-level version of the summary widget
    LegacyHeading,
    /// A heading whose class mentions "address", whitespace collapsed
    AddressClassHeading,
    /// The generic `<address>` element, whitespace collapsed
    PostalAddressElement,
    /// First three words of the listing name plus its last word (the ZIP)
    TitleDerived,
}

pub const CASCADE: [AddressStrategy; 6] = [
    AddressStrategy::StructuredMeta,
    AddressStrategy::SummaryWidget,
    AddressStrategy::LegacyHeading,
    AddressStrategy::AddressClassHeading,
    AddressStrategy::PostalAddressElement,
    AddressStrategy::TitleDerived,
];

impl AddressStrategy {
    pub fn apply(&self, document: &Html, name: &str) -> Option<String> {
        let found = match self {
            AddressStrategy::StructuredMeta => structured_meta(document),
            AddressStrategy::SummaryWidget => first_text(document, &SUMMARY_WIDGET),
            AddressStrategy::LegacyHeading => first_text(document, &LEGACY_HEADING),
            AddressStrategy::AddressClassHeading => document
                .select(&HEADINGS)
                .find(|el| {
                    el.value()
                        .attr("class")
                        .is_some_and(|class| ADDRESS_CLASS.is_match(class))
                })
                .map(joined_text),
            AddressStrategy::PostalAddressElement => {
                document.select(&POSTAL_ADDRESS).next().map(joined_text)
            }
            AddressStrategy::TitleDerived => derive_from_name(name),
        };
        found.filter(|address| !address.trim().is_empty())
    }
}

/// Run the cascade; `None` when every strategy misses
pub fn resolve_address(document: &Html, name: &str) -> Option<String> {
    for strategy in CASCADE {
        if let Some(address) = strategy.apply(document, name) {
            debug!("Address resolved by {:?}: {}", strategy, address);
            return Some(address);
        }
    }
    warn!("No address found for '{}'", name);
    None
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

fn structured_meta(document: &Html) -> Option<String> {
    let street = meta_content(document, &META_STREET)?;
    let locality = meta_content(document, &META_LOCALITY)?;
    let region = meta_content(document, &META_REGION)?;
    let postal = meta_content(document, &META_POSTAL)?;
    Some(format!("{street}, {locality}, {region} {postal}"))
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

fn joined_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// "123 Main St, Springfield, IL 62704 | MLS #1" -> "123 Main St 62704".
/// Skipped when the page had no title to derive from.
pub fn derive_from_name(name: &str) -> Option<String> {
    if name == UNKNOWN_NAME {
        return None;
    }
    let head = name.split('|').next().unwrap_or("").replace(',', "");
    let words: Vec<&str> = head.split_whitespace().collect();
    let zip = words.last()?;
    let street = words.iter().take(3).copied().collect::<Vec<_>>().join(" ");
    Some(format!("{street} {zip}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "123 Main St, Springfield, IL 62704";

    fn resolve(body: &str) -> Option<String> {
        let html = format!("<html><head>{body}</head><body>{body}</body></html>");
        resolve_address(&Html::parse_document(&html), NAME)
    }

    fn meta(property: &str, content: &str) -> String {
        format!(r#"<meta property="{property}" content="{content}">"#)
    }

    #[test]
    fn structured_meta_wins_when_complete() {
        let page = Html::parse_document(&format!(
            "<html><head>{}{}{}{}</head><body><address>elsewhere</address></body></html>",
            meta("og:street-address", "1600 Pennsylvania Ave NW"),
            meta("og:locality", "Washington"),
            meta("og:region", "DC"),
            meta("og:postal-code", "20500"),
        ));
        assert_eq!(
            resolve_address(&page, NAME).as_deref(),
            Some("1600 Pennsylvania Ave NW, Washington, DC 20500")
        );
    }

    #[test]
    fn partial_meta_falls_through_to_next_strategy() {
        let page = Html::parse_document(&format!(
            r#"<html><head>{}{}{}</head><body>
               <div data-testid="home-details-summary-address">742 Evergreen Terrace, Springfield</div>
               </body></html>"#,
            meta("og:street-address", "1600 Pennsylvania Ave NW"),
            meta("og:locality", "Washington"),
            meta("og:region", "DC"),
        ));
        assert_eq!(AddressStrategy::StructuredMeta.apply(&page, NAME), None);
        assert_eq!(
            resolve_address(&page, NAME).as_deref(),
            Some("742 Evergreen Terrace, Springfield")
        );
    }

    #[test]
    fn legacy_heading_is_used_before_class_headings() {
        let found = resolve(
            r#"<h1 class="street-address">9 Elm Rd</h1><h1 id="ds-chip-property-address">10 Oak Ave</h1>"#,
        );
        assert_eq!(found.as_deref(), Some("10 Oak Ave"));
    }

    #[test]
    fn class_heading_text_is_whitespace_joined() {
        let found = resolve(
            "<h2 class=\"Text-c11n AddressHeader\">\n  55 Pine Ln,\n  <span>Denver,   CO 80203</span></h2>",
        );
        assert_eq!(found.as_deref(), Some("55 Pine Ln, Denver, CO 80203"));
    }

    #[test]
    fn postal_address_element_is_whitespace_joined() {
        let found = resolve("<address>\n  8 Birch Ct\n  Austin, TX 78701\n</address>");
        assert_eq!(found.as_deref(), Some("8 Birch Ct Austin, TX 78701"));
    }

    #[test]
    fn empty_elements_do_not_win() {
        let found = resolve(r#"<div data-testid="home-details-summary-address">   </div>"#);
        assert_eq!(found.as_deref(), Some("123 Main St 62704"));
    }

    #[test]
    fn name_fallback_keeps_street_and_zip() {
        assert_eq!(
            derive_from_name("123 Main St, Springfield, IL 62704 | MLS #A123").as_deref(),
            Some("123 Main St 62704")
        );
        assert_eq!(derive_from_name("Loft").as_deref(), Some("Loft Loft"));
        assert_eq!(derive_from_name("  |  "), None);
        assert_eq!(derive_from_name(UNKNOWN_NAME), None);
    }

    #[test]
    fn every_strategy_missing_yields_none() {
        let page = Html::parse_document("<html><body><p>no address</p></body></html>");
        assert_eq!(resolve_address(&page, UNKNOWN_NAME), None);
    }
}
