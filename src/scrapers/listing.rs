//! Listing (results) page parsing.

use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::models::{keys, WorkItem};

/// Items found on one results page plus the site's page count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub items: Vec<WorkItem>,
    pub total_pages: u32,
}

struct ListingSelectors {
    results: Selector,
    card: Selector,
    head: Selector,
    price: Selector,
    button: Selector,
}

impl ListingSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            results: Selector::parse("div.results").ok()?,
            card: Selector::parse("div.category__ct").ok()?,
            head: Selector::parse("div.category__head").ok()?,
            price: Selector::parse("div.category__txt > p").ok()?,
            button: Selector::parse("a.category__butt").ok()?,
        })
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve `href` against the page it was found on. Unparseable bases
/// leave `href` untouched.
pub fn resolve_url(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}

impl ListingPage {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let Some(sel) = ListingSelectors::new() else {
            return Self::default();
        };

        let Some(results) = document.select(&sel.results).next() else {
            warn!("Listing page has no results container");
            return Self {
                items: Vec::new(),
                total_pages: 1,
            };
        };

        let total_pages = results
            .value()
            .attr("data-num-pages")
            .and_then(|n| n.trim().parse::<u32>().ok())
            .unwrap_or(1)
            .max(1);

        let mut items = Vec::new();
        for (index, card) in results.select(&sel.card).enumerate() {
            let desc = card.select(&sel.head).next().map(text_of);
            let price = card.select(&sel.price).next().map(text_of);
            let button = card.select(&sel.button).next();
            let link = button.and_then(|b| b.value().attr("href")).map(|h| h.trim().to_string());
            let date = button
                .map(text_of)
                .and_then(|t| t.split_whitespace().last().map(str::to_string));

            let fields: Vec<(&str, String)> = [
                (keys::DESC, desc),
                (keys::PRICE, price),
                (keys::LINK, link),
                (keys::DATE, date),
            ]
            .into_iter()
            .filter_map(|(key, value)| value.filter(|v| !v.is_empty()).map(|v| (key, v)))
            .collect();

            if fields.is_empty() {
                warn!("Skipping empty listing card #{}", index + 1);
                continue;
            }
            if !fields.iter().any(|(key, _)| *key == keys::LINK) {
                warn!("Listing card #{} has no detail link", index + 1);
            }
            items.push(WorkItem::from_pairs(fields));
        }

        info!("Equipments found: {}", items.len());
        Self { items, total_pages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <div class="results" data-num-pages="7">
          <div class="category__ct">
            <div class="category__head">2015 Cat 320EL Excavator</div>
            <div class="category__txt"><p>$45,000</p></div>
            <a class="category__butt" href="https://www.ebay.com/itm/111">Sold 2023-09-08</a>
          </div>
          <div class="category__ct">
            <div class="category__head">Kubota KX040</div>
            <div class="category__txt"><p>$12,500</p></div>
          </div>
          <div class="category__ct">
            <div class="category__head">  2008  Bobcat S185 </div>
            <div class="category__txt"><p> $9,100 </p></div>
            <a class="category__butt" href="https://www.ebay.com/itm/222">
              Sold on 2023-09-07
            </a>
          </div>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_listing_page() {
        let page = ListingPage::parse(PAGE);

        assert_eq!(page.total_pages, 7);
        assert_eq!(page.items.len(), 3);

        let first = &page.items[0];
        assert_eq!(first.field("desc"), "2015 Cat 320EL Excavator");
        assert_eq!(first.field("price"), "$45,000");
        assert_eq!(first.field("link"), "https://www.ebay.com/itm/111");
        assert_eq!(first.field("date"), "2023-09-08");

        // A card without its button is kept so it still yields a record.
        let linkless = &page.items[1];
        assert_eq!(linkless.field("desc"), "Kubota KX040");
        assert_eq!(linkless.field("price"), "$12,500");
        assert!(linkless.link().is_none());
        assert!(linkless.get("date").is_none());

        let third = &page.items[2];
        assert_eq!(third.field("desc"), "2008 Bobcat S185");
        assert_eq!(third.field("price"), "$9,100");
        assert_eq!(third.field("date"), "2023-09-07");
    }

    #[test]
    fn test_empty_card_is_skipped() {
        let page = ListingPage::parse(
            r#"<div class="results"><div class="category__ct"><span>ad</span></div></div>"#,
        );
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_missing_page_count_defaults_to_one() {
        let page = ListingPage::parse(r#"<div class="results"></div>"#);
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());

        let page = ListingPage::parse(r#"<div class="results" data-num-pages="n/a"></div>"#);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://www.bidadoo.com/results", "/lot/9"),
            "https://www.bidadoo.com/lot/9"
        );
        assert_eq!(
            resolve_url("https://www.bidadoo.com/results", "https://www.ebay.com/itm/1"),
            "https://www.ebay.com/itm/1"
        );
        assert_eq!(resolve_url("not a url", "/lot/9"), "/lot/9");
    }

    #[test]
    fn test_no_results_container() {
        let page = ListingPage::parse("<html><body>Access denied</body></html>");
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
    }
}
