//! Extraction of categorized article entries from the listing page.
//!
//! The page is a sequence of category blocks, each with a heading and zero
//! or more article blocks carrying a title link, a date and an excerpt. The
//! [`Selectors`] config names where each of those lives.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::config::Selectors;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedListingError {
    #[error("category block {block} has no heading")]
    MissingCategoryHeading { block: usize },

    #[error("article {article} in category '{category}' is missing its {field}")]
    MissingField {
        category: String,
        article: usize,
        field: &'static str,
    },
}

#[derive(Debug, Error)]
#[error("invalid {name} selector '{selector}': {reason}")]
pub struct SelectorError {
    pub name: &'static str,
    pub selector: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedArticle {
    pub title: String,
    pub url: String,
    pub raw_date: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBlock {
    pub name: String,
    pub articles: Vec<ListedArticle>,
}

#[derive(Debug, Default, Clone)]
pub struct Listing {
    pub categories: Vec<CategoryBlock>,
    pub malformed: Vec<MalformedListingError>,
}

impl Listing {
    pub fn article_count(&self) -> usize {
        self.categories.iter().map(|b| b.articles.len()).sum()
    }
}

pub struct ListingParser {
    base_url: String,
    category_block: Selector,
    category_heading: Selector,
    article_block: Selector,
    title_link: Selector,
    date: Selector,
    excerpt: Selector,
}

impl ListingParser {
    pub fn new(base_url: &str, selectors: &Selectors) -> Result<Self, SelectorError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            category_block: compile("category_block", &selectors.category_block)?,
            category_heading: compile("category_heading", &selectors.category_heading)?,
            article_block: compile("article_block", &selectors.article_block)?,
            title_link: compile("title_link", &selectors.title_link)?,
            date: compile("date", &selectors.date)?,
            excerpt: compile("excerpt", &selectors.excerpt)?,
        })
    }

    pub fn parse(&self, html: &str) -> Listing {
        let document = Html::parse_document(html);
        let mut listing = Listing::default();

        for (block_idx, block) in document.select(&self.category_block).enumerate() {
            let name = match first_text(block, &self.category_heading) {
                Some(name) => name,
                None => {
                    listing
                        .malformed
                        .push(MalformedListingError::MissingCategoryHeading { block: block_idx });
                    continue;
                }
            };

            let mut articles = Vec::new();
            for (article_idx, article) in block.select(&self.article_block).enumerate() {
                match self.parse_article(&name, article_idx, article) {
                    Ok(parsed) => articles.push(parsed),
                    Err(e) => listing.malformed.push(e),
                }
            }

            listing.categories.push(CategoryBlock { name, articles });
        }

        listing
    }

    fn parse_article(
        &self,
        category: &str,
        index: usize,
        article: ElementRef<'_>,
    ) -> Result<ListedArticle, MalformedListingError> {
        let missing = |field| MalformedListingError::MissingField {
            category: category.to_string(),
            article: index,
            field,
        };

        let link = article
            .select(&self.title_link)
            .next()
            .ok_or_else(|| missing("title link"))?;
        let title = element_text(link).ok_or_else(|| missing("title"))?;
        let href = link
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| missing("href"))?;
        let raw_date = first_text(article, &self.date).ok_or_else(|| missing("date"))?;
        let excerpt = article
            .select(&self.excerpt)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .ok_or_else(|| missing("excerpt"))?;

        Ok(ListedArticle {
            title,
            url: self.absolute_url(href),
            raw_date,
            excerpt,
        })
    }

    pub fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        if href.starts_with('/') {
            format!("{}{}", self.base_url, href)
        } else {
            format!("{}/{}", self.base_url, href)
        }
    }
}

fn compile(name: &'static str, selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError {
        name,
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn first_text(parent: ElementRef<'_>, selector: &Selector) -> Option<String> {
    parent.select(selector).next().and_then(element_text)
}
