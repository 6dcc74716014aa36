//! Fetch, parse, deduplicate and persist one listing page.
//!
//! [`Ingester::run_once`] is a complete ingestion run. Categories are matched
//! by name and articles by title (globally, across categories). Everything a
//! run discovers is staged in memory and written by a single
//! [`Database::commit_run`] transaction. The dispatcher only hears about
//! articles once that transaction has committed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::SourceConfig;
use crate::dates::{normalize_date, DateFormatError};
use crate::db::{Category, Database};
use crate::fetcher::{FetchError, PageFetcher};
use crate::listing::{Listing, ListingParser};
use crate::notify::Dispatcher;
use crate::slug::{slugify, unique_slug};

/// Slug used when a category name has no usable characters.
const FALLBACK_SLUG: &str = "categoria";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDraft {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleDraft {
    pub title: String,
    pub source_url: String,
    pub published_at: Option<NaiveDateTime>,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryRef {
    Existing(Category),
    New(CategoryDraft),
}

impl CategoryRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Existing(category) => &category.name,
            Self::New(draft) => &draft.name,
        }
    }
}

/// A category plus the articles this run will attach to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCategory {
    pub category: CategoryRef,
    pub articles: Vec<ArticleDraft>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub categories_seen: usize,
    pub categories_created: usize,
    pub articles_inserted: usize,
    pub duplicates_skipped: usize,
    pub url_conflicts: usize,
    pub malformed_blocks: usize,
    pub date_errors: Vec<DateFormatError>,
    pub dispatch_failures: usize,
}

pub struct Ingester {
    db: Arc<Database>,
    fetcher: PageFetcher,
    parser: ListingParser,
    dispatcher: Arc<dyn Dispatcher>,
    refreshing: Arc<RwLock<bool>>,
}

impl Ingester {
    pub fn new(
        db: Arc<Database>,
        source: &SourceConfig,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            db,
            fetcher: PageFetcher::new(source)?,
            parser: ListingParser::new(&source.base_url, &source.selectors)?,
            dispatcher,
            refreshing: Arc::new(RwLock::new(false)),
        })
    }

    pub async fn is_refreshing(&self) -> bool {
        *self.refreshing.read().await
    }

    /// Run once unless a run is already in progress, in which case `Ok(None)`.
    pub async fn refresh(&self) -> Result<Option<RunReport>, IngestError> {
        {
            let mut refreshing = self.refreshing.write().await;
            if *refreshing {
                info!("Ingestion already in progress, skipping");
                return Ok(None);
            }
            *refreshing = true;
        }

        let result = self.run_once().await;

        {
            let mut refreshing = self.refreshing.write().await;
            *refreshing = false;
        }

        result.map(Some)
    }

    pub async fn run_once(&self) -> Result<RunReport, IngestError> {
        let bytes = self.fetcher.fetch().await?;
        let html = String::from_utf8_lossy(&bytes);
        let listing = self.parser.parse(&html);

        info!(
            "Parsed {} categories and {} articles from {}",
            listing.categories.len(),
            listing.article_count(),
            self.fetcher.url()
        );

        self.ingest_listing(&listing).await
    }

    /// Stage and commit an already parsed listing.
    pub async fn ingest_listing(&self, listing: &Listing) -> Result<RunReport, IngestError> {
        let mut report = RunReport {
            malformed_blocks: listing.malformed.len(),
            ..RunReport::default()
        };
        for problem in &listing.malformed {
            warn!("Skipping malformed listing block: {}", problem);
        }

        let staged = self
            .stage(listing, &mut report)
            .await
            .map_err(IngestError::Storage)?;
        report.categories_seen = staged.len();
        for entry in &staged {
            debug!(
                "Staged '{}' with {} new articles",
                entry.category.name(),
                entry.articles.len()
            );
        }

        let summary = self
            .db
            .commit_run(&staged)
            .await
            .map_err(IngestError::Storage)?;
        report.categories_created = summary.categories_created;
        report.articles_inserted = summary.articles_inserted;

        for entry in &staged {
            for article in &entry.articles {
                if let Err(e) = self
                    .dispatcher
                    .dispatch(entry.category.name(), article)
                    .await
                {
                    warn!("Dispatch failed for '{}': {}", article.title, e);
                    report.dispatch_failures += 1;
                }
            }
        }

        info!(
            "Ingestion complete: {} new categories, {} new articles, {} duplicates, {} date errors, {} malformed blocks",
            report.categories_created,
            report.articles_inserted,
            report.duplicates_skipped,
            report.date_errors.len(),
            report.malformed_blocks
        );
        Ok(report)
    }

    async fn stage(
        &self,
        listing: &Listing,
        report: &mut RunReport,
    ) -> anyhow::Result<Vec<StagedCategory>> {
        let mut staged: Vec<StagedCategory> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();
        let mut taken_slugs: HashSet<String> = self
            .db
            .get_all_categories()
            .await?
            .into_iter()
            .map(|c| c.slug)
            .collect();
        let mut seen_titles: HashSet<String> = HashSet::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        for block in &listing.categories {
            let known = by_name.get(&block.name).copied();
            let index = match known {
                Some(index) => index,
                None => {
                    let category = match self.db.find_category_by_name(&block.name).await? {
                        Some(existing) => CategoryRef::Existing(existing),
                        None => {
                            let mut base = slugify(&block.name);
                            if base.is_empty() {
                                base = FALLBACK_SLUG.to_string();
                            }
                            let slug = unique_slug(&base, |s| taken_slugs.contains(s));
                            taken_slugs.insert(slug.clone());
                            debug!("New category '{}' ({})", block.name, slug);
                            CategoryRef::New(CategoryDraft {
                                name: block.name.clone(),
                                slug,
                            })
                        }
                    };
                    staged.push(StagedCategory {
                        category,
                        articles: Vec::new(),
                    });
                    by_name.insert(block.name.clone(), staged.len() - 1);
                    staged.len() - 1
                }
            };

            for listed in &block.articles {
                let published_at = match normalize_date(&listed.raw_date) {
                    Ok(date) => date,
                    Err(e) => {
                        warn!("Skipping '{}' in '{}': {}", listed.title, block.name, e);
                        report.date_errors.push(e);
                        continue;
                    }
                };

                if seen_titles.contains(&listed.title)
                    || self.db.article_title_exists(&listed.title).await?
                {
                    debug!("Already have '{}', skipping", listed.title);
                    report.duplicates_skipped += 1;
                    continue;
                }

                if seen_urls.contains(&listed.url) || self.db.article_url_exists(&listed.url).await? {
                    warn!(
                        "Skipping '{}': url {} already stored under another title",
                        listed.title, listed.url
                    );
                    report.url_conflicts += 1;
                    continue;
                }

                let draft = ArticleDraft {
                    title: listed.title.clone(),
                    source_url: listed.url.clone(),
                    published_at: Some(published_at),
                    excerpt: listed.excerpt.clone(),
                };

                seen_titles.insert(draft.title.clone());
                seen_urls.insert(draft.source_url.clone());
                staged[index].articles.push(draft);
            }
        }

        Ok(staged)
    }
}

/// Run ingestion at startup and then every `interval_minutes`.
pub async fn start_background_refresh(ingester: Arc<Ingester>, interval_minutes: u64) {
    let interval = Duration::from_secs(interval_minutes * 60);

    info!("Starting initial ingestion run");
    if let Err(e) = ingester.refresh().await {
        error!("Initial ingestion run failed: {}", e);
    }

    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled ingestion run");
        if let Err(e) = ingester.refresh().await {
            error!("Scheduled ingestion run failed: {}", e);
        }
    }
}
