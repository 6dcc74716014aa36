use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};

use crate::ingest::{CategoryRef, StagedCategory};

/// Storage format for `articles.published_at`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Article {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    pub source_url: String,
    pub published_at: Option<String>,
    pub excerpt: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Subscription {
    pub phone_number: String,
    pub created_at: String,
}

/// Rows written by one successful [`Database::commit_run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    pub categories_created: usize,
    pub articles_inserted: usize,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE CHECK (name <> ''),
                slug TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                category_id INTEGER NOT NULL REFERENCES categories(id),
                title TEXT NOT NULL UNIQUE,
                source_url TEXT NOT NULL UNIQUE,
                published_at TEXT,
                excerpt TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_articles_category
            ON articles(category_id, id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                phone_number TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_category_by_name(&self, name: &str) -> anyhow::Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    pub async fn get_category_by_slug(&self, slug: &str) -> anyhow::Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    pub async fn get_all_categories(&self) -> anyhow::Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn article_title_exists(&self, title: &str) -> anyhow::Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM articles WHERE title = ?")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn article_url_exists(&self, source_url: &str) -> anyhow::Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM articles WHERE source_url = ?")
            .bind(source_url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Articles of one category in insertion order.
    pub async fn get_articles_for_category(&self, category_id: i64) -> anyhow::Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(
            "SELECT * FROM articles WHERE category_id = ? ORDER BY id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }

    pub async fn get_all_articles(&self) -> anyhow::Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>("SELECT * FROM articles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(articles)
    }

    pub async fn count_categories(&self) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn count_articles(&self) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Write every staged category and article in a single transaction.
    ///
    /// On any failure the transaction is dropped without commit, so nothing
    /// from the run becomes durable.
    pub async fn commit_run(&self, staged: &[StagedCategory]) -> anyhow::Result<CommitSummary> {
        let mut tx = self.pool.begin().await?;
        let mut summary = CommitSummary::default();

        for entry in staged {
            let category_id = match &entry.category {
                CategoryRef::Existing(category) => category.id,
                CategoryRef::New(draft) => {
                    let result = sqlx::query("INSERT INTO categories (name, slug) VALUES (?, ?)")
                        .bind(&draft.name)
                        .bind(&draft.slug)
                        .execute(&mut *tx)
                        .await?;
                    summary.categories_created += 1;
                    result.last_insert_rowid()
                }
            };

            for article in &entry.articles {
                sqlx::query(
                    r#"
                    INSERT INTO articles (category_id, title, source_url, published_at, excerpt)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(category_id)
                .bind(&article.title)
                .bind(&article.source_url)
                .bind(
                    article
                        .published_at
                        .map(|p| p.format(TIMESTAMP_FORMAT).to_string()),
                )
                .bind(&article.excerpt)
                .execute(&mut *tx)
                .await?;
                summary.articles_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(summary)
    }

    /// Returns `true` if the number was inserted, `false` if it was already there.
    pub async fn add_subscription(&self, phone_number: &str) -> anyhow::Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (phone_number, created_at)
            VALUES (?, ?)
            ON CONFLICT(phone_number) DO NOTHING
            "#,
        )
        .bind(phone_number)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Returns `true` if the number was present and removed.
    pub async fn remove_subscription(&self, phone_number: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE phone_number = ?")
            .bind(phone_number)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn list_subscribers(&self) -> anyhow::Result<Vec<Subscription>> {
        let subscribers = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions ORDER BY created_at, phone_number",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subscribers)
    }

    pub async fn subscriber_count(&self) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscriptions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
