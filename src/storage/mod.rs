//! Persistence layer.
//!
//! SQLite store for properties and their generated summaries and
//! reviews. Every enrichment write runs in its own transaction so a
//! failed item never leaves partial state behind.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};

use crate::types::{
    EnrichError, JobKind, NewProperty, Property, Review, Summary, MAX_RATING, MIN_RATING,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS hotels (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        hotel_id TEXT NOT NULL UNIQUE,
        property_title TEXT NOT NULL,
        city_name TEXT NOT NULL,
        address TEXT NOT NULL DEFAULT '',
        latitude REAL NOT NULL DEFAULT 0,
        longitude REAL NOT NULL DEFAULT 0,
        room_type TEXT NOT NULL DEFAULT '',
        price REAL,
        rating REAL,
        image TEXT NOT NULL DEFAULT '',
        local_image_path TEXT,
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS property_summaries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        property_id INTEGER NOT NULL REFERENCES hotels(id) ON DELETE CASCADE,
        summary TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS property_reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        property_id INTEGER NOT NULL REFERENCES hotels(id) ON DELETE CASCADE,
        rating REAL NOT NULL CHECK (rating >= 1 AND rating <= 5),
        review TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_summaries_property ON property_summaries(property_id)",
    "CREATE INDEX IF NOT EXISTS idx_reviews_property ON property_reviews(property_id)",
];

const PROPERTY_COLUMNS: &str = "id, hotel_id, property_title, city_name, address, latitude, \
     longitude, room_type, price, rating, image, local_image_path, description";

/// Pending work per job, as reported by `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub properties: i64,
    pub descriptions: i64,
    pub summaries: i64,
    pub reviews: i64,
}

/// Outcome of writing a generated review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewWrite {
    pub review_id: i64,
    /// Existing reviews removed first (force mode only).
    pub deleted: u64,
}

/// SQLite-backed property store.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `url`.
    ///
    /// In-memory databases get a single connection that never expires,
    /// otherwise each pooled connection would see its own empty database.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {url}"))?;

        debug!(url, in_memory, "Database connected");
        Ok(Self { pool })
    }

    /// Fresh in-memory store with the schema applied.
    pub async fn in_memory() -> Result<Self> {
        let store = Self::connect("sqlite::memory:").await?;
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes that do not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA.iter().copied() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply schema")?;
        }
        info!("Schema ready");
        Ok(())
    }

    // -- Properties -------------------------------------------------------

    pub async fn insert_property(&self, p: &NewProperty) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO hotels (
                hotel_id, property_title, city_name, address, latitude, longitude,
                room_type, price, rating, image, local_image_path, description
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&p.hotel_id)
        .bind(&p.property_title)
        .bind(&p.city_name)
        .bind(&p.address)
        .bind(p.latitude)
        .bind(p.longitude)
        .bind(&p.room_type)
        .bind(p.price)
        .bind(p.rating)
        .bind(&p.image)
        .bind(&p.local_image_path)
        .bind(&p.description)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert property {}", p.hotel_id))?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_property(&self, id: i64) -> Result<Option<Property>> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM hotels WHERE id = ?");
        sqlx::query_as::<_, Property>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to load property {id}"))
    }

    /// Delete a property. Its summaries and reviews go with it.
    pub async fn delete_property(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM hotels WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete property {id}"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Ids of the properties a job should process, in id order.
    ///
    /// `force` only affects the review job, where it selects every
    /// property instead of those without reviews.
    pub async fn candidate_ids(&self, job: JobKind, force: bool) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT id FROM hotels WHERE {} ORDER BY id",
            candidate_predicate(job, force)
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to select candidates for {job}"))
    }

    pub async fn pending_counts(&self) -> Result<PendingCounts> {
        Ok(PendingCounts {
            properties: self.count_where("1 = 1").await?,
            descriptions: self
                .count_where(candidate_predicate(JobKind::Descriptions, false))
                .await?,
            summaries: self
                .count_where(candidate_predicate(JobKind::Summaries, false))
                .await?,
            reviews: self
                .count_where(candidate_predicate(JobKind::Reviews, false))
                .await?,
        })
    }

    async fn count_where(&self, predicate: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM hotels WHERE {predicate}");
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count pending work")
    }

    // -- Enrichment writes ------------------------------------------------

    pub async fn update_title(&self, id: i64, title: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let result = sqlx::query("UPDATE hotels SET property_title = ? WHERE id = ?")
            .bind(title)
            .bind(id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to update title of property {id}"))?;
        if result.rows_affected() == 0 {
            return Err(EnrichError::PropertyNotFound(id).into());
        }
        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }

    pub async fn set_description(&self, id: i64, description: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let result = sqlx::query("UPDATE hotels SET description = ? WHERE id = ?")
            .bind(description)
            .bind(id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to set description of property {id}"))?;
        if result.rows_affected() == 0 {
            return Err(EnrichError::PropertyNotFound(id).into());
        }
        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }

    pub async fn insert_summary(&self, property_id: i64, summary: &str) -> Result<i64> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        ensure_property(&mut tx, property_id).await?;

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO property_summaries (property_id, summary, created_at, updated_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(property_id)
        .bind(summary)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert summary for property {property_id}"))?;

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(result.last_insert_rowid())
    }

    /// Insert a review. With `replace_existing`, the property's current
    /// reviews are deleted in the same transaction first.
    pub async fn insert_review(
        &self,
        property_id: i64,
        rating: f64,
        review: &str,
        replace_existing: bool,
    ) -> Result<ReviewWrite> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(EnrichError::InvalidRating(rating).into());
        }

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        ensure_property(&mut tx, property_id).await?;

        let deleted = if replace_existing {
            sqlx::query("DELETE FROM property_reviews WHERE property_id = ?")
                .bind(property_id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to purge reviews of property {property_id}"))?
                .rows_affected()
        } else {
            0
        };

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO property_reviews (property_id, rating, review, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(property_id)
        .bind(rating)
        .bind(review)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert review for property {property_id}"))?;

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(ReviewWrite {
            review_id: result.last_insert_rowid(),
            deleted,
        })
    }

    // -- Reads ------------------------------------------------------------

    pub async fn summaries_for(&self, property_id: i64) -> Result<Vec<Summary>> {
        sqlx::query_as::<_, Summary>(
            "SELECT id, property_id, summary, created_at, updated_at \
             FROM property_summaries WHERE property_id = ? ORDER BY id",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to load summaries of property {property_id}"))
    }

    pub async fn reviews_for(&self, property_id: i64) -> Result<Vec<Review>> {
        sqlx::query_as::<_, Review>(
            "SELECT id, property_id, rating, review, created_at, updated_at \
             FROM property_reviews WHERE property_id = ? ORDER BY id",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to load reviews of property {property_id}"))
    }
}

fn candidate_predicate(job: JobKind, force: bool) -> &'static str {
    match (job, force) {
        (JobKind::RewriteTitles, _) => "1 = 1",
        (JobKind::Descriptions, _) => "description IS NULL",
        (JobKind::Summaries, _) => {
            "description IS NOT NULL AND NOT EXISTS \
             (SELECT 1 FROM property_summaries s WHERE s.property_id = hotels.id)"
        }
        (JobKind::Reviews, true) => "1 = 1",
        (JobKind::Reviews, false) => {
            "NOT EXISTS (SELECT 1 FROM property_reviews r WHERE r.property_id = hotels.id)"
        }
    }
}

async fn ensure_property(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, id: i64) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM hotels WHERE id = ?)")
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .with_context(|| format!("Failed to look up property {id}"))?;
    if !exists {
        return Err(EnrichError::PropertyNotFound(id).into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
