//! External collaborators: the listing catalog and the user directory.
//!
//! The auction engine does not own item or user data; it only asks whether a
//! product exists before accepting a bid, and resolves bidder display names
//! when serving reads and publishing events.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use r2d2_postgres::postgres::NoTls;
use r2d2_postgres::PostgresConnectionManager;

use crate::auction::{AuctionKey, ProductType, UserId};

pub trait ListingStore: Send + Sync {
    /// Whether `key` references a sellable item. Checked once per
    /// submission, never cached.
    fn exists(&self, key: &AuctionKey) -> Result<bool>;
}

pub trait UserDirectory: Send + Sync {
    fn display_name(&self, user_id: UserId) -> Result<Option<String>>;
}

pub type SharedListingStore = Arc<dyn ListingStore + 'static>;
pub type SharedUserDirectory = Arc<dyn UserDirectory + 'static>;

/// A missing or failed name lookup degrades to a placeholder; it never fails
/// a read or a publish.
pub fn display_name_or_fallback(users: &dyn UserDirectory, user_id: UserId) -> String {
    match users.display_name(user_id) {
        Ok(Some(name)) => name,
        Ok(None) => format!("user-{user_id}"),
        Err(err) => {
            tracing::warn!(user_id, %err, "user lookup failed");
            format!("user-{user_id}")
        }
    }
}

/// Fake in-memory catalog implementing both collaborator traits.
///
/// Useful for unit-tests and local runs without a database.
#[derive(Default)]
pub struct InMemoryCatalog {
    listings: RwLock<HashSet<AuctionKey>>,
    users: RwLock<HashMap<UserId, String>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn add_listing(&self, key: AuctionKey) {
        self.listings.write().insert(key);
    }

    pub fn add_user(&self, user_id: UserId, name: impl Into<String>) {
        self.users.write().insert(user_id, name.into());
    }
}

impl ListingStore for InMemoryCatalog {
    fn exists(&self, key: &AuctionKey) -> Result<bool> {
        Ok(self.listings.read().contains(key))
    }
}

impl UserDirectory for InMemoryCatalog {
    fn display_name(&self, user_id: UserId) -> Result<Option<String>> {
        Ok(self.users.read().get(&user_id).cloned())
    }
}

type Pool = r2d2::Pool<PostgresConnectionManager<NoTls>>;

/// Catalog backed by the marketplace's own tables.
pub struct PostgresCatalog {
    pool: Pool,
}

impl PostgresCatalog {
    pub fn connect(url: &str) -> Result<Self> {
        let manager = PostgresConnectionManager::new(
            url.parse().context("invalid database url")?,
            NoTls,
        );
        let pool = r2d2::Pool::new(manager).context("failed to create connection pool")?;
        Ok(Self { pool })
    }
}

fn listing_table(product_type: ProductType) -> &'static str {
    match product_type {
        ProductType::Hoarding => "hoardings",
        ProductType::Society => "societies",
        ProductType::Screen => "screens",
    }
}

impl ListingStore for PostgresCatalog {
    fn exists(&self, key: &AuctionKey) -> Result<bool> {
        let product_id = i64::try_from(key.product_id).context("product id out of range")?;
        let mut conn = self.pool.get().context("catalog connection")?;
        let row = conn
            .query_opt(
                // Table name comes from a closed enum, not user input.
                &format!(
                    "SELECT 1 FROM {} WHERE id = $1",
                    listing_table(key.product_type)
                ),
                &[&product_id],
            )
            .context("failed to check listing")?;
        Ok(row.is_some())
    }
}

impl UserDirectory for PostgresCatalog {
    fn display_name(&self, user_id: UserId) -> Result<Option<String>> {
        let user_id = i64::try_from(user_id).context("user id out of range")?;
        let mut conn = self.pool.get().context("catalog connection")?;
        let row = conn
            .query_opt("SELECT name FROM users WHERE id = $1", &[&user_id])
            .context("failed to look up user")?;
        Ok(row.map(|row| row.get("name")))
    }
}
