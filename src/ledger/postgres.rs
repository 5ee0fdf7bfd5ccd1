use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use r2d2_postgres::postgres::NoTls;
use r2d2_postgres::PostgresConnectionManager;

use super::Ledger;
use crate::auction::{min_next, Amount, AuctionKey, Bid, BidError, UserId};

type Pool = r2d2::Pool<PostgresConnectionManager<NoTls>>;

pub struct PostgresLedger {
    pool: Pool,
    min_increment: Amount,
}

impl PostgresLedger {
    pub fn connect(url: &str, min_increment: Amount) -> Result<Self> {
        let manager = PostgresConnectionManager::new(
            url.parse().context("invalid database url")?,
            NoTls,
        );
        let pool = r2d2::Pool::new(manager).context("failed to create connection pool")?;
        Ok(Self {
            pool,
            min_increment,
        })
    }

    /// Create the `bids` table and its auction-key index if absent.
    pub fn ensure_schema(&self) -> Result<()> {
        let mut conn = self.pool.get()?;
        conn.batch_execute(
            "CREATE TABLE IF NOT EXISTS bids (
                 id BIGSERIAL PRIMARY KEY,
                 product_type TEXT NOT NULL,
                 product_id BIGINT NOT NULL,
                 user_id BIGINT NOT NULL,
                 amount BIGINT NOT NULL,
                 created_at TIMESTAMPTZ NOT NULL DEFAULT now()
             );
             CREATE INDEX IF NOT EXISTS bids_auction_key_amount
                 ON bids (product_type, product_id, amount DESC);",
        )
        .context("failed to create bids schema")?;
        Ok(())
    }
}

fn bid_from_row(key: &AuctionKey, row: &r2d2_postgres::postgres::Row) -> Result<Bid> {
    Ok(Bid {
        bid_id: u64::try_from(row.get::<_, i64>("id"))?,
        key: *key,
        user_id: u64::try_from(row.get::<_, i64>("user_id"))?,
        amount: u64::try_from(row.get::<_, i64>("amount"))?,
        created_at: row.get::<_, DateTime<Utc>>("created_at"),
    })
}

impl Ledger for PostgresLedger {
    fn get_highest(&self, key: &AuctionKey) -> Result<Option<Bid>, BidError> {
        let product_type = key.product_type.as_str();
        let product_id = i64::try_from(key.product_id).context("product id out of range")?;

        let mut conn = self.pool.get().context("ledger connection")?;
        let row = conn
            .query_opt(
                "SELECT id, user_id, amount, created_at FROM bids
                 WHERE product_type = $1 AND product_id = $2
                 ORDER BY amount DESC LIMIT 1",
                &[&product_type, &product_id],
            )
            .context("failed to query highest bid")?;

        Ok(row.map(|row| bid_from_row(key, &row)).transpose()?)
    }

    fn append(&self, key: &AuctionKey, user_id: UserId, amount: Amount) -> Result<Bid, BidError> {
        let product_type = key.product_type.as_str();
        let product_id = i64::try_from(key.product_id).context("product id out of range")?;
        let user_id_db = i64::try_from(user_id).context("user id out of range")?;
        let amount_db = i64::try_from(amount).context("amount out of range")?;

        let mut conn = self.pool.get().context("ledger connection")?;
        let mut tr = conn.transaction().context("failed to start transaction")?;

        // Lock the current-highest row so a concurrent append re-checks
        // against our insert. The coordinator's per-key lock is the primary
        // serialization; this is the last line.
        let current_highest = tr
            .query_opt(
                "SELECT amount FROM bids
                 WHERE product_type = $1 AND product_id = $2
                 ORDER BY amount DESC LIMIT 1
                 FOR UPDATE",
                &[&product_type, &product_id],
            )
            .context("failed to query highest bid")?
            .map(|row| u64::try_from(row.get::<_, i64>("amount")))
            .transpose()
            .context("stored amount out of range")?;

        let min = min_next(current_highest, self.min_increment);
        if amount < min {
            return Err(BidError::TooLow {
                min_next: min,
                current_highest: current_highest.unwrap_or(0),
            });
        }

        let row = tr
            .query_one(
                "INSERT INTO bids (product_type, product_id, user_id, amount)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id, created_at",
                &[&product_type, &product_id, &user_id_db, &amount_db],
            )
            .context("failed to insert bid")?;
        tr.commit().context("failed to commit bid")?;

        Ok(Bid {
            bid_id: u64::try_from(row.get::<_, i64>("id")).context("bid id out of range")?,
            key: *key,
            user_id,
            amount,
            created_at: row.get::<_, DateTime<Utc>>("created_at"),
        })
    }

    fn list_by_key(&self, key: &AuctionKey) -> Result<Vec<Bid>, BidError> {
        let product_type = key.product_type.as_str();
        let product_id = i64::try_from(key.product_id).context("product id out of range")?;

        let mut conn = self.pool.get().context("ledger connection")?;
        let rows = conn
            .query(
                "SELECT id, user_id, amount, created_at FROM bids
                 WHERE product_type = $1 AND product_id = $2
                 ORDER BY amount DESC",
                &[&product_type, &product_id],
            )
            .context("failed to list bids")?;

        Ok(rows
            .iter()
            .map(|row| bid_from_row(key, row))
            .collect::<Result<_>>()?)
    }
}
