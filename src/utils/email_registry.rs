//! In-memory index of registered emails, consulted before the `users` table
//! on registration.
//!
//! Two layers sit in front of the database:
//! - a cuckoo filter holding every registered email. A miss means "never
//!   registered", but only once the startup warmup has loaded the whole
//!   table. Until then a miss proves nothing and the lookup falls through.
//! - a moka cache of emails known to be taken (recent sign-ups and emails
//!   seen on previous lookups).
//!
//! Both layers are hints. The unique key on `users.email` stays the
//! authority, so a registration that slips past them still fails cleanly.

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::{
    PoisonError, RwLock,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;
const CACHE_CAPACITY: u64 = 500_000;
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub static EMAILS: Lazy<EmailRegistry> = Lazy::new(EmailRegistry::new);

/// The form every layer stores and looks up emails in.
#[inline]
pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct EmailRegistry {
    filter: RwLock<CuckooFilter<String>>,
    /// Set once the filter holds every email in `users`.
    filter_complete: AtomicBool,
    taken: Cache<String, bool>,
}

impl Default for EmailRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailRegistry {
    pub fn new() -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
            filter_complete: AtomicBool::new(false),
            taken: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// True only when the filter is complete and has never seen `email`.
    pub fn definitely_unregistered(&self, email: &str) -> bool {
        if !self.filter_complete.load(Ordering::Acquire) {
            return false;
        }
        !self
            .filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&normalize(email))
    }

    pub async fn known_taken(&self, email: &str) -> bool {
        self.taken.get(&normalize(email)).await.unwrap_or(false)
    }

    /// Record a successful registration in both layers.
    pub async fn record(&self, email: &str) {
        let email = normalize(email);
        self.filter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(&email);
        self.taken.insert(email, true).await;
    }

    /// true => email AVAILABLE, false => email TAKEN.
    pub async fn is_available(&self, email: &str, pool: &MySqlPool) -> Result<bool, sqlx::Error> {
        if self.definitely_unregistered(email) {
            return Ok(true);
        }

        if self.known_taken(email).await {
            return Ok(false);
        }

        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
        )
        .bind(normalize(email))
        .fetch_one(pool)
        .await?
            > 0;

        if exists {
            self.taken.insert(normalize(email), true).await;
        }

        Ok(!exists)
    }

    /// Load every registered email into the filter, streaming in batches.
    /// Registrations that land while this runs are added by `record`, so
    /// the filter is complete once the stream ends.
    pub async fn warmup_filter(&self, pool: &MySqlPool, batch_size: usize) -> Result<usize> {
        let mut stream = sqlx::query_scalar::<_, String>("SELECT email FROM users").fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let email = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;
            batch.push(normalize(&email));
            total += 1;

            if batch.len() == batch_size {
                self.add_to_filter(&batch);
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.add_to_filter(&batch);
        }

        self.mark_filter_complete();
        log::info!("Email filter warmup complete: {} users", total);
        Ok(total)
    }

    /// Preload emails of users registered in the last `days` days.
    pub async fn warmup_cache(&self, pool: &MySqlPool, days: u32, batch_size: usize) -> Result<usize> {
        let mut stream = sqlx::query_scalar::<_, String>(
            r#"
            SELECT email
            FROM users
            WHERE created_at >= NOW() - INTERVAL ? DAY
            ORDER BY created_at DESC
            "#,
        )
        .bind(days)
        .fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            batch.push(normalize(&row?));
            total += 1;

            if batch.len() >= batch_size {
                self.mark_taken_batch(&batch).await;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.mark_taken_batch(&batch).await;
        }

        log::info!(
            "Email cache warmup complete: {} recent users (last {} days)",
            total,
            days
        );
        Ok(total)
    }

    fn add_to_filter(&self, emails: &[String]) {
        let mut filter = self.filter.write().unwrap_or_else(PoisonError::into_inner);
        for email in emails {
            filter.add(email);
        }
    }

    fn mark_filter_complete(&self) {
        self.filter_complete.store(true, Ordering::Release);
    }

    async fn mark_taken_batch(&self, emails: &[String]) {
        let inserts: Vec<_> = emails
            .iter()
            .map(|e| self.taken.insert(e.clone(), true))
            .collect();
        futures::future::join_all(inserts).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Jane@Acme.IO "), "jane@acme.io");
    }

    #[test]
    fn filter_miss_is_not_trusted_before_warmup() {
        let registry = EmailRegistry::new();
        assert!(!registry.definitely_unregistered("existing@acme.io"));

        registry.mark_filter_complete();
        assert!(registry.definitely_unregistered("existing@acme.io"));
    }

    #[actix_web::test]
    async fn registration_during_warmup_is_remembered() {
        let registry = EmailRegistry::new();

        // Signs up after the warmup query started streaming.
        registry.record("Late.Signup@Acme.io").await;
        registry.add_to_filter(&[normalize("loaded@acme.io")]);
        registry.mark_filter_complete();

        assert!(!registry.definitely_unregistered("late.signup@acme.io"));
        assert!(!registry.definitely_unregistered("  LOADED@acme.io"));
        assert!(registry.known_taken("late.signup@ACME.io").await);
        assert!(!registry.known_taken("loaded@acme.io").await);
    }

    #[actix_web::test]
    async fn batch_marks_every_email_taken() {
        let registry = EmailRegistry::new();
        registry
            .mark_taken_batch(&[normalize("a@acme.io"), normalize("B@acme.io")])
            .await;

        assert!(registry.known_taken("A@acme.io").await);
        assert!(registry.known_taken("b@acme.io").await);
        assert!(!registry.known_taken("c@acme.io").await);
    }
}
