//! CAPTCHA pool: `Fetch()`/`Solve()` over [`crate::storage::captcha`], with the image
//! generator itself kept behind a trait so the crate never depends on a rasterizer.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::CaptchaEntry;

/// External collaborator: produces CAPTCHA challenges. Real image generation (font
/// rendering, distortion) is out of scope for this crate; only the contract lives here.
#[async_trait]
pub trait CaptchaGenerator: Send + Sync {
    async fn generate(&self, count: usize) -> Result<Vec<CaptchaEntry>>;
}

/// Test double: produces deterministic-looking but non-repeating entries without any
/// actual image rendering.
pub struct NullGenerator;

#[async_trait]
impl CaptchaGenerator for NullGenerator {
    async fn generate(&self, count: usize) -> Result<Vec<CaptchaEntry>> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let entries = (0..count)
            .map(|_| {
                let id: String = (0..16).map(|_| format!("{:x}", rng.gen_range(0..16u8))).collect();
                let solution: String = (0..5).map(|_| format!("{:X}", rng.gen_range(0..16u8))).collect();
                CaptchaEntry {
                    id,
                    solution,
                    image: Vec::new(),
                }
            })
            .collect();
        Ok(entries)
    }
}

/// Holds the generator and the refill policy; storage itself lives in the SQLite pool.
pub struct CaptchaPool {
    generator: Box<dyn CaptchaGenerator>,
    refill_batch: usize,
}

impl CaptchaPool {
    pub fn new() -> Self {
        Self {
            generator: Box::new(NullGenerator),
            refill_batch: 50,
        }
    }

    pub fn with_generator(generator: Box<dyn CaptchaGenerator>, refill_batch: usize) -> Self {
        Self { generator, refill_batch }
    }

    /// Return a random challenge id + image, generating a fresh batch synchronously
    /// when the pool is empty.
    pub async fn fetch(&self, pool: &SqlitePool) -> Result<CaptchaEntry> {
        if let Some(entry) = crate::storage::captcha::fetch_random(pool).await? {
            return Ok(entry);
        }
        let fresh = self.generator.generate(self.refill_batch).await?;
        crate::storage::captcha::insert_batch(pool, &fresh).await?;
        crate::storage::captcha::fetch_random(pool)
            .await?
            .ok_or_else(|| crate::error::Error::Internal("captcha pool still empty after refill".into()))
    }

    /// Case-insensitive, idempotent: the row is deleted either way.
    pub async fn solve(&self, pool: &SqlitePool, id: &str, answer: &str) -> Result<bool> {
        crate::storage::captcha::solve(pool, id, answer).await
    }
}

impl Default for CaptchaPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        schema::upgrade(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn fetch_refills_when_empty() {
        let pool = seeded_pool().await;
        let captchas = CaptchaPool::new();
        let entry = captchas.fetch(&pool).await.unwrap();
        assert_eq!(entry.id.len(), 16);
        assert_eq!(crate::storage::captcha::count(&pool).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn solve_is_idempotent() {
        let pool = seeded_pool().await;
        let captchas = CaptchaPool::new();
        let entry = captchas.fetch(&pool).await.unwrap();
        assert!(captchas.solve(&pool, &entry.id, &entry.solution).await.unwrap());
        assert!(!captchas.solve(&pool, &entry.id, &entry.solution).await.unwrap());
    }
}
