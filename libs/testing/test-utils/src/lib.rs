//! Shared test infrastructure for the domain crates.
//!
//! - `TestDatabase`: PostgreSQL container with the full schema migrated (feature: "postgres")
//! - `TestRedis`: Redis container for stream tests (feature: "redis")
//! - `TestDataBuilder`: deterministic tenant ids and addresses (always available)
//! - `assertions`: small assertion helpers (always available)
//!
//! ```rust,ignore
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! #[ignore] // Requires actual database
//! async fn stages_an_invite_batch() {
//!     let db = TestDatabase::new().await;
//!     let data = TestDataBuilder::from_test_name("stages_an_invite_batch");
//!     let list_id = db
//!         .seed_contact_list(data.workspace_id(), data.user_id(), &[Some("a@x.com"), None])
//!         .await;
//! }
//! ```

use uuid::Uuid;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

#[cfg(feature = "redis")]
pub use redis::TestRedis;

/// Deterministic test data derived from a seed, so reruns produce identical rows.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from the test name hash; the usual entry point.
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    fn uuid_with_tag(&self, tag: u8) -> Uuid {
        let bytes = self.seed.to_le_bytes();
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes[..8].copy_from_slice(&bytes);
        uuid_bytes[8..16].copy_from_slice(&bytes);
        uuid_bytes[15] ^= tag;
        Uuid::from_bytes(uuid_bytes)
    }

    /// Organizer id for the test tenant
    pub fn user_id(&self) -> Uuid {
        self.uuid_with_tag(0)
    }

    pub fn workspace_id(&self) -> Uuid {
        self.uuid_with_tag(0x5a)
    }

    /// Recipient address `n` in a test-specific domain
    pub fn email(&self, n: usize) -> String {
        format!("guest{}@t{}.example.com", n, self.seed % 100_000)
    }

    /// `count` distinct recipient addresses
    pub fn emails(&self, count: usize) -> Vec<String> {
        (0..count).map(|n| self.email(n)).collect()
    }

    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }
}

pub mod assertions {
    use uuid::Uuid;

    pub fn assert_uuid_eq(actual: Uuid, expected: Uuid, context: &str) {
        assert_eq!(
            actual, expected,
            "{}: expected UUID {}, got {}",
            context, expected, actual
        );
    }

    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
