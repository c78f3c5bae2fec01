//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **JsonCodec**: serde_json + SHA-256 の正規化エンコード
//! - **InMemoryRepository**: テスト用の正本
//! - **NoopRepository**: memoize しない Repository
//! - **SqliteRepository**: sqlx による SQLite 実装（`sqlite` feature）

pub mod json_codec;
pub mod memory;
pub mod noop;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(test)]
pub(crate) mod testing;

pub use self::json_codec::JsonCodec;
pub use self::memory::InMemoryRepository;
pub use self::noop::NoopRepository;

#[cfg(feature = "sqlite")]
pub use self::sqlite::{SqliteConfig, SqliteRepository};
