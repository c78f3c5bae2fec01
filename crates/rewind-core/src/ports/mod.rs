//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! Runner はここにある trait だけに依存し、ストレージエンジンや
//! エンコード方式の詳細は impls 側に隠蔽されます。

pub mod clock;
pub mod codec;
pub mod id_generator;
pub mod repository;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::codec::{ArgsHash, CanonicalArgs, Codec, to_value};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::repository::Repository;
