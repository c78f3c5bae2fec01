//! Typed - 型付き Task API
//!
//! 引数を struct として定義し、`const NAME` で function identity を静的に対応付けます。
//! closure を登録する `Runner::wrap` と同じ実行経路を通ります。

pub mod task;

pub use self::task::Task;
