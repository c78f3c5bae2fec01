//! Task trait - 型付き Task の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const NAME`)
//! - Associated Types (`type Output`)
//! - Trait bounds の組み合わせ (Serialize + Send + 'static)

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::{ExecutionContext, Runner};
use crate::domain::RunError;

/// Task は function identity と引数の型を対応付ける
///
/// struct 自体が引数で、そのフィールドが正規化されて content hash になります。
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize)]
/// struct Fetch {
///     url: String,
/// }
///
/// #[async_trait]
/// impl Task for Fetch {
///     const NAME: &'static str = "crawler.fetch.v1";
///     type Output = String;
///
///     async fn run(self, runner: &Runner, cx: ExecutionContext) -> Result<String, RunError> {
///         // runner.run(&cx, ...) で子 task を呼べる
///         Ok(download(&self.url).await?)
///     }
/// }
///
/// let body = runner.run(&cx, Fetch { url }).await?;
/// ```
///
/// # Trait Bounds
/// - `Serialize`: 引数として正規化・保存するため
/// - `Output: DeserializeOwned`: 完了済み Job の結果を復元するため
/// - `Send + 'static`: tokio の task として実行できるため
#[async_trait]
pub trait Task: Serialize + Send + 'static {
    /// Function identity.
    ///
    /// # 命名規約
    /// - `{namespace}.{action}.v{major}`
    /// - 引数や結果の形を変えたら major を上げる（古い Job と混ざらないように）
    const NAME: &'static str;

    type Output: Serialize + DeserializeOwned + Send + 'static;

    async fn run(self, runner: &Runner, cx: ExecutionContext) -> Result<Self::Output, RunError>;
}
