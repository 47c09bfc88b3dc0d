//! layered-i18n-server
//!
//! レイヤー化された翻訳解決エンジンと、それをコマンドとして公開する LSP サーバー。
//!
//! 解決順序 (強い順): テナント override > GLOBAL override > ロケールのバンドル >
//! デフォルトロケールのバンドル。解決結果は (locale, scope) 単位でキャッシュされます。

pub mod autofill;
pub mod bundle;
pub mod cache;
pub mod config;
pub mod engine;
pub mod inspect;
pub mod keys;
pub mod overrides;
pub mod resolver;
pub mod server;
pub mod sync;
pub mod types;

// Backend を再エクスポート
pub use server::Backend;
