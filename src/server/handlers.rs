//! LSP ハンドラーモジュール
//!
//! `LanguageServer` trait の各メソッドの実装を機能別に分割しています。

#![allow(unreachable_pub)]

pub mod execute_command;
pub mod lifecycle;
pub mod workspace;
