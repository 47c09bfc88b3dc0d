//! Entry point for the Language Server Protocol implementation.

use std::path::PathBuf;

use layered_i18n_server::Backend;
use layered_i18n_server::config::ConfigManager;
use tower_lsp::{
    LspService,
    Server,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{
    EnvFilter,
    Layer,
};

/// ログ出力先ディレクトリを上書きする環境変数
const LOG_DIR_ENV: &str = "LAYERED_I18N_LOG_DIR";

#[tokio::main]
async fn main() {
    // stdout は LSP の通信に使うため、ログは stderr とファイルのみ
    let _guard = init_tracing();

    let (stdin, stdout) = (tokio::io::stdin(), tokio::io::stdout());
    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}

/// tracing を初期化する
///
/// 戻り値の guard が drop されるとファイルへの書き込みが止まるため、
/// プロセス終了まで保持すること
fn init_tracing() -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer =
        tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_ansi(false).with_filter(filter());

    let (file_layer, guard) = log_dir().map_or((None, None), |dir| {
        let appender = tracing_appender::rolling::daily(dir, "layered-i18n-server.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false).with_filter(filter());
        (Some(layer), Some(guard))
    });

    tracing_subscriber::registry().with(stderr_layer).with(file_layer).init();
    guard
}

/// ログディレクトリ: 環境変数 > カレントディレクトリの設定ファイルの `logDir`
fn log_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir));
    }

    let cwd = std::env::current_dir().ok()?;
    let mut manager = ConfigManager::new();
    // subscriber 初期化前なので失敗は黙って無視する
    manager.load_settings(Some(cwd.clone())).ok()?;
    manager.get_settings().log_path(Some(cwd.as_path()))
}
