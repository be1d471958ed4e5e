//! 日志初始化

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// 读取日志过滤配置的环境变量，例如 `DECKGEN_LOG=deckgen_rs::generator=debug`
pub const LOG_ENV: &str = "DECKGEN_LOG";

/// 初始化 tracing，可重复调用
///
/// 未设置 `DECKGEN_LOG` 或其值不合法时使用 `deckgen_rs=info`，`verbose` 时为 `debug`。
/// 日志写到 stderr，stdout 留给进度输出。
pub fn init_tracing(verbose: bool) {
    INIT.call_once(|| {
        let fallback = if verbose {
            "deckgen_rs=debug"
        } else {
            "deckgen_rs=info"
        };
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(verbose),
            )
            .with(filter)
            .init();
    });
}
