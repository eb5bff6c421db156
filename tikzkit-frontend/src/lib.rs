pub mod cli;
pub mod errors;
pub mod loader;

use std::io;

use errors::FrontendError;
use tikzkit_config::AppConfig;
use tracing::info;

pub use cli::CliOptions;

/// 运行命令行前端，输出写到标准输出。
pub fn run_cli(config: &AppConfig, options: &CliOptions) -> Result<(), FrontendError> {
    info!(
        open = ?options.open,
        save = ?options.save,
        commands = options.commands.len(),
        "启动 CLI 前端"
    );
    let stdout = io::stdout();
    let mut out = stdout.lock();
    cli::run(config, options, &mut out)
}
