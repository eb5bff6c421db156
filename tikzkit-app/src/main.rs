use std::path::PathBuf;

use tikzkit_config::{AppConfig, ConfigError, FrontendMode};
use tikzkit_frontend::CliOptions;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const USAGE: &str = "用法: tikzkit-app [--summary | --tikz] [--config <文件>] [--open <日志>] [--save <日志>] [--exec <命令>]...";

fn main() {
    let mut args = std::env::args().skip(1);
    let mut options = CliOptions::default();
    let mut config_override: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--summary" => options.mode = Some(FrontendMode::Summary),
            "--tikz" => options.mode = Some(FrontendMode::Tikz),
            "--config" => config_override = Some(PathBuf::from(required(&mut args, "--config"))),
            "--open" => options.open = Some(PathBuf::from(required(&mut args, "--open"))),
            "--save" => options.save = Some(PathBuf::from(required(&mut args, "--save"))),
            "--exec" => options.commands.push(required(&mut args, "--exec")),
            "--help" | "-h" => {
                println!("{USAGE}");
                return;
            }
            other => {
                eprintln!("未知参数：{other}");
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
        }
    }

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动 TikZKit 应用");

    if let Err(err) = tikzkit_frontend::run_cli(&config, &options) {
        error!(error = %err, "执行 CLI 前端失败");
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn required(args: &mut impl Iterator<Item = String>, flag: &str) -> String {
    match args.next() {
        Some(value) => value,
        None => {
            eprintln!("`{flag}` 需要提供参数");
            std::process::exit(1);
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
