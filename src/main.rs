//! # imgbatch - 批量图像处理
//!
//! 对一组图像依次执行缩放、变换和插件处理，覆盖已有输出时
//! 先备份原文件，保存失败则自动恢复。
//!
//! ## 子命令
//! - `run`     - 执行批处理
//! - `plugins` - 列出可用插件
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/    (批处理引擎：配置、单文件状态机、备份、并行执行)
//!   │     ├── steps/    (处理步骤：缩放、变换、插件链)
//!   │     ├── imaging/  (图像读写)
//!   │     └── plugins/  (插件注册表与内置插件)
//!   ├── utils/      (输出、进度条、报告)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod imaging;
mod plugins;
mod steps;
mod utils;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&e.describe());
        std::process::exit(1);
    }
}

/// 初始化诊断日志；`RUST_LOG` 优先于 `-v`
fn init_logging(verbose: bool) {
    let default_level = if verbose { "imgbatch=debug" } else { "imgbatch=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
