//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `run`: 对一组图像执行批处理
//! - `plugins`: 列出可用的插件与动作
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: run, plugins

pub mod plugins;
pub mod run;

use clap::{Parser, Subcommand};

/// imgbatch - 批量图像处理
#[derive(Parser)]
#[command(name = "imgbatch")]
#[command(version)]
#[command(about = "Batch image processing: resize, transform and plugin chains with safe overwrite", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Print debug diagnostics (RUST_LOG overrides)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Process a batch of images through a resize / transform / plugin chain
    Run(run::RunArgs),

    /// List available plugins and their actions
    Plugins(plugins::PluginsArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::try_parse_from([
            "imgbatch", "-v", "run", "a.jpg", "b.png", "-o", "out", "--scale", "0.5",
            "--rotate", "-90", "--overwrite", "--plugin", "Color | Grayscale",
        ])
        .unwrap();

        assert!(cli.verbose);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.scale, Some(0.5));
        assert_eq!(args.rotate, -90);
        assert!(args.overwrite);
        assert_eq!(args.plugins, vec!["Color | Grayscale".to_string()]);
    }

    #[test]
    fn test_compression_range_checked() {
        let result = Cli::try_parse_from(["imgbatch", "run", "a.jpg", "--compression", "150"]);
        assert!(result.is_err());
    }
}
