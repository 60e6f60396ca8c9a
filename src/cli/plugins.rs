//! # plugins 子命令 CLI 定义
//!
//! 列出已注册的插件及其动作
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/plugins.rs`

use clap::Args;

/// plugins 子命令参数
#[derive(Args, Debug)]
pub struct PluginsArgs {
    /// Only show the plugin with this name
    #[arg(long)]
    pub name: Option<String>,
}
