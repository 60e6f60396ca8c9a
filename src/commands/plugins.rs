//! # plugins 命令实现
//!
//! 以表格列出注册表中的插件、类型与可用动作，
//! 并给出可直接用于 `--plugin` 的描述符。
//!
//! ## 依赖关系
//! - 使用 `cli/plugins.rs` 定义的参数
//! - 使用 `plugins::PluginRegistry`

use crate::cli::plugins::PluginsArgs;
use crate::error::{BatchError, Result};
use crate::plugins::{PluginHandle, PluginRegistry, DESCRIPTOR_SEPARATOR};
use crate::utils::output;

use tabled::{Table, Tabled};

/// 插件表格行
#[derive(Debug, Clone, Tabled)]
struct PluginRow {
    #[tabled(rename = "Plugin")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Descriptor")]
    descriptor: String,
}

fn plugin_rows(handle: &PluginHandle) -> Vec<PluginRow> {
    handle
        .actions()
        .into_iter()
        .map(|action| PluginRow {
            name: handle.name().to_string(),
            kind: handle.kind().to_string(),
            descriptor: format!("{}{}{}", handle.name(), DESCRIPTOR_SEPARATOR, action),
            action,
        })
        .collect()
}

/// 执行 plugins 命令
pub fn execute(args: PluginsArgs) -> Result<()> {
    let registry = PluginRegistry::with_builtins();

    let rows: Vec<PluginRow> = match &args.name {
        Some(name) => {
            let handle = registry
                .get(name)
                .ok_or_else(|| BatchError::InvalidArgument(format!("Unknown plugin: {}", name)))?;
            plugin_rows(handle)
        }
        None => registry.iter().flat_map(plugin_rows).collect(),
    };

    output::print_header("Available Plugins");
    println!("{}", Table::new(&rows));
    output::print_info("Use a descriptor with --plugin, e.g. --plugin \"Color | Grayscale\"");

    Ok(())
}
