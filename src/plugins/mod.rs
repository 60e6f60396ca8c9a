//! # 插件宿主
//!
//! 插件在配置阶段按 `"插件名 | 动作名"` 解析为具体的调用方式，
//! 运行时不再做类型判断。
//!
//! ## 功能
//! - `BasicPlugin`：只处理图像
//! - `BatchPlugin`：处理图像并产生 `BatchInfo`，带有运行前/运行后回调
//! - `PluginHandle`：以上两类的封闭枚举
//! - `PluginRegistry`：按名称查找插件并解析描述符
//!
//! ## 依赖关系
//! - 被 `steps/plugin.rs`, `commands/` 使用
//! - 子模块: builtin

pub mod builtin;

use crate::error::{BatchError, Result};

use image::DynamicImage;
use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 描述符中插件名与动作名的分隔符
pub const DESCRIPTOR_SEPARATOR: &str = " | ";

// ─────────────────────────────────────────────────────────────
// BatchInfo
// ─────────────────────────────────────────────────────────────

/// 批处理插件产生的元数据，以运行 ID 标记
#[derive(Clone)]
pub struct BatchInfo {
    run_id: String,
    file_path: PathBuf,
    payload: Arc<dyn Any + Send + Sync>,
}

impl BatchInfo {
    pub fn new(
        run_id: impl Into<String>,
        file_path: impl Into<PathBuf>,
        payload: impl Any + Send + Sync,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            file_path: file_path.into(),
            payload: Arc::new(payload),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// 按具体类型取出载荷
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// 筛选出属于指定运行 ID 的元数据
    pub fn filter(infos: &[BatchInfo], run_id: &str) -> Vec<BatchInfo> {
        infos
            .iter()
            .filter(|info| info.run_id() == run_id)
            .cloned()
            .collect()
    }
}

impl fmt::Debug for BatchInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchInfo")
            .field("run_id", &self.run_id)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────
// 插件接口
// ─────────────────────────────────────────────────────────────

/// 只处理图像的插件
pub trait BasicPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// 插件提供的动作名称
    fn actions(&self) -> Vec<String>;

    /// 动作名 -> 运行 ID，未知动作返回 `None`
    fn run_id(&self, action: &str) -> Option<String>;

    /// 返回 `None` 表示该插件无法处理此图像
    fn run(&self, run_id: &str, image: &DynamicImage) -> Option<DynamicImage>;
}

/// 一次批处理插件调用的结果
#[derive(Debug, Default)]
pub struct PluginOutput {
    pub image: Option<DynamicImage>,
    pub info: Option<BatchInfo>,
}

/// 可收集元数据的批处理插件
pub trait BatchPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn actions(&self) -> Vec<String>;

    fn run_id(&self, action: &str) -> Option<String>;

    /// 在任何文件开始处理之前调用一次
    fn pre_load(&self) {}

    fn run(&self, run_id: &str, image: &DynamicImage, source: &Path) -> PluginOutput;

    /// 整个批处理结束后调用一次，只传入本插件运行 ID 的元数据
    fn post_load(&self, _infos: &[BatchInfo]) {}
}

/// 插件句柄
#[derive(Clone)]
pub enum PluginHandle {
    Basic(Arc<dyn BasicPlugin>),
    Batch(Arc<dyn BatchPlugin>),
}

impl PluginHandle {
    pub fn name(&self) -> &str {
        match self {
            PluginHandle::Basic(p) => p.name(),
            PluginHandle::Batch(p) => p.name(),
        }
    }

    pub fn actions(&self) -> Vec<String> {
        match self {
            PluginHandle::Basic(p) => p.actions(),
            PluginHandle::Batch(p) => p.actions(),
        }
    }

    pub fn run_id(&self, action: &str) -> Option<String> {
        match self {
            PluginHandle::Basic(p) => p.run_id(action),
            PluginHandle::Batch(p) => p.run_id(action),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PluginHandle::Basic(_) => "basic",
            PluginHandle::Batch(_) => "batch",
        }
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginHandle::{}({})", self.kind(), self.name())
    }
}

/// 解析完成的插件调用
#[derive(Debug, Clone)]
pub struct ResolvedPlugin {
    pub handle: PluginHandle,
    pub run_id: String,
}

// ─────────────────────────────────────────────────────────────
// 插件注册表
// ─────────────────────────────────────────────────────────────

/// 插件注册表
#[derive(Debug, Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<PluginHandle>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 包含内置插件的注册表
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_basic(Arc::new(builtin::ColorPlugin));
        registry.register_batch(Arc::new(builtin::StatisticsPlugin::default()));
        registry
    }

    /// 注册插件；同名插件会被替换
    pub fn register_basic(&mut self, plugin: Arc<dyn BasicPlugin>) {
        self.register(PluginHandle::Basic(plugin));
    }

    pub fn register_batch(&mut self, plugin: Arc<dyn BatchPlugin>) {
        self.register(PluginHandle::Batch(plugin));
    }

    fn register(&mut self, handle: PluginHandle) {
        self.plugins.retain(|p| p.name() != handle.name());
        self.plugins.push(handle);
    }

    pub fn get(&self, name: &str) -> Option<&PluginHandle> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginHandle> {
        self.plugins.iter()
    }

    /// 解析 `"插件名 | 动作名"` 描述符
    pub fn resolve(&self, descriptor: &str) -> Result<ResolvedPlugin> {
        let (plugin_name, action) = descriptor
            .split_once(DESCRIPTOR_SEPARATOR)
            .map(|(p, a)| (p.trim(), a.trim()))
            .filter(|(p, a)| !p.is_empty() && !a.is_empty())
            .ok_or_else(|| BatchError::InvalidPluginDescriptor(descriptor.to_string()))?;

        let handle = self
            .get(plugin_name)
            .ok_or_else(|| BatchError::Other(format!("Unknown plugin: {}", plugin_name)))?;

        let run_id = handle.run_id(action).ok_or_else(|| {
            BatchError::Other(format!(
                "Plugin '{}' has no action '{}'",
                plugin_name, action
            ))
        })?;

        Ok(ResolvedPlugin {
            handle: handle.clone(),
            run_id,
        })
    }
}
