//! # 插件链步骤
//!
//! 按顺序对图像执行若干插件动作。
//!
//! ## 功能
//! - 构造时解析所有描述符；无法解析的条目记录警告后跳过
//! - 单个插件失败只记日志，不中断插件链
//! - 批处理插件的 `BatchInfo` 交给批处理项收集，结束后按运行 ID 分发
//!
//! ## 依赖关系
//! - 实现 `steps::BatchStep`
//! - 使用 `plugins::PluginRegistry` 解析描述符

use super::{BatchStep, StepOutcome};
use crate::batch::log::LogEvent;
use crate::imaging::ImageDoc;
use crate::plugins::{BatchInfo, PluginHandle, PluginRegistry, ResolvedPlugin};

use tracing::{debug, warn};

const STEP_NAME: &str = "[Plugin Batch]";

/// 插件链步骤
#[derive(Debug, Clone)]
pub struct PluginStep {
    descriptors: Vec<String>,
    plugins: Vec<ResolvedPlugin>,
    unresolved: Vec<String>,
}

impl PluginStep {
    /// 从注册表解析插件描述符
    pub fn resolve<S: AsRef<str>>(descriptors: &[S], registry: &PluginRegistry) -> Self {
        let mut plugins = Vec::new();
        let mut unresolved = Vec::new();

        for descriptor in descriptors.iter().map(AsRef::as_ref) {
            match registry.resolve(descriptor) {
                Ok(resolved) => {
                    debug!(
                        plugin = resolved.handle.name(),
                        run_id = %resolved.run_id,
                        "plugin resolved"
                    );
                    plugins.push(resolved);
                }
                Err(e) => {
                    warn!("could not load plugin '{}': {}", descriptor, e);
                    unresolved.push(descriptor.to_string());
                }
            }
        }

        Self {
            descriptors: descriptors.iter().map(|d| d.as_ref().to_string()).collect(),
            plugins,
            unresolved,
        }
    }

    /// 无法解析的描述符
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }
}

impl BatchStep for PluginStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn is_active(&self) -> bool {
        !self.descriptors.is_empty()
    }

    fn compute(
        &self,
        doc: &mut ImageDoc,
        log: &mut Vec<LogEvent>,
        batch_info: &mut Vec<BatchInfo>,
    ) -> StepOutcome {
        if !self.is_active() {
            log.push(LogEvent::StepInactive {
                step: STEP_NAME.to_string(),
            });
            return StepOutcome::Skipped;
        }

        for plugin in &self.plugins {
            let result = match &plugin.handle {
                PluginHandle::Basic(p) => p.run(&plugin.run_id, &doc.image),
                PluginHandle::Batch(p) => {
                    let output = p.run(&plugin.run_id, &doc.image, &doc.source);
                    batch_info.extend(output.info);
                    output.image
                }
            };

            match result {
                Some(image) if image.width() > 0 && image.height() > 0 => doc.image = image,
                _ => log.push(LogEvent::PluginFailed {
                    step: STEP_NAME.to_string(),
                    plugin: plugin.handle.name().to_string(),
                }),
            }
        }

        if doc.is_null() {
            log.push(LogEvent::StepError {
                step: STEP_NAME.to_string(),
                message: "could not apply plugins.".to_string(),
            });
            return StepOutcome::Failed;
        }

        log.push(LogEvent::PluginsApplied {
            step: STEP_NAME.to_string(),
        });
        StepOutcome::Applied
    }

    fn pre_load(&self) {
        for plugin in &self.plugins {
            if let PluginHandle::Batch(p) = &plugin.handle {
                p.pre_load();
            }
        }
    }

    fn post_load(&self, batch_info: &[BatchInfo]) {
        for plugin in &self.plugins {
            if let PluginHandle::Batch(p) = &plugin.handle {
                debug!(plugin = p.name(), run_id = %plugin.run_id, "post load");
                p.post_load(&BatchInfo::filter(batch_info, &plugin.run_id));
            }
        }
    }
}
