//! # run 命令实现
//!
//! 将命令行参数组装为批处理配置并执行。
//!
//! ## 功能
//! - 收集输入文件（文件/目录，glob 匹配，可递归）
//! - 按参数构建处理链：缩放 -> 变换 -> 插件
//! - 后台执行批处理，进度条显示完成数，Ctrl-C 取消未开始的文件
//! - 结果表格、失败汇总、可选的完整日志与 CSV 报告
//!
//! ## 依赖关系
//! - 使用 `cli/run.rs` 定义的参数
//! - 使用 `batch/`, `steps/`, `plugins/`
//! - 使用 `utils/output.rs`, `utils/progress.rs`, `utils/report.rs`

use crate::batch::runner::CancelToken;
use crate::batch::{BatchConfig, BatchRunner, FileCollector, ItemStatus, OverwriteMode};
use crate::cli::run::RunArgs;
use crate::error::{BatchError, Result};
use crate::plugins::builtin::StatisticsPlugin;
use crate::plugins::PluginRegistry;
use crate::steps::{BatchStep, PluginStep, ResizeStep, TransformStep};
use crate::utils::progress::ProgressObserver;
use crate::utils::{output, report};

use std::sync::{Arc, Mutex, Once, PoisonError};
use tabled::Table;
use tracing::{debug, warn};

/// 当前运行的取消标记，由 Ctrl-C 处理函数触发
static ACTIVE_RUN: Mutex<Option<CancelToken>> = Mutex::new(None);
static INTERRUPT_HANDLER: Once = Once::new();

/// 执行 run 命令
pub fn execute(args: RunArgs) -> Result<()> {
    output::print_header("Batch Image Processing");

    let files = FileCollector::new(args.inputs.clone())
        .with_pattern(&args.pattern)
        .recursive(args.recursive)
        .collect();

    if files.is_empty() {
        return Err(BatchError::EmptyFileList);
    }
    output::print_info(&format!("Found {} file(s) to process", files.len()));

    // 统计插件单独持有，以便运行结束后读取汇总
    let statistics = Arc::new(StatisticsPlugin::default());
    let mut registry = PluginRegistry::with_builtins();
    registry.register_batch(statistics.clone());

    let steps = build_steps(&args, &registry)?;
    if steps.is_empty() {
        output::print_info("No processing steps given: files are copied or renamed");
    } else {
        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        output::print_info(&format!("Steps: {}", names.join(" -> ")));
    }

    let mode = if args.overwrite {
        OverwriteMode::Overwrite
    } else {
        OverwriteMode::SkipExisting
    };

    let config = BatchConfig::new(files, &args.output, &args.name)
        .with_mode(mode)
        .with_delete_original(args.delete_original)
        .with_input_dir_as_output(args.same_dir)
        .with_compression(args.compression)
        .with_steps(steps);
    debug!(?config, "batch configuration");

    let total = config.files().len();
    let observer = Arc::new(ProgressObserver::new(total, "Processing"));
    let mut runner = BatchRunner::new(config, args.jobs)?.with_observer(observer);

    output::print_info(&format!("Using {} parallel job(s)", runner.jobs()));
    watch_interrupt(Some(runner.cancel_token()));
    runner.compute()?;
    runner.wait_for_finished();
    watch_interrupt(None);

    // 结果表格
    let reports = runner.item_reports();
    println!("{}", Table::new(&reports));

    if args.show_log {
        output::print_header("Processing Log");
        for line in runner.log() {
            println!("{}", line);
        }
    }

    if let Some(ref path) = args.report {
        report::write_csv(&reports, path)?;
        output::print_success(&format!("Report saved to '{}'", path.display()));
    }

    if let Some(summary) = statistics.summary() {
        output::print_info(&format!(
            "Brightness over {} image(s): mean {:.1}, min {:.1}, max {:.1}",
            summary.count, summary.mean, summary.min, summary.max
        ));
    }

    // 汇总
    output::print_separator();
    for line in runner.result_list() {
        if line.ends_with("[FAIL]") {
            output::print_skip(&line);
        }
    }

    let total = runner.num_items();
    let results = runner.current_results();
    let failures = count_status(results, ItemStatus::Failed);
    let processed = failures + count_status(results, ItemStatus::Succeeded);
    if processed < total {
        output::print_warning(&format!(
            "Cancelled: {} file(s) were not processed",
            total - processed
        ));
    }
    output::print_summary(processed, failures, total);

    Ok(())
}

fn count_status(results: &[ItemStatus], status: ItemStatus) -> usize {
    results.iter().filter(|s| **s == status).count()
}

/// 让 Ctrl-C 取消给定的运行；处理函数只安装一次
fn watch_interrupt(token: Option<CancelToken>) {
    *ACTIVE_RUN.lock().unwrap_or_else(PoisonError::into_inner) = token;

    INTERRUPT_HANDLER.call_once(|| {
        let installed = ctrlc::set_handler(|| {
            let active = ACTIVE_RUN.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(token) = active.as_ref() {
                token.cancel();
            }
        });
        if let Err(e) = installed {
            warn!("could not install Ctrl-C handler: {}", e);
        }
    });
}

/// 按参数构建处理链
fn build_steps(args: &RunArgs, registry: &PluginRegistry) -> Result<Vec<Box<dyn BatchStep>>> {
    let mut steps: Vec<Box<dyn BatchStep>> = Vec::new();

    if let Some(target) = args.scale {
        let resize = ResizeStep::new(target)?
            .with_mode(args.resize_mode)
            .with_policy(args.resize_policy)
            .with_interpolation(args.interpolation)
            .with_gamma_correction(args.gamma_correct);
        steps.push(Box::new(resize));
    }

    if args.rotate != 0 || args.flip_h || args.flip_v || args.crop_from_metadata {
        let transform = TransformStep::new(args.rotate)?
            .with_flips(args.flip_h, args.flip_v)
            .with_crop_from_metadata(args.crop_from_metadata);
        steps.push(Box::new(transform));
    }

    if !args.plugins.is_empty() {
        let plugin_step = PluginStep::resolve(&args.plugins, registry);
        for descriptor in plugin_step.unresolved() {
            output::print_warning(&format!("Could not load plugin '{}'", descriptor));
        }
        steps.push(Box::new(plugin_step));
    }

    Ok(steps)
}
