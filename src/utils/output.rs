//! # 美化输出工具
//!
//! 提供统一的终端输出样式与批处理汇总行。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 模块使用
//! - 使用 `colored` crate

use colored::Colorize;

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印跳过消息
pub fn print_skip(msg: &str) {
    println!("{} {}", "[SKIP]".dimmed(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印批处理汇总
pub fn print_summary(processed: usize, failures: usize, total: usize) {
    let succeeded = processed.saturating_sub(failures);
    let not_processed = total.saturating_sub(processed);

    let mut parts = vec![format!("{} succeeded", succeeded.to_string().green())];
    if failures > 0 {
        parts.push(format!("{} failed", failures.to_string().red()));
    }
    if not_processed > 0 {
        parts.push(format!("{} not processed", not_processed.to_string().yellow()));
    }

    print_done(&format!("{} of {} file(s): {}", processed, total, parts.join(", ")));
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 打印分隔线
pub fn print_separator() {
    println!("{}", "─".repeat(60).dimmed());
}
