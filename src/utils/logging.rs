/// 日志工具模块
///
/// 初始化 tracing，并提供启动 / 统计信息的输出函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::ExecutionReport;

/// 初始化 tracing 订阅者
///
/// 默认 `info`，`RUST_LOG` 优先；`verbose` 时本 crate 提升到 `debug`。
/// 重复初始化会被忽略。
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info,arg_txt_downloader=debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 发票 TXT 下载");
    match config.browser_debug_port {
        Some(port) => info!("🌐 浏览器: 连接调试端口 {}", port),
        None => info!("🌐 浏览器: 自行启动 (headless={})", config.headless),
    }
    info!(
        "🔁 最大重试: {}  ⏱ 执行超时: {}s",
        config.max_retries, config.execution_timeout_secs
    );
    if config.dry_run {
        info!("🔍 DRY RUN：只登录和查询，不下载");
    }
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(report: &ExecutionReport, report_file: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 执行 {} 完成统计 ({:?})", report.execution_id, report.status);
    info!(
        "完成时间: {}",
        report.finished_at.format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{} ({})", report.successful, report.processed, report.success_rate());
    if report.analyzed > 0 {
        info!("🔍 已找到 (dry run): {}", report.analyzed);
    }
    info!("➖ 未找到: {}", report.not_found);
    info!("❌ 失败: {}", report.failed);
    for (provider, counts) in &report.by_provider {
        info!(
            "   {}: 成功 {} / 未找到 {} / 失败 {}",
            provider,
            counts.successful,
            counts.not_found,
            counts.failed
        );
    }
    let failed = report.failed_invoices();
    if !failed.is_empty() {
        info!("失败发票: {}", truncate_text(&failed.join(", "), 200));
    }
    info!("{}", "=".repeat(60));
    info!("\n报告已保存至: {}", report_file);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
