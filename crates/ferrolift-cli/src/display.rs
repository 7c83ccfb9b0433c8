//! Console output for the ferrolift CLI

use console::style;
use ferrolift_config::UnitConfig;
use ferrolift_engine::UnitReport;
use ferrolift_types::TransferStats;
use std::time::Duration;

/// Print the statistics of every unit, then a total line
pub fn display_reports(reports: &[UnitReport]) {
    println!();
    println!("{}", style("Transfer Statistics:").bold().underlined());
    let mut totals = TransferStats::new();
    for report in reports {
        display_report(report);
        totals.merge(&report.stats);
    }
    if reports.len() > 1 {
        println!();
        println!(
            "  {} {} files, {}",
            style("Total:").bold(),
            style(totals.files_transferred).green(),
            style(format_bytes(totals.bytes_transferred)).green()
        );
    }
}

fn display_report(report: &UnitReport) {
    let stats = &report.stats;
    println!();
    println!(
        "  {} {}",
        style(&report.unit).cyan().bold(),
        style(format!("({})", report.kind)).dim()
    );
    println!("    Files found: {}", style(report.files_found).green());
    println!("    Files transferred: {}", style(stats.files_transferred).green());
    println!(
        "    Bytes transferred: {}",
        style(format_bytes(stats.bytes_transferred)).green()
    );
    println!("    Files skipped: {}", style(stats.files_skipped).yellow());
    println!("    Sources removed: {}", style(stats.sources_removed).green());
    println!(
        "    Failures: {}",
        if stats.files_failed > 0 {
            style(stats.files_failed).red()
        } else {
            style(stats.files_failed).green()
        }
    );
    println!(
        "    Duration: {}",
        style(format_duration(report.elapsed)).blue()
    );
    println!(
        "    Transfer rate: {}",
        style(format!("{:.2} MB/s", stats.transfer_rate() / 1024.0 / 1024.0)).blue()
    );
}

/// Print the resolved units of a configuration
pub fn display_units(units: &[UnitConfig]) {
    println!();
    println!("{}", style("Enabled units:").bold().underlined());
    for unit in units {
        println!(
            "  {} {} {} {} {} {}",
            style(&unit.name).cyan().bold(),
            style(format!("[{}]", unit.kind)).dim(),
            style(format!("{}:{}", unit.source.label(), unit.source_path.display())).green(),
            style("→").bold(),
            style(format!("{}:{}", unit.target.label(), unit.target_path.display())).green(),
            style(format!(
                "workers={} throughput={}Mbps scan={}",
                unit.workers.get(),
                unit.throughput.get(),
                format_duration(unit.scan_interval)
            ))
            .dim()
        );
    }
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Display a warning message with proper formatting
pub fn display_warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
}

/// Display a success message with proper formatting
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), style(message).green());
}

/// Display an info message with proper formatting
pub fn display_info(message: &str) {
    println!("{} {}", style("ℹ").blue().bold(), style(message).blue());
}
