use colored::*;
use ecoscan_core::analyzer::report::{format_bytes, AnalysisReport, Finding, Metrics, Severity};
use ecoscan_core::guidelines::{Guidelines, STATIC_GUIDELINES};
use ecoscan_core::PipelineEvent;

pub fn print_banner(target: &str) {
    println!();
    println!(
        "{}",
        format!(" ecoscan v{} | Analyzing {}", env!("CARGO_PKG_VERSION"), target).bold()
    );
    println!();
}

/// Render one pipeline event as it arrives.
pub fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::Progress { message } => {
            println!(" {} {}", "..".dimmed(), message.dimmed());
        }
        PipelineEvent::Metrics { data } => print_metrics(data),
        PipelineEvent::Finding { data } => {
            println!(
                " {} {} {}",
                "+".cyan(),
                data.kind.label(),
                format!("({})", data.location()).dimmed()
            );
        }
        PipelineEvent::Result { report } => print_report(report),
        PipelineEvent::Error { message } => {
            eprintln!();
            eprintln!(" {} {}", "ERROR".on_red().white().bold(), message);
        }
    }
}

fn print_metrics(metrics: &Metrics) {
    println!();
    println!(" {}", "Resource Footprint (gzip)".bold().underline());
    println!(" {} Total:          {}", "|-".dimmed(), format_bytes(metrics.total_bytes));
    println!(" {} Images:         {}", "|-".dimmed(), format_bytes(metrics.image_bytes));
    println!(" {} Scripts/styles: {}", "|-".dimmed(), format_bytes(metrics.js_bytes));
    println!(" {} Source code:    {}", "|-".dimmed(), format_bytes(metrics.code_bytes));
    println!(
        " {} Third-party references: {}",
        "|-".dimmed(),
        metrics.third_party_requests
    );
    if !metrics.uncompressed_assets.is_empty() {
        println!(
            " {} Large script/style assets: {}",
            "|-".dimmed(),
            metrics.uncompressed_assets.len().to_string().yellow()
        );
    }
    println!();
}

/// Print the ranked report.
pub fn print_report(report: &AnalysisReport) {
    println!();
    println!(" {}", "=".repeat(60).dimmed());
    println!();

    if report.findings.is_empty() {
        println!(
            " {} No sustainability issues detected.",
            "OK".green().bold()
        );
    } else {
        for finding in &report.findings {
            print_finding(finding);
            println!();
        }
    }

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    println!(" {}", "Summary".bold().underline());
    let high = report.high_count();
    println!(
        " {} Findings: {} high, {} medium, {} low",
        "|-".dimmed(),
        if high > 0 {
            high.to_string().red().bold().to_string()
        } else {
            "0".to_string()
        },
        report.medium_count(),
        report.low_count(),
    );
    println!(
        " {} Total weight: {}",
        "|-".dimmed(),
        report.total_weight().to_string().bold()
    );
    println!(
        " {} Generated at {}",
        "|-".dimmed(),
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
}

fn severity_tag(severity: Severity) -> String {
    let label = format!(" {} ", severity.symbol());
    match severity {
        Severity::High => label.on_red().white().bold().to_string(),
        Severity::Medium => label.on_yellow().black().bold().to_string(),
        Severity::Low => label.dimmed().to_string(),
    }
}

fn print_finding(finding: &Finding) {
    println!(
        " {} {} {}",
        severity_tag(finding.severity),
        finding.kind.label().bold(),
        format!("[weight {}]", finding.weight).dimmed()
    );
    println!("   {} {}", "|".dimmed(), finding.location().cyan());
    println!("   {} {}", "|".dimmed(), finding.impact);
    println!("   {} {}", "|".dimmed(), finding.remediation.dimmed());
    if finding.kind.is_static() && finding.rule_severity != finding.severity {
        println!(
            "   {} Detected as {}",
            "|".dimmed(),
            finding.rule_severity.as_str()
        );
    }
}

/// Print the guideline catalogue and the weight table.
pub fn print_guidelines(guidelines: &Guidelines) {
    println!();
    println!(" {}", "Static checks".bold().underline());
    for guideline in STATIC_GUIDELINES {
        println!(" {} {}", "|-".dimmed(), guideline);
    }
    println!();

    println!(" {}", "AI-assisted checks".bold().underline());
    for guideline in guidelines.assisted() {
        println!(" {} {}", "|-".dimmed(), guideline);
    }
    println!();

    println!(" {}", "Weights".bold().underline());
    for (kind, weight) in guidelines.weights() {
        println!(" {} {:<24} {}", "|-".dimmed(), kind, weight.to_string().cyan());
    }
    println!();
}
