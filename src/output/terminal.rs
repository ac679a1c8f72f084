// Terminal rendering of extraction results.

use colored::Colorize;

use super::{DocumentResult, ValidationSummary};

/// Truncate a string to at most `max_chars` characters, appending "..." if
/// truncated. Character-based so multi-byte names never split mid-glyph.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

fn meta_or_dash(value: &str) -> String {
    if value.trim().is_empty() {
        "-".dimmed().to_string()
    } else {
        value.to_string()
    }
}

/// Print one extracted document as a summary table.
pub fn print_document(doc: &DocumentResult) {
    println!("{}", "Document".bold());
    println!("  Hospital:  {}", meta_or_dash(&doc.hospital_name));
    println!("  Client:    {}", meta_or_dash(&doc.client_name));
    println!("  Patient:   {}", meta_or_dash(&doc.patient_name));
    println!("  Date:      {}", meta_or_dash(&doc.inspection_date));

    if doc.tests.is_empty() {
        println!("  {}", "no tests extracted".yellow());
        return;
    }

    println!(
        "  {:<14} {:>10} {:<10} {:>9} {:>9}",
        "CODE".bold(),
        "VALUE".bold(),
        "UNIT".bold(),
        "REF MIN".bold(),
        "REF MAX".bold(),
    );
    for test in &doc.tests {
        let fmt_num =
            |v: Option<f64>| v.map(|x| format!("{x}")).unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<14} {:>10} {:<10} {:>9} {:>9}",
            truncate_chars(&test.code, 14),
            fmt_num(test.value),
            truncate_chars(test.unit.as_deref().unwrap_or("-"), 10),
            fmt_num(test.reference_min),
            fmt_num(test.reference_max),
        );
    }
}

/// Print a validation summary line.
pub fn print_validation(summary: &ValidationSummary) {
    let rejected = if summary.rejected > 0 {
        summary.rejected.to_string().yellow().to_string()
    } else {
        summary.rejected.to_string()
    };
    println!(
        "  {} tests: {} accepted, {} rejected",
        summary.total, summary.accepted, rejected
    );
}
