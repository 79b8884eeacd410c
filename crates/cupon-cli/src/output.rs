//! Record rendering and the appending CSV writer.

use std::fs::OpenOptions;
use std::path::Path;

use console::style;

use cupon_core::{ExtractedRecord, MissingSummary};

/// Append records to a CSV file, writing the header only when the file is new or empty.
///
/// Rows are never deduplicated. Returns the number of rows written.
pub fn append_csv(path: &Path, records: &[ExtractedRecord], not_found_label: &str) -> anyhow::Result<usize> {
    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);

    if is_new {
        wtr.write_record(ExtractedRecord::header())?;
    }
    for record in records {
        wtr.write_record(record.columns(not_found_label).iter().map(|(_, v)| *v))?;
    }

    wtr.flush()?;
    Ok(records.len())
}

/// Header plus one row.
pub fn record_csv(record: &ExtractedRecord, not_found_label: &str) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(ExtractedRecord::header())?;
    wtr.write_record(record.columns(not_found_label).iter().map(|(_, v)| *v))?;
    Ok(String::from_utf8(wtr.into_inner()?)?)
}

pub fn record_json(record: &ExtractedRecord) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(record)?)
}

/// Aligned `column: value` lines.
pub fn record_text(record: &ExtractedRecord, not_found_label: &str) -> String {
    let columns = record.columns(not_found_label);
    let width = columns.iter().map(|(name, _)| name.len()).max().unwrap_or(0);

    let mut output = String::new();
    for (name, value) in columns {
        output.push_str(&format!("{:<width$}  {}\n", name, value, width = width));
    }
    output
}

/// Rule that resolved each field.
pub fn explain(record: &ExtractedRecord) -> String {
    let mut output = format!("Mode: {:?}\n", record.mode());
    for (field, value) in record.fields() {
        match record.provenance(field) {
            Some(rule) => output.push_str(&format!("  {:<18} {:<24} {}\n", field.column(), rule, value)),
            None => output.push_str(&format!("  {:<18} {}\n", field.column(), style("-").dim())),
        }
    }
    output
}

/// Print per-field miss counts with sample file names.
pub fn print_missing(summary: &MissingSummary) {
    if summary.is_empty() {
        println!("{} Every field was found in every document", style("✓").green());
        return;
    }

    println!("{}", style("Missing fields:").yellow());
    for (field, count, samples) in summary.iter() {
        println!("  {:<18} {:>5}  {}", field.column(), count, samples.join(", "));
    }
}
