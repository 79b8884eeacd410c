//! Fields command - list the output schema.

use console::style;

use cupon_core::models::record::FieldKind;
use cupon_core::Field;

fn describe(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "text, uppercased",
        FieldKind::Digits => "digits only",
        FieldKind::Code => "digits and uppercase letters",
        FieldKind::Raw => "as printed",
    }
}

/// Column name and normalization of every field, in CSV order.
fn schema() -> Vec<(&'static str, &'static str)> {
    Field::ALL.into_iter().map(|f| (f.column(), describe(f.kind()))).collect()
}

pub fn run() -> anyhow::Result<()> {
    let rows = schema();
    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);

    println!("{}", style("Output columns (after SourceFile):").bold());
    for (name, kind) in rows {
        println!("  {:<width$}  {}", style(name).cyan(), kind, width = width);
    }
    Ok(())
}
