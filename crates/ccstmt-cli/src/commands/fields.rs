//! Fields command - list extractable fields.

use console::style;

use ccstmt_core::FieldSpec;

pub fn run() -> anyhow::Result<()> {
    println!("{}", style("Extractable fields:").bold());
    for field in FieldSpec::ALL {
        println!("  {:<20} {}", style(field.as_str()).cyan(), field.description());
    }
    Ok(())
}
