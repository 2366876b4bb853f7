//! Offline extraction from a saved analysis response

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use billscan_core::{derive_discount, extract_expense_with, AnalysisResult, ExtractOptions, Extraction};
use tracing::debug;

/// Parse an analysis response file ("-" reads stdin) and extract its fields
pub fn extract_file(file: &Path, raw_items: bool) -> Result<Extraction> {
    let json = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?
    };

    let analysis: AnalysisResult =
        serde_json::from_str(&json).context("File is not an expense analysis response")?;
    debug!(
        path = %file.display(),
        documents = analysis.expense_documents.len(),
        "Parsed analysis response"
    );

    let options = ExtractOptions {
        normalize_item_text: !raw_items,
    };
    let extraction =
        extract_expense_with(&analysis, options).context("Failed to extract expense fields")?;

    Ok(extraction)
}

pub fn cmd_extract(file: &Path, discount: bool, raw_items: bool) -> Result<()> {
    let extraction = extract_file(file, raw_items)?;

    let mut output = serde_json::to_value(&extraction)?;
    if discount {
        output["discount"] = match derive_discount(&extraction.summary.total) {
            Ok(d) => serde_json::json!(d),
            Err(e) => {
                eprintln!("⚠️  No discount: {}", e);
                serde_json::Value::Null
            }
        };
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
