use std::path::Path;

use comfy_table::{presets, CellAlignment, Table};
use serde::Serialize;

use pezap::PatchReport;

/// What one run changed, as printed to the user or emitted as JSON.
#[derive(Debug, Serialize)]
pub struct PatchSummary {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdb: Option<String>,
    dry_run: bool,
    signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdb_timestamp: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdb_age: Option<u32>,
    patches: Vec<PatchInfo>,
}

#[derive(Debug, Serialize)]
struct PatchInfo {
    field: &'static str,
    offset: String,
    size: usize,
}

impl PatchSummary {
    pub fn new(image: &Path, pdb: Option<&Path>, report: &PatchReport) -> Self {
        PatchSummary {
            image: image.display().to_string(),
            pdb: pdb.map(|pdb| pdb.display().to_string()),
            dry_run: report.is_dry_run(),
            signature: report.signature().to_string(),
            pdb_timestamp: report.pdb_header().map(|header| header.timestamp),
            pdb_age: report.pdb_header().map(|header| header.age),
            patches: report
                .patches()
                .iter()
                .map(|patch| PatchInfo {
                    field: patch.label,
                    offset: format!("0x{:08x}", patch.offset),
                    size: patch.length,
                })
                .collect(),
        }
    }

    /// Pretty JSON for `--json`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable report: a short header followed by the patched fields.
    pub fn to_text(&self) -> String {
        let verb = if self.dry_run { "Would patch" } else { "Patched" };
        let mut text = format!("{} {} fields in {}\n", verb, self.patches.len(), self.image);
        if let Some(pdb) = &self.pdb {
            text.push_str(&format!("PDB:        {}\n", pdb));
        }
        text.push_str(&format!("Signature:  {}\n\n", self.signature));

        let table = self.patch_table().to_string();
        for line in table.lines().filter(|line| !line.trim().is_empty()) {
            text.push_str("  ");
            text.push_str(line.trim_end());
            text.push('\n');
        }
        text
    }

    /// Borderless table with one row per patched field.
    fn patch_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_header(vec!["Offset", "Size", "Field"]);
        for patch in &self.patches {
            table.add_row(vec![
                patch.offset.clone(),
                patch.size.to_string(),
                patch.field.to_string(),
            ]);
        }

        for (index, alignment) in [CellAlignment::Right, CellAlignment::Right, CellAlignment::Left]
            .into_iter()
            .enumerate()
        {
            if let Some(column) = table.column_mut(index) {
                column.set_cell_alignment(alignment);
                column.set_padding((u16::from(index > 0), u16::from(index < 2)));
            }
        }
        table
    }
}
