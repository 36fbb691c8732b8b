use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use onmodel_core::domain::ReferenceImage;
use onmodel_core::store::StudioStore;
use onmodel_core::{retrieval, settings, Studio};

pub fn run<S: StudioStore>(
    studio: &Studio<S>,
    image: &Path,
    angle: Option<&str>,
    limit: usize,
) -> Result<()> {
    let bytes = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let angle = match angle {
        Some(raw) => settings::parse_angle(raw)?,
        None => studio.settings().angle_tag,
    };

    let catalog = studio.catalog();
    let ranked = retrieval::rank(&bytes, &catalog.enabled_packs(), angle, limit);
    if ranked.is_empty() {
        println!("No references in the enabled packs.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#"),
        Cell::new("Score"),
        Cell::new("Pack"),
        Cell::new("Image"),
        Cell::new("Tags"),
    ]);
    for (rank, reference) in ranked.iter().enumerate() {
        let pack_name = catalog
            .pack(&reference.pack_id)
            .map(|p| p.name.as_str())
            .unwrap_or("?");
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(format_score(reference)),
            Cell::new(pack_name),
            Cell::new(&reference.id),
            Cell::new(reference.tags.iter().cloned().collect::<Vec<_>>().join(", ")),
        ]);
    }

    println!("  Ranked for {angle}");
    println!("{table}");
    Ok(())
}

fn format_score(reference: &ReferenceImage) -> String {
    reference
        .similarity
        .map(|s| format!("{s:.3}"))
        .unwrap_or_else(|| "-".to_string())
}
