use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use onmodel_core::domain::ReferencePack;
use onmodel_core::error::Error;
use onmodel_core::store::StudioStore;
use onmodel_core::Studio;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "tif", "tiff"];

pub fn list<S: StudioStore>(studio: &Studio<S>) -> Result<()> {
    let catalog = studio.catalog();
    if catalog.packs().is_empty() {
        println!("No reference packs. Create one with `onmodel packs create <NAME>`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Images"),
        Cell::new("Size"),
        Cell::new("Enabled"),
        Cell::new("Created"),
    ]);

    for pack in catalog.packs() {
        let enabled = if catalog.is_enabled(&pack.id) {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(&pack.id),
            Cell::new(&pack.name),
            Cell::new(pack.images.len()),
            Cell::new(format_size(pack_size(pack))),
            enabled,
            Cell::new(pack.created_at.format("%Y-%m-%d")),
        ]);
    }

    println!("{table}");
    println!(
        "  {} packs, {} enabled, {} images",
        catalog.packs().len(),
        catalog.enabled_ids().len(),
        catalog.image_count()
    );
    Ok(())
}

pub fn create<S: StudioStore>(studio: &mut Studio<S>, name: &str, description: &str) -> Result<()> {
    let id = studio.create_pack(name, description)?;
    println!("Created pack: {} ({id})", name.trim());
    Ok(())
}

pub fn remove<S: StudioStore>(studio: &mut Studio<S>, id: &str) -> Result<()> {
    let pack = studio.delete_pack(id)?;
    println!(
        "Removed pack: {} ({} images removed from catalog)",
        pack.name,
        pack.images.len()
    );
    Ok(())
}

pub fn show<S: StudioStore>(studio: &Studio<S>, id: &str) -> Result<()> {
    let pack = studio
        .catalog()
        .pack(id)
        .ok_or_else(|| Error::PackNotFound(id.to_string()))?;

    println!();
    println!("  {}", pack.name);
    if !pack.description.is_empty() {
        println!("  {}", pack.description);
    }
    println!();

    if pack.images.is_empty() {
        println!("  (no images)");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Image"),
        Cell::new("Tags"),
        Cell::new("Size"),
        Cell::new("SHA-256"),
    ]);
    for image in &pack.images {
        let tags: Vec<&str> = image.tags.iter().map(String::as_str).collect();
        let sha = image.sha256.as_deref().map(short_hash).unwrap_or("-");
        table.add_row(vec![
            Cell::new(&image.id),
            Cell::new(tags.join(", ")),
            Cell::new(format_size(image.data.len() as u64)),
            Cell::new(sha),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn set_enabled<S: StudioStore>(studio: &mut Studio<S>, id: &str, enabled: bool) -> Result<()> {
    studio.set_pack_enabled(id, enabled)?;
    let state = if enabled { "enabled" } else { "disabled" };
    println!("Pack {id} {state}.");
    Ok(())
}

pub fn import<S: StudioStore>(
    studio: &mut Studio<S>,
    id: &str,
    paths: &[PathBuf],
    tags: &[String],
) -> Result<()> {
    if studio.catalog().pack(id).is_none() {
        bail!(Error::PackNotFound(id.to_string()));
    }
    let files = collect_image_files(paths);
    if files.is_empty() {
        bail!("no image files found in the given paths");
    }
    let tags: BTreeSet<String> = tags.iter().cloned().collect();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("  {bar:30.cyan/blue} {pos:>4}/{len:<4} {msg}")?
            .progress_chars("━╸─"),
    );

    let mut imported = 0usize;
    let mut duplicates = 0usize;
    let mut failed = 0usize;
    for path in &files {
        pb.set_message(display_name(path));
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        match studio.import_reference(id, bytes, tags.clone()) {
            Ok(_) => imported += 1,
            Err(Error::DuplicateReference { image_id, .. }) => {
                duplicates += 1;
                tracing::debug!(path = %path.display(), %image_id, "already in pack");
            }
            Err(e) => {
                failed += 1;
                pb.suspend(|| tracing::warn!(path = %path.display(), error = %e, "skipped reference image"));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message(format!(
        "{imported} imported, {duplicates} duplicates, {failed} failed"
    ));
    Ok(())
}

/// Expand `paths` into image files: files are taken as-is, directories are
/// walked for known image extensions. Sorted and deduplicated.
pub(crate) fn collect_image_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                if has_image_extension(entry.path()) {
                    files.insert(entry.into_path());
                }
            }
        } else {
            files.insert(path.clone());
        }
    }
    files.into_iter().collect()
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn pack_size(pack: &ReferencePack) -> u64 {
    pack.images.iter().map(|i| i.data.len() as u64).sum()
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

pub(crate) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    match bytes {
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{} B", b),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_hash("abc"), "abc");
    }

    #[test]
    fn test_has_image_extension() {
        assert!(has_image_extension(Path::new("a/b.PNG")));
        assert!(has_image_extension(Path::new("sheet.jpeg")));
        assert!(!has_image_extension(Path::new("notes.txt")));
        assert!(!has_image_extension(Path::new("no_extension")));
    }

    #[test]
    fn test_collect_walks_directories_and_keeps_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("refs");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("front.png"), b"x").unwrap();
        fs::write(dir.join("nested/profile.JPG"), b"x").unwrap();
        fs::write(dir.join("readme.txt"), b"x").unwrap();
        let explicit = tmp.path().join("loose.dat");
        fs::write(&explicit, b"x").unwrap();

        let files = collect_image_files(&[dir.clone(), explicit.clone(), dir.join("front.png")]);
        assert_eq!(
            files,
            vec![
                explicit,
                dir.join("front.png"),
                dir.join("nested/profile.JPG"),
            ]
        );
    }

    #[test]
    fn test_import_skips_undecodable_files() {
        use std::io::Cursor;

        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("front.png");
        let mut buf = Vec::new();
        image::RgbImage::from_fn(8, 8, |x, y| image::Rgb([(x * 30) as u8, (y * 30) as u8, 0]))
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        fs::write(&good, &buf).unwrap();
        fs::write(tmp.path().join("broken.png"), b"not an image").unwrap();

        let mut studio = Studio::open(onmodel_core::store::MemoryStore::new());
        let id = studio.create_pack("Imports", "").unwrap();
        import(&mut studio, &id, &[tmp.path().to_path_buf()], &["Front".to_string()]).unwrap();

        let pack = studio.catalog().pack(&id).unwrap();
        assert_eq!(pack.images.len(), 1);
        assert!(pack.images[0].has_tag("Front"));
    }
}
