//! Snapshot inspection commands.
//!
//! Each command writes its report to the given writer so it can be checked
//! without a terminal.

use std::io::Write;
use std::path::Path;

use easel_common::{EaselError, ParseError};
use easel_editor_core::{
    Document, SnapshotKey, SnapshotRecord, SnapshotStore, collect_font_requests, discover_parameters,
};
use miette::{IntoDiagnostic, Result};

fn require(store: &impl SnapshotStore, key: &SnapshotKey) -> Result<SnapshotRecord> {
    store
        .get(key)?
        .ok_or_else(|| miette::miette!(help = "run `easel list` to see stored keys", "no snapshot stored under {key}"))
}

pub fn list(store: &impl SnapshotStore, out: &mut impl Write) -> Result<()> {
    let keys = store.keys()?;
    if keys.is_empty() {
        writeln!(out, "No snapshots stored").into_diagnostic()?;
        return Ok(());
    }
    for key in keys {
        let written = match store.get(&key) {
            Ok(Some(record)) => writeln!(
                out,
                "{key}\t{}\t{} objects\t{}",
                record.written_at.format("%Y-%m-%d %H:%M:%S"),
                record.document.objects.len(),
                record.document.display_name(),
            ),
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "unreadable snapshot");
                writeln!(out, "{key}\tunreadable")
            }
        };
        written.into_diagnostic()?;
    }
    Ok(())
}

pub fn show(store: &impl SnapshotStore, key: &SnapshotKey, out: &mut impl Write) -> Result<()> {
    let record = require(store, key)?;
    let json = record.document.to_json_pretty().into_diagnostic()?;
    writeln!(out, "{json}").into_diagnostic()
}

pub fn fonts(store: &impl SnapshotStore, key: &SnapshotKey, out: &mut impl Write) -> Result<()> {
    let record = require(store, key)?;
    for request in collect_font_requests(&record.document) {
        writeln!(out, "{}\t{}", request.family, request.url).into_diagnostic()?;
    }
    Ok(())
}

pub fn params(store: &impl SnapshotStore, key: &SnapshotKey, out: &mut impl Write) -> Result<()> {
    let record = require(store, key)?;
    for name in discover_parameters(&record.document).keys() {
        writeln!(out, "{name}").into_diagnostic()?;
    }
    Ok(())
}

/// Read a design file, reporting JSON errors against its contents.
pub fn read_design(file: &Path) -> Result<Document, EaselError> {
    let contents = std::fs::read_to_string(file).map_err(|e| EaselError::io(file, e))?;
    Document::from_json_str(&contents)
        .map_err(|e| ParseError::json(file.display().to_string(), contents, &e).into())
}

pub fn import(store: &impl SnapshotStore, file: &Path, key: &SnapshotKey) -> Result<()> {
    let document = read_design(file)?;
    store.put(key, &document)?;
    tracing::info!(key = %key, objects = document.objects.len(), "snapshot imported");
    Ok(())
}

pub fn export(store: &impl SnapshotStore, key: &SnapshotKey, file: &Path) -> Result<()> {
    let record = require(store, key)?;
    let json = record.document.to_json_pretty().into_diagnostic()?;
    std::fs::write(file, json).map_err(|e| EaselError::io(file, e))?;
    Ok(())
}

pub fn remove(store: &impl SnapshotStore, key: &SnapshotKey) -> Result<()> {
    store.remove(key)?;
    tracing::info!(key = %key, "snapshot removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_editor_core::{DesignObject, FileSnapshotStore};

    fn output(run: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buf = Vec::new();
        run(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn sample() -> Document {
        let mut doc = Document::with_frame(1080.0, 1080.0);
        doc.name = Some("Poster".into());
        doc.objects.push(DesignObject::text("Lobster", "https://fonts.example/lobster.ttf").with_keys(["title"]));
        doc.objects.push(DesignObject::text("Lobster", "https://fonts.example/lobster.ttf").with_keys(["subtitle"]));
        doc
    }

    #[test]
    fn list_reports_each_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        assert_eq!(output(|out| list(&store, out)), "No snapshots stored\n");

        store.put(&SnapshotKey::for_document("abc"), &sample()).unwrap();
        std::fs::write(store.path_for(&SnapshotKey::default_autosave()), "{not json").unwrap();

        let listing = output(|out| list(&store, out));
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().any(|l| l.starts_with("design_abc\t") && l.ends_with("2 objects\tPoster")));
        assert!(lines.contains(&"easel_autosave\tunreadable"));
    }

    #[test]
    fn fonts_and_params_describe_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let key = SnapshotKey::default_autosave();
        store.put(&key, &sample()).unwrap();

        assert_eq!(
            output(|out| fonts(&store, &key, out)),
            "Lobster\thttps://fonts.example/lobster.ttf\n"
        );
        assert_eq!(output(|out| params(&store, &key, out)), "subtitle\ntitle\n");
    }

    #[test]
    fn missing_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let err = show(&store, &SnapshotKey::new("nope"), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn import_then_export_keeps_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path().join("store")).unwrap();
        let source = dir.path().join("poster.json");
        std::fs::write(&source, sample().to_json_pretty().unwrap()).unwrap();

        let key = SnapshotKey::new("scratch");
        import(&store, &source, &key).unwrap();
        let target = dir.path().join("out.json");
        export(&store, &key, &target).unwrap();

        let exported = read_design(&target).unwrap();
        assert_eq!(exported, sample());

        remove(&store, &key).unwrap();
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn malformed_import_points_at_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.json");
        std::fs::write(&source, "{\n  \"objects\": [\n    {\"type\": }\n  ]\n}").unwrap();

        match read_design(&source) {
            Err(EaselError::Parse(report)) => assert!(report.location() > 0),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_import_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_design(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, EaselError::Io { .. }));
    }
}
