//! Workspace bundles: a zip holding a manifest and a copy of the document
//! database. The manifest carries a SHA-256 of the database entry so a
//! truncated or tampered bundle is rejected before it replaces anything.

use crate::db::DB_FILE_NAME;
use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/schoolbook.sqlite3";
pub const BUNDLE_FORMAT_V1: &str = "schoolbook-workspace-v1";
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    app_version: String,
    exported_at: String,
    db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format: String,
    pub exported_at: String,
    pub db_sha256: String,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn sha256_of(mut reader: impl Read) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(hex(&hasher.finalize()))
}

fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let f = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    sha256_of(f).with_context(|| format!("failed to hash {}", path.display()))
}

fn looks_like_zip(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut sig = [0u8; 4];
    match f.read_exact(&mut sig) {
        Ok(()) => Ok(sig == ZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e).context("failed to read file signature"),
    }
}

pub fn export_workspace_bundle(workspace: &Path, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let db_path = workspace.join(DB_FILE_NAME);
    if !db_path.is_file() {
        bail!("workspace database not found: {}", db_path.display());
    }
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let manifest = Manifest {
        format: BUNDLE_FORMAT_V1.to_string(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        db_sha256: sha256_file(&db_path)?,
    };

    let out = File::create(out_path)
        .with_context(|| format!("failed to create {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_ENTRY, opts)?;
    serde_json::to_writer_pretty(&mut zip, &manifest).context("failed to write manifest")?;

    zip.start_file(DB_ENTRY, opts)?;
    let mut db = File::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    std::io::copy(&mut db, &mut zip).context("failed to write database entry")?;

    zip.finish().context("failed to finalize bundle")?;
    info!(out = %out_path.display(), sha256 = %manifest.db_sha256, "workspace exported");

    Ok(ExportSummary {
        bundle_format: manifest.format,
        entry_count: 2,
        db_sha256: manifest.db_sha256,
    })
}

fn read_manifest<R: Read + Seek>(archive: &mut ZipArchive<R>) -> anyhow::Result<Manifest> {
    let entry = archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle has no manifest.json")?;
    let manifest: Manifest = serde_json::from_reader(entry).context("manifest.json is malformed")?;
    if manifest.format != BUNDLE_FORMAT_V1 {
        bail!("unsupported bundle format: {}", manifest.format);
    }
    Ok(manifest)
}

/// Extracts the database entry next to the destination and returns the
/// staging path. The caller renames it into place once verified.
fn stage_database<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    workspace: &Path,
) -> anyhow::Result<PathBuf> {
    let staging = workspace.join(format!("{}.importing", DB_FILE_NAME));
    let mut out = File::create(&staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;
    let mut entry = archive
        .by_name(DB_ENTRY)
        .with_context(|| format!("bundle has no {}", DB_ENTRY))?;
    std::io::copy(&mut entry, &mut out).context("failed to extract database")?;
    out.flush()?;
    Ok(staging)
}

/// Replaces the workspace database with the one in `in_path`. The caller
/// must have closed any open handle on the current database.
pub fn import_workspace_bundle(in_path: &Path, workspace: &Path) -> anyhow::Result<ImportSummary> {
    if !looks_like_zip(in_path)? {
        return Err(anyhow!("not a workspace bundle: {}", in_path.display()));
    }
    std::fs::create_dir_all(workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.display()))?;

    let file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(file).context("invalid zip archive")?;
    let manifest = read_manifest(&mut archive)?;

    let staging = stage_database(&mut archive, workspace)?;
    let actual = sha256_file(&staging)?;
    if actual != manifest.db_sha256 {
        let _ = std::fs::remove_file(&staging);
        bail!(
            "database checksum mismatch (manifest {}, bundle {})",
            manifest.db_sha256,
            actual
        );
    }

    let dst = workspace.join(DB_FILE_NAME);
    if dst.exists() {
        std::fs::remove_file(&dst)
            .with_context(|| format!("failed to remove {}", dst.display()))?;
    }
    std::fs::rename(&staging, &dst)
        .with_context(|| format!("failed to move database into {}", dst.display()))?;
    info!(workspace = %workspace.display(), exported_at = %manifest.exported_at, "workspace imported");

    Ok(ImportSummary {
        bundle_format: manifest.format,
        exported_at: manifest.exported_at,
        db_sha256: actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(hex(&[0x00, 0x0f, 0xab]), "000fab");
    }

    #[test]
    fn sha256_of_known_content() {
        assert_eq!(
            sha256_of(&b"abc"[..]).expect("hash"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn export_then_import_restores_database_bytes() {
        let src = temp_dir("schoolbook-backup-src");
        std::fs::write(src.join(DB_FILE_NAME), b"not really sqlite").expect("write db");
        let bundle = src.join("out.zip");
        let exported = export_workspace_bundle(&src, &bundle).expect("export");
        assert_eq!(exported.entry_count, 2);

        let dst = temp_dir("schoolbook-backup-dst");
        let imported = import_workspace_bundle(&bundle, &dst).expect("import");
        assert_eq!(imported.db_sha256, exported.db_sha256);
        assert_eq!(
            std::fs::read(dst.join(DB_FILE_NAME)).expect("read db"),
            b"not really sqlite"
        );
        let _ = std::fs::remove_dir_all(&src);
        let _ = std::fs::remove_dir_all(&dst);
    }

    #[test]
    fn import_rejects_checksum_mismatch() {
        let dir = temp_dir("schoolbook-backup-bad");
        let bundle = dir.join("bad.zip");
        {
            let mut zip = ZipWriter::new(File::create(&bundle).expect("create"));
            let opts = FileOptions::default();
            zip.start_file(MANIFEST_ENTRY, opts).expect("manifest");
            let manifest = Manifest {
                format: BUNDLE_FORMAT_V1.to_string(),
                app_version: "0".to_string(),
                exported_at: "2024-01-01T00:00:00Z".to_string(),
                db_sha256: "00".repeat(32),
            };
            serde_json::to_writer(&mut zip, &manifest).expect("write manifest");
            zip.start_file(DB_ENTRY, opts).expect("db entry");
            zip.write_all(b"payload").expect("write db");
            zip.finish().expect("finish");
        }
        let ws = dir.join("ws");
        let err = import_workspace_bundle(&bundle, &ws).expect_err("mismatch");
        assert!(err.to_string().contains("checksum mismatch"));
        assert!(!ws.join(DB_FILE_NAME).exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn import_rejects_plain_files() {
        let dir = temp_dir("schoolbook-backup-plain");
        let p = dir.join("plain.txt");
        std::fs::write(&p, b"hello").expect("write");
        assert!(import_workspace_bundle(&p, &dir.join("ws")).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
