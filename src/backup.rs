use crate::db;
use crate::model::StoredResult;
use anyhow::{anyhow, Context};
use rusqlite::Connection;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const RESULTS_ENTRY: &str = "data/results.json";
pub const BUNDLE_FORMAT_V1: &str = "resultsd-bundle-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub record_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format: String,
    pub record_count: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn export_results_bundle(conn: &Connection, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let records = db::results_list(conn, None, None).context("failed to read results")?;
    let payload =
        serde_json::to_vec_pretty(&records).context("failed to serialize results")?;
    let checksum = sha256_hex(&payload);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "recordCount": records.len(),
        "resultsSha256": checksum,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(RESULTS_ENTRY, opts)
        .context("failed to start results entry")?;
    zip.write_all(&payload)
        .context("failed to write results entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        record_count: records.len(),
        sha256: checksum,
    })
}

/// Upserts every record in the bundle by id. Records already in the
/// workspace that the bundle does not mention are kept.
pub fn import_results_bundle(conn: &Connection, in_path: &Path) -> anyhow::Result<ImportSummary> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut payload = Vec::new();
    archive
        .by_name(RESULTS_ENTRY)
        .context("bundle missing data/results.json")?
        .read_to_end(&mut payload)
        .context("failed to read results entry")?;

    let expected = manifest
        .get("resultsSha256")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let actual = sha256_hex(&payload);
    if !expected.eq_ignore_ascii_case(&actual) {
        return Err(anyhow!(
            "results checksum mismatch: manifest {}, bundle {}",
            expected,
            actual
        ));
    }

    let records: Vec<StoredResult> =
        serde_json::from_slice(&payload).context("data/results.json is invalid")?;

    let tx = conn
        .unchecked_transaction()
        .context("failed to start import transaction")?;
    for stored in &records {
        db::results_upsert_stored(&tx, stored)
            .with_context(|| format!("failed to import result {}", stored.id))?;
    }
    tx.commit().context("failed to commit import")?;

    Ok(ImportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        record_count: records.len(),
    })
}
