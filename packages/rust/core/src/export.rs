//! JSON export and import of generated license data.
//!
//! The output document is the published interchange format:
//! `{ products: {guid: product}, metadata, self_referencing_plans }`.
//! Writes go through a temp file in the target directory and a rename, so a
//! reader never sees a half-written file.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use licensegraph_shared::{LicenseData, LicenseGraphError, Result};

/// Where and what was written.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExportReceipt {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Write `data` as pretty-printed JSON to `path`, atomically.
///
/// Parent directories are created as needed.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_license_data(path: &Path, data: &LicenseData) -> Result<ExportReceipt> {
    let json = serde_json::to_string_pretty(data).map_err(|e| {
        LicenseGraphError::validation(format!("JSON serialization failed: {e}"))
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| LicenseGraphError::io(&dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            LicenseGraphError::validation(format!("output path has no file name: {}", path.display()))
        })?;
    let temp = dir.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, &json).map_err(|e| LicenseGraphError::io(&temp, e))?;
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(LicenseGraphError::io(path, e));
    }

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    let sha256 = format!("{:x}", hasher.finalize());

    info!(
        products = data.metadata.total_products,
        bytes = json.len(),
        "license data exported"
    );

    Ok(ExportReceipt {
        path: path.to_path_buf(),
        sha256,
        size_bytes: json.len(),
    })
}

/// Load a previously exported document and check it is self-consistent.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_license_data(path: &Path) -> Result<LicenseData> {
    let content = std::fs::read_to_string(path).map_err(|e| LicenseGraphError::io(path, e))?;
    let data: LicenseData = serde_json::from_str(&content).map_err(|e| {
        LicenseGraphError::validation(format!("invalid license data in {}: {e}", path.display()))
    })?;

    validate_license_data(&data)?;
    debug!(products = data.products.len(), "license data loaded");
    Ok(data)
}

/// Check metadata totals, relation symmetry and the absence of self-edges.
pub fn validate_license_data(data: &LicenseData) -> Result<()> {
    if data.metadata.total_products != data.products.len() {
        return Err(LicenseGraphError::validation(format!(
            "metadata lists {} products, document has {}",
            data.metadata.total_products,
            data.products.len()
        )));
    }

    let relationships = data.products.total_supersedence_relationships();
    if data.metadata.total_supersedence_relationships != relationships {
        return Err(LicenseGraphError::validation(format!(
            "metadata lists {} relationships, document has {relationships}",
            data.metadata.total_supersedence_relationships
        )));
    }

    for product in &data.products {
        if product.supersedes_guid(&product.guid) || product.superseded_by_guid(&product.guid) {
            return Err(LicenseGraphError::validation(format!(
                "product {} relates to itself",
                product.guid
            )));
        }

        for sub in &product.supersedes {
            let mirrored = data
                .products
                .get(&sub.guid)
                .is_some_and(|other| other.superseded_by_guid(&product.guid));
            if !mirrored {
                return Err(LicenseGraphError::validation(format!(
                    "{} supersedes {} but the reverse link is missing",
                    product.guid, sub.guid
                )));
            }
        }

        for sup in &product.superseded_by {
            let mirrored = data
                .products
                .get(&sup.guid)
                .is_some_and(|other| other.supersedes_guid(&product.guid));
            if !mirrored {
                return Err(LicenseGraphError::validation(format!(
                    "{} is superseded by {} but the reverse link is missing",
                    product.guid, sup.guid
                )));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use licensegraph_shared::{CatalogRow, GenerationConfig};

    use crate::pipeline::{SilentProgress, generate};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "licensegraph-export-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn row(guid: &str, string_id: &str, plan_name: &str, plan_id: &str) -> CatalogRow {
        CatalogRow {
            product_display_name: string_id.to_lowercase(),
            string_id: string_id.into(),
            guid: guid.into(),
            service_plan_name: plan_name.into(),
            service_plan_id: plan_id.into(),
            service_plan_friendly_name: String::new(),
        }
    }

    fn sample() -> LicenseData {
        let rows = vec![
            row("a", "A", "A", "a-core"),
            row("a", "A", "X", "x"),
            row("b", "B", "X", "x"),
            row("b", "B", "Y", "y"),
        ];
        generate(&rows, &GenerationConfig::default(), &SilentProgress).unwrap()
    }

    #[test]
    fn write_then_read_back() {
        let tmp = temp_dir();
        let path = tmp.join("out").join("licenses.json");
        let data = sample();

        let receipt = write_license_data(&path, &data).unwrap();
        assert_eq!(receipt.path, path);
        assert_eq!(receipt.sha256.len(), 64);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), receipt.size_bytes);

        let loaded = read_license_data(&path).unwrap();
        assert_eq!(loaded, data);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn output_layout_matches_interchange_format() {
        let tmp = temp_dir();
        let path = tmp.join("licenses.json");
        write_license_data(&path, &sample()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let a = &json["products"]["a"];
        assert_eq!(a["product_display_name"], "a");
        assert_eq!(a["included_service_plans"][0]["service_plan_id"], "x");
        assert_eq!(a["superseded_by"][0]["guid"], "b");
        assert_eq!(json["metadata"]["total_supersedence_relationships"], 1);
        assert_eq!(json["metadata"]["comparison_mode"], "transitive");
        assert_eq!(json["self_referencing_plans"][0]["product_guid"], "a");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let tmp = temp_dir();
        let path = tmp.join("licenses.json");

        write_license_data(&path, &sample()).unwrap();
        write_license_data(&path, &sample()).unwrap();

        for entry in std::fs::read_dir(&tmp).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn same_data_same_checksum() {
        let tmp = temp_dir();
        let data = sample();

        let first = write_license_data(&tmp.join("one.json"), &data).unwrap();
        let second = write_license_data(&tmp.join("two.json"), &data).unwrap();
        assert_eq!(first.sha256, second.sha256);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let tmp = temp_dir();
        let err = read_license_data(&tmp.join("nope.json")).unwrap_err();
        assert!(matches!(err, LicenseGraphError::Io { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn read_invalid_json_is_validation_error() {
        let tmp = temp_dir();
        let path = tmp.join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = read_license_data(&path).unwrap_err();
        assert!(matches!(err, LicenseGraphError::Validation { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn validate_rejects_one_sided_relation() {
        let mut data = sample();
        if let Some(a) = data.products.get_mut("a") {
            a.superseded_by.clear();
        }
        let err = validate_license_data(&data).unwrap_err();
        assert!(err.to_string().contains("reverse link"));
    }

    #[test]
    fn validate_rejects_wrong_totals() {
        let mut data = sample();
        data.metadata.total_products = 9;
        assert!(validate_license_data(&data).is_err());
    }
}
