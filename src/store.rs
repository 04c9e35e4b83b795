use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::info;

use crate::error::{Result, ScrapeError};
use crate::record::{AssetPaths, ProductRecord};

const MANUAL_FILE: &str = "manual.pdf";
const IMAGE_FILE: &str = "img.png";

/// On-disk layout:
///
/// ```text
/// <root>/<product_id>.json
/// <root>/assets/<product_id>/manual.pdf
/// <root>/assets/<product_id>/img.png
/// ```
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn json_path(&self, product_id: &str) -> PathBuf {
        self.root.join(format!("{product_id}.json"))
    }

    pub fn asset_dir(&self, product_id: &str) -> PathBuf {
        self.root.join("assets").join(product_id)
    }

    /// Intended asset locations, decided by link presence alone.
    pub fn asset_paths(&self, product_id: &str, has_manual: bool, has_image: bool) -> AssetPaths {
        let dir = self.asset_dir(product_id);
        let path = |file: &str| path_string(&dir.join(file));
        AssetPaths {
            manual: has_manual.then(|| path(MANUAL_FILE)),
            image: has_image.then(|| path(IMAGE_FILE)),
        }
    }

    /// Create the product's asset directory. Safe to repeat.
    pub fn prepare(&self, product_id: &str) -> Result<PathBuf> {
        check_key(product_id)?;
        let dir = self.asset_dir(product_id);
        fs::create_dir_all(&dir).map_err(|e| ScrapeError::persist(&dir, e))?;
        Ok(dir)
    }

    /// Write the record as 2-space indented JSON, replacing any earlier
    /// document for the same product.
    pub fn persist(&self, record: &ProductRecord) -> Result<PathBuf> {
        self.prepare(&record.product_id)?;

        let path = self.json_path(&record.product_id);
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| ScrapeError::persist(&path, e.into()))?;

        let tmp = path.with_extension("json.tmp");
        let written = fs::write(&tmp, json)
            .map_err(|e| ScrapeError::persist(&tmp, e))
            .and_then(|()| fs::rename(&tmp, &path).map_err(|e| ScrapeError::persist(&path, e)));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        info!("Saved JSON: {}", path.display());
        Ok(path)
    }
}

/// Product ids become file and directory names.
fn check_key(product_id: &str) -> Result<()> {
    let mut components = Path::new(product_id).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if product_id.is_empty() || !single_normal || product_id.contains(['/', '\\']) {
        return Err(ScrapeError::persist(
            product_id,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unusable product id"),
        ));
    }
    Ok(())
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PartEntry, ProductFields};

    fn record(id: &str) -> ProductRecord {
        let fields = ProductFields {
            product_id: id.into(),
            description: Some("Motor".into()),
            hp: Some(5),
            ..Default::default()
        };
        let bom = vec![PartEntry {
            part_number: "36CB2501".into(),
            description: "CONDUIT BOX".into(),
            quantity: 1,
        }];
        ProductRecord::assemble(fields, bom, AssetPaths::default())
    }

    #[test]
    fn layout_matches_output_tree() {
        let store = RecordStore::new("output");
        assert_eq!(store.json_path("M3546"), PathBuf::from("output/M3546.json"));
        let paths = store.asset_paths("M3546", true, false);
        assert_eq!(paths.manual.as_deref(), Some("output/assets/M3546/manual.pdf"));
        assert_eq!(paths.image, None);
        let paths = store.asset_paths("M3546", false, true);
        assert_eq!(paths.image.as_deref(), Some("output/assets/M3546/img.png"));
    }

    #[test]
    fn persists_two_space_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let path = store.persist(&record("M3546")).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n  \"product_id\": \"M3546\",\n  \"name\": \"\","));
        assert!(text.contains("\n    \"hp\": 5,"));
        assert!(store.asset_dir("M3546").is_dir());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn persisting_again_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let path = store.persist(&record("M3546")).unwrap();
        let first = fs::read(&path).unwrap();

        let mut changed = record("M3546");
        changed.bom.clear();
        store.persist(&changed).unwrap();
        assert_ne!(fs::read(&path).unwrap(), first);

        store.persist(&record("M3546")).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        for id in ["", ".", "..", "a/b", "../x", "a\\b"] {
            assert!(
                matches!(store.persist(&record(id)), Err(ScrapeError::PersistFailed { .. })),
                "{id:?}"
            );
        }
    }

    #[test]
    fn failed_replace_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        // a non-empty directory where the document should go blocks the rename
        let path = store.json_path("M3546");
        fs::create_dir_all(path.join("keep")).unwrap();

        assert!(matches!(
            store.persist(&record("M3546")),
            Err(ScrapeError::PersistFailed { .. })
        ));
        assert!(!path.with_extension("json.tmp").exists());
        assert!(path.join("keep").is_dir());
    }

    #[test]
    fn unwritable_root_is_persist_failed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("output");
        fs::write(&blocker, b"not a directory").unwrap();

        let store = RecordStore::new(&blocker);
        assert!(matches!(
            store.persist(&record("M3546")),
            Err(ScrapeError::PersistFailed { .. })
        ));
    }
}
