use std::fs;
use std::path::Path;

use consolidator_client::{ensure_output_dir, AtomicFileWriter, InMemoryWorkbookStore};
use consolidator_logging::{con_error, con_info, con_warn};

/// Reads the webhook's workbook store; a missing or unreadable file starts empty.
pub(crate) fn load_store(path: &Path) -> InMemoryWorkbookStore {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return InMemoryWorkbookStore::new();
        }
        Err(err) => {
            con_warn!("Failed to read workbook store from {:?}: {}", path, err);
            return InMemoryWorkbookStore::new();
        }
    };

    match ron::from_str(&content) {
        Ok(store) => {
            con_info!("Loaded workbook store from {:?}", path);
            store
        }
        Err(err) => {
            con_warn!("Failed to parse workbook store from {:?}: {}", path, err);
            InMemoryWorkbookStore::new()
        }
    }
}

/// Writes the store next to its previous version atomically. Failures are logged.
pub(crate) fn save_store(path: &Path, store: &InMemoryWorkbookStore) {
    let (Some(dir), Some(filename)) = (path.parent(), path.file_name()) else {
        con_error!("Workbook store path {:?} has no file name", path);
        return;
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    if let Err(err) = ensure_output_dir(dir) {
        con_error!("Failed to ensure store dir {:?}: {}", dir, err);
        return;
    }

    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(store, pretty) {
        Ok(text) => text,
        Err(err) => {
            con_error!("Failed to serialize workbook store: {}", err);
            return;
        }
    };

    let writer = AtomicFileWriter::new(dir.to_path_buf());
    if let Err(err) = writer.write(&filename.to_string_lossy(), content.as_bytes()) {
        con_error!("Failed to write workbook store to {:?}: {}", path, err);
    }
}
