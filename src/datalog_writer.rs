use crate::prelude::*;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Appends every decoded record to a file, one JSON object per line.
#[derive(Debug, Clone)]
pub struct DatalogWriter {
    file: Arc<Mutex<std::fs::File>>,
    path: String,
}

impl DatalogWriter {
    pub fn new(path: &str) -> Result<Self> {
        info!("Opening datalog file at {}", path);

        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| anyhow!("failed to open datalog file {}: {}", path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))?;
        }

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            path: path.to_string(),
        })
    }

    pub fn write_record(&self, record: &Record) -> Result<()> {
        let mut json = serde_json::Map::new();
        json.insert(
            "utc_timestamp".to_string(),
            chrono::Utc::now().timestamp().into(),
        );
        json.insert(
            "serial_number".to_string(),
            record.serial_number.clone().into(),
        );
        json.insert("datalog".to_string(), record.datalog.clone().into());
        json.insert(
            "sections".to_string(),
            record
                .loaded_sections()
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .into(),
        );
        json.insert(
            "values".to_string(),
            serde_json::Value::Object(record.sink_fields().into_iter().collect()),
        );

        let line = serde_json::to_string(&json)?;

        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("Failed to lock datalog file"))?;
        writeln!(file, "{}", line)
            .and_then(|_| file.flush())
            .map_err(|e| anyhow!("failed to write datalog file {}: {}", self.path, e))?;

        Ok(())
    }
}
