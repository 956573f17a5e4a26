use crate::prelude::*;
use crate::sink::SnapshotSink;

use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Appends every snapshot to a file as one JSON object per line.
#[derive(Debug, Clone)]
pub struct DatalogWriter {
    file: Arc<Mutex<std::fs::File>>,
    path: String,
    lines_written: Arc<Mutex<u64>>,
}

impl DatalogWriter {
    pub fn new(path: &str) -> Result<Self> {
        info!("Opening datalog file at {}", path);

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                error!("Failed to open datalog file {}: {}", path, e);
                return Err(e.into());
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)) {
                error!("Failed to set permissions on datalog file {}: {}", path, e);
                return Err(e.into());
            }
        }

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            path: path.to_string(),
            lines_written: Arc::new(Mutex::new(0)),
        })
    }

    pub fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let line = serde_json::to_string(snapshot)?;

        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("Failed to lock datalog file"))?;
        if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
            error!("Failed to write to datalog file {}: {}", self.path, e);
            return Err(e.into());
        }

        let mut lines_written = self
            .lines_written
            .lock()
            .map_err(|_| anyhow!("Failed to lock datalog counter"))?;
        *lines_written += 1;
        debug!("{} snapshots stored in {}", *lines_written, self.path);

        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl SnapshotSink for DatalogWriter {
    fn name(&self) -> &str {
        "datalog"
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.write(snapshot)
    }
}
