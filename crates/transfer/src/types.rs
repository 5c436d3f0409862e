use std::path::PathBuf;

/// Which way a transfer moves data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// One bulk operation issued by a control request.
///
/// Consumed by exactly one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    pub task_id: String,
    pub direction: Direction,
    /// Source file for uploads, destination file for downloads.
    pub file_path: PathBuf,
}

impl TransferTask {
    pub fn upload(task_id: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            task_id: task_id.into(),
            direction: Direction::Upload,
            file_path: file_path.into(),
        }
    }

    pub fn download(task_id: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            task_id: task_id.into(),
            direction: Direction::Download,
            file_path: file_path.into(),
        }
    }
}

/// Outcome of a finished upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    pub bytes_sent: u64,
    pub file_size: u64,
    /// Server answered `stop`: it already holds identical content.
    pub skipped: bool,
}

/// Outcome of a finished, verified download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadReport {
    pub file_size: u64,
    pub total_chunks: u64,
    /// Whether a server digest was available and matched.
    pub sha256_verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_direction() {
        let up = TransferTask::upload("t1", "/tmp/a");
        assert_eq!(up.direction, Direction::Upload);
        assert_eq!(up.task_id, "t1");

        let down = TransferTask::download("t2", PathBuf::from("/tmp/b"));
        assert_eq!(down.direction, Direction::Download);
        assert_eq!(down.file_path, PathBuf::from("/tmp/b"));
    }
}
