use std::path::{Component, Path};

use crate::TransferError;

/// Validates that a task ID is usable as a single directory name.
///
/// Rejects:
/// - Empty IDs
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent or current directory references (`..`, `.`)
/// - IDs spanning more than one path component
pub fn validate_task_id(task_id: &str) -> Result<(), TransferError> {
    if task_id.is_empty() {
        return Err(TransferError::InvalidTask("empty task id".into()));
    }

    if task_id.contains(['/', '\\']) {
        return Err(TransferError::InvalidTask(format!(
            "path separator not allowed: {task_id}"
        )));
    }

    let path = Path::new(task_id);

    if path.is_absolute() {
        return Err(TransferError::InvalidTask(format!(
            "absolute path not allowed: {task_id}"
        )));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) | (Some(Component::CurDir), _) => Err(
            TransferError::InvalidTask(format!("directory reference not allowed: {task_id}")),
        ),
        (Some(Component::Prefix(_)), _) => Err(TransferError::InvalidTask(format!(
            "path prefix not allowed: {task_id}"
        ))),
        _ => Err(TransferError::InvalidTask(format!(
            "task id must be a single path component: {task_id}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(validate_task_id("").is_err());
    }

    #[test]
    fn rejects_parent_dir() {
        assert!(validate_task_id("..").is_err());
    }

    #[test]
    fn rejects_current_dir() {
        assert!(validate_task_id(".").is_err());
    }

    #[test]
    fn rejects_nested_traversal() {
        assert!(validate_task_id("../../etc").is_err());
    }

    #[test]
    fn rejects_absolute_unix_path() {
        assert!(validate_task_id("/tmp/evil").is_err());
    }

    #[test]
    fn rejects_backslash() {
        assert!(validate_task_id("a\\b").is_err());
    }

    #[test]
    fn rejects_multiple_components() {
        assert!(validate_task_id("a/b").is_err());
    }

    #[test]
    fn accepts_uuid_like_id() {
        assert!(validate_task_id("3f2a9c1e-7b44-4c1a-9d0e-2f5b8a6c4e11").is_ok());
    }

    #[test]
    fn accepts_hex_id() {
        assert!(validate_task_id("a1b2c3d4").is_ok());
    }

    #[test]
    fn accepts_dotted_name() {
        assert!(validate_task_id("task.1").is_ok());
    }
}
