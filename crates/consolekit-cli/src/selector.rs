use async_trait::async_trait;
use consolekit_client::{DirectorySelection, DirectorySelector};
use consolekit_core::ConsoleResult;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Directory "picker" for the terminal: the user types the path.
pub struct PathSelector {
    path: PathBuf,
}

impl PathSelector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DirectorySelector for PathSelector {
    async fn select_directory(&self) -> ConsoleResult<DirectorySelection> {
        if self.path.as_os_str().is_empty() {
            return Ok(DirectorySelection::Cancelled);
        }
        let shown = self.path.display();
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_dir() => {
                let path = tokio::fs::canonicalize(&self.path).await?;
                Ok(DirectorySelection::Selected(path))
            }
            Ok(_) => Ok(DirectorySelection::Failed(format!("{shown} is not a directory"))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Ok(DirectorySelection::Failed(format!("{shown} does not exist")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_existing_directory_is_selected() {
        let tmp = tempfile::tempdir().unwrap();
        let selection = PathSelector::new(tmp.path()).select_directory().await.unwrap();
        let expected = std::fs::canonicalize(tmp.path()).unwrap();
        assert_eq!(selection, DirectorySelection::Selected(expected));
    }

    #[tokio::test]
    async fn test_file_and_missing_path_fail() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("notes.txt");
        std::fs::write(&file, "x").unwrap();

        let selection = PathSelector::new(&file).select_directory().await.unwrap();
        assert!(matches!(selection, DirectorySelection::Failed(msg) if msg.ends_with("is not a directory")));

        let missing = tmp.path().join("nope");
        let selection = PathSelector::new(missing).select_directory().await.unwrap();
        assert!(matches!(selection, DirectorySelection::Failed(msg) if msg.ends_with("does not exist")));
    }

    #[tokio::test]
    async fn test_empty_path_cancels() {
        let selection = PathSelector::new("").select_directory().await.unwrap();
        assert_eq!(selection, DirectorySelection::Cancelled);
    }
}
