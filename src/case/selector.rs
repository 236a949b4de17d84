use std::path::{Path, PathBuf};

use inquire::MultiSelect;

use crate::case::loader::collect_case_files;
use crate::{Result, RucaseError};

/// 文件选择方式
pub enum SelectionStrategy {
    /// 交互式多选
    Interactive,
    /// 全部执行
    All,
}

/// 展开路径并按策略选出要执行的用例文件
pub fn select_case_files(paths: &[PathBuf], strategy: SelectionStrategy) -> Result<Vec<PathBuf>> {
    let files = collect_case_files(paths)?;
    match strategy {
        SelectionStrategy::All => Ok(files),
        SelectionStrategy::Interactive => select_interactive(files),
    }
}

fn select_interactive(files: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    #[derive(Clone)]
    struct FileWrapper {
        index: usize,
        display: String,
    }

    impl std::fmt::Display for FileWrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.display)
        }
    }

    let options: Vec<FileWrapper> = files
        .iter()
        .enumerate()
        .map(|(index, path)| FileWrapper {
            index,
            display: format_file_for_display(path),
        })
        .collect();

    let selected = MultiSelect::new("Select case files to run:", options)
        .with_page_size(15)
        .with_help_message("Space to select, Enter to finish, type to filter")
        .prompt()
        .map_err(|e| RucaseError::Other(format!("Interaction canceled or failed: {}", e)))?;

    Ok(selected
        .into_iter()
        .map(|w| files[w.index].clone())
        .collect())
}

fn format_file_for_display(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => format!("{name} ({})", parent.display()),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_display() {
        let display = format_file_for_display(Path::new("cases/user/login.yaml"));
        assert_eq!(display, "login.yaml (cases/user)");
        assert_eq!(format_file_for_display(Path::new("login.yaml")), "login.yaml");
    }

    #[test]
    fn test_select_all_expands_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "[]").unwrap();
        std::fs::write(dir.path().join("a.json"), "[]").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let selected =
            select_case_files(&[dir.path().to_path_buf()], SelectionStrategy::All).unwrap();
        let names: Vec<_> = selected
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.yaml"]);
    }
}
