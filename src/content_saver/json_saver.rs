//! File-output mode: writes a page result straight to disk instead of
//! shipping it to the backend (the `--output-dir` alternative).

use anyhow::{Context, Result};

use crate::page_extractor::PageResult;
use crate::utils::{ensure_domain_gitignore, get_mirror_path};

/// Save one page's extracted result as pretty-printed JSON under
/// `<output_dir>/<domain>/<path>/index.json`.
pub async fn save_page_result(result: &PageResult, output_dir: &std::path::Path) -> Result<std::path::PathBuf> {
    let path = get_mirror_path(&result.url, output_dir, "index.json").await?;
    ensure_domain_gitignore(&path, output_dir).await?;

    let parent = path.parent().context("output path has no parent directory")?;
    tokio::fs::create_dir_all(parent).await.context("failed to create output directory")?;

    let json = serde_json::to_string_pretty(result).context("failed to serialize page result")?;
    tokio::fs::write(&path, json).await.context("failed to write page result JSON")?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_extractor::{extract_page_result, PageInput};

    #[tokio::test]
    async fn saves_page_result_under_domain_mirror_path() {
        let result = extract_page_result(
            PageInput { url: "https://example.com/blog/post", html: "<html><title>t</title></html>", status_code: Some(200), rendered: false },
            None,
            None,
            false,
        )
        .await
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let saved = save_page_result(&result, dir.path()).await.unwrap();
        assert!(saved.exists());
        assert!(saved.to_string_lossy().contains("example.com"));
    }
}
