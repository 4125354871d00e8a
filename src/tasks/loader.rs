use super::{TaskRegistry, TaskSpec};
use crate::error::{HarvesterError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct TaskFile {
    #[serde(default, rename = "task")]
    tasks: Vec<TaskSpec>,
}

/// Parse the `[[task]]` tables of one TOML document
pub fn parse_task_file(contents: &str) -> Result<Vec<TaskSpec>> {
    let file: TaskFile = toml::from_str(contents)?;
    for spec in &file.tasks {
        spec.validate()?;
    }
    Ok(file.tasks)
}

/// Load every `*.toml` task file in `dir`.
///
/// Files that cannot be read or parsed, and tasks whose name is already taken,
/// are logged and skipped. A missing directory yields an empty registry.
pub async fn load_task_dir(dir: &Path) -> Result<TaskRegistry> {
    let mut registry = TaskRegistry::new();

    if !dir.exists() {
        warn!("Task directory {} does not exist, no tasks loaded", dir.display());
        return Ok(registry);
    }

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        HarvesterError::component(
            "task_loader".to_string(),
            format!("Failed to read task directory {}: {}", dir.display(), e),
        )
    })?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("toml") {
            files.push(path);
        }
    }
    files.sort();

    for path in files {
        match load_file(&path).await {
            Ok(specs) => {
                for spec in specs {
                    if registry.contains_key(&spec.name) {
                        warn!(
                            "Duplicate task '{}' in {}, skipping",
                            spec.name,
                            path.display()
                        );
                        continue;
                    }
                    debug!("Loaded task '{}' from {}", spec.name, path.display());
                    registry.insert(spec.name.clone(), spec);
                }
            }
            Err(e) => {
                warn!("Skipping task file {}: {}", path.display(), e);
            }
        }
    }

    info!("Loaded {} task(s) from {}", registry.len(), dir.display());
    Ok(registry)
}

async fn load_file(path: &Path) -> Result<Vec<TaskSpec>> {
    let contents = tokio::fs::read_to_string(path).await?;
    parse_task_file(&contents)
}
