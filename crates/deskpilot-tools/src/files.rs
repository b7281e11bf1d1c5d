//! Native file tools over `tokio::fs`.
//!
//! Every operation takes a finished absolute path from the planner; a
//! relative path is a contract violation upstream and is rejected here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::fs;

use deskpilot_core::capability::{
    Capability, Preconditions, SessionHandle, Tool, ToolOutcome,
};
use deskpilot_core::planner::is_absolute_path;
use deskpilot_core::types::{ActionClass, IntentKind, Params};

/// File operations backed by the local filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    CreateFolder,
    CreateFile,
    DeleteFile,
    DeleteFolder,
    Move,
    Copy,
    Rename,
    ReadFile,
    WriteFile,
    List,
}

/// One registered file capability.
pub struct FileTool {
    op: FileOp,
    capability: Capability,
}

impl FileTool {
    pub fn new(op: FileOp) -> Self {
        let (name, class, effects, schema, destructive) = describe(op);
        let mut capability = Capability::new(name, class)
            .with_intents(vec![IntentKind::FileOperation])
            .with_effects(effects.iter().map(|e| e.to_string()).collect())
            .with_schema(schema);
        if destructive {
            capability = capability.with_preconditions(Preconditions {
                is_destructive: true,
                ..Preconditions::default()
            });
        }
        Self { op, capability }
    }
}

fn describe(op: FileOp) -> (&'static str, ActionClass, &'static [&'static str], Value, bool) {
    match op {
        FileOp::CreateFolder => (
            "files.create_folder",
            ActionClass::Actuate,
            &["folder created at path"],
            path_schema(),
            false,
        ),
        FileOp::CreateFile => (
            "files.create_file",
            ActionClass::Actuate,
            &["empty file created at path"],
            path_schema(),
            false,
        ),
        FileOp::DeleteFile => (
            "files.delete_file",
            ActionClass::Actuate,
            &["file removed"],
            path_schema(),
            true,
        ),
        FileOp::DeleteFolder => (
            "files.delete_folder",
            ActionClass::Actuate,
            &["folder and contents removed"],
            path_schema(),
            true,
        ),
        FileOp::Move => (
            "files.move",
            ActionClass::Actuate,
            &["file moved to destination"],
            source_destination_schema(),
            false,
        ),
        FileOp::Copy => (
            "files.copy",
            ActionClass::Actuate,
            &["file copied to destination"],
            source_destination_schema(),
            false,
        ),
        FileOp::Rename => (
            "files.rename",
            ActionClass::Actuate,
            &["file renamed"],
            json!({
                "type": "object",
                "properties": {
                    "source": { "type": "string" },
                    "target": { "type": "string" }
                },
                "required": ["source", "target"]
            }),
            false,
        ),
        FileOp::ReadFile => (
            "files.read_file",
            ActionClass::Observe,
            &["file content returned"],
            path_schema(),
            false,
        ),
        FileOp::WriteFile => (
            "files.write_file",
            ActionClass::Actuate,
            &["content written to file"],
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "content": { "type": "string" }
                },
                "required": ["path"]
            }),
            false,
        ),
        FileOp::List => (
            "files.list",
            ActionClass::Observe,
            &["directory entries listed"],
            path_schema(),
            false,
        ),
    }
}

fn path_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "path": { "type": "string" } },
        "required": ["path"]
    })
}

fn source_destination_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "source": { "type": "string" },
            "destination": { "type": "string" }
        },
        "required": ["source", "destination"]
    })
}

fn absolute(args: &Params, key: &str) -> Result<PathBuf, String> {
    let raw = args
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing '{key}'"))?;
    if !is_absolute_path(raw) {
        return Err(format!("path '{raw}' is not absolute"));
    }
    Ok(PathBuf::from(raw))
}

async fn ensure_parent_exists(path: &Path) -> Result<(), String> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            match fs::metadata(parent).await {
                Ok(meta) if meta.is_dir() => Ok(()),
                Ok(_) => Err(format!("parent '{}' is not a directory", parent.display())),
                Err(_) => Err(format!("parent '{}' does not exist", parent.display())),
            }
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl Tool for FileTool {
    fn capability(&self) -> &Capability {
        &self.capability
    }

    async fn execute(&self, args: &Params, _session: Option<&SessionHandle>) -> ToolOutcome {
        let result = match self.op {
            FileOp::CreateFolder => match absolute(args, "path") {
                Ok(path) => fs::create_dir_all(&path)
                    .await
                    .map(|_| outcome_path(&path))
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e),
            },
            FileOp::CreateFile => match absolute(args, "path") {
                Ok(path) => match ensure_parent_exists(&path).await {
                    Ok(()) => fs::write(&path, b"")
                        .await
                        .map(|_| outcome_path(&path))
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            },
            FileOp::DeleteFile => match absolute(args, "path") {
                Ok(path) => fs::remove_file(&path)
                    .await
                    .map(|_| outcome_path(&path))
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e),
            },
            FileOp::DeleteFolder => match absolute(args, "path") {
                Ok(path) => fs::remove_dir_all(&path)
                    .await
                    .map(|_| outcome_path(&path))
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e),
            },
            FileOp::Move => match (absolute(args, "source"), absolute(args, "destination")) {
                (Ok(source), Ok(destination)) => fs::rename(&source, &destination)
                    .await
                    .map(|_| outcome_path(&destination))
                    .map_err(|e| e.to_string()),
                (Err(e), _) | (_, Err(e)) => Err(e),
            },
            FileOp::Copy => match (absolute(args, "source"), absolute(args, "destination")) {
                (Ok(source), Ok(destination)) => fs::copy(&source, &destination)
                    .await
                    .map(|bytes| {
                        let mut data = outcome_path(&destination);
                        data.insert("bytes".to_string(), json!(bytes));
                        data
                    })
                    .map_err(|e| e.to_string()),
                (Err(e), _) | (_, Err(e)) => Err(e),
            },
            FileOp::Rename => match (absolute(args, "source"), absolute(args, "target")) {
                (Ok(source), Ok(target)) => fs::rename(&source, &target)
                    .await
                    .map(|_| outcome_path(&target))
                    .map_err(|e| e.to_string()),
                (Err(e), _) | (_, Err(e)) => Err(e),
            },
            FileOp::ReadFile => match absolute(args, "path") {
                Ok(path) => fs::read_to_string(&path)
                    .await
                    .map(|content| {
                        let mut data = outcome_path(&path);
                        data.insert("content".to_string(), json!(content));
                        data
                    })
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e),
            },
            FileOp::WriteFile => match absolute(args, "path") {
                Ok(path) => {
                    let content = args
                        .get("content")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                    fs::write(&path, content.as_bytes())
                        .await
                        .map(|_| {
                            let mut data = outcome_path(&path);
                            data.insert("bytes".to_string(), json!(content.len()));
                            data
                        })
                        .map_err(|e| e.to_string())
                }
                Err(e) => Err(e),
            },
            FileOp::List => match absolute(args, "path") {
                Ok(path) => list_entries(&path).await,
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(data) => ToolOutcome::success_with(data),
            Err(message) => {
                tracing::warn!(tool = %self.capability.tool_name, error = %message, "file tool failed");
                ToolOutcome::error(message)
            }
        }
    }
}

fn outcome_path(path: &Path) -> Params {
    let mut data = Params::new();
    data.insert("path".to_string(), json!(path.display().to_string()));
    data
}

async fn list_entries(path: &Path) -> Result<Params, String> {
    let mut reader = fs::read_dir(path).await.map_err(|e| e.to_string())?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(|e| e.to_string())? {
        entries.push(entry.file_name().to_string_lossy().into_owned());
    }
    entries.sort();
    let mut data = outcome_path(path);
    data.insert("entries".to_string(), json!(entries));
    Ok(data)
}

/// The full set of file tools.
pub fn file_tools() -> Vec<Arc<dyn Tool>> {
    [
        FileOp::CreateFolder,
        FileOp::CreateFile,
        FileOp::DeleteFile,
        FileOp::DeleteFolder,
        FileOp::Move,
        FileOp::Copy,
        FileOp::Rename,
        FileOp::ReadFile,
        FileOp::WriteFile,
        FileOp::List,
    ]
    .into_iter()
    .map(|op| Arc::new(FileTool::new(op)) as Arc<dyn Tool>)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_with_path(path: &Path) -> Params {
        let mut args = Params::new();
        args.insert("path".to_string(), json!(path.display().to_string()));
        args
    }

    #[test]
    fn test_create_folder_then_file_inside() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let folder = dir.path().join("alex");
            let outcome = FileTool::new(FileOp::CreateFolder)
                .execute(&args_with_path(&folder), None)
                .await;
            assert!(outcome.is_success());
            assert!(folder.is_dir());

            let file = folder.join("presentation.pptx");
            let outcome = FileTool::new(FileOp::CreateFile)
                .execute(&args_with_path(&file), None)
                .await;
            assert!(outcome.is_success());
            assert!(file.is_file());
        });
    }

    #[test]
    fn test_create_file_requires_existing_parent() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let orphan = dir.path().join("missing").join("file.txt");
            let outcome = FileTool::new(FileOp::CreateFile)
                .execute(&args_with_path(&orphan), None)
                .await;
            assert!(!outcome.is_success());
            assert!(outcome.error.unwrap().contains("does not exist"));
        });
    }

    #[test]
    fn test_relative_path_rejected() {
        tokio_test::block_on(async {
            let mut args = Params::new();
            args.insert("path".to_string(), json!("relative/folder"));
            let outcome = FileTool::new(FileOp::CreateFolder).execute(&args, None).await;
            assert!(!outcome.is_success());
            assert!(outcome.error.unwrap().contains("not absolute"));
        });
    }

    #[test]
    fn test_write_read_round_trip_and_list() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let file = dir.path().join("notes.txt");

            let mut write_args = args_with_path(&file);
            write_args.insert("content".to_string(), json!("hello world"));
            let outcome = FileTool::new(FileOp::WriteFile)
                .execute(&write_args, None)
                .await;
            assert!(outcome.is_success());

            let outcome = FileTool::new(FileOp::ReadFile)
                .execute(&args_with_path(&file), None)
                .await;
            assert!(outcome.is_success());
            assert_eq!(outcome.data["content"], json!("hello world"));

            let outcome = FileTool::new(FileOp::List)
                .execute(&args_with_path(dir.path()), None)
                .await;
            assert!(outcome.is_success());
            assert_eq!(outcome.data["entries"], json!(["notes.txt"]));
        });
    }

    #[test]
    fn test_delete_tools_are_destructive() {
        let cap = FileTool::new(FileOp::DeleteFolder).capability().clone();
        assert!(cap.preconditions.is_destructive);
        let cap = FileTool::new(FileOp::CreateFolder).capability().clone();
        assert!(!cap.preconditions.is_destructive);
    }
}
