/// Loader for the view catalog file.
///
/// The catalog is JSON: either a top-level array of views or an object with a
/// `views` array. Every entry is decoded on its own, so one malformed view is
/// skipped with a warning instead of failing the whole catalog.
use std::path::Path;

use serde_json::Value;
use tracing::warn;
use view_context::View;

use crate::error::AppError;

pub fn load_catalog(path: &Path) -> Result<Vec<View>, AppError> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::Catalog {
        path: path.display().to_string(),
        message: format!("failed to read: {e}"),
    })?;
    parse_catalog(&content).map_err(|message| AppError::Catalog {
        path: path.display().to_string(),
        message,
    })
}

pub fn parse_catalog(content: &str) -> Result<Vec<View>, String> {
    let root: Value = serde_json::from_str(content).map_err(|e| format!("invalid JSON: {e}"))?;
    let entries = match root {
        Value::Array(entries) => entries,
        Value::Object(mut object) => match object.remove("views") {
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err("`views` must be an array".to_string()),
            None => return Err("missing `views` array".to_string()),
        },
        _ => return Err("catalog must be an array or an object with `views`".to_string()),
    };

    let mut views = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let view: View = match serde_json::from_value(entry) {
            Ok(view) => view,
            Err(e) => {
                warn!(index, error = %e, "malformed view entry, skipping");
                continue;
            }
        };
        if view.id.trim().is_empty() || view.name.trim().is_empty() {
            warn!(index, id = %view.id, "view has empty id or name, skipping");
            continue;
        }
        views.push(view);
    }
    Ok(views)
}
