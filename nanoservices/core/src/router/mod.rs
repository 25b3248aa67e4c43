//! Routes newly landed objects out of the intake prefix into typed folders.

pub mod store;

use eltflow_utils::EltResult;

use crate::config::types::RouterConfig;
use crate::router::store::ObjectStore;

/// A new object in a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEvent {
    pub bucket: String,
    pub object_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Spreadsheet,
    Image,
    Other,
}

impl FileCategory {
    pub fn prefix<'a>(&self, config: &'a RouterConfig) -> &'a str {
        match self {
            FileCategory::Spreadsheet => &config.spreadsheet_prefix,
            FileCategory::Image => &config.image_prefix,
            FileCategory::Other => &config.other_prefix,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Not under the intake prefix; left alone
    Ignored,
    Moved { from: String, to: String },
}

/// Classify an object by its extension, ignoring case. Leading dots of the
/// basename do not start an extension, so `.xlsx` has none.
pub fn classify(name: &str) -> FileCategory {
    let extension = basename(name)
        .trim_start_matches('.')
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("xlsx" | "xls") => FileCategory::Spreadsheet,
        Some("jpg" | "jpeg" | "png") => FileCategory::Image,
        _ => FileCategory::Other,
    }
}

fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Move an intake object to `<category prefix><basename>`: copy first, then
/// delete the original. A crash in between leaves both copies.
pub async fn route(
    store: &dyn ObjectStore,
    config: &RouterConfig,
    event: &RouteEvent,
) -> EltResult<RouteOutcome> {
    let name = event.object_name.as_str();
    if !name.starts_with(&config.intake_prefix) {
        tracing::info!(bucket = %event.bucket, object = %name, "object outside intake prefix, ignored");
        return Ok(RouteOutcome::Ignored);
    }

    let category = classify(name);
    let to = format!("{}{}", category.prefix(config), basename(name));
    store.copy_object(&event.bucket, name, &to).await?;
    store.delete_object(&event.bucket, name).await?;
    tracing::info!(bucket = %event.bucket, from = %name, to = %to, category = ?category, "object routed");

    Ok(RouteOutcome::Moved { from: name.to_string(), to })
}
