//! Artifact storage: writes generated pages and hands back their public URL.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use castpage_core::write_text_atomic;

use crate::{clock::Clock, transport_helpers::sanitize_for_path};

pub const ERROR_PAGE_NAME: &str = "error.html";
const DEFAULT_SLUG: &str = "landing";
const MAX_SLUG_CHARS: usize = 48;

#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Never fails: storage faults resolve to the error page URL.
    async fn store(&self, html: &str, owner_id: &str) -> String;
}

#[derive(Debug, Clone)]
/// Stores pages under `<root>/<owner>/<slug>-<unix_ms>.html`, served from `public_base_url`.
pub struct FileArtifactStorage {
    root: PathBuf,
    public_base_url: String,
    clock: Arc<dyn Clock>,
}

impl FileArtifactStorage {
    pub fn new(root: PathBuf, public_base_url: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            root,
            public_base_url: public_base_url.trim().trim_end_matches('/').to_string(),
            clock,
        }
    }

    pub fn error_page_url(&self) -> String {
        format!("{}/{ERROR_PAGE_NAME}", self.public_base_url)
    }

    fn write_artifact(&self, html: &str, owner_id: &str) -> Result<String> {
        let owner = sanitize_for_path(owner_id);
        let owner_dir = self.root.join(&owner);
        let stem = format!("{}-{}", slug_for_document(html), self.clock.now_unix_ms());

        let mut file_name = format!("{stem}.html");
        let mut suffix = 1_u32;
        while owner_dir.join(&file_name).exists() {
            suffix = suffix.saturating_add(1);
            file_name = format!("{stem}-{suffix}.html");
        }

        let path = owner_dir.join(&file_name);
        write_text_atomic(&path, html)
            .with_context(|| format!("failed to store artifact {}", path.display()))?;
        Ok(format!("{}/{owner}/{file_name}", self.public_base_url))
    }
}

#[async_trait]
impl ArtifactStorage for FileArtifactStorage {
    async fn store(&self, html: &str, owner_id: &str) -> String {
        match self.write_artifact(html, owner_id) {
            Ok(url) => url,
            Err(error) => {
                tracing::warn!(
                    error = %format!("{error:#}"),
                    owner = owner_id,
                    "artifact storage failed, returning error page"
                );
                self.error_page_url()
            }
        }
    }
}

/// Slug from the document `<title>`, falling back to a fixed stem.
fn slug_for_document(html: &str) -> String {
    let lowered = html.to_ascii_lowercase();
    let title = lowered
        .find("<title")
        .and_then(|start| lowered[start..].find('>').map(|offset| start + offset + 1))
        .and_then(|body_start| {
            lowered[body_start..]
                .find("</title>")
                .map(|end| &lowered[body_start..body_start + end])
        })
        .unwrap_or("");

    let mut slug = String::new();
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= MAX_SLUG_CHARS {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug.to_string()
    }
}
