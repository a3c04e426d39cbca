use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;

use crate::error::{ProfileError, Result};
use crate::profile::RootProfile;
use crate::store::write_atomic;

/// A named bundle of root settings that profiles reference by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default = "default_local")]
    pub local: bool,
    #[serde(default)]
    pub root: RootProfile,
    #[serde(default)]
    pub rules: Vec<String>,
}

fn default_local() -> bool {
    true
}

impl Template {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            author: String::new(),
            local: true,
            root: RootProfile::default(),
            rules: Vec::new(),
        }
    }
}

static TEMPLATE_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[a-z0-9_.-]+$").ok());

pub fn is_valid_template_id(id: &str) -> bool {
    TEMPLATE_ID.as_ref().is_some_and(|re| re.is_match(id))
}

/// Templates stored as `<dir>/<id>.json`.
#[derive(Clone, Debug)]
pub struct TemplateRepository {
    dir: PathBuf,
}

impl TemplateRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_template_id(id) {
            return Err(ProfileError::InvalidTemplateId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    pub async fn list(&self) -> Result<Vec<Template>> {
        let mut templates = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(templates),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let data = fs::read(&path).await?;
            match serde_json::from_slice::<Template>(&data) {
                Ok(t) => templates.push(t),
                Err(e) => tracing::warn!("skipping unreadable template {}: {}", path.display(), e),
            }
        }

        templates.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(templates)
    }

    pub async fn get(&self, id: &str) -> Result<Template> {
        let path = self.path_of(id)?;
        match fs::read(&path).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ProfileError::TemplateNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, template: &Template) -> Result<()> {
        let path = self.path_of(&template.id)?;
        let data = serde_json::to_vec_pretty(template)?;
        write_atomic(&path, &data).await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        let path = self.path_of(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ProfileError::TemplateNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_id_validation() {
        assert!(is_valid_template_id("shell"));
        assert!(is_valid_template_id("com.example.tpl_v2-1"));
        assert!(!is_valid_template_id("../etc/passwd"));
        assert!(!is_valid_template_id("Shell"));
        assert!(!is_valid_template_id(""));
    }

    #[tokio::test]
    async fn test_repository_save_get_list_remove() {
        let dir = TempDir::new().unwrap();
        let repo = TemplateRepository::new(dir.path());
        assert!(repo.list().await.unwrap().is_empty());

        let mut shell = Template::new("shell", "Shell");
        shell.root.uid = 2000;
        shell.root.gid = 2000;
        repo.save(&shell).await.unwrap();
        repo.save(&Template::new("adb", "ADB")).await.unwrap();

        let listed = repo.list().await.unwrap();
        assert_eq!(listed.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["adb", "shell"]);
        assert_eq!(repo.get("shell").await.unwrap().root.uid, 2000);

        repo.remove("adb").await.unwrap();
        assert!(matches!(repo.get("adb").await, Err(ProfileError::TemplateNotFound(_))));
        assert!(matches!(repo.remove("adb").await, Err(ProfileError::TemplateNotFound(_))));
    }

    #[tokio::test]
    async fn test_repository_rejects_bad_id() {
        let dir = TempDir::new().unwrap();
        let repo = TemplateRepository::new(dir.path());
        assert!(matches!(
            repo.get("../x").await,
            Err(ProfileError::InvalidTemplateId(_))
        ));
    }

    #[tokio::test]
    async fn test_repository_skips_broken_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.json"), b"nope").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"ignored").unwrap();
        let repo = TemplateRepository::new(dir.path());
        repo.save(&Template::new("ok", "Ok")).await.unwrap();
        let listed = repo.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "ok");
    }
}
