use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;

use crate::constants::{PROFILES_DIR, SEPOLICY_DIR};
use crate::error::{ProfileError, Result};
use crate::profile::Profile;
use crate::sepolicy;

/// Source of truth for per-app profiles and their SELinux rules.
///
/// Setters report `Ok(false)` when the backend refused the write; the editor
/// treats that the same as an error.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, package_name: &str, uid: u32) -> Result<Profile>;
    async fn set_profile(&self, profile: &Profile) -> Result<bool>;
    async fn get_policy_rules(&self, package_name: &str) -> Result<Vec<String>>;
    async fn set_policy_rules(&self, package_name: &str, rules: &[String]) -> Result<bool>;
}

#[derive(Default)]
pub struct MemoryStore {
    profiles: DashMap<(String, u32), Profile>,
    rules: DashMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从已有的配置创建，常用于 --dry-run
    pub fn seeded(mut profile: Profile) -> Self {
        let store = Self::new();
        let rules = std::mem::take(&mut profile.rules);
        if !rules.is_empty() {
            store.rules.insert(profile.package_name.clone(), rules);
        }
        store
            .profiles
            .insert((profile.package_name.clone(), profile.uid), profile);
        store
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, package_name: &str, uid: u32) -> Result<Profile> {
        let key = (package_name.to_string(), uid);
        Ok(self
            .profiles
            .get(&key)
            .map(|p| p.value().clone())
            .unwrap_or_else(|| Profile::new(package_name, uid)))
    }

    async fn set_profile(&self, profile: &Profile) -> Result<bool> {
        let mut stored = profile.clone();
        stored.rules.clear();
        self.profiles
            .insert((profile.package_name.clone(), profile.uid), stored);
        Ok(true)
    }

    async fn get_policy_rules(&self, package_name: &str) -> Result<Vec<String>> {
        Ok(self
            .rules
            .get(package_name)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    async fn set_policy_rules(&self, package_name: &str, rules: &[String]) -> Result<bool> {
        self.rules.insert(package_name.to_string(), rules.to_vec());
        Ok(true)
    }
}

static PACKAGE_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)*$").ok());

/// Dot-separated segments of letters, digits and `_`; no empty segment, so
/// `..` and path separators never reach a file name.
pub fn is_valid_package_name(name: &str) -> bool {
    PACKAGE_NAME.as_ref().is_some_and(|re| re.is_match(name))
}

fn check_package_name(name: &str) -> Result<()> {
    if is_valid_package_name(name) {
        Ok(())
    } else {
        Err(ProfileError::InvalidPackageName(name.to_string()))
    }
}

/// Profiles as JSON under `<root>/profiles/<package>@<uid>.json`, rules as
/// plain text under `<root>/sepolicy/<package>.rules`.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn profile_path(&self, package_name: &str, uid: u32) -> Result<PathBuf> {
        check_package_name(package_name)?;
        Ok(self
            .root
            .join(PROFILES_DIR)
            .join(format!("{}@{}.json", package_name, uid)))
    }

    fn rules_path(&self, package_name: &str) -> Result<PathBuf> {
        check_package_name(package_name)?;
        Ok(self
            .root
            .join(SEPOLICY_DIR)
            .join(format!("{}.rules", package_name)))
    }
}

/// 先写临时文件再 rename，失败时清理临时文件
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir).await?;

    let file_name = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let guard = scopeguard::guard(temp_path.clone(), |p| {
        let _ = std::fs::remove_file(p);
    });
    fs::write(&temp_path, data).await?;
    fs::rename(&temp_path, path).await?;
    scopeguard::ScopeGuard::into_inner(guard);
    Ok(())
}

#[async_trait]
impl ProfileStore for FileStore {
    async fn get_profile(&self, package_name: &str, uid: u32) -> Result<Profile> {
        let path = self.profile_path(package_name, uid)?;
        match fs::read(&path).await {
            Ok(data) => {
                let profile: Profile = serde_json::from_slice(&data)?;
                tracing::debug!(package = package_name, uid, "loaded profile from {}", path.display());
                Ok(profile)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(package = package_name, uid, "no stored profile, using defaults");
                Ok(Profile::new(package_name, uid))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_profile(&self, profile: &Profile) -> Result<bool> {
        let path = self.profile_path(&profile.package_name, profile.uid)?;
        let data = serde_json::to_vec_pretty(profile)?;
        write_atomic(&path, &data).await?;
        Ok(true)
    }

    async fn get_policy_rules(&self, package_name: &str) -> Result<Vec<String>> {
        match fs::read_to_string(self.rules_path(package_name)?).await {
            Ok(text) => Ok(sepolicy::parse_rules(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_policy_rules(&self, package_name: &str, rules: &[String]) -> Result<bool> {
        let text = sepolicy::format_rules(rules);
        write_atomic(&self.rules_path(package_name)?, text.as_bytes()).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_missing_profile_defaults() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let profile = store.get_profile("com.example.app", 10123).await.unwrap();
        assert_eq!(profile, Profile::new("com.example.app", 10123));
        assert!(store.get_policy_rules("com.example.app").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_persists_profile_without_rules() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let profile = Profile::new("com.example.app", 10123).with(|p| {
            p.allow_su = true;
            p.root_use_default = false;
            p.root.groups = vec![3003, 1004];
            p.rules = vec!["allow a b file read".into()];
        });

        assert!(store.set_profile(&profile).await.unwrap());
        let loaded = store.get_profile("com.example.app", 10123).await.unwrap();
        assert!(loaded.allow_su);
        assert_eq!(loaded.root.groups, vec![3003, 1004]);
        assert!(loaded.rules.is_empty());

        // 其他 uid 互不影响
        let other = store.get_profile("com.example.app", 1010123).await.unwrap();
        assert!(!other.allow_su);
    }

    #[tokio::test]
    async fn test_file_store_rules_roundtrip_and_no_temp_left() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let rules = vec!["type a".to_string(), "allow a b file read".to_string()];
        assert!(store.set_policy_rules("com.example.app", &rules).await.unwrap());
        assert_eq!(store.get_policy_rules("com.example.app").await.unwrap(), rules);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join(SEPOLICY_DIR))
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_profile_is_error() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let path = store.profile_path("com.example.app", 10123).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{not json").unwrap();
        assert!(store.get_profile("com.example.app", 10123).await.is_err());
    }

    #[test]
    fn test_package_name_validation() {
        assert!(is_valid_package_name("com.example.app"));
        assert!(is_valid_package_name("android"));
        assert!(is_valid_package_name("com.android.shell_2"));
        assert!(!is_valid_package_name(""));
        assert!(!is_valid_package_name(".."));
        assert!(!is_valid_package_name("../../escaped"));
        assert!(!is_valid_package_name("com..example"));
        assert!(!is_valid_package_name("com/example"));
        assert!(!is_valid_package_name(".hidden"));
    }

    #[tokio::test]
    async fn test_file_store_rejects_bad_package_names() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        let store = FileStore::new(&data);
        let escaped = Profile::new("../../escaped", 10123).with(|p| p.allow_su = true);

        assert!(matches!(
            store.set_profile(&escaped).await,
            Err(ProfileError::InvalidPackageName(_))
        ));
        assert!(matches!(
            store.get_profile("../../escaped", 10123).await,
            Err(ProfileError::InvalidPackageName(_))
        ));
        assert!(matches!(
            store.set_policy_rules("../x", &["permissive a".to_string()]).await,
            Err(ProfileError::InvalidPackageName(_))
        ));
        assert!(matches!(
            store.get_policy_rules("a/b").await,
            Err(ProfileError::InvalidPackageName(_))
        ));
        assert!(!dir.path().join("escaped@10123.json").exists());
        assert!(!data.exists());
    }

    #[tokio::test]
    async fn test_memory_store_seeded() {
        let seed = Profile::new("com.example.app", 10123).with(|p| {
            p.allow_su = true;
            p.rules = vec!["permissive a".into()];
        });
        let store = MemoryStore::seeded(seed);
        let loaded = store.get_profile("com.example.app", 10123).await.unwrap();
        assert!(loaded.allow_su);
        assert_eq!(
            store.get_policy_rules("com.example.app").await.unwrap(),
            vec!["permissive a".to_string()]
        );
    }
}
