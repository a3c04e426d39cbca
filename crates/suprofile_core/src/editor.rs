use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::{SHELL_UID, SYSTEM_UID};
use crate::error::{ProfileError, Result};
use crate::profile::{Mode, Profile, RootProfile};
use crate::store::ProfileStore;
use crate::template::Template;

/// Whether `uid` may be granted su at all. Mirrors the kernel allowlist:
/// system-range uids are refused except `system` itself.
pub fn su_allowed_for_uid(uid: u32) -> bool {
    !(uid < SHELL_UID && uid != SYSTEM_UID)
}

/// Edits one app's profile against a [`ProfileStore`].
///
/// Every change goes validate -> persist rules -> persist profile -> swap
/// in-memory state. A failure at any step leaves the editor exactly as it
/// was. Mutating methods take `&mut self`, so edits on one editor never
/// overlap.
pub struct ProfileEditor {
    store: Arc<dyn ProfileStore>,
    label: String,
    uid: u32,
    profile: Profile,
    root_mode: Mode,
}

impl ProfileEditor {
    pub async fn load(
        store: Arc<dyn ProfileStore>,
        package_name: &str,
        uid: u32,
        label: impl Into<String>,
    ) -> Result<Self> {
        let mut profile = store.get_profile(package_name, uid).await?;
        if profile.allow_su {
            profile.rules = store.get_policy_rules(package_name).await?;
        }
        debug!(package = package_name, uid, allow_su = profile.allow_su, "profile loaded");

        let root_mode = profile.root_mode();
        Ok(Self {
            store,
            label: label.into(),
            uid,
            profile,
            root_mode,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn package_name(&self) -> &str {
        &self.profile.package_name
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Mode shown for the root branch. May be `Template` while the stored
    /// profile is still default/custom, until a template is applied.
    pub fn root_mode(&self) -> Mode {
        self.root_mode
    }

    pub fn non_root_mode(&self) -> Mode {
        self.profile.non_root_mode()
    }

    /// Validates and persists `candidate`, replacing the current profile
    /// only if every step succeeds.
    pub async fn commit(&mut self, candidate: Profile) -> Result<()> {
        if candidate.allow_su {
            if !su_allowed_for_uid(self.uid) {
                warn!(uid = self.uid, "refusing su for system uid");
                return Err(ProfileError::PermissionDenied {
                    label: self.label.clone(),
                    uid: self.uid,
                });
            }

            // 规则为空时也要写入，否则清空后的规则会在下次加载时复原
            let rules_changed = candidate.rules != self.profile.rules;
            if !candidate.root_use_default && (!candidate.rules.is_empty() || rules_changed) {
                let persisted = self
                    .store
                    .set_policy_rules(&self.profile.package_name, &candidate.rules)
                    .await
                    .unwrap_or_else(|e| {
                        warn!("set_policy_rules failed: {}", e);
                        false
                    });
                if !persisted {
                    return Err(ProfileError::PolicyPersistFailed {
                        label: self.label.clone(),
                    });
                }
            }
        }

        let persisted = self.store.set_profile(&candidate).await.unwrap_or_else(|e| {
            warn!("set_profile failed: {}", e);
            false
        });
        if !persisted {
            return Err(ProfileError::ProfilePersistFailed {
                label: self.label.clone(),
                uid: self.uid,
            });
        }

        info!(
            package = %candidate.package_name,
            uid = candidate.uid,
            allow_su = candidate.allow_su,
            root_mode = %candidate.root_mode(),
            non_root_mode = %candidate.non_root_mode(),
            "profile updated"
        );
        self.profile = candidate;
        Ok(())
    }

    pub async fn set_allow_su(&mut self, allow: bool) -> Result<()> {
        let candidate = self.profile.with(|p| p.allow_su = allow);
        self.commit(candidate).await?;
        if allow {
            // 未授权时加载不会读取规则，授权后从存储补齐
            match self.store.get_policy_rules(&self.profile.package_name).await {
                Ok(rules) => self.profile = self.profile.with(|p| p.rules = rules),
                Err(e) => warn!("refreshing rules after grant failed: {}", e),
            }
            self.root_mode = self.profile.root_mode();
        }
        Ok(())
    }

    pub async fn select_root_mode(&mut self, mode: Mode) -> Result<()> {
        match mode {
            // 模板模式只切换界面，真正应用要等用户选中某个模板
            Mode::Template => {}
            Mode::Default | Mode::Custom => {
                let candidate = self.profile.with(|p| {
                    p.root_use_default = mode == Mode::Default;
                    p.root_template = None;
                });
                self.commit(candidate).await?;
            }
        }
        self.root_mode = mode;
        Ok(())
    }

    pub async fn select_non_root_mode(&mut self, mode: Mode) -> Result<()> {
        if mode == Mode::Template {
            return Err(ProfileError::InvalidMode(
                "非 Root 配置没有模板模式".to_string(),
            ));
        }
        let candidate = self
            .profile
            .with(|p| p.non_root_use_default = mode == Mode::Default);
        self.commit(candidate).await
    }

    /// The explicit template pick. The template's rules replace any locally
    /// held custom rules and go through the policy store like any other
    /// rule change.
    pub async fn apply_template(&mut self, template: &Template) -> Result<()> {
        let candidate = self.profile.with(|p| {
            p.root_template = Some(template.id.clone());
            p.root_use_default = false;
            p.root = template.root.clone();
            p.rules = template.rules.clone();
        });
        self.commit(candidate).await?;
        self.root_mode = Mode::Template;
        Ok(())
    }

    /// Custom-rule sub-editor. Rule text is taken as-is.
    pub async fn set_rules(&mut self, rules: Vec<String>) -> Result<()> {
        let candidate = self.profile.with(|p| p.rules = rules);
        self.commit(candidate).await
    }

    pub async fn set_root_profile(&mut self, root: RootProfile) -> Result<()> {
        let candidate = self.profile.with(|p| p.root = root);
        self.commit(candidate).await
    }

    pub async fn set_umount_modules(&mut self, umount: bool) -> Result<()> {
        let candidate = self.profile.with(|p| p.non_root.umount_modules = umount);
        self.commit(candidate).await
    }
}
