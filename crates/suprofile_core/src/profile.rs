use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{DEFAULT_SELINUX_DOMAIN, ROOT_GID, ROOT_UID};
use crate::error::ProfileError;

/// Id of a template, referenced by a profile instead of copied into it.
pub type TemplateRef = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    #[default]
    Inherited,
    Global,
    Individual,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Namespace::Inherited => "inherited",
            Namespace::Global => "global",
            Namespace::Individual => "individual",
        };
        f.write_str(s)
    }
}

/// Identity a root process runs under when the app is granted su.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootProfile {
    pub uid: u32,
    pub gid: u32,
    pub groups: Vec<u32>,
    pub capabilities: Vec<u32>,
    pub context: String,
    pub namespace: Namespace,
}

impl Default for RootProfile {
    fn default() -> Self {
        Self {
            uid: ROOT_UID,
            gid: ROOT_GID,
            groups: Vec::new(),
            capabilities: Vec::new(),
            context: DEFAULT_SELINUX_DOMAIN.to_string(),
            namespace: Namespace::Inherited,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NonRootProfile {
    pub umount_modules: bool,
}

impl Default for NonRootProfile {
    fn default() -> Self {
        Self { umount_modules: true }
    }
}

/// Per-app root/policy record. Never mutated in place once loaded; edits
/// produce a new value via [`Profile::with`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub package_name: String,
    pub uid: u32,
    #[serde(default)]
    pub allow_su: bool,
    #[serde(default = "default_true")]
    pub root_use_default: bool,
    #[serde(default)]
    pub root_template: Option<TemplateRef>,
    #[serde(default = "default_true")]
    pub non_root_use_default: bool,
    #[serde(default)]
    pub root: RootProfile,
    #[serde(default)]
    pub non_root: NonRootProfile,
    /// Not persisted with the profile; lives in the policy store.
    #[serde(skip)]
    pub rules: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Profile {
    pub fn new(package_name: impl Into<String>, uid: u32) -> Self {
        Self {
            package_name: package_name.into(),
            uid,
            allow_su: false,
            root_use_default: true,
            root_template: None,
            non_root_use_default: true,
            root: RootProfile::default(),
            non_root: NonRootProfile::default(),
            rules: Vec::new(),
        }
    }

    /// Copy-on-write edit.
    pub fn with(&self, edit: impl FnOnce(&mut Profile)) -> Profile {
        let mut next = self.clone();
        edit(&mut next);
        next
    }

    /// True when `rules` belong to this package rather than a template or
    /// the system default.
    pub fn owns_rules(&self) -> bool {
        self.allow_su && !self.root_use_default && self.root_template.is_none()
    }

    pub fn root_mode(&self) -> Mode {
        if self.root_use_default {
            Mode::Default
        } else if self.root_template.is_some() {
            Mode::Template
        } else {
            Mode::Custom
        }
    }

    pub fn non_root_mode(&self) -> Mode {
        if self.non_root_use_default {
            Mode::Default
        } else {
            Mode::Custom
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Default,
    Template,
    Custom,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Default => "default",
            Mode::Template => "template",
            Mode::Custom => "custom",
        };
        f.write_str(s)
    }
}

impl FromStr for Mode {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "d" | "默认" => Ok(Mode::Default),
            "template" | "t" | "模板" => Ok(Mode::Template),
            "custom" | "c" | "自定义" => Ok(Mode::Custom),
            _ => Err(ProfileError::InvalidMode(s.to_string())),
        }
    }
}
