use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("不允许为 {label} 授予超级用户权限 (uid {uid})")]
    PermissionDenied { label: String, uid: u32 },

    #[error("更新 {label} 的 SELinux 规则失败")]
    PolicyPersistFailed { label: String },

    #[error("更新 {label} 的应用配置失败 (uid {uid})")]
    ProfilePersistFailed { label: String, uid: u32 },

    #[error("无效的模式: {0}")]
    InvalidMode(String),

    #[error("未找到模板: {0}")]
    TemplateNotFound(String),

    #[error("无效的模板 ID: {0}")]
    InvalidTemplateId(String),

    #[error("无效的包名: {0}")]
    InvalidPackageName(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("配置解析失败: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("其他错误: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl ProfileError {
    /// Editor-boundary failures: shown to the user, prior state untouched.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProfileError::PermissionDenied { .. }
                | ProfileError::PolicyPersistFailed { .. }
                | ProfileError::ProfilePersistFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ProfileError>;
