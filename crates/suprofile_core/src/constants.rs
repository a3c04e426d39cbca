pub const APP_NAME: &str = "SuProfile";
pub const VERSION: &str = "1.0.0-rc2";

// 与内核 allowlist.c 的 forbid_system_uid 保持一致
pub const SYSTEM_UID: u32 = 1000;
pub const SHELL_UID: u32 = 2000;

pub const ROOT_UID: u32 = 0;
pub const ROOT_GID: u32 = 0;
pub const DEFAULT_SELINUX_DOMAIN: &str = "u:r:su:s0";

pub const CONFIG_ENV: &str = "SUPROFILE_CONFIG";
pub const PROFILES_DIR: &str = "profiles";
pub const SEPOLICY_DIR: &str = "sepolicy";
pub const TEMPLATES_DIR: &str = "templates";

pub const WARNING_TEXTS: &[&str] = &[
    "⚠️  授予 Root 权限的应用可以完全控制设备，请只授权给信任的应用",
    "⚠️  自定义 SELinux 规则写错可能导致应用无法工作",
];

pub const MENU_OPTIONS: &[(&str, &str)] = &[
    ("1", "查看当前应用配置"),
    ("2", "授予超级用户权限"),
    ("3", "撤销超级用户权限"),
    ("4", "切换 Root 配置模式 (默认/模板/自定义)"),
    ("5", "切换非 Root 配置模式 (默认/自定义)"),
    ("6", "选择并应用模板"),
    ("7", "编辑自定义 SELinux 规则"),
    ("8", "切换卸载模块 (umount modules)"),
    ("0", "退出程序"),
];
