use anyhow::Context;
use std::fs;
use suprofile_core::sepolicy;
use suprofile_core::{Config, ProfileError, Template, TemplateRepository};

use crate::{Cmd, RulesCmd, Target, TemplateCmd, Toggle, open_editor, ui};

/// Prints editor-boundary failures as warnings; anything else propagates.
pub fn report(result: suprofile_core::Result<()>, success: &str) -> anyhow::Result<bool> {
    match result {
        Ok(()) => {
            ui::ok(success);
            Ok(true)
        }
        Err(e) if e.is_recoverable() => {
            ui::warn(&e.to_string());
            Ok(false)
        }
        Err(
            e @ (ProfileError::InvalidMode(_)
            | ProfileError::TemplateNotFound(_)
            | ProfileError::InvalidTemplateId(_)
            | ProfileError::InvalidPackageName(_)),
        ) => {
            ui::err(&e.to_string());
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn require(target: Option<&Target>) -> anyhow::Result<&Target> {
    target.context("该命令需要 --package 与 --uid")
}

fn read_rules_file(path: &std::path::Path) -> anyhow::Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("读取规则文件失败: {}", path.display()))?;
    Ok(sepolicy::parse_rules(&text))
}

pub async fn run(cmd: Cmd, config: &Config, target: Option<&Target>) -> anyhow::Result<bool> {
    let templates = TemplateRepository::new(config.templates_dir());

    match cmd {
        Cmd::Show { json } => {
            let editor = open_editor(config, require(target)?).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(editor.profile())?);
            } else {
                ui::render_editor(&editor);
            }
            Ok(true)
        }
        Cmd::Grant => {
            let mut editor = open_editor(config, require(target)?).await?;
            report(editor.set_allow_su(true).await, "已授予超级用户权限")
        }
        Cmd::Revoke => {
            let mut editor = open_editor(config, require(target)?).await?;
            report(editor.set_allow_su(false).await, "已撤销超级用户权限")
        }
        Cmd::RootMode { mode } => {
            let mut editor = open_editor(config, require(target)?).await?;
            let done = report(editor.select_root_mode(mode).await, &format!("Root 配置模式: {}", mode))?;
            if done && mode == suprofile_core::Mode::Template && editor.profile().root_template.is_none() {
                ui::step("请使用 `template apply <id>` 选择一个模板");
            }
            Ok(done)
        }
        Cmd::NonRootMode { mode } => {
            let mut editor = open_editor(config, require(target)?).await?;
            report(editor.select_non_root_mode(mode).await, &format!("非 Root 配置模式: {}", mode))
        }
        Cmd::Umount { state } => {
            let mut editor = open_editor(config, require(target)?).await?;
            let on = matches!(state, Toggle::On);
            report(editor.set_umount_modules(on).await, if on { "已开启卸载模块" } else { "已关闭卸载模块" })
        }
        Cmd::Template { action } => run_template(action, &templates, config, target).await,
        Cmd::Rules { action } => run_rules(action, config, target).await,
    }
}

async fn run_template(
    action: TemplateCmd,
    templates: &TemplateRepository,
    config: &Config,
    target: Option<&Target>,
) -> anyhow::Result<bool> {
    match action {
        TemplateCmd::List => {
            ui::render_templates(&templates.list().await?);
            Ok(true)
        }
        TemplateCmd::Show { id } => match templates.get(&id).await {
            Ok(t) => {
                println!("{}", serde_json::to_string_pretty(&t)?);
                Ok(true)
            }
            Err(e) => report(Err(e), ""),
        },
        TemplateCmd::Apply { id } => {
            let template = match templates.get(&id).await {
                Ok(t) => t,
                Err(e) => return report(Err(e), ""),
            };
            let mut editor = open_editor(config, require(target)?).await?;
            report(editor.apply_template(&template).await, &format!("已应用模板: {}", template.name))
        }
        TemplateCmd::Import { file } => {
            let data = fs::read(&file).with_context(|| format!("读取模板失败: {}", file.display()))?;
            let template: Template = serde_json::from_slice(&data)?;
            templates.save(&template).await?;
            ui::ok(&format!("已导入模板: {}", template.id));
            Ok(true)
        }
        TemplateCmd::Remove { id } => {
            let result = templates.remove(&id).await;
            report(result, &format!("已删除模板: {}", id))
        }
    }
}

async fn run_rules(action: RulesCmd, config: &Config, target: Option<&Target>) -> anyhow::Result<bool> {
    match action {
        RulesCmd::Lint { file } => {
            let rules = read_rules_file(&file)?;
            let warnings = sepolicy::lint_rules(&rules);
            ui::render_lint(&warnings);
            Ok(warnings.is_empty())
        }
        RulesCmd::Show => {
            let editor = open_editor(config, require(target)?).await?;
            ui::render_rules(&editor.profile().rules);
            Ok(true)
        }
        RulesCmd::Set { file } => {
            let rules = read_rules_file(&file)?;
            ui::render_lint(&sepolicy::lint_rules(&rules));
            let mut editor = open_editor(config, require(target)?).await?;
            if !editor.profile().owns_rules() {
                ui::err("规则只在已授权且为自定义 Root 配置时生效，请先执行 `grant` 与 `root-mode custom`");
                return Ok(false);
            }
            let msg = if rules.is_empty() {
                "已清空自定义规则".to_string()
            } else {
                format!("已写入 {} 条规则", rules.len())
            };
            report(editor.set_rules(rules).await, &msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_maps_errors() {
        assert!(report(Ok(()), "ok").unwrap());
        let denied = ProfileError::PermissionDenied { label: "Demo".into(), uid: 1500 };
        assert!(!report(Err(denied), "").unwrap());
        assert!(!report(Err(ProfileError::TemplateNotFound("x".into())), "").unwrap());
        let io = ProfileError::Io(std::io::Error::other("disk gone"));
        assert!(report(Err(io), "").is_err());
    }

    #[tokio::test]
    async fn test_editor_commands_require_target() {
        let config = Config::default();
        let res = run(Cmd::Grant, &config, None).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_grant_persists_to_data_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config { data_dir: dir.path().to_path_buf(), ..Config::default() };
        let target = Target { package: "com.example.app".into(), uid: 10123, label: "Example".into() };

        assert!(run(Cmd::Grant, &config, Some(&target)).await.unwrap());
        let editor = crate::open_editor(&config, &target).await.unwrap();
        assert!(editor.profile().allow_su);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_store_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config { data_dir: dir.path().to_path_buf(), ..Config::default() };
        let dry = Config { dry_run: true, ..config.clone() };
        let target = Target { package: "com.example.app".into(), uid: 10123, label: "Example".into() };

        assert!(run(Cmd::Grant, &dry, Some(&target)).await.unwrap());

        let editor = crate::open_editor(&config, &target).await.unwrap();
        assert!(!editor.profile().allow_su);
        assert!(!dir.path().join(suprofile_core::constants::PROFILES_DIR).exists());
    }

    #[tokio::test]
    async fn test_rules_set_empty_file_clears_rules() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config { data_dir: dir.path().to_path_buf(), ..Config::default() };
        let target = Target { package: "com.example.app".into(), uid: 10123, label: "Example".into() };
        assert!(run(Cmd::Grant, &config, Some(&target)).await.unwrap());
        assert!(run(Cmd::RootMode { mode: suprofile_core::Mode::Custom }, &config, Some(&target)).await.unwrap());

        let rules_file = dir.path().join("custom.rules");
        fs::write(&rules_file, "permissive shell\n").unwrap();
        assert!(run(Cmd::Rules { action: RulesCmd::Set { file: rules_file.clone() } }, &config, Some(&target))
            .await
            .unwrap());

        fs::write(&rules_file, "# nothing left\n").unwrap();
        assert!(run(Cmd::Rules { action: RulesCmd::Set { file: rules_file } }, &config, Some(&target))
            .await
            .unwrap());

        let editor = crate::open_editor(&config, &target).await.unwrap();
        assert!(editor.profile().rules.is_empty());
    }
}
