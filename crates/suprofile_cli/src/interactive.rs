use colored::*;
use figlet_rs::FIGfont;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs;
use std::io::{self, Write};
use suprofile_core::constants::*;
use suprofile_core::sepolicy;
use suprofile_core::{Config, Mode, ProfileEditor, TemplateRepository, is_valid_package_name};

use crate::commands::report;
use crate::{Target, open_editor, ui};

fn prompt_line(rl: &mut DefaultEditor, prompt: &str) -> Option<String> {
    match rl.readline(prompt) {
        Ok(line) => {
            let line = line.trim().to_string();
            if line.is_empty() { None } else { Some(line) }
        }
        Err(_) => None,
    }
}

fn ask_target(rl: &mut DefaultEditor) -> Option<Target> {
    ui::step("请输入要管理的应用");
    let package = prompt_line(rl, "包名> ")?;
    if !is_valid_package_name(&package) {
        ui::err(&format!("无效的包名: {}", package));
        return None;
    }
    let uid = match prompt_line(rl, "uid> ")?.parse::<u32>() {
        Ok(uid) => uid,
        Err(_) => {
            ui::err("uid 必须是数字");
            return None;
        }
    };
    let label = prompt_line(rl, "应用名称 (可留空)> ").unwrap_or_else(|| package.clone());
    Some(Target { package, uid, label })
}

pub async fn run(config: &Config, target: Option<Target>) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new()?;
    let target = match target {
        Some(t) => t,
        None => match ask_target(&mut rl) {
            Some(t) => t,
            None => {
                ui::warn("未指定应用，退出。");
                return Ok(());
            }
        },
    };

    let mut editor = open_editor(config, &target).await?;
    let templates = TemplateRepository::new(config.templates_dir());

    loop {
        refresh_ui(&editor);
        match rl.readline("> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() { continue; }
                let _ = rl.add_history_entry(input);
                if input == "0" {
                    println!("{}", "\n下次再见！".green());
                    break;
                }
                println!();
                if let Err(e) = handle_menu_action(input, &mut editor, &templates, &mut rl).await {
                    ui::err(&format!("{:?}", e));
                }
                pause_before_back(&mut rl);
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "\n已通过 Ctrl+C 退出".yellow());
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "\n已通过结束符退出".yellow());
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn refresh_ui(editor: &ProfileEditor) {
    print!("\x1b[2J\x1b[H");
    let _ = io::stdout().flush();

    if let Ok(font) = FIGfont::standard()
        && let Some(art) = font.convert(APP_NAME) {
            println!("{}", art.to_string().cyan());
        } else {
            println!("{}", APP_NAME.cyan().bold());
        }
    println!("版本: {}", VERSION.yellow());

    let divider = "=".repeat(80).white();
    println!("{}", divider);
    for warning in WARNING_TEXTS {
        println!("{}", warning.red().bold());
    }
    println!("{}", divider);
    ui::render_editor(editor);
    println!("{}", divider);
    for (id, desc) in MENU_OPTIONS.iter() {
        println!("{}{}", format!("{:>2}. ", id).bright_cyan(), desc);
    }
    println!("{}", divider);
}

fn pause_before_back(rl: &mut DefaultEditor) {
    let _ = rl.readline(&format!("{}", "按回车返回菜单...".dimmed()));
}

async fn handle_menu_action(
    choice: &str,
    editor: &mut ProfileEditor,
    templates: &TemplateRepository,
    rl: &mut DefaultEditor,
) -> anyhow::Result<()> {
    match choice {
        "1" => ui::render_editor(editor),
        "2" => {
            report(editor.set_allow_su(true).await, "已授予超级用户权限")?;
        }
        "3" => {
            if ui::confirm("确定要撤销超级用户权限吗？", false) {
                report(editor.set_allow_su(false).await, "已撤销超级用户权限")?;
            }
        }
        "4" => {
            if !editor.profile().allow_su {
                ui::warn("请先授予超级用户权限");
                return Ok(());
            }
            let Some(mode) = ask_mode(rl, "Root 配置模式 [default/template/custom]> ") else {
                return Ok(());
            };
            report(editor.select_root_mode(mode).await, &format!("Root 配置模式: {}", mode))?;
            if mode == Mode::Template && editor.profile().root_template.is_none() {
                pick_template(editor, templates, rl).await?;
            }
        }
        "5" => {
            let Some(mode) = ask_mode(rl, "非 Root 配置模式 [default/custom]> ") else {
                return Ok(());
            };
            report(editor.select_non_root_mode(mode).await, &format!("非 Root 配置模式: {}", mode))?;
        }
        "6" => pick_template(editor, templates, rl).await?,
        "7" => edit_rules(editor, rl).await?,
        "8" => {
            let next = !editor.profile().non_root.umount_modules;
            let msg = if next { "已开启卸载模块" } else { "已关闭卸载模块" };
            report(editor.set_umount_modules(next).await, msg)?;
        }
        _ => ui::warn(&format!("未知选项: {}", choice)),
    }
    Ok(())
}

fn ask_mode(rl: &mut DefaultEditor, prompt: &str) -> Option<Mode> {
    let input = prompt_line(rl, prompt)?;
    match input.parse::<Mode>() {
        Ok(mode) => Some(mode),
        Err(e) => {
            ui::err(&e.to_string());
            None
        }
    }
}

async fn pick_template(
    editor: &mut ProfileEditor,
    templates: &TemplateRepository,
    rl: &mut DefaultEditor,
) -> anyhow::Result<()> {
    let list = templates.list().await?;
    ui::render_templates(&list);
    if list.is_empty() {
        return Ok(());
    }

    let Some(input) = prompt_line(rl, "请选择模板 (输入序号)> ") else {
        ui::warn("未选择模板，配置保持不变。");
        return Ok(());
    };
    let choice: usize = input.parse().unwrap_or(0);
    if choice == 0 || choice > list.len() {
        ui::err("无效的选择。");
        return Ok(());
    }
    let template = &list[choice - 1];
    report(editor.apply_template(template).await, &format!("已应用模板: {}", template.name))?;
    Ok(())
}

async fn edit_rules(editor: &mut ProfileEditor, rl: &mut DefaultEditor) -> anyhow::Result<()> {
    if !editor.profile().owns_rules() {
        ui::warn("只有已授权且为自定义 Root 配置时才能编辑规则");
        return Ok(());
    }

    ui::render_rules(&editor.profile().rules);
    let path = match ui::select_rules_file("请选择 SELinux 规则文件") {
        Some(p) => p,
        None => match prompt_line(rl, "规则文件路径> ") {
            Some(p) => p.into(),
            None => {
                ui::warn("已取消。");
                return Ok(());
            }
        },
    };

    let text = fs::read_to_string(&path)?;
    let rules = sepolicy::parse_rules(&text);
    let warnings = sepolicy::lint_rules(&rules);
    ui::render_lint(&warnings);
    if !warnings.is_empty() && !ui::confirm("规则存在可疑语句，仍要写入吗？", false) {
        ui::warn("已取消。");
        return Ok(());
    }

    let msg = if rules.is_empty() {
        "已清空自定义规则".to_string()
    } else {
        format!("已写入 {} 条规则", rules.len())
    };
    report(editor.set_rules(rules).await, &msg)?;
    Ok(())
}
