use colored::*;
use rfd::FileDialog;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use suprofile_core::sepolicy::RuleWarning;
use suprofile_core::{Mode, Profile, ProfileEditor, Template};

pub fn step(msg: &str) {
    println!("{} {}", ">>".cyan().bold(), msg.bright_white());
}

pub fn ok(msg: &str) {
    println!("{} {}", "✔".green().bold(), msg.green());
}

pub fn warn(msg: &str) {
    println!("{} {}", "⚠️".yellow().bold(), msg.yellow());
}

pub fn err(msg: &str) {
    println!("{} {}", "[!]".red().bold(), msg.red());
}

pub fn select_rules_file(title: &str) -> Option<PathBuf> {
    FileDialog::new()
        .set_title(title)
        .add_filter("SELinux rules", &["rules", "te", "txt"])
        .pick_file()
}

pub fn confirm(msg: &str, default_yes: bool) -> bool {
    if default_yes {
        println!("{} [Y/n]", msg.cyan());
    } else {
        println!("{} [y/N]", msg.cyan());
    }
    let Ok(mut rl) = DefaultEditor::new() else {
        return default_yes;
    };
    if let Ok(line) = rl.readline("> ") {
        let line = line.trim().to_lowercase();
        if line.is_empty() {
            default_yes
        } else {
            line == "y"
        }
    } else {
        default_yes
    }
}

fn mode_label(mode: Mode) -> ColoredString {
    match mode {
        Mode::Default => "默认".normal(),
        Mode::Template => "模板".blue(),
        Mode::Custom => "自定义".magenta(),
    }
}

fn yes_no(v: bool) -> ColoredString {
    if v { "是".green() } else { "否".red() }
}

pub fn render_editor(editor: &ProfileEditor) {
    let p: &Profile = editor.profile();
    println!();
    println!("{} {}", editor.label().bright_white().bold(), format!("({})", p.package_name).dimmed());
    println!("  uid: {}", editor.uid());
    println!("  超级用户: {}", yes_no(p.allow_su));

    if p.allow_su {
        println!("  Root 配置: {}", mode_label(editor.root_mode()));
        match editor.root_mode() {
            Mode::Template => match &p.root_template {
                Some(id) => println!("    模板: {}", id.cyan()),
                None => println!("    {}", "尚未选择模板".yellow()),
            },
            Mode::Custom => {
                println!("    uid/gid: {}/{}", p.root.uid, p.root.gid);
                if !p.root.groups.is_empty() {
                    let groups: Vec<String> = p.root.groups.iter().map(u32::to_string).collect();
                    println!("    groups: {}", groups.join(","));
                }
                if !p.root.capabilities.is_empty() {
                    let caps: Vec<String> = p.root.capabilities.iter().map(u32::to_string).collect();
                    println!("    capabilities: {}", caps.join(","));
                }
                println!("    context: {}", p.root.context);
                println!("    namespace: {}", p.root.namespace);
                println!("    SELinux 规则: {} 条", p.rules.len());
            }
            Mode::Default => {}
        }
    } else {
        println!("  非 Root 配置: {}", mode_label(editor.non_root_mode()));
        if editor.non_root_mode() == Mode::Custom {
            println!("    卸载模块: {}", yes_no(p.non_root.umount_modules));
        }
    }
    println!();
}

pub fn render_templates(templates: &[Template]) {
    if templates.is_empty() {
        warn("没有可用的模板");
        return;
    }
    for (i, t) in templates.iter().enumerate() {
        let origin = if t.local { "本地".normal() } else { "在线".blue() };
        println!(
            "  {:>2}. {} {} [{}] uid={} gid={}",
            i + 1,
            t.id.cyan(),
            t.name.bright_white(),
            origin,
            t.root.uid,
            t.root.gid
        );
        if !t.description.is_empty() {
            println!("      {}", t.description.dimmed());
        }
    }
}

pub fn render_rules(rules: &[String]) {
    if rules.is_empty() {
        warn("没有自定义 SELinux 规则");
        return;
    }
    for (i, r) in rules.iter().enumerate() {
        println!("  {:>3} {}", format!("{}.", i + 1).dimmed(), r);
    }
}

pub fn render_lint(warnings: &[RuleWarning]) {
    if warnings.is_empty() {
        ok("规则检查通过");
        return;
    }
    for w in warnings {
        warn(&format!("第 {} 条 `{}`: {}", w.index + 1, w.rule, w.message));
    }
}
