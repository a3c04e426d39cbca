mod commands;
mod interactive;
mod ui;

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use suprofile_core::{Config, FileStore, MemoryStore, Mode, ProfileEditor, ProfileStore, is_valid_package_name};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "suprofile", version, about = "按应用管理超级用户权限与 SELinux 规则", long_about = None)]
struct Args {
    /// 配置文件路径 (TOML)，默认读取 $SUPROFILE_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 覆盖配置中的数据目录
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// 只在内存中修改，不写回存储
    #[arg(long, global = true)]
    dry_run: bool,

    /// 目标应用包名
    #[arg(short, long, global = true)]
    package: Option<String>,

    /// 目标应用 uid
    #[arg(short, long, global = true)]
    uid: Option<u32>,

    /// 提示信息中显示的应用名称，默认使用包名
    #[arg(long, global = true)]
    label: Option<String>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// 显示应用当前配置
    Show {
        #[arg(long)]
        json: bool,
    },
    /// 授予超级用户权限
    Grant,
    /// 撤销超级用户权限
    Revoke,
    /// 切换 Root 配置模式
    RootMode { mode: Mode },
    /// 切换非 Root 配置模式
    NonRootMode { mode: Mode },
    /// 非 Root 自定义配置: 是否卸载模块
    Umount {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// 模板管理
    Template {
        #[command(subcommand)]
        action: TemplateCmd,
    },
    /// 自定义 SELinux 规则
    Rules {
        #[command(subcommand)]
        action: RulesCmd,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCmd {
    List,
    Show { id: String },
    /// 将模板应用到目标应用
    Apply { id: String },
    /// 从 JSON 文件导入模板
    Import { file: PathBuf },
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum RulesCmd {
    Show,
    /// 从文件读取规则并写入
    Set { file: PathBuf },
    /// 检查规则文件，不写入
    Lint { file: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

/// Where the edited app is identified; resolved once from the command line.
#[derive(Clone, Debug)]
pub struct Target {
    pub package: String,
    pub uid: u32,
    pub label: String,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// dry-run 时先从磁盘读出快照，之后所有修改只落在内存里
pub async fn open_store(config: &Config, target: &Target) -> anyhow::Result<Arc<dyn ProfileStore>> {
    let file_store = FileStore::new(&config.data_dir);
    if !config.dry_run {
        return Ok(Arc::new(file_store));
    }

    let mut snapshot = file_store.get_profile(&target.package, target.uid).await?;
    snapshot.rules = file_store.get_policy_rules(&target.package).await?;
    ui::warn("dry-run 模式: 所有修改不会写入存储");
    Ok(Arc::new(MemoryStore::seeded(snapshot)))
}

pub async fn open_editor(config: &Config, target: &Target) -> anyhow::Result<ProfileEditor> {
    let store = open_store(config, target).await?;
    let editor = ProfileEditor::load(store, &target.package, target.uid, target.label.clone()).await?;
    Ok(editor)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    ctrlc::set_handler(move || {
        println!("{}", "\n\n>> [中断] 收到退出信号".yellow().bold());
        std::process::exit(130);
    })?;

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if args.dry_run {
        config.dry_run = true;
    }
    tracing::debug!(?config, "configuration resolved");

    let target = match (args.package, args.uid) {
        (Some(package), Some(uid)) => Some(Target {
            label: args.label.unwrap_or_else(|| package.clone()),
            package,
            uid,
        }),
        (None, None) => None,
        _ => anyhow::bail!("--package 与 --uid 必须同时指定"),
    };
    if let Some(t) = &target {
        anyhow::ensure!(is_valid_package_name(&t.package), "无效的包名: {}", t.package);
    }

    match args.command {
        Some(cmd) => {
            let succeeded = commands::run(cmd, &config, target.as_ref()).await?;
            if !succeeded {
                std::process::exit(1);
            }
        }
        None => {
            if let Err(e) = interactive::run(&config, target).await {
                ui::err(&format!("程序发生异常错误: {:?}", e));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root_mode() {
        let args = Args::try_parse_from([
            "suprofile", "-p", "com.example.app", "-u", "10123", "root-mode", "custom",
        ])
        .unwrap();
        assert_eq!(args.package.as_deref(), Some("com.example.app"));
        assert_eq!(args.uid, Some(10123));
        assert!(matches!(args.command, Some(Cmd::RootMode { mode: Mode::Custom })));
    }

    #[test]
    fn test_parse_rejects_unknown_mode() {
        let res = Args::try_parse_from(["suprofile", "root-mode", "sudo"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_parse_nested_and_global_flags() {
        let args = Args::try_parse_from([
            "suprofile", "template", "apply", "shell", "--dry-run", "-vv", "-p", "a.b", "-u", "2000",
        ])
        .unwrap();
        assert!(args.dry_run);
        assert_eq!(args.verbose, 2);
        match args.command {
            Some(Cmd::Template { action: TemplateCmd::Apply { id } }) => assert_eq!(id, "shell"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_interactive_when_no_subcommand() {
        let args = Args::try_parse_from(["suprofile"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.package.is_none());
    }
}
