use crate::manifest::{self, Manifest};
use colored::Colorize;
use std::path::Path;

pub fn handle(manifest_path: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "マニフェストを検証中...".blue());

    let path = match manifest_path {
        Some(path) => path.to_path_buf(),
        None => match manifest::find_manifest() {
            Ok(path) => path,
            Err(e) => {
                eprintln!();
                eprintln!("{}", "✗ マニフェストが見つかりません".red().bold());
                eprintln!("  {}", e);
                std::process::exit(1);
            }
        },
    };
    println!("マニフェスト: {}", path.display().to_string().cyan());

    match Manifest::load(&path) {
        Ok(manifest) => {
            println!("{}", "✓ マニフェストは正常です！".green().bold());
            println!();
            println!("サマリー:");
            println!("  グループ: {}個", manifest.groups.len());
            for group in &manifest.groups {
                let target = match group.target().id {
                    Some(id) => id,
                    None => format!("新規作成 in {}", group.vpc_id),
                };
                println!(
                    "    - {} ({}, {}個のルール)",
                    group.name.cyan(),
                    target,
                    group.rules.len()
                );
            }
            println!(
                "  egress fallback 優先度: {}",
                manifest.sync.egress_fallback_priority
            );
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ マニフェストエラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
