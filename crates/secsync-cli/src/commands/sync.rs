use super::{ApiArgs, load_manifest, plan_group, print_plan};
use colored::Colorize;
use std::io::Write;
use std::path::Path;

pub async fn handle(
    api: &ApiArgs,
    manifest_path: Option<&Path>,
    group: Option<&str>,
    yes: bool,
) -> anyhow::Result<()> {
    let (manifest, path) = load_manifest(manifest_path)?;
    let syncer = api.syncer(manifest.sync.clone())?;
    let groups = manifest.select(group)?;

    println!("マニフェスト: {}", path.display().to_string().cyan());
    println!();

    let mut pending = Vec::new();
    for spec in groups {
        let plan = plan_group(&syncer, spec).await?;
        print_plan(&plan);
        println!();
        if plan.plan.has_changes() || !plan.exists {
            pending.push(spec);
        }
    }

    if pending.is_empty() {
        println!("{}", "✓ すべてのセキュリティグループは最新です".green().bold());
        return Ok(());
    }

    if !yes && !confirm(&format!("{}個のセキュリティグループを同期しますか？", pending.len()))? {
        println!("{}", "キャンセルしました".yellow());
        return Ok(());
    }

    // グループごとに順番に同期する
    let mut failed = 0;
    for spec in pending {
        let desired = spec.desired_rules()?;
        match syncer.sync_security_group(&spec.target(), &desired).await {
            Ok(result) => {
                println!(
                    "{} {}: {}個削除, {}個作成 ({}ms)",
                    "✓".green(),
                    spec.name.cyan(),
                    result.deleted,
                    result.created,
                    result.duration_ms
                );
                if spec.target().id.as_deref() != Some(result.group_id.as_str()) {
                    println!("  セキュリティグループID: {}", result.group_id.yellow());
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {}", "✗".red(), spec.name.cyan(), e);
                if let Some(phase) = e.phase() {
                    eprintln!("  失敗したフェーズ: {}", phase.to_string().red());
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{}個のセキュリティグループの同期に失敗しました", failed);
    }
    println!();
    println!("{}", "✓ 同期が完了しました".green().bold());
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N]: ", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
