use super::{ApiArgs, GroupPlan, load_manifest, plan_group, print_plan};
use colored::Colorize;
use std::path::Path;

pub async fn handle(
    api: &ApiArgs,
    manifest_path: Option<&Path>,
    group: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let (manifest, path) = load_manifest(manifest_path)?;
    let syncer = api.syncer(manifest.sync.clone())?;

    let mut plans: Vec<GroupPlan> = Vec::new();
    for spec in manifest.select(group)? {
        plans.push(plan_group(&syncer, spec).await?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    println!("マニフェスト: {}", path.display().to_string().cyan());
    println!();
    for plan in &plans {
        print_plan(plan);
        println!();
    }

    let changed = plans.iter().filter(|p| p.plan.has_changes()).count();
    if changed == 0 {
        println!("{}", "✓ すべてのセキュリティグループは最新です".green().bold());
    } else {
        println!(
            "{}個のセキュリティグループに変更があります。適用するには: {}",
            changed,
            "secsync sync".cyan()
        );
    }
    Ok(())
}
