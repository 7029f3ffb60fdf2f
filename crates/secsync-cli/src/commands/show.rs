use super::{ApiArgs, describe_rule, sync_config};
use colored::Colorize;
use std::path::Path;

pub async fn handle(
    api: &ApiArgs,
    manifest_path: Option<&Path>,
    group_id: &str,
) -> anyhow::Result<()> {
    let syncer = api.syncer(sync_config(manifest_path)?)?;
    let rules = syncer.current_rules(group_id).await?;

    println!("セキュリティグループ: {}", group_id.cyan().bold());
    if rules.is_empty() {
        println!("  {}", "(ルールなし)".dimmed());
        return Ok(());
    }

    for rule in &rules {
        let mut line = format!("  {}  {}", rule.id.dimmed(), describe_rule(&rule.rule));
        if let Some(remote) = &rule.remote_group_ref {
            line.push_str(&format!(" [group: {}]", remote.yellow()));
        }
        println!("{}", line);
    }
    println!();
    println!("  ルール: {}個", rules.len());
    Ok(())
}
