pub mod plan;
pub mod show;
pub mod sync;
pub mod validate;

use crate::manifest::{self, GroupSpec, Manifest};
use anyhow::Context;
use clap::Args;
use colored::Colorize;
use secsync::{
    CanonicalRule, EgressInvariant, RuleDiff, SecurityGroupSyncer, SyncConfig, SyncError,
    SyncPlan, canonicalize_desired,
};
use secsync_vpc::{VpcConfig, VpcProvider};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// VPC API 接続設定
#[derive(Args, Debug, Clone, Default)]
pub struct ApiArgs {
    /// VPC API のエンドポイント
    #[arg(long, env = secsync_vpc::config::ENDPOINT_ENV, global = true)]
    pub endpoint: Option<String>,

    /// APIトークン
    #[arg(long, env = secsync_vpc::config::TOKEN_ENV, hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// リージョン
    #[arg(long, env = secsync_vpc::config::REGION_ENV, global = true)]
    pub region: Option<String>,

    /// リクエストのタイムアウト（秒）
    #[arg(long, env = secsync_vpc::config::TIMEOUT_ENV, global = true)]
    pub timeout: Option<u64>,
}

impl ApiArgs {
    pub fn to_config(&self) -> anyhow::Result<VpcConfig> {
        let endpoint = self.endpoint.clone().context(
            "APIエンドポイントが指定されていません (--endpoint または SECSYNC_API_ENDPOINT)",
        )?;
        let token = self
            .token
            .clone()
            .context("APIトークンが指定されていません (--token または SECSYNC_API_TOKEN)")?;

        let mut config = VpcConfig::new(endpoint, token);
        if let Some(region) = self.region.clone().filter(|r| !r.is_empty()) {
            config = config.with_region(region);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn syncer(&self, config: SyncConfig) -> anyhow::Result<SecurityGroupSyncer<VpcProvider>> {
        let provider = VpcProvider::from_config(self.to_config()?)?;
        Ok(SecurityGroupSyncer::new(provider, config))
    }
}

/// マニフェストを読み込む（パス未指定時は自動検出）
pub fn load_manifest(path: Option<&Path>) -> anyhow::Result<(Manifest, PathBuf)> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => manifest::find_manifest()?,
    };
    let manifest = Manifest::load(&path)
        .with_context(|| format!("マニフェストの読み込みに失敗しました: {}", path.display()))?;
    Ok((manifest, path))
}

/// マニフェストの sync 設定（マニフェストが無ければデフォルト）
pub fn sync_config(path: Option<&Path>) -> anyhow::Result<SyncConfig> {
    if path.is_none() {
        match manifest::find_manifest() {
            Ok(found) => return Ok(load_manifest(Some(&found))?.0.sync),
            Err(manifest::ManifestError::NotFound) => {
                tracing::debug!("No manifest found, using default sync config");
                return Ok(SyncConfig::default());
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(load_manifest(path)?.0.sync)
}

/// Plan for one manifest group
#[derive(Debug, Serialize)]
pub struct GroupPlan {
    pub name: String,

    /// Whether the group already exists on the provider
    pub exists: bool,

    pub plan: SyncPlan,
}

/// Plan one manifest group without mutating anything.
///
/// A group that does not exist yet plans every desired rule as an addition.
pub async fn plan_group(
    syncer: &SecurityGroupSyncer<VpcProvider>,
    group: &GroupSpec,
) -> anyhow::Result<GroupPlan> {
    let desired = group.desired_rules()?;

    if let Some(id) = group.target().id {
        match syncer.plan(&id, &desired).await {
            Ok(plan) => {
                return Ok(GroupPlan {
                    name: group.name.clone(),
                    exists: true,
                    plan,
                });
            }
            Err(e) if matches!(e.root(), SyncError::GroupNotFound(_)) => {
                tracing::debug!("Security group {} not found, planning creation", id);
            }
            Err(e) => return Err(e.into()),
        }
    }

    let invariant = EgressInvariant::new(syncer.config().egress_fallback_priority);
    let diff = RuleDiff {
        to_add: canonicalize_desired(&desired, &invariant)?,
        ..RuleDiff::default()
    };
    Ok(GroupPlan {
        name: group.name.clone(),
        exists: false,
        plan: SyncPlan::new(&group.name, diff),
    })
}

/// Human readable form of a canonical rule, close to the rule text syntax
pub fn describe_rule(rule: &CanonicalRule) -> String {
    let mut text = format!(
        "{}:{} {} {}",
        rule.direction(),
        rule.action(),
        rule.cidr(),
        rule.protocol()
    );
    if let Some(range) = rule.ports() {
        if range.start == range.end {
            text.push_str(&format!(" {}", range.start));
        } else {
            text.push_str(&format!(" {}", range));
        }
    }
    text
}

pub fn print_plan(group_plan: &GroupPlan) {
    let plan = &group_plan.plan;
    let title = if group_plan.exists {
        format!("{} ({})", group_plan.name, plan.group_id)
    } else {
        format!("{} (新規作成)", group_plan.name)
    };
    println!("{}", title.cyan().bold());

    for rule in &plan.to_remove {
        let mut line = format!("  - {}", describe_rule(&rule.rule));
        if let Some(remote) = &rule.remote_group_ref {
            line.push_str(&format!(" [group: {}]", remote));
        }
        println!("{}", line.red());
    }
    for rule in &plan.to_add {
        println!("{}", format!("  + {}", describe_rule(&rule.rule)).green());
    }
    if !plan.has_changes() {
        println!("  {}", "変更なし".dimmed());
    }
    println!("  {}", plan.summary().to_string().dimmed());
}
