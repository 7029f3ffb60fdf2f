//! secsync.yaml マニフェスト

use secsync::{DesiredRule, SecurityGroupTarget, SyncConfig, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_ENV: &str = "SECSYNC_MANIFEST";
pub const MANIFEST_FILE: &str = "secsync.yaml";
const MANIFEST_DIR: &str = ".secsync";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error(
        "マニフェストが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: secsync.yaml\n\
        - ./.secsync/ ディレクトリ\n\
        - ~/.config/secsync/secsync.yaml\n\
        または SECSYNC_MANIFEST 環境変数で直接指定できます"
    )]
    NotFound,

    #[error("マニフェストが存在しません: {0}")]
    NotFoundAt(PathBuf),

    #[error("マニフェストの解析に失敗しました: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("グループ '{group}' のルールが不正です: {source}")]
    InvalidRule {
        group: String,
        #[source]
        source: SyncError,
    },

    #[error("マニフェストが不正です: {0}")]
    Invalid(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ManifestError>;

/// Top level of `secsync.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

/// One security group and the rules it should have
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,

    /// Existing group id; the group is created when absent
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub vpc_id: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

/// A rule in text form (`in:allow 10.0.0.0/24 tcp 22`) or structured form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    Text(String),
    Structured(DesiredRule),
}

impl RuleEntry {
    pub fn to_desired(&self) -> std::result::Result<DesiredRule, SyncError> {
        match self {
            RuleEntry::Text(text) => text.parse(),
            RuleEntry::Structured(rule) => Ok(rule.clone()),
        }
    }
}

impl GroupSpec {
    pub fn desired_rules(&self) -> Result<Vec<DesiredRule>> {
        self.rules
            .iter()
            .map(RuleEntry::to_desired)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|source| ManifestError::InvalidRule {
                group: self.name.clone(),
                source,
            })
    }

    pub fn target(&self) -> SecurityGroupTarget {
        SecurityGroupTarget {
            id: self.id.clone().filter(|id| !id.is_empty()),
            vpc_id: self.vpc_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }

    fn matches(&self, selector: &str) -> bool {
        self.name == selector || self.id.as_deref() == Some(selector)
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!("Loading manifest: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check names, targets and rule syntax without touching the network
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err(ManifestError::Invalid("グループ名が空です".to_string()));
            }
            if !names.insert(group.name.as_str()) {
                return Err(ManifestError::Invalid(format!(
                    "グループ名が重複しています: {}",
                    group.name
                )));
            }
            if group.target().id.is_none() && group.vpc_id.is_empty() {
                return Err(ManifestError::Invalid(format!(
                    "グループ '{}' には id か vpc_id が必要です",
                    group.name
                )));
            }
            group.desired_rules()?;
        }
        Ok(())
    }

    /// Groups to process, all of them when `selector` is `None`
    pub fn select(&self, selector: Option<&str>) -> Result<Vec<&GroupSpec>> {
        let Some(selector) = selector else {
            return Ok(self.groups.iter().collect());
        };

        let selected: Vec<&GroupSpec> = self
            .groups
            .iter()
            .filter(|group| group.matches(selector))
            .collect();
        if selected.is_empty() {
            return Err(ManifestError::Invalid(format!(
                "グループが見つかりません: {}",
                selector
            )));
        }
        Ok(selected)
    }
}

/// マニフェストを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 SECSYNC_MANIFEST (直接パス指定)
/// 2. カレントディレクトリ: secsync.yaml
/// 3. ./.secsync/secsync.yaml
/// 4. ~/.config/secsync/secsync.yaml (グローバル設定)
pub fn find_manifest() -> Result<PathBuf> {
    if let Ok(manifest_path) = std::env::var(MANIFEST_ENV) {
        let path = PathBuf::from(manifest_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ManifestError::NotFoundAt(path));
    }

    let current_dir = std::env::current_dir()?;

    let path = current_dir.join(MANIFEST_FILE);
    if path.exists() {
        return Ok(path);
    }

    let path = current_dir.join(MANIFEST_DIR).join(MANIFEST_FILE);
    if path.exists() {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("secsync").join(MANIFEST_FILE);
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ManifestError::NotFound)
}
