mod common;

use common::{Call, Failure, MemoryProvider};
use secsync::{
    CanonicalRule, DesiredRule, EgressInvariant, ProviderRule, SecurityGroupSyncer,
    SecurityGroupTarget, SyncConfig, SyncError, SyncPhase, canonicalize_desired,
};

const GROUP: &str = "sg-1";

fn desired(rules: &[&str]) -> Vec<DesiredRule> {
    rules.iter().map(|text| text.parse().unwrap()).collect()
}

fn syncer(provider: MemoryProvider) -> SecurityGroupSyncer<MemoryProvider> {
    SecurityGroupSyncer::new(provider, SyncConfig::default())
}

fn raw_rule(id: &str, protocol: &str, start: i32, end: i32, cidr: &str) -> ProviderRule {
    ProviderRule {
        id: id.to_string(),
        group_id: GROUP.to_string(),
        direction: "Ingress".to_string(),
        policy: Some("Allow".to_string()),
        protocol: protocol.to_string(),
        start_port: start,
        end_port: end,
        allowed_cidr: cidr.to_string(),
        remote_group_ref: None,
        ip_version: "IPv4".to_string(),
        state: "active".to_string(),
    }
}

fn group_keys(provider: &MemoryProvider) -> Vec<String> {
    let mut keys: Vec<String> = provider
        .rules(GROUP)
        .iter()
        .map(|rule| CanonicalRule::from_provider(rule).unwrap().key().to_string())
        .collect();
    keys.sort();
    keys
}

fn desired_keys(rules: &[DesiredRule]) -> Vec<String> {
    canonicalize_desired(rules, &EgressInvariant::default())
        .unwrap()
        .iter()
        .map(|planned| planned.rule.key().to_string())
        .collect()
}

/// 空のグループに新規ルールを作成する
#[tokio::test]
async fn test_sync_into_empty_group() {
    let syncer = syncer(MemoryProvider::new());
    let rules = desired(&["in:allow 10.0.0.0/24 tcp 22"]);

    let result = syncer.sync(GROUP, &rules).await.unwrap();

    assert_eq!(result.created, 1);
    assert_eq!(result.deleted, 0);
    assert_eq!(
        syncer.provider().calls(),
        vec![Call::List(GROUP.to_string()), Call::Create(GROUP.to_string(), 1)]
    );
    assert_eq!(group_keys(syncer.provider()), desired_keys(&rules));
}

/// 2回目の同期では何も変更しない
#[tokio::test]
async fn test_second_sync_is_noop() {
    let syncer = syncer(MemoryProvider::new());
    let rules = desired(&[
        "in:allow 10.0.0.0/8 tcp",
        "in:allow tcp 80,443",
        "in:deny 192.168.1.0/24 udp 1000-2000",
        "in:allow 10.0.0.0/8 icmp",
        "out:allow 10.1.0.0/16 tcp 5432",
    ]);

    syncer.sync(GROUP, &rules).await.unwrap();
    syncer.provider().clear_calls();

    let result = syncer.sync(GROUP, &rules).await.unwrap();

    assert!(result.is_noop());
    assert_eq!(syncer.provider().mutation_count(), 0);
}

/// 同期後のグループは正規化した希望ルールと一致する
#[tokio::test]
async fn test_sync_converges_to_desired_set() {
    let provider = MemoryProvider::new().with_rules(
        GROUP,
        &["in:allow tcp 22", "in:allow tcp 8080", "out:allow any"],
    );
    let syncer = syncer(provider);
    let rules = desired(&["in:allow tcp 22", "in:allow tcp 443", "out:deny 10.0.0.0/8 any"]);

    syncer.sync(GROUP, &rules).await.unwrap();

    assert_eq!(group_keys(syncer.provider()), desired_keys(&rules));
}

/// 削除してから作成する
#[tokio::test]
async fn test_delete_runs_before_create() {
    let provider = MemoryProvider::new().with_rules(GROUP, &["in:allow tcp 22", "in:allow tcp 80"]);
    let syncer = syncer(provider);

    let result = syncer
        .sync(GROUP, &desired(&["in:allow tcp 22", "in:allow tcp 443"]))
        .await
        .unwrap();

    assert_eq!((result.deleted, result.created), (1, 1));
    assert_eq!(
        syncer.provider().calls(),
        vec![
            Call::List(GROUP.to_string()),
            Call::Delete(vec!["rule-2".to_string()]),
            Call::Create(GROUP.to_string(), 1),
        ]
    );
}

/// 空の希望セットは既存ルールをすべて削除する
#[tokio::test]
async fn test_empty_desired_removes_everything() {
    let provider = MemoryProvider::new().with_rules(GROUP, &["in:allow tcp 22", "in:allow udp 53"]);
    let syncer = syncer(provider);

    let result = syncer.sync(GROUP, &[]).await.unwrap();

    assert_eq!(result.deleted, 2);
    assert_eq!(result.created, 0);
    assert!(syncer.provider().rules(GROUP).is_empty());
}

/// egressルールがあればallow-allのegressが1つだけ追加される
#[tokio::test]
async fn test_egress_fallback_is_created_once() {
    let syncer = syncer(MemoryProvider::new());

    let result = syncer
        .sync(GROUP, &desired(&["out:allow 10.1.0.0/16 tcp 443"]))
        .await
        .unwrap();
    assert_eq!(result.created, 2);

    let fallbacks = syncer
        .provider()
        .rules(GROUP)
        .iter()
        .map(|rule| CanonicalRule::from_provider(rule).unwrap())
        .filter(CanonicalRule::is_allow_all_egress)
        .count();
    assert_eq!(fallbacks, 1);
}

/// ingressだけならegressのfallbackは追加しない
#[tokio::test]
async fn test_ingress_only_has_no_egress_fallback() {
    let syncer = syncer(MemoryProvider::new());

    syncer
        .sync(GROUP, &desired(&["in:allow tcp 22"]))
        .await
        .unwrap();

    let rules = syncer.provider().rules(GROUP);
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].direction, "Ingress");
}

/// fallbackの優先度は設定で変えられる
#[tokio::test]
async fn test_egress_fallback_priority_from_config() {
    let config = SyncConfig::default().with_egress_fallback_priority(900);
    let syncer = SecurityGroupSyncer::new(MemoryProvider::new(), config);

    let plan = syncer
        .plan(GROUP, &desired(&["out:allow 10.1.0.0/16 tcp 443"]))
        .await
        .unwrap();

    let fallback = plan
        .to_add
        .iter()
        .find(|planned| planned.rule.is_allow_all_egress())
        .unwrap();
    assert_eq!(fallback.priority, 900);
}

/// リモートグループ参照を持つルールは作り直す
#[tokio::test]
async fn test_remote_group_reference_forces_recreation() {
    let mut remote = raw_rule("r-1", "TCP", 22, 22, "10.0.0.0/24");
    remote.remote_group_ref = Some("sg-other".to_string());
    let syncer = syncer(MemoryProvider::new().with_raw_rule(remote));

    let plan = syncer
        .plan(GROUP, &desired(&["in:allow 10.0.0.0/24 tcp 22"]))
        .await
        .unwrap();
    assert_eq!(plan.removal_ids(), vec!["r-1".to_string()]);
    assert_eq!(plan.to_add.len(), 1);
    assert!(plan.unchanged.is_empty());

    syncer.apply(&plan).await.unwrap();

    let rules = syncer.provider().rules(GROUP);
    assert_eq!(rules.len(), 1);
    assert_ne!(rules[0].id, "r-1");
    assert!(!rules[0].has_remote_group());
}

/// 空のリモートグループ参照は参照なしとして扱う
#[tokio::test]
async fn test_empty_remote_group_reference_is_kept() {
    let mut rule = raw_rule("r-1", "TCP", 22, 22, "10.0.0.0/24");
    rule.remote_group_ref = Some(String::new());
    let syncer = syncer(MemoryProvider::new().with_raw_rule(rule));

    let plan = syncer
        .plan(GROUP, &desired(&["in:allow 10.0.0.0/24 tcp 22"]))
        .await
        .unwrap();

    assert!(!plan.has_changes());
    assert_eq!(plan.unchanged.len(), 1);
}

/// プロバイダ側の表記ゆれは同じルールとして扱う
#[tokio::test]
async fn test_provider_spelling_is_canonicalized() {
    let provider = MemoryProvider::new()
        .with_raw_rule(raw_rule("r-1", "tcp", 0, 65535, "10.0.0.5/8"))
        .with_raw_rule(raw_rule("r-2", "ALL", -1, -1, ""));
    let syncer = syncer(provider);

    let plan = syncer
        .plan(GROUP, &desired(&["in:allow 10.0.0.0/8 tcp", "in:allow any"]))
        .await
        .unwrap();

    assert!(!plan.has_changes());
}

/// 未知のプロトコルのルールは削除される
#[tokio::test]
async fn test_unknown_protocol_is_removed() {
    let syncer = syncer(MemoryProvider::new().with_raw_rule(raw_rule("r-1", "GRE", -1, -1, "")));

    let plan = syncer.plan(GROUP, &[]).await.unwrap();

    assert_eq!(plan.removal_ids(), vec!["r-1".to_string()]);
}

/// IPv6と削除中のルールは対象外
#[tokio::test]
async fn test_ipv6_and_deleting_rules_are_ignored() {
    let mut ipv6 = raw_rule("r-6", "TCP", 22, 22, "");
    ipv6.ip_version = "IPv6".to_string();
    let mut deleting = raw_rule("r-d", "TCP", 80, 80, "");
    deleting.state = "deleting".to_string();

    let provider = MemoryProvider::new()
        .with_raw_rule(ipv6)
        .with_raw_rule(deleting);
    let syncer = syncer(provider);

    let result = syncer.sync(GROUP, &[]).await.unwrap();

    assert!(result.is_noop());
    assert_eq!(syncer.provider().rules(GROUP).len(), 2);
}

/// 削除に失敗したら作成しない
#[tokio::test]
async fn test_delete_failure_skips_create() {
    let provider = MemoryProvider::new()
        .with_rules(GROUP, &["in:allow tcp 80"])
        .failing(Failure::Delete);
    let syncer = syncer(provider);

    let err = syncer
        .sync(GROUP, &desired(&["in:allow tcp 443"]))
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Some(SyncPhase::Delete));
    assert!(matches!(err.root(), SyncError::ApiError(_)));
    assert!(
        !syncer
            .provider()
            .calls()
            .iter()
            .any(|call| matches!(call, Call::Create(..)))
    );
}

/// 作成の失敗はadd phaseとして報告される
#[tokio::test]
async fn test_create_failure_reports_add_phase() {
    let provider = MemoryProvider::new()
        .with_rules(GROUP, &["in:allow tcp 80"])
        .failing(Failure::Create);
    let syncer = syncer(provider);

    let err = syncer
        .sync(GROUP, &desired(&["in:allow tcp 443"]))
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Some(SyncPhase::Add));
    assert!(err.to_string().starts_with("add phase failed for security group sg-1"));
    // 削除は既に完了している
    assert!(syncer.provider().rules(GROUP).is_empty());
}

/// 一覧取得に失敗したら何も変更しない
#[tokio::test]
async fn test_list_failure_makes_no_changes() {
    let syncer = syncer(MemoryProvider::new().failing(Failure::List));

    let err = syncer
        .sync(GROUP, &desired(&["in:allow tcp 22"]))
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Some(SyncPhase::List));
    assert_eq!(syncer.provider().mutation_count(), 0);
}

/// 不正なCIDRはdiff phaseで失敗する
#[tokio::test]
async fn test_invalid_cidr_fails_in_diff_phase() {
    let syncer = syncer(MemoryProvider::new().with_rules(GROUP, &["in:allow tcp 22"]));
    let rules = vec![DesiredRule::new(
        secsync::Direction::In,
        secsync::RuleAction::Allow,
        secsync::Protocol::Tcp,
        "300.0.0.0/8",
    )];

    let err = syncer.sync(GROUP, &rules).await.unwrap_err();

    assert_eq!(err.phase(), Some(SyncPhase::Diff));
    assert!(matches!(err.root(), SyncError::InvalidCidr(_)));
    assert_eq!(syncer.provider().mutation_count(), 0);
}

/// 既存のグループIDはそのまま使う
#[tokio::test]
async fn test_existing_group_is_reused() {
    let syncer = syncer(MemoryProvider::new().with_group(GROUP));

    let result = syncer
        .sync_security_group(
            &SecurityGroupTarget::existing(GROUP),
            &desired(&["in:allow tcp 22"]),
        )
        .await
        .unwrap();

    assert_eq!(result.group_id, GROUP);
    assert_eq!(syncer.provider().groups().len(), 1);
}

/// グループが存在しなければ作成してから同期する
#[tokio::test]
async fn test_missing_group_is_created() {
    let syncer = syncer(MemoryProvider::new());
    let target = SecurityGroupTarget {
        id: Some("sg-gone".to_string()),
        vpc_id: "vpc-1".to_string(),
        name: "web".to_string(),
        description: "web servers".to_string(),
    };

    let result = syncer
        .sync_security_group(&target, &desired(&["in:allow tcp 443"]))
        .await
        .unwrap();

    let groups = syncer.provider().groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name, "web");
    assert_eq!(result.group_id, groups[0].id);
    assert_eq!(syncer.provider().rules(&groups[0].id).len(), 1);
}

/// defaultという名前はVPC IDを前置して作成する
#[tokio::test]
async fn test_default_group_name_is_renamed() {
    let syncer = syncer(MemoryProvider::new());
    let target = SecurityGroupTarget {
        id: None,
        vpc_id: "vpc-1".to_string(),
        name: "default".to_string(),
        description: String::new(),
    };

    syncer.resolve_group(&target).await.unwrap();

    assert_eq!(
        syncer.provider().calls(),
        vec![Call::CreateGroup("vpc-1-default".to_string())]
    );
}

/// グループ参照の失敗はlookup phaseとして報告される
#[tokio::test]
async fn test_group_lookup_failure() {
    let syncer = syncer(MemoryProvider::new().failing(Failure::GetGroup));

    let err = syncer
        .resolve_group(&SecurityGroupTarget::existing(GROUP))
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Some(SyncPhase::Lookup));
    assert!(syncer.provider().groups().is_empty());
}
