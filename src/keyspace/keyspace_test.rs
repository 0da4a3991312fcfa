use super::*;

fn keyspace() -> KeySpace {
    KeySpace::new("jxt/")
}

#[test]
fn test_new_appends_trailing_slash() {
    assert_eq!(KeySpace::new("jxt").namespace(), "jxt/");
    assert_eq!(KeySpace::new("jxt/").namespace(), "jxt/");
    assert_eq!(KeySpace::new("").namespace(), "");
}

#[test]
fn test_key_builders_follow_layout() {
    let ks = keyspace();

    assert_eq!(ks.meta_key(1), "jxt/tenants/1/meta");
    assert_eq!(ks.database_key(1, "evidence-command"), "jxt/tenants/1/database/evidence-command");
    assert_eq!(ks.ftp_key(2, "ftp_user1"), "jxt/tenants/2/ftp/ftp_user1");
    assert_eq!(ks.storage_key(999), "jxt/tenants/999/storage");
    assert_eq!(ks.domain_key(3, DomainField::Aliases), "jxt/tenants/3/domain/aliases");
    assert_eq!(ks.resolver_key(), "jxt/common/resolver");
    assert_eq!(ks.tenants_prefix(), "jxt/tenants/");
    assert_eq!(ks.common_prefix(), "jxt/common/");
}

#[test]
fn test_parse_tenant_id() {
    let ks = keyspace();

    assert_eq!(ks.parse_tenant_id("jxt/tenants/123/meta"), Some(123));
    assert_eq!(ks.parse_tenant_id("jxt/tenants/7/database/svc"), Some(7));
    assert_eq!(ks.parse_tenant_id("jxt/tenants/abc/meta"), None);
    assert_eq!(ks.parse_tenant_id("jxt/tenants/-1/meta"), None);
    assert_eq!(ks.parse_tenant_id("jxt/tenants/+1/meta"), None);
    assert_eq!(ks.parse_tenant_id("jxt/tenants//meta"), None);
    assert_eq!(ks.parse_tenant_id("other/tenants/1/meta"), None);
    assert_eq!(ks.parse_tenant_id("jxt/common/resolver"), None);
    assert_eq!(ks.parse_tenant_id("jxt/tenants/99999999999999999999/meta"), None);
}

#[test]
fn test_parse_recognizes_every_category() {
    let ks = keyspace();

    assert_eq!(ks.parse("jxt/tenants/1/meta"), Some(ConfigKey::Meta { tenant_id: 1 }));
    assert_eq!(
        ks.parse("jxt/tenants/1/database/evidence-command"),
        Some(ConfigKey::Database {
            tenant_id: 1,
            service_code: "evidence-command".to_string()
        })
    );
    assert_eq!(
        ks.parse("jxt/tenants/1/ftp/ftp_user1"),
        Some(ConfigKey::Ftp {
            tenant_id: 1,
            username: "ftp_user1".to_string()
        })
    );
    assert_eq!(ks.parse("jxt/tenants/1/storage"), Some(ConfigKey::Storage { tenant_id: 1 }));
    assert_eq!(
        ks.parse("jxt/tenants/1/domain/primary"),
        Some(ConfigKey::Domain {
            tenant_id: 1,
            field: DomainField::Primary
        })
    );
    assert_eq!(
        ks.parse("jxt/tenants/1/domain/internal"),
        Some(ConfigKey::Domain {
            tenant_id: 1,
            field: DomainField::Internal
        })
    );
    assert_eq!(ks.parse("jxt/common/resolver"), Some(ConfigKey::Resolver));
}

#[test]
fn test_parse_rejects_unknown_or_malformed_keys() {
    let ks = keyspace();

    assert_eq!(ks.parse("jxt/tenants/1/unknown"), None);
    assert_eq!(ks.parse("jxt/tenants/1/database"), None);
    assert_eq!(ks.parse("jxt/tenants/1/database/"), None);
    assert_eq!(ks.parse("jxt/tenants/1/domain/secondary"), None);
    assert_eq!(ks.parse("jxt/tenants/1/meta/extra"), None);
    assert_eq!(ks.parse("jxt/tenants/1/ftp/a/b"), None);
    assert_eq!(ks.parse("jxt/common/other"), None);
    assert_eq!(ks.parse("jxt/tenants/x/meta"), None);
    assert_eq!(ks.parse("tenants/1/meta"), None);
}

#[test]
fn test_config_key_accessors() {
    let db = ConfigKey::Database {
        tenant_id: 4,
        service_code: "svc".to_string(),
    };
    assert_eq!(db.tenant_id(), Some(4));
    assert_eq!(db.category(), "database");
    assert_eq!(db.config_type(), Some(ConfigType::Database));

    assert_eq!(ConfigKey::Meta { tenant_id: 4 }.config_type(), None);
    assert_eq!(ConfigKey::Resolver.tenant_id(), None);
}

#[test]
fn test_config_type_serde_is_lowercase() {
    let json = serde_json::to_string(&ConfigType::ALL).unwrap();
    assert_eq!(json, r#"["database","ftp","storage"]"#);
    assert_eq!(ConfigType::Ftp.to_string(), "ftp");
}
