#![allow(missing_docs)]

//! Sanitization of a complete document: consistency, exemptions and structure.

use anyhow::Context;
use confscrub_core::{
    CancellationToken, Certificate, Content, OfflineSchemaProvider, SanitizeError,
    Sanitizer, StaticSchemaProvider,
};
use rstest::rstest;
use serde_json::{Value, json};

mod common;
pub use self::common::*;

fn service(content: &Content) -> anyhow::Result<&confscrub_core::Service> {
    content.services.first().context("should have a service")
}

#[rstest]
#[tokio::test]
async fn should_produce_same_output_for_same_salt(gateway: Content) -> anyhow::Result<()> {
    let first = sanitizer(schemas()).sanitize(&gateway).await?;
    let second = sanitizer(schemas()).sanitize(&gateway).await?;

    assert_eq!(first, second);
    Ok(())
}

fn with_credentials(gateway: Content) -> Content {
    Content {
        certificates: vec![Certificate {
            cert: Some(CERTIFICATE.to_string()),
            key: Some(PRIVATE_KEY.to_string()),
            ..Certificate::default()
        }],
        ..gateway
    }
}

#[rstest]
#[tokio::test]
async fn should_regenerate_only_credentials_for_same_salt(gateway: Content) -> anyhow::Result<()> {
    let content = with_credentials(gateway);

    let mut first = sanitizer(schemas()).sanitize(&content).await?;
    let mut second = sanitizer(schemas()).sanitize(&content).await?;

    let cert = |content: &Content| {
        content
            .certificates
            .first()
            .and_then(|certificate| certificate.cert.clone())
    };
    assert!(cert(&first).is_some());
    assert_ne!(cert(&first), cert(&second));

    for sanitized in [&mut first, &mut second] {
        for certificate in &mut sanitized.certificates {
            certificate.cert = None;
            certificate.key = None;
        }
    }
    assert_eq!(first, second);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_differ_between_salts(gateway: Content) -> anyhow::Result<()> {
    let other = Sanitizer::builder(OfflineSchemaProvider)
        .with_salt("another-salt")
        .build();

    let first = offline().sanitize(&gateway).await?;
    let second = other.sanitize(&gateway).await?;

    assert_ne!(service(&first)?.name, service(&second)?.name);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_keep_references_consistent(
    gateway: Content,
    sanitizer: Sanitizer<StaticSchemaProvider>,
) -> anyhow::Result<()> {
    let sanitized = sanitizer.sanitize(&gateway).await?;

    let billing = sanitizer.sanitize_str("billing");
    assert_eq!(service(&sanitized)?.name.as_ref(), Some(&billing));

    let route_service = sanitized
        .routes
        .first()
        .and_then(|route| route.service.as_ref())
        .and_then(|reference| reference.name.as_ref());
    assert_eq!(route_service, Some(&billing));

    let plugin_service = sanitized
        .plugins
        .first()
        .and_then(|plugin| plugin.service.as_ref());
    assert_eq!(plugin_service, Some(&billing));

    let consumer = sanitized
        .consumers
        .first()
        .and_then(|consumer| consumer.username.clone());
    let member = sanitized
        .consumer_groups
        .first()
        .and_then(|group| group.consumers.first())
        .and_then(|member| member.username.clone());
    assert!(consumer.is_some());
    assert_eq!(consumer, member);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_match_select_tags_with_entity_tags(
    gateway: Content,
    sanitizer: Sanitizer<StaticSchemaProvider>,
) -> anyhow::Result<()> {
    let sanitized = sanitizer.sanitize(&gateway).await?;

    let select_tags = sanitized
        .info
        .as_ref()
        .map(|info| info.select_tags.clone())
        .context("should keep _info")?;
    assert_eq!(select_tags, vec![sanitizer.sanitize_str("team-payments")]);
    assert_eq!(service(&sanitized)?.tags, select_tags);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_not_leak_identifying_values(
    gateway: Content,
    sanitizer: Sanitizer<StaticSchemaProvider>,
) -> anyhow::Result<()> {
    let sanitized = sanitizer.sanitize(&gateway).await?;

    let output = serde_json::to_string(&sanitized)?;
    for secret in [
        "billing",
        "alice",
        "customer-42",
        "redis.internal",
        "192.168.",
        "/invoices",
        "team-payments",
    ] {
        assert!(!output.contains(secret), "{secret} leaked in {output}");
    }
    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_keep_exempt_values(
    gateway: Content,
    sanitizer: Sanitizer<StaticSchemaProvider>,
) -> anyhow::Result<()> {
    let sanitized = sanitizer.sanitize(&gateway).await?;

    assert_eq!(sanitized.format_version.as_deref(), Some("3.0"));
    assert_eq!(sanitized.workspace.as_deref(), Some("payments"));

    let service = service(&sanitized)?;
    assert_eq!(service.protocol.as_deref(), Some("https"));
    assert_eq!(service.port, Some(8443));

    let route = service.routes.first().context("should have a route")?;
    assert_eq!(route.methods, vec!["GET", "POST"]);
    assert_eq!(route.protocols, vec!["https"]);
    assert_eq!(route.path_handling.as_deref(), Some("v1"));

    let plugin = sanitized.plugins.first().context("should have a plugin")?;
    assert_eq!(plugin.name.as_deref(), Some("key-auth"));
    assert_eq!(plugin.protocols, vec!["http", "https"]);
    assert_eq!(
        plugin.config.get("id"),
        Some(&json!("9748f662-7711-4a90-8186-dc02f10eb0f5"))
    );
    assert_eq!(plugin.config.get("hide_credentials"), Some(&json!(true)));
    assert_eq!(
        plugin.config.get("key_names"),
        Some(&json!([sanitizer.sanitize_str("apikey")]))
    );

    let upstream = sanitized.upstreams.first().context("should have an upstream")?;
    assert_eq!(upstream.algorithm.as_deref(), Some("round-robin"));
    assert_eq!(upstream.hash_on.as_deref(), Some("none"));

    let vault = sanitized.vaults.first().context("should have a vault")?;
    assert_eq!(vault.name.as_deref(), Some("env"));
    assert_eq!(vault.prefix.as_deref(), Some("payments-env"));
    Ok(())
}

fn service_plugin(content: &Content) -> anyhow::Result<&confscrub_core::Plugin> {
    service(content)?
        .plugins
        .first()
        .context("should have a service plugin")
}

#[rstest]
#[tokio::test]
async fn should_keep_enumerated_settings_from_schema(
    gateway: Content,
    sanitizer: Sanitizer<StaticSchemaProvider>,
) -> anyhow::Result<()> {
    let sanitized = sanitizer.sanitize(&gateway).await?;

    let config = &service_plugin(&sanitized)?.config;
    assert_eq!(config.get("policy"), Some(&json!("redis")));
    assert_eq!(config.get("minute"), Some(&json!(20)));
    assert_eq!(
        config.get("redis"),
        Some(&json!({"host": sanitizer.sanitize_str("redis.internal"), "port": 6379}))
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_fall_back_to_static_exemptions_offline(
    gateway: Content,
    offline: Sanitizer<OfflineSchemaProvider>,
) -> anyhow::Result<()> {
    let sanitized = offline.sanitize(&gateway).await?;

    let plugin = service_plugin(&sanitized)?;
    assert_eq!(plugin.name.as_deref(), Some("rate-limiting"));
    assert_eq!(
        plugin.config.get("policy"),
        Some(&json!(offline.sanitize_str("redis")))
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_sanitize_route_expressions_and_endpoints(
    gateway: Content,
    sanitizer: Sanitizer<StaticSchemaProvider>,
) -> anyhow::Result<()> {
    let sanitized = sanitizer.sanitize(&gateway).await?;
    let routes = &service(&sanitized)?.routes;

    let source = routes
        .first()
        .and_then(|route| route.sources.first())
        .and_then(|source| source.ip.as_ref())
        .map(ToString::to_string)
        .context("should keep the source address")?;
    assert!(source.starts_with("10."), "{source}");
    assert!(source.ends_with("/24"), "{source}");

    let expression = routes
        .get(1)
        .and_then(|route| route.expression.as_ref())
        .map(ToString::to_string)
        .context("should keep the expression")?;
    let host = sanitizer.sanitize_str("billing.example.com");
    let expected_prefix = format!(r#"http.host == "{host}" && net.src.ip in 10."#);
    assert!(expression.starts_with(&expected_prefix), "{expression}");
    assert!(expression.ends_with("/24"), "{expression}");
    assert_eq!(routes.get(1).and_then(|route| route.priority), Some(100));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_round_trip_document_shape(
    gateway: Content,
    sanitizer: Sanitizer<StaticSchemaProvider>,
) -> anyhow::Result<()> {
    let sanitized = sanitizer.sanitize(&gateway).await?;

    let original = serde_json::to_value(&gateway)?;
    let output = serde_json::to_value(&sanitized)?;
    let keys = |value: &Value| {
        value
            .as_object()
            .map(|object| object.keys().cloned().collect::<Vec<_>>())
    };
    assert_eq!(keys(&original), keys(&output));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_not_be_idempotent(
    gateway: Content,
    sanitizer: Sanitizer<StaticSchemaProvider>,
) -> anyhow::Result<()> {
    let once = sanitizer.sanitize(&gateway).await?;
    let twice = sanitizer.sanitize(&once).await?;

    assert_ne!(service(&once)?.name, service(&twice)?.name);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_stop_when_cancelled(
    gateway: Content,
    sanitizer: Sanitizer<StaticSchemaProvider>,
) {
    let token = CancellationToken::new();
    token.cancel();

    let result = sanitizer.sanitize_with_cancellation(&gateway, &token).await;

    assert!(matches!(result, Err(SanitizeError::Cancelled)));
}

#[rstest]
#[tokio::test]
async fn should_report_entity_error_rather_than_cancelled_siblings(
    gateway: Content,
    sanitizer: Sanitizer<StaticSchemaProvider>,
) {
    let content = Content {
        certificates: vec![Certificate {
            cert: Some(CERTIFICATE.to_string()),
            ..Certificate::default()
        }],
        ..gateway
    };

    for _attempt in 0..8 {
        let result = sanitizer.sanitize(&content).await;

        assert!(
            matches!(
                result,
                Err(SanitizeError::UnsupportedEntity {
                    entity: "certificates",
                    ..
                })
            ),
            "{result:?}"
        );
    }
}
