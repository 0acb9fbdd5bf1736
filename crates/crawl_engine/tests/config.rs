use std::time::Duration;

use crawl_core::{ConfigError, ExtractionStrategyKind};
use crawl_engine::CrawlConfig;
use pretty_assertions::assert_eq;

#[test]
fn empty_document_yields_defaults() {
    let config = CrawlConfig::from_json_str("{}").unwrap();
    assert_eq!(config, CrawlConfig::default());
    assert_eq!(config.workers, 5);
    assert_eq!(config.request_interval_ms, 500);
    assert_eq!(config.full_load_timeout_ms, 30_000);
    assert_eq!(config.content_loaded_timeout_ms, 15_000);
    assert_eq!(config.max_pages, None);
    assert_eq!(config.link_filter_concurrency, 20);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = CrawlConfig::from_json_str(r#"{"worker_count": 3}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(msg) if msg.contains("worker_count")));
}

#[test]
fn partial_document_overrides_only_named_fields() {
    let config =
        CrawlConfig::from_json_str(r#"{"workers": 2, "max_pages": 10, "strategy": "generic"}"#)
            .unwrap();
    assert_eq!(config.workers, 2);
    assert_eq!(config.max_pages, Some(10));
    assert_eq!(config.max_depth, 5);

    let plan = config.validate("https://deepwiki.com/org/repo").unwrap();
    assert_eq!(plan.strategy, ExtractionStrategyKind::Generic);
    assert_eq!(plan.scope.max_pages(), Some(10));
}

#[test]
fn plan_carries_validated_settings() {
    let plan = CrawlConfig::default()
        .validate("https://Docs.Example.com/guide/#top")
        .unwrap();

    assert_eq!(plan.seed.as_str(), "https://docs.example.com/guide");
    assert_eq!(plan.scope.domain(), "docs.example.com");
    assert_eq!(plan.scope.path_prefix(), "/");
    assert_eq!(plan.strategy, ExtractionStrategyKind::Generic);
    assert_eq!(plan.request_interval, Duration::from_millis(500));
    assert_eq!(plan.fetch_policy.full_load_timeout, Duration::from_secs(30));
    assert_eq!(plan.fetch_policy.content_loaded_timeout, Duration::from_secs(15));
    assert_eq!(plan.collaborator_timeout, Duration::from_secs(20));
}

#[test]
fn auto_strategy_detects_deepwiki_seeds() {
    let plan = CrawlConfig::default()
        .validate("https://deepwiki.com/org/repo")
        .unwrap();
    assert_eq!(plan.strategy, ExtractionStrategyKind::site_specific("deepwiki"));
}

#[test]
fn invalid_settings_fail_before_the_run() {
    let seed = "https://docs.example.com/";
    let cases = [
        (
            CrawlConfig {
                workers: 0,
                ..CrawlConfig::default()
            },
            ConfigError::ZeroWorkers,
        ),
        (
            CrawlConfig {
                max_pages: Some(0),
                ..CrawlConfig::default()
            },
            ConfigError::ZeroMaxPages,
        ),
        (
            CrawlConfig {
                content_loaded_timeout_ms: 0,
                ..CrawlConfig::default()
            },
            ConfigError::ZeroTimeout {
                name: "content_loaded_timeout_ms",
            },
        ),
        (
            CrawlConfig {
                strategy: "mystery".to_string(),
                ..CrawlConfig::default()
            },
            ConfigError::UnknownStrategy("mystery".to_string()),
        ),
        (
            CrawlConfig {
                link_relevance_threshold: 1.5,
                ..CrawlConfig::default()
            },
            ConfigError::InvalidRelevanceThreshold(1.5),
        ),
        (
            CrawlConfig {
                link_filter_concurrency: 0,
                ..CrawlConfig::default()
            },
            ConfigError::ZeroLinkFilterConcurrency,
        ),
        (
            CrawlConfig {
                path_prefix: Some("docs".to_string()),
                ..CrawlConfig::default()
            },
            ConfigError::InvalidPathPrefix("docs".to_string()),
        ),
    ];

    for (config, expected) in cases {
        assert_eq!(config.validate(seed).unwrap_err(), expected);
    }
}

#[test]
fn jitter_must_stay_below_one() {
    for jitter in [1.0, -0.1, f64::NAN] {
        let config = CrawlConfig {
            jitter,
            ..CrawlConfig::default()
        };
        let err = config.validate("https://docs.example.com/").unwrap_err();
        assert!(matches!(err, ConfigError::RateLimiterMisconfiguration(_)), "{jitter}");
    }
}

#[test]
fn seed_must_sit_inside_the_path_prefix() {
    let config = CrawlConfig {
        path_prefix: Some("/docs".to_string()),
        ..CrawlConfig::default()
    };

    assert!(config.validate("https://example.com/docs/start").is_ok());
    let err = config.validate("https://example.com/blog/").unwrap_err();
    assert!(matches!(err, ConfigError::SeedOutOfScope { .. }));
}

#[test]
fn malformed_seed_is_rejected() {
    let err = CrawlConfig::default().validate("ftp://example.com/").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSeed(_)));
}
