use std::time::Duration;
use swapdesk_provider::{
    ExchangeProvider, HttpProvider, MockProvider, ProviderError, ProviderSettings,
};
use swapdesk_types::{CatalogFilter, CurrencyPair, Flow};

fn unreachable_provider() -> HttpProvider {
    // port 9 (discard) is closed on test hosts; connections are refused at once
    HttpProvider::new(ProviderSettings {
        base_url: "http://127.0.0.1:9/v2/".to_string(),
        api_key: "test-key".to_string(),
        request_timeout: Duration::from_millis(500),
        ..ProviderSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_unreachable_gateway_is_transient() {
    let provider = unreachable_provider();

    let err = provider
        .list_currencies(&CatalogFilter::default())
        .await
        .unwrap_err();
    assert!(err.is_transient(), "{err:?}");

    let err = provider
        .exchange_range(&CurrencyPair::new("btc", "eth"), Flow::Floating)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ProviderError::Transport(_) | ProviderError::Timeout),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_health_check_reflects_reachability() {
    // the HTTP provider probes the catalog endpoint, which cannot be reached
    let provider: Box<dyn ExchangeProvider> = Box::new(unreachable_provider().with_id("staging"));
    assert_eq!(provider.id(), "staging");
    assert!(!provider.health_check().await);

    // the mock keeps the trait's default answer
    let mock: Box<dyn ExchangeProvider> = Box::new(MockProvider::new());
    assert!(mock.health_check().await);
}
