use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use swapdesk_provider::{Endpoint, MockProvider};
use swapdesk_quote::{NegotiatorConfig, QuoteNegotiator};
use swapdesk_ratelock::RateLockStore;
use swapdesk_types::{AmountBounds, AmountEdit, BoundsCheck, Flow, QuoteOutcome, QuoteRequest};

fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

fn negotiator(provider: Arc<MockProvider>, debounce: Duration) -> QuoteNegotiator {
    QuoteNegotiator::new(
        provider,
        Arc::new(RateLockStore::in_memory()),
        NegotiatorConfig {
            timeout: Duration::from_secs(2),
            debounce,
            bounds_ttl: Duration::from_secs(60),
        },
    )
}

fn typed(amount: &str) -> QuoteRequest {
    QuoteRequest::new("btc", "eth", AmountEdit::source(amount), Flow::Floating)
}

#[tokio::test]
async fn test_fast_typing_applies_only_last_edit() {
    // Older requests answer first
    let provider = Arc::new(
        MockProvider::new()
            .with_rate("btc", "eth", dec("15.5"))
            .with_estimate_delay(dec("1"), Duration::from_millis(10))
            .with_estimate_delay(dec("1.5"), Duration::from_millis(30))
            .with_estimate_delay(dec("1.55"), Duration::from_millis(60)),
    );
    let negotiator = negotiator(provider.clone(), Duration::ZERO);

    let (first, second, third) = tokio::join!(
        negotiator.estimate(typed("1")),
        negotiator.estimate(typed("1.5")),
        negotiator.estimate(typed("1.55")),
    );

    assert!(first.unwrap().is_superseded());
    assert!(second.unwrap().is_superseded());
    let applied = third.unwrap();
    let quote = applied.quote().unwrap();
    assert_eq!(quote.result.source_amount, dec("1.55"));
    assert_eq!(quote.result.destination_amount, dec("24.025"));
    assert_eq!(quote.generation, 3);

    assert_eq!(negotiator.last_quote().await.unwrap(), quote.clone());
    assert_eq!(provider.calls(Endpoint::Estimate), 3);
}

#[tokio::test]
async fn test_late_response_for_newest_edit_still_wins() {
    // Newest request answers first; older answers arriving later are dropped
    let provider = Arc::new(
        MockProvider::new()
            .with_rate("btc", "eth", dec("15.5"))
            .with_estimate_delay(dec("1"), Duration::from_millis(60))
            .with_estimate_delay(dec("1.5"), Duration::from_millis(30))
            .with_estimate_delay(dec("1.55"), Duration::from_millis(10)),
    );
    let negotiator = negotiator(provider, Duration::ZERO);

    let (first, second, third) = tokio::join!(
        negotiator.estimate(typed("1")),
        negotiator.estimate(typed("1.5")),
        negotiator.estimate(typed("1.55")),
    );

    assert!(first.unwrap().is_superseded());
    assert!(second.unwrap().is_superseded());
    assert!(third.unwrap().quote().is_some());
    assert_eq!(
        negotiator.last_quote().await.unwrap().result.source_amount,
        dec("1.55")
    );
}

#[tokio::test]
async fn test_debounce_coalesces_burst_into_one_request() {
    let provider = Arc::new(MockProvider::new().with_rate("btc", "eth", dec("15.5")));
    let negotiator = negotiator(provider.clone(), Duration::from_millis(30));

    let (first, second, third) = tokio::join!(
        negotiator.estimate(typed("1")),
        negotiator.estimate(typed("1.5")),
        negotiator.estimate(typed("1.55")),
    );

    assert_eq!(first.unwrap(), QuoteOutcome::Superseded { generation: 1 });
    assert_eq!(second.unwrap(), QuoteOutcome::Superseded { generation: 2 });
    assert_eq!(
        third.unwrap().quote().unwrap().result.source_amount,
        dec("1.55")
    );
    assert_eq!(provider.calls(Endpoint::Estimate), 1);
}

#[tokio::test]
async fn test_swap_round_trip_floating() {
    let provider = Arc::new(MockProvider::new().with_rate("btc", "eth", dec("15.5")));
    let negotiator = negotiator(provider, Duration::ZERO);
    let tolerance = dec("0.000001");

    for input in ["1", "0.3", "2.75", "12"] {
        let forward = negotiator.estimate(typed(input)).await.unwrap();
        let derived = forward.quote().unwrap().result.destination_amount;

        let backward = negotiator
            .estimate(QuoteRequest::new(
                "eth",
                "btc",
                AmountEdit::source(derived.to_string()),
                Flow::Floating,
            ))
            .await
            .unwrap();
        let round_tripped = backward.quote().unwrap().result.destination_amount;

        assert!(
            (round_tripped - dec(input)).abs() <= tolerance,
            "{input} -> {derived} -> {round_tripped}"
        );
    }
}

#[tokio::test]
async fn test_out_of_bounds_amount_is_still_quoted() {
    let provider = Arc::new(
        MockProvider::new()
            .with_rate("btc", "eth", dec("15.5"))
            .with_bounds(
                "btc",
                "eth",
                Flow::Floating,
                AmountBounds {
                    min_source_amount: dec("0.01"),
                    max_source_amount: Some(dec("5")),
                },
            ),
    );
    let negotiator = negotiator(provider, Duration::ZERO);

    let outcome = negotiator.estimate(typed("0.001")).await.unwrap();
    let quote = outcome.quote().unwrap();
    assert_eq!(quote.result.destination_amount, dec("0.0155"));
    assert_eq!(
        quote.bounds_check,
        BoundsCheck::BelowMinimum { min: dec("0.01") }
    );
    assert!(quote.bounds_check.is_violation());

    let outcome = negotiator.estimate(typed("6")).await.unwrap();
    assert_eq!(
        outcome.quote().unwrap().bounds_check,
        BoundsCheck::AboveMaximum { max: dec("5") }
    );

    let outcome = negotiator.estimate(typed("1")).await.unwrap();
    assert_eq!(outcome.quote().unwrap().bounds_check, BoundsCheck::WithinBounds);
}

#[tokio::test]
async fn test_bounds_checked_on_derived_source_amount() {
    let provider = Arc::new(
        MockProvider::new()
            .with_rate("btc", "eth", dec("16"))
            .with_bounds(
                "btc",
                "eth",
                Flow::Floating,
                AmountBounds {
                    min_source_amount: dec("0.01"),
                    max_source_amount: Some(dec("5")),
                },
            ),
    );
    let negotiator = negotiator(provider, Duration::ZERO);

    // 160 ETH needs 10 BTC
    let outcome = negotiator
        .estimate(QuoteRequest::new(
            "btc",
            "eth",
            AmountEdit::destination("160"),
            Flow::Floating,
        ))
        .await
        .unwrap();
    assert_eq!(
        outcome.quote().unwrap().bounds_check,
        BoundsCheck::AboveMaximum { max: dec("5") }
    );
}
