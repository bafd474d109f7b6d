use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use swapdesk_types::{
    AmountBounds, AmountSide, CatalogFilter, Currency, CurrencyPair, Flow, OrderStatus,
    StatusSnapshot,
};
use tracing::{debug, warn};

use crate::envelope::{decode, ErrorBody};
use crate::{
    AddressVerdict, CreateExchange, CreatedExchange, Estimate, EstimateQuery, ExchangeProvider,
    ProviderError,
};

pub const DEFAULT_BASE_URL: &str = "https://api.changenow.io/v2";
pub const DEFAULT_API_KEY_HEADER: &str = "x-changenow-api-key";
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Connection settings for [`HttpProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: String,
    pub api_key_header: String,
    pub request_timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            request_timeout: Duration::from_millis(15_000),
        }
    }
}

/// JSON-over-HTTPS client for the exchange gateway
pub struct HttpProvider {
    id: String,
    base_url: String,
    client: Client,
}

impl HttpProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        if !settings.api_key.is_empty() {
            let name = reqwest::header::HeaderName::from_bytes(settings.api_key_header.as_bytes())
                .map_err(|e| ProviderError::BadRequest(format!("invalid api key header: {e}")))?;
            let value = HeaderValue::from_str(&settings.api_key)
                .map_err(|e| ProviderError::BadRequest(format!("invalid api key: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            id: "changenow".to_string(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = self.endpoint(path);
        debug!(url = %url, "provider GET");

        let response = self.client.get(&url).query(query).send().await?;
        Self::read_body(response).await
    }

    async fn read_body<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await?;

        if !status.is_success() {
            let err = error_for_status(status, retry_after, &body);
            warn!(status = status.as_u16(), error = %err, "provider request failed");
            return Err(err);
        }

        decode(&body)
    }
}

/// Map a non-2xx response onto [`ProviderError`]
pub fn error_for_status(
    status: StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
) -> ProviderError {
    let message = ErrorBody::describe(body);
    match status.as_u16() {
        400 => ProviderError::BadRequest(message),
        401 | 403 => ProviderError::Unauthorized(message),
        404 => ProviderError::NotFound(message),
        429 => ProviderError::RateLimited {
            retry_after_ms: retry_after_secs.map_or(1000, |secs| secs * 1000),
        },
        code @ 500..=599 => ProviderError::Server {
            status: code,
            message,
        },
        code => ProviderError::Http {
            status: code,
            message,
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// WIRE TYPES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrencyDto {
    ticker: String,
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    network: Option<String>,
    #[serde(default)]
    is_fiat: bool,
    #[serde(default)]
    featured: bool,
    #[serde(default)]
    supports_fixed_rate: bool,
    #[serde(default = "default_true")]
    buy: bool,
    #[serde(default = "default_true")]
    sell: bool,
    #[serde(default)]
    legacy_ticker: Option<String>,
}

fn default_true() -> bool {
    true
}

impl From<CurrencyDto> for Currency {
    fn from(dto: CurrencyDto) -> Self {
        let mut currency = Currency::new(dto.ticker, dto.name);
        if let Some(network) = dto.network.filter(|n| !n.is_empty()) {
            currency.network = network;
        }
        currency.is_fiat = dto.is_fiat;
        currency.featured = dto.featured;
        currency.supports_fixed_rate = dto.supports_fixed_rate;
        // "sell" means the provider accepts it as a deposit
        currency.tradable_as_source = dto.sell;
        currency.tradable_as_destination = dto.buy;
        currency.icon_ref = dto.image;
        currency.legacy_ticker = dto.legacy_ticker;
        currency
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EstimateDto {
    from_amount: Option<Decimal>,
    to_amount: Option<Decimal>,
    #[serde(default)]
    rate_id: Option<String>,
    #[serde(default)]
    valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeDto {
    min_amount: Option<Decimal>,
    #[serde(default)]
    max_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct AddressDto {
    result: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateExchangeDto<'a> {
    from_currency: &'a str,
    to_currency: &'a str,
    from_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_amount: Option<String>,
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refund_address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    flow: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_id: Option<&'a str>,
}

impl<'a> From<&'a CreateExchange> for CreateExchangeDto<'a> {
    fn from(request: &'a CreateExchange) -> Self {
        // Reverse orders are priced off the destination amount
        let to_amount = match request.side {
            AmountSide::Destination => Some(request.to_amount.normalize().to_string()),
            AmountSide::Source => None,
        };
        Self {
            from_currency: &request.pair.source,
            to_currency: &request.pair.destination,
            from_amount: request.from_amount.normalize().to_string(),
            to_amount,
            address: &request.payout_address,
            extra_id: request.payout_extra_id.as_deref(),
            refund_address: request.refund_address.as_deref(),
            user_id: request.user_id.as_deref(),
            flow: request.flow.as_str(),
            kind: request.side.as_estimate_type(),
            rate_id: request.rate_id.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedExchangeDto {
    id: String,
    payin_address: String,
    #[serde(default)]
    payin_extra_id: Option<String>,
    payout_address: String,
    from_amount: Decimal,
    to_amount: Decimal,
    #[serde(default)]
    valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusDto {
    id: String,
    status: String,
    #[serde(default)]
    amount_from: Option<Decimal>,
    #[serde(default)]
    amount_to: Option<Decimal>,
    #[serde(default)]
    payin_hash: Option<String>,
    #[serde(default)]
    payout_hash: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<StatusDto> for StatusSnapshot {
    type Error = ProviderError;

    fn try_from(dto: StatusDto) -> Result<Self, Self::Error> {
        let status: OrderStatus = dto.status.parse().map_err(ProviderError::Malformed)?;
        Ok(StatusSnapshot {
            order_id: dto.id,
            status,
            amount_from: dto.amount_from,
            amount_to: dto.amount_to,
            payin_hash: dto.payin_hash,
            payout_hash: dto.payout_hash,
            updated_at: dto.updated_at,
        })
    }
}

fn estimate_params(query: &EstimateQuery) -> Vec<(&'static str, String)> {
    let amount_key = match query.side {
        AmountSide::Source => "fromAmount",
        AmountSide::Destination => "toAmount",
    };
    let mut params = vec![
        ("fromCurrency", query.pair.source.clone()),
        ("toCurrency", query.pair.destination.clone()),
        (amount_key, query.amount.normalize().to_string()),
        ("flow", query.flow.as_str().to_string()),
        ("type", query.side.as_estimate_type().to_string()),
    ];
    if query.flow == Flow::Fixed {
        params.push(("useRateId", "true".to_string()));
    }
    params
}

// ═══════════════════════════════════════════════════════════════════════════
// PROVIDER IMPL
// ═══════════════════════════════════════════════════════════════════════════

#[async_trait]
impl ExchangeProvider for HttpProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_currencies(&self, filter: &CatalogFilter) -> Result<Vec<Currency>, ProviderError> {
        let query = [
            ("active", filter.active_only.to_string()),
            ("flow", filter.flow.as_str().to_string()),
            ("buy", filter.supports_buy.to_string()),
            ("sell", filter.supports_sell.to_string()),
        ];
        let currencies: Vec<CurrencyDto> = self.get("exchange/currencies", &query).await?;
        Ok(currencies.into_iter().map(Currency::from).collect())
    }

    async fn estimate(&self, query: &EstimateQuery) -> Result<Estimate, ProviderError> {
        let dto: EstimateDto = self
            .get("exchange/estimated-amount", &estimate_params(query))
            .await?;

        // The edited side echoes back; the derived side must be present
        let (from_amount, to_amount) = match query.side {
            AmountSide::Source => (
                dto.from_amount.unwrap_or(query.amount),
                dto.to_amount
                    .ok_or_else(|| ProviderError::Malformed("estimate missing toAmount".into()))?,
            ),
            AmountSide::Destination => (
                dto.from_amount
                    .ok_or_else(|| ProviderError::Malformed("estimate missing fromAmount".into()))?,
                dto.to_amount.unwrap_or(query.amount),
            ),
        };

        Ok(Estimate {
            from_amount,
            to_amount,
            rate_id: dto.rate_id.filter(|id| !id.is_empty()),
            valid_until: dto.valid_until,
        })
    }

    async fn exchange_range(
        &self,
        pair: &CurrencyPair,
        flow: Flow,
    ) -> Result<AmountBounds, ProviderError> {
        let query = [
            ("fromCurrency", pair.source.clone()),
            ("toCurrency", pair.destination.clone()),
            ("flow", flow.as_str().to_string()),
        ];
        let dto: RangeDto = self.get("exchange/range", &query).await?;
        let min_source_amount = dto
            .min_amount
            .ok_or_else(|| ProviderError::Malformed("range missing minAmount".into()))?;

        Ok(AmountBounds {
            min_source_amount,
            max_source_amount: dto.max_amount,
        })
    }

    async fn validate_address(
        &self,
        currency: &str,
        address: &str,
    ) -> Result<AddressVerdict, ProviderError> {
        let query = [
            ("currency", currency.to_string()),
            ("address", address.to_string()),
        ];
        let dto: AddressDto = self.get("validate/address", &query).await?;
        Ok(AddressVerdict {
            result: dto.result,
            message: dto.message,
        })
    }

    async fn create_exchange(
        &self,
        request: &CreateExchange,
    ) -> Result<CreatedExchange, ProviderError> {
        let url = self.endpoint("exchange");
        debug!(url = %url, pair = %request.pair.to_symbol(), "provider POST");

        let response = self
            .client
            .post(&url)
            .header(IDEMPOTENCY_HEADER, &request.idempotency_key)
            .json(&CreateExchangeDto::from(request))
            .send()
            .await?;
        let dto: CreatedExchangeDto = Self::read_body(response).await?;

        Ok(CreatedExchange {
            id: dto.id,
            payin_address: dto.payin_address,
            payin_extra_id: dto.payin_extra_id.filter(|id| !id.is_empty()),
            payout_address: dto.payout_address,
            from_amount: dto.from_amount,
            to_amount: dto.to_amount,
            valid_until: dto.valid_until,
        })
    }

    async fn exchange_status(&self, order_id: &str) -> Result<StatusSnapshot, ProviderError> {
        let dto: StatusDto = self
            .get("exchange/by-id", &[("id", order_id.to_string())])
            .await?;
        StatusSnapshot::try_from(dto)
    }

    async fn health_check(&self) -> bool {
        self.list_currencies(&CatalogFilter::default()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_error_for_status() {
        let err = error_for_status(
            StatusCode::BAD_REQUEST,
            None,
            r#"{"error":"not_valid_params","message":"fromAmount is required"}"#,
        );
        assert_eq!(
            err,
            ProviderError::BadRequest("not_valid_params: fromAmount is required".to_string())
        );

        assert_eq!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, Some(3), ""),
            ProviderError::RateLimited {
                retry_after_ms: 3000
            }
        );
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, None, "upstream"),
            ProviderError::Server { status: 502, .. }
        ));
        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, None, ""),
            ProviderError::Unauthorized(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::CONFLICT, None, ""),
            ProviderError::Http { status: 409, .. }
        ));
    }

    #[test]
    fn test_currency_wire_mapping() {
        let dto: Vec<CurrencyDto> = decode(
            r#"[{"ticker":"USDT","name":"Tether","image":"https://cdn/usdt.svg","network":"eth",
                "isFiat":false,"featured":true,"supportsFixedRate":true,"buy":true,"sell":false,
                "legacyTicker":"usdterc20"}]"#,
        )
        .unwrap();
        let currency = Currency::from(dto.into_iter().next().unwrap());

        assert_eq!(currency.ticker, "usdt");
        assert_eq!(currency.network, "eth");
        assert!(currency.featured);
        assert!(!currency.tradable_as_source);
        assert!(currency.tradable_as_destination);
        assert_eq!(currency.legacy_ticker.as_deref(), Some("usdterc20"));
        assert_eq!(currency.icon_ref.as_deref(), Some("https://cdn/usdt.svg"));
    }

    #[test]
    fn test_status_wire_mapping() {
        let dto: StatusDto = decode(
            r#"{"data":{"id":"abc123","status":"confirming","amountFrom":0.5,"amountTo":null}}"#,
        )
        .unwrap();
        let snapshot = StatusSnapshot::try_from(dto).unwrap();
        assert_eq!(snapshot.order_id, "abc123");
        assert_eq!(snapshot.status, OrderStatus::Confirming);
        assert_eq!(snapshot.amount_from, Some(Decimal::from_str("0.5").unwrap()));
        assert_eq!(snapshot.amount_to, None);

        let dto: StatusDto = decode(r#"{"id":"abc123","status":"settled"}"#).unwrap();
        assert!(matches!(
            StatusSnapshot::try_from(dto),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_estimate_params_by_side() {
        let query = EstimateQuery {
            pair: CurrencyPair::new("btc", "eth"),
            amount: Decimal::from_str("1.50").unwrap(),
            side: AmountSide::Destination,
            flow: Flow::Fixed,
        };
        let params = estimate_params(&query);
        assert!(params.contains(&("toAmount", "1.5".to_string())));
        assert!(params.contains(&("type", "reverse".to_string())));
        assert!(params.contains(&("flow", "fixed-rate".to_string())));
        assert!(params.contains(&("useRateId", "true".to_string())));
    }

    #[test]
    fn test_create_body_shape() {
        let request = CreateExchange {
            pair: CurrencyPair::new("btc", "eth"),
            flow: Flow::Floating,
            side: AmountSide::Source,
            from_amount: Decimal::ONE,
            to_amount: Decimal::TEN,
            payout_address: "0xabc".to_string(),
            payout_extra_id: None,
            refund_address: Some("bc1qrefund".to_string()),
            rate_id: None,
            user_id: Some("user-7".to_string()),
            idempotency_key: "key".to_string(),
        };
        let body = serde_json::to_value(CreateExchangeDto::from(&request)).unwrap();
        assert_eq!(body["fromCurrency"], "btc");
        assert_eq!(body["fromAmount"], "1");
        assert_eq!(body["address"], "0xabc");
        assert_eq!(body["refundAddress"], "bc1qrefund");
        assert_eq!(body["userId"], "user-7");
        assert_eq!(body["type"], "direct");
        assert!(body.get("toAmount").is_none());
        assert!(body.get("rateId").is_none());
    }

    #[test]
    fn test_new_rejects_bad_header_name() {
        let settings = ProviderSettings {
            api_key: "secret".to_string(),
            api_key_header: "bad header".to_string(),
            ..ProviderSettings::default()
        };
        assert!(HttpProvider::new(settings).is_err());
    }
}
