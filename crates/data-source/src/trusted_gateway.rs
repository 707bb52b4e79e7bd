//! Temperature-weighted random selection across a set of trusted gateways
//! (spec §4.2). Each gateway has a static configured weight; a rolling
//! window of recent outcomes (default 20) decays an ephemeral temperature on
//! failure; the selection distribution is the product of the two, recomputed
//! no more often than a configured interval (default 5 s).

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use rand::Rng;

use gateway_primitives::{now_ms, GatewayError};

use crate::backend::DataSourceBackend;
use crate::request::{ByteStream, ContiguousData, DataRequest};

pub const DEFAULT_ROLLING_WINDOW: usize = 20;
pub const DEFAULT_RECOMPUTE_INTERVAL_MS: u64 = 5_000;

/// Floor so a gateway with a long failure streak can still recover instead
/// of being starved of traffic forever.
const MIN_TEMPERATURE: f64 = 0.05;

#[derive(Clone, Debug, PartialEq)]
pub struct WeightedGateway {
    pub url: String,
    pub weight: u32,
}

struct GatewayState {
    outcomes: VecDeque<bool>,
    temperature: f64,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self {
            outcomes: VecDeque::new(),
            temperature: 1.0,
        }
    }
}

pub struct TrustedGatewaySelector {
    gateways: Vec<WeightedGateway>,
    rolling_window: usize,
    recompute_interval_ms: u64,
    state: Mutex<HashMap<String, GatewayState>>,
    last_recomputed_at_ms: Mutex<u64>,
}

impl TrustedGatewaySelector {
    #[must_use]
    pub fn new(gateways: Vec<WeightedGateway>, rolling_window: usize, recompute_interval_ms: u64) -> Self {
        Self {
            gateways,
            rolling_window,
            recompute_interval_ms,
            state: Mutex::new(HashMap::new()),
            last_recomputed_at_ms: Mutex::new(0),
        }
    }

    /// Records a request outcome against `url`'s rolling window, then
    /// recomputes its temperature if the recompute interval has elapsed.
    pub fn record_outcome(&self, url: &str, success: bool, now_ms: u64) {
        let mut state = self.state.lock();
        let entry = state.entry(url.to_owned()).or_default();
        entry.outcomes.push_back(success);
        while entry.outcomes.len() > self.rolling_window {
            entry.outcomes.pop_front();
        }

        let mut last_recomputed = self.last_recomputed_at_ms.lock();
        if now_ms.saturating_sub(*last_recomputed) >= self.recompute_interval_ms {
            for gw_state in state.values_mut() {
                if gw_state.outcomes.is_empty() {
                    continue;
                }
                let successes = gw_state.outcomes.iter().filter(|ok| **ok).count();
                let rate = successes as f64 / gw_state.outcomes.len() as f64;
                gw_state.temperature = rate.max(MIN_TEMPERATURE);
            }
            *last_recomputed = now_ms;
        }
    }

    fn effective_weight(&self, gateway: &WeightedGateway, state: &HashMap<String, GatewayState>) -> f64 {
        let temperature = state
            .get(&gateway.url)
            .map_or(1.0, |entry| entry.temperature);
        f64::from(gateway.weight) * temperature
    }

    /// Picks one gateway, weighted by `configured weight * temperature`.
    /// `None` if no gateways are configured.
    pub fn select(&self, rng: &mut impl Rng) -> Option<&WeightedGateway> {
        if self.gateways.is_empty() {
            return None;
        }
        let state = self.state.lock();
        let weights: Vec<f64> = self
            .gateways
            .iter()
            .map(|gw| self.effective_weight(gw, &state))
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return self.gateways.first();
        }

        let mut pick = rng.gen_range(0.0..total);
        for (gateway, weight) in self.gateways.iter().zip(weights.iter()) {
            if pick < *weight {
                return Some(gateway);
            }
            pick -= weight;
        }
        self.gateways.last()
    }
}

/// The composite chain's "trusted-gateway" entry (spec §4.2): fetches over
/// HTTP from whichever gateway [`TrustedGatewaySelector`] picks, feeding the
/// outcome back into its rolling window.
pub struct TrustedGatewayBackend {
    selector: TrustedGatewaySelector,
    client: reqwest::Client,
}

impl TrustedGatewayBackend {
    #[must_use]
    pub fn new(selector: TrustedGatewaySelector, request_timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms))
            .build()
            .unwrap_or_default();
        Self { selector, client }
    }
}

#[async_trait]
impl DataSourceBackend for TrustedGatewayBackend {
    fn tag(&self) -> &'static str {
        "trusted-gateway"
    }

    async fn get_data(&self, req: &DataRequest) -> Result<ContiguousData, GatewayError> {
        let gateway = {
            let mut rng = rand::thread_rng();
            self.selector
                .select(&mut rng)
                .cloned()
                .ok_or_else(|| GatewayError::UpstreamUnavailable("no trusted gateways configured".to_owned()))?
        };

        let url = format!("{}/{}", gateway.url.trim_end_matches('/'), req.id);
        let mut builder = self.client.get(&url);
        if let Some(region) = req.region {
            let end = region.offset + region.size.saturating_sub(1);
            builder = builder.header(reqwest::header::RANGE, format!("bytes={}-{}", region.offset, end));
        }

        let now = now_ms();
        let response = match builder.send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                self.selector.record_outcome(&gateway.url, false, now);
                return Err(GatewayError::UpstreamUnavailable(format!(
                    "trusted gateway {} returned {}",
                    gateway.url,
                    response.status()
                )));
            }
            Err(err) => {
                self.selector.record_outcome(&gateway.url, false, now);
                return Err(GatewayError::UpstreamUnavailable(format!(
                    "trusted gateway {} request failed: {err}",
                    gateway.url
                )));
            }
        };
        self.selector.record_outcome(&gateway.url, true, now);

        let size = response.content_length().unwrap_or(0);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let stream: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|err| GatewayError::UpstreamUnavailable(err.to_string()))),
        );

        Ok(ContiguousData {
            stream,
            size,
            source_content_type: content_type,
            verified: false,
            trusted: true,
            cached: false,
            request_attrs: req.request_attrs.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn picks_the_only_gateway_when_one_is_configured() {
        let selector = TrustedGatewaySelector::new(
            vec![WeightedGateway {
                url: "https://a.example".to_owned(),
                weight: 1,
            }],
            DEFAULT_ROLLING_WINDOW,
            DEFAULT_RECOMPUTE_INTERVAL_MS,
        );
        let mut rng = StdRng::seed_from_u64(42);
        assert_eq!(selector.select(&mut rng).unwrap().url, "https://a.example");
    }

    #[test]
    fn repeated_failures_lower_a_gateways_selection_share() {
        let selector = TrustedGatewaySelector::new(
            vec![
                WeightedGateway {
                    url: "https://flaky.example".to_owned(),
                    weight: 10,
                },
                WeightedGateway {
                    url: "https://solid.example".to_owned(),
                    weight: 10,
                },
            ],
            DEFAULT_ROLLING_WINDOW,
            0,
        );
        for i in 0..DEFAULT_ROLLING_WINDOW {
            selector.record_outcome("https://flaky.example", false, i as u64);
            selector.record_outcome("https://solid.example", true, i as u64);
        }

        let mut rng = StdRng::seed_from_u64(7);
        let mut solid_wins = 0;
        for _ in 0..200 {
            if selector.select(&mut rng).unwrap().url == "https://solid.example" {
                solid_wins += 1;
            }
        }
        assert!(solid_wins > 150, "solid gateway should dominate selection after flaky's failures, got {solid_wins}/200");
    }

    #[test]
    fn temperature_is_not_recomputed_before_the_interval_elapses() {
        let selector = TrustedGatewaySelector::new(
            vec![WeightedGateway {
                url: "https://a.example".to_owned(),
                weight: 1,
            }],
            DEFAULT_ROLLING_WINDOW,
            DEFAULT_RECOMPUTE_INTERVAL_MS,
        );
        selector.record_outcome("https://a.example", false, 0);
        let state = selector.state.lock();
        assert_eq!(state.get("https://a.example").unwrap().temperature, 1.0);
    }
}
