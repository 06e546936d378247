//! USDA FoodData Central lookup.
//!
//! Searches `foods/search`, takes the first food and reads protein, fat and
//! carbohydrate from its nutrient list. Values are per 100 g and cached per
//! lowercase query.
//!
//! API reference: <https://fdc.nal.usda.gov/api-guide.html>

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::LookupError;
use crate::nutrition::Macros;

use super::{NutrientLookup, scale_per_100g};

const SERVICE: &str = "usda";

pub const DEFAULT_BASE_URL: &str = "https://api.nal.usda.gov/fdc/v1";

/// USDA client configuration.
#[derive(Debug)]
pub struct UsdaClientConfig {
    /// FoodData Central API key (<https://fdc.nal.usda.gov/api-key-signup.html>).
    pub api_key: SecretString,
    pub base_url: String,
    /// Hard bound on one lookup, including connect and body read.
    pub timeout: Duration,
    pub cache_ttl: Duration,
}

impl UsdaClientConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(86_400),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<SearchFood>,
}

#[derive(Debug, Deserialize)]
struct SearchFood {
    #[serde(default, rename = "foodNutrients")]
    food_nutrients: Vec<SearchNutrient>,
}

#[derive(Debug, Deserialize)]
struct SearchNutrient {
    #[serde(default, rename = "nutrientName")]
    nutrient_name: String,
    #[serde(default)]
    value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MacroKind {
    Protein,
    Fat,
    Carb,
}

/// Classify a nutrient by name. Order matters: "protein" wins over "fat".
fn classify(name: &str) -> Option<MacroKind> {
    let name = name.to_lowercase();
    if name.contains("protein") {
        Some(MacroKind::Protein)
    } else if name.contains("total lipid") || name.contains("fat") {
        Some(MacroKind::Fat)
    } else if name.contains("carbohydrate") && name.contains("by difference") {
        Some(MacroKind::Carb)
    } else {
        None
    }
}

/// Per-100g macros from a nutrient list. The first entry of each kind counts;
/// absent kinds are 0.
fn extract_per_100g(nutrients: &[SearchNutrient]) -> Macros {
    let mut protein = None;
    let mut fat = None;
    let mut carb = None;

    for n in nutrients {
        let slot = match classify(&n.nutrient_name) {
            Some(MacroKind::Protein) => &mut protein,
            Some(MacroKind::Fat) => &mut fat,
            Some(MacroKind::Carb) => &mut carb,
            None => continue,
        };
        if slot.is_none() {
            *slot = Some(n.value.unwrap_or(0.0));
        }
    }

    Macros::new(
        protein.unwrap_or(0.0),
        fat.unwrap_or(0.0),
        carb.unwrap_or(0.0),
    )
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    per_100g: Macros,
    /// `None` when the TTL is too large to represent: never expires.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// FoodData Central client implementing `NutrientLookup`.
pub struct UsdaClient {
    config: UsdaClientConfig,
    http: reqwest::Client,
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl UsdaClient {
    pub fn new(config: UsdaClientConfig) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LookupError::Request {
                service: SERVICE.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            config,
            http,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Per-100g macros for the best match, `Ok(None)` if the search is empty.
    pub async fn per_100g(&self, query: &str) -> Result<Option<Macros>, LookupError> {
        let key = query.trim().to_lowercase();
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.is_fresh(Instant::now()) {
                    debug!(query = %key, "USDA cache hit");
                    return Ok(Some(entry.per_100g));
                }
            }
        }

        let url = format!("{}/foods/search", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", query),
                ("pageSize", "2"),
                ("api_key", self.config.api_key.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                service: SERVICE.to_string(),
                status: status.as_u16(),
            });
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                LookupError::Decode {
                    service: SERVICE.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let Some(food) = body.foods.first() else {
            return Ok(None);
        };
        let per_100g = extract_per_100g(&food.food_nutrients);

        let now = Instant::now();
        let mut cache = self.cache.write().await;
        cache.retain(|_, entry| entry.is_fresh(now));
        cache.insert(
            key,
            CacheEntry {
                per_100g,
                expires_at: now.checked_add(self.config.cache_ttl),
            },
        );

        Ok(Some(per_100g))
    }

    #[cfg(test)]
    async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    fn transport_error(&self, e: reqwest::Error) -> LookupError {
        if e.is_timeout() {
            LookupError::Timeout {
                service: SERVICE.to_string(),
                timeout: self.config.timeout,
            }
        } else {
            LookupError::Request {
                service: SERVICE.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl NutrientLookup for UsdaClient {
    async fn lookup(&self, food: &str, grams: f64) -> Option<Macros> {
        let result = tokio::time::timeout(self.config.timeout, self.per_100g(food))
            .await
            .unwrap_or_else(|_| {
                Err(LookupError::Timeout {
                    service: SERVICE.to_string(),
                    timeout: self.config.timeout,
                })
            });

        match result {
            Ok(Some(per_100g)) => Some(scale_per_100g(per_100g, grams)),
            Ok(None) => {
                debug!(food, "USDA search returned no foods");
                None
            }
            Err(e) => {
                warn!(food, error = %e, "Nutrient lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, timeout: Duration) -> UsdaClient {
        client_with_ttl(server, timeout, Duration::from_secs(86_400))
    }

    fn client_with_ttl(server: &MockServer, timeout: Duration, cache_ttl: Duration) -> UsdaClient {
        let mut config = UsdaClientConfig::new(SecretString::from("test-key".to_string()));
        config.base_url = server.uri();
        config.timeout = timeout;
        config.cache_ttl = cache_ttl;
        UsdaClient::new(config).unwrap()
    }

    fn chicken_body() -> serde_json::Value {
        json!({
            "foods": [
                {
                    "description": "Chicken, broilers or fryers, breast, meat only, raw",
                    "foodNutrients": [
                        { "nutrientName": "Protein", "unitName": "G", "value": 23.1 },
                        { "nutrientName": "Total lipid (fat)", "unitName": "G", "value": 1.24 },
                        { "nutrientName": "Carbohydrate, by difference", "unitName": "G", "value": 0.0 },
                        { "nutrientName": "Fatty acids, total saturated", "unitName": "G", "value": 0.3 },
                        { "nutrientName": "Energy", "unitName": "KCAL", "value": 120 }
                    ]
                },
                {
                    "description": "Chicken, second match",
                    "foodNutrients": [
                        { "nutrientName": "Protein", "unitName": "G", "value": 99.0 }
                    ]
                }
            ]
        })
    }

    #[test]
    fn classify_names() {
        assert_eq!(classify("Protein"), Some(MacroKind::Protein));
        assert_eq!(classify("Total lipid (fat)"), Some(MacroKind::Fat));
        assert_eq!(classify("Carbohydrate, by difference"), Some(MacroKind::Carb));
        assert_eq!(classify("Carbohydrate, by summation"), None);
        assert_eq!(classify("Energy"), None);
    }

    #[test]
    fn missing_nutrients_count_as_zero() {
        let nutrients = vec![SearchNutrient {
            nutrient_name: "Protein".to_string(),
            value: Some(8.0),
        }];
        assert_eq!(extract_per_100g(&nutrients), Macros::new(8.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn lookup_scales_first_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/foods/search"))
            .and(query_param("query", "chicken breast"))
            .and(query_param("pageSize", "2"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chicken_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let macros = client.lookup("chicken breast", 150.0).await.unwrap();
        assert_eq!(macros, Macros::new(34.65, 1.86, 0.0));
    }

    #[tokio::test]
    async fn repeated_queries_hit_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/foods/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chicken_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        client.lookup("Chicken Breast", 100.0).await.unwrap();
        let second = client.lookup("chicken breast", 200.0).await.unwrap();
        assert_eq!(second, Macros::new(46.2, 2.48, 0.0));
        assert_eq!(client.cache_len().await, 1);
    }

    #[tokio::test]
    async fn empty_result_is_a_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/foods/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "foods": [] })))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        assert!(client.lookup("unobtainium", 100.0).await.is_none());
        assert!(client.per_100g("unobtainium").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn http_error_is_a_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        assert!(client.lookup("rice", 100.0).await.is_none());
        let err = client.per_100g("rice").await.unwrap_err();
        assert!(matches!(err, LookupError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_a_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        assert!(client.lookup("rice", 100.0).await.is_none());
        let err = client.per_100g("rice").await.unwrap_err();
        assert!(matches!(err, LookupError::Decode { .. }));
    }

    #[tokio::test]
    async fn slow_service_times_out_as_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chicken_body())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(200));
        let started = Instant::now();
        assert!(client.lookup("chicken", 100.0).await.is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(client.cache_len().await, 0);
    }

    #[tokio::test]
    async fn huge_ttl_never_expires() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chicken_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_ttl(&server, Duration::from_secs(5), Duration::from_secs(u64::MAX));
        assert!(client.lookup("rice", 100.0).await.is_some());
        assert!(client.lookup("rice", 50.0).await.is_some());
        assert_eq!(client.cache_len().await, 1);
    }

    #[tokio::test]
    async fn expired_entries_are_pruned_on_insert() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chicken_body()))
            .mount(&server)
            .await;

        let client = client_with_ttl(&server, Duration::from_secs(5), Duration::from_millis(1));
        for i in 0..20 {
            client.lookup(&format!("food {i}"), 100.0).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        client.lookup("one more", 100.0).await.unwrap();
        assert_eq!(client.cache_len().await, 1);
    }
}
