//! Network-backed tools: weather lookup and web search

use crate::tools::{
    Tool, ToolEnvironment, ToolError, ToolExecutionContext, ToolMetadata, ToolReply, ToolSchema,
    parse_args,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct CityArgs {
    city: String,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<GeocodingResult>>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    winddirection: f64,
    weathercode: i64,
}

/// Current conditions for a city via geocoding + forecast lookups
pub struct WeatherTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl WeatherTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: ToolMetadata::new("weather", "Get the current weather for a city")
                .with_returns(
                    "Record with city, temperature (°C), windspeed (km/h), winddirection (degrees) and weathercode",
                )
                .with_tag("web"),
            env,
        }
    }

    async fn lookup(&self, city: &str) -> Result<Value, reqwest::Error> {
        let services = self.env.services();
        let http = self.env.http();

        let geocoding: GeocodingResponse = http
            .get(&services.weather.geocoding_url)
            .query(&[("name", city), ("count", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(location) = geocoding.results.and_then(|r| r.into_iter().next()) else {
            return Ok(json!({ "error": format!("City '{}' not found.", city) }));
        };

        let forecast: ForecastResponse = http
            .get(&services.weather.forecast_url)
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(match forecast.current_weather {
            Some(current) => json!({
                "city": city,
                "temperature": current.temperature,
                "windspeed": current.windspeed,
                "winddirection": current.winddirection,
                "weathercode": current.weathercode,
            }),
            None => json!({ "error": "Weather data not available." }),
        })
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::single("city", "string", "Name of the city")
    }

    async fn invoke(&self, args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let args: CityArgs = parse_args(self.name(), args)?;
        let record = match self.lookup(&args.city).await {
            Ok(record) => record,
            Err(e) => {
                error!(city = %args.city, error = %e, "Weather lookup failed");
                json!({
                    "error": format!("Failed to fetch weather for '{}': {}", args.city, e)
                })
            }
        };
        Ok(ToolReply::Record(record))
    }
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
}

static REDIRECT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"uddg=([^&"']+)"#).expect("valid regex"));
static DIRECT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"class="result__a"[^>]*href="(https?://[^"]+)""#).expect("valid regex")
});

/// Pull result URLs out of an HTML results page, in page order, deduplicated
fn extract_result_links(html: &str, max_results: usize) -> Vec<String> {
    let redirected = REDIRECT_LINK
        .captures_iter(html)
        .filter_map(|c| urlencoding::decode(&c[1]).ok().map(|u| u.into_owned()));
    let direct = DIRECT_LINK.captures_iter(html).map(|c| c[1].to_string());

    let mut links: Vec<String> = Vec::new();
    for link in redirected.chain(direct) {
        if !links.contains(&link) {
            links.push(link);
        }
        if links.len() == max_results {
            break;
        }
    }
    links
}

/// Top result links for a query
pub struct WebSearchTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl WebSearchTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: ToolMetadata::new("web_search", "Search the web and return the top links")
                .with_returns("A numbered list of result URLs")
                .with_tag("web"),
            env,
        }
    }

    async fn fetch(&self, query: &str) -> Result<String, reqwest::Error> {
        self.env
            .http()
            .get(&self.env.services().search.endpoint)
            .query(&[("q", query)])
            .header(reqwest::header::USER_AGENT, concat!("valet/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::single("query", "string", "What to search for")
    }

    async fn invoke(&self, args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let args: QueryArgs = parse_args(self.name(), args)?;
        let query = args.query;

        let html = self.fetch(&query).await.map_err(|e| {
            error!(query = %query, error = %e, "Web search failed");
            ToolError::transient(format!(
                "An error occurred while searching for '{}'.",
                query
            ))
        })?;

        let links = extract_result_links(&html, self.env.services().search.max_results);
        if links.is_empty() {
            return Ok(ToolReply::Text(format!("No results found for '{}'", query)));
        }

        info!(query = %query, results = links.len(), "Web search completed");
        let numbered: Vec<String> = links
            .iter()
            .enumerate()
            .map(|(i, url)| format!("{}. {}", i + 1, url))
            .collect();
        Ok(ToolReply::Text(format!(
            "Search results for '{}':\n{}",
            query,
            numbered.join("\n")
        )))
    }
}
