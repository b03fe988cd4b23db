//! HTTP client for the school backend.
//!
//! Wraps the collection, auth and school profile endpoints. The bearer
//! token comes from the injected session; the client never reads it from
//! anywhere else.

use crate::analysis::{InsightSources, SourceState};
use crate::api::ApiError;
use crate::models::{lenient_text, Category, CollectionPage, SchoolFeatures, SchoolProfile};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Settings for building an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub token: Option<String>,
}

/// Credentials posted to `/auth/login`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub school_code: String,
    pub password: String,
}

/// Payload of a successful login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub token: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(rename = "_id", default, deserialize_with = "lenient_text")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub school_code: Option<String>,
    #[serde(default)]
    pub school_name: Option<String>,
}

impl LoginData {
    /// Profile stored right after login; features stay off until the
    /// profile is refreshed.
    pub fn into_profile(self) -> (String, SchoolProfile) {
        let profile = SchoolProfile {
            id: self.id.or(self.object_id),
            object_id: None,
            school_code: self.school_code,
            school_name: self.school_name,
            features: SchoolFeatures::default(),
        };
        (self.token, profile)
    }
}

/// Responses that may or may not be wrapped in `{ "data": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct FeaturesRequest<'a> {
    features: &'a SchoolFeatures,
}

/// Client for the school backend REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ApiError::InvalidBaseUrl(config.base_url));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|source| ApiError::Http {
                url: base_url.clone(),
                source,
            })?;

        debug!(
            "API client for {} ({})",
            base_url,
            if config.token.is_some() {
                "authenticated"
            } else {
                "anonymous"
            }
        );

        Ok(Self {
            base_url,
            token: config.token,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode the JSON body, mapping non-success
    /// statuses to [`ApiError`].
    async fn send<T: DeserializeOwned>(
        &self,
        url: &str,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = builder.send().await.map_err(|source| ApiError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| ApiError::Http {
            url: url.to_string(),
            source,
        })?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let text = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(text).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// `GET /<collection>?page&limit`.
    pub async fn fetch_collection(
        &self,
        category: Category,
        page: u32,
        limit: u32,
    ) -> Result<CollectionPage, ApiError> {
        let url = self.url(category.path());
        debug!("Fetching {} page {} (limit {})", category, page, limit);

        let builder = self
            .request(Method::GET, &url)
            .query(&[("page", page), ("limit", limit)]);
        let result: CollectionPage = self.send(&url, builder).await?;

        debug!(
            "{}: {} items fetched, total {}",
            category,
            result.data.len(),
            result.total_count()
        );
        Ok(result)
    }

    /// Fetch the first page of all three collections concurrently.
    ///
    /// Each fetch resolves on its own; failures are kept per source so the
    /// aggregator can treat them as empty.
    pub async fn fetch_sources(&self, limit: u32) -> InsightSources {
        let (news, events, gallery) = tokio::join!(
            self.fetch_collection(Category::News, 1, limit),
            self.fetch_collection(Category::Events, 1, limit),
            self.fetch_collection(Category::Gallery, 1, limit),
        );

        InsightSources {
            news: SourceState::from(news),
            events: SourceState::from(events),
            gallery: SourceState::from(gallery),
        }
    }

    /// `POST /auth/login`.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginData, ApiError> {
        let url = self.url("auth/login");
        info!("Signing in as school {}", credentials.school_code);

        let builder = self.request(Method::POST, &url).json(credentials);
        let envelope: Envelope<LoginData> = self.send(&url, builder).await?;
        Ok(envelope.into_inner())
    }

    /// `GET /school/me`.
    pub async fn school_profile(&self) -> Result<SchoolProfile, ApiError> {
        let url = self.url("school/me");
        let builder = self.request(Method::GET, &url);
        let envelope: Envelope<SchoolProfile> = self.send(&url, builder).await?;
        Ok(envelope.into_inner())
    }

    /// `PUT /school/features`.
    pub async fn update_features(&self, features: &SchoolFeatures) -> Result<(), ApiError> {
        let url = self.url("school/features");
        info!(
            "Updating features: news={} events={} gallery={}",
            features.news, features.events, features.gallery
        );

        let builder = self
            .request(Method::PUT, &url)
            .json(&FeaturesRequest { features });
        let _: serde_json::Value = self.send(&url, builder).await?;
        Ok(())
    }

    /// Apply toggles on top of the backend's current features and save them.
    ///
    /// The current profile must load; toggles are never applied to a
    /// stored copy that may be stale.
    pub async fn toggle_features(
        &self,
        enable: &[Category],
        disable: &[Category],
    ) -> Result<SchoolProfile, ApiError> {
        let mut profile = self.school_profile().await?;
        for category in enable {
            profile.features.set(*category, true);
        }
        for category in disable {
            profile.features.set(*category, false);
        }

        self.update_features(&profile.features).await?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, token: Option<&str>) -> ApiClient {
        ApiClient::new(ClientConfig {
            base_url: format!("{}/api/", server.uri()),
            timeout_seconds: 5,
            token: token.map(String::from),
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = ApiClient::new(ClientConfig {
            base_url: "localhost:10000/api".to_string(),
            timeout_seconds: 5,
            token: None,
        });
        assert!(matches!(result, Err(ApiError::InvalidBaseUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_collection_sends_paging_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/news"))
            .and(query_param("page", "1"))
            .and(query_param("limit", "100"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "_id": "n1", "title": "Welcome back", "createdAt": "2026-10-01T08:00:00Z" }],
                "pagination": { "total": 17, "totalPages": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server, Some("secret"))
            .fetch_collection(Category::News, 1, 100)
            .await
            .unwrap();

        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].title.as_deref(), Some("Welcome back"));
        assert_eq!(page.total_count(), 17);
    }

    #[tokio::test]
    async fn test_unauthorized_and_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/events"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/gallery"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "message": "db down" })),
            )
            .mount(&server)
            .await;

        let api = client(&server, None);
        let err = api.fetch_collection(Category::Events, 1, 10).await.unwrap_err();
        assert!(err.is_auth());

        let err = api.fetch_collection(Category::Gallery, 1, 10).await.unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "db down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_sources_keeps_failures_per_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/news"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/events"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/gallery"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sources = client(&server, None).fetch_sources(100).await;

        assert!(!sources.is_loading());
        assert_eq!(sources.news, SourceState::Ready(CollectionPage::default()));
        assert!(matches!(sources.events, SourceState::Failed(_)));
        assert!(matches!(sources.gallery, SourceState::Failed(_)));
    }

    #[tokio::test]
    async fn test_login_unwraps_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({ "schoolCode": "HS01", "password": "hunter22" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "id": "s1", "schoolCode": "HS01", "schoolName": "Hillside", "token": "jwt" }
            })))
            .mount(&server)
            .await;

        let data = client(&server, None)
            .login(&LoginRequest {
                school_code: "HS01".to_string(),
                password: "hunter22".to_string(),
            })
            .await
            .unwrap();

        let (token, profile) = data.into_profile();
        assert_eq!(token, "jwt");
        assert_eq!(profile.school_name.as_deref(), Some("Hillside"));
        assert!(!profile.features.news);
    }

    #[tokio::test]
    async fn test_school_profile_bare_and_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/school/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "s1",
                "schoolName": "Hillside",
                "features": { "news": true, "events": false, "gallery": true }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/school/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "schoolName": "Riverside", "features": { "events": true } }
            })))
            .mount(&server)
            .await;

        let api = client(&server, Some("jwt"));
        let bare = api.school_profile().await.unwrap();
        assert_eq!(bare.display_name(), "Hillside");
        assert!(bare.features.gallery);

        let wrapped = api.school_profile().await.unwrap();
        assert_eq!(wrapped.display_name(), "Riverside");
        assert!(wrapped.features.events);
        assert!(!wrapped.features.news);
    }

    #[tokio::test]
    async fn test_update_features_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/school/features"))
            .and(body_json(json!({
                "features": { "news": true, "events": false, "gallery": true }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let features = SchoolFeatures {
            news: true,
            events: false,
            gallery: true,
        };
        client(&server, Some("jwt"))
            .update_features(&features)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_toggle_features_keeps_untouched_server_flags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/school/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "schoolName": "Hillside",
                    "features": { "news": false, "events": true, "gallery": true }
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/school/features"))
            .and(body_json(json!({
                "features": { "news": true, "events": true, "gallery": false }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let profile = client(&server, Some("jwt"))
            .toggle_features(&[Category::News], &[Category::Gallery])
            .await
            .unwrap();
        assert!(profile.features.events);
    }

    #[tokio::test]
    async fn test_toggle_features_needs_fresh_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/school/me"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "down" })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/school/features"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server, Some("jwt"))
            .toggle_features(&[Category::News], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_fetch_sources_tolerates_mongo_documents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/news"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "_id": "n1", "id": "n1", "title": "Open day", "createdAt": "2026-10-18T08:00:00Z" },
                    { "_id": "n2", "title": "Epoch", "createdAt": 1760774400000u64, "__v": 0 },
                    { "_id": "n3", "title": { "en": "Nested" }, "createdAt": { "$date": "x" } }
                ],
                "pagination": { "total": 3, "totalPages": 1 }
            })))
            .mount(&server)
            .await;
        for collection in ["/api/events", "/api/gallery"] {
            Mock::given(method("GET"))
                .and(path(collection))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
                .mount(&server)
                .await;
        }

        let sources = client(&server, None).fetch_sources(100).await;
        let news = sources.news.page().expect("news should decode");
        assert_eq!(news.data.len(), 3);
        assert_eq!(news.total_count(), 3);
        assert_eq!(news.data[0].identifier(), Some("n1"));
        assert!(news.data[2].title.is_none());
    }
}
