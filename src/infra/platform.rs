//! Reqwest implementation of the platform ports.
//!
//! Maps HTTP outcomes onto `PlatformError`: 404 → `NotFound`, 409 →
//! `AlreadyExists`, 429/5xx → `Transient` (retryable), other non-success →
//! `Api` with the response body verbatim, transport failures → `Network`.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::application::ports::{AppsApi, DatabaseApi, FileStore, RemoteFile};
use crate::domain::config::{CapacityTier, ComputeSize, EnvVar, Grant};
use crate::domain::error::PlatformError;
use crate::domain::resource::{
    AppSpec, AppState, DatabaseBinding, DatabaseInstanceState, ResourceStatus,
};
use crate::infra::config::Profile;

/// HTTP client for the Strato platform API.
pub struct PlatformClient {
    http: Client,
    host: String,
    token: String,
}

impl PlatformClient {
    /// Build a client from a credential profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(profile: &Profile) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("strato-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            host: profile.host.trim_end_matches('/').to_string(),
            token: profile.token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.host))
            .bearer_auth(&self.token)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, PlatformError> {
        let resp = req.send().await.map_err(|e| PlatformError::Network {
            detail: e.to_string(),
        })?;
        check_status(resp).await
    }
}

async fn check_status(resp: Response) -> Result<Response, PlatformError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => PlatformError::NotFound,
        StatusCode::CONFLICT => PlatformError::AlreadyExists,
        StatusCode::TOO_MANY_REQUESTS => PlatformError::Transient {
            detail: format!("rate limited: {message}"),
        },
        s if s.is_server_error() => PlatformError::Transient {
            detail: format!("HTTP {}: {message}", s.as_u16()),
        },
        s => PlatformError::Api {
            status: s.as_u16(),
            message,
        },
    })
}

async fn parse_json<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, PlatformError> {
    resp.json().await.map_err(|e| PlatformError::Api {
        status: 200,
        message: format!("malformed response body: {e}"),
    })
}

/// Platform states not in our closed set (e.g. provisioning substates) are
/// treated as PENDING — non-terminal, keep polling.
fn parse_status(state: Option<&str>) -> ResourceStatus {
    match state {
        Some("READY") => ResourceStatus::Ready,
        Some("UPDATING") => ResourceStatus::Updating,
        Some("FAILED") => ResourceStatus::Failed,
        Some("ABSENT") => ResourceStatus::Absent,
        _ => ResourceStatus::Pending,
    }
}

// ── Wire DTOs ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FileListDto {
    #[serde(default)]
    files: Vec<RemoteFileDto>,
}

#[derive(Debug, Deserialize)]
struct RemoteFileDto {
    path: String,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    size_bytes: u64,
}

#[derive(Debug, Deserialize)]
struct InstanceDto {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    capacity: Option<CapacityTier>,
    #[serde(default)]
    status_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GrantListDto {
    #[serde(default)]
    grants: Vec<Grant>,
}

#[derive(Debug, Deserialize)]
struct AppDto {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    compute_size: Option<ComputeSize>,
    #[serde(default)]
    env: Vec<EnvVar>,
    #[serde(default)]
    grants: Vec<Grant>,
    #[serde(default)]
    workspace_path: Option<String>,
    #[serde(default)]
    database: Option<DatabaseBinding>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    status_message: Option<String>,
}

// ── FileStore ─────────────────────────────────────────────────────────────────

impl FileStore for PlatformClient {
    async fn mkdirs(&self, workspace_path: &str) -> Result<(), PlatformError> {
        self.send(
            self.request(Method::POST, "/api/v1/workspace/mkdirs")
                .json(&serde_json::json!({ "path": workspace_path })),
        )
        .await?;
        Ok(())
    }

    async fn list(&self, workspace_path: &str) -> Result<Vec<RemoteFile>, PlatformError> {
        let resp = self
            .send(
                self.request(Method::GET, "/api/v1/workspace/files")
                    .query(&[("path", workspace_path), ("recursive", "true")]),
            )
            .await?;
        let listing: FileListDto = parse_json(resp).await?;
        let prefix = format!("{}/", workspace_path.trim_end_matches('/'));
        Ok(listing
            .files
            .into_iter()
            .map(|f| RemoteFile {
                // Normalize to workspace-relative paths.
                path: f
                    .path
                    .strip_prefix(&prefix)
                    .unwrap_or(&f.path)
                    .to_string(),
                sha256: f.sha256,
                size_bytes: f.size_bytes,
            })
            .collect())
    }

    async fn upload(
        &self,
        workspace_path: &str,
        relative_path: &str,
        bytes: Vec<u8>,
    ) -> Result<(), PlatformError> {
        let full = format!("{}/{relative_path}", workspace_path.trim_end_matches('/'));
        self.send(
            self.request(Method::POST, "/api/v1/workspace/files")
                .query(&[("path", full.as_str()), ("overwrite", "true")])
                .body(bytes),
        )
        .await?;
        Ok(())
    }

    async fn delete(
        &self,
        workspace_path: &str,
        relative_path: &str,
    ) -> Result<(), PlatformError> {
        let full = format!("{}/{relative_path}", workspace_path.trim_end_matches('/'));
        self.send(
            self.request(Method::POST, "/api/v1/workspace/delete")
                .json(&serde_json::json!({ "path": full })),
        )
        .await?;
        Ok(())
    }
}

// ── DatabaseApi ───────────────────────────────────────────────────────────────

impl DatabaseApi for PlatformClient {
    async fn get_instance(
        &self,
        name: &str,
    ) -> Result<Option<DatabaseInstanceState>, PlatformError> {
        let resp = self
            .send(self.request(Method::GET, &format!("/api/v1/database/instances/{name}")))
            .await;
        match resp {
            Ok(resp) => {
                let dto: InstanceDto = parse_json(resp).await?;
                Ok(Some(DatabaseInstanceState {
                    status: parse_status(dto.state.as_deref()),
                    capacity: dto.capacity,
                    diagnostics: dto.status_message,
                }))
            }
            Err(PlatformError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_instance(
        &self,
        name: &str,
        capacity: CapacityTier,
    ) -> Result<(), PlatformError> {
        self.send(
            self.request(Method::POST, "/api/v1/database/instances")
                .json(&serde_json::json!({ "name": name, "capacity": capacity })),
        )
        .await?;
        Ok(())
    }

    async fn update_instance(
        &self,
        name: &str,
        capacity: CapacityTier,
    ) -> Result<(), PlatformError> {
        self.send(
            self.request(Method::PATCH, &format!("/api/v1/database/instances/{name}"))
                .json(&serde_json::json!({ "capacity": capacity })),
        )
        .await?;
        Ok(())
    }

    async fn delete_instance(&self, name: &str) -> Result<(), PlatformError> {
        self.send(self.request(Method::DELETE, &format!("/api/v1/database/instances/{name}")))
            .await?;
        Ok(())
    }

    async fn schema_exists(&self, instance: &str, schema: &str) -> Result<bool, PlatformError> {
        let resp = self
            .send(self.request(
                Method::GET,
                &format!("/api/v1/database/instances/{instance}/schemas/{schema}"),
            ))
            .await;
        match resp {
            Ok(_) => Ok(true),
            Err(PlatformError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_schema(&self, instance: &str, schema: &str) -> Result<(), PlatformError> {
        self.send(
            self.request(
                Method::POST,
                &format!("/api/v1/database/instances/{instance}/schemas"),
            )
            .json(&serde_json::json!({ "name": schema })),
        )
        .await?;
        Ok(())
    }

    async fn list_grants(
        &self,
        instance: &str,
        schema: &str,
    ) -> Result<Vec<Grant>, PlatformError> {
        let resp = self
            .send(self.request(
                Method::GET,
                &format!("/api/v1/database/instances/{instance}/schemas/{schema}/grants"),
            ))
            .await;
        match resp {
            Ok(resp) => {
                let dto: GrantListDto = parse_json(resp).await?;
                Ok(dto.grants)
            }
            Err(PlatformError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn add_grant(
        &self,
        instance: &str,
        schema: &str,
        grant: &Grant,
    ) -> Result<(), PlatformError> {
        self.send(
            self.request(
                Method::POST,
                &format!("/api/v1/database/instances/{instance}/schemas/{schema}/grants"),
            )
            .json(grant),
        )
        .await?;
        Ok(())
    }
}

// ── AppsApi ───────────────────────────────────────────────────────────────────

impl AppsApi for PlatformClient {
    async fn get_app(&self, name: &str) -> Result<Option<AppState>, PlatformError> {
        let resp = self
            .send(self.request(Method::GET, &format!("/api/v1/apps/{name}")))
            .await;
        match resp {
            Ok(resp) => {
                let dto: AppDto = parse_json(resp).await?;
                Ok(Some(AppState {
                    status: parse_status(dto.state.as_deref()),
                    compute_size: dto.compute_size,
                    env: dto.env,
                    grants: dto.grants,
                    workspace_path: dto.workspace_path,
                    database: dto.database,
                    url: dto.url,
                    diagnostics: dto.status_message,
                }))
            }
            Err(PlatformError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_app(&self, spec: &AppSpec) -> Result<(), PlatformError> {
        self.send(self.request(Method::POST, "/api/v1/apps").json(spec))
            .await?;
        Ok(())
    }

    async fn update_app(&self, spec: &AppSpec) -> Result<(), PlatformError> {
        self.send(
            self.request(Method::PATCH, &format!("/api/v1/apps/{}", spec.name))
                .json(spec),
        )
        .await?;
        Ok(())
    }

    async fn delete_app(&self, name: &str) -> Result<(), PlatformError> {
        self.send(self.request(Method::DELETE, &format!("/api/v1/apps/{name}")))
            .await?;
        Ok(())
    }
}
