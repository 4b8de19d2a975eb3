//! ArcGIS REST client.
//!
//! Implements [`GisClient`] against the ArcGIS Portal / ArcGIS Online
//! sharing API (`<portal>/sharing/rest`). Authentication uses
//! `generateToken`; the token is sent with every request.
//!
//! # Connecting
//!
//! [`ArcGisClient::connect`] authenticates and then checks that the
//! authenticated user's id matches `portal.user_id`. A mismatch aborts
//! before any item is touched.
//!
//! # Export strategies
//!
//! The portal item type decides how an item is exported (see
//! [`ItemKind`]):
//!
//! | Kind | Files produced |
//! |------|----------------|
//! | File | the item data, under the item's file name |
//! | ExportableService | `<name>.zip` from a server-side export job |
//! | DataApp | `<type>.json` |
//! | ResourceApp | `<type>.json`, `resources.zip` |
//! | Form | `<type>.json`, Survey2Data downloads, `<type>_rel_services.json` |
//!
//! # Retry Strategy
//!
//! Read-only GET requests use exponential backoff:
//! - HTTP 429 and 5xx → retry
//! - other HTTP errors → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, ... (capped at 2^5)
//!
//! POST requests (token, export submit, delete) are sent once.
//!
//! ArcGIS reports most failures as HTTP 200 with an `error` object; those
//! are turned into [`GisError::Portal`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{ArchiveConfig, PortalConfig};
use crate::error::GisError;
use crate::item_kind::ItemKind;
use crate::layout::sanitize_file_name;
use crate::traits::{Artifact, ArtifactFile, GisClient};

/// Item metadata from `content/items/<id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemInfo {
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub title: Option<String>,
    /// File name for file items.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl ItemInfo {
    fn file_stem(&self) -> String {
        let base = self
            .name
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(&self.id);
        sanitize_file_name(base)
    }
}

pub struct ArcGisClient {
    http: reqwest::Client,
    rest_url: String,
    username: String,
    token: String,
    max_retries: u32,
    export_format: String,
    poll_interval: Duration,
    export_timeout: Duration,
}

impl ArcGisClient {
    /// Authenticate with the password from `portal.password_env` and verify
    /// the user id.
    pub async fn connect(portal: &PortalConfig, archive: &ArchiveConfig) -> Result<Self> {
        let password = portal.password()?;
        Self::connect_with_password(portal, archive, &password).await
    }

    pub async fn connect_with_password(
        portal: &PortalConfig,
        archive: &ArchiveConfig,
        password: &str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(portal.timeout_secs))
            .danger_accept_invalid_certs(!portal.verify_cert)
            .build()?;

        let rest_url = portal.rest_url();
        let token = generate_token(&http, &rest_url, portal, password)
            .await
            .with_context(|| format!("Failed to authenticate to {}", portal.url))?;
        info!(portal = %portal.url, user = %portal.username, "authenticated");

        let client = Self {
            http,
            rest_url,
            username: portal.username.clone(),
            token,
            max_retries: portal.max_retries,
            export_format: archive.export_format.clone(),
            poll_interval: Duration::from_secs(archive.poll_interval_secs),
            export_timeout: Duration::from_secs(archive.export_timeout_secs),
        };
        client.verify_user(&portal.user_id).await?;
        Ok(client)
    }

    /// Check that the authenticated user has the expected id.
    pub async fn verify_user(&self, expected_id: &str) -> Result<()> {
        let path = format!("community/users/{}", self.username);
        let json = self
            .get_json(&path, &[])
            .await
            .context("Failed to verify portal user")?;
        let actual = json
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Portal user response has no id"))?;
        if actual != expected_id {
            bail!(
                "The user id in the portal ({}) is not the configured user id ({})",
                actual,
                expected_id
            );
        }
        debug!(user_id = %actual, "portal user verified");
        Ok(())
    }

    pub async fn item_info(&self, item_id: &str) -> Result<ItemInfo, GisError> {
        let path = format!("content/items/{}", item_id);
        let json = self.get_json(&path, &[]).await?;
        serde_json::from_value(json).map_err(|e| GisError::Response {
            url: self.url(&path),
            detail: e.to_string(),
        })
    }

    // ============ Export strategies ============

    async fn download_file(&self, info: &ItemInfo) -> Result<ArtifactFile, GisError> {
        let bytes = self
            .get_bytes(&format!("content/items/{}/data", info.id), &[])
            .await?;
        Ok(ArtifactFile::new(info.file_stem(), bytes))
    }

    async fn item_json(&self, info: &ItemInfo) -> Result<ArtifactFile, GisError> {
        let path = format!("content/items/{}/data", info.id);
        let bytes = self.get_bytes(&path, &[("f", "json")]).await?;
        let value: Value = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| GisError::Response {
                url: self.url(&path),
                detail: e.to_string(),
            })?
        };
        let pretty = serde_json::to_vec_pretty(&value).map_err(|e| GisError::Response {
            url: self.url(&path),
            detail: e.to_string(),
        })?;
        Ok(ArtifactFile::new(
            format!("{}.json", sanitize_file_name(&info.item_type)),
            pretty,
        ))
    }

    async fn export_service(&self, info: &ItemInfo) -> Result<ArtifactFile, GisError> {
        let export_title = format!(
            "{}_archive_{}",
            info.id,
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        );
        let submit_path = format!("content/users/{}/export", self.username);
        let submitted = self
            .post_form(
                &submit_path,
                &[
                    ("itemId", info.id.as_str()),
                    ("exportFormat", self.export_format.as_str()),
                    ("title", export_title.as_str()),
                ],
            )
            .await?;

        let field = |name: &str| -> Result<String, GisError> {
            submitted
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| GisError::Response {
                    url: self.url(&submit_path),
                    detail: format!("missing {}", name),
                })
        };
        let export_item_id = field("exportItemId")?;
        let job_id = field("jobId")?;
        info!(item_id = %info.id, export_item_id = %export_item_id, "export job submitted");

        self.wait_for_export(&export_item_id, &job_id).await?;

        let bytes = self
            .get_bytes(&format!("content/items/{}/data", export_item_id), &[])
            .await?;
        let extension = if self.export_format.eq_ignore_ascii_case("geojson") {
            "geojson"
        } else {
            "zip"
        };
        let stem = sanitize_file_name(info.title.as_deref().unwrap_or(&info.id));
        info!(
            item_id = %info.id,
            export_item_id = %export_item_id,
            "export downloaded; export item left in portal"
        );
        Ok(ArtifactFile::new(format!("{}.{}", stem, extension), bytes))
    }

    async fn wait_for_export(&self, export_item_id: &str, job_id: &str) -> Result<(), GisError> {
        let path = format!(
            "content/users/{}/items/{}/status",
            self.username, export_item_id
        );
        let started = Instant::now();
        loop {
            let status = self
                .get_json(&path, &[("jobId", job_id), ("jobType", "export")])
                .await?;
            match status.get("status").and_then(|s| s.as_str()) {
                Some("completed") => return Ok(()),
                Some("failed") => {
                    let message = status
                        .get("statusMessage")
                        .and_then(|m| m.as_str())
                        .unwrap_or("export failed")
                        .to_string();
                    return Err(GisError::ExportFailed {
                        job_id: job_id.to_string(),
                        message,
                    });
                }
                other => debug!(job_id, status = ?other, "export in progress"),
            }
            if started.elapsed() >= self.export_timeout {
                return Err(GisError::ExportTimeout {
                    job_id: job_id.to_string(),
                    secs: self.export_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn resources_zip(&self, info: &ItemInfo) -> Result<Option<ArtifactFile>, GisError> {
        let list = self
            .get_json(
                &format!("content/users/{}/items/{}/resources", info.owner, info.id),
                &[("num", "1000")],
            )
            .await?;
        let names: Vec<String> = list
            .get("resources")
            .and_then(|r| r.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|r| r.get("resource").and_then(|n| n.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if names.is_empty() {
            return Ok(None);
        }

        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let bytes = self
                .get_bytes(&format!("content/items/{}/resources/{}", info.id, name), &[])
                .await?;
            entries.push((name, bytes));
        }
        Ok(Some(ArtifactFile::new("resources.zip", pack_zip(&entries)?)))
    }

    async fn related_items(
        &self,
        item_id: &str,
        relationship: &str,
    ) -> Result<Vec<ItemInfo>, GisError> {
        let path = format!("content/items/{}/relatedItems", item_id);
        let json = self
            .get_json(
                &path,
                &[("relationshipType", relationship), ("direction", "forward")],
            )
            .await?;
        let items = json.get("relatedItems").cloned().unwrap_or(Value::Array(vec![]));
        serde_json::from_value(items).map_err(|e| GisError::Response {
            url: self.url(&path),
            detail: e.to_string(),
        })
    }

    async fn form_artifact(&self, info: &ItemInfo) -> Result<Artifact, GisError> {
        let mut artifact = Artifact::single(self.item_json(info).await?);

        for related in self.related_items(&info.id, "Survey2Data").await? {
            artifact.push(self.download_file(&related).await?);
        }

        let services: Vec<Value> = self
            .related_items(&info.id, "Survey2Service")
            .await?
            .into_iter()
            .map(|s| serde_json::json!({ "id": s.id, "url": s.url }))
            .collect();
        let relations = serde_json::to_vec_pretty(&serde_json::json!({ "services": services }))
            .map_err(|e| GisError::Response {
                url: self.url(&format!("content/items/{}/relatedItems", info.id)),
                detail: e.to_string(),
            })?;
        artifact.push(ArtifactFile::new(
            format!("{}_rel_services.json", sanitize_file_name(&info.item_type)),
            relations,
        ));
        Ok(artifact)
    }

    // ============ HTTP plumbing ============

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.rest_url, path)
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, GisError> {
        let url = self.url(path);
        let mut params = query.to_vec();
        params.push(("f", "json"));
        let response = self.get_with_retry(&url, &params).await?;
        let json: Value = response
            .json()
            .await
            .map_err(|e| GisError::Http {
                url: url.clone(),
                source: e,
            })?;
        check_portal_error(json)
    }

    async fn get_bytes(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, GisError> {
        let url = self.url(path);
        let response = self.get_with_retry(&url, query).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GisError::Http {
                url: url.clone(),
                source: e,
            })?
            .to_vec();
        reject_error_body(&bytes)?;
        Ok(bytes)
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<Value, GisError> {
        let url = self.url(path);
        let mut fields = form.to_vec();
        fields.push(("f", "json"));
        fields.push(("token", self.token.as_str()));

        let response = self
            .http
            .post(&url)
            .form(&fields)
            .send()
            .await
            .map_err(|e| GisError::Http {
                url: url.clone(),
                source: e,
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GisError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }
        let json: Value = response.json().await.map_err(|e| GisError::Http {
            url: url.clone(),
            source: e,
        })?;
        check_portal_error(json)
    }

    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, GisError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .get(url)
                .query(query)
                .query(&[("token", self.token.as_str())])
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let body = response.text().await.unwrap_or_default();
                    let err = GisError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                        body,
                    };
                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        debug!(url, attempt, status = status.as_u16(), "retrying");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    debug!(url, attempt, error = %e, "retrying");
                    last_err = Some(GisError::Http {
                        url: url.to_string(),
                        source: e,
                    });
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| GisError::Response {
            url: url.to_string(),
            detail: "request was never sent".to_string(),
        }))
    }
}

#[async_trait]
impl GisClient for ArcGisClient {
    async fn export_item(&self, item_id: &str) -> Result<Artifact, GisError> {
        let info = self.item_info(item_id).await?;
        let kind = ItemKind::classify(&info.item_type);
        debug!(item_id, item_type = %info.item_type, ?kind, "exporting");

        match kind {
            ItemKind::File => Ok(Artifact::single(self.download_file(&info).await?)),
            ItemKind::ExportableService => Ok(Artifact::single(self.export_service(&info).await?)),
            ItemKind::DataApp => Ok(Artifact::single(self.item_json(&info).await?)),
            ItemKind::ResourceApp => {
                let mut artifact = Artifact::single(self.item_json(&info).await?);
                if let Some(zip) = self.resources_zip(&info).await? {
                    artifact.push(zip);
                }
                Ok(artifact)
            }
            ItemKind::Form => self.form_artifact(&info).await,
            ItemKind::HostedOnly | ItemKind::Unsupported => Err(GisError::NotExportable {
                item_type: info.item_type.clone(),
                reason: kind
                    .not_exportable_reason()
                    .unwrap_or("not exportable")
                    .to_string(),
            }),
        }
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), GisError> {
        let info = self.item_info(item_id).await?;
        let path = format!("content/users/{}/items/{}/delete", info.owner, item_id);
        let json = self.post_form(&path, &[]).await?;
        if json.get("success").and_then(|s| s.as_bool()) == Some(true) {
            Ok(())
        } else {
            Err(GisError::Response {
                url: self.url(&path),
                detail: format!("delete not confirmed: {}", json),
            })
        }
    }
}

async fn generate_token(
    http: &reqwest::Client,
    rest_url: &str,
    portal: &PortalConfig,
    password: &str,
) -> Result<String> {
    let url = format!("{}/generateToken", rest_url);
    let expiration = portal.token_expiration_minutes.to_string();
    let response = http
        .post(&url)
        .form(&[
            ("username", portal.username.as_str()),
            ("password", password),
            ("client", "referer"),
            ("referer", portal.url.as_str()),
            ("expiration", expiration.as_str()),
            ("f", "json"),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("generateToken returned HTTP {}: {}", status, body);
    }
    let json = check_portal_error(response.json().await?)?;
    json.get("token")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("generateToken response has no token"))
}

fn check_portal_error(json: Value) -> Result<Value, GisError> {
    let Some(err) = json.get("error") else {
        return Ok(json);
    };
    let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
    let mut message = err
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown error")
        .to_string();
    let details: Vec<&str> = err
        .get("details")
        .and_then(|d| d.as_array())
        .map(|arr| arr.iter().filter_map(|d| d.as_str()).collect())
        .unwrap_or_default();
    if !details.is_empty() {
        message = format!("{} ({})", message, details.join("; "));
    }
    Err(GisError::Portal { code, message })
}

/// A data download that came back as a JSON error object instead of bytes.
fn reject_error_body(bytes: &[u8]) -> Result<(), GisError> {
    let trimmed = bytes.trim_ascii_start();
    if trimmed.first() != Some(&b'{') || bytes.len() > 64 * 1024 {
        return Ok(());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(json) if json.get("error").is_some() => check_portal_error(json).map(|_| ()),
        _ => Ok(()),
    }
}

fn pack_zip(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>, GisError> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in entries {
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| GisError::Pack(e.to_string()))?;
        writer
            .write_all(bytes)
            .map_err(|e| GisError::Pack(e.to_string()))?;
    }
    let cursor = writer.finish().map_err(|e| GisError::Pack(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portal_error_object() {
        let json = serde_json::json!({
            "error": {
                "code": 400,
                "message": "Item does not exist or is inaccessible.",
                "details": ["id abc"]
            }
        });
        match check_portal_error(json) {
            Err(GisError::Portal { code, message }) => {
                assert_eq!(code, 400);
                assert!(message.contains("inaccessible"));
                assert!(message.contains("id abc"));
            }
            other => panic!("expected portal error, got {:?}", other),
        }
    }

    #[test]
    fn test_success_passes_through() {
        let json = serde_json::json!({ "success": true });
        assert_eq!(check_portal_error(json.clone()).unwrap(), json);
    }

    #[test]
    fn test_error_body_detected_in_download() {
        let body = br#"{"error":{"code":403,"message":"denied"}}"#;
        assert!(matches!(
            reject_error_body(body),
            Err(GisError::Portal { code: 403, .. })
        ));
        assert!(reject_error_body(b"PK\x03\x04binary").is_ok());
        assert!(reject_error_body(br#"{"layers":[]}"#).is_ok());
    }

    #[test]
    fn test_pack_zip_round_trips_names() {
        let bytes = pack_zip(&[
            ("images/a.png".to_string(), vec![1, 2, 3]),
            ("config.json".to_string(), b"{}".to_vec()),
        ])
        .unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, vec!["config.json", "images/a.png"]);
    }

    #[test]
    fn test_file_stem_prefers_name() {
        let info = ItemInfo {
            id: "abc".to_string(),
            owner: "jdoe".to_string(),
            item_type: "CSV".to_string(),
            title: Some("Parcels".to_string()),
            name: Some("parcels.csv".to_string()),
            url: None,
        };
        assert_eq!(info.file_stem(), "parcels.csv");
    }
}
