//! Settings sources that fetch the raw configuration document.
//!
//! # Design
//! - Sources only fetch and deserialize; they never interpret values.
//! - Raw documents keep the configuration service's loosely typed fields
//!   (`serde_json::Value` flags, string-tagged kinds) so `validate.rs` can
//!   reject bad values in one place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::defaults::HTTP_TIMEOUT_SECS;
use crate::error::{ConfigError, ConfigResult};
use crate::model::ConfigSnapshot;

const WAREHOUSE_CONFIG_PATH: &str = "api/warehouse/getShipboardDataWarehouseConfig";
const CRUISE_ID_PATH: &str = "api/warehouse/getCruiseID";
const LOWERING_ID_PATH: &str = "api/warehouse/getLoweringID";
const TRANSFERS_PATH: &str = "api/collectionSystemTransfers/getCollectionSystemTransfers";

/// Warehouse settings as reported by the configuration service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWarehouse {
    /// Account owning warehouse data.
    #[serde(rename = "shipboardDataWarehouseUsername", default)]
    pub username: String,
    /// Directory mode, as an octal string or integer.
    #[serde(default)]
    pub dir_mode: Value,
    /// File mode, as an octal string or integer.
    #[serde(default)]
    pub file_mode: Value,
    /// `smbclient` protocol level.
    #[serde(default)]
    pub smb_protocol: Option<String>,
}

/// Collection system transfer as reported by the configuration service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransfer {
    /// Identifier (string or number).
    #[serde(rename = "collectionSystemTransferID", default)]
    pub id: Value,
    /// Unique transfer name.
    #[serde(default)]
    pub name: String,
    /// Display label.
    #[serde(default)]
    pub long_name: Option<String>,
    /// Transport identifier or label.
    #[serde(default)]
    pub transfer_type: Value,
    /// Scope flag (`0` cruise, `1` lowering).
    #[serde(default)]
    pub cruise_or_lowering: Value,
    /// Source directory pattern.
    #[serde(default)]
    pub source_dir: String,
    /// Active flag (`"0"`/`"1"` or boolean).
    #[serde(default)]
    pub enable: Value,
    /// Samba share address.
    #[serde(default)]
    pub smb_server: Option<String>,
    /// Samba username.
    #[serde(default)]
    pub smb_user: Option<String>,
    /// Samba password.
    #[serde(default)]
    pub smb_pass: Option<String>,
    /// Samba workgroup or domain.
    #[serde(default)]
    pub smb_domain: Option<String>,
}

/// Complete raw settings document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsDocument {
    /// Warehouse settings.
    #[serde(default)]
    pub warehouse: RawWarehouse,
    /// Current cruise identifier.
    #[serde(rename = "cruiseID", default)]
    pub cruise_id: Option<String>,
    /// Current lowering identifier.
    #[serde(rename = "loweringID", default)]
    pub lowering_id: Option<String>,
    /// Configured transfers.
    #[serde(rename = "collectionSystemTransfers", default)]
    pub transfers: Vec<RawTransfer>,
}

/// Origin of the raw settings document.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    /// Fetch the current settings document.
    async fn fetch(&self) -> ConfigResult<SettingsDocument>;
    /// Short human-readable description used in logs.
    fn describe(&self) -> String;
}

/// Fetch a document from `source` and resolve it into a validated snapshot.
///
/// # Errors
///
/// Returns an error when the source cannot be read or the document contains
/// invalid values.
#[instrument(name = "config.load_snapshot", skip(source), fields(source = %source.describe()))]
pub async fn load_snapshot(source: &dyn SettingsSource) -> ConfigResult<ConfigSnapshot> {
    let document = source.fetch().await?;
    let snapshot = ConfigSnapshot::from_document(document)?;
    info!(
        transfers = snapshot.transfers.len(),
        cruise_id = snapshot.cruise_id.as_deref().unwrap_or("<unset>"),
        lowering_id = snapshot.lowering_id.as_deref().unwrap_or("<unset>"),
        "configuration snapshot loaded"
    );
    Ok(snapshot)
}

/// Settings document stored as JSON on disk.
#[derive(Debug, Clone)]
pub struct FileSettingsSource {
    path: PathBuf,
}

impl FileSettingsSource {
    /// Create a source reading from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the settings document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsSource for FileSettingsSource {
    async fn fetch(&self) -> ConfigResult<SettingsDocument> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ConfigError::Io {
                operation: "config.file_source.read",
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            operation: "config.file_source.parse",
            source,
        })
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Settings fetched from the configuration service's REST API.
#[derive(Debug, Clone)]
pub struct HttpSettingsSource {
    client: Client,
    base_url: Url,
}

impl HttpSettingsSource {
    /// Create a source querying the service rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: Url) -> ConfigResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|source| ConfigError::Http {
                operation: "config.http_source.client",
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> ConfigResult<T> {
        let url = self.endpoint(path);
        debug!(%url, "querying configuration service");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ConfigError::Http {
                operation,
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::HttpStatus {
                operation,
                url,
                status: status.as_u16(),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|source| ConfigError::Http {
                operation,
                url,
                source,
            })
    }
}

#[derive(Debug, Deserialize)]
struct CruiseIdResponse {
    #[serde(rename = "cruiseID", default)]
    cruise_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoweringIdResponse {
    #[serde(rename = "loweringID", default)]
    lowering_id: Option<String>,
}

#[async_trait]
impl SettingsSource for HttpSettingsSource {
    async fn fetch(&self) -> ConfigResult<SettingsDocument> {
        let warehouse = self
            .get_json::<RawWarehouse>("config.http_source.warehouse", WAREHOUSE_CONFIG_PATH)
            .await?;
        let cruise = self
            .get_json::<CruiseIdResponse>("config.http_source.cruise_id", CRUISE_ID_PATH)
            .await?;
        let lowering = self
            .get_json::<LoweringIdResponse>("config.http_source.lowering_id", LOWERING_ID_PATH)
            .await?;
        let transfers = self
            .get_json::<Vec<RawTransfer>>("config.http_source.transfers", TRANSFERS_PATH)
            .await?;
        Ok(SettingsDocument {
            warehouse,
            cruise_id: cruise.cruise_id,
            lowering_id: lowering.lowering_id,
            transfers,
        })
    }

    fn describe(&self) -> String {
        format!("http:{}", self.base_url)
    }
}
