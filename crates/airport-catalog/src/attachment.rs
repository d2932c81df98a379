//! A catalog attached from an Airport server
//!
//! Owns the per-attachment state: the fixed catalog version (once observed),
//! the memo of loaded schema contents, and the content fetcher.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use airport_codec::compression::decompress_envelope;
use airport_codec::{CatalogRoot, CatalogSchemaRequest, CatalogVersion, ContentsWithHash};
use airport_core::{AirportError, LocationDescriptor, Result};
use airport_flight::{
    CallHeaders, Connector, FlightTransport, GrpcConnector, GrpcTransport, ParallelScan,
    ScanOptions, ScanStream,
};
use airport_registry::{SchemaContents, TableDescriptor};
use arrow_flight::{Action, FlightDescriptor, FlightInfo};
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::{verify_hash, ContentCache};
use crate::fetch::{ContentFetcher, HttpFetcher, UrlFetcher};
use crate::schema_items::parse_schema_items;

pub const GET_CATALOG_VERSION: &str = "get_catalog_version";
pub const LIST_SCHEMAS: &str = "list_schemas";

#[derive(Debug, Clone, Default)]
pub struct AttachParameters {
    /// Server location, e.g. `grpc://localhost:50312`.
    pub location: String,
    pub catalog: String,
    pub auth_token: Option<String>,
    /// Base directory of the content cache; no on-disk cache when unset.
    pub cache_dir: Option<PathBuf>,
    /// Extra headers sent with every call.
    pub headers: Vec<(String, String)>,
}

impl AttachParameters {
    pub fn new(location: impl Into<String>, catalog: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            catalog: catalog.into(),
            ..Default::default()
        }
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A schema listed by the server; its objects load on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSchema {
    pub catalog: String,
    pub name: String,
    pub comment: String,
    pub tags: HashMap<String, String>,
    pub contents: ContentsWithHash,
}

pub struct CatalogAttachment {
    params: AttachParameters,
    location: LocationDescriptor,
    transport: Arc<dyn FlightTransport>,
    connector: Arc<dyn Connector>,
    fetcher: ContentFetcher,
    /// Set once a fixed version is observed; never cleared.
    fixed_version: OnceLock<CatalogVersion>,
    schema_items: Mutex<HashMap<String, Arc<SchemaContents>>>,
}

impl std::fmt::Debug for CatalogAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogAttachment")
            .field("catalog", &self.params.catalog)
            .field("location", &self.location)
            .field("fixed_version", &self.fixed_version.get())
            .finish()
    }
}

impl CatalogAttachment {
    /// Attach over gRPC. Must be called within a tokio runtime.
    pub fn connect(params: AttachParameters) -> Result<Self> {
        let transport = Arc::new(GrpcTransport::connect_lazy(&params.location)?);
        Ok(Self::with_transport(
            params,
            transport,
            Arc::new(GrpcConnector),
            Arc::new(HttpFetcher::default()),
        ))
    }

    pub fn with_transport(
        params: AttachParameters,
        transport: Arc<dyn FlightTransport>,
        connector: Arc<dyn Connector>,
        urls: Arc<dyn UrlFetcher>,
    ) -> Self {
        let location = transport.location().clone();
        let cache = params.cache_dir.clone().map(ContentCache::new);
        info!(catalog = %params.catalog, location = %location, cache = ?params.cache_dir, "Attaching catalog");
        Self {
            params,
            location,
            transport,
            connector,
            fetcher: ContentFetcher::new(cache, urls),
            fixed_version: OnceLock::new(),
            schema_items: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &str {
        &self.params.catalog
    }

    pub fn params(&self) -> &AttachParameters {
        &self.params
    }

    pub fn location(&self) -> &LocationDescriptor {
        &self.location
    }

    pub fn transport(&self) -> &Arc<dyn FlightTransport> {
        &self.transport
    }

    /// Headers for one top-level operation, with a fresh trace id.
    pub fn headers(&self) -> CallHeaders {
        self.params
            .headers
            .iter()
            .fold(
                CallHeaders::new().with_auth_token(self.params.auth_token.clone()),
                |headers, (name, value)| headers.with_header(name.clone(), value.clone()),
            )
    }

    /// Transport for a remote object; objects on other servers get their own.
    pub(crate) fn transport_for(&self, location: &LocationDescriptor) -> Result<Arc<dyn FlightTransport>> {
        if location.server_location() == self.location.server_location() {
            Ok(self.transport.clone())
        } else {
            self.connector.connect(location.server_location())
        }
    }

    /// Run an action and return its first result body.
    pub(crate) async fn single_action(
        &self,
        transport: &dyn FlightTransport,
        name: &str,
        body: impl Into<Bytes>,
        headers: &CallHeaders,
    ) -> Result<Bytes> {
        let results = transport
            .do_action(Action::new(name, body), &headers.with_action(name))
            .await?;
        results.into_iter().next().ok_or_else(|| {
            AirportError::protocol(transport.location(), format!("action {} returned no result", name))
        })
    }

    /// Current catalog version.
    ///
    /// Once the server declares the version fixed it is answered from memory
    /// for the rest of the attachment without any RPC.
    pub async fn catalog_version(&self) -> Result<CatalogVersion> {
        if let Some(version) = self.fixed_version.get() {
            return Ok(*version);
        }
        let body = self
            .single_action(
                self.transport.as_ref(),
                GET_CATALOG_VERSION,
                self.params.catalog.clone(),
                &self.headers(),
            )
            .await?;
        let version: CatalogVersion = airport_codec::decode(&body)
            .map_err(|e| AirportError::decode(&self.location, "get_catalog_version result", e))?;
        debug!(catalog = %self.params.catalog, version = version.version, fixed = version.is_fixed, "catalog version");
        self.observe_version(version);
        Ok(version)
    }

    fn observe_version(&self, version: CatalogVersion) {
        if version.is_fixed {
            let _ = self.fixed_version.set(version);
        }
    }

    pub fn fixed_version(&self) -> Option<CatalogVersion> {
        self.fixed_version.get().copied()
    }

    /// List the catalog's schemas.
    ///
    /// When the catalog root carries a content bundle, every schema blob in
    /// it is stored in the content cache up front.
    pub async fn list_schemas(&self) -> Result<Vec<RemoteSchema>> {
        let request = CatalogSchemaRequest {
            catalog_name: self.params.catalog.clone(),
        };
        let body = airport_codec::encode(&request)
            .map_err(|e| AirportError::decode(&self.location, "list_schemas request", e))?;
        let result = self
            .single_action(self.transport.as_ref(), LIST_SCHEMAS, body, &self.headers())
            .await?;
        let payload = decompress_envelope(&result)
            .map_err(|e| AirportError::decode(&self.location, "list_schemas envelope", e))?;
        let root: CatalogRoot = airport_codec::decode(&payload)
            .map_err(|e| AirportError::decode(&self.location, "catalog root", e))?;

        self.observe_version(root.version_info);
        if !root.contents.sha256.is_empty() {
            self.populate_from_bundle(&root.contents).await?;
        }

        info!(catalog = %self.params.catalog, schemas = root.schemas.len(), "Listed schemas");
        Ok(root
            .schemas
            .into_iter()
            .map(|s| RemoteSchema {
                catalog: self.params.catalog.clone(),
                name: s.schema,
                comment: s.description,
                tags: s.tags,
                contents: s.contents,
            })
            .collect())
    }

    /// A bundle is a compressed msgpack array of inline contents.
    async fn populate_from_bundle(&self, bundle: &ContentsWithHash) -> Result<()> {
        if self.fetcher.cache().is_none() {
            debug!("No cache directory; skipping catalog content bundle");
            return Ok(());
        }
        let blob = self.fetcher.resolve(bundle, &self.location).await?;
        let payload = decompress_envelope(&blob)
            .map_err(|e| AirportError::decode(&self.location, "catalog bundle envelope", e))?;
        let entries: Vec<ContentsWithHash> = airport_codec::decode(&payload)
            .map_err(|e| AirportError::decode(&self.location, "catalog bundle", e))?;
        let mut stored = 0;
        for entry in &entries {
            let Some(bytes) = entry.inline_bytes.as_ref() else {
                continue;
            };
            verify_hash(&entry.sha256, bytes, &self.location)?;
            self.fetcher.store(&entry.sha256, bytes, &self.location).await?;
            stored += 1;
        }
        debug!(entries = entries.len(), stored, "Populated cache from catalog bundle");
        Ok(())
    }

    /// Tables and functions of `schema`, loaded once per attachment.
    pub async fn schema_items(&self, schema: &RemoteSchema) -> Result<Arc<SchemaContents>> {
        let key = schema.name.to_lowercase();
        if let Some(contents) = self.schema_items.lock().get(&key) {
            return Ok(contents.clone());
        }

        let location = self.location.with_descriptor(FlightDescriptor::new_path(vec![
            self.params.catalog.clone(),
            schema.name.clone(),
        ]));
        let blob = self.fetcher.resolve(&schema.contents, &location).await?;
        let contents = Arc::new(parse_schema_items(
            &blob,
            self.location.server_location(),
            &location,
        )?);
        info!(
            catalog = %self.params.catalog,
            schema = %schema.name,
            objects = contents.len(),
            "Loaded schema"
        );
        self.schema_items.lock().insert(key, contents.clone());
        Ok(contents)
    }

    /// Forget loaded schema contents. A fixed catalog version is kept.
    pub fn clear_cache(&self) {
        self.schema_items.lock().clear();
    }

    pub(crate) fn forget_schema(&self, schema: &str) {
        self.schema_items.lock().remove(&schema.to_lowercase());
    }

    pub async fn get_flight_info(
        &self,
        location: &LocationDescriptor,
        headers: &CallHeaders,
    ) -> Result<FlightInfo> {
        let descriptor = location
            .descriptor()
            .cloned()
            .ok_or_else(|| AirportError::protocol(location, "object has no flight descriptor"))?;
        self.transport_for(location)?
            .get_flight_info(descriptor, headers)
            .await
    }

    /// Scan every endpoint of a table. The flight info request and every
    /// endpoint read share one trace id.
    pub async fn scan(&self, table: &TableDescriptor, options: ScanOptions) -> Result<ScanStream> {
        let headers = self.headers();
        let info = self.get_flight_info(&table.location, &headers).await?;
        self.scan_flight(&table.location, &info, options, headers)
    }

    pub(crate) fn scan_flight(
        &self,
        location: &LocationDescriptor,
        info: &FlightInfo,
        options: ScanOptions,
        headers: CallHeaders,
    ) -> Result<ScanStream> {
        ParallelScan::new(
            self.transport_for(location)?,
            self.connector.clone(),
            headers,
            options,
        )
        .start(info)
    }
}
