//! Client for the SharePoint REST API.
//!
//! This module provides [`SpClient`], which wraps list CRUD, CAML queries,
//! profile and site user lookups, and email sending behind one async API.
//!
//! # Environments
//!
//! The client decides once, at construction, whether it is talking to a
//! production site. In [`Environment::Development`] no write ever reaches the
//! network: writes are logged and echoed back, profile lookups return stubs
//! and list reads are served from an optional static JSON document.
//!
//! # Form digest
//!
//! Every state-changing request carries the site's form digest. Call
//! [`SpClient::get_form_digest`] once after construction; it fetches the
//! digest and starts a background task that refreshes it on the configured
//! interval. Failed refreshes are logged and otherwise ignored; the next tick
//! tries again.
//!
//! # Security
//!
//! Cookies and bearer tokens are never logged. All error messages are
//! sanitized before logging.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use url::Url;

use crate::config::Config;
use crate::error::SpError;
use crate::models::{
    unwrap_d, EmailMessage, ListItem, ListQuery, PersonProfile, ProfileLookup, ReadRequest,
    ResponseEnvelope, SiteUser, WriteRequest,
};
use crate::odata::{escape_literal, list_item_type};
use crate::transport::{
    HttpTransport, RequestOptions, Transport, HTTP_METHOD_HEADER, ODATA_VERBOSE,
    REQUEST_DIGEST_HEADER,
};

/// Digest value used in development mode.
pub const DEV_DIGEST: &str = "dev digest value";

/// Item URL reported for development-mode writes.
pub const DEV_ITEM_URL: &str = "dev item url";

/// Site user ID reported in development mode.
pub const DEV_SITE_USER_ID: u64 = 1234;

/// Whether the client talks to a real site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Requests go to SharePoint.
    Production,
    /// Requests are stubbed locally.
    Development,
}

impl Environment {
    /// Production if `site_url` contains any of `production_hosts`.
    pub fn classify<S: AsRef<str>>(site_url: &str, production_hosts: &[S]) -> Self {
        let matched = production_hosts
            .iter()
            .map(AsRef::as_ref)
            .any(|host| !host.is_empty() && site_url.contains(host));
        if matched {
            Environment::Production
        } else {
            Environment::Development
        }
    }
}

/// Client for a SharePoint site.
///
/// Cloning is cheap; clones share the transport and the form digest.
///
/// # Example
///
/// ```ignore
/// let config = Config::from_env()?;
/// let client = SpClient::new(&config)?;
/// client.get_form_digest().await?;
///
/// let items = client
///     .get_list("Tasks", &ListQuery::new().with_select("Title").with_top(10))
///     .await?;
/// ```
pub struct SpClient<T: Transport = HttpTransport> {
    transport: Arc<T>,
    config: Arc<Config>,

    /// API root for site-relative paths, always ending in `/`.
    base_url: String,

    /// Scheme and host of the site, for host-relative paths.
    origin: String,

    environment: Environment,

    /// Current form digest, shared with the refresh task.
    digest: Arc<RwLock<Option<String>>>,

    refresh_started: Arc<AtomicBool>,
}

impl<T: Transport> Clone for SpClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
            base_url: self.base_url.clone(),
            origin: self.origin.clone(),
            environment: self.environment,
            digest: Arc::clone(&self.digest),
            refresh_started: Arc::clone(&self.refresh_started),
        }
    }
}

impl SpClient<HttpTransport> {
    /// Creates a client that talks HTTP through `reqwest`.
    ///
    /// # Errors
    ///
    /// Returns `SpError::HttpClient` if the HTTP client fails to initialize,
    /// or `SpError::Config` if the site URL cannot be parsed.
    pub fn new(config: &Config) -> Result<Self, SpError> {
        let transport = HttpTransport::new(config)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> SpClient<T> {
    /// Creates a client over an arbitrary transport.
    ///
    /// # Errors
    ///
    /// Returns `SpError::Config` if the site URL is not an http(s) URL or the
    /// digest refresh interval is zero.
    pub fn with_transport(config: &Config, transport: T) -> Result<Self, SpError> {
        let site = Url::parse(&config.site_url)
            .map_err(|e| SpError::invalid_config(format!("invalid site URL: {}", e)))?;
        if site.scheme() != "http" && site.scheme() != "https" {
            return Err(SpError::invalid_config(
                "site URL must start with http:// or https://",
            ));
        }
        if config.digest_refresh_interval.is_zero() {
            return Err(SpError::invalid_config(
                "digest refresh interval must be greater than zero",
            ));
        }

        let origin = site.origin().ascii_serialization();
        let base_url = match config.base_url.as_deref() {
            Some(configured) if !configured.trim().is_empty() => {
                site_root(&origin, configured.trim())
            }
            _ => match infer_site_path(site.path()) {
                Some(path) => format!("{}{}", origin, path),
                None => format!("{}/", origin),
            },
        };
        let environment = Environment::classify(&config.site_url, &config.production_hosts);

        tracing::info!(
            base_url = %base_url,
            environment = ?environment,
            "SharePoint client created"
        );

        Ok(Self {
            transport: Arc::new(transport),
            config: Arc::new(config.clone()),
            base_url,
            origin,
            environment,
            digest: Arc::new(RwLock::new(None)),
            refresh_started: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns the environment decided at construction.
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Returns true when requests go to SharePoint.
    pub fn in_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Returns the API root used for site-relative paths.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the configuration this client was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the current form digest, if one has been fetched.
    pub async fn digest(&self) -> Option<String> {
        self.digest.read().await.clone()
    }

    /// Returns true if writes can be made: always in development, and once a
    /// digest is known in production.
    pub async fn is_write_ready(&self) -> bool {
        !self.in_production() || self.digest.read().await.is_some()
    }

    /// Resolves a request path: absolute URLs pass through, `/`-prefixed
    /// paths hang off the origin, anything else off the base URL.
    pub fn resolve_url(&self, path: &str) -> String {
        resolve_against(&self.base_url, &self.origin, path)
    }

    /// Tests connectivity by fetching a form digest.
    ///
    /// # Errors
    ///
    /// Returns `SpError::ConnectionTest` with details about the failure.
    pub async fn test_connection(&self) -> Result<(), SpError> {
        if !self.in_production() {
            tracing::info!("Development mode - skipping connection test");
            return Ok(());
        }

        tracing::debug!("Testing connection to SharePoint");
        match self.refresh_digest().await {
            Ok(_) => {
                tracing::info!("Connection test successful");
                Ok(())
            }
            Err(SpError::Authentication) => Err(SpError::connection_test(
                "Authentication failed - verify SP_COOKIE or SP_ACCESS_TOKEN",
            )),
            Err(SpError::Timeout { duration, .. }) => Err(SpError::connection_test(format!(
                "Connection timed out after {:?} - verify SP_SITE_URL is correct and the site is reachable",
                duration
            ))),
            Err(e) => Err(SpError::connection_test(self.sanitize_error(&e))),
        }
    }

    // ========================================================================
    // Form digest
    // ========================================================================

    /// Fetches the form digest and starts the periodic refresh.
    ///
    /// The refresh task is started once per client (and its clones) and runs
    /// for the lifetime of the Tokio runtime. Must be called from within a
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns `SpError::NoDigest` if the response carries no digest, or the
    /// transport error if the request fails.
    pub async fn get_form_digest(&self) -> Result<String, SpError> {
        self.start_digest_refresh();
        self.refresh_digest().await
    }

    /// Fetches the form digest once, without touching the refresh task.
    pub async fn refresh_digest(&self) -> Result<String, SpError> {
        if !self.in_production() {
            *self.digest.write().await = Some(DEV_DIGEST.to_string());
            return Ok(DEV_DIGEST.to_string());
        }

        let url = self.resolve_url("_api/contextinfo");
        let options = RequestOptions::credentialed()
            .header("Accept", ODATA_VERBOSE)
            .header(HTTP_METHOD_HEADER, "POST");
        let body = self.transport.post(&url, Some(&json!({})), &options).await?;

        let digest = parse_form_digest(&body).ok_or(SpError::NoDigest)?;
        *self.digest.write().await = Some(digest.clone());
        tracing::debug!("Form digest updated");

        Ok(digest)
    }

    /// Spawns the periodic digest refresh unless it is already running.
    ///
    /// Returns true if this call started the task.
    pub fn start_digest_refresh(&self) -> bool {
        if self.refresh_started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let client = self.clone();
        let period = self.config.digest_refresh_interval;
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                match client.refresh_digest().await {
                    Ok(_) => tracing::debug!("Refreshed digest value"),
                    Err(e) => tracing::debug!(
                        error = %client.sanitize_error(&e),
                        transient = e.is_transient(),
                        "Digest refresh failed"
                    ),
                }
            }
        });

        tracing::debug!(interval = ?period, "Digest refresh started");
        true
    }

    // ========================================================================
    // Generic read/write primitives
    // ========================================================================

    /// Reads a collection.
    ///
    /// In production the `d.results` array of the response is returned. In
    /// development the request's static data document is loaded instead.
    ///
    /// # Errors
    ///
    /// - `SpError::Validation` if the path is empty
    /// - `SpError::NoStaticData` in development without a static document
    /// - `SpError::UnexpectedEnvelope` if the body is not a collection
    pub async fn get(&self, request: ReadRequest) -> Result<Vec<Value>, SpError> {
        request.validate()?;

        if !self.in_production() {
            return self.read_static(request.dev_static_data_url.as_deref()).await;
        }

        let url = match request.base_url.as_deref() {
            Some(root) if !root.trim().is_empty() => resolve_against(
                &site_root(&self.origin, root.trim()),
                &self.origin,
                &request.path,
            ),
            _ => self.resolve_url(&request.path),
        };
        let body = self
            .transport
            .get(&url, &RequestOptions::credentialed().verbose())
            .await?;

        ResponseEnvelope::from_body(body).into_results()
    }

    /// Writes a payload with `X-HTTP-Method: POST`.
    ///
    /// # Errors
    ///
    /// Returns `SpError::Validation` if the path or data is missing, or the
    /// transport error.
    pub async fn post(&self, request: WriteRequest) -> Result<ResponseEnvelope, SpError> {
        request.validate()?;

        if !self.in_production() {
            self.log_dev(&format!("Post to SharePoint: {}", request.data));
            return Ok(ResponseEnvelope::Entity {
                data: request.data,
                uri: Some(DEV_ITEM_URL.to_string()),
                etag: None,
            });
        }

        let url = self.resolve_url(&request.path);
        let options = self
            .write_options()
            .await
            .verbose()
            .header(HTTP_METHOD_HEADER, "POST");
        let body = self.transport.post(&url, Some(&request.data), &options).await?;

        Ok(ResponseEnvelope::from_body(body))
    }

    /// Deletes the item at `item_url` unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `SpError::Validation` if the URL is empty, or the transport error.
    pub async fn delete(&self, item_url: &str) -> Result<(), SpError> {
        let item_url = require(item_url, "item_url")?;

        if !self.in_production() {
            self.log_dev(&format!("Delete item in SharePoint: {}", item_url));
            return Ok(());
        }

        let options = self
            .write_options()
            .await
            .header("IF-MATCH", "*")
            .header(HTTP_METHOD_HEADER, "DELETE");
        self.transport
            .post(&self.resolve_url(item_url), None, &options)
            .await?;

        tracing::debug!(item_url = %item_url, "List item deleted");
        Ok(())
    }

    // ========================================================================
    // List operations
    // ========================================================================

    /// Reads items from a list.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let query = ListQuery::new()
    ///     .with_select("Title,Status")
    ///     .with_filter(query_filter(&["Open", "Blocked"], "Status"))
    ///     .with_orderby("Modified desc");
    /// let items = client.get_list("Issues", &query).await?;
    /// ```
    pub async fn get_list(&self, list_name: &str, query: &ListQuery) -> Result<Vec<Value>, SpError> {
        let list_name = require(list_name, "list_name")?;

        let mut path = format!("{}/items", self.list_root(list_name));
        let query_string = query.to_query_string();
        if !query_string.is_empty() {
            path.push('?');
            path.push_str(&query_string);
        }

        let request = ReadRequest {
            path,
            base_url: query.site_url.clone(),
            dev_static_data_url: query.dev_static_data_url.clone(),
        };
        self.get(request).await
    }

    /// Appends an item to a list.
    ///
    /// The item is tagged with the list's entity type before it is posted.
    pub async fn add_list_item(
        &self,
        list_name: &str,
        item: ListItem,
    ) -> Result<ResponseEnvelope, SpError> {
        let list_name = require(list_name, "list_name")?;
        if item.is_empty() {
            return Err(SpError::validation("item data is required"));
        }

        let path = format!("{}/items", self.list_root(list_name));
        self.post(WriteRequest::new(path, typed_item(list_name, item)))
            .await
    }

    /// Updates an existing item with a conditional MERGE.
    ///
    /// The item is re-read first for its current etag; the write is only sent
    /// with that etag in `If-Match`. Returns the fields that were written.
    ///
    /// # Errors
    ///
    /// Returns `SpError::MissingEtag` without writing anything if the item
    /// comes back without an etag.
    pub async fn update_list_item(
        &self,
        list_name: &str,
        item_url: &str,
        item: ListItem,
    ) -> Result<ListItem, SpError> {
        let list_name = require(list_name, "list_name")?;
        let item_url = require(item_url, "item_url")?;
        if item.is_empty() {
            return Err(SpError::validation("item data is required"));
        }

        if !self.in_production() {
            self.log_dev(&format!(
                "Update {} in {}: {}",
                item_url,
                list_name,
                Value::Object(item.clone())
            ));
            return Ok(item);
        }

        let url = self.resolve_url(item_url);
        let current = self
            .transport
            .get(&url, &RequestOptions::credentialed().verbose())
            .await?;
        let etag = ResponseEnvelope::from_body(current)
            .etag()
            .map(str::to_string)
            .ok_or_else(|| SpError::MissingEtag {
                item_url: item_url.to_string(),
            })?;

        let options = self
            .write_options()
            .await
            .verbose()
            .header(HTTP_METHOD_HEADER, "MERGE")
            .header("If-Match", etag.as_str());
        let data = typed_item(list_name, item.clone());
        self.transport.post(&url, Some(&data), &options).await?;

        tracing::debug!(item_url = %item_url, etag = %etag, "List item updated");
        Ok(item)
    }

    /// Runs a CAML query against a list.
    ///
    /// In development the static data document is returned instead, as for
    /// [`SpClient::get_list`].
    pub async fn caml_query(
        &self,
        list_name: &str,
        query_xml: &str,
        dev_static_data_url: Option<&str>,
    ) -> Result<Vec<Value>, SpError> {
        let list_name = require(list_name, "list_name")?;
        let query_xml = require(query_xml, "query_xml")?;

        if !self.in_production() {
            return self.read_static(dev_static_data_url).await;
        }

        let path = format!("{}/getitems", self.list_root(list_name));
        let data = json!({
            "query": {
                "__metadata": { "type": "SP.CamlQuery" },
                "ViewXml": query_xml,
            }
        });
        self.post(WriteRequest::new(path, data)).await?.into_results()
    }

    // ========================================================================
    // Profiles and site users
    // ========================================================================

    /// Looks up another person's profile by account name or email.
    ///
    /// # Errors
    ///
    /// Returns `SpError::NoAccountName` if neither identifier is given.
    pub async fn retrieve_people_profile(
        &self,
        lookup: &ProfileLookup,
    ) -> Result<PersonProfile, SpError> {
        let account = lookup
            .account(&self.config.account_name_prefix)
            .ok_or(SpError::NoAccountName)?;

        if !self.in_production() {
            self.dev_delay().await;
            return Ok(PersonProfile::dev_stub());
        }

        let select = lookup
            .properties
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(self.config.profile_default_select.as_str());
        let path = format!(
            "{}'{}'&$select={}",
            self.config.people_manager_url,
            urlencoding::encode(&account),
            select
        );
        let body = self
            .transport
            .get(&self.resolve_url(&path), &RequestOptions::credentialed().verbose())
            .await?;

        profile_from_body(body)
    }

    /// Looks up the calling user's own profile.
    pub async fn retrieve_current_user_profile(&self) -> Result<PersonProfile, SpError> {
        if !self.in_production() {
            self.dev_delay().await;
            return Ok(PersonProfile::dev_current_user());
        }

        let path = format!(
            "{}{}",
            self.config.current_user_properties_prefix, self.config.my_profile_default_select
        );
        let body = self
            .transport
            .get(&self.resolve_url(&path), &RequestOptions::credentialed().verbose())
            .await?;

        profile_from_body(body)
    }

    /// Ensures the account exists as a site user and returns its ID.
    pub async fn ensure_site_user_id(&self, account_name: &str) -> Result<u64, SpError> {
        let account_name = require(account_name, "account_name")?;

        if !self.in_production() {
            return Ok(DEV_SITE_USER_ID);
        }

        let url = self.resolve_url(&self.config.ensure_user_path);
        let options = self.write_options().await.header("Accept", ODATA_VERBOSE);
        let body = self
            .transport
            .post(&url, Some(&json!({ "logonName": account_name })), &options)
            .await?;

        unwrap_d(body)
            .get("Id")
            .and_then(Value::as_u64)
            .ok_or_else(|| SpError::unexpected_envelope("ensure user response has no Id"))
    }

    /// Reads an existing site user by login name.
    pub async fn site_user(&self, account_name: &str) -> Result<SiteUser, SpError> {
        let account_name = require(account_name, "account_name")?;

        if !self.in_production() {
            return Ok(SiteUser {
                id: DEV_SITE_USER_ID,
                login_name: Some(account_name.to_string()),
                ..SiteUser::default()
            });
        }

        let path = format!(
            "{}{}'",
            self.config.site_user_prefix,
            urlencoding::encode(account_name)
        );
        let body = self
            .transport
            .get(&self.resolve_url(&path), &RequestOptions::credentialed().verbose())
            .await?;

        Ok(serde_json::from_value(unwrap_d(body))?)
    }

    // ========================================================================
    // Email
    // ========================================================================

    /// Sends an HTML email through the site.
    pub async fn send_email(&self, message: &EmailMessage) -> Result<(), SpError> {
        message.validate()?;

        if !self.in_production() {
            self.log_dev(&format!("Send email to: {}", message.to.join(", ")));
            self.log_dev(&format!("From: {}", message.from));
            self.log_dev(&format!("Subject: {}", message.subject));
            self.log_dev(&format!("Body: {}", message.body_html));
            return Ok(());
        }

        let url = self.resolve_url(&self.config.send_email_path);
        let options = self
            .write_options()
            .await
            .verbose()
            .header(HTTP_METHOD_HEADER, "POST");
        self.transport
            .post(&url, Some(&message.to_payload()), &options)
            .await?;

        tracing::debug!(recipients = message.to.len(), "Email sent");
        Ok(())
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    /// `<list_path>getbytitle('<name>')`
    fn list_root(&self, list_name: &str) -> String {
        format!(
            "{}getbytitle('{}')",
            self.config.list_path,
            escape_literal(list_name)
        )
    }

    /// Credentialed options carrying the current digest.
    async fn write_options(&self) -> RequestOptions {
        let digest = self.digest.read().await.clone();
        match digest {
            Some(digest) => RequestOptions::credentialed().header(REQUEST_DIGEST_HEADER, digest),
            None => {
                tracing::warn!("Writing without a form digest - call get_form_digest first");
                RequestOptions::credentialed()
            }
        }
    }

    /// Loads a development-mode substitute document.
    async fn read_static(&self, url: Option<&str>) -> Result<Vec<Value>, SpError> {
        let url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(SpError::NoStaticData)?;

        self.log_dev(&format!("Loading static data from {}", url));
        let body = self
            .transport
            .get(&self.resolve_url(url), &RequestOptions::new())
            .await?;

        static_results(body)
    }

    async fn dev_delay(&self) {
        let delay = self.config.dev_load_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn log_dev(&self, message: &str) {
        if self.config.log_dev_activity {
            tracing::info!("{}", message);
        } else {
            tracing::debug!("{}", message);
        }
    }

    /// Renders an error with configured secrets removed.
    pub fn sanitize_error(&self, error: &SpError) -> String {
        error.sanitized_display(&self.config.secrets())
    }
}

/// Rejects empty required string parameters.
fn require<'a>(value: &'a str, name: &str) -> Result<&'a str, SpError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SpError::validation(format!("{} is required", name)));
    }
    Ok(trimmed)
}

/// Prepends `__metadata.type` for the list; item fields may override it.
fn typed_item(list_name: &str, item: ListItem) -> Value {
    let mut data = Map::new();
    data.insert(
        "__metadata".to_string(),
        json!({ "type": list_item_type(list_name) }),
    );
    data.extend(item);
    Value::Object(data)
}

/// Reads the digest from a context info response.
fn parse_form_digest(body: &Value) -> Option<String> {
    body.pointer("/d/GetContextWebInformation/FormDigestValue")
        .or_else(|| body.get("FormDigestValue"))
        .and_then(Value::as_str)
        .filter(|digest| !digest.is_empty())
        .map(str::to_string)
}

/// Accepts a bare array, `{results}` or `{d: {results}}`.
fn static_results(body: Value) -> Result<Vec<Value>, SpError> {
    if let Value::Array(items) = body {
        return Ok(items);
    }
    if let Some(Value::Array(items)) = body.get("results") {
        return Ok(items.clone());
    }
    ResponseEnvelope::from_body(body).into_results()
}

fn profile_from_body(body: Value) -> Result<PersonProfile, SpError> {
    match unwrap_d(body) {
        profile @ Value::Object(_) => Ok(serde_json::from_value(profile)?),
        _ => Err(SpError::unexpected_envelope("profile response is not an object")),
    }
}

/// Absolute paths pass through, `/`-prefixed paths join `origin`, anything
/// else joins `base`.
fn resolve_against(base: &str, origin: &str, path: &str) -> String {
    if path.contains("://") {
        path.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", origin, path)
    } else {
        format!("{}{}", base, path)
    }
}

/// Joins a configured root (absolute, or relative to the origin) and
/// guarantees a trailing slash.
fn site_root(origin: &str, root: &str) -> String {
    let mut url = if root.contains("://") {
        root.to_string()
    } else if root.starts_with('/') {
        format!("{}{}", origin, root)
    } else {
        format!("{}/{}", origin, root)
    };
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Returns `/<a>/<b>/` when the path starts with two word segments followed
/// by a slash.
fn infer_site_path(path: &str) -> Option<String> {
    let is_word = |segment: &str| {
        !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
    };

    let mut segments = path.strip_prefix('/')?.splitn(3, '/');
    let first = segments.next()?;
    let second = segments.next()?;
    segments.next()?;

    if is_word(first) && is_word(second) {
        Some(format!("/{}/{}/", first, second))
    } else {
        None
    }
}
