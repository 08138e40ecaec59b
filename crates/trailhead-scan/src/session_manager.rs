use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{Client, Url, header};
use serde::Deserialize;
use tracing::{debug, info};

use crate::captcha_client::AntiCaptchaClient;
use crate::scan_types::ScanError;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

/// Settings for session establishment against the permit website
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Page protected by the recaptcha challenge
    pub website_url: String,

    /// Referrer sent with authenticated requests
    pub referrer_url: String,

    /// Site key of the recaptcha widget on the permit page
    pub recaptcha_site_key: String,

    /// Endpoint the solved captcha token is posted to
    pub captcha_post_url: String,

    /// Where session cookies are cached between runs
    pub cookie_file: PathBuf,

    /// User agent presented on every request
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            website_url: "https://yosemite.org/planning-your-wilderness-permit/".to_string(),
            referrer_url: "https://yosemite.org/planning-your-wilderness-permit/".to_string(),
            recaptcha_site_key: "6LeWjvIUAAAAAC54MkeI2YX6DGTk86-DeDHHB9-J".to_string(),
            captcha_post_url: "https://yosemite.org/wp-content/plugins/wildtrails/captcha.php"
                .to_string(),
            cookie_file: PathBuf::from(".cookies.json"),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Manages the authenticated HTTP session for the permit website.
///
/// Cookies captured from a successful captcha hand-off are cached in a flat
/// JSON file so later runs can skip the solver. Deleting the file at any
/// time is safe; the next run simply re-authenticates.
pub struct SessionManager {
    config: SessionConfig,
    client: Client,
    authenticated: bool,
}

impl SessionManager {
    /// Create a session manager, reusing cached cookies when present.
    pub fn new(config: SessionConfig) -> Result<Self, ScanError> {
        let jar = Arc::new(Jar::default());

        let authenticated = match load_cached_cookies(&config.cookie_file)? {
            Some(cookies) => {
                let url = site_url(&config)?;
                for cookie in &cookies {
                    jar.add_cookie_str(cookie, &url);
                }
                info!(
                    "Reusing {} cached session cookies from {}",
                    cookies.len(),
                    config.cookie_file.display()
                );
                true
            }
            None => false,
        };

        let client = build_client(&config, jar)?;
        Ok(Self {
            config,
            client,
            authenticated,
        })
    }

    /// The HTTP client carrying the session cookies.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Whether the session currently holds credentials it believes valid.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Referrer the upstream endpoints expect.
    pub fn referrer_url(&self) -> &str {
        &self.config.referrer_url
    }

    /// Solve the page's recaptcha and exchange the token for session cookies.
    pub async fn authenticate(&mut self, solver: &AntiCaptchaClient) -> Result<(), ScanError> {
        info!("Authenticating against {}", self.config.website_url);

        let token = solver
            .solve_recaptcha(&self.config.website_url, &self.config.recaptcha_site_key)
            .await?;
        debug!("Posting solved captcha token to {}", self.config.captcha_post_url);

        let response = self
            .client
            .post(&self.config.captcha_post_url)
            .header(header::REFERER, &self.config.referrer_url)
            .form(&[("g-recaptcha-response", token.as_str())])
            .send()
            .await
            .map_err(|e| ScanError::Network(format!("Captcha hand-off failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ScanError::ApiError(format!(
                "Captcha hand-off rejected with HTTP {}",
                response.status()
            )));
        }

        // The cookie jar already picked these up; the strings are kept so
        // the next run can rebuild the jar without solving again.
        let cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        if cookies.is_empty() {
            return Err(ScanError::AuthenticationFailed);
        }

        store_cookies(&self.config.cookie_file, &cookies)?;
        info!("Session established; cached {} cookies", cookies.len());
        self.authenticated = true;
        Ok(())
    }

    /// Drop the session and its cookie cache; the next authenticated call
    /// re-solves the captcha.
    pub fn invalidate(&mut self) -> Result<(), ScanError> {
        match fs::remove_file(&self.config.cookie_file) {
            Ok(()) => debug!("Removed cookie cache {}", self.config.cookie_file.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.client = build_client(&self.config, Arc::new(Jar::default()))?;
        self.authenticated = false;
        Ok(())
    }
}

fn site_url(config: &SessionConfig) -> Result<Url, ScanError> {
    config.website_url.parse().map_err(|e| {
        ScanError::ConfigError(format!("Invalid website URL '{}': {e}", config.website_url))
    })
}

fn build_client(config: &SessionConfig, jar: Arc<Jar>) -> Result<Client, ScanError> {
    Client::builder()
        .cookie_provider(jar)
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| ScanError::ApiError(format!("Failed to create session client: {e}")))
}

fn load_cached_cookies(path: &Path) -> Result<Option<Vec<String>>, ScanError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let cookies = serde_json::from_str(&raw).map_err(|e| {
        ScanError::DataFormat(format!("Unreadable cookie cache {}: {e}", path.display()))
    })?;
    Ok(Some(cookies))
}

fn store_cookies(path: &Path, cookies: &[String]) -> Result<(), ScanError> {
    let raw = serde_json::to_string_pretty(cookies)
        .map_err(|e| ScanError::DataFormat(format!("Could not serialize cookie cache: {e}")))?;
    fs::write(path, raw)?;
    Ok(())
}
