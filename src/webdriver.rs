use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::errors::SessionError;
use crate::locator::Query;
use crate::session::{PageFingerprint, Session, SessionProvider};
use crate::types::ViewportSize;

const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// MIME types Firefox saves without asking
const SAVE_WITHOUT_ASKING: &str = "application/pdf,application/octet-stream,application/zip,\
     application/x-zip-compressed,application/acad,image/vnd.dwg,image/x-dwg,\
     application/dxf,image/png,image/svg+xml";

const SCROLL_TO_CENTER: &str =
    "arguments[0].scrollIntoView({block: 'center', inline: 'center', behavior: 'instant'});";

const HIT_TEST: &str = r#"
    const el = arguments[0];
    const r = el.getBoundingClientRect();
    if (r.width === 0 || r.height === 0) return false;
    const hit = document.elementFromPoint(r.left + r.width / 2, r.top + r.height / 2);
    return hit !== null && (hit === el || el.contains(hit));
"#;

const NODE_COUNT: &str = "return document.getElementsByTagName('*').length;";

/// Supported browser types
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum BrowserType {
    /// Mozilla Firefox
    Firefox,
    /// Google Chrome/Chromium
    Chrome,
}

impl std::str::FromStr for BrowserType {
    type Err = anyhow::Error;

    /// Parse browser type from string (case-insensitive)
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "firefox" => Ok(BrowserType::Firefox),
            "chrome" | "chromium" => Ok(BrowserType::Chrome),
            _ => anyhow::bail!("Unsupported browser: {}", s),
        }
    }
}

impl BrowserType {
    /// Where the matching driver listens by default
    pub fn default_webdriver_url(&self) -> &'static str {
        match self {
            BrowserType::Firefox => "http://localhost:4444",
            BrowserType::Chrome => "http://localhost:9515",
        }
    }
}

/// Opens one fresh browser per attempt against an already running driver
#[derive(Debug, Clone)]
pub struct WebDriverProvider {
    browser_type: BrowserType,
    webdriver_url: String,
    headless: bool,
    viewport: ViewportSize,
    http: reqwest::Client,
}

impl WebDriverProvider {
    pub fn new(
        browser_type: BrowserType,
        webdriver_url: Option<String>,
        headless: bool,
        viewport: ViewportSize,
    ) -> Self {
        Self {
            browser_type,
            webdriver_url: webdriver_url
                .unwrap_or_else(|| browser_type.default_webdriver_url().to_string()),
            headless,
            viewport,
            http: reqwest::Client::new(),
        }
    }

    async fn is_webdriver_running(&self) -> bool {
        let status_url = format!("{}/status", self.webdriver_url.trim_end_matches('/'));

        match self.http.get(&status_url).timeout(STATUS_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Browser options: headless, window size, and downloads saved silently to `download_dir`
    pub fn capabilities(
        &self,
        download_dir: &Path,
        profile: Option<&Path>,
    ) -> serde_json::Map<String, Value> {
        let mut caps = serde_json::Map::new();
        let dir = download_dir.display().to_string();

        match self.browser_type {
            BrowserType::Firefox => {
                let mut args = Vec::new();
                if self.headless {
                    args.push("--headless".to_string());
                }
                args.push(format!("--width={}", self.viewport.width));
                args.push(format!("--height={}", self.viewport.height));

                caps.insert(
                    "moz:firefoxOptions".to_string(),
                    json!({
                        "args": args,
                        "prefs": {
                            "browser.download.folderList": 2,
                            "browser.download.dir": dir,
                            "browser.download.useDownloadDir": true,
                            "browser.download.manager.showWhenStarting": false,
                            "browser.helperApps.neverAsk.saveToDisk": SAVE_WITHOUT_ASKING,
                            "pdfjs.disabled": true,
                        }
                    }),
                );
            }
            BrowserType::Chrome => {
                let mut args = vec!["--no-sandbox".to_string()];
                if self.headless {
                    args.push("--headless=new".to_string());
                    args.push("--disable-gpu".to_string());
                    args.push("--disable-dev-shm-usage".to_string());
                }
                args.push(format!(
                    "--window-size={},{}",
                    self.viewport.width, self.viewport.height
                ));
                if let Some(profile) = profile {
                    args.push(format!("--user-data-dir={}", profile.display()));
                }

                caps.insert(
                    "goog:chromeOptions".to_string(),
                    json!({
                        "args": args,
                        "prefs": {
                            "download.default_directory": dir,
                            "download.prompt_for_download": false,
                            "download.directory_upgrade": true,
                            "safebrowsing.enabled": true,
                            "plugins.always_open_pdf_externally": true,
                        }
                    }),
                );
            }
        }
        caps
    }
}

#[async_trait]
impl SessionProvider for WebDriverProvider {
    type Session = WebDriverSession;

    async fn open(&self, output_dir: &Path) -> Result<WebDriverSession, SessionError> {
        if !self.is_webdriver_running().await {
            return Err(SessionError::Unresponsive(format!(
                "no {:?} WebDriver answering at {} (start geckodriver --port 4444 or chromedriver --port 9515)",
                self.browser_type, self.webdriver_url
            )));
        }

        // Browsers need an absolute download path
        let download_dir = absolute(output_dir)?;

        // Chrome is strict about sharing profile directories, so each session gets its own
        let profile = match self.browser_type {
            BrowserType::Chrome => Some(
                tempfile::Builder::new()
                    .prefix("drawfetch-chrome-")
                    .tempdir()
                    .map_err(|e| SessionError::Other(format!("Failed to create profile: {}", e)))?,
            ),
            BrowserType::Firefox => None,
        };

        let caps = self.capabilities(&download_dir, profile.as_ref().map(|p| p.path()));
        debug!("Connecting to WebDriver at {}", self.webdriver_url);
        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(&self.webdriver_url)
            .await?;

        if let Err(e) = client
            .set_window_size(self.viewport.width, self.viewport.height)
            .await
        {
            debug!("Note: Could not set window size: {}", e);
        }

        info!(
            "Opened {:?} session saving to {}",
            self.browser_type,
            download_dir.display()
        );
        Ok(WebDriverSession {
            client,
            closed: false,
            _profile: profile,
        })
    }
}

fn absolute(dir: &Path) -> Result<PathBuf, SessionError> {
    std::fs::create_dir_all(dir)
        .and_then(|_| std::fs::canonicalize(dir))
        .map_err(|e| {
            SessionError::Other(format!(
                "Failed to prepare download directory {}: {}",
                dir.display(),
                e
            ))
        })
}

/// A live browser driven through fantoccini
pub struct WebDriverSession {
    client: Client,
    closed: bool,
    /// Removed from disk when the session is dropped
    _profile: Option<TempDir>,
}

impl WebDriverSession {
    async fn script(&self, script: &str, el: &Element) -> Result<Value, SessionError> {
        let arg = serde_json::to_value(el)
            .map_err(|e| SessionError::Other(format!("Failed to pass element to script: {}", e)))?;
        Ok(self.client.execute(script, vec![arg]).await?)
    }
}

fn locator(query: &Query) -> Locator<'_> {
    match query {
        Query::Id(id) => Locator::Id(id),
        Query::Css(selector) => Locator::Css(selector),
        Query::XPath(xpath) => Locator::XPath(xpath),
    }
}

#[async_trait]
impl Session for WebDriverSession {
    type Handle = Element;

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        info!("Navigating to {}", url);
        self.client.goto(url).await?;
        Ok(())
    }

    async fn find_all(
        &self,
        query: &Query,
        scope: Option<&Element>,
    ) -> Result<Vec<Element>, SessionError> {
        let found = match scope {
            Some(el) => el.find_all(locator(query)).await?,
            None => self.client.find_all(locator(query)).await?,
        };
        Ok(found)
    }

    async fn is_displayed(&self, el: &Element) -> Result<bool, SessionError> {
        Ok(el.is_displayed().await?)
    }

    async fn is_enabled(&self, el: &Element) -> Result<bool, SessionError> {
        Ok(el.is_enabled().await?)
    }

    async fn is_clickable(&self, el: &Element) -> Result<bool, SessionError> {
        Ok(self.script(HIT_TEST, el).await?.as_bool().unwrap_or(false))
    }

    async fn scroll_into_view(&self, el: &Element) -> Result<(), SessionError> {
        self.script(SCROLL_TO_CENTER, el).await.map(|_| ())
    }

    async fn click(&self, el: &Element) -> Result<(), SessionError> {
        Ok(el.click().await?)
    }

    async fn clear(&self, el: &Element) -> Result<(), SessionError> {
        Ok(el.clear().await?)
    }

    async fn type_text(&self, el: &Element, text: &str) -> Result<(), SessionError> {
        Ok(el.send_keys(text).await?)
    }

    async fn select_by_label(&self, el: &Element, label: &str) -> Result<(), SessionError> {
        Ok(el.select_by_label(label).await?)
    }

    async fn value(&self, el: &Element) -> Result<Option<String>, SessionError> {
        Ok(el.prop("value").await?)
    }

    async fn text(&self, el: &Element) -> Result<String, SessionError> {
        Ok(el.text().await?)
    }

    async fn attr(&self, el: &Element, name: &str) -> Result<Option<String>, SessionError> {
        Ok(el.attr(name).await?)
    }

    async fn fingerprint(&self) -> Result<PageFingerprint, SessionError> {
        let url = self.client.current_url().await?.to_string();
        let node_count = self
            .client
            .execute(NODE_COUNT, vec![])
            .await?
            .as_u64()
            .unwrap_or(0);
        Ok(PageFingerprint { url, node_count })
    }

    async fn quit(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.client.clone().close().await?;
        Ok(())
    }
}
