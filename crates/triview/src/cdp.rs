//! Chromium driver over CDP.
//!
//! Queries are evaluated in the page with `document.evaluate`; matched nodes
//! are kept in a page-side registry so later calls can address them by id.
//! Pointer and keyboard input goes through the CDP `Input` domain, so the
//! page sees trusted events and CSS `:hover` applies. Fills and forced clicks
//! stay in page script.

use crate::config::TriviewConfig;
use crate::driver::{
    Action, Driver, DriverError, DriverResult, ElementHandle, ElementState, ReadKind,
};
use crate::query::Query;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

const WAIT_STEP: Duration = Duration::from_millis(50);

const REGISTRY: &str = "(window.__triview ||= { next: 0, nodes: new Map() })";

/// Drops registry entries whose nodes left the document
const PRUNE: &str = "for (const [id, node] of R.nodes) { if (!node.isConnected) R.nodes.delete(id); }";

const VISIBLE: &str = "(el) => { \
    if (!el.isConnected) return false; \
    const style = getComputedStyle(el); \
    if (style.visibility === 'hidden' || style.display === 'none') return false; \
    return el.getClientRects().length > 0; }";

const ACTIONABLE: &str = "(el) => { \
    const visible = VISIBLE(el); \
    return visible && !el.disabled && getComputedStyle(el).pointerEvents !== 'none'; }";

/// Launch settings for Chromium
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdpOptions {
    /// Run without a window
    pub headless: bool,
    /// Keep Chromium's sandbox on
    pub sandbox: bool,
    /// Explicit browser binary
    pub chromium_path: Option<PathBuf>,
}

impl Default for CdpOptions {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chromium_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Reply<T> {
    detached: bool,
    value: Option<T>,
}

/// Viewport point, or the reason the element cannot take input there
#[derive(Debug, Deserialize)]
struct Aim {
    x: f64,
    y: f64,
    refused: Option<String>,
}

fn backend(e: impl std::fmt::Display) -> DriverError {
    DriverError::Backend {
        message: e.to_string(),
    }
}

fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

/// CDP modifier bits
const ALT: i64 = 1;
const CTRL: i64 = 2;
const META: i64 = 4;
const SHIFT: i64 = 8;

/// Split `Control+Shift+z` into a CDP modifier mask and the key
fn chord_parts(chord: &str) -> (i64, &str) {
    let mut parts: Vec<&str> = chord.split('+').collect();
    let key = parts.pop().unwrap_or_default();
    let modifiers = parts.into_iter().fold(0, |mask, m| {
        mask | match m {
            "Control" | "Ctrl" => CTRL,
            "Shift" => SHIFT,
            "Alt" => ALT,
            "Meta" => META,
            _ => 0,
        }
    });
    (modifiers, key)
}

/// What `Input.dispatchKeyEvent` needs for one key
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeySpec {
    key: String,
    code: String,
    virtual_key: i64,
    text: Option<String>,
}

fn key_spec(key: &str, modifiers: i64) -> KeySpec {
    let named = |code: &str, virtual_key: i64, text: Option<&str>| KeySpec {
        key: key.to_string(),
        code: code.to_string(),
        virtual_key,
        text: text.map(str::to_string),
    };
    match key {
        "Enter" => named("Enter", 13, Some("\r")),
        "Escape" => named("Escape", 27, None),
        "Tab" => named("Tab", 9, None),
        "Backspace" => named("Backspace", 8, None),
        _ => {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphanumeric() => {
                    let upper = c.to_ascii_uppercase();
                    let code = if c.is_ascii_digit() {
                        format!("Digit{c}")
                    } else {
                        format!("Key{upper}")
                    };
                    // Chords with Control or Meta type nothing
                    let text = (modifiers & (CTRL | META) == 0).then(|| key.to_string());
                    KeySpec {
                        key: key.to_string(),
                        code,
                        virtual_key: i64::from(u32::from(upper)),
                        text,
                    }
                }
                _ => named(key, 0, None),
            }
        }
    }
}

fn locate_script(xpath: &str) -> String {
    format!(
        "(() => {{ const R = {REGISTRY}; {PRUNE} \
         const snap = document.evaluate({xpath}, document, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
         const out = []; \
         for (let i = 0; i < snap.snapshotLength; i++) {{ \
             const node = snap.snapshotItem(i); \
             if (node.__triviewId === undefined || !R.nodes.has(node.__triviewId)) {{ \
                 node.__triviewId = 'el-' + (R.next++); R.nodes.set(node.__triviewId, node); }} \
             out.push({{ id: node.__triviewId, tag_name: node.nodeName.toLowerCase() }}); }} \
         return out; }})()",
        xpath = js_string(xpath)
    )
}

/// Scroll the element into view and report its centre.
///
/// With `guarded`, a non-actionable element reports why instead.
fn aim_body(guarded: bool) -> String {
    let guard = if guarded {
        "if (!ACTIONABLE(el)) return { x: 0, y: 0, refused: 'not actionable' };"
    } else {
        ""
    };
    format!(
        "{guard} el.scrollIntoView({{ block: 'center', inline: 'center' }}); \
         const r = el.getBoundingClientRect(); \
         return {{ x: r.left + r.width / 2, y: r.top + r.height / 2, refused: null }};"
    )
}

/// Script for the actions that stay in page context
fn script_body(action: &Action) -> Option<String> {
    match action {
        Action::ForceClick => Some("el.click(); return null;".to_string()),
        Action::Fill(text) => Some(format!(
            "if (!ACTIONABLE(el)) return 'not actionable'; el.focus(); \
             const max = el.maxLength > 0 ? el.maxLength : Infinity; \
             el.value = Array.from({text}).slice(0, max).join(''); \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); return null;",
            text = js_string(text)
        )),
        Action::Press(_) => Some("el.focus(); return null;".to_string()),
        Action::Click | Action::DoubleClick | Action::Hover => None,
    }
}

/// [`Driver`] backed by a Chromium page
#[derive(Debug)]
pub struct CdpDriver {
    browser: Arc<Mutex<Browser>>,
    page: Arc<Mutex<Page>>,
    handle: tokio::task::JoinHandle<()>,
}

impl CdpDriver {
    /// Launch Chromium and open a blank page
    pub async fn launch(options: &CdpOptions) -> DriverResult<Self> {
        let mut builder = BrowserConfig::builder();
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = options.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(backend)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(backend)?;
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        let page = browser.new_page("about:blank").await.map_err(backend)?;
        info!(headless = options.headless, "chromium launched");

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            page: Arc::new(Mutex::new(page)),
            handle,
        })
    }

    /// Launch and navigate to the configured application URL
    pub async fn open(options: &CdpOptions, config: &TriviewConfig) -> DriverResult<Self> {
        let driver = Self::launch(options).await?;
        if let Some(url) = &config.base_url {
            driver.goto(url).await?;
        }
        Ok(driver)
    }

    /// Navigate the page
    pub async fn goto(&self, url: &str) -> DriverResult<()> {
        let page = self.page.lock().await;
        page.goto(url).await.map_err(backend)?;
        debug!(url, "navigated");
        Ok(())
    }

    /// Close the browser and stop the event handler
    pub async fn close(self) -> DriverResult<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(backend)?;
        self.handle.abort();
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> DriverResult<T> {
        let page = self.page.lock().await;
        let result = page.evaluate(script).await.map_err(backend)?;
        result.into_value().map_err(backend)
    }

    async fn on_element<T: DeserializeOwned>(
        &self,
        handle: &ElementHandle,
        body: &str,
    ) -> DriverResult<Option<T>> {
        let script = format!(
            "(() => {{ const VISIBLE = {VISIBLE}; const ACTIONABLE = {ACTIONABLE}; \
             const el = {REGISTRY}.nodes.get({id}); \
             if (!el || !el.isConnected) return {{ detached: true, value: null }}; \
             const value = ((el) => {{ {body} }})(el); \
             return {{ detached: false, value: value ?? null }}; }})()",
            id = js_string(&handle.id)
        );
        let reply: Reply<T> = self.eval(script).await?;
        if reply.detached {
            return Err(DriverError::Detached {
                handle: handle.id.clone(),
            });
        }
        Ok(reply.value)
    }

    async fn flag(&self, handle: &ElementHandle, body: &str) -> DriverResult<bool> {
        Ok(self.on_element::<bool>(handle, body).await?.unwrap_or(false))
    }

    async fn aim(&self, handle: &ElementHandle, guarded: bool) -> DriverResult<(f64, f64)> {
        let aim: Aim = self
            .on_element(handle, &aim_body(guarded))
            .await?
            .ok_or_else(|| backend("element reported no position"))?;
        match aim.refused {
            None => Ok((aim.x, aim.y)),
            Some(reason) => Err(DriverError::NotActionable {
                handle: handle.id.clone(),
                reason,
            }),
        }
    }

    async fn mouse(
        &self,
        kind: DispatchMouseEventType,
        (x, y): (f64, f64),
        click_count: i64,
    ) -> DriverResult<()> {
        let mut builder = DispatchMouseEventParams::builder().r#type(kind).x(x).y(y);
        if click_count > 0 {
            builder = builder.button(MouseButton::Left).click_count(click_count);
        }
        let params = builder.build().map_err(backend)?;
        let page = self.page.lock().await;
        page.execute(params).await.map_err(backend)?;
        Ok(())
    }

    async fn clicks(&self, at: (f64, f64), count: i64) -> DriverResult<()> {
        self.mouse(DispatchMouseEventType::MouseMoved, at, 0).await?;
        for n in 1..=count {
            self.mouse(DispatchMouseEventType::MousePressed, at, n).await?;
            self.mouse(DispatchMouseEventType::MouseReleased, at, n).await?;
        }
        Ok(())
    }

    async fn key(&self, key: &str, modifiers: i64) -> DriverResult<()> {
        let spec = key_spec(key, modifiers);
        let down = if spec.text.is_some() {
            DispatchKeyEventType::KeyDown
        } else {
            DispatchKeyEventType::RawKeyDown
        };
        for kind in [down, DispatchKeyEventType::KeyUp] {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind.clone())
                .key(spec.key.clone())
                .code(spec.code.clone())
                .windows_virtual_key_code(spec.virtual_key)
                .modifiers(modifiers);
            if kind == DispatchKeyEventType::KeyDown {
                if let Some(text) = &spec.text {
                    builder = builder.text(text.clone());
                }
            }
            let params = builder.build().map_err(backend)?;
            let page = self.page.lock().await;
            page.execute(params).await.map_err(backend)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for CdpDriver {
    async fn locate(&self, query: &Query) -> DriverResult<Vec<ElementHandle>> {
        let Some(xpath) = query.xpath() else {
            return Ok(Vec::new());
        };
        let script = locate_script(&xpath);
        self.eval(script)
            .await
            .map_err(|e| DriverError::InvalidQuery {
                query: query.to_string(),
                message: e.to_string(),
            })
    }

    async fn read(&self, handle: &ElementHandle, kind: ReadKind) -> DriverResult<Option<String>> {
        let body = match kind {
            ReadKind::Text => "return el.innerText ?? el.textContent;".to_string(),
            ReadKind::Value => "return ('value' in el) ? String(el.value) : null;".to_string(),
            ReadKind::Attribute(name) => format!("return el.getAttribute({});", js_string(&name)),
        };
        self.on_element(handle, &body).await
    }

    async fn is_visible(&self, handle: &ElementHandle) -> DriverResult<bool> {
        self.flag(handle, "return VISIBLE(el);").await
    }

    async fn is_checked(&self, handle: &ElementHandle) -> DriverResult<bool> {
        self.flag(handle, "return !!el.checked;").await
    }

    async fn is_enabled(&self, handle: &ElementHandle) -> DriverResult<bool> {
        self.flag(handle, "return !el.disabled;").await
    }

    async fn act(&self, handle: &ElementHandle, action: Action) -> DriverResult<()> {
        debug!(handle = %handle.id, action = action.name(), "cdp act");
        match &action {
            Action::Hover => {
                let at = self.aim(handle, false).await?;
                self.mouse(DispatchMouseEventType::MouseMoved, at, 0).await
            }
            Action::Click => {
                let at = self.aim(handle, true).await?;
                self.clicks(at, 1).await
            }
            Action::DoubleClick => {
                let at = self.aim(handle, true).await?;
                self.clicks(at, 2).await
            }
            Action::ForceClick | Action::Fill(_) | Action::Press(_) => {
                let body = script_body(&action).unwrap_or_default();
                let refused: Option<String> = self.on_element(handle, &body).await?;
                if let Some(reason) = refused {
                    return Err(DriverError::NotActionable {
                        handle: handle.id.clone(),
                        reason,
                    });
                }
                if let Action::Press(key) = &action {
                    self.key(key, 0).await?;
                }
                Ok(())
            }
        }
    }

    async fn wait_for(
        &self,
        handle: &ElementHandle,
        state: ElementState,
        timeout: Duration,
    ) -> DriverResult<bool> {
        let body = match state {
            ElementState::Visible => "return VISIBLE(el);",
            ElementState::Enabled => "return VISIBLE(el) && !el.disabled;",
            ElementState::Actionable => "return ACTIONABLE(el);",
        };
        let deadline = Instant::now() + timeout;
        loop {
            if self.flag(handle, body).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(WAIT_STEP).await;
        }
    }

    async fn press_keys(&self, chord: &str) -> DriverResult<()> {
        let (modifiers, key) = chord_parts(chord);
        self.key(key, modifiers).await
    }
}
