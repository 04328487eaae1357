//! Browser control for real-page runs.
//!
//! With the `browser` feature, [`ChromiumFactory`] launches Chromium through the
//! Chrome `DevTools` Protocol (chromiumoxide). Every driver session lives in its
//! own browser context, so cookies, storage and open tabs never leak between
//! test cases. Elements are resolved by a small runtime injected into the page
//! that understands the same [`Selector`](crate::selector::Selector) forms as
//! the in-memory backend.

use serde::{Deserialize, Serialize};

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

#[cfg(feature = "browser")]
#[allow(clippy::significant_drop_tightening, clippy::items_after_statements)]
mod cdp {
    use super::BrowserConfig;
    use crate::action::{Invocation, Key, OptionMatch, SelectFileAction};
    use crate::driver::{Driver, DriverFactory, ElementRef, ElementState};
    use crate::fixture::FilePayload;
    use crate::result::{ProbeError, ProbeResult};
    use crate::selector::Selector;
    use async_trait::async_trait;
    use base64::Engine;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
    use chromiumoxide::cdp::browser_protocol::target::{
        CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
    };
    use chromiumoxide::element::Element;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tracing::{debug, info};

    /// In-page runtime; installs `window.__formprobe` once per document
    const RUNTIME: &str = r#"
if (!window.__formprobe) {
  const MARK = 'data-formprobe-target';
  const byKey = new Map();
  const keyOf = new WeakMap();
  let nextKey = 0;
  const keyFor = (el) => {
    if (!keyOf.has(el)) {
      const key = String(++nextKey);
      keyOf.set(el, key);
      byKey.set(key, el);
    }
    return keyOf.get(el);
  };
  const norm = (s) => String(s ?? '').replace(/\s+/g, ' ').trim();
  const isButtonInput = (el) => el.tagName === 'INPUT' && ['button', 'submit', 'reset'].includes(el.type);
  const textOf = (el) => norm(isButtonInput(el) ? el.value : (el.innerText ?? el.textContent));
  const textMatches = (m, t) =>
    m.mode === 'exact' ? t === norm(m.text)
    : m.mode === 'pattern' ? new RegExp(m.text).test(t)
    : t.includes(norm(m.text));
  const inOrder = (set) => Array.from(document.querySelectorAll('*')).filter((e) => set.has(e));
  const resolve = (sel) => {
    switch (sel.kind) {
      case 'css':
        return Array.from(document.querySelectorAll(sel.css));
      case 'contains': {
        if (sel.css) {
          return Array.from(document.querySelectorAll(sel.css)).filter((e) => textMatches(sel.text, textOf(e)));
        }
        const all = Array.from(document.body.querySelectorAll('*')).filter((e) => textMatches(sel.text, textOf(e)));
        return all.filter((e) => !all.some((o) => o !== e && e.contains(o)));
      }
      case 'within': {
        const found = new Set();
        for (const scope of resolve(sel.scope)) {
          for (const e of scope.querySelectorAll(sel.css)) found.add(e);
        }
        return inOrder(found);
      }
      case 'nth': {
        const all = resolve(sel.inner);
        const i = sel.index < 0 ? all.length - 1 : sel.index;
        return i >= 0 && i < all.length ? [all[i]] : [];
      }
      default:
        throw new Error('unexpanded alias @' + sel.name);
    }
  };
  const visible = (el) => {
    if (!el.isConnected || (el.tagName === 'INPUT' && el.type === 'hidden')) return false;
    if (typeof el.checkVisibility === 'function') {
      return el.checkVisibility({ visibilityProperty: true });
    }
    return el.getClientRects().length > 0 && getComputedStyle(el).visibility !== 'hidden';
  };
  const isControl = (el) => ['INPUT', 'SELECT', 'TEXTAREA', 'BUTTON', 'OPTION'].includes(el.tagName);
  const snapshot = (el, index) => ({
    index,
    tag: el.tagName.toLowerCase(),
    attributes: Object.fromEntries(Array.from(el.attributes).filter((a) => a.name !== MARK).map((a) => [a.name, a.value])),
    value: isControl(el) ? String(el.value) : null,
    text: textOf(el),
    visible: visible(el),
    checked: el.type === 'checkbox' || el.type === 'radio' ? el.checked : null,
    disabled: !!el.disabled || !!el.closest('fieldset[disabled]'),
    files: el.files ? Array.from(el.files).map((f) => ({ name: f.name, mime_type: f.type, size: f.size })) : [],
    key: keyFor(el),
  });
  const target = (ref) => {
    const el = ref.key != null ? byKey.get(ref.key) : resolve(ref.sel)[ref.index];
    if (!el || !el.isConnected) throw new Error('element detached from the document');
    return el;
  };
  const fire = (el, ...types) => types.forEach((t) => el.dispatchEvent(new Event(t, { bubbles: true })));
  const decode = (f) => new File([Uint8Array.from(atob(f.data), (c) => c.charCodeAt(0))], f.name, { type: f.type });
  window.__formprobe = {
    query: (sel) => resolve(sel).map(snapshot),
    mark: (ref) => {
      document.querySelectorAll('[' + MARK + ']').forEach((e) => e.removeAttribute(MARK));
      target(ref).setAttribute(MARK, '1');
      return '[' + MARK + ']';
    },
    unmark: () => document.querySelectorAll('[' + MARK + ']').forEach((e) => e.removeAttribute(MARK)),
    checked: (ref) => !!target(ref).checked,
    selectAll: (ref) => { const el = target(ref); el.focus(); el.select(); return true; },
    options: (ref) => Array.from(target(ref).options).map((o) => [o.value, norm(o.text), o.disabled]),
    selectIndex: (ref, option) => {
      const el = target(ref);
      el.selectedIndex = option;
      fire(el, 'input', 'change');
      return el.value;
    },
    attach: (ref, files, dragDrop) => {
      const el = target(ref);
      const dt = new DataTransfer();
      files.forEach((f) => dt.items.add(decode(f)));
      if (dragDrop) {
        for (const t of ['dragenter', 'dragover', 'drop']) {
          el.dispatchEvent(new DragEvent(t, { bubbles: true, cancelable: true, dataTransfer: dt }));
        }
      }
      el.files = dt.files;
      fire(el, 'input', 'change');
      return true;
    },
    invoke: (ref, call) => {
      const el = target(ref);
      switch (call.method) {
        case 'removeAttr': el.removeAttribute(call.args[0]); break;
        case 'attr': el.setAttribute(call.args[0], call.args[1]); break;
        case 'val': el.value = call.args[0]; break;
        case 'show': el.style.display = ''; if (!visible(el)) el.style.display = 'block'; break;
        case 'hide': el.style.display = 'none'; break;
        default: throw new Error('unsupported method ' + call.method);
      }
      return true;
    },
  };
}
"#;

    fn driver_err(e: impl std::fmt::Display) -> ProbeError {
        ProbeError::Driver {
            message: e.to_string(),
        }
    }

    /// Launches one Chromium process and hands out isolated sessions
    #[derive(Debug)]
    pub struct ChromiumFactory {
        config: BrowserConfig,
        inner: Arc<Mutex<CdpBrowser>>,
        #[allow(dead_code)]
        handle: tokio::task::JoinHandle<()>,
    }

    impl ChromiumFactory {
        /// Launch the browser process
        pub async fn launch(config: BrowserConfig) -> ProbeResult<Self> {
            let mut builder = CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder
                .build()
                .map_err(|message| ProbeError::BrowserLaunch { message })?;

            let (browser, mut handler) =
                CdpBrowser::launch(cdp_config)
                    .await
                    .map_err(|e| ProbeError::BrowserLaunch {
                        message: e.to_string(),
                    })?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });
            info!(headless = config.headless, "chromium launched");

            Ok(Self {
                config,
                inner: Arc::new(Mutex::new(browser)),
                handle,
            })
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Close the browser process
        pub async fn shutdown(&self) -> ProbeResult<()> {
            let mut browser = self.inner.lock().await;
            browser.close().await.map_err(driver_err)?;
            Ok(())
        }
    }

    #[async_trait]
    impl DriverFactory for ChromiumFactory {
        fn backend(&self) -> &'static str {
            "chromium"
        }

        async fn launch(&self) -> ProbeResult<Box<dyn Driver>> {
            let browser = self.inner.lock().await;
            let context = browser
                .execute(CreateBrowserContextParams::default())
                .await
                .map_err(driver_err)?
                .result
                .browser_context_id;
            let target = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(context.clone())
                .build()
                .map_err(driver_err)?;
            let page = browser.new_page(target).await.map_err(driver_err)?;
            debug!(context = ?context, "chromium session opened");
            Ok(Box::new(ChromiumDriver {
                browser: Arc::clone(&self.inner),
                context: Some(context),
                page: Some(page),
            }))
        }
    }

    /// One isolated Chromium browser context with a single page
    #[derive(Debug)]
    pub struct ChromiumDriver {
        browser: Arc<Mutex<CdpBrowser>>,
        context: Option<BrowserContextId>,
        page: Option<CdpPage>,
    }

    impl ChromiumDriver {
        fn page(&self) -> ProbeResult<&CdpPage> {
            self.page.as_ref().ok_or_else(|| ProbeError::invalid_state("session is closed"))
        }

        async fn call<T: DeserializeOwned>(&self, method: &str, args: Value) -> ProbeResult<T> {
            let script = format!(
                "(() => {{ {RUNTIME}\n return window.__formprobe.{method}(...{args}); }})()"
            );
            let result = self.page()?.evaluate(script).await.map_err(driver_err)?;
            result.into_value().map_err(driver_err)
        }

        async fn element(&self, target: &ElementRef) -> ProbeResult<Element> {
            let css: String = self.call("mark", Self::target_args(target)).await?;
            self.page()?.find_element(css).await.map_err(driver_err)
        }

        async fn unmark(&self) -> ProbeResult<()> {
            self.call::<Value>("unmark", json!([])).await.map(|_| ())
        }

        /// The in-page form of a reference: the key when the query assigned
        /// one, otherwise the selector and index
        fn target_json(target: &ElementRef) -> Value {
            json!({
                "sel": target.selector.to_json(),
                "index": target.index,
                "key": target.key,
            })
        }

        fn target_args(target: &ElementRef) -> Value {
            json!([Self::target_json(target)])
        }

        fn with_args(target: &ElementRef, extra: impl IntoIterator<Item = Value>) -> Value {
            let mut args = vec![Self::target_json(target)];
            args.extend(extra);
            Value::Array(args)
        }
    }

    #[async_trait]
    impl Driver for ChromiumDriver {
        fn backend(&self) -> &'static str {
            "chromium"
        }

        async fn navigate(&mut self, url: &str) -> ProbeResult<()> {
            self.page()?.goto(url).await.map_err(|e| ProbeError::Driver {
                message: format!("navigation to {url} failed: {e}"),
            })?;
            Ok(())
        }

        async fn reload(&mut self) -> ProbeResult<()> {
            self.page()?.reload().await.map_err(driver_err)?;
            Ok(())
        }

        async fn url(&mut self) -> ProbeResult<String> {
            Ok(self
                .page()?
                .url()
                .await
                .map_err(driver_err)?
                .unwrap_or_else(|| "about:blank".to_string()))
        }

        async fn title(&mut self) -> ProbeResult<String> {
            Ok(self.page()?.get_title().await.map_err(driver_err)?.unwrap_or_default())
        }

        async fn query(&mut self, selector: &Selector) -> ProbeResult<Vec<ElementState>> {
            if selector.has_alias() {
                return Err(ProbeError::invalid_state(format!(
                    "selector `{selector}` still contains an alias"
                )));
            }
            self.call("query", json!([selector.to_json()])).await
        }

        async fn type_text(&mut self, target: &ElementRef, keys: &[Key]) -> ProbeResult<()> {
            let element = self.element(target).await?;
            element.focus().await.map_err(driver_err)?;
            let mut pending = String::new();
            for key in keys {
                if let Key::Char(c) = key {
                    pending.push(*c);
                    continue;
                }
                if !pending.is_empty() {
                    element.type_str(&pending).await.map_err(driver_err)?;
                    pending.clear();
                }
                match key {
                    Key::Enter => {
                        element.press_key("Enter").await.map_err(driver_err)?;
                    }
                    Key::Backspace => {
                        element.press_key("Backspace").await.map_err(driver_err)?;
                    }
                    Key::SelectAll => {
                        self.call::<bool>("selectAll", Self::target_args(target)).await?;
                    }
                    Key::Char(_) => {}
                }
            }
            if !pending.is_empty() {
                element.type_str(&pending).await.map_err(driver_err)?;
            }
            self.unmark().await
        }

        async fn clear(&mut self, target: &ElementRef) -> ProbeResult<()> {
            let element = self.element(target).await?;
            self.call::<bool>("selectAll", Self::target_args(target)).await?;
            element.press_key("Backspace").await.map_err(driver_err)?;
            self.unmark().await
        }

        async fn set_checked(&mut self, target: &ElementRef, checked: bool) -> ProbeResult<()> {
            let current: bool = self.call("checked", Self::target_args(target)).await?;
            if current != checked {
                self.click(target).await?;
            }
            Ok(())
        }

        async fn select(&mut self, target: &ElementRef, option: &OptionMatch) -> ProbeResult<String> {
            let options: Vec<(String, String, bool)> = self.call("options", Self::target_args(target)).await?;
            let pairs: Vec<(String, String)> = options.iter().map(|(v, t, _)| (v.clone(), t.clone())).collect();
            let index = option.pick(&pairs, &target.selector.to_string())?;
            if options[index].2 {
                return Err(ProbeError::ActionIncompatible {
                    action: "select".into(),
                    selector: target.selector.to_string(),
                    element: format!("option {option}"),
                    reason: "is disabled".into(),
                });
            }
            self.call("selectIndex", Self::with_args(target, [json!(index)]))
                .await
        }

        async fn attach_files(
            &mut self,
            target: &ElementRef,
            files: &[FilePayload],
            action: SelectFileAction,
        ) -> ProbeResult<()> {
            let encoded: Vec<Value> = files
                .iter()
                .map(|f| {
                    json!({
                        "name": f.name,
                        "type": f.mime_type,
                        "data": base64::engine::general_purpose::STANDARD.encode(&f.buffer),
                    })
                })
                .collect();
            let drag_drop = action == SelectFileAction::DragDrop;
            self.call::<bool>("attach", Self::with_args(target, [json!(encoded), json!(drag_drop)]))
                .await
                .map(|_| ())
        }

        async fn invoke(&mut self, target: &ElementRef, invocation: &Invocation) -> ProbeResult<()> {
            let args = match invocation {
                Invocation::RemoveAttr(name) => json!([name]),
                Invocation::SetAttr(name, value) => json!([name, value]),
                Invocation::SetValue(value) => json!([value]),
                Invocation::Show | Invocation::Hide => json!([]),
            };
            let call = json!({ "method": invocation.name(), "args": args });
            self.call::<bool>("invoke", Self::with_args(target, [call]))
                .await
                .map(|_| ())
        }

        async fn click(&mut self, target: &ElementRef) -> ProbeResult<()> {
            let element = self.element(target).await?;
            element.click().await.map_err(driver_err)?;
            // the click may have navigated away, taking the marker with it
            let _ = self.unmark().await;
            Ok(())
        }

        async fn close(&mut self) -> ProbeResult<()> {
            if let Some(page) = self.page.take() {
                page.close().await.map_err(driver_err)?;
            }
            if let Some(context) = self.context.take() {
                let browser = self.browser.lock().await;
                browser
                    .execute(DisposeBrowserContextParams::new(context))
                    .await
                    .map_err(driver_err)?;
            }
            Ok(())
        }
    }

}

#[cfg(feature = "browser")]
pub use cdp::{ChromiumDriver, ChromiumFactory};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = BrowserConfig::default();
            assert!(config.headless);
            assert!(config.sandbox);
            assert!(config.chromium_path.is_none());
        }

        #[test]
        fn test_builders() {
            let config = BrowserConfig::default()
                .with_viewport(800, 600)
                .with_headless(false)
                .with_chromium_path("/usr/bin/chromium")
                .with_no_sandbox();
            assert_eq!((config.viewport_width, config.viewport_height), (800, 600));
            assert!(!config.headless);
            assert!(!config.sandbox);
            assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
        }

        #[test]
        fn test_partial_yaml() {
            let config: BrowserConfig = serde_yaml_ng::from_str("headless: false\n").unwrap();
            assert!(!config.headless);
            assert_eq!(config.viewport_width, 1280);
            assert!(serde_yaml_ng::from_str::<BrowserConfig>("colour: red\n").is_err());
        }
    }
}
