//! `fetch()`-backed transports for bundles and revision tables.

#![cfg(target_arch = "wasm32")]

use std::future::Future;

use js_sys::Uint8Array;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

use kbs_revdb::{RevDbError, TableSource};
use kbs_session::{BundleSource, FetchError};

pub fn describe_js(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}

/// Resolve a possibly-relative URL against the page's own location.
pub fn resolve_against_page(url: &str) -> String {
    let base = web_sys::window().and_then(|w| w.location().href().ok());
    match base {
        Some(base) => web_sys::Url::new_with_base(url, &base)
            .map(|u| u.href())
            .unwrap_or_else(|_| url.to_owned()),
        None => url.to_owned(),
    }
}

/// The page's `fetch()`. Implements both the bundle and the revision-table
/// transport seams.
pub struct WebFetch;

async fn response_for(url: &str) -> Result<Response, String> {
    let window = web_sys::window().ok_or_else(|| "no window in this context".to_owned())?;
    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| describe_js(&e))?;
    response
        .dyn_into::<Response>()
        .map_err(|_| "fetch() did not produce a Response".to_owned())
}

impl BundleSource for WebFetch {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + 'a {
        async move {
            let response = response_for(url).await.map_err(FetchError::Transport)?;
            if !response.ok() {
                return Err(FetchError::HttpStatus {
                    status: response.status(),
                });
            }
            let buffer = JsFuture::from(
                response
                    .array_buffer()
                    .map_err(|e| FetchError::Transport(describe_js(&e)))?,
            )
            .await
            .map_err(|e| FetchError::Transport(describe_js(&e)))?;
            Ok(Uint8Array::new(&buffer).to_vec())
        }
    }
}

impl TableSource for WebFetch {
    fn fetch_text<'a>(
        &'a self,
        url: &'a str,
    ) -> impl Future<Output = Result<String, RevDbError>> + 'a {
        async move {
            let response = response_for(url).await.map_err(RevDbError::Transport)?;
            if !response.ok() {
                return Err(RevDbError::HttpStatus {
                    status: response.status(),
                });
            }
            let text = JsFuture::from(
                response
                    .text()
                    .map_err(|e| RevDbError::Transport(describe_js(&e)))?,
            )
            .await
            .map_err(|e| RevDbError::Transport(describe_js(&e)))?;
            text.as_string()
                .ok_or_else(|| RevDbError::Transport("response text was not a string".to_owned()))
        }
    }
}
