//! Exported revision index.

#![cfg(target_arch = "wasm32")]

use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use kbs_revdb::RevisionRepo;

use crate::fetch::{resolve_against_page, WebFetch};

fn js_error(message: impl core::fmt::Display) -> JsValue {
    js_sys::Error::new(&message.to_string()).into()
}

enum Query {
    Sha(String),
    Version(String),
}

/// Resolves project versions to content-addressed bundle URLs from the
/// externally hosted revision tables. Tables are fetched once per project
/// and cached for the page's lifetime.
#[wasm_bindgen]
pub struct RevisionIndex {
    repo: Rc<RevisionRepo<WebFetch>>,
}

#[wasm_bindgen]
impl RevisionIndex {
    #[wasm_bindgen(constructor)]
    pub fn new(base_url: String) -> Self {
        Self {
            repo: Rc::new(RevisionRepo::new(base_url, WebFetch)),
        }
    }

    /// Promise of `[{git_sha, human_version, kconfig_hash}, ...]` in table
    /// row order.
    pub fn revisions(&self, project: String) -> js_sys::Promise {
        let repo = self.repo.clone();
        future_to_promise(async move {
            let project = repo.project(&project);
            let revisions = project.revisions().await.map_err(js_error)?;
            serde_wasm_bindgen::to_value(&revisions.to_vec()).map_err(JsValue::from)
        })
    }

    /// Promise of the bundle URL for a display version, resolved against the
    /// page location; `undefined` when the version is unknown.
    pub fn bundle_url_by_version(&self, project: String, version: String) -> js_sys::Promise {
        self.resolve_bundle(project, Query::Version(version))
    }

    /// Promise of the bundle URL for a git sha; `undefined` when unknown.
    pub fn bundle_url_by_sha(&self, project: String, git_sha: String) -> js_sys::Promise {
        self.resolve_bundle(project, Query::Sha(git_sha))
    }
}

impl RevisionIndex {
    fn resolve_bundle(&self, project: String, query: Query) -> js_sys::Promise {
        let repo = self.repo.clone();
        future_to_promise(async move {
            let project = repo.project(&project);
            let revision = match &query {
                Query::Sha(sha) => project.revision_by_sha(sha).await,
                Query::Version(version) => project.revision_by_version(version).await,
            }
            .map_err(js_error)?;
            Ok(match revision {
                Some(revision) => {
                    JsValue::from_str(&resolve_against_page(&project.bundle_url(&revision)))
                }
                None => JsValue::UNDEFINED,
            })
        })
    }
}
