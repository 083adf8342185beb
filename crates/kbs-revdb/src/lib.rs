//! Revision index for kconfig bundles.
//!
//! Each project has an externally hosted table at `{base}/{project}.csv`
//! mapping recorded revisions (`git_sha,human_version,kconfig_hash` per line,
//! no header, no escaping) to content-addressed bundle archives under
//! `{base}/kconfig-bundles/{project}/kconfig-{hash}.tar`. The index fetches a
//! project's table at most once and answers lookups from the cached rows.
//!
//! Single-threaded by design: the index lives on the page's one logical
//! thread, so interior mutability is `RefCell` and sharing is `Rc`. The only
//! concurrency is overlapping awaits, which the single-flight cache resolves
//! by parking late callers on oneshot channels.

mod error;
mod table;

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use futures_channel::oneshot;

pub use error::{Result, RevDbError};
pub use table::{parse_table, Revision};

/// Transport for the revision tables (`fetch()` in the browser, a canned map
/// in tests).
pub trait TableSource {
    fn fetch_text<'a>(&'a self, url: &'a str) -> impl Future<Output = Result<String>> + 'a;
}

/// Root registry: project name -> [`Project`], get-or-create.
pub struct RevisionRepo<S> {
    base_url: Rc<str>,
    source: Rc<S>,
    projects: RefCell<HashMap<String, Rc<Project<S>>>>,
}

impl<S: TableSource> RevisionRepo<S> {
    pub fn new(base_url: impl Into<String>, source: S) -> Self {
        Self {
            base_url: base_url.into().into(),
            source: Rc::new(source),
            projects: RefCell::new(HashMap::new()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get-or-create: the same name always yields the same `Rc`, so a
    /// project's cached table is shared by every caller for the lifetime of
    /// the repo.
    pub fn project(&self, name: &str) -> Rc<Project<S>> {
        if let Some(existing) = self.projects.borrow().get(name) {
            return existing.clone();
        }
        let project = Rc::new(Project {
            name: name.to_owned(),
            base_url: self.base_url.clone(),
            source: self.source.clone(),
            cache: RefCell::new(TableCache::Empty),
        });
        self.projects
            .borrow_mut()
            .insert(name.to_owned(), project.clone());
        project
    }
}

type TableResult = Result<Rc<[Revision]>>;

enum TableCache {
    Empty,
    /// A fetch is in flight; late callers park here.
    Pending(Vec<oneshot::Sender<TableResult>>),
    Ready(Rc<[Revision]>),
}

/// One project's revision table, fetched lazily and cached forever.
pub struct Project<S> {
    name: String,
    base_url: Rc<str>,
    source: Rc<S>,
    cache: RefCell<TableCache>,
}

impl<S: TableSource> Project<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn table_url(&self) -> String {
        format!("{}/{}.csv", self.base_url, self.name)
    }

    /// The project's revisions, in table row order.
    ///
    /// The first caller fetches and parses the table; concurrent callers
    /// await the same fetch rather than issuing a duplicate one. A failed
    /// fetch is fanned out to everyone waiting and clears the slot so a
    /// later call can retry.
    pub async fn revisions(&self) -> TableResult {
        let waiter = {
            let mut slot = self.cache.borrow_mut();
            match &mut *slot {
                TableCache::Ready(revisions) => return Ok(revisions.clone()),
                TableCache::Pending(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                TableCache::Empty => {
                    *slot = TableCache::Pending(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            // Sender dropped without a value means the leading fetch was
            // itself dropped mid-flight.
            return rx.await.unwrap_or(Err(RevDbError::Cancelled));
        }

        // If this future is dropped during the await below, the guard tears
        // the pending slot down and the parked waiters observe `Cancelled`.
        let guard = FlightGuard { cache: &self.cache };
        let outcome = self
            .source
            .fetch_text(&self.table_url())
            .await
            .map(|text| Rc::from(parse_table(&text)));
        guard.resolve(outcome.clone());
        outcome
    }

    /// First revision whose `git_sha` matches, in table order.
    pub async fn revision_by_sha(&self, git_sha: &str) -> Result<Option<Revision>> {
        let revisions = self.revisions().await?;
        Ok(revisions.iter().find(|r| r.git_sha == git_sha).cloned())
    }

    /// First revision whose display version matches, in table order.
    pub async fn revision_by_version(&self, human_version: &str) -> Result<Option<Revision>> {
        let revisions = self.revisions().await?;
        Ok(revisions
            .iter()
            .find(|r| r.human_version == human_version)
            .cloned())
    }

    /// Location of a revision's bundle archive. Relative when `base_url` is
    /// relative; the caller resolves it against the page location.
    pub fn bundle_url(&self, revision: &Revision) -> String {
        format!(
            "{}/kconfig-bundles/{}/kconfig-{}.tar",
            self.base_url, self.name, revision.kconfig_hash
        )
    }
}

struct FlightGuard<'a> {
    cache: &'a RefCell<TableCache>,
}

impl FlightGuard<'_> {
    fn resolve(self, outcome: TableResult) {
        let waiters = {
            let mut slot = self.cache.borrow_mut();
            let waiters = match std::mem::replace(&mut *slot, TableCache::Empty) {
                TableCache::Pending(waiters) => waiters,
                _ => Vec::new(),
            };
            if let Ok(revisions) = &outcome {
                *slot = TableCache::Ready(revisions.clone());
            }
            waiters
        };
        for tx in waiters {
            let _ = tx.send(outcome.clone());
        }
        std::mem::forget(self);
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // Dropping the parked senders wakes every waiter with `Cancelled`.
        *self.cache.borrow_mut() = TableCache::Empty;
    }
}
