//! Caching, single-flight and lookup behavior of the revision index.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;

use futures_channel::oneshot;
use kbs_revdb::{Result, RevDbError, RevisionRepo, TableSource};

/// Serves queued responses; every call counts as one table fetch.
#[derive(Clone, Default)]
struct ScriptedTable {
    responses: Rc<RefCell<VecDeque<Result<String>>>>,
    fetches: Rc<Cell<u32>>,
    urls: Rc<RefCell<Vec<String>>>,
}

impl ScriptedTable {
    fn push(&self, response: Result<String>) {
        self.responses.borrow_mut().push_back(response);
    }
}

impl TableSource for ScriptedTable {
    fn fetch_text<'a>(&'a self, url: &'a str) -> impl Future<Output = Result<String>> + 'a {
        self.fetches.set(self.fetches.get() + 1);
        self.urls.borrow_mut().push(url.to_owned());
        let response = self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(RevDbError::Transport("no scripted response".into())));
        std::future::ready(response)
    }
}

const TABLE: &str = "a1,1.0,h1\n,,\nb2,2.0,h2\n";

#[test]
fn project_is_get_or_create() {
    let repo = RevisionRepo::new("./revisions", ScriptedTable::default());
    let first = repo.project("klipper");
    let second = repo.project("klipper");
    let other = repo.project("katapult");
    assert!(Rc::ptr_eq(&first, &second));
    assert!(!Rc::ptr_eq(&first, &other));
}

#[tokio::test]
async fn table_is_fetched_exactly_once() {
    let source = ScriptedTable::default();
    source.push(Ok(TABLE.to_owned()));
    let repo = RevisionRepo::new("./revisions", source.clone());
    let project = repo.project("klipper");

    let first = project.revisions().await.unwrap();
    let second = project.revisions().await.unwrap();

    assert_eq!(source.fetches.get(), 1);
    assert_eq!(source.urls.borrow()[0], "./revisions/klipper.csv");
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(first.len(), 2);
}

#[tokio::test]
async fn concurrent_callers_share_one_fetch() {
    // The scripted response resolves only once the test releases it, so the
    // second caller arrives while the first fetch is still pending.
    #[derive(Default)]
    struct GatedTable {
        gate: RefCell<Option<oneshot::Receiver<String>>>,
        fetches: Cell<u32>,
    }

    impl TableSource for GatedTable {
        fn fetch_text<'a>(&'a self, _url: &'a str) -> impl Future<Output = Result<String>> + 'a {
            self.fetches.set(self.fetches.get() + 1);
            let gate = self.gate.borrow_mut().take();
            async move {
                match gate {
                    Some(rx) => rx
                        .await
                        .map_err(|_| RevDbError::Transport("gate dropped".into())),
                    None => Err(RevDbError::Transport("duplicate fetch".into())),
                }
            }
        }
    }

    let (tx, rx) = oneshot::channel();
    let source = GatedTable::default();
    *source.gate.borrow_mut() = Some(rx);

    let repo = RevisionRepo::new("./revisions", source);
    let project = repo.project("klipper");

    let (first, second, ()) = tokio::join!(project.revisions(), project.revisions(), async {
        tx.send(TABLE.to_owned()).unwrap();
    });

    let first = first.unwrap();
    let second = second.unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(first.len(), 2);
}

#[tokio::test]
async fn failed_fetch_is_reported_and_retried() {
    let source = ScriptedTable::default();
    source.push(Err(RevDbError::HttpStatus { status: 404 }));
    source.push(Ok(TABLE.to_owned()));
    let repo = RevisionRepo::new("./revisions", source.clone());
    let project = repo.project("klipper");

    let err = project.revisions().await.unwrap_err();
    assert_eq!(err, RevDbError::HttpStatus { status: 404 });

    // The failure is not cached: the next call fetches again.
    let revisions = project.revisions().await.unwrap();
    assert_eq!(revisions.len(), 2);
    assert_eq!(source.fetches.get(), 2);
}

#[tokio::test]
async fn lookups_scan_in_table_order() {
    let source = ScriptedTable::default();
    source.push(Ok(TABLE.to_owned()));
    let repo = RevisionRepo::new("./revisions", source.clone());
    let project = repo.project("klipper");

    let by_version = project.revision_by_version("2.0").await.unwrap().unwrap();
    assert_eq!(by_version.git_sha, "b2");

    let by_sha = project.revision_by_sha("a1").await.unwrap().unwrap();
    assert_eq!(by_sha.human_version, "1.0");

    assert_eq!(project.revision_by_sha("zzz").await.unwrap(), None);
    assert_eq!(project.revision_by_version("9.9").await.unwrap(), None);

    // All four lookups answered from the one cached table.
    assert_eq!(source.fetches.get(), 1);
}

#[tokio::test]
async fn bundle_urls_are_content_addressed() {
    let source = ScriptedTable::default();
    source.push(Ok("abc,0.12.0,deadbeef\n".to_owned()));
    let repo = RevisionRepo::new("./revisions", source);
    let project = repo.project("klipper");

    let revision = project.revision_by_version("0.12.0").await.unwrap().unwrap();
    let url = project.bundle_url(&revision);
    assert_eq!(
        url,
        "./revisions/kconfig-bundles/klipper/kconfig-deadbeef.tar"
    );
    assert!(url.ends_with("kconfig-bundles/klipper/kconfig-deadbeef.tar"));
}
