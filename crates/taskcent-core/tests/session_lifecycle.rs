mod support;

use taskcent_core::session::{ActiveSession, Session, SessionFile};
use taskcent_core::store::SortOrder;
use tempfile::tempdir;

use support::{FakeApi, raw};

#[tokio::test]
async fn session_start_and_teardown() {
    let temp = tempdir().expect("tempdir");
    let file = SessionFile::in_dir(temp.path());
    let session = Session {
        email: "me@example.com".to_string(),
        token: "tok".to_string(),
    };
    file.save(&session).expect("save session");

    let api = FakeApi::with_tasks(vec![raw("a", "One"), raw("b", "Two")]);
    let active =
        ActiveSession::start(api.clone(), session.clone(), SortOrder::Server, file.clone());
    assert_eq!(active.session(), &session);
    assert_eq!(active.store().load_tasks().await.expect("load"), 2);

    active.teardown().expect("teardown");
    assert!(!file.path().exists());
    assert_eq!(file.load().expect("load after logout"), None);
    assert_eq!(api.calls("list"), 1);
}

#[tokio::test]
async fn requests_in_flight_at_logout_are_dropped() {
    let temp = tempdir().expect("tempdir");
    let file = SessionFile::in_dir(temp.path());
    let api = FakeApi::with_tasks(vec![raw("a", "One")]);
    let active = ActiveSession::start(
        api.clone(),
        Session {
            email: "me@example.com".to_string(),
            token: "tok".to_string(),
        },
        SortOrder::Server,
        file,
    );
    let mut held = api.hold_responses();

    let driver = async {
        let request = held.recv().await.expect("list held");
        active.store().reset();
        request.release();
    };
    let (loaded, ()) = tokio::join!(active.store().load_tasks(), driver);

    assert_eq!(loaded.expect("server answered"), 1);
    assert!(active.store().is_empty());
    active.teardown().expect("teardown without a file");
}
