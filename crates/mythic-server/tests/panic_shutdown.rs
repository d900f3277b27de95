use std::time::Duration;

#[tokio::test]
async fn task_panic_triggers_shutdown_once() {
    let fatal = mythic_server::shutdown_on_panic();
    assert!(!fatal.is_cancelled());

    let first = tokio::spawn(async { panic!("handler blew up") });
    assert!(first.await.unwrap_err().is_panic());

    tokio::time::timeout(Duration::from_secs(1), fatal.cancelled())
        .await
        .expect("panic did not request shutdown");

    // A second panic finds shutdown already requested
    let second = tokio::spawn(async { panic!("again") });
    assert!(second.await.unwrap_err().is_panic());
    assert!(fatal.is_cancelled());
}
