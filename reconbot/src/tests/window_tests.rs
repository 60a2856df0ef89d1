//! Window waits and the bounded-retry wrapper.

use std::cell::Cell;
use std::time::Duration;

use tokio::time::Instant;

use super::fake::{browse_dialog, FakeDesktop, WindowSpec};
use crate::errors::AutomationError;
use crate::selector::{WindowPredicate, WindowRole};
use crate::sequencer::BROWSE_FOLDER_TITLE;
use crate::window::{ControlRole, RetryPolicy, WindowWaiter};

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test(start_paused = true)]
async fn absent_window_is_none_after_the_timeout() {
    let desktop = FakeDesktop::new(vec![WindowSpec::new("Проводник", WindowRole::Other)]);
    let timeout = Duration::from_secs(3);

    let start = Instant::now();
    let window = WindowWaiter::new()
        .wait_for_window(&desktop, &WindowPredicate::title(BROWSE_FOLDER_TITLE), timeout)
        .await
        .unwrap();

    assert!(window.is_none());
    assert_eq!(start.elapsed(), timeout);
}

#[tokio::test(start_paused = true)]
async fn busy_desktop_listing_is_polled_again() {
    let desktop = FakeDesktop::new(vec![browse_dialog()]);
    *desktop.listing_failures.borrow_mut() = 2;

    let start = Instant::now();
    let window = WindowWaiter::new()
        .wait_startup(
            &desktop,
            &WindowPredicate::title(BROWSE_FOLDER_TITLE),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

    assert_eq!(window.title(), BROWSE_FOLDER_TITLE);
    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn startup_wait_reports_a_timeout() {
    let desktop = FakeDesktop::new(Vec::new());

    let err = WindowWaiter::new()
        .wait_startup(
            &desktop,
            &WindowPredicate::title("SAP Logon 750"),
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AutomationError::Timeout(_)));
}

#[tokio::test(start_paused = true)]
async fn retries_give_up_after_every_attempt_timed_out() {
    let desktop = FakeDesktop::new(Vec::new());
    let calls = Cell::new(0);

    let start = Instant::now();
    let err = WindowWaiter::new()
        .with_retries(
            &desktop,
            &WindowPredicate::title(BROWSE_FOLDER_TITLE),
            policy(),
            |_window| {
                calls.set(calls.get() + 1);
                async { Ok(()) }
            },
        )
        .await
        .unwrap_err();

    let elapsed = start.elapsed();
    assert!(elapsed >= policy().timeout * policy().max_attempts);
    assert!(elapsed < policy().timeout * (policy().max_attempts + 1));
    assert_eq!(calls.get(), 0);
    match err {
        AutomationError::WindowNotFound { window, attempts } => {
            assert_eq!(attempts, 3);
            assert!(window.contains(BROWSE_FOLDER_TITLE));
        }
        other => panic!("expected WindowNotFound, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn missing_control_uses_up_an_attempt() {
    // the picker exists but its edit box is not rendered yet
    let desktop = FakeDesktop::new(vec![WindowSpec::new(
        BROWSE_FOLDER_TITLE,
        WindowRole::Dialog,
    )
    .with_control(ControlRole::Button, "OK")]);
    let calls = Cell::new(0);

    let result = WindowWaiter::new()
        .with_retries(
            &desktop,
            &WindowPredicate::title(BROWSE_FOLDER_TITLE),
            policy(),
            |window| {
                calls.set(calls.get() + 1);
                let attempt = calls.get();
                async move {
                    if attempt == 1 {
                        window.control(ControlRole::Edit, "Folder:")?;
                    }
                    window.control(ControlRole::Button, "OK")?.click()
                }
            },
        )
        .await;

    assert!(result.is_ok());
    assert_eq!(calls.get(), 2);
    assert_eq!(desktop.log(), vec!["click OK".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn other_failures_are_not_retried() {
    let desktop = FakeDesktop::new(vec![browse_dialog()]);
    let calls = Cell::new(0);

    let err = WindowWaiter::new()
        .with_retries(
            &desktop,
            &WindowPredicate::title(BROWSE_FOLDER_TITLE),
            policy(),
            |_window| {
                calls.set(calls.get() + 1);
                async { Err::<(), _>(AutomationError::Status("access denied".into())) }
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AutomationError::Status(_)));
    assert_eq!(calls.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn controls_only_accept_their_own_actions() {
    let desktop = FakeDesktop::new(vec![browse_dialog()]);
    let window = WindowWaiter::new()
        .wait_startup(&desktop, &WindowPredicate::Role(WindowRole::Dialog), Duration::from_secs(1))
        .await
        .unwrap();

    let ok = window.control(ControlRole::Button, "OK").unwrap();
    assert!(matches!(
        ok.set_value("x"),
        Err(AutomationError::UnsupportedOperation(_))
    ));
    assert!(matches!(
        window.control(ControlRole::Edit, "Имя файла:"),
        Err(AutomationError::ElementNotFound { .. })
    ));
}

#[cfg(unix)]
#[tokio::test(start_paused = true)]
async fn launcher_without_a_window_times_out() {
    use crate::launcher::Launcher;

    let desktop = FakeDesktop::new(vec![WindowSpec::new("Проводник", WindowRole::Other)]);
    let launcher = Launcher::new("true", "SAP Logon 750").timeout(Duration::from_secs(2));

    let err = launcher.launch(&desktop).await.unwrap_err();

    assert!(matches!(err, AutomationError::Timeout(_)));
}
