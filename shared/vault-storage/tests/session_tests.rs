use std::sync::Arc;
use std::time::Duration;

use vault_storage::mock::MockVault;
use vault_storage::{AuthMethod, VaultSession};

fn app_role() -> AuthMethod {
    AuthMethod::AppRole {
        mount: "approle".to_string(),
        role_id: "role".to_string(),
        secret_id: "secret".to_string(),
    }
}

fn new_session(lease: u64) -> (Arc<MockVault>, VaultSession) {
    let vault = Arc::new(MockVault::new().with_lease(lease));
    let session = VaultSession::new(vault.clone(), app_role());
    (vault, session)
}

#[tokio::test(start_paused = true)]
async fn test_renews_ten_seconds_before_expiry() -> anyhow::Result<()> {
    let (vault, session) = new_session(60);

    session.connect().await?;
    assert_eq!(vault.login_count(), 1);
    assert!(session.is_renewing());

    tokio::time::sleep(Duration::from_secs(49)).await;
    assert_eq!(vault.login_count(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(vault.login_count(), 2);

    // the renewed lease schedules the next renewal
    tokio::time::sleep(Duration::from_secs(50)).await;
    assert_eq!(vault.login_count(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_non_expiring_token_is_not_renewed() -> anyhow::Result<()> {
    let (vault, session) = new_session(0);

    session.connect().await?;
    assert!(!session.is_renewing());

    tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
    assert_eq!(vault.login_count(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_replaces_pending_renewal() -> anyhow::Result<()> {
    let (vault, session) = new_session(60);

    session.connect().await?;
    tokio::time::sleep(Duration::from_secs(20)).await;
    session.reauthenticate().await?;
    assert_eq!(vault.login_count(), 2);

    // the first timer would have fired at 50s
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(vault.login_count(), 2);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(vault.login_count(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_renewal_is_retried() -> anyhow::Result<()> {
    let (vault, session) = new_session(60);

    session.connect().await?;
    vault.fail_logins(1);

    tokio::time::sleep(Duration::from_secs(51)).await;
    assert_eq!(vault.login_count(), 2);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(vault.login_count(), 3);
    assert!(session.is_renewing());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_and_drop_stop_renewal() -> anyhow::Result<()> {
    let (vault, session) = new_session(60);
    session.connect().await?;
    session.disconnect();
    assert!(!session.is_renewing());

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(vault.login_count(), 1);

    let (vault, session) = new_session(60);
    session.connect().await?;
    drop(session);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(vault.login_count(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_connects_leave_one_renewal() -> anyhow::Result<()> {
    let vault = Arc::new(
        MockVault::new()
            .with_lease(60)
            .with_login_delay(Duration::from_millis(10)),
    );
    let session = VaultSession::new(vault.clone(), app_role());

    let (first, second) = tokio::join!(session.connect(), session.connect());
    first?;
    second?;
    assert_eq!(vault.login_count(), 2);
    assert!(session.is_renewing());

    // only one renewal fires for the two logins
    tokio::time::sleep(Duration::from_secs(51)).await;
    assert_eq!(vault.login_count(), 3);

    session.disconnect();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(vault.login_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_failed_connect_schedules_nothing() {
    let (vault, session) = new_session(60);
    vault.fail_logins(1);

    assert!(session.connect().await.is_err());
    assert!(!session.is_renewing());
}
