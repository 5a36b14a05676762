//! Integration tests for the session lifecycle.
//!
//! Authentication, access-token verification, refresh rotation, and
//! revocation, all through the platform facade.

use brewline_core::identity::Credentials;
use brewline_core::{CoreError, Role};
use brewline_integration_tests::TestContext;

fn credentials(username: &str, password: &str) -> Credentials {
    Credentials {
        username: username.to_string(),
        password: password.to_string(),
    }
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_authenticate_then_verify() {
    let ctx = TestContext::new();
    let id = ctx.register(1, Role::Customer, "vera", "latte-art-9000");

    let pair = ctx
        .platform
        .authenticate(&credentials("vera", "latte-art-9000"))
        .await
        .expect("authenticate");

    let principal = ctx.platform.verify(&pair.access_token).await.expect("verify");
    assert_eq!(principal.id, id);
    assert_eq!(principal.role, Role::Customer);
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let ctx = TestContext::new();
    ctx.register(1, Role::Customer, "vera", "latte-art-9000");

    let result = ctx
        .platform
        .authenticate(&credentials("vera", "espresso"))
        .await;
    assert!(matches!(result, Err(CoreError::Unauthorized)));
}

#[tokio::test]
async fn test_unknown_username_rejected() {
    let ctx = TestContext::new();
    let result = ctx
        .platform
        .authenticate(&credentials("nobody", "anything"))
        .await;
    assert!(matches!(result, Err(CoreError::Unauthorized)));
}

#[tokio::test]
async fn test_garbage_access_token_rejected() {
    let ctx = TestContext::new();
    let result = ctx.platform.verify("not.a.token").await;
    assert!(matches!(result, Err(CoreError::Unauthorized)));
}

// =============================================================================
// Refresh Rotation
// =============================================================================

#[tokio::test]
async fn test_refresh_rotates_and_old_token_dies() {
    let ctx = TestContext::new();
    ctx.register(1, Role::Customer, "vera", "latte-art-9000");
    let pair = ctx
        .platform
        .authenticate(&credentials("vera", "latte-art-9000"))
        .await
        .expect("authenticate");

    let next = ctx.platform.refresh(&pair.refresh_token).await.expect("refresh");
    assert_ne!(next.refresh_token, pair.refresh_token);
    ctx.platform
        .verify(&next.access_token)
        .await
        .expect("new access token verifies");

    // The exchanged token is single use.
    let replay = ctx.platform.refresh(&pair.refresh_token).await;
    assert!(matches!(replay, Err(CoreError::Unauthorized)));
}

#[tokio::test]
async fn test_replay_revokes_whole_lineage() {
    let ctx = TestContext::new();
    ctx.register(1, Role::Customer, "vera", "latte-art-9000");
    let pair = ctx
        .platform
        .authenticate(&credentials("vera", "latte-art-9000"))
        .await
        .expect("authenticate");

    let next = ctx.platform.refresh(&pair.refresh_token).await.expect("refresh");
    let _ = ctx.platform.refresh(&pair.refresh_token).await;

    // The replay took down the live successor too.
    let result = ctx.platform.refresh(&next.refresh_token).await;
    assert!(matches!(result, Err(CoreError::Unauthorized)));
}

// =============================================================================
// Logout
// =============================================================================

#[tokio::test]
async fn test_logout_revokes_both_tokens() {
    let ctx = TestContext::new();
    ctx.register(1, Role::Customer, "vera", "latte-art-9000");
    let pair = ctx
        .platform
        .authenticate(&credentials("vera", "latte-art-9000"))
        .await
        .expect("authenticate");

    ctx.platform
        .logout(&pair.access_token, &pair.refresh_token)
        .await
        .expect("logout");

    let verify = ctx.platform.verify(&pair.access_token).await;
    assert!(matches!(verify, Err(CoreError::Unauthorized)));
    let refresh = ctx.platform.refresh(&pair.refresh_token).await;
    assert!(matches!(refresh, Err(CoreError::Unauthorized)));
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let ctx = TestContext::new();
    ctx.register(1, Role::Customer, "vera", "latte-art-9000");
    let pair = ctx
        .platform
        .authenticate(&credentials("vera", "latte-art-9000"))
        .await
        .expect("authenticate");

    ctx.platform
        .logout(&pair.access_token, &pair.refresh_token)
        .await
        .expect("first logout");
    ctx.platform
        .logout(&pair.access_token, &pair.refresh_token)
        .await
        .expect("second logout");
}
