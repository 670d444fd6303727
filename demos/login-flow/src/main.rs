//! Walks through a multi-device login, refresh and kick-out, printing
//! each response envelope as JSON.
//!
//! ```text
//! KEYWARD_SIGNING_KEY=$(openssl rand -hex 32) cargo run -p login-flow
//! ```

use std::sync::Arc;

use keyward::prelude::*;
use serde::Serialize;

type Service = SessionService<MemorySessionStore, MemoryDirectory>;

fn show<T: Serialize>(step: &str, res: &ApiResult<T>) -> Result<(), KeywardError> {
    let bytes = JsonCodec.encode(res)?;
    println!("{step:>22}: {}", String::from_utf8_lossy(&bytes));
    Ok(())
}

async fn run_scenario(svc: &Service) -> Result<(), KeywardError> {
    // alice on one phone
    let login = svc
        .create_session(UserId(42), "iPhone", "1.2.3.4", "Safari", Some("demo-1"))
        .await;
    show("create_session", &login)?;
    let Some(alice) = login.data else {
        tracing::error!(reason = %login.message, "login failed, stopping the walkthrough");
        return Ok(());
    };

    show(
        "validate_session",
        &svc.validate_session(alice.session_id.as_str(), Some("demo-2")).await,
    )?;
    show("get_online_users", &svc.get_online_users(Some("demo-3")).await)?;

    let refresh_token = alice.refresh_token.unwrap_or_default();
    show(
        "refresh_token",
        &svc.refresh_token(&refresh_token, "iPhone", Some("demo-4")).await,
    )?;
    show(
        "refresh_token (replay)",
        &svc.refresh_token(&refresh_token, "iPhone", Some("demo-5")).await,
    )?;

    show(
        "kick_out_device",
        &svc.kick_out_device(UserId(42), "iPhone", Some("demo-6")).await,
    )?;
    show("is_user_online", &svc.is_user_online(UserId(42), Some("demo-7")).await)?;

    // bob on two devices
    for device in ["A", "B"] {
        let login = svc
            .create_session(UserId(7), device, "5.6.7.8", "Firefox", None)
            .await;
        show("create_session", &login)?;
    }
    show("get_user_sessions", &svc.get_user_sessions(UserId(7), None).await)?;
    show("kick_out_user", &svc.kick_out_user(UserId(7), None).await)?;
    show("get_user_sessions", &svc.get_user_sessions(UserId(7), None).await)?;
    show(
        "clean_expired_sessions",
        &svc.clean_expired_sessions(None).await,
    )?;
    Ok(())
}

fn directory() -> MemoryDirectory {
    MemoryDirectory::new()
        .with_user(UserId(42), "alice")
        .with_user(UserId(7), "bob")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    keyward::init_tracing();

    let config = KeywardConfig::from_env()?;
    let service = SessionService::from_config(
        config,
        Arc::new(MemorySessionStore::new()),
        directory(),
    )?;
    let sweeper = service.spawn_sweeper();

    run_scenario(&service).await?;

    let metrics = sweeper.shutdown().await;
    tracing::info!(passes = metrics.passes, removed = metrics.removed, "demo finished");
    Ok(())
}
