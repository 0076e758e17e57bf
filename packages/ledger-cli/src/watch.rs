//! Foreground mode that follows the stored session
//!
//! Prints a line whenever another process logs in or out against the same
//! preference storage. Stops on SIGTERM/SIGINT.

use anyhow::{Context, Result};
use futures::StreamExt;
use ledger_core::auth::{self, Credential, Session};

/// Follow credential changes until interrupted
pub async fn run_watch(session: &Session) -> Result<()> {
    let mut changes = session.credentials().observe();
    let mut last: Option<Option<String>> = None;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tracing::info!("Watching session changes, press Ctrl+C to stop");

    loop {
        tokio::select! {
            next = changes.next() => {
                let Some(item) = next else {
                    break;
                };
                let credential = item.context("Failed to read stored session")?;
                let user = describe(credential.as_ref());

                // The store only notifies on change, but a token swap for
                // the same user still reads the same here
                if last.as_ref() == Some(&user) {
                    tracing::debug!("Session updated, same user");
                    continue;
                }

                match &user {
                    Some(name) => println!("Logged in: {}", name),
                    None => println!("Logged out"),
                }
                last = Some(user);
            }
            _ = &mut shutdown => {
                tracing::info!("Stopping session watch");
                break;
            }
        }
    }

    Ok(())
}

fn describe(credential: Option<&Credential>) -> Option<String> {
    credential.map(|c| auth::token::subject(&c.token).unwrap_or_else(|| auth::UNKNOWN_USER.to_string()))
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C"),
                }
                return;
            }
            Err(e) => tracing::warn!("Failed to register SIGTERM handler: {}", e),
        }
    }

    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl+C");
    }
}
