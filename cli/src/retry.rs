//! Reconnect-once policy for consumers of a credential.
//!
//! Gateways that hold a connection (IMAP sessions, REST clients) wrap each
//! operation in [`with_reconnect`] instead of catching transport errors ad hoc.

use std::future::Future;

use crate::error::Result;

/// Run `op`; on a retriable failure run `reconnect` once and then `op` again.
///
/// Non-retriable errors are returned immediately. The second attempt's result
/// is returned as is, so an operation is tried at most twice.
#[cfg_attr(not(test), allow(dead_code))]
pub async fn with_reconnect<T, Op, OpFut, Rc, RcFut>(mut op: Op, mut reconnect: Rc) -> Result<T>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T>>,
    Rc: FnMut() -> RcFut,
    RcFut: Future<Output = Result<()>>,
{
    match op().await {
        Err(e) if e.is_retriable() => {
            tracing::info!("Connection lost ({e}), reconnecting...");
            reconnect().await?;
            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::error::AuthError;

    #[tokio::test]
    async fn success_skips_reconnect() {
        let reconnects = Cell::new(0);
        let result = with_reconnect(
            || async { Ok(7) },
            || {
                reconnects.set(reconnects.get() + 1);
                async { Ok(()) }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(reconnects.get(), 0);
    }

    #[tokio::test]
    async fn transport_error_reconnects_and_retries_once() {
        let attempts = Cell::new(0);
        let reconnects = Cell::new(0);
        let result = with_reconnect(
            || {
                attempts.set(attempts.get() + 1);
                let n = attempts.get();
                async move {
                    if n == 1 {
                        Err(AuthError::Network("connection reset".to_string()))
                    } else {
                        Ok("listed")
                    }
                }
            },
            || {
                reconnects.set(reconnects.get() + 1);
                async { Ok(()) }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "listed");
        assert_eq!(attempts.get(), 2);
        assert_eq!(reconnects.get(), 1);
    }

    #[tokio::test]
    async fn second_failure_is_returned() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_reconnect(
            || {
                attempts.set(attempts.get() + 1);
                async { Err(AuthError::Timeout) }
            },
            || async { Ok(()) },
        )
        .await;

        assert!(matches!(result, Err(AuthError::Timeout)));
        assert_eq!(attempts.get(), 2);
    }

    #[tokio::test]
    async fn terminal_error_is_not_retried() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_reconnect(
            || {
                attempts.set(attempts.get() + 1);
                async {
                    Err(AuthError::NotAuthenticated {
                        account: "a".to_string(),
                    })
                }
            },
            || async { panic!("must not reconnect") },
        )
        .await;

        assert!(matches!(result, Err(AuthError::NotAuthenticated { .. })));
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test]
    async fn failed_reconnect_is_returned() {
        let result: Result<()> = with_reconnect(
            || async { Err(AuthError::Network("down".to_string())) },
            || async { Err(AuthError::Timeout) },
        )
        .await;

        assert!(matches!(result, Err(AuthError::Timeout)));
    }
}
