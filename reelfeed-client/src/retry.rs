/* This file is part of the ReelFeed client libraries
*
*  Copyright (C) 2025 mini_bomba
*
*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Affero General Public License as published by
*  the Free Software Foundation, either version 3 of the License, or
*  (at your option) any later version.
*
*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Affero General Public License for more details.
*
*  You should have received a copy of the GNU Affero General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::{future::Future, time::Duration};

use log::debug;
use tokio::time::{sleep, timeout};

use crate::errors::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// total number of attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// deadline applied to each attempt separately
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            timeout: crate::constants::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) attempt failed
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Runs `f` until it succeeds or runs out of attempts
///
/// Every failure is retried, whatever its kind. Each attempt is bounded by `policy.timeout`.
/// After attempt `n` fails, the next one starts `policy.base_delay * n` later. Once attempts are
/// exhausted a timeout is reported as [`Error::Timeout`], anything else as
/// [`Error::RequestFailed`] wrapping the last failure. Use [`Error::root`] to get at it.
pub async fn request<F, Fut, R>(policy: &RetryPolicy, mut f: F) -> Result<R, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, Error>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let error = match timeout(policy.timeout, f()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(error)) => error,
            Err(..) => Error::Timeout,
        };

        if attempt >= max_attempts {
            return Err(match error {
                Error::Timeout => Error::Timeout,
                last => Error::RequestFailed { attempts: attempt, last: Box::new(last) },
            });
        }

        let delay = policy.delay_after_attempt(attempt);
        debug!("Attempt {attempt}/{max_attempts} failed ({error}), retrying in {delay:?}");
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use cloneable_errors::anyhow;
    use rstest::rstest;
    use tokio::time::Instant;

    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            timeout: Duration::from_secs(1),
        }
    }

    fn server_error() -> Error {
        Error::ServerError { status: 502, message: None }
    }

    #[tokio::test(start_paused = true)]
    async fn fails_twice_then_succeeds() {
        let calls = Rc::new(Cell::new(0));
        let started = Instant::now();
        let result = request(&policy(3), || {
            let calls = calls.clone();
            async move {
                calls.set(calls.get() + 1);
                if calls.get() < 3 { Err(server_error()) } else { Ok("ok") }
            }
        }).await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.get(), 3);
        // 100ms after the first failure, 200ms after the second
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(400), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = Rc::new(Cell::new(0));
        let result: Result<(), Error> = request(&policy(2), || {
            let calls = calls.clone();
            async move {
                calls.set(calls.get() + 1);
                Err(server_error())
            }
        }).await;

        assert_eq!(calls.get(), 2);
        match result {
            Err(Error::RequestFailed { attempts: 2, last }) => assert!(matches!(*last, Error::ServerError { status: 502, .. })),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_timeouts_surface_as_timeout() {
        let calls = Rc::new(Cell::new(0));
        let result: Result<(), Error> = request(&policy(2), || {
            let calls = calls.clone();
            async move {
                calls.set(calls.get() + 1);
                sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }).await;

        assert_eq!(calls.get(), 2);
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[rstest]
    #[case(Error::NotFound)]
    #[case(Error::NotAuthenticated)]
    #[case(Error::ServerError { status: 400, message: None })]
    #[case(Error::ServerError { status: 403, message: Some("banned".into()) })]
    #[case(Error::Decode(anyhow!("missing field {}", "_id")))]
    #[tokio::test(start_paused = true)]
    async fn client_errors_use_every_attempt(#[case] error: Error) {
        let calls = Rc::new(Cell::new(0));
        let started = Instant::now();
        let result: Result<(), Error> = request(&policy(3), || {
            let calls = calls.clone();
            let error = error.clone();
            async move {
                calls.set(calls.get() + 1);
                Err(error)
            }
        }).await;

        assert_eq!(calls.get(), 3);
        assert!(started.elapsed() >= Duration::from_millis(300));
        match result {
            Err(Error::RequestFailed { attempts: 3, last }) => assert_eq!(last.to_string(), error.to_string()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_not_found_is_still_recognizable() {
        let result: Result<(), Error> = request(&policy(2), || async { Err(Error::NotFound) }).await;
        let err = result.unwrap_err();
        assert!(matches!(err, Error::RequestFailed { attempts: 2, .. }), "{err:?}");
        assert!(err.is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let calls = Rc::new(Cell::new(0));
        let result = request(&policy(0), || {
            let calls = calls.clone();
            async move {
                calls.set(calls.get() + 1);
                Ok::<_, Error>(calls.get())
            }
        }).await;
        assert_eq!(result.unwrap(), 1);
    }

    #[test]
    fn delay_grows_linearly() {
        let policy = policy(4);
        assert_eq!(policy.delay_after_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after_attempt(3), Duration::from_millis(300));
    }
}
