//! `MessageOracle`: one expectation slot, fed by observations.

use std::future::Future;
use std::time::Duration;

use chat_core::Bag;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::canonical::Delivery;
use crate::error::OracleError;

/// Signal from `observe` to the waiting `expect`.
#[derive(Debug)]
enum Progress {
    /// One expected delivery arrived at this instant.
    Matched(Instant),
    Complete,
    Unexpected(String),
    /// A delivery arrived after the window had already closed.
    Expired,
}

struct Pending {
    generation: u64,
    bag: Bag<String>,
    timeout: Duration,
    /// Arming time or last match, plus `timeout`.
    deadline: Instant,
    progress: mpsc::UnboundedSender<Progress>,
}

impl Pending {
    fn remaining(&self) -> Vec<String> {
        self.bag.iter().cloned().collect()
    }
}

#[derive(Default)]
struct OracleState {
    pending: Option<Pending>,
    /// First delivery seen while nothing was armed.
    stray: Option<OracleError>,
    generations: u64,
}

/// Checks that broadcast deliveries match what a test expects.
#[derive(Default)]
pub struct MessageOracle {
    state: Mutex<OracleState>,
}

/// Clears the slot when the waiting future finishes or is dropped.
struct Disarm<'a> {
    state: &'a Mutex<OracleState>,
    generation: u64,
}

impl Drop for Disarm<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        // A completed expectation may already have been replaced.
        if state.pending.as_ref().is_some_and(|p| p.generation == self.generation) {
            state.pending = None;
        }
    }
}

impl MessageOracle {
    /// An oracle with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm an expectation for `expected` (a multiset, any order).
    ///
    /// The slot and its window are armed before this returns: deliveries
    /// observed before the future is first polled still count, and so does
    /// silence. The future fails with [`OracleError::Timeout`] once `timeout`
    /// passes without a match; every match restarts the window.
    pub fn expect<I>(
        &self,
        timeout: Duration,
        expected: I,
    ) -> impl Future<Output = Result<(), OracleError>> + '_
    where
        I: IntoIterator<Item = Delivery>,
    {
        let armed = self.arm(timeout, expected);
        async move {
            let Some((mut progress, mut deadline, _disarm)) = armed? else {
                return Ok(());
            };
            loop {
                match tokio::time::timeout_at(deadline, progress.recv()).await {
                    Ok(Some(Progress::Matched(at))) => deadline = at + timeout,
                    Ok(Some(Progress::Complete) | None) => return Ok(()),
                    Ok(Some(Progress::Unexpected(delivery))) => {
                        return Err(OracleError::Unexpected {
                            delivery,
                            remaining: self.remaining(),
                        });
                    }
                    Ok(Some(Progress::Expired)) | Err(_) => {
                        let remaining = self.remaining();
                        warn!(outstanding = remaining.len(), ?timeout, "expectation timed out");
                        return Err(OracleError::Timeout { timeout, remaining });
                    }
                }
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn arm<I>(
        &self,
        timeout: Duration,
        expected: I,
    ) -> Result<Option<(mpsc::UnboundedReceiver<Progress>, Instant, Disarm<'_>)>, OracleError>
    where
        I: IntoIterator<Item = Delivery>,
    {
        let mut state = self.state.lock();
        if let Some(stray) = state.stray.take() {
            return Err(stray);
        }
        if state.pending.is_some() {
            return Err(OracleError::AlreadyActive);
        }
        let bag: Bag<String> = expected.into_iter().map(|d| d.canonical()).collect();
        if bag.is_empty() {
            return Ok(None);
        }
        debug!(expected = bag.len(), distinct = bag.distinct(), "expectation armed");
        state.generations += 1;
        let generation = state.generations;
        let deadline = Instant::now() + timeout;
        let (tx, rx) = mpsc::unbounded_channel();
        state.pending = Some(Pending {
            generation,
            bag,
            timeout,
            deadline,
            progress: tx,
        });
        let disarm = Disarm {
            state: &self.state,
            generation,
        };
        Ok(Some((rx, deadline, disarm)))
    }

    /// Feed one delivery to the armed expectation.
    ///
    /// Returns the violation, if any; the waiting `expect` sees it too.
    pub fn observe(&self, delivery: &Delivery) -> Result<(), OracleError> {
        let key = delivery.canonical();
        let mut state = self.state.lock();

        let Some(pending) = state.pending.as_mut() else {
            error!(delivery = %key, "no messages expected at this point");
            let err = OracleError::NoActiveExpectation { delivery: key };
            if state.stray.is_none() {
                state.stray = Some(err.clone());
            }
            return Err(err);
        };

        let now = Instant::now();
        if now >= pending.deadline {
            warn!(delivery = %key, "delivery arrived after the window closed");
            let _ = pending.progress.send(Progress::Expired);
            return Err(OracleError::Timeout {
                timeout: pending.timeout,
                remaining: pending.remaining(),
            });
        }

        if !pending.bag.remove(&key) {
            warn!(delivery = %key, "unexpected message");
            let _ = pending.progress.send(Progress::Unexpected(key.clone()));
            return Err(OracleError::Unexpected {
                delivery: key,
                remaining: pending.remaining(),
            });
        }

        let complete = pending.bag.is_empty();
        debug!(delivery = %key, outstanding = pending.bag.len(), "expected message arrived");
        let signal = if complete {
            Progress::Complete
        } else {
            pending.deadline = now + pending.timeout;
            Progress::Matched(now)
        };
        let _ = pending.progress.send(signal);
        if complete {
            state.pending = None;
        }
        Ok(())
    }

    /// Convenience for `observe(&Delivery::new(client, msg)?)`.
    pub fn observe_message(
        &self,
        client: impl serde::Serialize,
        msg: impl serde::Serialize,
    ) -> Result<(), OracleError> {
        self.observe(&Delivery::new(client, msg)?)
    }

    /// Whether an expectation is waiting.
    pub fn is_armed(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Unmet deliveries of the armed expectation, one entry per count.
    pub fn remaining(&self) -> Vec<String> {
        self.state
            .lock()
            .pending
            .as_ref()
            .map(Pending::remaining)
            .unwrap_or_default()
    }

    /// Surface a delivery that arrived while nothing was expected.
    pub fn check_quiet(&self) -> Result<(), OracleError> {
        match self.state.lock().stray.take() {
            Some(stray) => Err(stray),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chat_core::ChatMessage;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_millis(1000);

    fn d(client: &str, text: &str) -> Delivery {
        Delivery::new(client, ChatMessage::new("nick", text)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn any_arrival_order_satisfies() {
        let oracle = MessageOracle::new();
        let wait = oracle.expect(WINDOW, [d("a", "x"), d("b", "x"), d("a", "y")]);
        oracle.observe(&d("a", "y")).unwrap();
        oracle.observe(&d("b", "x")).unwrap();
        oracle.observe(&d("a", "x")).unwrap();
        wait.await.unwrap();
        assert!(!oracle.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicates_must_arrive_as_often_as_expected() {
        let oracle = MessageOracle::new();
        let wait = oracle.expect(WINDOW, [d("a", "x"), d("a", "x")]);
        oracle.observe(&d("a", "x")).unwrap();
        assert_eq!(oracle.remaining(), vec![d("a", "x").canonical()]);
        oracle.observe(&d("a", "x")).unwrap();
        wait.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn window_rolls_with_each_match() {
        let oracle = Arc::new(MessageOracle::new());
        let wait = oracle.expect(WINDOW, [d("a", "1"), d("a", "2"), d("a", "3")]);

        let feeder = Arc::clone(&oracle);
        let _ = tokio::spawn(async move {
            for text in ["1", "2", "3"] {
                tokio::time::sleep(Duration::from_millis(900)).await;
                feeder.observe(&d("a", text)).unwrap();
            }
        });

        let start = Instant::now();
        wait.await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(2700));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_after_partial_progress_times_out() {
        let oracle = Arc::new(MessageOracle::new());
        let wait = oracle.expect(WINDOW, [d("a", "1"), d("b", "1"), d("c", "1")]);

        let feeder = Arc::clone(&oracle);
        let _ = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            feeder.observe(&d("b", "1")).unwrap();
        });

        let err = wait.await.unwrap_err();
        assert_matches!(
            &err,
            OracleError::Timeout { timeout, remaining }
                if *timeout == WINDOW && remaining.len() == 2
        );
        assert!(err.to_string().contains(&d("a", "1").canonical()));
        assert!(!oracle.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_at_all_times_out_after_one_window() {
        let oracle = MessageOracle::new();
        let start = Instant::now();
        let err = oracle.expect(WINDOW, [d("a", "1")]).await.unwrap_err();
        assert_matches!(err, OracleError::Timeout { .. });
        assert!(start.elapsed() >= WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn window_starts_when_expect_is_called() {
        let oracle = MessageOracle::new();
        let wait = oracle.expect(WINDOW, [d("a", "1")]);
        tokio::time::sleep(WINDOW * 5).await;

        let late = oracle.observe(&d("a", "1")).unwrap_err();
        assert_matches!(late, OracleError::Timeout { .. });
        assert_matches!(
            wait.await,
            Err(OracleError::Timeout { timeout, remaining })
                if timeout == WINDOW && remaining == vec![d("a", "1").canonical()]
        );
        assert!(!oracle.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn silence_before_first_poll_times_out() {
        let oracle = MessageOracle::new();
        let wait = oracle.expect(WINDOW, [d("a", "1"), d("b", "1")]);
        tokio::time::sleep(WINDOW + Duration::from_millis(1)).await;

        let start = Instant::now();
        let err = wait.await.unwrap_err();
        assert!(start.elapsed() < WINDOW);
        assert_matches!(err, OracleError::Timeout { remaining, .. } if remaining.len() == 2);
    }

    #[tokio::test(start_paused = true)]
    async fn matches_before_first_poll_roll_the_window() {
        let oracle = MessageOracle::new();
        let wait = oracle.expect(WINDOW, [d("a", "1"), d("a", "2")]);
        tokio::time::sleep(Duration::from_millis(800)).await;
        oracle.observe(&d("a", "1")).unwrap();
        tokio::time::sleep(Duration::from_millis(800)).await;
        oracle.observe(&d("a", "2")).unwrap();
        wait.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_delivery_fails_immediately() {
        let oracle = MessageOracle::new();
        let wait = oracle.expect(Duration::from_secs(3600), [d("a", "1"), d("b", "1")]);
        oracle.observe(&d("a", "1")).unwrap();
        let stray = oracle.observe(&d("a", "nope")).unwrap_err();
        assert_matches!(stray, OracleError::Unexpected { .. });

        let start = Instant::now();
        let err = wait.await.unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_matches!(
            err,
            OracleError::Unexpected { delivery, remaining }
                if delivery == d("a", "nope").canonical()
                    && remaining == vec![d("b", "1").canonical()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn extra_copy_of_an_expected_delivery_is_unexpected() {
        let oracle = MessageOracle::new();
        let wait = oracle.expect(WINDOW, [d("a", "1"), d("b", "1")]);
        oracle.observe(&d("a", "1")).unwrap();
        assert_matches!(
            oracle.observe(&d("a", "1")),
            Err(OracleError::Unexpected { .. })
        );
        assert_matches!(wait.await, Err(OracleError::Unexpected { .. }));
    }

    #[tokio::test]
    async fn only_one_expectation_at_a_time() {
        let oracle = MessageOracle::new();
        let _first = oracle.expect(WINDOW, [d("a", "1")]);
        assert_matches!(
            oracle.expect(WINDOW, [d("b", "1")]).await,
            Err(OracleError::AlreadyActive)
        );
        assert!(oracle.is_armed());
    }

    #[tokio::test]
    async fn empty_expectation_resolves_at_once() {
        let oracle = MessageOracle::new();
        oracle.expect(WINDOW, Vec::new()).await.unwrap();
        assert!(!oracle.is_armed());
    }

    #[tokio::test]
    async fn finished_future_does_not_disarm_its_successor() {
        let oracle = MessageOracle::new();
        let first = oracle.expect(WINDOW, [d("a", "1")]);
        oracle.observe(&d("a", "1")).unwrap();
        let second = oracle.expect(WINDOW, [d("a", "2")]);
        first.await.unwrap();
        assert!(oracle.is_armed());
        oracle.observe(&d("a", "2")).unwrap();
        second.await.unwrap();
    }

    #[tokio::test]
    async fn dropping_the_future_disarms() {
        let oracle = MessageOracle::new();
        let wait = oracle.expect(WINDOW, [d("a", "1")]);
        assert!(oracle.is_armed());
        drop(wait);
        assert!(!oracle.is_armed());
        assert_matches!(
            oracle.observe(&d("a", "1")),
            Err(OracleError::NoActiveExpectation { .. })
        );
    }

    #[tokio::test]
    async fn stray_delivery_surfaces_on_next_expect() {
        let oracle = MessageOracle::new();
        assert_matches!(
            oracle.observe_message("a", ChatMessage::new("n", "early")),
            Err(OracleError::NoActiveExpectation { .. })
        );
        assert_matches!(
            oracle.expect(WINDOW, [d("a", "1")]).await,
            Err(OracleError::NoActiveExpectation { .. })
        );
        // Reported once.
        oracle.check_quiet().unwrap();
    }

    #[test]
    fn check_quiet_reports_stray_delivery() {
        let oracle = MessageOracle::new();
        oracle.check_quiet().unwrap();
        let _ = oracle.observe(&d("a", "1"));
        let _ = oracle.observe(&d("a", "2"));
        assert_matches!(
            oracle.check_quiet(),
            Err(OracleError::NoActiveExpectation { delivery }) if delivery == d("a", "1").canonical()
        );
        oracle.check_quiet().unwrap();
    }
}
