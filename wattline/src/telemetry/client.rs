//! The live telemetry client: owns one transport session and one reconnect
//! timer, feeds transport events through [`Link`] and notifies observers.
//!
//! All control calls are synchronous and return immediately; effects show up
//! through the observers while the owning task awaits [`TelemetryClient::next_event`].
//! Control calls and `next_event` must run inside a tokio runtime.

use std::{pin::Pin, sync::Arc, time::Duration};

use futures_util::StreamExt;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{sleep, Sleep},
};
use tracing::{debug, info, trace, warn};

use crate::types::Reading;

use super::{
    codec,
    error::TelemetryError,
    machine::{Effect, Input, Link},
    state::{ConnectionState, ErrorReason},
    transport::{Connector, TransportEvent},
    RECONNECT_DELAY,
};

type ReadingObserver = Box<dyn FnMut(&Reading) + Send>;
type StateObserver = Box<dyn FnMut(&ConnectionState) + Send>;

#[derive(Debug)]
enum SessionEvent {
    Opened,
    Frame(Vec<u8>),
    Failed(TelemetryError),
}

// Aborts the reader task on drop, which drops the socket with it.
struct Session {
    id: u64,
    task: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Wake {
    Session(u64, SessionEvent),
    Timer,
}

pub struct TelemetryClient<C: Connector> {
    connector: Arc<C>,
    url: String,
    reconnect_delay: Duration,
    link: Link,
    reading: Option<Reading>,
    session: Option<Session>,
    next_session_id: u64,
    timer: Option<Pin<Box<Sleep>>>,
    events_tx: mpsc::UnboundedSender<(u64, SessionEvent)>,
    events_rx: mpsc::UnboundedReceiver<(u64, SessionEvent)>,
    reading_observers: Vec<ReadingObserver>,
    state_observers: Vec<StateObserver>,
}

impl<C: Connector> TelemetryClient<C> {
    pub fn new(connector: C, url: impl Into<String>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connector: Arc::new(connector),
            url: url.into(),
            reconnect_delay: RECONNECT_DELAY,
            link: Link::new(),
            reading: None,
            session: None,
            next_session_id: 0,
            timer: None,
            events_tx,
            events_rx,
            reading_observers: Vec::new(),
            state_observers: Vec::new(),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn on_reading(&mut self, f: impl FnMut(&Reading) + Send + 'static) {
        self.reading_observers.push(Box::new(f));
    }

    pub fn on_state_change(&mut self, f: impl FnMut(&ConnectionState) + Send + 'static) {
        self.state_observers.push(Box::new(f));
    }

    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn reading(&self) -> Option<&Reading> {
        self.reading.as_ref()
    }

    /// Number of transports owned right now (0 or 1).
    pub fn live_transports(&self) -> usize {
        usize::from(self.session.is_some())
    }

    /// Number of reconnect timers pending right now (0 or 1).
    pub fn pending_timers(&self) -> usize {
        usize::from(self.timer.is_some())
    }

    /// Opens a transport unless one is already connecting or connected.
    pub fn start(&mut self) {
        self.feed(Input::Start);
    }

    /// Closes the transport and cancels the reconnect timer.
    ///
    /// Nothing is published; [`state`](Self::state) keeps reporting the last
    /// published state until the next `start` or `reconnect`.
    pub fn stop(&mut self) {
        self.feed(Input::Stop);
    }

    /// Drops whatever is live and connects again now, skipping the backoff.
    pub fn reconnect(&mut self) {
        info!(url = %self.url, "manual reconnect");
        self.feed(Input::Reconnect);
    }

    /// Waits for the next transport event or timer expiry and processes it.
    ///
    /// Cancel-safe; pends forever while stopped.
    pub async fn next_event(&mut self) {
        let wake = tokio::select! {
            Some((id, ev)) = self.events_rx.recv() => Wake::Session(id, ev),
            () = wait_timer(&mut self.timer) => Wake::Timer,
        };
        match wake {
            Wake::Session(id, ev) => self.on_session_event(id, ev),
            Wake::Timer => {
                self.timer = None;
                debug!("reconnect timer elapsed");
                self.feed(Input::TimerElapsed);
            }
        }
    }

    fn on_session_event(&mut self, id: u64, ev: SessionEvent) {
        if self.session.as_ref().map(|s| s.id) != Some(id) {
            trace!(session = id, ?ev, "dropping event from stale session");
            return;
        }
        let input = match ev {
            SessionEvent::Opened => {
                info!(url = %self.url, "connected");
                Input::Opened
            }
            SessionEvent::Frame(bytes) => match codec::decode(&bytes) {
                Ok(reading) => Input::Frame(reading),
                Err(e) => self.failed(e),
            },
            SessionEvent::Failed(e) => self.failed(e),
        };
        self.feed(input);
    }

    fn failed(&mut self, err: TelemetryError) -> Input {
        match err.reason() {
            ErrorReason::DecodeFailure => {
                warn!(error = %err, "dropping malformed frame");
                Input::DecodeFailed
            }
            ErrorReason::TransportError => {
                warn!(error = %err, "transport error");
                Input::TransportError
            }
            ErrorReason::ConnectionLost => {
                info!(url = %self.url, "connection closed");
                self.session = None;
                Input::Closed
            }
            ErrorReason::OpenFailure => {
                warn!(url = %self.url, error = %err, "connect failed");
                self.session = None;
                Input::OpenFailed
            }
        }
    }

    fn feed(&mut self, input: Input) {
        for effect in self.link.handle(input) {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Open => {
                let id = self.next_session_id;
                self.next_session_id += 1;
                debug!(session = id, url = %self.url, "opening transport");
                let task = tokio::spawn(run_session(
                    Arc::clone(&self.connector),
                    self.url.clone(),
                    id,
                    self.events_tx.clone(),
                ));
                self.session = Some(Session { id, task });
            }
            Effect::CloseTransport => {
                if let Some(s) = self.session.take() {
                    debug!(session = s.id, "closing transport");
                }
            }
            Effect::ArmTimer => {
                debug!(delay = ?self.reconnect_delay, "reconnect scheduled");
                self.timer = Some(Box::pin(sleep(self.reconnect_delay)));
            }
            Effect::CancelTimer => {
                self.timer = None;
            }
            Effect::Publish(state) => {
                for observer in self.state_observers.iter_mut() {
                    observer(&state);
                }
            }
            Effect::Deliver(reading) => {
                let reading = self.reading.insert(reading);
                for observer in self.reading_observers.iter_mut() {
                    observer(reading);
                }
            }
        }
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(t) => t.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn run_session<C: Connector>(
    connector: Arc<C>,
    url: String,
    id: u64,
    tx: mpsc::UnboundedSender<(u64, SessionEvent)>,
) {
    let mut stream = match connector.connect(&url).await {
        Ok(s) => s,
        Err(e) => {
            let _ = tx.send((id, SessionEvent::Failed(e)));
            return;
        }
    };
    if tx.send((id, SessionEvent::Opened)).is_err() {
        return;
    }
    while let Some(ev) = stream.next().await {
        let ev = match ev {
            TransportEvent::Text(text) => SessionEvent::Frame(text.into_bytes()),
            TransportEvent::Binary(bytes) => SessionEvent::Frame(bytes),
            TransportEvent::Error(e) => SessionEvent::Failed(TelemetryError::Transport(e)),
        };
        if tx.send((id, ev)).is_err() {
            return;
        }
    }
    let _ = tx.send((id, SessionEvent::Failed(TelemetryError::Closed)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::transport::TransportStream;
    use async_trait::async_trait;
    use futures_util::stream;
    use std::{
        collections::VecDeque,
        sync::Mutex,
    };

    const FRAME: &str = r#"{"id":"H1","currentProduction":500,"currentConsumption":300,"batteryLevel":80,"donateEnabled":true}"#;

    #[derive(Default)]
    struct Inner {
        attempts: usize,
        refuse: VecDeque<bool>,
        feeds: Vec<Option<mpsc::UnboundedSender<TransportEvent>>>,
    }

    /// In-memory connector; each successful connect gets a feed the test drives.
    #[derive(Clone, Default)]
    struct MockConnector(Arc<Mutex<Inner>>);

    impl MockConnector {
        fn attempts(&self) -> usize {
            self.0.lock().unwrap().attempts
        }

        fn refuse_next(&self) {
            self.0.lock().unwrap().refuse.push_back(true);
        }

        fn send(&self, session: usize, ev: TransportEvent) {
            let inner = self.0.lock().unwrap();
            if let Some(Some(tx)) = inner.feeds.get(session) {
                let _ = tx.send(ev);
            }
        }

        fn text(&self, session: usize, text: &str) {
            self.send(session, TransportEvent::Text(text.to_string()));
        }

        fn close(&self, session: usize) {
            self.0.lock().unwrap().feeds[session] = None;
        }

        fn feed_dropped(&self, session: usize) -> bool {
            match &self.0.lock().unwrap().feeds[session] {
                Some(tx) => tx.is_closed(),
                None => true,
            }
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self, _url: &str) -> Result<TransportStream, TelemetryError> {
            let mut inner = self.0.lock().unwrap();
            inner.attempts += 1;
            if inner.refuse.pop_front().unwrap_or(false) {
                inner.feeds.push(None);
                return Err(TelemetryError::Open("refused".into()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            inner.feeds.push(Some(tx));
            Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|ev| (ev, rx))
            })
            .boxed())
        }
    }

    type Log<T> = Arc<Mutex<Vec<T>>>;

    fn harness() -> (
        TelemetryClient<MockConnector>,
        MockConnector,
        Log<ConnectionState>,
        Log<Reading>,
    ) {
        let mock = MockConnector::default();
        let mut client = TelemetryClient::new(mock.clone(), "ws://test/");
        let states: Log<ConnectionState> = Arc::default();
        let readings: Log<Reading> = Arc::default();
        let s = Arc::clone(&states);
        client.on_state_change(move |st| s.lock().unwrap().push(*st));
        let r = Arc::clone(&readings);
        client.on_reading(move |rd| r.lock().unwrap().push(rd.clone()));
        (client, mock, states, readings)
    }

    fn last<T: Clone>(log: &Log<T>) -> Option<T> {
        log.lock().unwrap().last().cloned()
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_scenario() {
        let (mut client, mock, states, readings) = harness();
        client.start();
        assert_eq!(client.state(), ConnectionState::Connecting);
        client.next_event().await;
        assert_eq!(client.state(), ConnectionState::Connected);

        mock.text(0, FRAME);
        client.next_event().await;
        let expected = Reading::new("H1", 500.0, 300.0, 80.0, true).unwrap();
        assert_eq!(*readings.lock().unwrap(), vec![expected.clone()]);
        assert_eq!(client.reading(), Some(&expected));

        mock.close(0);
        client.next_event().await;
        assert_eq!(
            client.state(),
            ConnectionState::Errored(ErrorReason::ConnectionLost)
        );
        assert_eq!(client.pending_timers(), 1);
        assert_eq!(client.live_transports(), 0);
        assert_eq!(mock.attempts(), 1);

        let before = tokio::time::Instant::now();
        client.next_event().await;
        assert!(before.elapsed() >= RECONNECT_DELAY);
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert_eq!(client.pending_timers(), 0);
        client.next_event().await;
        assert_eq!(mock.attempts(), 2);
        assert_eq!(client.state(), ConnectionState::Connected);

        assert_eq!(
            *states.lock().unwrap(),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Errored(ErrorReason::ConnectionLost),
                ConnectionState::Connecting,
                ConnectionState::Connected,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frame_keeps_reading_and_connection() {
        let (mut client, mock, states, readings) = harness();
        client.start();
        client.next_event().await;
        mock.text(0, FRAME);
        client.next_event().await;

        mock.text(0, "{\"id\":\"H1\",\"currentProduction\":");
        client.next_event().await;
        assert_eq!(
            last(&states),
            Some(ConnectionState::Errored(ErrorReason::DecodeFailure))
        );
        assert_eq!(readings.lock().unwrap().len(), 1);
        assert_eq!(client.reading().map(Reading::id), Some("H1"));
        assert_eq!(client.live_transports(), 1);
        assert_eq!(client.pending_timers(), 0);
        assert!(!mock.feed_dropped(0));
    }

    #[tokio::test(start_paused = true)]
    async fn binary_frames_decode_like_text() {
        let (mut client, mock, states, readings) = harness();
        client.start();
        client.next_event().await;

        mock.send(0, TransportEvent::Binary(FRAME.as_bytes().to_vec()));
        client.next_event().await;
        assert_eq!(readings.lock().unwrap().len(), 1);

        mock.send(0, TransportEvent::Binary(vec![0xff, 0xfe, 0x00]));
        client.next_event().await;
        assert_eq!(
            last(&states),
            Some(ConnectionState::Errored(ErrorReason::DecodeFailure))
        );
        assert_eq!(readings.lock().unwrap().len(), 1);
        assert_eq!(client.live_transports(), 1);
        assert_eq!(client.pending_timers(), 0);

        // A later good frame is delivered; the error stays shown until the next open.
        mock.text(0, FRAME);
        client.next_event().await;
        assert_eq!(readings.lock().unwrap().len(), 2);
        assert_eq!(
            client.state(),
            ConnectionState::Errored(ErrorReason::DecodeFailure)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_keeps_last_state_without_publishing() {
        let (mut client, _mock, states, _) = harness();
        client.start();
        client.next_event().await;
        let published = states.lock().unwrap().len();
        client.stop();
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(states.lock().unwrap().len(), published);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_is_reported_then_recovered() {
        let (mut client, mock, states, _) = harness();
        client.start();
        client.next_event().await;
        mock.send(0, TransportEvent::Error("reset by peer".into()));
        client.next_event().await;
        assert_eq!(
            last(&states),
            Some(ConnectionState::Errored(ErrorReason::TransportError))
        );
        mock.close(0);
        client.next_event().await;
        assert_eq!(client.pending_timers(), 1);
        client.next_event().await;
        client.next_event().await;
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(mock.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connection_retries_after_delay() {
        let (mut client, mock, states, _) = harness();
        mock.refuse_next();
        client.start();
        client.next_event().await;
        assert_eq!(
            last(&states),
            Some(ConnectionState::Errored(ErrorReason::OpenFailure))
        );
        assert_eq!(client.pending_timers(), 1);
        assert_eq!(client.live_transports(), 0);

        client.next_event().await; // timer
        client.next_event().await; // opened
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(mock.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let (mut client, mock, _, _) = harness();
        client.start();
        client.start();
        client.next_event().await;
        client.start();
        tokio::task::yield_now().await;
        assert_eq!(mock.attempts(), 1);
        assert_eq!(client.live_transports(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_while_errored_skips_backoff() {
        let (mut client, mock, _, _) = harness();
        client.start();
        client.next_event().await;
        mock.close(0);
        client.next_event().await;
        assert_eq!(client.pending_timers(), 1);

        let before = tokio::time::Instant::now();
        client.reconnect();
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert_eq!(client.pending_timers(), 0);
        assert_eq!(client.live_transports(), 1);
        client.next_event().await;
        assert_eq!(client.state(), ConnectionState::Connected);
        assert!(before.elapsed() < RECONNECT_DELAY);
        assert_eq!(mock.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_session_cannot_deliver() {
        let (mut client, mock, _, readings) = harness();
        client.start();
        client.next_event().await;
        mock.text(0, FRAME);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        // Session 0 has already forwarded its frame; the reconnect must make it stale.
        client.reconnect();
        client.next_event().await;
        client.next_event().await;
        assert_eq!(client.state(), ConnectionState::Connected);
        assert!(readings.lock().unwrap().is_empty());
        assert!(mock.feed_dropped(0));

        mock.text(1, FRAME);
        client.next_event().await;
        assert_eq!(readings.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_leaves_nothing_behind() {
        // connected
        let (mut client, mock, _, _) = harness();
        client.start();
        client.next_event().await;
        client.stop();
        assert_eq!((client.live_transports(), client.pending_timers()), (0, 0));
        tokio::task::yield_now().await;
        assert!(mock.feed_dropped(0));

        // waiting on the reconnect timer
        let (mut client, mock, _, _) = harness();
        client.start();
        client.next_event().await;
        mock.close(0);
        client.next_event().await;
        assert_eq!(client.pending_timers(), 1);
        client.stop();
        assert_eq!((client.live_transports(), client.pending_timers()), (0, 0));
        tokio::time::advance(RECONNECT_DELAY * 3).await;
        tokio::task::yield_now().await;
        assert_eq!(mock.attempts(), 1);

        // mid-connect
        let (mut client, _, _, _) = harness();
        client.start();
        client.stop();
        assert_eq!((client.live_transports(), client.pending_timers()), (0, 0));

        // never started
        let (mut client, _, _, _) = harness();
        client.stop();
        assert_eq!((client.live_transports(), client.pending_timers()), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop() {
        let (mut client, mock, _, _) = harness();
        client.start();
        client.next_event().await;
        client.stop();
        client.start();
        client.next_event().await;
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(mock.attempts(), 2);
        assert_eq!(client.live_transports(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_client_aborts_session() {
        let (mut client, mock, _, _) = harness();
        client.start();
        client.next_event().await;
        drop(client);
        tokio::task::yield_now().await;
        assert!(mock.feed_dropped(0));
    }
}
