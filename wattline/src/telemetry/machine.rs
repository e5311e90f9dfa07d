//! Connection state machine, free of I/O.
//!
//! `Connecting -> Connected -> Errored -> Connecting ...`, driven by discrete
//! transport events. The timer and the transport are tracked as flags here;
//! the driver owns the real resources and executes the returned [`Effect`]s
//! in order.

use crate::types::Reading;

use super::state::{ConnectionState, ErrorReason};

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Start,
    Stop,
    /// Manual request; bypasses the backoff delay.
    Reconnect,
    Opened,
    OpenFailed,
    Frame(Reading),
    DecodeFailed,
    TransportError,
    Closed,
    TimerElapsed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Open,
    CloseTransport,
    ArmTimer,
    CancelTimer,
    Publish(ConnectionState),
    Deliver(Reading),
}

#[derive(Debug)]
pub struct Link {
    state: ConnectionState,
    running: bool,
    transport_live: bool,
    timer_armed: bool,
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

impl Link {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            running: false,
            transport_live: false,
            timer_armed: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn transport_live(&self) -> bool {
        self.transport_live
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let mut fx = Vec::new();
        match input {
            Input::Start => {
                self.running = true;
                if !self.transport_live {
                    self.attempt(&mut fx);
                }
            }
            Input::Reconnect => {
                self.running = true;
                self.teardown(&mut fx);
                self.attempt(&mut fx);
            }
            Input::Stop => {
                self.teardown(&mut fx);
                self.running = false;
            }
            // Anything below is a transport or timer event; after stop they are stale.
            _ if !self.running => {}
            Input::TimerElapsed => {
                if self.timer_armed {
                    self.timer_armed = false;
                    self.attempt(&mut fx);
                }
            }
            Input::Opened => {
                if self.transport_live {
                    self.set(ConnectionState::Connected, &mut fx);
                }
            }
            // Delivery never changes the state; a decode error stays shown until the next open.
            Input::Frame(reading) => fx.push(Effect::Deliver(reading)),
            Input::DecodeFailed => {
                self.set(ConnectionState::Errored(ErrorReason::DecodeFailure), &mut fx);
            }
            Input::TransportError => {
                self.set(ConnectionState::Errored(ErrorReason::TransportError), &mut fx);
            }
            Input::Closed => self.lost(ErrorReason::ConnectionLost, &mut fx),
            Input::OpenFailed => self.lost(ErrorReason::OpenFailure, &mut fx),
        }
        fx
    }

    // Shared by start, timer expiry and manual reconnect.
    fn attempt(&mut self, fx: &mut Vec<Effect>) {
        self.teardown(fx);
        fx.push(Effect::Open);
        self.transport_live = true;
        self.state = ConnectionState::Connecting;
        fx.push(Effect::Publish(self.state));
    }

    fn teardown(&mut self, fx: &mut Vec<Effect>) {
        if self.timer_armed {
            fx.push(Effect::CancelTimer);
            self.timer_armed = false;
        }
        if self.transport_live {
            fx.push(Effect::CloseTransport);
            self.transport_live = false;
        }
    }

    fn lost(&mut self, reason: ErrorReason, fx: &mut Vec<Effect>) {
        if !self.transport_live {
            return;
        }
        self.transport_live = false;
        self.set(ConnectionState::Errored(reason), fx);
        if !self.timer_armed {
            self.timer_armed = true;
            fx.push(Effect::ArmTimer);
        }
    }

    fn set(&mut self, next: ConnectionState, fx: &mut Vec<Effect>) {
        if self.state != next {
            self.state = next;
            fx.push(Effect::Publish(next));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> Reading {
        Reading::new("H1", 500.0, 300.0, 80.0, true).unwrap()
    }

    fn started() -> Link {
        let mut link = Link::new();
        link.handle(Input::Start);
        link
    }

    #[test]
    fn start_opens_once() {
        let mut link = Link::new();
        assert_eq!(
            link.handle(Input::Start),
            vec![Effect::Open, Effect::Publish(ConnectionState::Connecting)]
        );
        assert!(link.handle(Input::Start).is_empty());
        link.handle(Input::Opened);
        assert!(link.handle(Input::Start).is_empty());
        assert_eq!(link.state(), ConnectionState::Connected);
    }

    #[test]
    fn close_arms_exactly_one_timer() {
        let mut link = started();
        link.handle(Input::Opened);
        let fx = link.handle(Input::Closed);
        assert_eq!(
            fx,
            vec![
                Effect::Publish(ConnectionState::Errored(ErrorReason::ConnectionLost)),
                Effect::ArmTimer
            ]
        );
        assert!(link.handle(Input::Closed).is_empty());
        assert!(link.handle(Input::OpenFailed).is_empty());
        assert!(link.timer_armed());
        assert!(!link.transport_live());
    }

    #[test]
    fn open_failure_schedules_retry() {
        let mut link = started();
        let fx = link.handle(Input::OpenFailed);
        assert_eq!(
            fx,
            vec![
                Effect::Publish(ConnectionState::Errored(ErrorReason::OpenFailure)),
                Effect::ArmTimer
            ]
        );
        assert_eq!(
            link.handle(Input::TimerElapsed),
            vec![Effect::Open, Effect::Publish(ConnectionState::Connecting)]
        );
        assert!(!link.timer_armed());
    }

    #[test]
    fn decode_failure_keeps_transport() {
        let mut link = started();
        link.handle(Input::Opened);
        let fx = link.handle(Input::DecodeFailed);
        assert_eq!(
            fx,
            vec![Effect::Publish(ConnectionState::Errored(ErrorReason::DecodeFailure))]
        );
        assert!(link.transport_live());
        assert!(!link.timer_armed());

        assert_eq!(
            link.handle(Input::Frame(reading())),
            vec![Effect::Deliver(reading())]
        );
        assert_eq!(
            link.state(),
            ConnectionState::Errored(ErrorReason::DecodeFailure)
        );
    }

    #[test]
    fn transport_error_then_close() {
        let mut link = started();
        link.handle(Input::Opened);
        assert_eq!(
            link.handle(Input::TransportError),
            vec![Effect::Publish(ConnectionState::Errored(ErrorReason::TransportError))]
        );
        assert!(link.transport_live());
        let fx = link.handle(Input::Closed);
        assert!(fx.contains(&Effect::ArmTimer));
        assert_eq!(link.state(), ConnectionState::Errored(ErrorReason::ConnectionLost));
    }

    #[test]
    fn manual_reconnect_preempts_timer() {
        let mut link = started();
        link.handle(Input::Opened);
        link.handle(Input::Closed);
        assert_eq!(
            link.handle(Input::Reconnect),
            vec![
                Effect::CancelTimer,
                Effect::Open,
                Effect::Publish(ConnectionState::Connecting)
            ]
        );
        assert!(!link.timer_armed());
        // A late expiry of the cancelled timer must not open a second transport.
        assert!(link.handle(Input::TimerElapsed).is_empty());
    }

    #[test]
    fn manual_reconnect_replaces_live_transport() {
        let mut link = started();
        link.handle(Input::Opened);
        assert_eq!(
            link.handle(Input::Reconnect),
            vec![
                Effect::CloseTransport,
                Effect::Open,
                Effect::Publish(ConnectionState::Connecting)
            ]
        );
        assert!(link.transport_live());
    }

    #[test]
    fn stop_releases_everything_and_ignores_late_events() {
        let mut link = started();
        link.handle(Input::Opened);
        assert_eq!(link.handle(Input::Stop), vec![Effect::CloseTransport]);
        assert!(!link.transport_live() && !link.timer_armed() && !link.is_running());

        for late in [
            Input::Opened,
            Input::Closed,
            Input::TimerElapsed,
            Input::DecodeFailed,
            Input::Frame(reading()),
        ] {
            assert!(link.handle(late).is_empty());
        }

        let mut link = started();
        link.handle(Input::OpenFailed);
        assert_eq!(link.handle(Input::Stop), vec![Effect::CancelTimer]);
        assert!(link.handle(Input::Stop).is_empty());
    }

    #[test]
    fn arbitrary_interleavings_keep_resources_bounded() {
        let inputs = [
            Input::Start,
            Input::Opened,
            Input::Frame(reading()),
            Input::DecodeFailed,
            Input::TransportError,
            Input::Closed,
            Input::OpenFailed,
            Input::TimerElapsed,
            Input::Reconnect,
            Input::Stop,
        ];
        // Walk every sequence of length 4 and track resources from effects alone.
        let n = inputs.len();
        for code in 0..n.pow(4) {
            let mut link = Link::new();
            let (mut transports, mut timers) = (0i32, 0i32);
            let mut c = code;
            for _ in 0..4 {
                let input = inputs[c % n].clone();
                c /= n;
                for fx in link.handle(input) {
                    match fx {
                        Effect::Open => transports += 1,
                        Effect::CloseTransport => transports -= 1,
                        Effect::ArmTimer => timers += 1,
                        Effect::CancelTimer => timers -= 1,
                        Effect::Publish(_) | Effect::Deliver(_) => {}
                    }
                }
                // Transport end events free the transport without an effect.
                transports = transports.min(link.transport_live() as i32);
                assert!((0..=1).contains(&transports), "sequence {code}");
                assert_eq!(timers, link.timer_armed() as i32, "sequence {code}");
                assert_eq!(transports, link.transport_live() as i32, "sequence {code}");
                assert!(!(link.transport_live() && link.timer_armed()), "sequence {code}");
            }
        }
    }
}
