use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, SessionError};
use crate::types::ClientEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Connecting,
    Open,
    Closed,
}

/// Control channel lifecycle. Holds the `session.update` until the channel
/// opens and releases it exactly once.
#[derive(Debug)]
pub struct ChannelGate {
    pending: Option<ClientEvent>,
    state: ChannelState,
    open: Arc<AtomicBool>,
}

impl ChannelGate {
    pub fn new(config: ClientEvent) -> Self {
        Self {
            pending: Some(config),
            state: ChannelState::Connecting,
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag the sending side checks before queueing outbound messages.
    pub fn open_flag(&self) -> Arc<AtomicBool> {
        self.open.clone()
    }

    /// Returns the configuration to write first. `None` on any later open
    /// or after close.
    pub fn on_open(&mut self) -> Option<ClientEvent> {
        if self.state != ChannelState::Connecting {
            return None;
        }
        self.state = ChannelState::Open;
        self.pending.take()
    }

    /// Marks the outbound path usable. Called once the configuration is on
    /// the wire.
    pub fn confirm_open(&self) {
        if self.state == ChannelState::Open {
            self.open.store(true, Ordering::Release);
        }
    }

    /// Returns `true` for the first close only.
    pub fn on_close(&mut self) -> bool {
        self.open.store(false, Ordering::Release);
        self.pending = None;
        let first = self.state != ChannelState::Closed;
        self.state = ChannelState::Closed;
        first
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }
}

/// Serializes each event as one compact JSON object.
pub(crate) fn encode(events: &[ClientEvent]) -> Result<Vec<String>> {
    events
        .iter()
        .map(|event| serde_json::to_string(event).map_err(|e| SessionError::MalformedEvent(e.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent;
    use crate::types::audio::Voice;
    use crate::types::events::client::ResponseCreateEvent;

    fn gate() -> ChannelGate {
        ChannelGate::new(agent::session_update(Voice::Ash))
    }

    #[test]
    fn config_is_released_once() {
        let mut gate = gate();
        let flag = gate.open_flag();
        assert!(!flag.load(Ordering::Acquire));

        let first = gate.on_open().expect("config on first open");
        assert_eq!(first.kind(), "session.update");
        assert!(!flag.load(Ordering::Acquire));
        gate.confirm_open();
        assert!(flag.load(Ordering::Acquire));
        assert!(gate.is_open());

        assert!(gate.on_open().is_none());
    }

    #[test]
    fn close_before_open_drops_config() {
        let mut gate = gate();
        assert!(gate.on_close());
        assert!(!gate.on_close());
        assert!(gate.on_open().is_none());
        gate.confirm_open();
        assert!(!gate.open_flag().load(Ordering::Acquire));
    }

    #[test]
    fn close_clears_open_flag() {
        let mut gate = gate();
        gate.on_open();
        gate.confirm_open();
        let flag = gate.open_flag();
        assert!(gate.on_close());
        assert!(!flag.load(Ordering::Acquire));
        assert!(!gate.is_open());
    }

    #[test]
    fn encoded_messages_are_single_line() {
        let events = vec![agent::session_update(Voice::Ash), ClientEvent::ResponseCreate(ResponseCreateEvent::new())];
        let encoded = encode(&events).unwrap();
        assert_eq!(encoded.len(), 2);
        assert!(encoded.iter().all(|m| !m.contains('\n')));
        assert_eq!(encoded[1], r#"{"type":"response.create"}"#);
    }
}
