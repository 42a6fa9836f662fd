//! Event delivery between the frame pump and its consumer.
//!
//! One producer (the pump thread) publishes; one consumer drains on a fixed
//! poll tick. Text events and alert raises are lossless and delivered in
//! publish order. Frame events collapse to the single most recent value: an
//! undrained frame is overwritten by the next one, which bounds memory at
//! one frame no matter how far the consumer lags.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::frame::Frame;

/// Poll cadence for consumers draining the channel.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Tagged events published by the frame pump.
#[derive(Clone, Debug)]
pub enum Event {
    Log(String),
    Info(String),
    Warning(String),
    Error(String),
    /// A new alert episode started.
    AlertRaised,
    /// An annotated frame and its motion boolean.
    Frame { frame: Frame, motion: bool },
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<Event>,
    frame_slot: Option<(Frame, bool)>,
    last_frame: Option<Frame>,
}

/// Thread-safe handoff from the pump to a polling consumer.
#[derive(Default)]
pub struct EventChannel {
    inner: Mutex<Inner>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock still holds consistent queue state.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn publish(&self, event: Event) {
        let mut inner = self.lock();
        match event {
            Event::Frame { frame, motion } => {
                inner.last_frame = Some(frame.clone());
                inner.frame_slot = Some((frame, motion));
            }
            other => inner.queue.push_back(other),
        }
    }

    /// Drain everything published since the last poll, in publish order,
    /// with the pending frame event (if any) delivered last.
    pub fn drain(&self) -> Vec<Event> {
        let mut inner = self.lock();
        let mut events: Vec<Event> = inner.queue.drain(..).collect();
        if let Some((frame, motion)) = inner.frame_slot.take() {
            events.push(Event::Frame { frame, motion });
        }
        events
    }

    /// Copy of the most recently published frame, for passive redisplay.
    /// Survives `drain` and the end of the session.
    pub fn last_frame(&self) -> Option<Frame> {
        self.lock().last_frame.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(level: u8) -> Frame {
        Frame::new(vec![level; 4 * 4 * 3], 4, 4).unwrap()
    }

    #[test]
    fn text_events_are_lossless_and_ordered() {
        let channel = EventChannel::new();
        channel.publish(Event::Log("a".into()));
        channel.publish(Event::AlertRaised);
        channel.publish(Event::Error("b".into()));

        let drained = channel.drain();
        assert_eq!(drained.len(), 3);
        assert!(matches!(&drained[0], Event::Log(msg) if msg == "a"));
        assert!(matches!(drained[1], Event::AlertRaised));
        assert!(matches!(&drained[2], Event::Error(msg) if msg == "b"));
        assert!(channel.drain().is_empty());
    }

    #[test]
    fn frame_events_collapse_to_the_latest() {
        let channel = EventChannel::new();
        channel.publish(Event::Frame {
            frame: frame(1),
            motion: false,
        });
        channel.publish(Event::Frame {
            frame: frame(2),
            motion: true,
        });

        let drained = channel.drain();
        assert_eq!(drained.len(), 1);
        match &drained[0] {
            Event::Frame { frame, motion } => {
                assert!(*motion);
                assert_eq!(frame.data()[0], 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn frame_overwrite_does_not_drop_text_events() {
        let channel = EventChannel::new();
        for index in 0..10 {
            channel.publish(Event::Log(format!("log {}", index)));
            channel.publish(Event::Frame {
                frame: frame(index),
                motion: false,
            });
        }

        let drained = channel.drain();
        let logs = drained
            .iter()
            .filter(|event| matches!(event, Event::Log(_)))
            .count();
        let frames = drained
            .iter()
            .filter(|event| matches!(event, Event::Frame { .. }))
            .count();
        assert_eq!(logs, 10);
        assert_eq!(frames, 1);
    }

    #[test]
    fn last_frame_survives_drain() {
        let channel = EventChannel::new();
        assert!(channel.last_frame().is_none());
        channel.publish(Event::Frame {
            frame: frame(7),
            motion: true,
        });
        channel.drain();
        let last = channel.last_frame().expect("retained frame");
        assert_eq!(last.data()[0], 7);
    }
}
