//! Motion Vigilance Kernel (MVK)
//!
//! This crate implements the real-time analysis core for single-camera
//! motion alerting: timed frame acquisition, background-difference motion
//! extraction, zone-based filtering, and a debounced alert state machine,
//! with results delivered to a polling consumer over an event channel.
//!
//! # Architecture
//!
//! Data flows one way, one component per stage:
//!
//! 1. **FrameSource** (`source`): opens/reads/closes an opaque frame stream.
//! 2. **FramePump** (`pump`): owns the session lifecycle and cadence, and
//!    drives the stages below once per accepted frame.
//! 3. **MotionAnalyzer** (`analyze`): extracts candidate motion regions
//!    against a fixed background reference captured at session start.
//! 4. **ZoneFilter** (`zones`): reduces candidates to a single per-frame
//!    motion boolean; ignore zones always beat detection zones.
//! 5. **AlertStateMachine** (`alert`): debounces the motion boolean into one
//!    alert per motion episode.
//! 6. **EventChannel** (`events`): lossless ordered delivery for text/alert
//!    events, latest-value delivery for frames.
//!
//! The core emits events and never holds a reference to any presentation
//! object. Configuration is snapshotted into an immutable `SessionConfig`
//! at session start; live edits apply to the next session.
//!
//! # Module Structure
//!
//! - `frame`: the timestamped RGB pixel buffer handed between stages
//! - `source`: the capture boundary and the synthetic `stub://` source
//! - `analyze`, `zones`, `alert`: the per-frame pipeline stages
//! - `pump`, `events`: session orchestration and delivery
//! - `config`: daemon configuration and connection-target resolution

pub mod alert;
pub mod analyze;
pub mod config;
pub mod events;
pub mod frame;
pub mod pump;
pub mod source;
pub mod zones;

pub use alert::{AlertState, AlertStateMachine, ALERT_EXPIRY};
pub use analyze::{detect_regions, BackgroundModel, MotionRegion, ProcessingError};
pub use config::{ConnectionTarget, VigildConfig, MAX_SENSITIVITY, MIN_SENSITIVITY};
pub use events::{Event, EventChannel, POLL_INTERVAL};
pub use frame::Frame;
pub use pump::{FramePump, SessionConfig, SourceOpener};
pub use source::{open_frame_source, FrameRead, FrameSource, SourceError, SyntheticSource};
pub use zones::{format_zone_list, frame_has_motion, parse_zone_list, Rect, ZoneSet};
