// pitwall-core: domain library for the pitwall telemetry bridge.
//
// Everything in this crate is synchronous and I/O-free: raw topic payloads
// come in as `serde_json::Value`, get decoded by the topic parsers, folded
// into the session snapshot by the accumulator, and compared by the event
// detectors. The service layer (feed client, recorder, publisher, playback)
// lives in `services/bridge`.

pub mod accumulator;
pub mod detect;
pub mod events;
pub mod parse;
pub mod pipeline;
pub mod state;
pub mod team_colors;
pub mod timeline;

pub use accumulator::StateAccumulator;
pub use events::Event;
pub use pipeline::{FeedMessage, Pipeline, ProcessOutcome};
pub use state::{Flag, SessionState, SessionType, TyreCompound};
pub use timeline::Timeline;
