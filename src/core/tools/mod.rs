//! Remote-triggered host operations.
//!
//! The upstream model calls tools in ordered batches; [`ToolDispatcher`] runs
//! each batch against a host-supplied [`HostEffector`] and produces exactly one
//! `toolResponse` per batch.

pub mod declarations;
pub mod dispatcher;
pub mod draw;
pub mod effector;
pub mod snapshot;
pub mod wait;

pub use declarations::tool_declarations;
pub use dispatcher::{DispatcherConfig, ToolDispatcher, parse_arguments};
pub use draw::DrawCommand;
pub use effector::{ElementDescriptor, HostEffector, ToolError, ToolResult, UiAction};
pub use snapshot::{MAX_SNAPSHOT_ELEMENTS, SnapshotEntry, best_effort_lookup, build_snapshot};
pub use wait::{WaitPolicy, wait_for_element};
