//! # Graph overlay
//!
//! Draws the contact graph (nodes colored by epidemic state, decimated edges)
//! onto a surface that sits over a host region: the live map, or the plain
//! network view when no map is available.

pub mod animation;
pub mod decimate;
pub mod palette;
pub mod projector;
pub mod render;
pub mod signals;
pub mod snapshot;
pub mod surface;

pub use animation::AnimationDriver;
pub use palette::NodeState;
pub use projector::{FallbackProjector, GeoBounds, Projector};
pub use render::RenderStyle;
pub use signals::{ListenerId, ListenerSet, RedrawScheduler};
pub use snapshot::{EdgeRef, GeoNode, PollTicket, SnapshotStore};
pub use surface::{OverlaySurfaceManager, SurfaceState, ViewportEvent, ViewportHost, WindowEvent};
