//! In-process slippy map the graph overlay is drawn on.

pub mod tiles;
pub mod viewport;

pub use tiles::TileCache;
pub use viewport::MapInstance;
