//! waygraph-core: compact, persistable road-graph storage with path
//! extraction.
//!
//! Components, bottom up:
//! - `store` - segmented i32 stores with header slots, RAM or mmap backed,
//!   grouped into a directory of named files
//! - `bitutil` - fixed-point codecs (1e-7 degrees, millimetre distances)
//! - `names` - deduplicating UTF-32 street-name table
//! - `graph` - node/edge record areas with intrusive adjacency chains,
//!   canonical edge orientation, in-place node compaction
//! - `flags` / `distance` - encoder and distance-calculation seams
//! - `util` - polyline and turn-sequence containers
//! - `path` - route reconstruction from a shortest-path tree
//!
//! The build protocol is single-threaded: create, populate, flush. A
//! flushed graph can be reopened and read concurrently; cursors never
//! mutate the backing stores.

pub mod bitutil;
pub mod distance;
pub mod flags;
pub mod graph;
pub mod names;
pub mod path;
pub mod store;
pub mod util;

pub use bitutil::BBox;
pub use distance::{DistanceCalc, Haversine};
pub use flags::{CarEncoder, CombinedEncoder, VehicleEncoder};
pub use graph::{
    AcceptAll, AdjacentEdges, AllEdges, DirectionFilter, EdgeFilter, EdgeId, EdgeView,
    GraphStorage, NodeId,
};
pub use names::NameIndex;
pub use path::{EdgeEntry, Path};
pub use store::{AccessMode, DataAccess, Directory, Storable};
pub use util::{Indication, PointList, WayList};
