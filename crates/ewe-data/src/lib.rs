//! ewe-data - Plant and recipe dataset preparation
//!
//! Loads the tab-separated plant and recipe tables behind the ewe map,
//! remaps their grid coordinates onto the map tiles, joins recipes to plants
//! and enriches plants with GBIF images through a time-bounded cache.

pub mod cache;
pub mod coexistence;
pub mod config;
pub mod coords;
pub mod error;
pub mod formulas;
pub mod gbif;
pub mod images;
pub mod lazy;
pub mod loader;
pub mod merge;
pub mod pipeline;
pub mod row;

pub use config::Config;
pub use error::{DataError, Result};
pub use merge::{merge_recipes, MergedRecipe};
pub use pipeline::{load_dataset, Dataset};
pub use row::{Numeric, Row, Value};
