//! # GIS Archive
//!
//! Archive-then-conditional-delete for Web GIS content items.
//!
//! An inventory CSV flags each portal item for archive and/or delete. The
//! batch exports every item flagged for archive into
//! `<output_root>/<owner>/<item_id>/`, and deletes an item from the portal
//! only when it was flagged for delete **and** its archive succeeded. Every
//! outcome lands in a JSON report.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Inventory  │──▶│    Batch     │──▶│    Report    │
//! │    (CSV)    │   │ Coordinator  │   │ table + JSON │
//! └─────────────┘   └──────┬───────┘   └──────────────┘
//!                          │ per record
//!              ┌───────────┴───────────┐
//!              ▼                       ▼
//!       ┌─────────────┐         ┌─────────────┐
//!       │   Archive   │────────▶│  Deletion   │
//!       │  Executor   │ outcome │    Gate     │
//!       └──────┬──────┘         └──────┬──────┘
//!              │      GisClient        │
//!              └───────────┬───────────┘
//!                          ▼
//!                   ┌─────────────┐
//!                   │ ArcGIS REST │
//!                   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GIS_ARCHIVE_PASSWORD=...
//! gis-archive check             # config, inventory, login
//! gis-archive plan              # what would happen, no portal calls
//! gis-archive run --limit 10    # archive and delete the first 10 rows
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | `ItemRecord` and outcome types |
//! | [`inventory`] | Inventory CSV parsing and flag validation |
//! | [`item_kind`] | Item type → export strategy |
//! | [`traits`] | The `GisClient` seam |
//! | [`arcgis`] | ArcGIS REST implementation of `GisClient` |
//! | [`layout`] | Archive folder layout and file writing |
//! | [`archive`] | Archive executor |
//! | [`deletion`] | Deletion gate |
//! | [`batch`] | Batch coordinator and dry-run plan |
//! | [`report`] | Summary aggregation and persistence |
//! | [`progress`] | Progress reporting |
//! | [`logging`] | Tracing subscriber setup |
//! | [`commands`] | CLI command implementations |

pub mod arcgis;
pub mod archive;
pub mod batch;
pub mod commands;
pub mod config;
pub mod deletion;
pub mod error;
pub mod inventory;
pub mod item_kind;
pub mod layout;
pub mod logging;
pub mod models;
pub mod progress;
pub mod report;
pub mod traits;
