//! # Library Management Module
//!
//! Owns the catalog: tracks, albums and the album forest.
//!
//! ## Overview
//!
//! This module manages:
//! - The [`CollectionStore`], sole owner of track and album records, which
//!   enforces name uniqueness and referential integrity
//! - The [`HierarchyManager`], which validates reparenting against cycles
//!   and answers parent/child questions
//! - The [`CatalogView`] query API and deep-link resolution used by the
//!   presentation layer
//!
//! Expected failures come back as [`LibraryError`] or [`MergeError`] values;
//! a store reaching an invariant-violating state is a bug and panics.

pub mod error;
pub mod hierarchy;
pub mod models;
pub mod query;
pub mod store;

pub use error::{LibraryError, MergeError, Result};
pub use hierarchy::HierarchyManager;
pub use models::{Album, AlbumId, Track, TrackDraft, TrackId};
pub use query::{
    AlbumSummary, CatalogView, DeepLink, DeepLinkKind, LinkTarget, ResolvedLink, TrackListItem,
};
pub use store::CollectionStore;
