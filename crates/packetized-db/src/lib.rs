//! Packetized Database Library
//!
//! Postgres repositories for assets and their published representations.

pub mod db;

pub use db::{AssetRepository, RepresentationRepository};
