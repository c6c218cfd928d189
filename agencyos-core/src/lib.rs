#![doc = "agencyos-core: core logic library for agencyos."]

//! Content calendars of social-media agencies: remote folder layout, best-effort mirroring of
//! soft deletes into the remote store, image normalization and the monthly PDF grid report.
//!
//! # Usage
//! Build a [`planner::Planner`] from a [`contract::PlanStore`], a [`contract::RemoteStore`] and a
//! [`paths::PathBuilder`]; lifecycle and attachment operations hang off it, and
//! [`report::CampaignReport`] borrows it for PDF generation.

pub mod agency;
pub mod attachments;
pub mod config;
pub mod contract;
pub mod error;
pub mod grid;
pub mod memory_store;
pub mod models;
pub mod normalize;
pub mod paths;
pub mod planner;
pub mod render;
pub mod report;
pub mod sync;
pub mod trash;
