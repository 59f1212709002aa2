#![doc = "post-bucket-core: core logic library for post-bucket."]

//! This crate holds the publishing pipelines and their data models. Network and cloud
//! clients are not included here; they plug in through the traits in [`contract`].
//!
//! # Pipelines
//! - [`synchronise`]: front matter driven article sync (create / update / reconcile)
//! - [`images`]: embedded image relocation to a content bucket
//!
//! # Usage
//! Build a [`config::PublishConfig`] or [`config::ImageConfig`], hand it to the pipeline
//! entrypoint together with a collaborator implementation, and print the returned report.

pub mod article;
pub mod config;
pub mod contract;
pub mod front_matter;
pub mod images;
pub mod slug;
pub mod synchronise;
