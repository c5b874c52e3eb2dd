#![doc = "feed-mirror-core: core pipeline library for feed-mirror."]

//! This crate contains the whole mirror pipeline: concurrent fetching into a
//! content store, content sniffing, collision-free naming in source order and
//! link building. Configuration files, environment lookup and report
//! rendering live in the `feed-mirror` CLI crate.
//!
//! # Usage
//! Build a [`config::MirrorConfig`], resolve [`config::LinkTemplates`] against a
//! [`config::RepoIdent`], and hand both to [`synchronise::synchronise`] together
//! with a [`contract::Fetcher`] and a [`contract::Shortener`].

pub mod config;
pub mod contract;
pub mod download;
pub mod error;
pub mod links;
pub mod naming;
pub mod sniff;
pub mod synchronise;
