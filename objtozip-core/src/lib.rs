#![doc = "objtozip-core: core pipeline library for objtozip."]

//! This crate contains the object-to-zip pipeline, its collaborator contracts and the
//! archive/notification helpers. Storage backends and process wiring live in the
//! `objtozip` binary crate.
//!
//! # Usage
//! Build a [`pipeline::Pipeline`] from a [`config::PipelineConfig`], an
//! [`contract::ObjectStore`] and a [`contract::FileTypeDetector`], then feed it trigger
//! payloads with [`pipeline::Pipeline::handle_event`].

pub mod archive;
pub mod config;
pub mod contract;
pub mod detect;
pub mod notification;
pub mod pipeline;
