//! jotter-core - Core library for Jotter
//!
//! Local-first notes: every change lands in the on-device store first and is
//! mirrored to a per-user cloud collection when a user is signed in and the
//! device is online. This crate holds the models, the local store, the remote
//! mirror contract, the merge engine and the sync coordinator shared by all
//! Jotter clients.

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod merge;
pub mod models;
pub mod remote;
pub mod search;
pub mod services;
pub mod share;
pub mod state;
pub mod sync;
pub mod util;
pub mod view;

pub use error::{Error, Result};
pub use models::{Note, NoteId, NoteStatus, UserId};
