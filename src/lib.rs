//! Library to back up a PostgreSQL database to local disk and [Google Drive][drive].
//!
//! A run ([`job::Job`]) dumps the database with a [`backends::Dumper`], uploads the
//! newest dump through a [`remote::RemoteStore`] and prunes local dumps that outgrew the
//! retention window ([`util::retention`]).
//!
//! [drive]: https://developers.google.com/drive/api/reference/rest/v3

#![forbid(unsafe_code)]

pub mod backends;
pub mod cli;
pub mod config;
pub mod job;
pub mod remote;
pub mod util;
