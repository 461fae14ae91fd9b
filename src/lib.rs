//! The library code for the `reprise` blog engine. A blog is a flat directory
//! of plain-text entries, each named `YYYY.MM.DD.Title.Words`, with an
//! optional header block for tags. The architecture breaks down into three
//! steps:
//!
//! 1. Loading entries from disk into a [`repository::Repository`]
//!    ([`crate::entry`], [`crate::repository`])
//! 2. Composing entries into pages and feeds ([`crate::assemble`])
//! 3. Delivering the results, either written out as a static site
//!    ([`crate::build`]) or answered per request ([`crate::serve`])
//!
//! The second step is shared by both modes and is a pure function of the
//! loaded entries, the site [`config::Config`], and the theme
//! [`template::Templates`], so a page served dynamically is byte-for-byte the
//! page the static build writes.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod assemble;
pub mod build;
pub mod config;
pub mod entry;
pub mod feed;
pub mod markdown;
pub mod repository;
pub mod serve;
pub mod slug;
pub mod template;
pub mod value;
