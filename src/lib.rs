// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

pub mod cache;
pub mod config;
pub mod exception;
pub mod listing;
pub mod param;
pub mod pipeline;
pub mod request;
pub mod resolver;
pub mod response;
pub mod store;
pub mod tls;
pub mod util;

pub use cache::FileCache;
pub use config::Config;
pub use exception::Exception;
pub use listing::{ListingBuilder, ListingEntry, Marker};
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use pipeline::Pipeline;
pub use request::Request;
pub use resolver::{normalize, IgnoreSet, PathResolver, Resolution, ResourceKind};
pub use response::Response;
pub use store::{Ledger, VisitStore};
pub use util::HtmlBuilder;
