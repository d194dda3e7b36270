//! Interceptable HTTP request pipeline.
//!
//! # Overview
//! A `Client` runs every request through a chain built fresh per call:
//! request interceptors (last added runs first), the dispatch step
//! (request transforms, header flattening, adapter call, response
//! transforms), then response interceptors (first added runs first).
//! Instance defaults and per-call options are combined by `merge_config`.
//!
//! # Design
//! - Transport is pluggable through the `Adapter` trait; `UreqAdapter` is
//!   the process-wide default.
//! - Cancellation is cooperative: a `CancelToken` is checked before the
//!   adapter runs and again after it settles, and adapters may await it to
//!   abort in-flight I/O.
//! - Interceptor registries hand out stable ids; ejecting leaves a hole
//!   rather than shifting later entries.

pub mod adapter;
pub mod cancel;
pub mod client;
pub mod config;
pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod interceptor;
pub mod url;

pub use adapter::{adapter_fn, default_adapter, Adapter, UreqAdapter};
pub use cancel::{Cancel, CancelSource, CancelToken, Canceller};
pub use client::Client;
pub use config::{merge_config, RequestConfig, Transform};
pub use error::{is_cancel, Error, Result};
pub use http::{Headers, Method, Response};
pub use interceptor::{Interceptor, InterceptorId, InterceptorManager, Interceptors};
