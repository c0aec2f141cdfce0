//! # PDF Render Service
//!
//! An HTTP service that turns a web page into a PDF. Each request to
//! `POST /generate-pdf` launches its own headless Chrome, waits for the page's
//! network activity to settle, prints an A4 PDF with backgrounds and closes
//! the browser again before answering.
//!
//! ## Endpoints
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `POST` | `/generate-pdf` | `application/pdf` attachment, or a JSON `{"error": ...}` |
//! | `GET` | `/api/docs` | Swagger UI |
//! | `GET` | `/api/docs/openapi.json` | OpenAPI 3.0 document |
//! | `GET` | `/health` | Liveness and in-flight render count |
//! | `GET` | `/metrics` | Prometheus text exposition |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_render_service::{ChromeLauncher, Config, RenderRequest, RenderService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let service = RenderService::new(config.clone(), Arc::new(ChromeLauncher::new(config)));
//!
//!     let pdf = service.render(RenderRequest::new("https://example.com")).await?;
//!     std::fs::write("example.pdf", &pdf.data)?;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! PORT=8080 pdf-render-service
//! pdf-render-service --config render.json --max-concurrent 4
//! pdf-render-service validate
//! ```

/// Configuration, request and result types
pub mod config;

/// Error types and their HTTP mapping
pub mod error;

/// Browser engine traits the render service is written against
pub mod engine;

/// Chrome DevTools implementation of the engine traits
pub mod chrome;

/// Render orchestration: one browser per request
pub mod render_service;

/// HTTP routing, middleware and graceful shutdown
pub mod server;

/// OpenAPI document and Swagger UI page
pub mod docs;

/// Command-line interface implementation
pub mod cli;

/// Render metrics on the `metrics` facade
pub mod metrics;


pub use chrome::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use render_service::*;
pub use server::*;
