//! Supplier scraper: logs into supplier portals, extracts product pages, and normalizes them into canonical records.

pub mod batch;
pub mod config;
pub mod extract;
pub mod normalize;
pub mod renderer;
pub mod session;
pub mod sites;
pub mod types;

pub use batch::{run_batch, scrape};
pub use config::{ScraperConfig, Timeouts};
pub use extract::{FieldCollector, FieldKind, FieldSpec};
pub use normalize::{normalize, normalize_one, parse_price};
pub use renderer::chromium::ChromiumLauncher;
pub use renderer::{Launcher, RenderContext, Renderer};
pub use session::Session;
pub use sites::{Site, SiteAdapter, SiteProfile};
pub use types::*;
