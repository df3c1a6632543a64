//! Page renderers for kiln.
//!
//! A [`Renderer`] turns a route into static HTML. Two implementations ship:
//! [`ChromeRenderer`] drives a headless browser over the DevTools protocol
//! on a local debugging port, and [`OriginRenderer`] fetches pages from a
//! server that already produces full HTML.

pub mod chrome;
pub mod origin;
pub mod protocol;
pub mod traits;

pub use chrome::ChromeRenderer;
pub use origin::OriginRenderer;
pub use traits::{RenderContext, RenderError, RenderedPage, Renderer};
