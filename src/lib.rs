//! Physical keyboard layout conversion between QMK-like JSON and ZMK
//! devicetree source.
//!
//! Layouts are decoded into a [`LayoutSet`], normalized so the top-left key
//! sits at the origin, and encoded back out in either format. The
//! [`Converter`] façade adds a decode cache, bulk conversion, structured
//! logging and metrics on top of the plain codecs in [`json`] and [`dts`].

pub mod bulk;
pub mod cache;
pub mod collab;
pub mod converter;
pub mod dts;
pub mod error;
pub mod fixed;
pub mod json;
pub mod logging;
pub mod metrics;
pub mod model;

pub use cache::{CacheStats, LayoutCache};
pub use collab::{KeyRect, LayoutGenerator, LayoutRenderer, layouts_from_rects};
pub use converter::{Converter, ConverterConfig};
pub use dts::{DeviceTree, DtsNode, SourceTree};
pub use error::{LayoutError, Result};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use metrics::{ConversionMetrics, MetricSnapshot};
pub use model::{DEFAULT_LAYOUT_NAME, Key, Layout, LayoutSet, Units, normalize, normalize_set};
