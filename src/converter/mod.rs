//! Conversion entry points with caching, logging and metrics wired in.
//!
//! [`Converter`] is the surface the command line and embedding applications
//! use. It owns a [`LayoutCache`] for DTS decodes, counts conversions in
//! [`ConversionMetrics`] and reports through an optional [`Logger`]. All
//! methods take `&self`, so one converter can be shared by bulk workers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use indexmap::IndexMap;
use serde_json::{Value, json};

use crate::bulk;
use crate::cache::{CacheStats, LayoutCache};
use crate::collab::{LayoutGenerator, LayoutRenderer, layouts_from_rects};
use crate::dts;
use crate::error::{LayoutError, Result};
use crate::json;
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::{ConversionMetrics, MetricSnapshot};
use crate::model::LayoutSet;

/// Extension of the shared layout files picked up by
/// [`Converter::load_shared_layouts`].
pub const SHARED_LAYOUT_EXTENSION: &str = "dtsi";

#[derive(Clone)]
pub struct ConverterConfig {
    /// Number of decoded DTS inputs kept. Zero disables caching.
    pub cache_capacity: usize,
    /// Worker threads for bulk conversion.
    pub workers: usize,
    /// Optional structured logger.
    pub logger: Option<Logger>,
    /// Target recorded on conversion log events.
    pub log_target: String,
    /// Target used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 10,
            workers: std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1),
            logger: None,
            log_target: "physical_layout::converter".to_string(),
            metrics_target: "physical_layout::metrics".to_string(),
        }
    }
}

impl ConverterConfig {
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }
}

impl std::fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("cache_capacity", &self.cache_capacity)
            .field("workers", &self.workers)
            .field("logger", &self.logger.is_some())
            .field("log_target", &self.log_target)
            .field("metrics_target", &self.metrics_target)
            .finish()
    }
}

pub struct Converter {
    config: ConverterConfig,
    cache: Mutex<LayoutCache>,
    metrics: ConversionMetrics,
    started: Instant,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConverterConfig::default())
    }
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            cache: Mutex::new(LayoutCache::new(config.cache_capacity)),
            config,
            metrics: ConversionMetrics::new(),
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Decode QMK-like JSON. Every layout in the result is normalized.
    pub fn json_to_layouts(&self, input: &str) -> Result<LayoutSet> {
        let result = json::decode(input);
        self.record_decode("json", &result);
        result
    }

    /// Decode devicetree source, reusing the result for byte-identical text.
    pub fn dts_to_layouts(&self, input: &str) -> Result<LayoutSet> {
        let cached = self.lock_cache().get(input);
        if let Some(hit) = cached {
            self.metrics.record_cache(true);
            self.log(
                LogLevel::Debug,
                "cache hit",
                [json_kv("format", "dts"), json_kv("layouts", hit.len())],
            );
            return Ok(hit);
        }
        self.metrics.record_cache(false);

        let result = dts::decode(input);
        self.record_decode("dts", &result);
        if let Ok(set) = &result {
            self.lock_cache().insert(input, set.clone());
        }
        result
    }

    pub fn layouts_to_json(&self, set: &LayoutSet) -> Result<String> {
        let result = json::encode(set);
        match &result {
            Ok(_) => self.record_encode("json", set),
            Err(err) => self.record_failure("encode", "json", err),
        }
        result
    }

    pub fn layouts_to_dts(&self, set: &LayoutSet) -> String {
        let text = dts::encode(set);
        self.record_encode("dts", set);
        text
    }

    pub fn json_to_dts(&self, input: &str) -> Result<String> {
        let set = self.json_to_layouts(input)?;
        Ok(self.layouts_to_dts(&set))
    }

    pub fn dts_to_json(&self, input: &str) -> Result<String> {
        let set = self.dts_to_layouts(input)?;
        self.layouts_to_json(&set)
    }

    /// Re-emit JSON with every layout normalized and defaults dropped.
    pub fn normalize_json(&self, input: &str) -> Result<String> {
        let set = self.json_to_layouts(input)?;
        self.layouts_to_json(&set)
    }

    /// Decode many DTS sources on the configured worker pool. Results are in
    /// input order.
    pub fn dts_to_layouts_bulk(&self, inputs: &[&str]) -> Vec<Result<LayoutSet>> {
        bulk::convert_all(inputs.to_vec(), self.config.workers, |input| {
            self.dts_to_layouts(input)
        })
    }

    /// Read every `*.dtsi` file below `dir` and decode it.
    ///
    /// Files that do not decode are skipped with a warning. The map is keyed
    /// by the path relative to `dir` (with `/` separators) and sorted by it.
    pub fn load_shared_layouts(&self, dir: impl AsRef<Path>) -> Result<IndexMap<String, LayoutSet>> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        collect_files(dir, SHARED_LAYOUT_EXTENSION, &mut files)?;

        let mut sources = files
            .into_iter()
            .map(|path| {
                let name = relative_name(dir, &path);
                fs::read_to_string(&path).map(|text| (name, text))
            })
            .collect::<std::io::Result<Vec<_>>>()?;
        sources.sort_by(|a, b| a.0.cmp(&b.0));

        let decoded = bulk::convert_all(sources, self.config.workers, |(name, text)| {
            let result = self.dts_to_layouts(&text);
            (name, result)
        });

        let total = decoded.len();
        let mut shared = IndexMap::with_capacity(total);
        for (name, result) in decoded {
            match result {
                Ok(set) => {
                    shared.insert(name, set);
                }
                Err(err) => self.log(
                    LogLevel::Warn,
                    "skipping shared layout",
                    [json_kv("file", name), json_kv("error", err.to_string())],
                ),
            }
        }

        self.log(
            LogLevel::Info,
            "loaded shared layouts",
            [
                json_kv("dir", dir.display().to_string()),
                json_kv("files", total),
                json_kv("loaded", shared.len()),
            ],
        );
        Ok(shared)
    }

    /// Build a `"Default"` set from a generator. Coordinates are not
    /// normalized.
    pub fn generate_layouts<G>(&self, generator: &G) -> Result<LayoutSet>
    where
        G: LayoutGenerator + ?Sized,
    {
        let result = generator.generate().and_then(|rects| layouts_from_rects(&rects));
        self.record_decode("generator", &result);
        result
    }

    /// Render every layout in the set, keyed by display name.
    pub fn render_layouts<R>(&self, set: &LayoutSet, renderer: &R) -> Result<IndexMap<String, Vec<u8>>>
    where
        R: LayoutRenderer + ?Sized,
    {
        let mut images = IndexMap::with_capacity(set.len());
        for (name, layout) in set.iter() {
            let image = renderer.render(layout, layout.len()).inspect_err(|err| {
                self.record_failure("render", "renderer", err);
            })?;
            images.insert(name.to_string(), image);
        }
        Ok(images)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    pub fn metrics_snapshot(&self) -> MetricSnapshot {
        self.metrics.snapshot(self.started.elapsed())
    }

    /// Write a metrics snapshot to the logger, if one is configured.
    pub fn emit_metrics(&self) {
        if let Some(logger) = self.config.logger.as_ref() {
            let event = self
                .metrics_snapshot()
                .to_log_event(&self.config.metrics_target);
            let _ = logger.log_event(event);
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, LayoutCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_decode(&self, format: &str, result: &Result<LayoutSet>) {
        match result {
            Ok(set) => {
                let keys: usize = set.iter().map(|(_, layout)| layout.len()).sum();
                self.metrics.record_decode(keys);
                self.log(
                    LogLevel::Debug,
                    "decoded layouts",
                    [
                        json_kv("format", format),
                        json_kv("layouts", set.len()),
                        json_kv("keys", keys),
                    ],
                );
            }
            Err(err) => self.record_failure("decode", format, err),
        }
    }

    fn record_encode(&self, format: &str, set: &LayoutSet) {
        self.metrics.record_encode();
        self.log(
            LogLevel::Debug,
            "encoded layouts",
            [json_kv("format", format), json_kv("layouts", set.len())],
        );
    }

    fn record_failure(&self, operation: &str, format: &str, err: &LayoutError) {
        self.metrics.record_failure();
        self.log(
            LogLevel::Error,
            "conversion failed",
            [
                json_kv("operation", operation),
                json_kv("format", format),
                json_kv("error", err.to_string()),
            ],
        );
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            if !logger.enabled(level) {
                return;
            }
            let event = event_with_fields(level, &self.config.log_target, message, fields);
            let _ = logger.log_event(event);
        }
    }
}

fn collect_files(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, extension, out)?;
        } else if path.extension().is_some_and(|ext| ext == extension) {
            out.push(path);
        }
    }
    Ok(())
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Summary of a shared layout map, as printed by the command line.
pub fn shared_summary(shared: &IndexMap<String, LayoutSet>) -> Value {
    shared
        .iter()
        .map(|(file, set)| {
            let layouts: serde_json::Map<String, Value> = set
                .iter()
                .map(|(name, layout)| (name.to_string(), json!(layout.len())))
                .collect();
            (file.clone(), Value::Object(layouts))
        })
        .collect::<serde_json::Map<String, Value>>()
        .into()
}
