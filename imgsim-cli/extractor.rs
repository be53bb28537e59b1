use imgsim_core::{FeatureDetector, FeatureSet};
use log::{debug, warn};

use crate::cache::DiskCache;
use crate::source::ImageSource;

/// Loads images, runs the detector and consults the optional feature cache
pub struct FeatureExtractor<D> {
    detector: D,
    cache: Option<DiskCache>,
    revalidate_mtime: bool,
}

impl<D: FeatureDetector> FeatureExtractor<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            cache: None,
            revalidate_mtime: false,
        }
    }

    pub fn with_cache(mut self, cache: DiskCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Treat cache records whose recorded modification time differs from the
    /// source file's current one as misses
    pub fn with_mtime_check(mut self, enabled: bool) -> Self {
        self.revalidate_mtime = enabled;
        self
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn cache(&self) -> Option<&DiskCache> {
        self.cache.as_ref()
    }

    /// Features for `source`, or `None` when the image cannot be loaded or
    /// nothing was detected.
    ///
    /// A cache hit returns without decoding the image. Only non-empty
    /// results are written back, so failures are retried on the next call.
    /// In-memory sources bypass the cache: their name says nothing about
    /// their content.
    pub fn extract(&self, source: &ImageSource) -> Option<FeatureSet> {
        let id = source.identifier();
        let cached = match source {
            ImageSource::Path(path) => self
                .cache
                .as_ref()
                .and_then(|cache| cache.key_for(path).map(|key| (cache, key))),
            ImageSource::Bytes { .. } => None,
        };
        let modified = source.modified();

        if let Some((cache, key)) = &cached {
            if let Some(record) = cache.get(key) {
                if self.revalidate_mtime && record.source_modified != modified {
                    debug!("Stale cache record {} for {}", key, id.display());
                } else {
                    debug!("Cache hit {} for {}", key, id.display());
                    return Some(record.features);
                }
            }
        }

        let features = self.compute(source)?;
        if features.is_empty() {
            debug!("No features in {}", id.display());
            return None;
        }

        if let Some((cache, key)) = &cached {
            match cache.put(key, &features, modified) {
                Ok(()) => debug!("Cached {} features for {} as {}", features.len(), id.display(), key),
                Err(err) => warn!("Failed to cache features for {}: {}", id.display(), err),
            }
        }

        Some(features)
    }

    fn compute(&self, source: &ImageSource) -> Option<FeatureSet> {
        let id = source.identifier();
        let luma = match source.load_luma() {
            Ok(luma) => luma,
            Err(err) => {
                warn!("Failed to load {}: {}", id.display(), err);
                return None;
            }
        };

        let (width, height) = luma.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        match self
            .detector
            .detect_and_describe(luma.as_raw(), width as usize, height as usize)
        {
            Ok(features) => Some(features),
            Err(err) => {
                warn!("Feature detection failed for {}: {}", id.display(), err);
                None
            }
        }
    }
}
