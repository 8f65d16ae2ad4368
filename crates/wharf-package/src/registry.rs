//! Format-keyed registry of metadata readers.

use std::{collections::HashMap, path::Path, sync::Arc};

use crate::{
    error::{PackageError, Result},
    formats::{
        egg::EggReader, sdist::SdistReader, wheel::WheelReader, wininst::WininstReader,
        DistributionFormat,
    },
    pkginfo::RawMetadata,
    traits::{MetadataReader, ReaderOptions},
};

/// Maps each [`DistributionFormat`] to the reader that handles it.
#[derive(Clone)]
pub struct ReaderRegistry {
    readers: HashMap<DistributionFormat, Arc<dyn MetadataReader>>,
    options: ReaderOptions,
}

impl ReaderRegistry {
    /// An empty registry; every read fails until readers are registered.
    pub fn new(options: ReaderOptions) -> Self {
        Self {
            readers: HashMap::new(),
            options,
        }
    }

    /// Registry with the built-in reader for every format.
    pub fn with_defaults() -> Self {
        Self::with_options(ReaderOptions::default())
    }

    pub fn with_options(options: ReaderOptions) -> Self {
        let mut registry = Self::new(options);
        registry.register(Arc::new(WheelReader));
        registry.register(Arc::new(WininstReader));
        registry.register(Arc::new(EggReader));
        registry.register(Arc::new(SdistReader));
        registry
    }

    /// Installs `reader` for its format, replacing any previous one.
    pub fn register(&mut self, reader: Arc<dyn MetadataReader>) {
        self.readers.insert(reader.format(), reader);
    }

    pub fn get(&self, format: DistributionFormat) -> Option<&Arc<dyn MetadataReader>> {
        self.readers.get(&format)
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Reads `path` with the reader registered for `format`.
    pub fn read(&self, format: DistributionFormat, path: &Path) -> Result<RawMetadata> {
        let reader = self.get(format).ok_or_else(|| {
            PackageError::extraction(
                path.display().to_string(),
                format!("no reader registered for {format}"),
            )
        })?;
        reader.read(path, &self.options)
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedReader;

    impl MetadataReader for FixedReader {
        fn format(&self) -> DistributionFormat {
            DistributionFormat::Wheel
        }

        fn read(&self, _path: &Path, _options: &ReaderOptions) -> Result<RawMetadata> {
            let mut raw = RawMetadata::new();
            raw.insert("Name", "fixed");
            Ok(raw)
        }
    }

    #[test]
    fn test_defaults_cover_every_format() {
        let registry = ReaderRegistry::with_defaults();
        for format in DistributionFormat::ALL {
            assert_eq!(registry.get(format).unwrap().format(), format);
        }
    }

    #[test]
    fn test_register_replaces_reader() {
        let mut registry = ReaderRegistry::with_defaults();
        registry.register(Arc::new(FixedReader));

        let raw = registry
            .read(DistributionFormat::Wheel, Path::new("/nonexistent.whl"))
            .unwrap();
        assert_eq!(raw.get("name"), Some("fixed"));
    }

    #[test]
    fn test_empty_registry_fails() {
        let registry = ReaderRegistry::new(ReaderOptions::default());
        let err = registry
            .read(DistributionFormat::Egg, Path::new("/x.egg"))
            .unwrap_err();
        assert!(err.to_string().contains("no reader registered for bdist_egg"));
    }
}
