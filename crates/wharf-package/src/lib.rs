//! Python distribution handling for wharf.
//!
//! This crate turns an uploaded distribution file into a canonical metadata record:
//!
//! - [`detect_format`] maps a filename to a [`DistributionFormat`] by suffix
//! - a [`MetadataReader`] per format pulls the core-metadata file (`PKG-INFO`/`METADATA`)
//!   out of the archive, selected through a [`ReaderRegistry`]
//! - [`pkginfo::parse`] turns that file into a [`RawMetadata`] field bag
//! - [`normalize`] validates the bag and produces [`NormalizedFields`]
//!
//! # Supported Formats
//!
//! - **Wheel** (`.whl`): `*.dist-info/METADATA`
//! - **Egg** (`.egg`): `EGG-INFO/PKG-INFO`
//! - **Source distribution** (`.tar.gz`, `.tar.bz2`, `.zip`): `<top>/PKG-INFO`
//! - **Windows installer** (`.exe`): zip payload appended to the stub, `*.egg-info`
//!
//! # Example
//!
//! ```no_run
//! use wharf_package::{detect_format, normalize, ReaderRegistry};
//!
//! fn inspect(path: &std::path::Path, filename: &str) -> wharf_package::Result<()> {
//!     let format = detect_format(filename)?;
//!     let raw = ReaderRegistry::with_defaults().read(format, path)?;
//!     let fields = normalize(format, &raw)?;
//!     println!("{} {}", fields.name, fields.version);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod formats;
pub mod normalize;
pub mod pkginfo;
pub mod registry;
pub mod traits;

pub use error::{ErrorContext, FieldError, PackageError, Result};
pub use formats::{detect_format, DistributionFormat, DIST_EXTENSIONS};
pub use normalize::{normalize, Classifier, NormalizedFields};
pub use pkginfo::RawMetadata;
pub use registry::ReaderRegistry;
pub use traits::{MetadataReader, ReaderOptions};
