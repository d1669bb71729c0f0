//! # me-pipeline Parameter Generator (mep-params)
//!
//! Builds the parameter files that drive the multi-echo preprocessing
//! pipeline from a subject's scan data.
//!
//! **Purpose:** Locate sessions and studies, classify them from acquisition
//! headers, group BOLD runs by field map, and write instruction, structural
//! and functional params files.
//!
//! **Inputs:** unconverted DICOM sessions described by `*.studies.txt`
//! manifests, or a BIDS dataset.

pub mod anatomical;
pub mod bids;
pub mod functional;
pub mod generate;
pub mod header;
pub mod locator;
pub mod matcher;
pub mod overrides;
pub mod runs;

pub use mep_common::{Error, Result};
