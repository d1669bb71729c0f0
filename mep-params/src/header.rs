//! Acquisition header readers
//!
//! Only three header fields matter for classification: ImageType,
//! ProtocolName and SeriesDescription. They come either from a DICOM file
//! (read up to, not including, pixel data) or from the JSON sidecar that
//! dcm2niix writes next to a converted image.

use mep_common::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Header fields used for classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanHeader {
    pub image_type: Vec<String>,
    pub protocol_name: String,
    pub series_description: String,
    /// Number of time points, when the header records it
    pub frame_count: Option<usize>,
}

impl ScanHeader {
    /// Text used for modality matching: description, else protocol name
    pub fn description(&self) -> &str {
        if self.series_description.is_empty() {
            &self.protocol_name
        } else {
            &self.series_description
        }
    }
}

/// Source of acquisition headers for study directories
pub trait HeaderReader {
    /// File whose header stands for the whole study directory
    ///
    /// Default: first regular file in name order. An empty directory is an
    /// error since the study cannot be classified.
    fn representative_file(&self, dir: &Path) -> Result<PathBuf> {
        sorted_files(dir)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmptyStudy(dir.to_path_buf()))
    }

    fn read_header(&self, path: &Path) -> Result<ScanHeader>;
}

/// Regular files directly inside `dir`, sorted by name
pub fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Reads headers straight from DICOM files
#[derive(Debug, Clone, Copy, Default)]
pub struct DicomHeaderReader;

impl HeaderReader for DicomHeaderReader {
    fn read_header(&self, path: &Path) -> Result<ScanHeader> {
        use dicom::dictionary_std::tags;
        use dicom::object::OpenFileOptions;

        let obj = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)
            .map_err(|e| Error::Header {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let text = |tag: dicom::core::Tag| {
            obj.element(tag)
                .ok()
                .and_then(|e| e.to_str().ok())
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let image_type: Vec<String> = obj
            .element(tags::IMAGE_TYPE)
            .ok()
            .and_then(|e| e.to_multi_str().ok())
            .map(|values| values.iter().map(|v| v.trim().to_string()).collect())
            .unwrap_or_default();

        Ok(ScanHeader {
            image_type,
            protocol_name: text(tags::PROTOCOL_NAME),
            series_description: text(tags::SERIES_DESCRIPTION),
            frame_count: None,
        })
    }
}

/// Reads headers from dcm2niix JSON sidecars
///
/// The representative file of a directory is its first `.json` file.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarHeaderReader;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Sidecar {
    #[serde(default)]
    image_type: Vec<String>,
    #[serde(default)]
    protocol_name: String,
    #[serde(default)]
    series_description: String,
}

impl SidecarHeaderReader {
    /// Sidecar path for an image: `x.nii.gz` / `x.nii` → `x.json`
    pub fn sidecar_for(image: &Path) -> PathBuf {
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = name
            .strip_suffix(".nii.gz")
            .or_else(|| name.strip_suffix(".nii"))
            .unwrap_or(&name);
        image.with_file_name(format!("{}.json", stem))
    }
}

impl HeaderReader for SidecarHeaderReader {
    fn representative_file(&self, dir: &Path) -> Result<PathBuf> {
        sorted_files(dir)?
            .into_iter()
            .find(|p| p.extension().map_or(false, |ext| ext == "json"))
            .ok_or_else(|| Error::EmptyStudy(dir.to_path_buf()))
    }

    fn read_header(&self, path: &Path) -> Result<ScanHeader> {
        let content = fs::read_to_string(path)?;
        let sidecar: Sidecar = serde_json::from_str(&content).map_err(|e| Error::Header {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(ScanHeader {
            image_type: sidecar.image_type,
            protocol_name: sidecar.protocol_name,
            series_description: sidecar.series_description,
            frame_count: None,
        })
    }
}
