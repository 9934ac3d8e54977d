//! Catalog assembly

use crate::LibraryError;
use crate::extractor::MetadataExtractor;
use crate::record::TitleRecord;
use crate::scanner::DirectorySource;
use crate::source::{Candidate, CandidateOrigin, TitleSource};
use crate::task::CancelToken;
use serde::{Deserialize, Serialize};

/// Ordered collection of visible titles
///
/// Order is scan order: directory titles first, then document tree titles.
/// Serials are not deduplicated across sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    records: Vec<TitleRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap records as-is, without filtering
    pub fn from_records(records: Vec<TitleRecord>) -> Self {
        Self { records }
    }

    /// Concatenate directory and document tree records, dropping add-ons
    pub fn merge(directory: Vec<TitleRecord>, document: Vec<TitleRecord>) -> Self {
        let records = directory
            .into_iter()
            .chain(document)
            .filter(|record| {
                if record.category.is_addon() {
                    tracing::debug!("Hiding add-on {} from catalog", record.serial);
                    false
                } else {
                    true
                }
            })
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[TitleRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TitleRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record with the given serial, in catalog order
    pub fn find<'a>(&'a self, serial: &'a str) -> impl Iterator<Item = &'a TitleRecord> + 'a {
        self.records.iter().filter(move |r| r.serial == serial)
    }

    pub fn into_records(self) -> Vec<TitleRecord> {
        self.records
    }

    /// Same records regardless of order
    pub fn same_titles(&self, other: &Catalog) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut remaining: Vec<&TitleRecord> = other.records.iter().collect();
        self.records.iter().all(|record| {
            match remaining.iter().position(|candidate| *candidate == record) {
                Some(index) => {
                    remaining.swap_remove(index);
                    true
                }
                None => false,
            }
        })
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a TitleRecord;
    type IntoIter = std::slice::Iter<'a, TitleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Extract a record for every candidate of `source`
///
/// A candidate whose extraction fails is logged and skipped. The cancel
/// token is checked before each candidate.
pub fn collect_records(
    source: &dyn TitleSource,
    extractor: &dyn MetadataExtractor,
    cancel: &CancelToken,
) -> Result<Vec<TitleRecord>, LibraryError> {
    let candidates = source.enumerate();
    tracing::debug!("{}: {} candidates", source.label(), candidates.len());

    let mut records = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if cancel.is_cancelled() {
            tracing::info!("Scan of {} cancelled", source.label());
            return Err(LibraryError::Cancelled);
        }

        if let Some(record) = extract_candidate(source, extractor, &candidate) {
            records.push(record);
        }
    }

    Ok(records)
}

fn extract_candidate(
    source: &dyn TitleSource,
    extractor: &dyn MetadataExtractor,
    candidate: &Candidate,
) -> Option<TitleRecord> {
    match &candidate.origin {
        CandidateOrigin::Directory(dir) => {
            let Some(path) = dir.to_str() else {
                tracing::warn!("Skipping {}: path is not valid UTF-8", dir.display());
                return None;
            };

            match extractor.extract_dir(dir) {
                Ok(mut record) => {
                    if record.install_path.is_none() {
                        record.install_path = Some(path.to_string());
                    }
                    if record.icon.is_none() {
                        record.icon = DirectorySource::read_icon(dir);
                    }
                    Some(record)
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", dir.display(), e);
                    None
                }
            }
        }
        CandidateOrigin::Document(handle) => {
            let reader = match source.open(candidate) {
                Ok(reader) => reader,
                Err(e) => {
                    tracing::warn!("Cannot open {}: {}", candidate.display_name, e);
                    return None;
                }
            };

            match extractor.extract_stream(reader, &candidate.display_name) {
                Ok(Some(mut record)) => {
                    record.iso_source_reference = Some(handle.to_string());
                    record.install_path = None;
                    Some(record)
                }
                Ok(None) => {
                    tracing::warn!("No title in {}", candidate.display_name);
                    None
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", candidate.display_name, e);
                    None
                }
            }
        }
    }
}
