//! Reading sessions back.

use std::path::Path;

use logir_adapters::storage::SessionLayout;
use logir_adapters::stream::{ColumnarImage, aggregate_stream};
use logir_common::types::LogRecord;
use logir_common::utils::error::{Error, Result};
use logir_core::dictionary::DecompressionDictionary;
use logir_core::ir::{Decoder, files};

use crate::config::IrFormat;
use crate::metadata::SessionMetadata;
use crate::session::MemoryStreams;

/// A closed session loaded for decoding.
///
/// Combined-stream sessions are aggregated into columns on load, so both
/// layouts decode the same way.
#[derive(Debug)]
pub struct SessionReader {
    metadata: SessionMetadata,
    logtypes: DecompressionDictionary,
    variables: DecompressionDictionary,
    image: ColumnarImage,
    records: usize,
}

impl SessionReader {
    /// Loads the session stored under `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if a stream cannot be read, or a decode error if
    /// the metadata or streams are malformed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let layout = SessionLayout::new(path.as_ref());
        let metadata = SessionMetadata::read(layout.metadata())?;
        Self::load(metadata, |name| layout.read(name))
    }

    /// Loads the streams of an in-memory session.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the streams are malformed.
    pub fn from_memory(streams: &MemoryStreams) -> Result<Self> {
        Self::load(streams.metadata(), |name| {
            streams
                .get(name)
                .ok_or_else(|| Error::Config(format!("in-memory session has no {name} stream")))
        })
    }

    fn load<F>(metadata: SessionMetadata, mut read: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<Vec<u8>>,
    {
        let image = match metadata.format {
            IrFormat::Columnar => ColumnarImage {
                logtype_dictionary: read(files::LOGTYPE_DICTIONARY)?,
                variable_dictionary: read(files::VARIABLE_DICTIONARY)?,
                timestamps: read(files::TIMESTAMPS)?,
                logtype_ids: read(files::LOGTYPE_IDS)?,
                variables: read(files::VARIABLES)?,
            },
            IrFormat::Stream => aggregate_stream(metadata.width(), &read(files::COMBINED)?)?,
        };
        let (logtypes, variables) = image.dictionaries()?;
        let records = Decoder::new(metadata.width(), &logtypes, &variables, image.columns())?.record_count();

        Ok(Self {
            metadata,
            logtypes,
            variables,
            image,
            records,
        })
    }

    /// Returns the session metadata.
    #[must_use]
    pub fn metadata(&self) -> SessionMetadata {
        self.metadata
    }

    /// Returns the logtype dictionary.
    #[must_use]
    pub fn logtypes(&self) -> &DecompressionDictionary {
        &self.logtypes
    }

    /// Returns the variable dictionary.
    #[must_use]
    pub fn variables(&self) -> &DecompressionDictionary {
        &self.variables
    }

    /// Returns the number of records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Iterates over the records in write order.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Corrupt`](logir_common::DecodeError::Corrupt)
    /// if the columns disagree on the record count.
    pub fn records(&self) -> Result<Decoder<'_>> {
        Ok(Decoder::new(
            self.metadata.width(),
            &self.logtypes,
            &self.variables,
            self.image.columns(),
        )?)
    }

    /// Decodes every record.
    ///
    /// # Errors
    ///
    /// Returns the first decode error.
    pub fn read_all(&self) -> Result<Vec<LogRecord>> {
        self.records()?.map(|record| record.map_err(Error::from)).collect()
    }
}
