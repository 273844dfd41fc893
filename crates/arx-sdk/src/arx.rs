use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use arx_archive::{
    ArchiveResult, ByteSink, ByteSource, IoSink, IoSource, Persist, Reader, RegistrationGuard,
    RegistrationKey, Registry, Writer,
};
use tracing::debug;

use crate::config::ArxConfig;
use crate::error::{SdkError, SdkResult};
use crate::format::Format;

/// Entry point for applications: a registry plus codec settings.
///
/// `Arx` is `Send + Sync`. Each save or load runs a single-threaded session,
/// so independent sessions can run on many threads over one instance.
#[derive(Debug, Default)]
pub struct Arx {
    registry: Arc<Registry>,
    config: ArxConfig,
}

impl Arx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ArxConfig) -> Self {
        Self::with_registry(Arc::new(Registry::new()), config)
    }

    /// Share an existing registry, e.g. one populated by a host subsystem.
    pub fn with_registry(registry: Arc<Registry>, config: ArxConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &ArxConfig {
        &self.config
    }

    /// Register `T` for polymorphic use with every format.
    pub fn register<T: Persist>(&self) -> Vec<RegistrationKey> {
        Format::ALL
            .iter()
            .flat_map(|format| self.registry.register_type::<T>(format.kind()))
            .collect()
    }

    /// Like [`Arx::register`], undone when the guard drops.
    pub fn register_scoped<T: Persist>(&self) -> RegistrationGuard {
        let kinds: Vec<_> = Format::ALL.iter().map(|format| format.kind()).collect();
        self.registry.scoped_type::<T>(&kinds)
    }

    /// Open a writer in `format`. The header is written immediately.
    pub fn writer<'a>(
        &'a self,
        sink: &'a mut dyn ByteSink,
        format: Format,
    ) -> ArchiveResult<Writer<'a>> {
        match format {
            Format::Binary => arx_binary::writer(sink, &self.registry, &self.config.binary),
            Format::Text => arx_text::writer(sink, &self.registry, &self.config.text),
        }
    }

    /// Open a reader expecting `format`. A different encoding fails with
    /// `UnrecognizedArchiveFormat`.
    pub fn reader<'a>(
        &'a self,
        source: &'a mut dyn ByteSource,
        format: Format,
    ) -> ArchiveResult<Reader<'a>> {
        match format {
            Format::Binary => arx_binary::reader(source, &self.registry, &self.config.binary),
            Format::Text => arx_text::reader(source, &self.registry, &self.config.text),
        }
    }

    /// Save in the configured default format.
    pub fn save_to_vec(
        &self,
        write: impl FnOnce(&mut Writer<'_>) -> ArchiveResult<()>,
    ) -> SdkResult<Vec<u8>> {
        self.save_to_vec_as(self.config.format, write)
    }

    pub fn save_to_vec_as(
        &self,
        format: Format,
        write: impl FnOnce(&mut Writer<'_>) -> ArchiveResult<()>,
    ) -> SdkResult<Vec<u8>> {
        let mut sink = Vec::new();
        {
            let mut out = self.writer(&mut sink, format)?;
            write(&mut out)?;
            out.finish()?;
        }
        debug!(%format, bytes = sink.len(), "saved archive to memory");
        Ok(sink)
    }

    /// Load from memory, detecting the format from the leading bytes.
    pub fn load_from_slice<R>(
        &self,
        bytes: &[u8],
        read: impl FnOnce(&mut Reader<'_>) -> ArchiveResult<R>,
    ) -> SdkResult<R> {
        let format = detect(bytes)?;
        self.load_from_slice_as(format, bytes, read)
    }

    pub fn load_from_slice_as<R>(
        &self,
        format: Format,
        bytes: &[u8],
        read: impl FnOnce(&mut Reader<'_>) -> ArchiveResult<R>,
    ) -> SdkResult<R> {
        let mut source = bytes;
        let mut input = self.reader(&mut source, format)?;
        let value = read(&mut input)?;
        debug!(%format, identities = input.tracked_count(), "loaded archive from memory");
        Ok(value)
    }

    /// Save to a file in the configured default format, replacing it.
    pub fn save_to_file(
        &self,
        path: impl AsRef<Path>,
        write: impl FnOnce(&mut Writer<'_>) -> ArchiveResult<()>,
    ) -> SdkResult<()> {
        let path = path.as_ref();
        let format = self.config.format;
        let mut sink = IoSink::new(BufWriter::new(File::create(path)?));
        {
            let mut out = self.writer(&mut sink, format)?;
            write(&mut out)?;
            out.finish()?;
        }
        sink.close()?;
        debug!(path = %path.display(), %format, "saved archive to file");
        Ok(())
    }

    /// Load from a file, detecting the format from its leading bytes.
    pub fn load_from_file<R>(
        &self,
        path: impl AsRef<Path>,
        read: impl FnOnce(&mut Reader<'_>) -> ArchiveResult<R>,
    ) -> SdkResult<R> {
        let path = path.as_ref();
        let mut buffered = BufReader::new(File::open(path)?);
        let format = detect(buffered.fill_buf()?)?;
        let mut source = IoSource::new(buffered);
        let mut input = self.reader(&mut source, format)?;
        let value = read(&mut input)?;
        debug!(path = %path.display(), %format, "loaded archive from file");
        Ok(value)
    }
}

fn detect(prefix: &[u8]) -> SdkResult<Format> {
    Format::detect(prefix)
        .ok_or_else(|| SdkError::UnknownFormat(hex::encode(&prefix[..prefix.len().min(8)])))
}
