use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot recover checkpoint data from {path}: {detail}")]
    Corrupt { path: PathBuf, detail: String },
    #[error("duplicate checkpoint key: {key}")]
    DuplicateKey { key: String },
}

#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    fields: Vec<String>,
    flush_interval: usize,
    need_header: bool,
    recovered: HashSet<String>,
    written: HashSet<String>,
    buffer: Vec<Vec<String>>,
    writer: Option<csv::Writer<File>>,
}

impl CheckpointStore {
    pub fn open(path: &Path, fields: &[&str], flush_interval: usize) -> Result<Self> {
        if flush_interval == 0 {
            bail!("flush interval must be at least 1");
        }
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();

        let (recovered, need_header) = match fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => (recover_keys(path, &fields)?, false),
            Ok(_) => (HashSet::new(), true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => (HashSet::new(), true),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to inspect checkpoint: {}", path.display()));
            }
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create directory: {}", parent.display())
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open checkpoint for append: {}", path.display()))?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        Ok(Self {
            path: path.to_path_buf(),
            fields,
            flush_interval,
            need_header,
            recovered,
            written: HashSet::new(),
            buffer: Vec::new(),
            writer: Some(writer),
        })
    }

    pub fn recovered(&self) -> &HashSet<String> {
        &self.recovered
    }

    pub fn write(&mut self, key: &str, values: &[String]) -> Result<()> {
        if self.writer.is_none() {
            bail!("checkpoint store is closed: {}", self.path.display());
        }
        if values.len() + 1 != self.fields.len() {
            bail!(
                "checkpoint record for {key} has {} values, store has {} data fields",
                values.len(),
                self.fields.len() - 1
            );
        }
        if !self.written.insert(key.to_string()) {
            return Err(StoreError::DuplicateKey {
                key: key.to_string(),
            }
            .into());
        }

        let mut record = Vec::with_capacity(self.fields.len());
        record.push(key.to_string());
        record.extend(values.iter().cloned());
        self.buffer.push(record);

        if self.buffer.len() >= self.flush_interval {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            bail!("checkpoint store is closed: {}", self.path.display());
        };

        if self.need_header {
            writer
                .write_record(&self.fields)
                .with_context(|| format!("failed to write header: {}", self.path.display()))?;
            self.need_header = false;
        }
        for record in &self.buffer {
            writer
                .write_record(record)
                .with_context(|| format!("failed to append record: {}", self.path.display()))?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to flush checkpoint: {}", self.path.display()))?;
        self.buffer.clear();
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if self.writer.is_none() {
            return Ok(());
        }
        self.flush()?;
        self.writer = None;
        Ok(())
    }
}

fn recover_keys(path: &Path, fields: &[String]) -> Result<HashSet<String>> {
    let corrupt = |detail: String| StoreError::Corrupt {
        path: path.to_path_buf(),
        detail,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to read checkpoint: {}", path.display()))?;

    let mut records = reader.records();
    let header = match records.next() {
        Some(Ok(record)) => record,
        Some(Err(err)) => return Err(corrupt(err.to_string()).into()),
        None => return Ok(HashSet::new()),
    };
    if header.iter().ne(fields.iter().map(String::as_str)) {
        let found: Vec<&str> = header.iter().collect();
        return Err(corrupt(format!(
            "header {:?} does not match expected fields {:?}",
            found, fields
        ))
        .into());
    }

    let mut recovered = HashSet::new();
    let mut duplicates = 0_usize;
    for record in records {
        let record = record.map_err(|err| corrupt(err.to_string()))?;
        let Some(key) = record.get(0) else {
            return Err(corrupt("record with no key column".to_string()).into());
        };
        if !recovered.insert(key.to_string()) {
            duplicates += 1;
        }
    }
    if duplicates > 0 {
        warn!(
            path = %path.display(),
            duplicates,
            "checkpoint contains duplicate keys; keeping one record per key"
        );
    }
    Ok(recovered)
}

pub struct JsonCheckpoint {
    path: PathBuf,
    flush_interval: usize,
    saved: BTreeSet<String>,
    buffer: BTreeMap<String, serde_json::Value>,
}

impl JsonCheckpoint {
    pub fn open(path: &Path, flush_interval: usize) -> Result<Self> {
        if flush_interval == 0 {
            bail!("flush interval must be at least 1");
        }
        let saved = match load_json_map(path)? {
            Some(map) => map.keys().cloned().collect(),
            None => BTreeSet::new(),
        };
        Ok(Self {
            path: path.to_path_buf(),
            flush_interval,
            saved,
            buffer: BTreeMap::new(),
        })
    }

    pub fn saved_keys(&self) -> &BTreeSet<String> {
        &self.saved
    }

    pub fn write(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        if self.buffer.contains_key(key) {
            return Err(StoreError::DuplicateKey {
                key: key.to_string(),
            }
            .into());
        }
        self.buffer.insert(key.to_string(), value);
        if self.buffer.len() >= self.flush_interval {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut merged = load_json_map(&self.path)?.unwrap_or_default();
        for (key, value) in &self.buffer {
            if merged.contains_key(key) {
                return Err(StoreError::DuplicateKey { key: key.clone() }.into());
            }
            merged.insert(key.clone(), value.clone());
        }

        let data = serde_json::to_vec_pretty(&merged)
            .with_context(|| format!("failed to serialize checkpoint: {}", self.path.display()))?;
        let tmp_path = self.path.with_extension("tmp");
        let mut tmp = File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        tmp.write_all(&data)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        tmp.write_all(b"\n")
            .with_context(|| format!("failed to finalize {}", tmp_path.display()))?;
        drop(tmp);
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "failed to replace {} with {}",
                self.path.display(),
                tmp_path.display()
            )
        })?;

        self.saved.extend(std::mem::take(&mut self.buffer).into_keys());
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

fn load_json_map(path: &Path) -> Result<Option<serde_json::Map<String, serde_json::Value>>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    if raw.is_empty() {
        return Ok(None);
    }
    match serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(&raw) {
        Ok(map) => Ok(Some(map)),
        Err(err) => Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            detail: err.to_string(),
        }
        .into()),
    }
}
