use std::fs::File;
use std::hash::Hash;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use cqdb::CQDBWriter;

use crate::binary::BinaryPerceptron;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::model::{
    ModelFlags, ModelKind, CHUNK_SIZE, HEADER_SIZE, MAGIC, NO_LABEL, VERSION, WEIGHT_SIZE,
};
use crate::multiclass::Perceptron;
use crate::sequence::{Decoding, SequencePerceptron, TransitionFeatures};
use crate::weight::Weight;

/// A finalized model flattened for serialization
struct Record<'a> {
    kind: ModelKind,
    flags: ModelFlags,
    order: u32,
    time: u64,
    /// Labels in registration order
    labels: Vec<&'a str>,
    /// `(feature, label id or NO_LABEL, value)`
    weights: Vec<(&'a str, u32, f64)>,
}

fn to_u32<T: TryInto<u32>>(value: T) -> Result<u32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidModel("model does not fit into 32-bit offsets"))
}

/// Write a finalized model in the `lPCP` format
struct ModelWriter;

impl ModelWriter {
    fn write<W: Write + Seek>(writer: &mut W, record: &Record<'_>) -> Result<()> {
        let begin = writer.stream_position()?;

        // Feature ids follow the sorted feature strings
        let mut names: Vec<&str> = record.weights.iter().map(|&(f, _, _)| f).collect();
        names.sort_unstable();
        names.dedup();
        let mut features = Dictionary::new();
        for name in &names {
            features.get_or_insert(name);
        }
        let mut entries: Vec<(u32, u32, f64)> = record
            .weights
            .iter()
            .filter_map(|&(f, label, value)| features.id(f).map(|fid| (fid, label, value)))
            .collect();
        entries.sort_unstable_by_key(|&(fid, label, _)| (fid, label));

        // Header is rewritten once the offsets are known
        writer.write_all(&[0; HEADER_SIZE])?;

        let off_weights = to_u32(writer.stream_position()? - begin)?;
        Self::write_weights(writer, &entries)?;

        let off_labels = to_u32(writer.stream_position()? - begin)?;
        Self::write_cqdb(writer, record.labels.iter().copied())?;

        let off_features = to_u32(writer.stream_position()? - begin)?;
        Self::write_cqdb(writer, features.iter().copied())?;

        let end = writer.stream_position()?;
        writer.seek(SeekFrom::Start(begin))?;
        writer.write_all(MAGIC)?;
        writer.write_all(&to_u32(end - begin)?.to_le_bytes())?;
        writer.write_all(record.kind.tag())?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&record.flags.bits().to_le_bytes())?;
        writer.write_all(&record.order.to_le_bytes())?;
        writer.write_all(&record.time.to_le_bytes())?;
        writer.write_all(&to_u32(record.labels.len())?.to_le_bytes())?;
        writer.write_all(&to_u32(features.len())?.to_le_bytes())?;
        writer.write_all(&to_u32(entries.len())?.to_le_bytes())?;
        writer.write_all(&off_weights.to_le_bytes())?;
        writer.write_all(&off_labels.to_le_bytes())?;
        writer.write_all(&off_features.to_le_bytes())?;
        writer.seek(SeekFrom::Start(end))?;
        writer.flush()?;
        Ok(())
    }

    /// Write the weight chunk
    fn write_weights<W: Write>(writer: &mut W, entries: &[(u32, u32, f64)]) -> Result<()> {
        let count = to_u32(entries.len())?;
        let size = to_u32(CHUNK_SIZE as u64 + count as u64 * WEIGHT_SIZE as u64)?;
        writer.write_all(b"WGHT")?;
        writer.write_all(&size.to_le_bytes())?;
        writer.write_all(&count.to_le_bytes())?;
        for &(fid, label, value) in entries {
            writer.write_all(&fid.to_le_bytes())?;
            writer.write_all(&label.to_le_bytes())?;
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    /// Write a CQDB dictionary, ids following iteration order
    fn write_cqdb<'s, W, I>(writer: &mut W, values: I) -> io::Result<()>
    where
        W: Write + Seek,
        I: Iterator<Item = &'s str>,
    {
        let mut db = CQDBWriter::new(writer)?;
        for (id, value) in values.enumerate() {
            db.put(value, id as u32)?;
        }
        // The database is flushed when the writer drops
        Ok(())
    }
}

fn ensure_finalized(finalized: bool) -> Result<()> {
    if finalized {
        Ok(())
    } else {
        Err(Error::InvalidInput("only finalized models can be written"))
    }
}

fn save_to<P: AsRef<Path>>(path: P, record: &Record<'_>) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    ModelWriter::write(&mut file, record)
}

impl<F, W> BinaryPerceptron<F, W>
where
    F: Hash + Eq + Clone + AsRef<str>,
    W: Weight,
{
    fn record(&self) -> Result<Record<'_>> {
        ensure_finalized(self.finalized)?;
        let mut flags = ModelFlags::BINARY;
        flags.set(ModelFlags::AVERAGED, W::AVERAGED);
        Ok(Record {
            kind: ModelKind::Binary,
            flags,
            order: 0,
            time: self.time,
            labels: Vec::new(),
            weights: self
                .weights
                .iter()
                .map(|(f, value)| (f.as_ref(), NO_LABEL, value))
                .collect(),
        })
    }

    /// Serialize the finalized model into `writer`
    pub fn write<S: Write + Seek>(&self, writer: &mut S) -> Result<()> {
        ModelWriter::write(writer, &self.record()?)
    }

    /// Serialize the finalized model into the file at `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_to(path, &self.record()?)
    }
}

impl<F, L, W> Perceptron<F, L, W>
where
    F: Hash + Eq + Clone + AsRef<str>,
    L: Hash + Eq + Clone + AsRef<str>,
    W: Weight,
{
    fn record(&self, kind: ModelKind) -> Result<Record<'_>> {
        ensure_finalized(self.finalized)?;
        let mut flags = ModelFlags::empty();
        flags.set(ModelFlags::AVERAGED, W::AVERAGED);
        Ok(Record {
            kind,
            flags,
            order: 0,
            time: self.time,
            labels: self.classes.iter().map(|label| label.as_ref()).collect(),
            weights: self
                .weights
                .iter()
                .map(|(f, class, value)| (f.as_ref(), class, value))
                .collect(),
        })
    }

    /// Serialize the finalized model into `writer`
    pub fn write<S: Write + Seek>(&self, writer: &mut S) -> Result<()> {
        ModelWriter::write(writer, &self.record(ModelKind::Multiclass)?)
    }

    /// Serialize the finalized model into the file at `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_to(path, &self.record(ModelKind::Multiclass)?)
    }
}

impl<F, L, T, W> SequencePerceptron<F, L, T, W>
where
    F: Hash + Eq + Clone + AsRef<str>,
    L: Hash + Eq + Clone + AsRef<str>,
    T: TransitionFeatures<L, F>,
    W: Weight,
{
    /// The transition function is not stored; supply it again on load.
    fn record(&self) -> Result<Record<'_>> {
        let mut record = self.base.record(ModelKind::Sequence)?;
        record.flags.insert(ModelFlags::SEQUENCE);
        if self.decoding() == Decoding::Viterbi {
            record.flags.insert(ModelFlags::VITERBI);
        }
        record.order = to_u32(self.order())?;
        Ok(record)
    }

    /// Serialize the finalized model into `writer`
    pub fn write<S: Write + Seek>(&self, writer: &mut S) -> Result<()> {
        ModelWriter::write(writer, &self.record()?)
    }

    /// Serialize the finalized model into the file at `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_to(path, &self.record()?)
    }
}
