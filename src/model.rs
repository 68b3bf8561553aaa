use std::fmt;
use std::hash::Hash;
use std::io::{self, Write};

use bitflags::bitflags;
use bstr::ByteSlice;
use cqdb::CQDB;

use crate::binary::BinaryPerceptron;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::multiclass::Perceptron;
use crate::sequence::{Decoding, SequencePerceptron, TransitionFeatures};
use crate::store::{ClassWeights, WeightMap};
use crate::weight::Weight;

pub(crate) const MAGIC: &[u8; 4] = b"lPCP";
pub(crate) const VERSION: u32 = 100;
pub(crate) const HEADER_SIZE: usize = 56;
pub(crate) const CHUNK_SIZE: usize = 12;
pub(crate) const WEIGHT_SIZE: usize = 16;
/// Label id stored for weights that belong to no class
pub(crate) const NO_LABEL: u32 = u32::MAX;

#[inline]
pub(crate) fn unpack_u32(buf: &[u8]) -> io::Result<u32> {
    if buf.len() < 4 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "not enough data for unpacking u32",
        ));
    }
    Ok(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

#[inline]
fn unpack_u64(buf: &[u8]) -> io::Result<u64> {
    if buf.len() < 8 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "not enough data for unpacking u64",
        ));
    }
    Ok(u64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ]))
}

#[inline]
fn unpack_f64(buf: &[u8]) -> io::Result<f64> {
    unpack_u64(buf).map(f64::from_bits)
}

bitflags! {
    /// Properties of a stored model
    #[derive(Default)]
    pub struct ModelFlags: u32 {
        /// Weights have no class
        const BINARY = 0x01;
        /// Model decodes token sequences
        const SEQUENCE = 0x02;
        /// Weights were averaged over training time
        const AVERAGED = 0x04;
        /// Sequences are decoded with the Viterbi trellis
        const VITERBI = 0x08;
    }
}

/// Which model a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Binary,
    Multiclass,
    Sequence,
}

impl ModelKind {
    pub(crate) fn tag(self) -> &'static [u8; 4] {
        match self {
            ModelKind::Binary => b"BINY",
            ModelKind::Multiclass => b"MULT",
            ModelKind::Sequence => b"SEQN",
        }
    }

    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"BINY" => Some(ModelKind::Binary),
            b"MULT" => Some(ModelKind::Multiclass),
            b"SEQN" => Some(ModelKind::Sequence),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Header {
    size: u32,
    kind: ModelKind,
    version: u32,
    flags: ModelFlags,
    order: u32,
    time: u64,
    num_labels: u32,
    num_features: u32,
    num_weights: u32,
    off_weights: u32,
    off_labels: u32,
    off_features: u32,
}

/// One stored weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    /// Feature id
    pub feature: u32,
    /// Class id, `None` for binary models
    pub label: Option<u32>,
    pub value: f64,
}

/// A serialized model, read in place from a byte buffer
#[derive(Clone)]
pub struct ModelFile<'a> {
    buffer: &'a [u8],
    header: Header,
    labels: CQDB<'a>,
    features: CQDB<'a>,
}

impl<'a> fmt::Debug for ModelFile<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFile")
            .field("header", &self.header)
            .field("labels", &self.labels)
            .field("features", &self.features)
            .finish()
    }
}

impl<'a> ModelFile<'a> {
    /// Parse a model held in memory
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::InvalidModel("buffer too small"));
        }
        if &buf[0..4] != MAGIC {
            return Err(Error::InvalidModel("magic mismatch"));
        }
        let mut index = 4;
        let size = unpack_u32(&buf[index..])?;
        index += 4;
        let kind = ModelKind::from_tag(&buf[index..index + 4])
            .ok_or(Error::InvalidModel("unknown model type"))?;
        index += 4;
        let version = unpack_u32(&buf[index..])?;
        if version != VERSION {
            return Err(Error::InvalidModel("unsupported version"));
        }
        index += 4;
        let flags = ModelFlags::from_bits(unpack_u32(&buf[index..])?)
            .ok_or(Error::InvalidModel("unknown flags"))?;
        index += 4;
        let order = unpack_u32(&buf[index..])?;
        index += 4;
        let time = unpack_u64(&buf[index..])?;
        index += 8;
        let num_labels = unpack_u32(&buf[index..])?;
        index += 4;
        let num_features = unpack_u32(&buf[index..])?;
        index += 4;
        let num_weights = unpack_u32(&buf[index..])?;
        index += 4;
        let off_weights = unpack_u32(&buf[index..])?;
        index += 4;
        let off_labels = unpack_u32(&buf[index..])?;
        index += 4;
        let off_features = unpack_u32(&buf[index..])?;
        let header = Header {
            size,
            kind,
            version,
            flags,
            order,
            time,
            num_labels,
            num_features,
            num_weights,
            off_weights,
            off_labels,
            off_features,
        };

        let size = size as usize;
        if size > buf.len() {
            return Err(Error::InvalidModel("truncated model"));
        }
        let buf = &buf[..size];
        let weights_end = off_weights as usize + CHUNK_SIZE + WEIGHT_SIZE * num_weights as usize;
        if weights_end > size || off_labels as usize >= size || off_features as usize >= size {
            return Err(Error::InvalidModel("offset out of range"));
        }
        let chunk = &buf[off_weights as usize..];
        if &chunk[0..4] != b"WGHT" || unpack_u32(&chunk[8..])? != num_weights {
            return Err(Error::InvalidModel("corrupted weight chunk"));
        }
        let labels = CQDB::new(&buf[off_labels as usize..])?;
        let features = CQDB::new(&buf[off_features as usize..])?;
        Ok(Self {
            buffer: buf,
            header,
            labels,
            features,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.header.kind
    }

    pub fn flags(&self) -> ModelFlags {
        self.header.flags
    }

    /// Markov order of a sequence model, zero otherwise
    pub fn order(&self) -> u32 {
        self.header.order
    }

    /// Logical time the model was finalized at
    pub fn time(&self) -> u64 {
        self.header.time
    }

    /// Size of the model in bytes
    pub fn size(&self) -> u32 {
        self.header.size
    }

    /// Number of labels
    pub fn num_labels(&self) -> u32 {
        self.header.num_labels
    }

    /// Number of features
    pub fn num_features(&self) -> u32 {
        self.header.num_features
    }

    /// Number of stored weights
    pub fn num_weights(&self) -> u32 {
        self.header.num_weights
    }

    /// Convert a label ID to label string
    pub fn to_label(&self, lid: u32) -> Option<&str> {
        self.labels.to_str(lid).and_then(|s| s.to_str().ok())
    }

    /// Convert a label string to label ID
    pub fn to_label_id(&self, value: &str) -> Option<u32> {
        self.labels.to_id(value)
    }

    /// Convert a feature ID to feature string
    pub fn to_feature(&self, fid: u32) -> Option<&str> {
        self.features.to_str(fid).and_then(|s| s.to_str().ok())
    }

    /// Convert a feature string to feature ID
    pub fn to_feature_id(&self, value: &str) -> Option<u32> {
        self.features.to_id(value)
    }

    /// The `index`-th stored weight; weights are sorted by feature, then label
    pub fn entry(&self, index: u32) -> Result<Entry> {
        if index >= self.header.num_weights {
            return Err(Error::InvalidInput("weight index out of range"));
        }
        let mut offset = self.header.off_weights as usize + CHUNK_SIZE;
        offset += WEIGHT_SIZE * index as usize;
        let feature = unpack_u32(&self.buffer[offset..])?;
        let label = unpack_u32(&self.buffer[offset + 4..])?;
        let value = unpack_f64(&self.buffer[offset + 8..])?;
        Ok(Entry {
            feature,
            label: (label != NO_LABEL).then_some(label),
            value,
        })
    }

    /// Iterate over all stored weights
    pub fn entries(&self) -> impl Iterator<Item = Result<Entry>> + '_ {
        (0..self.header.num_weights).map(move |i| self.entry(i))
    }

    fn ensure_kind(&self, kind: ModelKind) -> Result<()> {
        if self.header.kind == kind {
            Ok(())
        } else {
            Err(Error::InvalidModel("model type mismatch"))
        }
    }

    fn feature_name(&self, fid: u32) -> Result<&str> {
        self.to_feature(fid)
            .ok_or(Error::InvalidModel("dangling feature id"))
    }

    fn classes<L>(&self) -> Result<Dictionary<L>>
    where
        L: Hash + Eq + Clone + for<'s> From<&'s str>,
    {
        let mut classes = Dictionary::new();
        for lid in 0..self.header.num_labels {
            let name = self
                .to_label(lid)
                .ok_or(Error::InvalidModel("dangling label id"))?;
            if classes.get_or_insert(&L::from(name)) != lid {
                return Err(Error::InvalidModel("duplicate label"));
            }
        }
        Ok(classes)
    }

    fn class_weights<F, W>(&self) -> Result<ClassWeights<F, W>>
    where
        F: Hash + Eq + Clone + for<'s> From<&'s str>,
        W: Weight,
    {
        let mut weights = ClassWeights::new();
        for entry in self.entries() {
            let entry = entry?;
            let label = match entry.label {
                Some(label) if label < self.header.num_labels => label,
                _ => return Err(Error::InvalidModel("weight without a valid label")),
            };
            let feature = F::from(self.feature_name(entry.feature)?);
            weights.row_mut(feature).insert(label, entry.value);
        }
        Ok(weights)
    }

    /// Print the model in human-readable format
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        // Dump the file header
        writeln!(w, "FILEHEADER = {{")?;
        let header = &self.header;
        writeln!(w, "  magic: lPCP")?;
        writeln!(w, "  size: {}", header.size)?;
        writeln!(w, "  type: {}", header.kind.tag().as_bstr())?;
        writeln!(w, "  version: {}", header.version)?;
        writeln!(w, "  flags: {:?}", header.flags)?;
        writeln!(w, "  order: {}", header.order)?;
        writeln!(w, "  time: {}", header.time)?;
        writeln!(w, "  num_labels: {}", header.num_labels)?;
        writeln!(w, "  num_features: {}", header.num_features)?;
        writeln!(w, "  num_weights: {}", header.num_weights)?;
        writeln!(w, "  off_weights: {:#X}", header.off_weights)?;
        writeln!(w, "  off_labels: {:#X}", header.off_labels)?;
        writeln!(w, "  off_features: {:#X}", header.off_features)?;
        writeln!(w, "}}\n")?;
        // Dump the labels
        writeln!(w, "LABELS = {{")?;
        for i in 0..header.num_labels {
            writeln!(w, "  {:>5}: {}", i, self.to_label(i).unwrap_or("?"))?;
        }
        writeln!(w, "}}\n")?;
        // Dump the features
        writeln!(w, "FEATURES = {{")?;
        for i in 0..header.num_features {
            writeln!(w, "  {:>5}: {}", i, self.to_feature(i).unwrap_or("?"))?;
        }
        writeln!(w, "}}\n")?;
        // Dump the weights
        writeln!(w, "WEIGHTS = {{")?;
        for entry in self.entries() {
            let entry = entry.map_err(io::Error::other)?;
            let feature = self.to_feature(entry.feature).unwrap_or("?");
            match entry.label {
                Some(lid) => {
                    let label = self.to_label(lid).unwrap_or("?");
                    writeln!(w, "  {} --> {}: {:.6}", feature, label, entry.value)?;
                }
                None => writeln!(w, "  {}: {:.6}", feature, entry.value)?,
            }
        }
        writeln!(w, "}}\n")?;
        Ok(())
    }
}

impl<F, W> BinaryPerceptron<F, W>
where
    F: Hash + Eq + Clone + for<'s> From<&'s str>,
    W: Weight,
{
    /// Rebuild a finalized binary model
    pub fn from_model(model: &ModelFile<'_>) -> Result<Self> {
        model.ensure_kind(ModelKind::Binary)?;
        let mut weights = WeightMap::new();
        for entry in model.entries() {
            let entry = entry?;
            if entry.label.is_some() {
                return Err(Error::InvalidModel("binary weight with a label"));
            }
            weights.insert(F::from(model.feature_name(entry.feature)?), entry.value);
        }
        Ok(Self {
            weights,
            time: model.time(),
            finalized: true,
        })
    }
}

impl<F, L, W> Perceptron<F, L, W>
where
    F: Hash + Eq + Clone + for<'s> From<&'s str>,
    L: Hash + Eq + Clone + for<'s> From<&'s str>,
    W: Weight,
{
    fn from_parts(model: &ModelFile<'_>) -> Result<Self> {
        Ok(Self {
            classes: model.classes()?,
            weights: model.class_weights()?,
            time: model.time(),
            finalized: true,
        })
    }

    /// Rebuild a finalized multiclass model
    pub fn from_model(model: &ModelFile<'_>) -> Result<Self> {
        model.ensure_kind(ModelKind::Multiclass)?;
        Self::from_parts(model)
    }
}

impl<F, L, T, W> SequencePerceptron<F, L, T, W>
where
    F: Hash + Eq + Clone + for<'s> From<&'s str>,
    L: Hash + Eq + Clone + for<'s> From<&'s str>,
    T: TransitionFeatures<L, F>,
    W: Weight,
{
    /// Rebuild a finalized sequence model around `transitions`, which must
    /// be the function it was trained with
    pub fn from_model(model: &ModelFile<'_>, transitions: T) -> Result<Self> {
        model.ensure_kind(ModelKind::Sequence)?;
        let base = Perceptron::from_parts(model)?;
        let decoding = if model.flags().contains(ModelFlags::VITERBI) {
            Decoding::Viterbi
        } else {
            Decoding::Greedy
        };
        Ok(Self::with_base(base, transitions, model.order() as usize).with_decoding(decoding))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::weight::LazyWeight;

    fn sample() -> Vec<u8> {
        let mut model: Perceptron<String, String, LazyWeight> = Perceptron::new();
        let x = vec!["f1".to_string()];
        model.fit_one(&x, &"N".to_string()).unwrap();
        model.fit_one(&x, &"V".to_string()).unwrap();
        model.finalize().unwrap();
        let mut cursor = Cursor::new(Vec::new());
        model.write(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_model_new() {
        let buf = sample();
        let model = ModelFile::new(&buf).unwrap();
        assert_eq!(model.kind(), ModelKind::Multiclass);
        assert_eq!(model.flags(), ModelFlags::AVERAGED);
        assert_eq!(model.time(), 2);
        assert_eq!(model.num_labels(), 2);
        assert_eq!(model.num_features(), 1);
        assert_eq!(model.to_label(0), Some("N"));
        assert_eq!(model.to_label_id("V"), Some(1));
        assert_eq!(model.to_feature_id("f1"), Some(0));
        assert!(model.entry(model.num_weights()).is_err());

        let _debug = format!("{:?}", model);
    }

    #[test]
    fn test_invalid_model() {
        assert!(matches!(ModelFile::new(b""), Err(Error::InvalidModel(_))));

        let mut buf = sample();
        buf[0] = b'L';
        assert!(matches!(ModelFile::new(&buf), Err(Error::InvalidModel(_))));

        let buf = sample();
        assert!(ModelFile::new(&buf[..buf.len() - 1]).is_err());
    }

    #[test]
    fn test_model_dump() {
        let buf = sample();
        let model = ModelFile::new(&buf).unwrap();
        let mut out = Vec::new();
        model.dump(&mut out).unwrap();
        let out_str = std::str::from_utf8(&out).unwrap();
        // fit "N": nothing registered beforehand, so N wins and nothing moves.
        // fit "V": N is predicted, f1 gets N -1 and V +1 at time 1;
        // averaged over two ticks that is -0.5 and 0.5.
        assert!(out_str.starts_with("FILEHEADER = {\n  magic: lPCP\n"));
        assert!(out_str.contains("  type: MULT\n"));
        assert!(out_str.contains("  time: 2\n"));
        assert!(out_str.contains("LABELS = {\n      0: N\n      1: V\n}\n"));
        assert!(out_str.contains("WEIGHTS = {\n  f1 --> N: -0.500000\n  f1 --> V: 0.500000\n}\n"));
    }

    #[test]
    fn test_wrong_kind() {
        let buf = sample();
        let model = ModelFile::new(&buf).unwrap();
        let err = BinaryPerceptron::<String>::from_model(&model).unwrap_err();
        assert!(matches!(err, Error::InvalidModel(_)));
    }
}
