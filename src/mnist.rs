//! MNIST loading from IDX files.
//!
//! IDX is a big-endian format: a magic number (2051 for images, 2049 for
//! labels), the dimension sizes as `u32`, then raw `u8` data. Files may be
//! gzip-compressed, as they are distributed.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;

use crate::{Dataset, Error, Partitions, Result};

pub const IMAGES_MAGIC: u32 = 2051;
pub const LABELS_MAGIC: u32 = 2049;
pub const NUM_CLASSES: usize = 10;

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
pub const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

/// Reference split of the 60 000 training images.
pub const TRAIN_LEN: usize = 50_000;
pub const VALIDATION_LEN: usize = 10_000;

/// Upper bound on the buffer reserved from an IDX header before reading.
const PREALLOC_LIMIT: usize = 64 << 20;

/// Raw image file contents.
#[derive(Debug, Clone, PartialEq)]
pub struct IdxImages {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<u8>,
}

pub fn read_images<R: Read>(mut reader: R) -> Result<IdxImages> {
    let magic = reader.read_u32::<BigEndian>()?;
    if magic != IMAGES_MAGIC {
        return Err(Error::InvalidData(format!(
            "image file magic {magic}, expected {IMAGES_MAGIC}"
        )));
    }
    let count = reader.read_u32::<BigEndian>()? as usize;
    let rows = reader.read_u32::<BigEndian>()? as usize;
    let cols = reader.read_u32::<BigEndian>()? as usize;

    let len = count
        .checked_mul(rows)
        .and_then(|v| v.checked_mul(cols))
        .ok_or_else(|| Error::InvalidData("image file dimensions overflow".to_owned()))?;
    let pixels = read_payload(&mut reader, len, "image")?;

    Ok(IdxImages {
        count,
        rows,
        cols,
        pixels,
    })
}

pub fn read_labels<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let magic = reader.read_u32::<BigEndian>()?;
    if magic != LABELS_MAGIC {
        return Err(Error::InvalidData(format!(
            "label file magic {magic}, expected {LABELS_MAGIC}"
        )));
    }
    let count = reader.read_u32::<BigEndian>()? as usize;
    read_payload(&mut reader, count, "label")
}

/// Read exactly `len` payload bytes; the buffer grows with the bytes present.
fn read_payload<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    reader.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(Error::InvalidData(format!(
            "{what} file truncated: header promises {len} bytes, found {}",
            buf.len()
        )));
    }
    Ok(buf)
}

/// Combine an image file and a label file into a dataset, scaling pixels to `[0, 1]`.
pub fn to_dataset(images: &IdxImages, labels: &[u8]) -> Result<Dataset> {
    if images.count != labels.len() {
        return Err(Error::InvalidData(format!(
            "{} images but {} labels",
            images.count,
            labels.len()
        )));
    }
    let pixels = images.pixels.iter().map(|&p| f64::from(p) / 255.0).collect();
    let labels = labels.iter().map(|&l| usize::from(l)).collect();
    Dataset::from_flat(pixels, labels, images.rows * images.cols, NUM_CLASSES)
}

/// Open `dir/name`, falling back to `dir/name.gz`.
fn open(dir: &Path, name: &str) -> Result<Box<dyn Read>> {
    let plain = dir.join(name);
    if plain.is_file() {
        return Ok(Box::new(BufReader::new(File::open(plain)?)));
    }
    let gz: PathBuf = dir.join(format!("{name}.gz"));
    match File::open(&gz) {
        Ok(file) => Ok(Box::new(GzDecoder::new(BufReader::new(file)))),
        Err(e) => Err(Error::InvalidData(format!(
            "cannot open {} or {}: {e}",
            plain.display(),
            gz.display()
        ))),
    }
}

fn load_pair(dir: &Path, images: &str, labels: &str) -> Result<Dataset> {
    let images = read_images(open(dir, images)?)?;
    let labels = read_labels(open(dir, labels)?)?;
    to_dataset(&images, &labels)
}

/// Load the training file followed by the test file as one ordered dataset.
pub fn load(dir: impl AsRef<Path>) -> Result<Dataset> {
    let dir = dir.as_ref();
    let train = load_pair(dir, TRAIN_IMAGES, TRAIN_LABELS)?;
    let test = load_pair(dir, TEST_IMAGES, TEST_LABELS)?;
    log::info!(
        "loaded MNIST from {}: {} training and {} test images",
        dir.display(),
        train.len(),
        test.len()
    );
    train.concat(&test)
}

/// Load MNIST and cut it into the reference partitions: the first 50 000
/// training images, the remaining 10 000 for validation, the test file last.
pub fn load_partitions(dir: impl AsRef<Path>) -> Result<Partitions> {
    let all = load(dir)?;
    Partitions::split(&all, TRAIN_LEN, VALIDATION_LEN)
}
