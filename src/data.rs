//! Labeled image datasets.
//!
//! Images are stored contiguously in row-major layout so a contiguous range of
//! examples is a plain slice; minibatches borrow straight from the dataset.

use std::ops::Range;

use crate::{Error, Result};

/// Ordered `(image, label)` pairs.
///
/// Stored as:
/// - `images.len() == len * input_dim`
/// - `labels.len() == len`, every label `< num_classes`
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    images: Vec<f64>,
    labels: Vec<usize>,
    input_dim: usize,
    num_classes: usize,
}

impl Dataset {
    /// Build a dataset from a flat image buffer with shape `(len, input_dim)`.
    pub fn from_flat(
        images: Vec<f64>,
        labels: Vec<usize>,
        input_dim: usize,
        num_classes: usize,
    ) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidData("input_dim must be > 0".to_owned()));
        }
        if num_classes == 0 {
            return Err(Error::InvalidData("num_classes must be > 0".to_owned()));
        }
        if images.len() % input_dim != 0 {
            return Err(Error::ShapeMismatch(format!(
                "images length {} is not divisible by input_dim {input_dim}",
                images.len()
            )));
        }
        let len = images.len() / input_dim;
        if labels.len() != len {
            return Err(Error::ShapeMismatch(format!(
                "{} labels for {len} images",
                labels.len()
            )));
        }
        check_labels(&labels, num_classes)?;

        Ok(Self {
            images,
            labels,
            input_dim,
            num_classes,
        })
    }

    /// Build a dataset from per-example rows (copied into contiguous storage).
    pub fn from_rows(images: &[Vec<f64>], labels: &[usize], num_classes: usize) -> Result<Self> {
        let input_dim = images.first().map(Vec::len).unwrap_or(0);
        if input_dim == 0 {
            return Err(Error::InvalidData(
                "images must be non-empty with input_dim > 0".to_owned(),
            ));
        }
        for (i, row) in images.iter().enumerate() {
            if row.len() != input_dim {
                return Err(Error::ShapeMismatch(format!(
                    "image {i} has len {}, expected {input_dim}",
                    row.len()
                )));
            }
        }
        Self::from_flat(images.concat(), labels.to_vec(), input_dim, num_classes)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// All images, shape `(len, input_dim)`.
    #[inline]
    pub fn images(&self) -> &[f64] {
        &self.images
    }

    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Panics if `idx >= len`.
    #[inline]
    pub fn image(&self, idx: usize) -> &[f64] {
        let start = idx * self.input_dim;
        &self.images[start..start + self.input_dim]
    }

    #[inline]
    pub fn label(&self, idx: usize) -> usize {
        self.labels[idx]
    }

    /// Borrow the examples in `range` as one batch.
    pub fn batch(&self, range: Range<usize>) -> Result<Batch<'_>> {
        if range.start > range.end || range.end > self.len() {
            return Err(Error::ShapeMismatch(format!(
                "range {range:?} out of bounds for dataset of len {}",
                self.len()
            )));
        }
        Ok(Batch {
            images: &self.images[range.start * self.input_dim..range.end * self.input_dim],
            labels: &self.labels[range],
        })
    }

    /// Copy the examples in `range` into a new dataset.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        let batch = self.batch(range)?;
        Ok(Self {
            images: batch.images.to_vec(),
            labels: batch.labels.to_vec(),
            input_dim: self.input_dim,
            num_classes: self.num_classes,
        })
    }

    /// Append `other` after the last example.
    pub fn concat(mut self, other: &Dataset) -> Result<Self> {
        if other.input_dim != self.input_dim || other.num_classes != self.num_classes {
            return Err(Error::ShapeMismatch(format!(
                "cannot concat datasets with (input_dim, num_classes) ({}, {}) and ({}, {})",
                self.input_dim, self.num_classes, other.input_dim, other.num_classes
            )));
        }
        self.images.extend_from_slice(&other.images);
        self.labels.extend_from_slice(&other.labels);
        Ok(self)
    }

    /// Contiguous, non-overlapping batches of exactly `batch_size` examples.
    ///
    /// The trailing `len % batch_size` examples are not visited.
    pub fn batches(&self, batch_size: usize) -> Batches<'_> {
        assert!(batch_size > 0, "batch_size must be > 0");
        Batches {
            dataset: self,
            batch_size,
            next: 0,
        }
    }
}

pub(crate) fn check_labels(labels: &[usize], num_classes: usize) -> Result<()> {
    match labels.iter().position(|&l| l >= num_classes) {
        Some(index) => Err(Error::LabelOutOfRange {
            index,
            label: labels[index],
            num_classes,
        }),
        None => Ok(()),
    }
}

/// A borrowed minibatch: `images` has shape `(labels.len(), input_dim)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Batch<'a> {
    pub images: &'a [f64],
    pub labels: &'a [usize],
}

impl Batch<'_> {
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Batches<'a> {
    dataset: &'a Dataset,
    batch_size: usize,
    next: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.next + self.batch_size;
        if end > self.dataset.len() {
            return None;
        }
        let d = self.dataset;
        let batch = Batch {
            images: &d.images[self.next * d.input_dim..end * d.input_dim],
            labels: &d.labels[self.next..end],
        };
        self.next = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.dataset.len() - self.next) / self.batch_size;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Batches<'_> {}

/// Training, validation and test partitions cut from one ordered dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Partitions {
    pub train: Dataset,
    pub validation: Dataset,
    pub test: Dataset,
}

impl Partitions {
    /// `train = [0, train_len)`, `validation = [train_len, train_len + validation_len)`,
    /// `test` = the rest. All three must be non-empty.
    pub fn split(dataset: &Dataset, train_len: usize, validation_len: usize) -> Result<Self> {
        let val_end = train_len
            .checked_add(validation_len)
            .filter(|&end| end < dataset.len())
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "train_len {train_len} + validation_len {validation_len} leaves no test \
                     examples in a dataset of len {}",
                    dataset.len()
                ))
            })?;
        if train_len == 0 || validation_len == 0 {
            return Err(Error::InvalidConfig(
                "train and validation partitions must be non-empty".to_owned(),
            ));
        }

        Ok(Self {
            train: dataset.slice(0..train_len)?,
            validation: dataset.slice(train_len..val_end)?,
            test: dataset.slice(val_end..dataset.len())?,
        })
    }
}
