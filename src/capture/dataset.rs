use std::{collections::HashMap, fs, path::PathBuf};

use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

use crate::{setting::CaptureConfig, Error, Result};

/// Probability that a sample lands in the training split.
pub const TRAIN_RATIO: f64 = 0.8;

const SPLITS: [Split; 2] = [Split::Train, Split::Validation];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Validation,
}

/// Where a new capture session starts numbering files for a class.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SequencePolicy {
    /// Continue after the highest index already on disk.
    #[default]
    Continue,
    /// Start at 0 and overwrite whatever is there.
    Restart,
}

#[derive(Debug, Clone)]
pub struct LabeledSample {
    pub class_name: String,
    pub split: Split,
    pub sequence_index: u32,
    pub pixels: image::GrayImage,
}

/// Receives captured faces for the current class.
pub trait SampleSink {
    /// Called whenever capture for `class_name` (re)starts.
    fn begin_class(&mut self, class_name: &str) -> Result<()>;

    fn store(
        &mut self,
        class_name: &str,
        running_index: u32,
        pixels: image::GrayImage,
    ) -> Result<PathBuf>;
}

pub struct DatasetWriter {
    root: PathBuf,
    train_ratio: f64,
    policy: SequencePolicy,
    offsets: HashMap<String, u32>,
    rng: Box<dyn RngCore + Send>,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
        }
    }

    pub fn from_draw(draw: f64, train_ratio: f64) -> Self {
        if draw < train_ratio {
            Split::Train
        } else {
            Split::Validation
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LabeledSample {
    /// `{split}/{class}/{class}_{sequence}.jpg`
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.split.as_str())
            .join(&self.class_name)
            .join(format!("{}_{}.jpg", self.class_name, self.sequence_index))
    }
}

impl DatasetWriter {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            root: config.dataset_dir.clone(),
            train_ratio: config.train_ratio,
            policy: config.sequence_policy,
            offsets: HashMap::new(),
            rng: Box::new(StdRng::from_entropy()),
        }
    }

    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Creates `root/{train,validation}/{class}` for every class.
    #[tracing::instrument(name = "Preparing dataset directories", skip(self, classes), fields(root = %self.root.display()), err)]
    pub fn prepare<S: AsRef<str>>(&self, classes: &[S]) -> Result<()> {
        for split in SPLITS {
            for class in classes {
                let dir = self.root.join(split.as_str()).join(class.as_ref());
                fs::create_dir_all(&dir).map_err(Error::io_failure(&dir))?;
            }
        }
        Ok(())
    }

    /// Draws the split for a new sample. Each call is an independent Bernoulli trial.
    pub fn label(
        &mut self,
        class_name: &str,
        sequence_index: u32,
        pixels: image::GrayImage,
    ) -> LabeledSample {
        LabeledSample {
            class_name: class_name.to_string(),
            split: Split::from_draw(self.rng.gen::<f64>(), self.train_ratio),
            sequence_index,
            pixels,
        }
    }

    pub fn persist(&self, sample: LabeledSample) -> Result<PathBuf> {
        let path = self.root.join(sample.relative_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::io_failure(parent))?;
        }
        sample
            .pixels
            .save_with_format(&path, image::ImageFormat::Jpeg)
            .map_err(|err| match err {
                image::ImageError::IoError(io) => Error::IOFailure(path.clone(), io),
                other => Error::ImageError(other),
            })?;
        Ok(path)
    }

    /// Next free sequence index for `class_name` across both splits.
    pub fn next_free_index(&self, class_name: &str) -> Result<u32> {
        let prefix = format!("{}_", class_name);
        let mut next = 0;
        for split in SPLITS {
            let dir = self.root.join(split.as_str()).join(class_name);
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(Error::IOFailure(dir, err)),
            };
            for entry in entries {
                let entry = entry.map_err(Error::io_failure(&dir))?;
                let name = entry.file_name();
                let Some(index) = name
                    .to_str()
                    .and_then(|n| n.strip_prefix(&prefix))
                    .and_then(|n| n.strip_suffix(".jpg"))
                    .and_then(|n| n.parse::<u32>().ok())
                else {
                    continue;
                };
                let following = index
                    .checked_add(1)
                    .ok_or_else(|| Error::SequenceExhausted(class_name.to_string()))?;
                next = next.max(following);
            }
        }
        Ok(next)
    }
}

impl SampleSink for DatasetWriter {
    fn begin_class(&mut self, class_name: &str) -> Result<()> {
        let offset = match self.policy {
            SequencePolicy::Restart => 0,
            SequencePolicy::Continue => self.next_free_index(class_name)?,
        };
        tracing::debug!("numbering {} samples from {}", class_name, offset);
        self.offsets.insert(class_name.to_string(), offset);
        Ok(())
    }

    fn store(
        &mut self,
        class_name: &str,
        running_index: u32,
        pixels: image::GrayImage,
    ) -> Result<PathBuf> {
        let offset = self.offsets.get(class_name).copied().unwrap_or_default();
        let sequence_index = offset
            .checked_add(running_index)
            .ok_or_else(|| Error::SequenceExhausted(class_name.to_string()))?;
        let sample = self.label(class_name, sequence_index, pixels);
        self.persist(sample)
    }
}
