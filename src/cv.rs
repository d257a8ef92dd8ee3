use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One train/validation split. The validation block always starts where the training block ends.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Fold {
    pub train: Range<usize>,
    pub validation: Range<usize>,
}

/// Time-series cross validation: K consecutive validation blocks of equal size at the end
/// of the series, each trained on every sample that precedes it. Samples are never shuffled.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CV {
    pub folds: Vec<Fold>,
}

impl CV {
    pub fn new(sample_len: usize, splits: usize) -> Result<CV> {
        if splits < 2 {
            return Err(SearchError::InvalidConfig(format!(
                "time series split needs at least 2 splits, got {}",
                splits
            )));
        }

        let validation_size = sample_len / (splits + 1);
        if validation_size == 0 {
            return Err(SearchError::InsufficientData {
                required: splits + 1,
                got: sample_len,
            });
        }

        // The first training block absorbs the remainder of the division
        let first_validation_start = sample_len - splits * validation_size;

        let folds = (0..splits)
            .map(|k| {
                let start = first_validation_start + k * validation_size;
                Fold {
                    train: 0..start,
                    validation: start..start + validation_size,
                }
            })
            .collect();

        Ok(CV { folds })
    }

    pub fn len(&self) -> usize {
        self.folds.len()
    }
}
