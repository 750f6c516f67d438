//! Burn dataset and batcher for tokenized news examples.
//!
//! Texts are tokenized once when the dataset is built, so batching only
//! copies fixed-length id and mask vectors into tensors.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;

use finsent_core::{LabeledExample, Result};
use tracing::debug;

use crate::tokenizer::TextEncoder;

/// A tokenized example ready for batching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedExample {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub label: usize,
    /// Source row in the encoded table
    pub row: usize,
}

/// In-memory dataset of tokenized examples
#[derive(Debug, Clone, Default)]
pub struct NewsDataset {
    items: Vec<TokenizedExample>,
}

impl NewsDataset {
    /// Tokenizes every example with `encoder`.
    ///
    /// The encoder must pad to a fixed length so items can be stacked.
    pub fn from_examples(examples: &[LabeledExample], encoder: &TextEncoder) -> Result<Self> {
        let items = examples
            .iter()
            .map(|example| {
                let encoded = encoder.encode(&example.text)?;
                Ok(TokenizedExample {
                    input_ids: encoded.input_ids,
                    attention_mask: encoded.attention_mask,
                    label: example.label,
                    row: example.row,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Tokenized {} examples to length {}", items.len(), encoder.max_len());
        Ok(Self { items })
    }

    pub fn from_items(items: Vec<TokenizedExample>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[TokenizedExample] {
        &self.items
    }

    /// Get samples per class count
    pub fn class_distribution(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for item in &self.items {
            if item.label < num_classes {
                counts[item.label] += 1;
            }
        }
        counts
    }
}

impl Dataset<TokenizedExample> for NewsDataset {
    fn get(&self, index: usize) -> Option<TokenizedExample> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// A batch of tokenized news for training or evaluation
#[derive(Clone, Debug)]
pub struct NewsBatch<B: Backend> {
    /// Token ids with shape [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,
    /// Attention mask with shape [batch_size, seq_len]
    pub attention_mask: Tensor<B, 2, Int>,
    /// Class labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher stacking equal-length tokenized examples
#[derive(Clone, Debug)]
pub struct NewsBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> NewsBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<TokenizedExample, NewsBatch<B>> for NewsBatcher<B> {
    fn batch(&self, items: Vec<TokenizedExample>) -> NewsBatch<B> {
        let batch_size = items.len();
        let seq_len = items.iter().map(|i| i.input_ids.len()).max().unwrap_or(0);

        let mut ids = Vec::with_capacity(batch_size * seq_len);
        let mut mask = Vec::with_capacity(batch_size * seq_len);
        for item in &items {
            ids.extend(item.input_ids.iter().map(|&id| id as i64));
            mask.extend(item.attention_mask.iter().map(|&m| m as i64));
            // ragged items are right-padded with id 0 and mask 0
            let missing = seq_len - item.input_ids.len();
            ids.extend(std::iter::repeat(0i64).take(missing));
            mask.extend(std::iter::repeat(0i64).take(missing));
        }

        let input_ids = Tensor::<B, 2, Int>::from_data(
            TensorData::new(ids, [batch_size, seq_len]),
            &self.device,
        );
        let attention_mask = Tensor::<B, 2, Int>::from_data(
            TensorData::new(mask, [batch_size, seq_len]),
            &self.device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(targets_data, [batch_size]),
            &self.device,
        );

        NewsBatch {
            input_ids,
            attention_mask,
            targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::word_level_tokenizer;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn examples() -> Vec<LabeledExample> {
        vec![
            LabeledExample {
                row: 0,
                text: "profits rose".into(),
                label: 2,
            },
            LabeledExample {
                row: 1,
                text: "shares fell sharply".into(),
                label: 0,
            },
            LabeledExample {
                row: 2,
                text: "board meets".into(),
                label: 1,
            },
        ]
    }

    fn encoder() -> TextEncoder {
        let tokenizer =
            word_level_tokenizer(&["profits", "rose", "shares", "fell", "sharply"]).unwrap();
        TextEncoder::fixed_length(tokenizer, 6).unwrap()
    }

    #[test]
    fn test_dataset_from_examples() {
        let dataset = NewsDataset::from_examples(&examples(), &encoder()).unwrap();
        assert_eq!(dataset.len(), 3);

        let item = dataset.get(1).unwrap();
        assert_eq!(item.row, 1);
        assert_eq!(item.label, 0);
        assert_eq!(item.input_ids.len(), 6);
        assert_eq!(item.attention_mask, vec![1, 1, 1, 1, 1, 0]);
        assert!(dataset.get(3).is_none());
        assert_eq!(dataset.class_distribution(3), vec![1, 1, 1]);
    }

    #[test]
    fn test_batcher_shapes() {
        let dataset = NewsDataset::from_examples(&examples(), &encoder()).unwrap();
        let batcher = NewsBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(dataset.items().to_vec());

        assert_eq!(batch.input_ids.dims(), [3, 6]);
        assert_eq!(batch.attention_mask.dims(), [3, 6]);
        assert_eq!(batch.targets.dims(), [3]);

        let targets: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(targets, vec![2, 0, 1]);
    }

    #[test]
    fn test_batcher_pads_ragged_items() {
        let items = vec![
            TokenizedExample {
                input_ids: vec![2, 4, 3],
                attention_mask: vec![1, 1, 1],
                label: 0,
                row: 0,
            },
            TokenizedExample {
                input_ids: vec![2, 3],
                attention_mask: vec![1, 1],
                label: 1,
                row: 1,
            },
        ];
        let batcher = NewsBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(items);

        let mask: Vec<i64> = batch.attention_mask.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(mask, vec![1, 1, 1, 1, 1, 0]);
    }
}
