//! BERT encoder with a sequence classification head.
//!
//! Module and field names follow the Hugging Face checkpoint layout
//! (`embeddings`, `encoder.layers.N.attention.self_attn.query`, ...) so the
//! pretrained PyTorch weights map onto the record with a handful of key
//! remaps (see [`crate::pretrained`]).

use burn::nn::{
    Dropout, DropoutConfig, Embedding, EmbeddingConfig, Gelu, LayerNorm, LayerNormConfig, Linear,
    LinearConfig,
};
use burn::prelude::*;
use burn::tensor::activation::{softmax, tanh};
use serde::{Deserialize, Serialize};

use finsent_core::{Error, Result};

/// Additive bias applied to attention scores of padding positions
const MASK_BIAS: f32 = -10_000.0;

/// Encoder hyperparameters, read from the pretrained `config.json`.
///
/// Unknown keys in the file are ignored; missing keys take the
/// `bert-base-uncased` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BertConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub hidden_dropout_prob: f64,
    pub attention_probs_dropout_prob: f64,
    pub max_position_embeddings: usize,
    pub type_vocab_size: usize,
    pub layer_norm_eps: f64,
    pub pad_token_id: usize,
}

impl Default for BertConfig {
    fn default() -> Self {
        Self {
            vocab_size: 30522,
            hidden_size: 768,
            num_hidden_layers: 12,
            num_attention_heads: 12,
            intermediate_size: 3072,
            hidden_dropout_prob: 0.1,
            attention_probs_dropout_prob: 0.1,
            max_position_embeddings: 512,
            type_vocab_size: 2,
            layer_norm_eps: 1e-12,
            pad_token_id: 0,
        }
    }
}

impl BertConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_attention_heads == 0 || self.hidden_size % self.num_attention_heads != 0 {
            return Err(Error::Model(format!(
                "hidden_size {} is not divisible by num_attention_heads {}",
                self.hidden_size, self.num_attention_heads
            )));
        }
        if self.max_position_embeddings == 0 || self.vocab_size == 0 {
            return Err(Error::Model(
                "vocab_size and max_position_embeddings must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }

    fn layer_norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.hidden_size)
            .with_epsilon(self.layer_norm_eps)
            .init(device)
    }

    fn hidden_dropout(&self) -> Dropout {
        DropoutConfig::new(self.hidden_dropout_prob).init()
    }

    /// Initializes a randomly weighted encoder.
    pub fn init<B: Backend>(&self, device: &B::Device) -> BertModel<B> {
        let embeddings = BertEmbeddings {
            word_embeddings: EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device),
            position_embeddings: EmbeddingConfig::new(
                self.max_position_embeddings,
                self.hidden_size,
            )
            .init(device),
            token_type_embeddings: EmbeddingConfig::new(self.type_vocab_size, self.hidden_size)
                .init(device),
            layer_norm: self.layer_norm(device),
            dropout: self.hidden_dropout(),
        };

        let layers = (0..self.num_hidden_layers)
            .map(|_| self.init_layer(device))
            .collect();

        BertModel {
            embeddings,
            encoder: BertEncoder { layers },
            pooler: BertPooler {
                dense: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            },
        }
    }

    fn init_layer<B: Backend>(&self, device: &B::Device) -> BertLayer<B> {
        let linear = |d_in, d_out| LinearConfig::new(d_in, d_out).init(device);

        BertLayer {
            attention: BertAttention {
                self_attn: BertSelfAttention {
                    query: linear(self.hidden_size, self.hidden_size),
                    key: linear(self.hidden_size, self.hidden_size),
                    value: linear(self.hidden_size, self.hidden_size),
                    dropout: DropoutConfig::new(self.attention_probs_dropout_prob).init(),
                    num_heads: self.num_attention_heads,
                    head_dim: self.head_dim(),
                },
                output: BertResidual {
                    dense: linear(self.hidden_size, self.hidden_size),
                    layer_norm: self.layer_norm(device),
                    dropout: self.hidden_dropout(),
                },
            },
            intermediate: BertIntermediate {
                dense: linear(self.hidden_size, self.intermediate_size),
                activation: Gelu::new(),
            },
            output: BertResidual {
                dense: linear(self.intermediate_size, self.hidden_size),
                layer_norm: self.layer_norm(device),
                dropout: self.hidden_dropout(),
            },
        }
    }
}

#[derive(Module, Debug)]
pub struct BertEmbeddings<B: Backend> {
    pub word_embeddings: Embedding<B>,
    pub position_embeddings: Embedding<B>,
    pub token_type_embeddings: Embedding<B>,
    pub layer_norm: LayerNorm<B>,
    pub dropout: Dropout,
}

impl<B: Backend> BertEmbeddings<B> {
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let positions =
            Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device).reshape([1, seq_len]);
        let token_types = Tensor::<B, 2, Int>::zeros([batch_size, seq_len], &device);

        let embeddings = self.word_embeddings.forward(input_ids)
            + self.position_embeddings.forward(positions)
            + self.token_type_embeddings.forward(token_types);

        self.dropout.forward(self.layer_norm.forward(embeddings))
    }
}

#[derive(Module, Debug)]
pub struct BertSelfAttention<B: Backend> {
    pub query: Linear<B>,
    pub key: Linear<B>,
    pub value: Linear<B>,
    pub dropout: Dropout,
    num_heads: usize,
    head_dim: usize,
}

impl<B: Backend> BertSelfAttention<B> {
    /// `mask_bias` has shape [batch_size, 1, 1, seq_len].
    pub fn forward(&self, hidden: Tensor<B, 3>, mask_bias: Tensor<B, 4>) -> Tensor<B, 3> {
        let [batch_size, seq_len, hidden_size] = hidden.dims();

        let query = self.split_heads(self.query.forward(hidden.clone()));
        let key = self.split_heads(self.key.forward(hidden.clone()));
        let value = self.split_heads(self.value.forward(hidden));

        let scores = query
            .matmul(key.transpose())
            .div_scalar((self.head_dim as f32).sqrt())
            + mask_bias;
        let probs = self.dropout.forward(softmax(scores, 3));

        probs
            .matmul(value)
            .swap_dims(1, 2)
            .reshape([batch_size, seq_len, hidden_size])
    }

    /// [batch, seq, hidden] -> [batch, heads, seq, head_dim]
    fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch_size, seq_len, _] = x.dims();
        x.reshape([batch_size, seq_len, self.num_heads, self.head_dim])
            .swap_dims(1, 2)
    }
}

/// Dense projection, dropout, then residual layer norm.
#[derive(Module, Debug)]
pub struct BertResidual<B: Backend> {
    pub dense: Linear<B>,
    pub layer_norm: LayerNorm<B>,
    pub dropout: Dropout,
}

impl<B: Backend> BertResidual<B> {
    pub fn forward(&self, hidden: Tensor<B, 3>, residual: Tensor<B, 3>) -> Tensor<B, 3> {
        let hidden = self.dropout.forward(self.dense.forward(hidden));
        self.layer_norm.forward(hidden + residual)
    }
}

#[derive(Module, Debug)]
pub struct BertAttention<B: Backend> {
    pub self_attn: BertSelfAttention<B>,
    pub output: BertResidual<B>,
}

#[derive(Module, Debug)]
pub struct BertIntermediate<B: Backend> {
    pub dense: Linear<B>,
    pub activation: Gelu,
}

#[derive(Module, Debug)]
pub struct BertLayer<B: Backend> {
    pub attention: BertAttention<B>,
    pub intermediate: BertIntermediate<B>,
    pub output: BertResidual<B>,
}

impl<B: Backend> BertLayer<B> {
    pub fn forward(&self, hidden: Tensor<B, 3>, mask_bias: Tensor<B, 4>) -> Tensor<B, 3> {
        let attended = self.attention.self_attn.forward(hidden.clone(), mask_bias);
        let attended = self.attention.output.forward(attended, hidden);

        let intermediate = self
            .intermediate
            .activation
            .forward(self.intermediate.dense.forward(attended.clone()));
        self.output.forward(intermediate, attended)
    }
}

#[derive(Module, Debug)]
pub struct BertEncoder<B: Backend> {
    pub layers: Vec<BertLayer<B>>,
}

#[derive(Module, Debug)]
pub struct BertPooler<B: Backend> {
    pub dense: Linear<B>,
}

impl<B: Backend> BertPooler<B> {
    /// Projects the hidden state of the first (`[CLS]`) token.
    pub fn forward(&self, hidden: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch_size, _, hidden_size] = hidden.dims();
        let first = hidden
            .slice([0..batch_size, 0..1, 0..hidden_size])
            .reshape([batch_size, hidden_size]);
        tanh(self.dense.forward(first))
    }
}

#[derive(Module, Debug)]
pub struct BertModel<B: Backend> {
    pub embeddings: BertEmbeddings<B>,
    pub encoder: BertEncoder<B>,
    pub pooler: BertPooler<B>,
}

impl<B: Backend> BertModel<B> {
    /// Returns the pooled `[CLS]` representation, shape [batch_size, hidden].
    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let [batch_size, seq_len] = attention_mask.dims();
        let mask_bias = attention_mask
            .float()
            .neg()
            .add_scalar(1.0)
            .mul_scalar(MASK_BIAS)
            .reshape([batch_size, 1, 1, seq_len]);

        let mut hidden = self.embeddings.forward(input_ids);
        for layer in &self.encoder.layers {
            hidden = layer.forward(hidden, mask_bias.clone());
        }
        self.pooler.forward(hidden)
    }
}

/// Configuration of the full sequence classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub encoder: BertConfig,
    pub num_labels: usize,
}

impl ClassifierConfig {
    pub fn new(encoder: BertConfig, num_labels: usize) -> Self {
        Self {
            encoder,
            num_labels,
        }
    }

    /// Initializes the classifier with random weights.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SentimentClassifier<B> {
        self.with_encoder(self.encoder.init(device), device)
    }

    /// Wraps an existing (typically pretrained) encoder with a fresh head.
    pub fn with_encoder<B: Backend>(
        &self,
        bert: BertModel<B>,
        device: &B::Device,
    ) -> SentimentClassifier<B> {
        SentimentClassifier {
            bert,
            dropout: self.encoder.hidden_dropout(),
            classifier: LinearConfig::new(self.encoder.hidden_size, self.num_labels).init(device),
        }
    }
}

/// BERT encoder followed by dropout and a linear classification head
#[derive(Module, Debug)]
pub struct SentimentClassifier<B: Backend> {
    pub bert: BertModel<B>,
    pub dropout: Dropout,
    pub classifier: Linear<B>,
}

impl<B: Backend> SentimentClassifier<B> {
    /// Returns unnormalized logits, shape [batch_size, num_labels].
    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let pooled = self.bert.forward(input_ids, attention_mask);
        self.classifier.forward(self.dropout.forward(pooled))
    }

    /// Returns class probabilities, shape [batch_size, num_labels].
    pub fn predict_proba(
        &self,
        input_ids: Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        softmax(self.forward(input_ids, attention_mask), 1)
    }
}
