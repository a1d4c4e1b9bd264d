use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use std::path::Path;
use tokenizers::{EncodeInput, Encoding, Tokenizer, TruncationParams};

/// A padded batch ready for a BERT forward pass, all `[B,T]` u32.
pub struct EncodedBatch {
    pub input_ids: Tensor,
    pub token_type_ids: Tensor,
    pub attention_mask: Tensor,
}

/// Load `tokenizer.json` with truncation at `max_len` tokens.
pub fn load_tokenizer(path: &Path, max_len: usize) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
    tokenizer
        .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
        .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

/// Encode single texts or (query, passage) pairs and pad to the longest row.
pub fn encode_batch<'s, E>(tokenizer: &Tokenizer, inputs: Vec<E>, device: &Device) -> Result<EncodedBatch>
where
    E: Into<EncodeInput<'s>> + Send,
{
    let encodings = tokenizer.encode_batch(inputs, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);
    to_tensors(&encodings, pad_id, device)
}

fn to_tensors(encodings: &[Encoding], pad_id: u32, device: &Device) -> Result<EncodedBatch> {
    let batch = encodings.len();
    let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0).max(1);
    let mut ids = Vec::with_capacity(batch * max_len);
    let mut type_ids = Vec::with_capacity(batch * max_len);
    let mut mask = Vec::with_capacity(batch * max_len);
    for enc in encodings {
        let len = enc.get_ids().len();
        let pad = max_len - len;
        ids.extend_from_slice(enc.get_ids());
        ids.extend(std::iter::repeat(pad_id).take(pad));
        type_ids.extend_from_slice(enc.get_type_ids());
        type_ids.extend(std::iter::repeat(0u32).take(pad));
        mask.extend_from_slice(enc.get_attention_mask());
        mask.extend(std::iter::repeat(0u32).take(pad));
    }
    Ok(EncodedBatch {
        input_ids: Tensor::from_iter(ids, device)?.reshape((batch, max_len))?,
        token_type_ids: Tensor::from_iter(type_ids, device)?.reshape((batch, max_len))?,
        attention_mask: Tensor::from_iter(mask, device)?.reshape((batch, max_len))?,
    })
}
