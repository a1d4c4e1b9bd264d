use anyhow::{ensure, Result};
use candle_core::{DType, IndexOp, Tensor};

fn eps_like(t: &Tensor) -> Result<Tensor> {
    let eps_val = match t.dtype() { DType::F16 => 1e-6f32, _ => 1e-12f32 };
    Ok(Tensor::new(&[eps_val], t.device())?.to_dtype(t.dtype())?.unsqueeze(0)?)
}

/// Row-wise L2 normalization of a `[B,H]` tensor.
pub fn l2_normalize(x: &Tensor) -> Result<Tensor> {
    let norm = x.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps_like(x)?)?;
    Ok(x.broadcast_div(&norm)?)
}

/// Mean over unmasked tokens, then L2 normalization. `[B,T,H]` → `[B,H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let dims = hidden.dims();
    ensure!(dims.len() == 3, "hidden shape must be [B,T,H], got {:?}", dims);
    let hidden_dim = dims[2];

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?;
    let mask_broadcast = match mask_3d.broadcast_as(hidden.shape()) {
        Ok(m) => m,
        Err(_) => mask_3d.repeat((1, 1, hidden_dim))?,
    };
    let masked = (hidden * &mask_broadcast)?;
    let sum = masked.sum(1)?;
    let lengths = mask.sum(1)?.unsqueeze(1)?.to_dtype(sum.dtype())?;
    let mean = sum.broadcast_div(&lengths)?;
    l2_normalize(&mean)
}

/// First-token (`[CLS]`) pooling, then L2 normalization. BGE models are
/// trained for this.
pub fn cls_l2(hidden: &Tensor) -> Result<Tensor> {
    ensure!(hidden.dims().len() == 3, "hidden shape must be [B,T,H], got {:?}", hidden.dims());
    let cls = hidden.i((.., 0))?;
    l2_normalize(&cls)
}
