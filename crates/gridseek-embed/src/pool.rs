/// Scale `v` to unit L2 norm in place. Near-zero vectors are left unchanged
/// rather than blown up.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 1e-12 { return; }
    for x in v.iter_mut() { *x /= norm; }
}

pub fn l2_norm(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }

/// Mean of the unmasked token states of `hidden` `[B,T,H]`, L2-normalized per row.
#[cfg(feature = "candle")]
pub fn masked_mean_l2(hidden: &candle_core::Tensor, attention_mask: &candle_core::Tensor) -> anyhow::Result<candle_core::Tensor> {
    use candle_core::{DType, Tensor};

    let &[batch, _, hidden_dim] = hidden.dims() else { anyhow::bail!("hidden states must be [B,T,H], got {:?}", hidden.dims()) };
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?;
    let mask_broadcast = match mask_3d.broadcast_as(hidden.shape()) {
        Ok(m) => m,
        Err(_) => mask_3d.repeat((1, 1, hidden_dim))?,
    };
    let sum = (hidden * &mask_broadcast)?.sum(1)?;
    let lengths = mask.sum(1)?.unsqueeze(1)?.to_dtype(sum.dtype())?;
    let mean = sum.broadcast_div(&lengths)?;
    let eps_val = match hidden.dtype() { DType::F16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(0)?;
    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps)?;
    let pooled = mean.broadcast_div(&norm)?;
    if pooled.dims() != [batch, hidden_dim] { anyhow::bail!("pooled shape {:?}", pooled.dims()); }
    Ok(pooled)
}
