use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};

/// Collapse token states into one unit-length vector per input.
///
/// `hidden` is `[batch, tokens, width]` and `attention_mask` is
/// `[batch, tokens]`; padding positions (mask 0) do not contribute. The
/// result is `[batch, width]` in `f32`. An input whose mask is all zeros
/// yields a zero vector rather than NaN.
pub fn sentence_vector(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    ensure!(hidden.rank() == 3, "token states must be [batch, tokens, width], got {:?}", hidden.dims());
    let (batch, tokens, width) = hidden.dims3()?;
    ensure!(
        attention_mask.dims() == [batch, tokens].as_slice(),
        "attention mask must be [{batch}, {tokens}], got {:?}",
        attention_mask.dims()
    );

    let device = hidden.device();
    let states = hidden.to_dtype(DType::F32)?;
    let keep = attention_mask.to_device(device)?.to_dtype(DType::F32)?.unsqueeze(2)?;

    let summed = states.broadcast_mul(&keep)?.sum(1)?;
    let floor = Tensor::new(&[1e-9f32], device)?;
    let kept = keep.sum(1)?.broadcast_maximum(&floor)?;
    let mean = summed.broadcast_div(&kept)?;

    let length = mean.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_maximum(&floor)?;
    let unit = mean.broadcast_div(&length)?;
    ensure!(unit.dims() == [batch, width].as_slice(), "sentence vector shape is {:?}", unit.dims());
    Ok(unit)
}
