//! Reduction of per-token hidden states to sentence vectors, following the
//! sentence-transformers module layout (`modules.json`, `1_Pooling/config.json`).

use anyhow::{bail, Result};
use ndarray::{Array1, ArrayView1, ArrayView2, ArrayViewD, Axis, Ix2, Ix3};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pooling {
    Cls,
    #[default]
    Mean,
    Max,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PoolingFile {
    pooling_mode_cls_token: bool,
    pooling_mode_mean_tokens: bool,
    pooling_mode_max_tokens: bool,
    pooling_mode_mean_sqrt_len_tokens: bool,
    pooling_mode_weightedmean_tokens: bool,
    pooling_mode_lasttoken: bool,
}

#[derive(Debug, Deserialize)]
struct ModuleEntry {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct SentenceBertConfig {
    max_seq_length: Option<usize>,
}

impl Pooling {
    /// Parses `1_Pooling/config.json`.
    ///
    /// Exactly one of CLS, mean or max must be enabled. Other modes, and
    /// combinations (which sentence-transformers concatenates), are rejected.
    pub fn from_config_json(json: &str) -> Result<Self> {
        let file: PoolingFile = serde_json::from_str(json)?;

        let unsupported: Vec<&str> = [
            ("mean_sqrt_len_tokens", file.pooling_mode_mean_sqrt_len_tokens),
            ("weightedmean_tokens", file.pooling_mode_weightedmean_tokens),
            ("lasttoken", file.pooling_mode_lasttoken),
        ]
        .into_iter()
        .filter_map(|(name, enabled)| enabled.then_some(name))
        .collect();
        if !unsupported.is_empty() {
            bail!("unsupported pooling mode(s): {}", unsupported.join(", "));
        }

        let enabled: Vec<Pooling> = [
            (Pooling::Cls, file.pooling_mode_cls_token),
            (Pooling::Mean, file.pooling_mode_mean_tokens),
            (Pooling::Max, file.pooling_mode_max_tokens),
        ]
        .into_iter()
        .filter_map(|(mode, on)| on.then_some(mode))
        .collect();
        match enabled.as_slice() {
            [mode] => Ok(*mode),
            [] => bail!("pooling config enables no pooling mode"),
            modes => bail!("combined pooling modes are not supported: {modes:?}"),
        }
    }
}

/// True when `modules.json` contains a `Normalize` module.
pub fn normalize_from_modules_json(json: &str) -> Result<bool> {
    let modules: Vec<ModuleEntry> = serde_json::from_str(json)?;
    Ok(modules.iter().any(|m| m.kind.ends_with("Normalize")))
}

pub fn max_seq_length_from_json(json: &str) -> Result<Option<usize>> {
    let config: SentenceBertConfig = serde_json::from_str(json)?;
    Ok(config.max_seq_length)
}

/// Turns the model's first output into one vector per batch row.
///
/// Accepts `[batch, seq, hidden]` token states, which are pooled with `mask`,
/// or `[batch, hidden]` sentence vectors, which are used as they are.
pub fn sentence_embeddings(
    output: ArrayViewD<'_, f32>,
    mask: ArrayView2<'_, i64>,
    pooling: Pooling,
    normalize: bool,
) -> Result<Vec<Vec<f32>>> {
    let batch = mask.nrows();
    if output.ndim() == 0 || output.shape()[0] != batch {
        bail!(
            "model output shape {:?} does not match batch size {}",
            output.shape(),
            batch
        );
    }

    let mut embeddings: Vec<Vec<f32>> = match output.ndim() {
        3 => {
            let tokens = output.into_dimensionality::<Ix3>()?;
            tokens
                .outer_iter()
                .zip(mask.outer_iter())
                .map(|(states, row_mask)| pool(states, row_mask, pooling))
                .collect()
        }
        2 => {
            let rows = output.into_dimensionality::<Ix2>()?;
            rows.axis_iter(Axis(0)).map(|row| row.to_vec()).collect()
        }
        _ => bail!(
            "unexpected model output shape {:?} (expected [batch, seq, hidden] or [batch, hidden])",
            output.shape()
        ),
    };

    if normalize {
        embeddings.iter_mut().for_each(|v| l2_normalize(v));
    }
    Ok(embeddings)
}

fn pool(states: ArrayView2<'_, f32>, mask: ArrayView1<'_, i64>, pooling: Pooling) -> Vec<f32> {
    let hidden = states.ncols();
    if states.nrows() == 0 {
        return vec![0.0; hidden];
    }

    match pooling {
        Pooling::Cls => states.row(0).to_vec(),
        Pooling::Mean => {
            let mut sum = Array1::<f32>::zeros(hidden);
            let mut count = 0.0f32;
            for (token, &m) in states.outer_iter().zip(mask.iter()) {
                if m > 0 {
                    sum += &token;
                    count += 1.0;
                }
            }
            sum.mapv(|v| v / count.max(1e-9)).to_vec()
        }
        Pooling::Max => {
            let mut max: Option<Array1<f32>> = None;
            for (token, &m) in states.outer_iter().zip(mask.iter()) {
                if m == 0 {
                    continue;
                }
                match max.as_mut() {
                    Some(acc) => acc.zip_mut_with(&token, |a, &b| *a = a.max(b)),
                    None => max = Some(token.to_owned()),
                }
            }
            max.map(|m| m.to_vec()).unwrap_or_else(|| vec![0.0; hidden])
        }
    }
}

/// Scales `v` to unit length. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}
