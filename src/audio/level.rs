/// サンプル列の二乗平均平方根
pub fn root_mean_square(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum = samples.iter().map(|s| s * s).sum::<f32>();
    (sum / samples.len() as f32).sqrt()
}

/// RMSレベル(dBFS)。無音・空入力は負の無限大
pub fn rms_dbfs(samples: &[f32]) -> f32 {
    let rms = root_mean_square(samples);
    if rms == 0.0 {
        return f32::NEG_INFINITY;
    }
    20.0 * rms.log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_square_wave_is_zero_db() {
        let samples = [1.0, -1.0, 1.0, -1.0];
        assert!(rms_dbfs(&samples).abs() < 1e-6);
    }

    #[test]
    fn silence_is_negative_infinity() {
        assert_eq!(rms_dbfs(&[0.0; 8]), f32::NEG_INFINITY);
        assert_eq!(rms_dbfs(&[]), f32::NEG_INFINITY);
    }
}
