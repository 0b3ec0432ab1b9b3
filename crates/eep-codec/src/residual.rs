//! 残差变换.
//!
//! 所有方法的残差序列都满足 `r[0] = x[0]`, 其余项的定义如下
//! (`p` 为前一通道):
//!
//! ```text
//! Copy:  r[i] = x[i]
//! Time:  r[i] = x[i] - x[i-1]
//! Time2: r[1] = x[1] - x[0]
//!        r[i] = x[i] - 2*x[i-1] + x[i-2]          (i >= 2)
//! Chan:  r[i] = (x[i] - x[i-1]) - (p[i] - p[i-1])
//! ```
//!
//! 运算在 i32 上回绕.

use crate::method::Raw3Method;

/// 由样本计算残差
///
/// `reference` 仅在 `Chan` 方法下使用, 长度必须与 `samples` 相同.
pub fn compute_residuals(method: Raw3Method, samples: &[i32], reference: &[i32]) -> Vec<i32> {
    let n = samples.len();
    let mut residuals = Vec::with_capacity(n);
    if n == 0 {
        return residuals;
    }
    residuals.push(samples[0]);

    match method {
        Raw3Method::Copy => residuals.extend_from_slice(&samples[1..]),
        Raw3Method::Time => {
            for i in 1..n {
                residuals.push(samples[i].wrapping_sub(samples[i - 1]));
            }
        }
        Raw3Method::Time2 => {
            if n > 1 {
                residuals.push(samples[1].wrapping_sub(samples[0]));
            }
            for i in 2..n {
                let predicted = samples[i - 1]
                    .wrapping_mul(2)
                    .wrapping_sub(samples[i - 2]);
                residuals.push(samples[i].wrapping_sub(predicted));
            }
        }
        Raw3Method::Chan => {
            for i in 1..n {
                let own = samples[i].wrapping_sub(samples[i - 1]);
                let other = reference[i].wrapping_sub(reference[i - 1]);
                residuals.push(own.wrapping_sub(other));
            }
        }
    }

    residuals
}

/// 原地还原一阶时间残差
pub fn restore_time(values: &mut [i32]) {
    for i in 1..values.len() {
        values[i] = values[i - 1].wrapping_add(values[i]);
    }
}

/// 原地还原二阶时间残差
pub fn restore_time2(values: &mut [i32]) {
    if values.len() > 1 {
        values[1] = values[0].wrapping_add(values[1]);
    }
    for i in 2..values.len() {
        let predicted = values[i - 1].wrapping_mul(2).wrapping_sub(values[i - 2]);
        values[i] = values[i].wrapping_add(predicted);
    }
}

/// 原地还原通道间残差
///
/// `reference` 为已解码的前一通道, 长度与 `values` 相同.
pub fn restore_chan(values: &mut [i32], reference: &[i32]) {
    for i in 1..values.len() {
        let step = reference[i].wrapping_sub(reference[i - 1]);
        values[i] = values[i - 1].wrapping_add(step).wrapping_add(values[i]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_residuals() {
        let samples = [5, 6, 7, 8];
        let residuals = compute_residuals(Raw3Method::Time, &samples, &[]);
        assert_eq!(residuals, vec![5, 1, 1, 1]);

        let mut values = residuals;
        restore_time(&mut values);
        assert_eq!(values, samples);
    }

    #[test]
    fn test_time2_residuals_of_ramp_are_zero() {
        let samples = [100, 110, 120, 130, 140];
        let residuals = compute_residuals(Raw3Method::Time2, &samples, &[]);
        assert_eq!(residuals, vec![100, 10, 0, 0, 0]);

        let mut values = residuals;
        restore_time2(&mut values);
        assert_eq!(values, samples);
    }

    #[test]
    fn test_chan_residuals() {
        let reference = [10, 20, 30, 40];
        let samples = [10, 15, 32, 41];
        let residuals = compute_residuals(Raw3Method::Chan, &samples, &reference);
        assert_eq!(residuals, vec![10, -5, 7, -1]);

        let mut values = residuals;
        restore_chan(&mut values, &reference);
        assert_eq!(values, samples);
    }

    #[test]
    fn test_wrapping_extremes() {
        let samples = [i32::MAX, i32::MIN, i32::MAX, 0, i32::MIN];
        let reference = [i32::MIN, 0, i32::MIN, i32::MAX, -1];

        let mut time = compute_residuals(Raw3Method::Time, &samples, &[]);
        restore_time(&mut time);
        assert_eq!(time, samples);

        let mut time2 = compute_residuals(Raw3Method::Time2, &samples, &[]);
        restore_time2(&mut time2);
        assert_eq!(time2, samples);

        let mut chan = compute_residuals(Raw3Method::Chan, &samples, &reference);
        restore_chan(&mut chan, &reference);
        assert_eq!(chan, samples);
    }

    #[test]
    fn test_single_sample() {
        for method in Raw3Method::ALL {
            let residuals = compute_residuals(method, &[-7], &[3]);
            assert_eq!(residuals, vec![-7]);
        }
    }
}
