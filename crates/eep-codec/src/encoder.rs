//! raw3 参考编码器.
//!
//! 将按通道连续排列的样本矩阵编码为一个 raw3 数据块. 支持:
//! - 四种残差方法 (Copy, Time, Time2, Chan), 通道间残差仅用于第二个及之后的通道
//! - 16 位族与 32 位族, 首样本和全部残差都能用 16 位表示时选用 16 位族
//! - 为每种方法搜索最优的 nbits / nexcbits
//! - 自动选择编码位数最少的方法 (位数相同时取标签较小者)

use eep_core::bitreader::escape_marker;
use eep_core::{BitWriter, EepError, EepResult};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::block::BlockGeometry;
use crate::method::{METHOD_TAG_BITS, MethodTag, Raw3Method, SampleWidth};
use crate::residual::compute_residuals;

/// 方法选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodPolicy {
    /// 为每个通道选择编码最短的方法
    #[default]
    Auto,
    /// 所有通道使用同一方法
    ///
    /// 强制 `Chan` 时第一个通道无法满足, 编码会失败.
    Force(Raw3Method),
}

/// 编码器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// 方法选择策略
    #[serde(default)]
    pub policy: MethodPolicy,
    /// 是否允许使用 16 位族
    #[serde(default = "default_true")]
    pub allow_16bit: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            policy: MethodPolicy::Auto,
            allow_16bit: true,
        }
    }
}

/// 单个通道的编码方案
#[derive(Debug, Clone)]
struct ChannelPlan {
    tag: MethodTag,
    nbits: u32,
    nexcbits: u32,
    residuals: Vec<i32>,
    bits: u64,
}

/// raw3 编码器
#[derive(Debug, Clone, Default)]
pub struct Raw3Encoder {
    config: EncoderConfig,
}

impl Raw3Encoder {
    /// 创建编码器
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// 编码器配置
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// 编码一个数据块, 返回补齐到字节边界的数据
    pub fn encode_block(&self, samples: &[i32], geometry: BlockGeometry) -> EepResult<Vec<u8>> {
        let mut bw = BitWriter::with_capacity(samples.len() * 4 + 8);
        self.encode_block_into(&mut bw, samples, geometry)?;
        Ok(bw.finish())
    }

    /// 编码一个数据块并追加到已有的写入器, 写完后对齐到字节边界
    ///
    /// 返回每个通道实际使用的方法.
    pub fn encode_block_into(
        &self,
        bw: &mut BitWriter,
        samples: &[i32],
        geometry: BlockGeometry,
    ) -> EepResult<Vec<MethodTag>> {
        if samples.len() != geometry.total_samples() {
            return Err(EepError::InvalidArgument(format!(
                "样本数 {} 与几何参数 {} x {} 不符",
                samples.len(),
                geometry.channel_count(),
                geometry.sample_count(),
            )));
        }

        // 先规划全部通道, 出错时不向写入器写任何数据
        let n = geometry.sample_count();
        let mut plans = Vec::with_capacity(geometry.channel_count());
        let mut previous: Option<&[i32]> = None;
        for (channel, current) in samples.chunks_exact(n).enumerate() {
            plans.push(self.plan_channel(current, previous, channel)?);
            previous = Some(current);
        }

        let start = bw.bits_written();
        for plan in &plans {
            write_channel(bw, plan);
        }
        debug!(
            "raw3 数据块编码完成: {} 通道 x {} 采样, {} 位",
            geometry.channel_count(),
            n,
            bw.bits_written() - start,
        );
        bw.align_to_byte();

        Ok(plans.into_iter().map(|plan| plan.tag).collect())
    }

    /// 为一个通道选择方法与位宽
    fn plan_channel(
        &self,
        samples: &[i32],
        previous: Option<&[i32]>,
        channel: usize,
    ) -> EepResult<ChannelPlan> {
        let candidates: Vec<Raw3Method> = match self.config.policy {
            MethodPolicy::Auto => Raw3Method::ALL
                .into_iter()
                .filter(|method| !method.is_inter_channel() || previous.is_some())
                .collect(),
            MethodPolicy::Force(Raw3Method::Chan) if previous.is_none() => {
                return Err(EepError::InvalidFirstChannelMethod {
                    tag: MethodTag::new(Raw3Method::Chan, SampleWidth::Bits16).tag(),
                });
            }
            MethodPolicy::Force(method) => vec![method],
        };

        let reference = previous.unwrap_or(&[]);
        let mut best: Option<ChannelPlan> = None;
        for method in candidates {
            let residuals = compute_residuals(method, samples, reference);
            let plan = self.plan_residuals(method, residuals);
            trace!(
                "raw3 通道 {} 候选方法 {:?}: {} 位",
                channel, method, plan.bits,
            );
            // 候选按标签顺序排列, 严格小于才替换
            if best.as_ref().is_none_or(|b| plan.bits < b.bits) {
                best = Some(plan);
            }
        }

        best.ok_or_else(|| EepError::InvalidArgument(format!("通道 {} 没有可用的编码方法", channel)))
    }

    /// 为给定残差选择位宽族与 nbits / nexcbits
    fn plan_residuals(&self, method: Raw3Method, residuals: Vec<i32>) -> ChannelPlan {
        let width = if self.config.allow_16bit && fits_16bit_family(&residuals) {
            SampleWidth::Bits16
        } else {
            SampleWidth::Bits32
        };
        let (nbits, nexcbits, payload_bits) = select_widths(&residuals[1..], width);

        ChannelPlan {
            tag: MethodTag::new(method, width),
            nbits,
            nexcbits,
            residuals,
            bits: u64::from(width.header_bits()) + payload_bits,
        }
    }
}

/// 写出一个通道
fn write_channel(bw: &mut BitWriter, plan: &ChannelPlan) {
    let width = plan.tag.width;
    bw.write_bits(u32::from(plan.tag.tag()), METHOD_TAG_BITS);
    bw.write_bits(width.encode_width(plan.nbits), width.width_field_bits());
    bw.write_bits(width.encode_width(plan.nexcbits), width.width_field_bits());
    bw.write_bits_signed(plan.residuals[0], width.sample_bits());
    for &residual in &plan.residuals[1..] {
        bw.write_escaped(residual, plan.nbits, plan.nexcbits);
    }
}

/// 首样本与全部残差能否用 16 位族表示
fn fits_16bit_family(residuals: &[i32]) -> bool {
    residuals.iter().all(|&r| signed_width(r) <= 16)
}

/// 选择使残差总位数最小的 nbits, 返回 (nbits, nexcbits, 残差总位数)
///
/// nexcbits 取能容纳任意残差的最小位宽; nbits 在 1..=族最大位宽 中搜索.
fn select_widths(rest: &[i32], width: SampleWidth) -> (u32, u32, u64) {
    let max_bits = width.sample_bits();

    // histogram[w]: 不经转义至少需要 w 位的残差个数 (w 最大为 33)
    let mut histogram = [0u64; 34];
    let mut nexcbits = 1;
    for &r in rest {
        histogram[unescaped_width(r) as usize] += 1;
        nexcbits = nexcbits.max(signed_width(r));
    }

    let count = rest.len() as u64;
    let mut best = (max_bits, nexcbits, u64::MAX);
    for nbits in 1..=max_bits {
        let escapes: u64 = histogram[nbits as usize + 1..].iter().sum();
        let bits = count * u64::from(nbits) + escapes * u64::from(nexcbits);
        if bits < best.2 {
            best = (nbits, nexcbits, bits);
        }
    }
    best
}

/// 二进制补码表示所需的最小位数
fn signed_width(value: i32) -> u32 {
    if value >= 0 {
        33 - value.leading_zeros()
    } else {
        33 - (!value).leading_zeros()
    }
}

/// 不与转义标记冲突时所需的最小位数
fn unescaped_width(value: i32) -> u32 {
    let width = signed_width(value);
    if value == escape_marker(width) {
        width + 1
    } else {
        width
    }
}
