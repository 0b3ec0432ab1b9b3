//! raw3 数据块解码.
//!
//! 一个数据块包含 `channel_count` 个通道, 每个通道 `sample_count` 个采样.
//! 通道按顺序紧密排列, 整个数据块在末尾补齐到字节边界.
//!
//! 解码是纯函数: 输入只读字节缓冲区与起始偏移, 输出新分配的样本矩阵
//! (按通道连续排列) 以及下一数据块的起始偏移. 任何错误都会丢弃整个数据块.

use eep_core::{BitReader, EepError, EepResult};
use log::debug;

use crate::channel::{ChannelReference, decode_channel_body, read_method_tag};
use crate::method::{MethodTag, SampleWidth};

/// 数据块几何参数: 每通道采样数与通道数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockGeometry {
    sample_count: usize,
    channel_count: usize,
}

impl BlockGeometry {
    /// 创建几何参数
    ///
    /// 两者都必须为正, 且乘积能够在内存中寻址.
    pub fn new(sample_count: u64, channel_count: u64) -> EepResult<Self> {
        if sample_count == 0 || channel_count == 0 {
            return Err(EepError::InvalidGeometry(format!(
                "采样数 {} 与通道数 {} 必须为正",
                sample_count, channel_count,
            )));
        }

        let too_large = || {
            EepError::InvalidGeometry(format!(
                "采样数 {} x 通道数 {} 超出可寻址范围",
                sample_count, channel_count,
            ))
        };
        let samples = usize::try_from(sample_count).map_err(|_| too_large())?;
        let channels = usize::try_from(channel_count).map_err(|_| too_large())?;
        samples
            .checked_mul(channels)
            .filter(|total| *total <= isize::MAX as usize / size_of::<i32>())
            .ok_or_else(too_large)?;

        Ok(Self {
            sample_count: samples,
            channel_count: channels,
        })
    }

    /// 每通道采样数
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// 通道数
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// 样本总数
    pub fn total_samples(&self) -> usize {
        self.sample_count * self.channel_count
    }

    /// 合法数据块的最小位数
    ///
    /// 每通道至少有一个 16 位族通道头, 其后每个残差至少 1 位.
    pub fn min_block_bits(&self) -> u64 {
        let per_channel =
            u64::from(SampleWidth::Bits16.header_bits()) + (self.sample_count as u64 - 1);
        per_channel.saturating_mul(self.channel_count as u64)
    }
}

/// 解码后的数据块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlock {
    /// 样本矩阵, 按通道连续排列
    samples: Vec<i32>,
    /// 几何参数
    geometry: BlockGeometry,
    /// 每个通道使用的方法
    methods: Vec<MethodTag>,
    /// 数据块起始位位置
    start_bit: u64,
    /// 最后一个通道结束处的位位置 (未补齐)
    end_bit: u64,
}

impl DecodedBlock {
    /// 全部样本, 按通道连续排列
    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    /// 取出样本矩阵的所有权
    pub fn into_samples(self) -> Vec<i32> {
        self.samples
    }

    /// 几何参数
    pub fn geometry(&self) -> BlockGeometry {
        self.geometry
    }

    /// 每个通道的方法标签
    pub fn methods(&self) -> &[MethodTag] {
        &self.methods
    }

    /// 指定通道的样本
    pub fn channel(&self, index: usize) -> Option<&[i32]> {
        self.channels().nth(index)
    }

    /// 按通道顺序迭代
    pub fn channels(&self) -> impl Iterator<Item = &[i32]> {
        self.samples.chunks_exact(self.geometry.sample_count)
    }

    /// 转换为按采样交错排列 (每个采样点依次列出所有通道)
    pub fn to_interleaved(&self) -> Vec<i32> {
        let n = self.geometry.sample_count;
        let c = self.geometry.channel_count;
        let mut out = vec![0i32; self.samples.len()];
        for (ch, channel) in self.channels().enumerate() {
            for (s, &value) in channel.iter().enumerate() {
                out[s * c + ch] = value;
            }
        }
        debug_assert_eq!(out.len(), n * c);
        out
    }

    /// 下一数据块的字节偏移 (向上补齐到字节边界)
    pub fn next_offset(&self) -> u64 {
        self.end_bit.div_ceil(8)
    }

    /// 最后一个通道结束处的位偏移
    pub fn next_bit_offset(&self) -> u64 {
        self.end_bit
    }

    /// 本数据块实际占用的位数 (不含末尾补齐)
    pub fn bits_consumed(&self) -> u64 {
        self.end_bit - self.start_bit
    }
}

/// 从字节偏移处解码一个数据块
///
/// 返回的 [`DecodedBlock::next_offset`] 即下一数据块的字节偏移.
///
/// # 示例
/// ```
/// use eep_codec::{BlockGeometry, Raw3Encoder, decode_block};
///
/// let samples = [10, 20, 30, 40, 5, 6, 7, 8];
/// let geometry = BlockGeometry::new(4, 2).unwrap();
/// let data = Raw3Encoder::default().encode_block(&samples, geometry).unwrap();
///
/// let block = decode_block(&data, 0, 4, 2).unwrap();
/// assert_eq!(block.samples(), &samples);
/// assert_eq!(block.next_offset(), data.len() as u64);
/// ```
pub fn decode_block(
    data: &[u8],
    offset: u64,
    sample_count: u64,
    channel_count: u64,
) -> EepResult<DecodedBlock> {
    let geometry = BlockGeometry::new(sample_count, channel_count)?;
    let bit_offset = byte_to_bit_offset(data, offset)?;
    decode_block_with(data, bit_offset, geometry)
}

/// 字节偏移换算为位偏移, 溢出时按越界处理 (单位均为位)
pub(crate) fn byte_to_bit_offset(data: &[u8], offset: u64) -> EepResult<u64> {
    offset.checked_mul(8).ok_or(EepError::OutOfBounds {
        needed: u64::MAX,
        remaining: (data.len() as u64).saturating_mul(8),
    })
}

/// 从位偏移处解码一个数据块
///
/// 供以位为单位寻址数据流的调用方使用 (例如把 epoch 字节偏移乘以 8).
pub fn decode_block_at_bit(
    data: &[u8],
    bit_offset: u64,
    sample_count: u64,
    channel_count: u64,
) -> EepResult<DecodedBlock> {
    let geometry = BlockGeometry::new(sample_count, channel_count)?;
    decode_block_with(data, bit_offset, geometry)
}

/// 以已校验的几何参数解码一个数据块
pub fn decode_block_with(
    data: &[u8],
    bit_offset: u64,
    geometry: BlockGeometry,
) -> EepResult<DecodedBlock> {
    let mut br = BitReader::with_bit_offset(data, bit_offset)?;
    let available = br.remaining();

    // 第一个通道的方法标签先于其他任何检查
    let first_tag = read_method_tag(&mut br, 0)?;
    if first_tag.is_inter_channel() {
        return Err(EepError::InvalidFirstChannelMethod {
            tag: first_tag.tag(),
        });
    }

    // 数据连最小数据块都放不下时, 不必分配输出
    let min_bits = geometry.min_block_bits();
    if available < min_bits {
        return Err(EepError::OutOfBounds {
            needed: min_bits,
            remaining: available,
        });
    }

    let n = geometry.sample_count();
    let mut samples = vec![0i32; geometry.total_samples()];
    let mut methods = Vec::with_capacity(geometry.channel_count());

    for channel in 0..geometry.channel_count() {
        let tag = match channel {
            0 => first_tag,
            _ => read_method_tag(&mut br, channel)?,
        };

        // 已解码部分与当前通道分开借用, 前一通道作为只读参考
        let (decoded, pending) = samples.split_at_mut(channel * n);
        let out = &mut pending[..n];
        let reference = match channel {
            0 => ChannelReference::None,
            _ => ChannelReference::Previous(&decoded[(channel - 1) * n..]),
        };

        decode_channel_body(&mut br, out, channel, tag, reference)?;
        methods.push(tag);
    }

    let end_bit = br.position();
    debug!(
        "raw3 数据块解码完成: {} 通道 x {} 采样, 位 {}..{}",
        geometry.channel_count(),
        n,
        bit_offset,
        end_bit,
    );

    Ok(DecodedBlock {
        samples,
        geometry,
        methods,
        start_bit: bit_offset,
        end_bit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Raw3Method;
    use eep_core::BitWriter;

    /// 写一个 16 位族通道
    fn write_channel16(bw: &mut BitWriter, tag: u32, nbits: u32, first: i32, rest: &[i32]) {
        bw.write_bits(tag, 4);
        bw.write_bits(nbits, 4);
        bw.write_bits(0, 4); // nexcbits = 16
        bw.write_bits_signed(first, 16);
        for &r in rest {
            bw.write_escaped(r, nbits, 16);
        }
    }

    #[test]
    fn test_geometry_validation() {
        assert!(matches!(
            BlockGeometry::new(0, 4),
            Err(EepError::InvalidGeometry(_))
        ));
        assert!(matches!(
            BlockGeometry::new(4, 0),
            Err(EepError::InvalidGeometry(_))
        ));
        assert!(matches!(
            BlockGeometry::new(u64::MAX, 2),
            Err(EepError::InvalidGeometry(_))
        ));

        let geometry = BlockGeometry::new(4, 2).unwrap();
        assert_eq!(geometry.total_samples(), 8);
        assert_eq!(geometry.min_block_bits(), 2 * (28 + 3));
    }

    #[test]
    fn test_copy_and_time_scenario() {
        let mut bw = BitWriter::new();
        write_channel16(&mut bw, 0, 7, 10, &[20, 30, 40]);
        write_channel16(&mut bw, 1, 2, 5, &[1, 1, 1]);
        let data = bw.finish();
        // (28 + 3*7) + (28 + 3*2) = 83 位 -> 11 字节
        assert_eq!(data.len(), 11);

        let block = decode_block(&data, 0, 4, 2).unwrap();
        assert_eq!(block.channel(0).unwrap(), &[10, 20, 30, 40]);
        assert_eq!(block.channel(1).unwrap(), &[5, 6, 7, 8]);
        assert_eq!(block.bits_consumed(), 83);
        assert_eq!(block.next_bit_offset(), 83);
        assert_eq!(block.next_offset(), 11);
        assert_eq!(block.methods()[0].method, Raw3Method::Copy);
        assert_eq!(block.methods()[1].method, Raw3Method::Time);
    }

    #[test]
    fn test_decode_at_nonzero_offset() {
        let mut bw = BitWriter::new();
        bw.write_bits(0xABCD, 16); // 前一数据块的尾部
        write_channel16(&mut bw, 1, 3, -100, &[1, -2, 3]);
        let data = bw.finish();

        let block = decode_block(&data, 2, 4, 1).unwrap();
        assert_eq!(block.samples(), &[-100, -99, -101, -98]);
        assert_eq!(block.next_offset(), data.len() as u64);

        let same = decode_block_at_bit(&data, 16, 4, 1).unwrap();
        assert_eq!(same, block);
    }

    #[test]
    fn test_first_channel_chan_rejected() {
        let mut bw = BitWriter::new();
        write_channel16(&mut bw, 3, 4, 0, &[0, 0, 0]);
        write_channel16(&mut bw, 0, 4, 0, &[0, 0, 0]);
        let data = bw.finish();

        let err = decode_block(&data, 0, 4, 2).unwrap_err();
        assert_eq!(err, EepError::InvalidFirstChannelMethod { tag: 3 });
    }

    #[test]
    fn test_first_channel_chan_rejected_on_short_buffer() {
        // 缓冲区不足最小数据块, 但第一个通道的标签已能读出
        let cases: [(&[u8], u64, u64, u8); 4] = [
            (&[0x30, 0, 0], 1, 1, 3),
            (&[0x30, 0, 0, 0], 1, 2, 3),
            (&[0x30], 4, 2, 3),
            (&[0xB0], 4, 2, 11),
        ];
        for (data, n, c, tag) in cases {
            let err = decode_block(data, 0, n, c).unwrap_err();
            assert_eq!(err, EepError::InvalidFirstChannelMethod { tag }, "data={data:?}");
        }

        // 连标签都读不完整时仍是越界
        assert!(matches!(
            decode_block(&[], 0, 4, 2),
            Err(EepError::OutOfBounds { needed: 4, remaining: 0 })
        ));
        assert!(matches!(
            decode_block_at_bit(&[0x03], 5, 4, 2),
            Err(EepError::OutOfBounds { needed: 4, remaining: 3 })
        ));
    }

    #[test]
    fn test_short_buffer_after_valid_first_tag() {
        let err = decode_block(&[0x00, 0, 0], 0, 1, 1).unwrap_err();
        assert_eq!(
            err,
            EepError::OutOfBounds {
                needed: 28,
                remaining: 24
            }
        );
    }

    #[test]
    fn test_chan_allowed_after_first_channel() {
        let mut bw = BitWriter::new();
        write_channel16(&mut bw, 0, 7, 10, &[20, 30, 40]);
        write_channel16(&mut bw, 3, 4, 10, &[-5, 7, -1]);
        write_channel16(&mut bw, 3, 4, 0, &[0, 0, 0]);
        let data = bw.finish();

        let block = decode_block(&data, 0, 4, 3).unwrap();
        assert_eq!(block.channel(1).unwrap(), &[10, 15, 32, 41]);
        // 第三个通道相对第二个通道: 差分完全相同, 只有首样本不同
        assert_eq!(block.channel(2).unwrap(), &[0, 5, 22, 31]);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut bw = BitWriter::new();
        write_channel16(&mut bw, 0, 4, 1, &[0]);
        bw.write_bits(6, 4);
        bw.write_bits(0, 40);
        let data = bw.finish();

        let err = decode_block(&data, 0, 2, 2).unwrap_err();
        assert_eq!(err, EepError::UnknownMethodTag { channel: 1, tag: 6 });
    }

    #[test]
    fn test_offset_past_end() {
        let data = [0u8; 4];
        assert!(matches!(
            decode_block(&data, 5, 1, 1),
            Err(EepError::OutOfBounds { .. })
        ));
        // 字节偏移换算溢出时, 错误字段仍以位为单位
        assert_eq!(
            decode_block(&data, u64::MAX, 1, 1).unwrap_err(),
            EepError::OutOfBounds {
                needed: u64::MAX,
                remaining: 32
            }
        );
    }

    #[test]
    fn test_huge_geometry_rejected_before_allocation() {
        let data = [0u8; 16];
        let err = decode_block(&data, 0, 1 << 40, 1 << 10).unwrap_err();
        assert!(matches!(err, EepError::OutOfBounds { .. }), "{err:?}");
    }

    #[test]
    fn test_interleaved_layout() {
        let mut bw = BitWriter::new();
        write_channel16(&mut bw, 0, 7, 1, &[2, 3]);
        write_channel16(&mut bw, 0, 7, 4, &[5, 6]);
        let data = bw.finish();

        let block = decode_block(&data, 0, 3, 2).unwrap();
        assert_eq!(block.samples(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(block.to_interleaved(), vec![1, 4, 2, 5, 3, 6]);
        assert_eq!(block.channels().count(), 2);
        assert!(block.channel(2).is_none());
    }
}
