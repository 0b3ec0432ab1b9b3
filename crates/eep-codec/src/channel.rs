//! raw3 通道解码器.
//!
//! 一个通道子块的位布局 (MSB first, 与前后通道首尾相接, 不做字节对齐):
//!
//! ```text
//! 16 位族 (标签 0-3)                     32 位族 (标签 8-11)
//!   method     4 bits                      method     4 bits
//!   nbits      4 bits (0 表示 16)          nbits      6 bits (1..=32)
//!   nexcbits   4 bits (0 表示 16)          nexcbits   6 bits (1..=32)
//!   first      16 bits 补码                first      32 bits 补码
//!   (n-1) 个转义编码残差                    (n-1) 个转义编码残差
//! ```
//!
//! 转义编码残差先占 `nbits` 位; 若读到转义标记 `-(2^(nbits-1))`,
//! 真实值紧随其后占 `nexcbits` 位. 残差读完后按方法还原出样本.

use eep_core::{BitReader, EepError, EepResult};
use log::trace;

use crate::method::{METHOD_TAG_BITS, MethodTag, Raw3Method};
use crate::residual::{restore_chan, restore_time, restore_time2};

/// 通道解码时可用的参考通道
#[derive(Debug, Clone, Copy)]
pub enum ChannelReference<'a> {
    /// 第一个通道, 没有可引用的通道
    None,
    /// 紧邻的前一通道 (已解码, 长度与当前通道相同)
    Previous(&'a [i32]),
}

/// 已解析的通道头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelHeader {
    /// 方法标签
    pub tag: MethodTag,
    /// 常规残差位宽
    pub nbits: u32,
    /// 转义值位宽
    pub nexcbits: u32,
}

/// 读取通道的 4 位方法标签
pub fn read_method_tag(br: &mut BitReader<'_>, channel: usize) -> EepResult<MethodTag> {
    let tag = br.read_bits(METHOD_TAG_BITS)? as u8;
    MethodTag::from_tag(tag, channel)
}

/// 解码一个完整通道 (含方法标签), 结果写入 `out`
///
/// `out` 的长度即每通道采样数.
pub fn decode_channel(
    br: &mut BitReader<'_>,
    out: &mut [i32],
    channel: usize,
    reference: ChannelReference<'_>,
) -> EepResult<ChannelHeader> {
    let tag = read_method_tag(br, channel)?;
    decode_channel_body(br, out, channel, tag, reference)
}

/// 在方法标签已读取的前提下解码通道其余部分
pub fn decode_channel_body(
    br: &mut BitReader<'_>,
    out: &mut [i32],
    channel: usize,
    tag: MethodTag,
    reference: ChannelReference<'_>,
) -> EepResult<ChannelHeader> {
    // 没有参考通道时不存在合法的通道间残差
    if tag.is_inter_channel() && matches!(reference, ChannelReference::None) {
        return Err(EepError::InvalidFirstChannelMethod { tag: tag.tag() });
    }

    let header = read_channel_header(br, tag, channel)?;
    read_residuals(br, out, &header)?;

    trace!(
        "raw3 通道 {}: 方法 {:?}/{:?}, nbits={}, nexcbits={}",
        channel, tag.method, tag.width, header.nbits, header.nexcbits,
    );

    match tag.method {
        Raw3Method::Copy => {}
        Raw3Method::Time => restore_time(out),
        Raw3Method::Time2 => restore_time2(out),
        Raw3Method::Chan => {
            if let ChannelReference::Previous(prev) = reference {
                debug_assert_eq!(prev.len(), out.len());
                restore_chan(out, prev);
            }
        }
    }

    Ok(header)
}

/// 读取 nbits / nexcbits 两个宽度字段
fn read_channel_header(
    br: &mut BitReader<'_>,
    tag: MethodTag,
    channel: usize,
) -> EepResult<ChannelHeader> {
    let field_bits = tag.width.width_field_bits();
    let nbits_field = br.read_bits(field_bits)?;
    let nexcbits_field = br.read_bits(field_bits)?;

    match (
        tag.width.decode_width(nbits_field),
        tag.width.decode_width(nexcbits_field),
    ) {
        (Some(nbits), Some(nexcbits)) => Ok(ChannelHeader {
            tag,
            nbits,
            nexcbits,
        }),
        _ => Err(EepError::InvalidBitWidth {
            channel,
            nbits: nbits_field,
            nexcbits: nexcbits_field,
        }),
    }
}

/// 读取首样本与其后的转义编码残差
fn read_residuals(
    br: &mut BitReader<'_>,
    out: &mut [i32],
    header: &ChannelHeader,
) -> EepResult<()> {
    let Some((first, rest)) = out.split_first_mut() else {
        return Err(EepError::InvalidGeometry("通道采样数为 0".into()));
    };

    *first = br.read_bits_signed(header.tag.width.sample_bits())?;
    for slot in rest {
        *slot = br.read_escaped(header.nbits, header.nexcbits)?;
    }
    Ok(())
}
