//! # eep
//!
//! 纯 Rust 实现的 EEP/CNT raw3 信号数据编解码库.
//!
//! - **解码**: 从缓冲区任意偏移解码一个 raw3 数据块, 得到按通道排列的样本矩阵
//! - **编码**: 参考编码器, 为每个通道选择最短的预测方法
//! - **逐块读取**: 顺序或按 epoch 偏移表遍历数据流, 支持并行解码
//! - **日志**: 基于 tracing 的控制台与按日滚动文件输出
//!
//! # 快速开始
//!
//! ```rust
//! use eep::codec::{BlockGeometry, Raw3Encoder};
//!
//! let samples = [10, 20, 30, 40, 5, 6, 7, 8];
//! let geometry = BlockGeometry::new(4, 2).unwrap();
//! let data = Raw3Encoder::default().encode_block(&samples, geometry).unwrap();
//!
//! let (decoded, next_offset) = eep::read_block(&data, 4, 2, 0).unwrap();
//! assert_eq!(decoded, samples);
//! assert_eq!(next_offset, data.len() as u64);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `eep-core` | 错误类型与比特读写 |
//! | `eep-codec` | raw3 编解码 |

/// 错误类型与比特读写
pub use eep_core as core;

/// raw3 编解码
pub use eep_codec as codec;

pub mod logging;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 从字节偏移 `offset` 处解码一个数据块
///
/// 返回按通道连续排列的样本 (通道 `c` 的第 `i` 个样本位于 `c * sample_count + i`)
/// 以及紧随其后的字节偏移.
pub fn read_block(
    data: &[u8],
    sample_count: u64,
    channel_count: u64,
    offset: u64,
) -> eep_core::EepResult<(Vec<i32>, u64)> {
    let block = eep_codec::decode_block(data, offset, sample_count, channel_count)?;
    let next_offset = block.next_offset();
    Ok((block.into_samples(), next_offset))
}
