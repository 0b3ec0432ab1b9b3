//! # eep-codec
//!
//! EEP/CNT 文件 raw3 数据流的编解码库.
//!
//! raw3 把多通道生物电信号按数据块 (epoch) 存储. 每个数据块内各通道依次编码,
//! 通道可选原样、一阶/二阶时间残差或相对前一通道的残差, 残差以转义编码
//! 写入比特流. 本 crate 负责:
//!
//! - **解码**: 从字节缓冲区的任意偏移解码一个数据块, 返回按通道连续排列的
//!   样本矩阵与下一数据块的偏移
//! - **编码**: 参考编码器, 为每个通道自动选择最短的方法
//! - **逐块读取**: 顺序或按 epoch 偏移表遍历整条数据流, 支持并行解码
//!
//! 容器层 (RIFF 块、通道元数据、校准系数) 不在本 crate 范围内.
//!
//! ## 使用示例
//!
//! ```rust
//! use eep_codec::{BlockGeometry, Raw3Encoder, decode_block};
//!
//! let samples = [10, 20, 30, 40, 10, 15, 32, 41];
//! let geometry = BlockGeometry::new(4, 2).unwrap();
//! let data = Raw3Encoder::default().encode_block(&samples, geometry).unwrap();
//!
//! let block = decode_block(&data, 0, 4, 2).unwrap();
//! assert_eq!(block.channel(1).unwrap(), &[10, 15, 32, 41]);
//! ```

pub mod block;
pub mod channel;
pub mod encoder;
pub mod method;
pub mod reader;
pub mod residual;

// 重导出常用类型
pub use block::{
    BlockGeometry, DecodedBlock, decode_block, decode_block_at_bit, decode_block_with,
};
pub use channel::{ChannelHeader, ChannelReference, decode_channel};
pub use encoder::{EncoderConfig, MethodPolicy, Raw3Encoder};
pub use method::{MethodTag, Raw3Method, SampleWidth};
pub use reader::{BlockReader, StreamLayout, decode_epochs_parallel};
