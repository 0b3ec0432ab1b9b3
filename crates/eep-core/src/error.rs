//! 统一错误类型定义.
//!
//! 所有 EEP crate 共用的错误类型. 解码失败时整个数据块作废,
//! 错误原样返回给调用方, 由调用方决定中止、跳过还是上报.

use thiserror::Error;

/// EEP 统一错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EepError {
    /// 读取所需位数超过剩余数据
    #[error("数据越界: 需要 {needed} 位, 剩余 {remaining} 位")]
    OutOfBounds {
        /// 本次读取需要的位数
        needed: u64,
        /// 读取前剩余的位数
        remaining: u64,
    },

    /// 转义编码值在缓冲区末尾被截断
    #[error("转义编码值不完整: 位置 {position} 处的转义标记缺少后续数据")]
    MalformedVarint {
        /// 转义标记所在的位位置
        position: u64,
    },

    /// 第一个通道使用了通道间残差方法
    #[error("第一个通道的压缩方法不能是通道间残差 (方法 {tag}, 即 3/11)")]
    InvalidFirstChannelMethod {
        /// 读取到的方法标签
        tag: u8,
    },

    /// 未定义的方法标签
    #[error("通道 {channel} 使用了未知的压缩方法标签: {tag}")]
    UnknownMethodTag {
        /// 通道索引
        channel: usize,
        /// 方法标签
        tag: u8,
    },

    /// 通道头中的位宽无效
    #[error("通道 {channel} 的位宽无效: nbits={nbits}, nexcbits={nexcbits}")]
    InvalidBitWidth {
        /// 通道索引
        channel: usize,
        /// 常规残差位宽
        nbits: u32,
        /// 转义值位宽
        nexcbits: u32,
    },

    /// 无效的数据块几何参数
    #[error("无效的数据块几何参数: {0}")]
    InvalidGeometry(String),

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),
}

/// EEP 统一 Result 类型
pub type EepResult<T> = Result<T, EepError>;

impl EepError {
    /// 是否为数据截断类错误 (越界或转义值不完整)
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            EepError::OutOfBounds { .. } | EepError::MalformedVarint { .. }
        )
    }
}
