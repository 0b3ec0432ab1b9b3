//! raw3 通道压缩方法.
//!
//! 每个通道的子块以 4 位方法标签开头. 低 2 位选择残差类型,
//! 第 3 位 (值 8) 选择 16 位或 32 位族:
//!
//! | 标签 | 方法 | 位宽族 |
//! |------|------|--------|
//! | 0 / 8  | Copy  (原样)       | 16 / 32 |
//! | 1 / 9  | Time  (一阶时间残差) | 16 / 32 |
//! | 2 / 10 | Time2 (二阶时间残差) | 16 / 32 |
//! | 3 / 11 | Chan  (通道间残差)  | 16 / 32 |
//!
//! 其余标签 (4-7, 12-15) 未定义.

use eep_core::{EepError, EepResult};
use serde::{Deserialize, Serialize};

/// 方法标签占用的位数
pub const METHOD_TAG_BITS: u32 = 4;

/// 残差类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Raw3Method {
    /// 原样存储
    Copy,
    /// 一阶时间残差
    Time,
    /// 二阶时间残差
    Time2,
    /// 相对前一通道的残差
    Chan,
}

impl Raw3Method {
    /// 全部方法, 按标签顺序
    pub const ALL: [Raw3Method; 4] = [
        Raw3Method::Copy,
        Raw3Method::Time,
        Raw3Method::Time2,
        Raw3Method::Chan,
    ];

    /// 标签的低 2 位
    fn code(self) -> u8 {
        match self {
            Raw3Method::Copy => 0,
            Raw3Method::Time => 1,
            Raw3Method::Time2 => 2,
            Raw3Method::Chan => 3,
        }
    }

    /// 是否需要引用前一通道
    pub fn is_inter_channel(self) -> bool {
        matches!(self, Raw3Method::Chan)
    }
}

/// 位宽族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleWidth {
    /// 16 位族: 4 位宽度字段, 16 位首样本
    Bits16,
    /// 32 位族: 6 位宽度字段, 32 位首样本
    Bits32,
}

impl SampleWidth {
    /// nbits / nexcbits 字段各自的位数
    pub fn width_field_bits(self) -> u32 {
        match self {
            SampleWidth::Bits16 => 4,
            SampleWidth::Bits32 => 6,
        }
    }

    /// 首样本以及残差的最大位宽
    pub fn sample_bits(self) -> u32 {
        match self {
            SampleWidth::Bits16 => 16,
            SampleWidth::Bits32 => 32,
        }
    }

    /// 通道头 (标签 + 两个宽度字段 + 首样本) 的总位数
    pub fn header_bits(self) -> u32 {
        METHOD_TAG_BITS + 2 * self.width_field_bits() + self.sample_bits()
    }

    /// 解析宽度字段
    ///
    /// 16 位族中 0 表示 16; 32 位族的合法取值为 1..=32.
    pub fn decode_width(self, field: u32) -> Option<u32> {
        match self {
            SampleWidth::Bits16 if field == 0 => Some(16),
            SampleWidth::Bits16 => Some(field),
            SampleWidth::Bits32 if (1..=32).contains(&field) => Some(field),
            SampleWidth::Bits32 => None,
        }
    }

    /// 生成宽度字段, 与 `decode_width` 互逆
    pub fn encode_width(self, width: u32) -> u32 {
        match self {
            SampleWidth::Bits16 if width == 16 => 0,
            _ => width,
        }
    }
}

/// 完整的方法标签: 残差类型 + 位宽族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodTag {
    /// 残差类型
    pub method: Raw3Method,
    /// 位宽族
    pub width: SampleWidth,
}

impl MethodTag {
    /// 构造方法标签
    pub fn new(method: Raw3Method, width: SampleWidth) -> Self {
        Self { method, width }
    }

    /// 从 4 位标签值解析
    pub fn from_tag(tag: u8, channel: usize) -> EepResult<Self> {
        if tag > 0x0F {
            return Err(EepError::UnknownMethodTag { channel, tag });
        }
        let width = match tag & 0x0C {
            0x00 => SampleWidth::Bits16,
            0x08 => SampleWidth::Bits32,
            _ => return Err(EepError::UnknownMethodTag { channel, tag }),
        };
        let method = match tag & 0x03 {
            0 => Raw3Method::Copy,
            1 => Raw3Method::Time,
            2 => Raw3Method::Time2,
            _ => Raw3Method::Chan,
        };
        Ok(Self { method, width })
    }

    /// 4 位标签值
    pub fn tag(self) -> u8 {
        let family = match self.width {
            SampleWidth::Bits16 => 0,
            SampleWidth::Bits32 => 8,
        };
        family | self.method.code()
    }

    /// 是否为通道间残差 (标签 3 或 11)
    pub fn is_inter_channel(self) -> bool {
        self.method.is_inter_channel()
    }
}
