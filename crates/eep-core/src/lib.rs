//! # eep-core
//!
//! EEP 原始数据流核心库, 提供错误类型与比特流读写工具.
//!
//! raw3 数据流按大端位序 (MSB first) 存储, 各通道首尾相接不做字节对齐,
//! 因此解码与编码都建立在逐位读写之上.

pub mod bitreader;
pub mod bitwriter;
pub mod error;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{EepError, EepResult};
