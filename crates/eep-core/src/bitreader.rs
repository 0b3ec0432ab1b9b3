//! 比特流读取器.
//!
//! 提供从字节缓冲区中按位读取数据的能力, 是 raw3 解码器的基础设施.
//!
//! 按大端位序读取 (MSB first). 所有读取都做边界检查, 失败时游标保持不动,
//! 成功时游标永远不会越过缓冲区末尾.

use crate::{EepError, EepResult};

/// 比特流读取器
///
/// 从字节缓冲区中按位读取数据, 使用大端位序 (MSB first).
///
/// # 示例
/// ```
/// use eep_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_u8().unwrap(), 0b01010101);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器, 从第一个字节的最高位开始
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 从指定位偏移处开始读取
    ///
    /// 偏移等于数据总位数时合法 (游标位于末尾), 超过则返回 `OutOfBounds`.
    pub fn with_bit_offset(data: &'a [u8], bit_offset: u64) -> EepResult<Self> {
        let total_bits = data.len() as u64 * 8;
        if bit_offset > total_bits {
            return Err(EepError::OutOfBounds {
                needed: bit_offset,
                remaining: total_bits,
            });
        }
        Ok(Self {
            data,
            byte_pos: (bit_offset / 8) as usize,
            bit_pos: (bit_offset % 8) as u8,
        })
    }

    /// 当前位置 (从缓冲区起点算起的位数)
    pub fn position(&self) -> u64 {
        self.byte_pos as u64 * 8 + u64::from(self.bit_pos)
    }

    /// 剩余可读位数
    pub fn remaining(&self) -> u64 {
        self.data.len() as u64 * 8 - self.position()
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.remaining() == 0
    }

    /// 读取 N 个位 (最多 32 位)
    ///
    /// 按大端位序读取, 返回值的低 N 位有效.
    pub fn read_bits(&mut self, n: u32) -> EepResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(EepError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        let remaining = self.remaining();
        if u64::from(n) > remaining {
            return Err(EepError::OutOfBounds {
                needed: u64::from(n),
                remaining,
            });
        }

        let mut result: u32 = 0;
        let mut left = n;

        while left > 0 {
            let available = 8 - u32::from(self.bit_pos);
            let to_read = left.min(available);

            // 从当前字节中提取位
            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;

            // to_read 可能为 8, 此时 result 至多已有 24 位, 不会溢出
            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            left -= to_read;
        }

        Ok(result)
    }

    /// 读取有符号整数 (二进制补码, 最多 32 位)
    pub fn read_bits_signed(&mut self, n: u32) -> EepResult<i32> {
        let val = self.read_bits(n)?;
        Ok(sign_extend(val, n))
    }

    /// 读取 8 位无符号整数
    pub fn read_u8(&mut self) -> EepResult<u8> {
        self.read_bits(8).map(|v| v as u8)
    }

    /// 读取 16 位无符号整数 (大端)
    pub fn read_u16(&mut self) -> EepResult<u16> {
        self.read_bits(16).map(|v| v as u16)
    }

    /// 读取 32 位无符号整数 (大端)
    pub fn read_u32(&mut self) -> EepResult<u32> {
        self.read_bits(32)
    }

    /// 读取转义编码的有符号整数
    ///
    /// 先按 `nbits` 位读取有符号值; 若其等于转义标记 (仅最高位为 1),
    /// 真实值紧随其后, 占 `nexcbits` 位. 转义标记之后数据不足时返回
    /// `MalformedVarint`, 游标回到标记之前.
    pub fn read_escaped(&mut self, nbits: u32, nexcbits: u32) -> EepResult<i32> {
        if !(1..=32).contains(&nbits) || !(1..=32).contains(&nexcbits) {
            return Err(EepError::InvalidArgument(format!(
                "read_escaped: nbits={} nexcbits={} 超出 1..=32",
                nbits, nexcbits,
            )));
        }

        let saved = (self.byte_pos, self.bit_pos);
        let marker_pos = self.position();
        let value = self.read_bits_signed(nbits)?;
        if value != escape_marker(nbits) {
            return Ok(value);
        }

        match self.read_bits_signed(nexcbits) {
            Ok(exc) => Ok(exc),
            Err(EepError::OutOfBounds { .. }) => {
                (self.byte_pos, self.bit_pos) = saved;
                Err(EepError::MalformedVarint {
                    position: marker_pos,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// 对齐到下一个字节边界
    ///
    /// 如果当前已在字节边界, 则不做任何事.
    pub fn align_to_byte(&mut self) {
        if self.bit_pos > 0 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
    }

    /// 获取当前字节位置 (不足一字节的部分不计)
    pub fn byte_position(&self) -> usize {
        self.byte_pos
    }

    /// 获取底层数据的引用
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/// 指定位宽下的转义标记: 只有最高位为 1 的位模式, 即 `-(2^(nbits-1))`
///
/// `nbits` 取值 1..=32.
pub fn escape_marker(nbits: u32) -> i32 {
    if nbits >= 32 {
        i32::MIN
    } else {
        -(1i32 << (nbits - 1))
    }
}

/// 将低 N 位按二进制补码做符号扩展
fn sign_extend(val: u32, n: u32) -> i32 {
    if n == 0 {
        return 0;
    }
    // n == 32 时, val 的全部 32 位有效, 直接转换为 i32
    if n >= 32 {
        return val as i32;
    }
    if (val >> (n - 1)) & 1 != 0 {
        val as i32 | !((1i32 << n) - 1)
    } else {
        val as i32
    }
}
