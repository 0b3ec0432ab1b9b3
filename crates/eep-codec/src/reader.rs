//! raw3 数据流的逐块读取.
//!
//! 数据流由若干数据块首尾相接组成, 除最后一块外每块 `block_samples` 个采样,
//! 最后一块为剩余采样. 数据块起点既可以顺序推进 (上一块的 `next_offset`),
//! 也可以来自调用方提供的 epoch 起始字节偏移表.

use bytes::Bytes;
use eep_core::{EepError, EepResult};
use log::trace;
use rayon::prelude::*;

use crate::block::{BlockGeometry, DecodedBlock, byte_to_bit_offset, decode_block_with};

/// 数据流的分块方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLayout {
    /// 通道数
    pub channel_count: u64,
    /// 每个完整数据块的采样数
    pub block_samples: u64,
    /// 每通道的总采样数
    pub total_samples: u64,
}

impl StreamLayout {
    /// 数据块个数
    ///
    /// 块数超出 `usize` 的布局无法通过校验, 此处按饱和处理.
    pub fn block_count(&self) -> usize {
        usize::try_from(self.block_count_u64()).unwrap_or(usize::MAX)
    }

    fn block_count_u64(&self) -> u64 {
        if self.block_samples == 0 {
            return 0;
        }
        self.total_samples.div_ceil(self.block_samples)
    }

    /// 第 `index` 个数据块的几何参数, 最后一块可能较短
    pub fn block_geometry(&self, index: usize) -> EepResult<BlockGeometry> {
        let start = (index as u64).saturating_mul(self.block_samples);
        if index >= self.block_count() || start >= self.total_samples {
            return Err(EepError::InvalidArgument(format!(
                "数据块索引 {} 超出范围 (共 {} 块)",
                index,
                self.block_count(),
            )));
        }
        let samples = self.block_samples.min(self.total_samples - start);
        BlockGeometry::new(samples, self.channel_count)
    }

    fn validate(&self) -> EepResult<()> {
        if self.block_samples == 0 || self.channel_count == 0 {
            return Err(EepError::InvalidGeometry(format!(
                "每块采样数 {} 与通道数 {} 必须为正",
                self.block_samples, self.channel_count,
            )));
        }
        if usize::try_from(self.block_count_u64()).is_err() {
            return Err(EepError::InvalidGeometry(format!(
                "数据块个数 {} 超出可寻址范围",
                self.block_count_u64(),
            )));
        }
        Ok(())
    }
}

/// 逐块解码 raw3 数据流的迭代器
///
/// 每次迭代产出一个数据块; 出现错误后迭代结束.
#[derive(Debug, Clone)]
pub struct BlockReader {
    /// 数据流
    data: Bytes,
    /// 分块方式
    layout: StreamLayout,
    /// epoch 起始字节偏移表 (为空时顺序推进)
    epoch_starts: Option<Vec<u64>>,
    /// 下一个数据块的索引
    block_index: usize,
    /// 顺序推进时下一数据块的字节偏移
    next_offset: u64,
    /// 是否已因错误终止
    failed: bool,
}

impl BlockReader {
    /// 创建顺序读取器, 第一个数据块从偏移 0 开始
    pub fn new(data: impl Into<Bytes>, layout: StreamLayout) -> EepResult<Self> {
        layout.validate()?;
        Ok(Self {
            data: data.into(),
            layout,
            epoch_starts: None,
            block_index: 0,
            next_offset: 0,
            failed: false,
        })
    }

    /// 使用 epoch 起始字节偏移表定位各数据块
    ///
    /// 表项个数必须与数据块个数一致.
    pub fn with_epoch_starts(mut self, starts: Vec<u64>) -> EepResult<Self> {
        if starts.len() != self.layout.block_count() {
            return Err(EepError::InvalidArgument(format!(
                "epoch 表有 {} 项, 而数据流共 {} 块",
                starts.len(),
                self.layout.block_count(),
            )));
        }
        self.epoch_starts = Some(starts);
        Ok(self)
    }

    /// 数据块个数
    pub fn block_count(&self) -> usize {
        self.layout.block_count()
    }

    /// 分块方式
    pub fn layout(&self) -> StreamLayout {
        self.layout
    }

    fn read_next(&mut self) -> EepResult<DecodedBlock> {
        let index = self.block_index;
        let geometry = self.layout.block_geometry(index)?;
        let offset = match &self.epoch_starts {
            Some(starts) => starts[index],
            None => self.next_offset,
        };
        let bit_offset = byte_to_bit_offset(&self.data, offset)?;

        let block = decode_block_with(&self.data, bit_offset, geometry)?;
        self.next_offset = block.next_offset();
        trace!(
            "raw3 数据块 {}/{} 位于字节 {}",
            index + 1,
            self.layout.block_count(),
            offset,
        );
        Ok(block)
    }
}

impl Iterator for BlockReader {
    type Item = EepResult<DecodedBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.block_index >= self.layout.block_count() {
            return None;
        }

        let result = self.read_next();
        match result {
            Ok(_) => self.block_index += 1,
            Err(_) => self.failed = true,
        }
        Some(result)
    }
}

/// 按 epoch 起始字节偏移表并行解码全部数据块, 结果保持原顺序
///
/// 各数据块互相独立, 只共享只读的输入缓冲区. 任一数据块失败则返回错误.
pub fn decode_epochs_parallel(
    data: &[u8],
    epoch_starts: &[u64],
    layout: StreamLayout,
) -> EepResult<Vec<DecodedBlock>> {
    layout.validate()?;
    if epoch_starts.len() != layout.block_count() {
        return Err(EepError::InvalidArgument(format!(
            "epoch 表有 {} 项, 而数据流共 {} 块",
            epoch_starts.len(),
            layout.block_count(),
        )));
    }

    epoch_starts
        .par_iter()
        .enumerate()
        .map(|(index, &offset)| {
            let geometry = layout.block_geometry(index)?;
            let bit_offset = byte_to_bit_offset(data, offset)?;
            decode_block_with(data, bit_offset, geometry)
        })
        .collect()
}
