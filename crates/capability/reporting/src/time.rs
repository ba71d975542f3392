//! 设备时钟换算
//!
//! 报告条目时间以 1984-01-01 为纪元，平台时间以 1970-01-01 为纪元。

/// 两个纪元之间的毫秒差
pub const ENTRY_TIME_OFFSET_MS: i64 = 441_763_200_000;

/// 设备条目时间 → Unix 毫秒
pub fn entry_time_to_epoch_ms(entry_time_ms: i64) -> i64 {
    entry_time_ms + ENTRY_TIME_OFFSET_MS
}

/// Unix 毫秒 → 设备条目时间
pub fn epoch_ms_to_entry_time(epoch_ms: i64) -> i64 {
    epoch_ms - ENTRY_TIME_OFFSET_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_matches_fourteen_years() {
        // 1970..1984 共 14 年，含 3 个闰年
        assert_eq!(ENTRY_TIME_OFFSET_MS, (14 * 365 + 3) * 24 * 60 * 60 * 1000);
    }

    #[test]
    fn conversion_round_trips_exactly() {
        for entry in [0, 1, 1_234_567_890_123, -5] {
            assert_eq!(epoch_ms_to_entry_time(entry_time_to_epoch_ms(entry)), entry);
        }
        assert_eq!(entry_time_to_epoch_ms(0), 441_763_200_000);
    }
}
