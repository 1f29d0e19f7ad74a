//! Clock-time helpers shared by the scheduling views

/// "HH:MM" を 0 時からの経過分へ変換
///
/// 空文字や壊れた値は 0 として扱う。予約フォームの入力途中にも呼ばれる
/// ため、解析失敗は致命的ではない。
pub fn time_to_minutes(time: &str) -> u32 {
    let mut parts = time.split(':');
    let hours = parts.next().and_then(|h| h.trim().parse::<u32>().ok());
    let minutes = parts.next().and_then(|m| m.trim().parse::<u32>().ok());
    match (hours, minutes) {
        (Some(h), Some(m)) => h * 60 + m,
        _ => 0,
    }
}

/// 半開区間 `[start_a, end_a)` と `[start_b, end_b)` の重なり判定
///
/// 終端と始端が一致する背中合わせの予約は重ならない。
pub fn overlaps(start_a: u32, end_a: u32, start_b: u32, end_b: u32) -> bool {
    start_a < end_b && end_a > start_b
}
