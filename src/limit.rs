pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 100;

/// Non-positive limits fall back to the default, large ones are capped.
pub fn clamp(limit: i64) -> u32 {
    if limit <= 0 {
        DEFAULT_LIMIT
    } else if limit > MAX_LIMIT as i64 {
        MAX_LIMIT
    } else {
        limit as u32
    }
}

/// Query-string form: absent or unparsable behaves like zero.
pub fn parse(raw: Option<&str>) -> i64 {
    raw.and_then(|raw| raw.trim().parse::<i64>().ok()).unwrap_or(0)
}
