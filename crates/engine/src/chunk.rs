use serde::{Deserialize, Serialize};

pub const DEFAULT_SEGMENT_SECONDS: u32 = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub start: f64,
    pub duration: f64,
    pub end: f64,
    /// 1-based position in the plan.
    pub order: u32,
}

/// Splits `[0, total_duration)` into consecutive windows of at most
/// `segment_seconds`. A non-positive or non-finite duration plans nothing;
/// callers must treat an empty plan as a failure.
pub fn plan_chunks(total_duration: f64, segment_seconds: u32) -> Vec<ChunkDescriptor> {
    if !(total_duration.is_finite() && total_duration > 0.0) || segment_seconds == 0 {
        return Vec::new();
    }

    let segment = segment_seconds as f64;
    let mut chunks = Vec::new();
    let mut start = 0.0;
    let mut order = 1u32;

    while start < total_duration {
        let end = (start + segment).min(total_duration);
        chunks.push(ChunkDescriptor {
            start,
            duration: end - start,
            end,
            order,
        });
        start = end;
        order += 1;
    }

    chunks
}

/// One chunk per pre-enumerated asset. Durations are not probed in this mode,
/// so the time fields stay zero.
pub fn plan_assets(asset_count: usize) -> Vec<ChunkDescriptor> {
    (1..=asset_count as u32)
        .map(|order| ChunkDescriptor {
            start: 0.0,
            duration: 0.0,
            end: 0.0,
            order,
        })
        .collect()
}
