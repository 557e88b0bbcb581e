//! Coarse-to-fine overlap search and compositing.
//!
//! Both inputs are reduced to a mip pyramid. The coarsest level is searched
//! exhaustively; each finer level only looks around the doubled estimate from
//! the level above. Offsets are `(dx, dy)`: where `b`'s origin lands in `a`.

use crate::host::{ComputeModule, EngineBuffer, EngineError, Imports, OverlapResult, Result};

use super::plane::{rgb_distance, BufferHeader, Plane};
use super::NativeModule;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Stop building the pyramid once both images fit this many pixels per side.
    pub coarse_limit: u32,
    /// Half-width of the refinement window at each finer level.
    pub refine_radius: i32,
    /// Overlaps below `smaller_area / min_overlap_divisor` are not considered.
    pub min_overlap_divisor: u32,
    pub max_levels: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            coarse_limit: 48,
            refine_radius: 2,
            min_overlap_divisor: 4,
            max_levels: 10,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Candidate {
    dx: i32,
    dy: i32,
    score: u32,
    area: u64,
    width: u32,
    height: u32,
}

impl Candidate {
    /// Lower score wins; equal scores prefer the larger overlap.
    fn beats(&self, other: &Option<Candidate>) -> bool {
        match other {
            None => true,
            Some(o) => self.score < o.score || (self.score == o.score && self.area > o.area),
        }
    }
}

/// Counts finished work units and forwards them as a fraction.
struct Progress {
    done: u32,
    total: u32,
}

impl Progress {
    fn step(&mut self, env: &mut dyn Imports) {
        self.done = (self.done + 1).min(self.total);
        env.report_progress(self.done as f64 / self.total as f64);
    }
}

pub(super) fn find_overlap(
    module: &mut NativeModule,
    env: &mut dyn Imports,
    a: EngineBuffer,
    b: EngineBuffer,
) -> Result<EngineBuffer> {
    let ha = checked_header(env, a)?;
    let hb = checked_header(env, b)?;

    let mark = module.alloc.mark();
    let (pyr_a, pyr_b) = build_pyramids(module, env, a, b)?;
    let levels = pyr_a.len();
    env.dump_int(levels as i32);

    let top = levels - 1;
    let (ta, tb) = (
        BufferHeader::read(env.memory(), pyr_a[top])?,
        BufferHeader::read(env.memory(), pyr_b[top])?,
    );
    let coarse_rows = ta.height + tb.height - 1;
    let mut progress = Progress {
        done: 0,
        total: coarse_rows + top as u32 + 1,
    };

    let divisor = module.search.min_overlap_divisor.max(1);
    let mut best = coarse_search(env, &ta, &tb, divisor, &mut progress)?;
    env.dump_quad_int(top as i32, best.dx, best.dy, best.score as i32);

    let radius = module.search.refine_radius.max(0);
    for level in (0..top).rev() {
        let la = BufferHeader::read(env.memory(), pyr_a[level])?;
        let lb = BufferHeader::read(env.memory(), pyr_b[level])?;
        best = refine(env, &la, &lb, divisor, (best.dx * 2, best.dy * 2), radius)?;
        env.dump_quad_int(level as i32, best.dx, best.dy, best.score as i32);
        progress.step(env);
    }

    env.dump_score(OverlapResult {
        score: best.score,
        x: best.dx,
        y: best.dy,
        width: best.width,
        height: best.height,
        a,
        b,
    });

    // Pyramid levels are dead from here on; give their memory to the composite.
    module.alloc.release(mark);
    let merged = composite(module, env, &ha, &hb, best.dx, best.dy)?;
    progress.step(env);
    Ok(merged)
}

fn checked_header(env: &dyn Imports, buffer: EngineBuffer) -> Result<BufferHeader> {
    let header = BufferHeader::read(env.memory(), buffer)?;
    if header.is_empty() {
        return Err(EngineError::EmptyImage {
            width: header.width,
            height: header.height,
        });
    }
    header.validate(env.memory())?;
    Ok(header)
}

fn build_pyramids(
    module: &mut NativeModule,
    env: &mut dyn Imports,
    a: EngineBuffer,
    b: EngineBuffer,
) -> Result<(Vec<EngineBuffer>, Vec<EngineBuffer>)> {
    let limit = module.search.coarse_limit.max(1);
    let max_levels = module.search.max_levels.max(1);
    let mut pyr_a = vec![a];
    let mut pyr_b = vec![b];

    while pyr_a.len() < max_levels {
        let (Some(&la), Some(&lb)) = (pyr_a.last(), pyr_b.last()) else {
            break;
        };
        let ha = BufferHeader::read(env.memory(), la)?;
        let hb = BufferHeader::read(env.memory(), lb)?;
        let largest = ha.width.max(ha.height).max(hb.width).max(hb.height);
        let smallest = ha.width.min(ha.height).min(hb.width).min(hb.height);
        if largest <= limit || smallest < 2 {
            break;
        }
        pyr_a.push(module.mip(env, la)?);
        pyr_b.push(module.mip(env, lb)?);
    }
    Ok((pyr_a, pyr_b))
}

fn min_overlap_area(ha: &BufferHeader, hb: &BufferHeader, divisor: u32) -> u64 {
    let smaller = (ha.width as u64 * ha.height as u64).min(hb.width as u64 * hb.height as u64);
    let reachable = ha.width.min(hb.width) as u64 * ha.height.min(hb.height) as u64;
    (smaller / divisor as u64).min(reachable).max(1)
}

/// Scores `b` placed at `(dx, dy)` over `a`. `None` when the overlap is too small.
fn score_at(pa: &Plane, pb: &Plane, dx: i32, dy: i32, min_area: u64) -> Option<Candidate> {
    let x0 = dx.max(0);
    let y0 = dy.max(0);
    let x1 = (pa.width as i32).min(dx + pb.width as i32);
    let y1 = (pa.height as i32).min(dy + pb.height as i32);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    let (w, h) = ((x1 - x0) as u32, (y1 - y0) as u32);
    let area = w as u64 * h as u64;
    if area < min_area {
        return None;
    }

    let mut total = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let pa_px = pa.at(x as usize, y as usize);
            let pb_px = pb.at((x - dx) as usize, (y - dy) as usize);
            total += rgb_distance(pa_px, pb_px) as u64;
        }
    }
    Some(Candidate {
        dx,
        dy,
        score: (total / (area * 3)) as u32,
        area,
        width: w,
        height: h,
    })
}

fn coarse_search(
    env: &mut dyn Imports,
    ha: &BufferHeader,
    hb: &BufferHeader,
    divisor: u32,
    progress: &mut Progress,
) -> Result<Candidate> {
    let min_area = min_overlap_area(ha, hb, divisor);
    let mut best: Option<Candidate> = None;

    for dy in -(hb.height as i32 - 1)..=(ha.height as i32 - 1) {
        {
            let pa = Plane::new(env.memory(), ha)?;
            let pb = Plane::new(env.memory(), hb)?;
            for dx in -(hb.width as i32 - 1)..=(ha.width as i32 - 1) {
                if let Some(c) = score_at(&pa, &pb, dx, dy, min_area) {
                    if c.beats(&best) {
                        best = Some(c);
                    }
                }
            }
        }
        progress.step(env);
    }

    // min_area never exceeds the full-overlap area, so (0, 0) always qualifies.
    match best {
        Some(c) => Ok(c),
        None => {
            let pa = Plane::new(env.memory(), ha)?;
            let pb = Plane::new(env.memory(), hb)?;
            score_at(&pa, &pb, 0, 0, 1).ok_or_else(|| {
                EngineError::MarshalMismatch("no overlapping placement between inputs".to_string())
            })
        }
    }
}

fn refine(
    env: &dyn Imports,
    ha: &BufferHeader,
    hb: &BufferHeader,
    divisor: u32,
    center: (i32, i32),
    radius: i32,
) -> Result<Candidate> {
    let pa = Plane::new(env.memory(), ha)?;
    let pb = Plane::new(env.memory(), hb)?;
    let min_area = min_overlap_area(ha, hb, divisor);

    let (lo_x, hi_x) = (-(hb.width as i32 - 1), ha.width as i32 - 1);
    let (lo_y, hi_y) = (-(hb.height as i32 - 1), ha.height as i32 - 1);
    let cx = center.0.clamp(lo_x, hi_x);
    let cy = center.1.clamp(lo_y, hi_y);

    let mut best: Option<Candidate> = None;
    for dy in (cy - radius).max(lo_y)..=(cy + radius).min(hi_y) {
        for dx in (cx - radius).max(lo_x)..=(cx + radius).min(hi_x) {
            if let Some(c) = score_at(&pa, &pb, dx, dy, min_area) {
                if c.beats(&best) {
                    best = Some(c);
                }
            }
        }
    }

    // Nothing in the window is large enough: keep the estimate as it is.
    match best {
        Some(c) => Ok(c),
        None => score_at(&pa, &pb, cx, cy, 1)
            .or_else(|| score_at(&pa, &pb, 0, 0, 1))
            .ok_or_else(|| EngineError::MarshalMismatch("no overlapping placement between inputs".to_string())),
    }
}

/// Draws `a` then `b` (offset by `(dx, dy)`) into a fresh padded buffer
/// spanning both.
fn composite(
    module: &mut NativeModule,
    env: &mut dyn Imports,
    ha: &BufferHeader,
    hb: &BufferHeader,
    dx: i32,
    dy: i32,
) -> Result<EngineBuffer> {
    let left = dx.min(0) as i64;
    let top = dy.min(0) as i64;
    let right = (ha.width as i64).max(dx as i64 + hb.width as i64);
    let bottom = (ha.height as i64).max(dy as i64 + hb.height as i64);
    let width = u32::try_from(right - left)
        .map_err(|_| EngineError::MarshalMismatch(format!("composite width {} out of range", right - left)))?;
    let height = u32::try_from(bottom - top)
        .map_err(|_| EngineError::MarshalMismatch(format!("composite height {} out of range", bottom - top)))?;

    let out = module.create_padded_buffer(env, width, height)?;
    let ho = BufferHeader::read(env.memory(), out)?;
    ho.validate(env.memory())?;

    blit(env, ha, &ho, (-left) as usize, (-top) as usize)?;
    blit(env, hb, &ho, (dx as i64 - left) as usize, (dy as i64 - top) as usize)?;
    Ok(out)
}

fn blit(env: &mut dyn Imports, src: &BufferHeader, dst: &BufferHeader, ox: usize, oy: usize) -> Result<()> {
    if ox + src.width as usize > dst.width as usize || oy + src.height as usize > dst.height as usize {
        return Err(EngineError::MarshalMismatch(format!(
            "{}x{} at ({ox}, {oy}) does not fit a {}x{} target",
            src.width, src.height, dst.width, dst.height
        )));
    }
    let words = env.memory_mut().words_mut();
    let row = src.width as usize;
    for y in 0..src.height as usize {
        let from = src.base() + y * src.pitch as usize;
        let to = dst.base() + (oy + y) * dst.pitch as usize + ox;
        if from + row > words.len() || to + row > words.len() {
            return Err(EngineError::MarshalMismatch(format!("composite row {y} runs past linear memory")));
        }
        words.copy_within(from..from + row, to);
    }
    Ok(())
}
