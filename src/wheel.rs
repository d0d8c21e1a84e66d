use rand::Rng;

use crate::model::Prize;

/// Whether a prize participates in selection: active, positively weighted,
/// and either unlimited or with remaining stock.
pub fn eligible(prize: &Prize) -> bool {
    prize.active && prize.weight > 0.0 && prize.stock.map_or(true, |s| s > 0)
}

/// Weighted-random selection over eligible prizes.
///
/// One uniform draw in `[0, sum)` and a single accumulation walk keep each
/// prize's probability exactly proportional to its weight. The walk follows
/// the slice order, so callers must pass prizes in a stable order. Pure apart
/// from the supplied RNG, so the spin coordinator can re-run it for its single
/// retry.
pub fn weighted_pick<'a>(prizes: &'a [Prize], rng: &mut impl Rng) -> Option<&'a Prize> {
    let pool: Vec<&Prize> = prizes.iter().filter(|p| eligible(p)).collect();
    let sum: f64 = pool.iter().map(|p| p.weight).sum();
    if pool.is_empty() || sum <= 0.0 {
        return None;
    }

    let draw = rng.gen_range(0.0..sum);
    let mut acc = 0.0;
    for prize in &pool {
        acc += prize.weight;
        if draw < acc {
            return Some(prize);
        }
    }
    // Floating-point accumulation can leave the draw just past the final
    // cumulative weight.
    pool.last().copied()
}
