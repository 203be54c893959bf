use std::cmp::Ordering;

use crate::seed::SeedBuffer;

/// Order chains longest first.
///
/// Ties are broken by strand, then by the first segment's node, target offset
/// and query offset. The sort is stable, so ranking twice changes nothing.
pub fn rank_chains(buffer: &mut SeedBuffer) {
    buffer.sort_chains_by(|a, a_segs, b, b_segs| {
        b.total_len
            .cmp(&a.total_len)
            .then(a.strand.cmp(&b.strand))
            .then_with(|| match (a_segs.first(), b_segs.first()) {
                (Some(x), Some(y)) => (x.node, x.target_start, x.query_start).cmp(&(
                    y.node,
                    y.target_start,
                    y.query_start,
                )),
                _ => Ordering::Equal,
            })
    });
}

/// Whether a chain of `seed_len` exact matches could still yield a score
/// above `best_so_far`.
///
/// The `read_len - seed_len` unmatched bases hold at least
/// `ceil(r / (seed_len + 1))` mismatches, otherwise a longer exact run would
/// exist. Each forced mismatch costs at least `match_bound - mismatch_bound`
/// relative to `perfect_score`.
pub fn seed_could_be_better(
    seed_len: usize,
    best_so_far: i64,
    perfect_score: i64,
    read_len: usize,
    match_bound: i64,
    mismatch_bound: i64,
) -> bool {
    let remainder = read_len.saturating_sub(seed_len) as i64;
    let forced = (remainder + seed_len as i64) / (seed_len as i64 + 1);
    let bound = perfect_score - forced * (match_bound - mismatch_bound);
    bound > best_so_far
}
