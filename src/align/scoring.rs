use crate::kmer::BaseCode;

/// Substitution matrix over `A, C, G, T` plus a linear gap penalty.
///
/// Comparisons involving a non-canonical base score the matrix minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreMatrix {
    matrix: [[i64; 4]; 4],
    gap: i64,
}

impl ScoreMatrix {
    /// Matrix from explicit rows (indexed by [`BaseCode`]) and a gap penalty.
    pub fn new(matrix: [[i64; 4]; 4], gap: i64) -> Self {
        Self { matrix, gap }
    }

    /// Same score on the whole diagonal and off-diagonal.
    pub fn uniform(match_score: i64, mismatch: i64, gap: i64) -> Self {
        let mut matrix = [[mismatch; 4]; 4];
        for (idx, row) in matrix.iter_mut().enumerate() {
            row[idx] = match_score;
        }
        Self { matrix, gap }
    }

    /// Score of aligning read base `a` against graph base `b`.
    #[inline]
    pub fn score(&self, a: u8, b: u8) -> i64 {
        match (BaseCode::from_ascii(a), BaseCode::from_ascii(b)) {
            (Some(x), Some(y)) => self.matrix[x.index()][y.index()],
            _ => self.min_entry(),
        }
    }

    /// Score of a base matched against itself.
    #[inline]
    pub fn match_score(&self, base: u8) -> i64 {
        self.score(base, base)
    }

    /// Linear gap penalty (negative).
    #[inline]
    pub fn gap(&self) -> i64 {
        self.gap
    }

    /// Largest diagonal entry.
    pub fn max_match(&self) -> i64 {
        (0..4).map(|i| self.matrix[i][i]).max().unwrap_or(0)
    }

    /// Largest off-diagonal entry.
    pub fn max_mismatch(&self) -> i64 {
        let mut best = i64::MIN;
        for (i, row) in self.matrix.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                if i != j {
                    best = best.max(value);
                }
            }
        }
        best
    }

    /// Smallest entry of the matrix.
    pub fn min_entry(&self) -> i64 {
        self.matrix
            .iter()
            .flat_map(|row| row.iter().copied())
            .min()
            .unwrap_or(0)
    }

    /// Raw rows.
    pub fn rows(&self) -> &[[i64; 4]; 4] {
        &self.matrix
    }
}

impl Default for ScoreMatrix {
    fn default() -> Self {
        Self::uniform(2, -3, -5)
    }
}
