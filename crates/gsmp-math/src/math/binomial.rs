//! Exact binomial coefficients as rows of Pascal's triangle.
//!
//! Taylor expansion of `(a t^k + b t)^n` needs every coefficient `C(n, j)` for
//! `n` up to a few hundred, so rows are produced incrementally instead of from
//! factorials.

use num_bigint::BigInt;
use num_traits::One;

/// Iterator over successive rows of Pascal's triangle, starting at row 0.
#[derive(Debug, Clone, Default)]
pub struct BinomialRows {
    current: Vec<BigInt>,
}

impl BinomialRows {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Iterator for BinomialRows {
    type Item = Vec<BigInt>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = if self.current.is_empty() {
            vec![BigInt::one()]
        } else {
            let mut row = Vec::with_capacity(self.current.len() + 1);
            row.push(BigInt::one());
            for pair in self.current.windows(2) {
                row.push(&pair[0] + &pair[1]);
            }
            row.push(BigInt::one());
            row
        };
        self.current = next.clone();
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(n: usize) -> Vec<BigInt> {
        BinomialRows::new().nth(n).unwrap()
    }

    #[test]
    fn first_rows() {
        let rows: Vec<Vec<BigInt>> = BinomialRows::new().take(4).collect();
        let as_u64: Vec<Vec<u64>> = rows
            .iter()
            .map(|r| r.iter().map(|c| u64::try_from(c).unwrap()).collect())
            .collect();
        assert_eq!(as_u64, vec![vec![1], vec![1, 1], vec![1, 2, 1], vec![1, 3, 3, 1]]);
    }

    #[test]
    fn row_sum_is_power_of_two() {
        let row = row(100);
        let sum: BigInt = row.iter().sum();
        assert_eq!(sum, BigInt::from(2).pow(100));
        assert_eq!(row.len(), 101);
    }

    #[test]
    fn central_coefficient() {
        // C(10, 5) = 252
        assert_eq!(row(10)[5], BigInt::from(252));
    }
}
