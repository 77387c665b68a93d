//! Exponential moving average state

/// One EMA series over closed-candle prices
///
/// `committed` only ever moves on [`EmaSeries::commit`]; [`EmaSeries::project`] computes
/// what the value would be if the given price closed now, without changing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct EmaSeries {
    k: f64,
    committed: f64,
    initialized: bool,
}

impl EmaSeries {
    pub fn new(period: usize) -> Self {
        Self {
            k: smoothing(period),
            committed: 0.0,
            initialized: false,
        }
    }

    /// EMA value if `price` were the next closed price
    pub fn project(&self, price: f64) -> f64 {
        if !self.initialized {
            return price;
        }
        price * self.k + self.committed * (1.0 - self.k)
    }

    /// Fold a closed price into the series; the first commit seeds it with `price`
    pub fn commit(&mut self, price: f64) {
        self.committed = self.project(price);
        self.initialized = true;
    }

    /// Last committed value, or 0.0 before the first commit
    pub fn committed(&self) -> f64 {
        self.committed
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Smoothing constant k = 2 / (period + 1)
pub fn smoothing(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothing_constant() {
        assert_eq!(smoothing(3), 0.5);
        assert!((smoothing(5) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(smoothing(1), 1.0);
    }

    #[test]
    fn test_unseeded_series_projects_price() {
        let ema = EmaSeries::new(5);
        assert!(!ema.is_initialized());
        assert_eq!(ema.committed(), 0.0);
        assert_eq!(ema.project(123.45), 123.45);
    }

    #[test]
    fn test_first_commit_seeds_exactly() {
        let mut ema = EmaSeries::new(10);
        ema.commit(100.0);
        assert!(ema.is_initialized());
        assert_eq!(ema.committed(), 100.0);
    }

    #[test]
    fn test_project_does_not_mutate() {
        let mut ema = EmaSeries::new(3);
        ema.commit(100.0);
        let before = ema.clone();
        assert_eq!(ema.project(110.0), 105.0); // 110*0.5 + 100*0.5
        assert_eq!(ema, before);
    }

    #[test]
    fn test_commit_sequence() {
        let mut ema = EmaSeries::new(3);
        for price in [10.0, 20.0, 30.0] {
            ema.commit(price);
        }
        // 10 -> 15 -> 22.5
        assert_eq!(ema.committed(), 22.5);
    }
}
