use crate::error::HistoError;

/// A 1D binned histogram: `n_bin_x` equal-width bins spanning `[x_min, x_max)`,
/// plus scalar underflow/overflow counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram1D {
    x_min: f64,
    x_max: f64,
    n_bin_x: usize,
    bin_width: f64,
    values: Vec<i64>,
    underflow: i64,
    overflow: i64,
    id: Option<i64>,
    label: Option<String>,
}

impl Histogram1D {
    pub fn new(x_min: f64, x_max: f64, n_bin_x: usize, id: Option<i64>) -> Result<Self, HistoError> {
        if n_bin_x < 1 {
            return Err(HistoError::BadConfig(
                "Histogram1D::new: nBinX must be >= 1".to_string(),
            ));
        }
        if !(x_max > x_min) {
            return Err(HistoError::BadConfig(
                "Histogram1D::new: xMax must be > xMin".to_string(),
            ));
        }
        Ok(Self {
            x_min,
            x_max,
            n_bin_x,
            bin_width: (x_max - x_min) / n_bin_x as f64,
            values: vec![0; n_bin_x],
            underflow: 0,
            overflow: 0,
            id,
            label: None,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    pub fn n_bin_x(&self) -> usize {
        self.n_bin_x
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn underflow(&self) -> i64 {
        self.underflow
    }

    pub fn overflow(&self) -> i64 {
        self.overflow
    }

    /// Clamps out-of-range `x` to bin `0` or `n_bin_x - 1`.
    pub fn bin_index(&self, x: f64) -> usize {
        if x < self.x_min {
            0
        } else if x >= self.x_max {
            self.n_bin_x - 1
        } else {
            (((x - self.x_min) / self.bin_width) as usize).min(self.n_bin_x - 1)
        }
    }

    pub fn add(&mut self, x: f64, n: i64) {
        if x < self.x_min {
            self.underflow += n;
        } else if x >= self.x_max {
            self.overflow += n;
        } else {
            let i = ((x - self.x_min) / self.bin_width) as usize;
            self.values[i.min(self.n_bin_x - 1)] += n;
        }
    }

    pub fn get(&self, i: usize) -> i64 {
        self.values[i]
    }

    pub fn set(&mut self, i: usize, v: i64) {
        self.values[i] = v;
    }

    pub fn get_x(&self, i: usize) -> f64 {
        (i as f64 + 0.5) * self.bin_width + self.x_min
    }

    pub fn get_x_low(&self, i: usize) -> f64 {
        i as f64 * self.bin_width + self.x_min
    }

    pub fn get_x_high(&self, i: usize) -> f64 {
        (i as f64 + 1.0) * self.bin_width + self.x_min
    }

    /// Sum of the bin array only; underflow/overflow are excluded.
    pub fn sum(&self) -> i64 {
        self.values.iter().sum()
    }

    pub fn data_raw(&self) -> &[i64] {
        &self.values
    }

    pub fn set_data_raw(&mut self, values: &[i64]) -> Result<(), HistoError> {
        if values.len() != self.n_bin_x {
            return Err(HistoError::ShapeMismatch(format!(
                "set_data_raw: expected {} values, found {}",
                self.n_bin_x,
                values.len()
            )));
        }
        self.values.copy_from_slice(values);
        Ok(())
    }

    fn check_same_shape(&self, other: &Self, op: &str) -> Result<(), HistoError> {
        if self.n_bin_x != other.n_bin_x || self.x_min != other.x_min || self.x_max != other.x_max
        {
            return Err(HistoError::ShapeMismatch(format!(
                "Histogram1D::{op}: incompatible shapes"
            )));
        }
        Ok(())
    }

    pub fn add_assign(&mut self, other: &Self) -> Result<(), HistoError> {
        self.check_same_shape(other, "add_assign")?;
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a += b;
        }
        Ok(())
    }

    pub fn sub_assign(&mut self, other: &Self) -> Result<(), HistoError> {
        self.check_same_shape(other, "sub_assign")?;
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a -= b;
        }
        Ok(())
    }

    pub fn scale(&mut self, k: i64) {
        for v in &mut self.values {
            *v *= k;
        }
    }

    /// Non-destructive `self + other`.
    pub fn added(&self, other: &Self) -> Result<Self, HistoError> {
        let mut out = self.clone();
        out.add_assign(other)?;
        Ok(out)
    }

    /// Non-destructive `self - other`.
    pub fn subtracted(&self, other: &Self) -> Result<Self, HistoError> {
        let mut out = self.clone();
        out.sub_assign(other)?;
        Ok(out)
    }

    /// Non-destructive `self * k`.
    pub fn scaled(&self, k: i64) -> Self {
        let mut out = self.clone();
        out.scale(k);
        out
    }

    /// Area-proportional rebin into `(x_min, x_max, n_bin_x)`.
    ///
    /// Total counts are not guaranteed to be preserved: accumulating
    /// fractional overlaps and rounding each new bin independently can drift
    /// the grand total by +/-1 per bin-boundary mismatch.
    pub fn rebin(&self, x_min: f64, x_max: f64, n_bin_x: usize) -> Result<Self, HistoError> {
        if n_bin_x < 1 || !(x_max > x_min) {
            return Err(HistoError::BadRebin(
                "rebin: nBinX must be >= 1 and xMax > xMin".to_string(),
            ));
        }
        let mut out = Self::new(x_min, x_max, n_bin_x, self.id)?;
        out.label = self.label.clone();

        for j in 0..n_bin_x {
            let a = out.get_x_low(j);
            let b = out.get_x_high(j);
            let mut acc = 0f64;
            for i in 0..self.n_bin_x {
                let p = self.get_x_low(i);
                let q = self.get_x_high(i);
                let overlap = (b.min(q) - a.max(p)).max(0.0);
                if overlap > 0.0 {
                    acc += self.values[i] as f64 * overlap / (q - p);
                }
            }
            out.values[j] = acc.round_ties_even() as i64;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn h_s1() -> Histogram1D {
        let mut h = Histogram1D::new(0.0, 10.0, 10, None).unwrap();
        for (i, v) in (1..=10i64).enumerate() {
            h.set(i, v);
        }
        h
    }

    #[test]
    fn bin_index_is_total_and_clamps() {
        let h = Histogram1D::new(0.0, 10.0, 10, None).unwrap();
        assert_eq!(h.bin_index(-5.0), 0);
        assert_eq!(h.bin_index(0.0), 0);
        assert_eq!(h.bin_index(9.99), 9);
        assert_eq!(h.bin_index(10.0), 9);
        assert_eq!(h.bin_index(1000.0), 9);
    }

    #[test]
    fn add_routes_under_and_overflow() {
        let mut h = Histogram1D::new(0.0, 10.0, 10, None).unwrap();
        h.add(-1.0, 3);
        h.add(15.0, 4);
        h.add(5.5, 1);
        assert_eq!(h.underflow(), 3);
        assert_eq!(h.overflow(), 4);
        assert_eq!(h.get(5), 1);
        assert_eq!(h.sum(), 1);
    }

    #[test]
    fn s1_scenario_values() {
        let h = h_s1();
        assert_eq!(h.get_x(0), 0.5);
        assert_eq!(h.get_x(9), 9.5);
        assert_eq!(h.get(0), 1);
        assert_eq!(h.get(9), 10);
    }

    #[test]
    fn s2_rebin_by_factor_two() {
        let h = h_s1();
        let r = h.rebin(0.0, 10.0, 5).unwrap();
        assert_eq!(r.data_raw(), &[3, 7, 11, 15, 19]);
        assert_eq!(r.get_x(0), 1.0);
        assert_eq!(r.get_x(4), 9.0);
    }

    #[test]
    fn rebin_conservation_on_exact_divisor() {
        let h = h_s1();
        let r = h.rebin(0.0, 10.0, 2).unwrap();
        assert_eq!(r.sum(), h.sum());
    }

    #[test]
    fn rebin_rejects_bad_shape() {
        let h = h_s1();
        assert!(h.rebin(0.0, 10.0, 0).is_err());
        assert!(h.rebin(10.0, 10.0, 5).is_err());
    }

    #[test]
    fn arithmetic_identities() {
        let h = h_s1();
        let sum = h.added(&h).unwrap().subtracted(&h).unwrap();
        assert_eq!(sum, h);
        let zero = h.scaled(0);
        assert!(zero.data_raw().iter().all(|&v| v == 0));
        assert_eq!(zero.n_bin_x(), h.n_bin_x());
    }

    #[test]
    fn arithmetic_requires_matching_shape() {
        let h = h_s1();
        let other = Histogram1D::new(0.0, 20.0, 10, None).unwrap();
        assert!(matches!(
            h.added(&other),
            Err(HistoError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn round_trip_set_get_raw() {
        let mut h = Histogram1D::new(0.0, 10.0, 10, None).unwrap();
        let v: Vec<i64> = (0..10).collect();
        h.set_data_raw(&v).unwrap();
        assert_eq!(h.data_raw(), v.as_slice());
    }

    #[test]
    fn uncertainty_matches_poisson_sqrt() {
        let h = h_s1();
        assert_relative_eq!((h.get(0) as f64).sqrt(), 1.0);
        assert_relative_eq!((h.get(9) as f64).sqrt(), 3.162_277_7, epsilon = 1e-5);
    }
}
