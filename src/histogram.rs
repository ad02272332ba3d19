use enum_dispatch::enum_dispatch;

use crate::histogram1d::Histogram1D;
use crate::histogram2d::Histogram2D;

/// Read accessors common to both histogram dimensionalities, replacing the
/// `dynamic_cast`-based base class of the original with a tagged enum.
#[enum_dispatch]
pub trait HistogramOps {
    fn id(&self) -> Option<i64>;
    fn label(&self) -> Option<&str>;
    fn sum(&self) -> i64;
    fn underflow(&self) -> i64;
    fn overflow(&self) -> i64;
    fn dim(&self) -> u16;
}

impl HistogramOps for Histogram1D {
    fn id(&self) -> Option<i64> {
        Histogram1D::id(self)
    }
    fn label(&self) -> Option<&str> {
        Histogram1D::label(self)
    }
    fn sum(&self) -> i64 {
        Histogram1D::sum(self)
    }
    fn underflow(&self) -> i64 {
        Histogram1D::underflow(self)
    }
    fn overflow(&self) -> i64 {
        Histogram1D::overflow(self)
    }
    fn dim(&self) -> u16 {
        1
    }
}

impl HistogramOps for Histogram2D {
    fn id(&self) -> Option<i64> {
        Histogram2D::id(self)
    }
    fn label(&self) -> Option<&str> {
        Histogram2D::label(self)
    }
    fn sum(&self) -> i64 {
        Histogram2D::sum(self)
    }
    fn underflow(&self) -> i64 {
        Histogram2D::underflow(self)
    }
    fn overflow(&self) -> i64 {
        Histogram2D::overflow(self)
    }
    fn dim(&self) -> u16 {
        2
    }
}

/// A histogram of either dimensionality, dispatched without `dynamic_cast`.
#[enum_dispatch(HistogramOps)]
#[derive(Debug, Clone)]
pub enum Histogram {
    Dim1(Histogram1D),
    Dim2(Histogram2D),
}

impl Histogram {
    pub fn as_1d(&self) -> Option<&Histogram1D> {
        match self {
            Histogram::Dim1(h) => Some(h),
            Histogram::Dim2(_) => None,
        }
    }

    pub fn as_2d(&self) -> Option<&Histogram2D> {
        match self {
            Histogram::Dim1(_) => None,
            Histogram::Dim2(h) => Some(h),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Histogram::Dim1(h) => h.data_raw().iter().all(|&v| v == 0),
            Histogram::Dim2(h) => h.data_raw().iter().all(|&v| v == 0),
        }
    }
}
