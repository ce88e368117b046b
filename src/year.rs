//! Code for working with years and yearly series.
use crate::error::ConfigurationError;
use crate::scalar::Scalar;
use anyhow::{Result, ensure};
use itertools::Itertools;
use std::ops::RangeInclusive;

/// An ordered sequence of values, one per year, over a contiguous range of years.
///
/// Every per-year table in the model shares this index. Operations combining two series check
/// that they cover the same years.
#[derive(Debug, Clone, PartialEq)]
pub struct YearlySeries<T> {
    start: u32,
    values: Vec<T>,
}

impl<T: Copy> YearlySeries<T> {
    /// Create a series starting at `start` with one value per year.
    ///
    /// # Panics
    ///
    /// Panics if `values` is empty.
    pub fn new(start: u32, values: Vec<T>) -> Self {
        assert!(!values.is_empty(), "A yearly series must cover at least one year");
        Self { start, values }
    }

    /// Create a series over `years` by evaluating `f` for every year
    pub fn from_fn<F>(years: &RangeInclusive<u32>, f: F) -> Self
    where
        F: FnMut(u32) -> T,
    {
        Self::new(*years.start(), years.clone().map(f).collect())
    }

    /// Create a series holding the same value every year
    pub fn constant(years: &RangeInclusive<u32>, value: T) -> Self {
        Self::from_fn(years, |_| value)
    }

    /// Build a series from `(year, value)` pairs, which must cover `years` exactly, in order
    pub fn from_year_values<I>(years: &RangeInclusive<u32>, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, T)>,
    {
        let (found_years, values): (Vec<u32>, Vec<T>) = pairs.into_iter().unzip();
        ensure!(
            found_years.iter().copied().eq(years.clone()),
            "Years must cover {}-{} contiguously, in order and without duplicates (found: {})",
            years.start(),
            years.end(),
            found_years.iter().join(", ")
        );

        Ok(Self::new(*years.start(), values))
    }

    /// The first year of the series
    pub fn start(&self) -> u32 {
        self.start
    }

    /// The last year of the series
    pub fn end(&self) -> u32 {
        self.start + self.values.len() as u32 - 1
    }

    /// The years covered by the series
    pub fn years(&self) -> RangeInclusive<u32> {
        self.start()..=self.end()
    }

    /// The number of years covered
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false: a series covers at least one year
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The values in chronological order
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// The value for `year`, if covered
    pub fn get(&self, year: u32) -> Option<T> {
        let index = year.checked_sub(self.start)? as usize;
        self.values.get(index).copied()
    }

    /// The first value of the series
    pub fn first(&self) -> T {
        self.values[0]
    }

    /// Iterate over `(year, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (u32, T)> + '_ {
        (self.start..).zip(self.values.iter().copied())
    }

    /// Whether the series covers exactly `years`
    pub fn covers(&self, years: &RangeInclusive<u32>) -> bool {
        self.start() == *years.start() && self.end() == *years.end()
    }

    /// Check that the series covers exactly `years`
    pub fn check_covers(
        &self,
        years: &RangeInclusive<u32>,
        name: &str,
    ) -> Result<(), ConfigurationError> {
        if self.covers(years) {
            Ok(())
        } else {
            Err(ConfigurationError::MisalignedSeries {
                name: name.into(),
                start: *years.start(),
                end: *years.end(),
            })
        }
    }

    /// Apply `f` to every value
    pub fn map<U: Copy, F>(&self, f: F) -> YearlySeries<U>
    where
        F: FnMut(T) -> U,
    {
        YearlySeries::new(self.start, self.values.iter().copied().map(f).collect())
    }

    /// Apply `f` to every `(year, value)` pair
    pub fn map_with_year<U: Copy, F>(&self, mut f: F) -> YearlySeries<U>
    where
        F: FnMut(u32, T) -> U,
    {
        YearlySeries::new(self.start, self.iter().map(|(y, v)| f(y, v)).collect())
    }

    /// Combine two aligned series value by value.
    ///
    /// # Panics
    ///
    /// Panics if the series cover different years.
    pub fn zip_map<U: Copy, V: Copy, F>(&self, other: &YearlySeries<U>, mut f: F) -> YearlySeries<V>
    where
        F: FnMut(T, U) -> V,
    {
        assert!(
            self.years() == other.years(),
            "Yearly series are not aligned ({:?} vs {:?})",
            self.years(),
            other.years()
        );
        YearlySeries::new(
            self.start,
            self.values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| f(*a, *b))
                .collect(),
        )
    }
}

impl YearlySeries<f64> {
    /// Convert a real series into any scalar type
    pub fn lift<T: Scalar>(&self) -> YearlySeries<T> {
        self.map(T::from_real)
    }
}

impl<T: Scalar> YearlySeries<T> {
    /// A series of zeros over `years`
    pub fn zeros(years: &RangeInclusive<u32>) -> Self {
        Self::constant(years, T::zero())
    }

    /// Multiply every value by `factor`
    pub fn scale(&self, factor: T) -> Self {
        self.map(|value| value * factor)
    }

    /// Multiply every value by a real `factor`
    pub fn scale_real(&self, factor: f64) -> Self {
        self.scale(T::from_real(factor))
    }

    /// The real parts of the values
    pub fn real(&self) -> YearlySeries<f64> {
        self.map(|value| value.re())
    }

    /// Whether every value is finite
    pub fn all_finite(&self) -> bool {
        self.values.iter().all(|value| value.is_finite())
    }

    /// Sum several aligned series, returning zeros over `years` if there are none
    pub fn sum_over<'a, I>(years: &RangeInclusive<u32>, series: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        series
            .into_iter()
            .fold(Self::zeros(years), |total, other| &total + other)
    }
}

macro_rules! impl_series_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl<T: Scalar> std::ops::$trait for &YearlySeries<T> {
            type Output = YearlySeries<T>;

            fn $method(self, rhs: Self) -> YearlySeries<T> {
                self.zip_map(rhs, |a, b| a $op b)
            }
        }
    };
}

impl_series_op!(Add, add, +);
impl_series_op!(Sub, sub, -);
impl_series_op!(Mul, mul, *);

/// Check that `start..=end` is a valid range of model years
pub fn check_year_range(start: u32, end: u32) -> Result<RangeInclusive<u32>> {
    ensure!(
        start <= end,
        "Year range is empty: start year {start} is after end year {end}"
    );
    Ok(start..=end)
}
