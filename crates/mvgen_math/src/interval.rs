/// A closed range of values `[min, max]`.
///
/// Used both for mesh bounds (one interval per axis) and for the ranges
/// that viewpoint and light locations are sampled from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// Create a new interval given min and max values.
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Interval centered on zero: `[-range, range]`.
    ///
    /// Negative ranges are folded to their absolute value.
    pub fn symmetric(range: f32) -> Self {
        let r = range.abs();
        Self::new(-r, r)
    }

    /// Returns the size of the interval (max - min).
    pub fn size(&self) -> f32 {
        self.max - self.min
    }

    /// Returns true if x is within the interval [min, max] (inclusive).
    pub fn contains(&self, x: f32) -> bool {
        self.min <= x && x <= self.max
    }

    /// Map `t` in `[0, 1]` onto the interval.
    ///
    /// Feeding a uniform `t` gives a uniform sample over the interval.
    pub fn lerp(&self, t: f32) -> f32 {
        self.min + (self.max - self.min) * t
    }

    /// Grow the interval so it contains `x`.
    pub fn include(&self, x: f32) -> Interval {
        Interval::new(self.min.min(x), self.max.max(x))
    }

    /// Midpoint of the interval.
    pub fn center(&self) -> f32 {
        (self.min + self.max) * 0.5
    }

    /// An empty interval (min > max, contains nothing).
    pub const EMPTY: Interval = Interval {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_size() {
        let interval = Interval::new(2.0, 7.0);
        assert_eq!(interval.size(), 5.0);

        let negative = Interval::new(-5.0, 5.0);
        assert_eq!(negative.size(), 10.0);
    }

    #[test]
    fn test_interval_contains() {
        let interval = Interval::new(0.0, 10.0);

        // Inclusive bounds
        assert!(interval.contains(0.0));
        assert!(interval.contains(10.0));
        assert!(interval.contains(5.0));

        assert!(!interval.contains(-0.1));
        assert!(!interval.contains(10.1));
    }

    #[test]
    fn test_interval_symmetric() {
        let interval = Interval::symmetric(5.0);
        assert_eq!(interval.min, -5.0);
        assert_eq!(interval.max, 5.0);

        let folded = Interval::symmetric(-2.0);
        assert_eq!(folded, Interval::new(-2.0, 2.0));

        let zero = Interval::symmetric(0.0);
        assert_eq!(zero.size(), 0.0);
    }

    #[test]
    fn test_interval_lerp() {
        let interval = Interval::symmetric(5.0);
        assert_eq!(interval.lerp(0.0), -5.0);
        assert_eq!(interval.lerp(0.5), 0.0);
        assert_eq!(interval.lerp(1.0), 5.0);
    }

    #[test]
    fn test_interval_include_from_empty() {
        let grown = Interval::EMPTY.include(3.0).include(-1.0);
        assert_eq!(grown, Interval::new(-1.0, 3.0));
        assert_eq!(grown.center(), 1.0);
    }

    #[test]
    fn test_interval_empty() {
        let empty = Interval::EMPTY;

        // Empty interval has min > max
        assert!(empty.min > empty.max);
        assert!(!empty.contains(0.0));
    }
}
