use crate::error::GraphError;

/// The coordinate transform of a single axis: `output = scale * input + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisMap {
    /// Multiplicative coefficient.
    pub scale: f64,
    /// Additive coefficient.
    pub offset: f64,
}

impl AxisMap {
    /// Creates a new axis map.
    pub const fn new(scale: f64, offset: f64) -> Self {
        Self { scale, offset }
    }

    /// The identity transform, scale 1 and offset 0.
    pub const IDENTITY: Self = Self::new(1.0, 0.0);
}

/// A diagonal affine map over the spatial axes of a tensor.
///
/// Each axis is transformed independently, which is enough to describe how
/// convolutions, pooling, padding and cropping move spatial coordinates.
///
/// # Examples
///
/// ```rust
/// use cropnet_graph::{AffineMap, AxisMap};
///
/// // a stride-2 pooling followed by a 3-pixel shift
/// let pool = AffineMap::new(vec![AxisMap::new(0.5, 0.0); 2]);
/// let shift = AffineMap::translation(&[3.0, 3.0]);
///
/// let map = shift.compose(&pool).unwrap();
/// assert_eq!(map.apply(&[4.0, 8.0]), vec![5.0, 7.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AffineMap {
    coefs: Vec<AxisMap>,
}

impl AffineMap {
    /// Creates a map from per-axis coefficients.
    pub fn new(coefs: Vec<AxisMap>) -> Self {
        Self { coefs }
    }

    /// The identity map over `num_axes` axes.
    pub fn identity(num_axes: usize) -> Self {
        Self::new(vec![AxisMap::IDENTITY; num_axes])
    }

    /// A pure translation, one offset per axis.
    pub fn translation(offsets: &[f64]) -> Self {
        Self::new(offsets.iter().map(|&o| AxisMap::new(1.0, o)).collect())
    }

    /// The number of axes covered by the map.
    #[inline]
    pub fn num_axes(&self) -> usize {
        self.coefs.len()
    }

    /// The per-axis coefficients.
    #[inline]
    pub fn coefs(&self) -> &[AxisMap] {
        &self.coefs
    }

    /// Returns `self ∘ other`, the map applying `other` first and then `self`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AxisCountMismatch`] if the maps cover a different number of axes.
    pub fn compose(&self, other: &AffineMap) -> Result<AffineMap, GraphError> {
        if self.num_axes() != other.num_axes() {
            return Err(GraphError::AxisCountMismatch {
                expected: self.num_axes(),
                actual: other.num_axes(),
            });
        }
        let coefs = self
            .coefs
            .iter()
            .zip(&other.coefs)
            .map(|(f, g)| AxisMap::new(f.scale * g.scale, f.scale * g.offset + f.offset))
            .collect();
        Ok(Self::new(coefs))
    }

    /// Returns the inverse map.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::SingularMap`] naming the first axis with a zero scale.
    pub fn inv(&self) -> Result<AffineMap, GraphError> {
        let coefs = self
            .coefs
            .iter()
            .enumerate()
            .map(|(axis, c)| {
                if c.scale == 0.0 {
                    return Err(GraphError::SingularMap { axis });
                }
                Ok(AxisMap::new(1.0 / c.scale, -c.offset / c.scale))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(coefs))
    }

    /// Maps a point given in input coordinates to output coordinates.
    ///
    /// Axes beyond the length of `coords` are ignored.
    pub fn apply(&self, coords: &[f64]) -> Vec<f64> {
        coords
            .iter()
            .zip(&self.coefs)
            .map(|(&x, c)| c.scale * x + c.offset)
            .collect()
    }
}
