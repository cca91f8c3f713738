use anyhow::{Context, Result};
use rand::Rng;
use rand_distr::StandardNormal;

/// Describes the dimensionality of a tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorShape {
    dims: Vec<usize>,
    elements: usize,
}

impl TensorShape {
    /// Create a tensor shape from the provided dimensions.
    pub fn new<D>(dims: D) -> Result<Self>
    where
        D: Into<Vec<usize>>,
    {
        let dims_vec = dims.into();
        anyhow::ensure!(
            !dims_vec.is_empty(),
            "tensor shape must have at least one dimension"
        );
        let mut elements = 1usize;
        for (idx, dim) in dims_vec.iter().enumerate() {
            anyhow::ensure!(
                *dim > 0,
                "dimension {idx} must be greater than zero (got {dim})"
            );
            elements = elements
                .checked_mul(*dim)
                .with_context(|| format!("tensor shape would overflow usize at dimension {idx}"))?;
        }
        Ok(Self {
            dims: dims_vec,
            elements,
        })
    }

    /// Total number of elements described by this shape.
    pub fn elements(&self) -> usize {
        self.elements
    }

    /// Returns the underlying dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

impl From<TensorShape> for Vec<usize> {
    fn from(value: TensorShape) -> Self {
        value.dims
    }
}

/// CPU tensor holding `f32` data in row-major layout (NCHW for rank-4 data).
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: TensorShape,
    data: Vec<f32>,
}

impl Tensor {
    /// Build a tensor from host data. The data length must match the shape's
    /// element count.
    pub fn from_slice<D>(dims: D, data: &[f32]) -> Result<Self>
    where
        D: Into<Vec<usize>>,
    {
        let shape = TensorShape::new(dims)?;
        anyhow::ensure!(
            data.len() == shape.elements(),
            "tensor data length ({}) does not match shape {:?} ({} elements)",
            data.len(),
            shape.dims(),
            shape.elements()
        );
        Ok(Self {
            shape,
            data: data.to_vec(),
        })
    }

    /// Build a tensor with every element set to `value`.
    pub fn filled<D>(dims: D, value: f32) -> Result<Self>
    where
        D: Into<Vec<usize>>,
    {
        let shape = TensorShape::new(dims)?;
        let data = vec![value; shape.elements()];
        Ok(Self { shape, data })
    }

    /// Build a zero-filled tensor.
    pub fn zeros<D>(dims: D) -> Result<Self>
    where
        D: Into<Vec<usize>>,
    {
        Self::filled(dims, 0.0)
    }

    /// Build a tensor of ones.
    pub fn ones<D>(dims: D) -> Result<Self>
    where
        D: Into<Vec<usize>>,
    {
        Self::filled(dims, 1.0)
    }

    /// Build a tensor with elements drawn from the standard normal
    /// distribution using the provided RNG.
    pub fn randn<D, R>(dims: D, rng: &mut R) -> Result<Self>
    where
        D: Into<Vec<usize>>,
        R: Rng + ?Sized,
    {
        let shape = TensorShape::new(dims)?;
        let data = (0..shape.elements())
            .map(|_| rng.sample(StandardNormal))
            .collect();
        Ok(Self { shape, data })
    }

    /// Tensor shape.
    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    /// Tensor dimensions.
    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    /// Flattened data buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable flattened data buffer.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}
