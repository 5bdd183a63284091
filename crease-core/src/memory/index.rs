use super::VectorStoreError;

/// A hit from [`FlatIndex::search`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub position: usize,
    pub distance: f32,
}

/// Exhaustive nearest-neighbour index over fixed-width vectors.
///
/// Vectors are stored contiguously in insertion order; position `i` is the
/// `i`-th vector added. Distances are squared Euclidean.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorStoreError> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        Ok(())
    }

    /// Append a vector and return its position.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize, VectorStoreError> {
        self.check_dimension(vector)?;
        let position = self.len();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    /// Return up to `k` nearest vectors, closest first. Equal distances are
    /// ordered by position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>, VectorStoreError> {
        self.check_dimension(query)?;
        let mut hits: Vec<IndexHit> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| IndexHit {
                position,
                distance: squared_l2(query, vector),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
