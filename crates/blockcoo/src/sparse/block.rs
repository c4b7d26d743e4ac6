//! Block coordinates.

use smallvec::SmallVec;

/// Coordinates of one block in a block grid.
///
/// Two sparse axes is the common case, so coordinates live inline for up to
/// four axes. Ordering is lexicographic, which is the canonical order of a
/// coalesced block-COO tensor.
///
/// # Example
/// ```
/// use blockcoo::sparse::Block;
///
/// let block = Block::new(&[1, 2]);
/// assert_eq!(block.ndims(), 2);
/// assert_eq!(block[1], 2);
/// assert!(Block::new(&[0, 5]) < Block::new(&[1, 0]));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block {
    coords: SmallVec<[usize; 4]>,
}

impl Block {
    pub fn new(coords: &[usize]) -> Self {
        Self {
            coords: coords.iter().copied().collect(),
        }
    }

    #[inline]
    pub fn ndims(&self) -> usize {
        self.coords.len()
    }

    #[inline]
    pub fn coords(&self) -> &[usize] {
        &self.coords
    }

    /// Reorder coordinates: result axis `i` takes coordinate `perm[i]`.
    pub fn permute(&self, perm: &[usize]) -> Self {
        assert_eq!(
            perm.len(),
            self.ndims(),
            "permutation length must match block dimensions"
        );
        Self {
            coords: perm.iter().map(|&i| self.coords[i]).collect(),
        }
    }

    /// Whether every coordinate is below the matching grid extent.
    pub fn is_within(&self, grid: &[usize]) -> bool {
        self.ndims() == grid.len() && self.coords.iter().zip(grid).all(|(&c, &g)| c < g)
    }
}

impl std::ops::Index<usize> for Block {
    type Output = usize;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.coords[index]
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Block(")?;
        for (i, c) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

impl<const N: usize> From<[usize; N]> for Block {
    fn from(coords: [usize; N]) -> Self {
        Self::new(&coords)
    }
}

impl From<&[usize]> for Block {
    fn from(coords: &[usize]) -> Self {
        Self::new(coords)
    }
}
