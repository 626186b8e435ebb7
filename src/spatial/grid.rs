use macroquad::math::{ivec2, IVec2};

/// Fixed-size row-major 2D storage. Never resized after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2D<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T: Clone> Grid2D<T> {
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Grid2D {
            width,
            height,
            cells: vec![value; width * height],
        }
    }
}

impl<T: Default> Grid2D<T> {
    pub fn new(width: usize, height: usize) -> Self {
        let mut cells = Vec::with_capacity(width * height);
        cells.resize_with(width * height, T::default);
        Grid2D {
            width,
            height,
            cells,
        }
    }
}

impl<T> Grid2D<T> {
    /// Wraps a flat row-major vector; `None` unless `cells.len() == width * height`
    /// (an overflowing product never matches).
    pub fn from_vec(width: usize, height: usize, cells: Vec<T>) -> Option<Self> {
        (width.checked_mul(height) == Some(cells.len())).then_some(Grid2D {
            width,
            height,
            cells,
        })
    }

    #[inline] pub fn width(&self) -> usize { self.width }
    #[inline] pub fn height(&self) -> usize { self.height }
    #[inline] pub fn len(&self) -> usize { self.cells.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.cells.is_empty() }

    #[inline]
    pub fn contains(&self, coord: IVec2) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.width
            && (coord.y as usize) < self.height
    }

    #[inline]
    fn index_of(&self, coord: IVec2) -> Option<usize> {
        self.contains(coord)
            .then(|| coord.y as usize * self.width + coord.x as usize)
    }

    /// Coordinate of flat index `i`: `(i % width, i / width)`.
    #[inline]
    pub fn coord_of(&self, index: usize) -> IVec2 {
        ivec2((index % self.width) as i32, (index / self.width) as i32)
    }

    pub fn get(&self, coord: IVec2) -> Option<&T> {
        self.index_of(coord).map(|i| &self.cells[i])
    }

    pub fn get_mut(&mut self, coord: IVec2) -> Option<&mut T> {
        self.index_of(coord).map(move |i| &mut self.cells[i])
    }

    /// Replaces the cell and returns the old value, or hands `value` back
    /// when `coord` is out of bounds.
    pub fn set(&mut self, coord: IVec2, value: T) -> Result<T, T> {
        match self.index_of(coord) {
            Some(i) => Ok(std::mem::replace(&mut self.cells[i], value)),
            None => Err(value),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (IVec2, &T)> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, c)| (ivec2((i % width) as i32, (i / width) as i32), c))
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    /// Same shape, every cell mapped through `f`.
    pub fn map<U>(&self, mut f: impl FnMut(IVec2, &T) -> U) -> Grid2D<U> {
        Grid2D {
            width: self.width,
            height: self.height,
            cells: self.iter().map(|(c, v)| f(c, v)).collect(),
        }
    }
}
