use super::{MapDescriptor, Orientation, RenderParams};
use macroquad::math::{ivec2, vec2, IVec2, Vec2};

/// Hexagon candidate index to coordinate delta, flat-top (x staggered).
const HEX_OFFSETS_STAGGER_X: [IVec2; 4] = [
    IVec2::new(0, 0),
    IVec2::new(1, -1),
    IVec2::new(1, 0),
    IVec2::new(2, 0),
];

/// Hexagon candidate index to coordinate delta, pointy-top (y staggered).
const HEX_OFFSETS_STAGGER_Y: [IVec2; 4] = [
    IVec2::new(0, 0),
    IVec2::new(-1, 1),
    IVec2::new(0, 1),
    IVec2::new(0, 2),
];

/// Converts between tile coordinates, Tiled screen space (y down, origin at
/// the map's top-left) and render space (y up).
///
/// Every conversion is total: coordinates outside the map extrapolate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransformer {
    orientation: Orientation,
    map_width: u32,
    map_height: u32,
    tile_width: f32,
    tile_height: f32,
    params: RenderParams,
}

impl CoordinateTransformer {
    pub fn new(desc: &MapDescriptor) -> Self {
        CoordinateTransformer {
            orientation: desc.orientation,
            map_width: desc.width,
            map_height: desc.height,
            tile_width: desc.tile_width as f32,
            tile_height: desc.tile_height as f32,
            params: RenderParams::new(desc),
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    #[inline]
    fn tile_width_half(&self) -> f32 {
        self.tile_width / 2.0
    }

    #[inline]
    fn tile_height_half(&self) -> f32 {
        self.tile_height / 2.0
    }

    /// Top-left of the cell's bounding box in screen space (the top corner
    /// of the diamond for isometric maps).
    pub fn tile_to_screen(&self, coord: IVec2) -> Vec2 {
        match self.orientation {
            Orientation::Orthogonal => vec2(
                coord.x as f32 * self.tile_width,
                coord.y as f32 * self.tile_height,
            ),
            Orientation::Isometric => {
                let origin_x = self.map_height as f32 * self.tile_width_half();
                let (x, y) = (coord.x as f32, coord.y as f32);
                vec2(
                    (x - y) * self.tile_width_half() + origin_x,
                    (x + y) * self.tile_height_half(),
                )
            }
            Orientation::Hexagonal | Orientation::Staggered => {
                let p = &self.params;
                let (x, y) = (coord.x as f32, coord.y as f32);
                if p.stagger_x {
                    let mut py = y * (p.tile_height as f32 + p.side_length_y as f32);
                    if p.do_stagger_x(coord.x) {
                        py += p.row_height as f32;
                    }
                    vec2(x * p.column_width as f32, py)
                } else {
                    let mut px = x * (p.tile_width as f32 + p.side_length_x as f32);
                    if p.do_stagger_y(coord.y) {
                        px += p.column_width as f32;
                    }
                    vec2(px, y * p.row_height as f32)
                }
            }
        }
    }

    /// Fractional tile coordinates of a screen point. Hexagonal and staggered
    /// maps always snap to a whole cell.
    pub fn screen_to_tile_coords(&self, point: Vec2) -> Vec2 {
        match self.orientation {
            Orientation::Orthogonal => vec2(point.x / self.tile_width, point.y / self.tile_height),
            Orientation::Isometric => {
                let origin_x = self.map_height as f32 * self.tile_width_half();
                let tile_y = point.y / self.tile_height;
                let tile_x = (point.x - origin_x) / self.tile_width;
                vec2(tile_y + tile_x, tile_y - tile_x)
            }
            Orientation::Hexagonal => self.hexagonal_screen_to_tile(point).as_vec2(),
            Orientation::Staggered => self.staggered_screen_to_tile(point).as_vec2(),
        }
    }

    /// Cell containing a screen point.
    pub fn screen_to_tile(&self, point: Vec2) -> IVec2 {
        self.screen_to_tile_coords(point).floor().as_ivec2()
    }

    /// Render-space center of a cell. Offsets are added in screen space,
    /// then y is inverted, then the result is floored to whole pixels.
    pub fn point_for_coordinate(&self, coord: IVec2, offset_x: f32, offset_y: f32) -> Vec2 {
        let screen = self.tile_to_screen(coord);
        let center = match self.orientation {
            Orientation::Isometric => vec2(0.0, self.tile_height_half()),
            _ => vec2(self.tile_width_half(), self.tile_height_half()),
        };
        inverted_y(screen + center + vec2(offset_x, offset_y)).floor()
    }

    /// Cell under a render-space point.
    pub fn coordinate_for_point(&self, point: Vec2) -> IVec2 {
        self.screen_to_tile(inverted_y(point))
    }

    /// Object coordinates as stored by Tiled to screen space. Isometric maps
    /// store object positions in tile-height units along both axes.
    pub fn pixel_to_screen(&self, pixel: Vec2) -> Vec2 {
        match self.orientation {
            Orientation::Isometric => {
                let origin_x = self.map_height as f32 * self.tile_width_half();
                let tile_x = pixel.x / self.tile_height;
                let tile_y = pixel.y / self.tile_height;
                vec2(
                    (tile_x - tile_y) * self.tile_width_half() + origin_x,
                    (tile_x + tile_y) * self.tile_height_half(),
                )
            }
            _ => pixel,
        }
    }

    /// Render-space position of an object, not floored.
    pub fn object_render_position(&self, pixel: Vec2) -> Vec2 {
        inverted_y(self.pixel_to_screen(pixel))
    }

    /// Pixel size of the whole map.
    ///
    /// Staggered and hexagonal maps both get the extra half row (or column)
    /// when more than one column (or row) is staggered.
    pub fn size_in_points(&self) -> Vec2 {
        let (w, h) = (self.map_width as f32, self.map_height as f32);
        match self.orientation {
            Orientation::Orthogonal => vec2(w * self.tile_width, h * self.tile_height),
            Orientation::Isometric => {
                let side = w + h;
                vec2(side * self.tile_width_half(), side * self.tile_height_half())
            }
            Orientation::Hexagonal | Orientation::Staggered => {
                let p = &self.params;
                let [tile_w, tile_h, side_x, side_y, offset_x, offset_y, column_w, row_h] = [
                    p.tile_width,
                    p.tile_height,
                    p.side_length_x,
                    p.side_length_y,
                    p.side_offset_x,
                    p.side_offset_y,
                    p.column_width,
                    p.row_height,
                ]
                .map(|v| v as f32);
                if p.stagger_x {
                    let mut height = h * (tile_h + side_y);
                    if self.map_width > 1 {
                        height += row_h;
                    }
                    vec2(w * column_w + offset_x, height)
                } else {
                    let mut width = w * (tile_w + side_x);
                    if self.map_height > 1 {
                        width += column_w;
                    }
                    vec2(width, h * row_h + offset_y)
                }
            }
        }
    }

    /// Nearest-hex-center lookup on a grid of `2 * column_width` by
    /// `2 * row_height` reference cells.
    fn hexagonal_screen_to_tile(&self, point: Vec2) -> IVec2 {
        let p = &self.params;
        let (mut x, mut y) = (point.x, point.y);
        if p.stagger_x {
            x -= if p.stagger_even { p.tile_width } else { p.side_offset_x } as f32;
        } else {
            y -= if p.stagger_even { p.tile_height } else { p.side_offset_y } as f32;
        }

        let cell = vec2(p.column_width as f32 * 2.0, p.row_height as f32 * 2.0);
        let mut reference = ivec2(reference_cell(x / cell.x), reference_cell(y / cell.y));
        let rel = vec2(x, y) - reference.as_vec2() * cell;

        let even = p.stagger_even as i32;
        if p.stagger_x {
            reference.x = reference.x * 2 + even;
        } else {
            reference.y = reference.y * 2 + even;
        }

        let (column_w, row_h) = (p.column_width as f32, p.row_height as f32);
        let centers = if p.stagger_x {
            let left = (p.side_length_x / 2) as f32;
            let center_x = left + column_w;
            let center_y = (p.tile_height / 2) as f32;
            [
                vec2(left, center_y),
                vec2(center_x, center_y - row_h),
                vec2(center_x, center_y + row_h),
                vec2(center_x + column_w, center_y),
            ]
        } else {
            let top = (p.side_length_y / 2) as f32;
            let center_x = (p.tile_width / 2) as f32;
            let center_y = top + row_h;
            [
                vec2(center_x, top),
                vec2(center_x - column_w, center_y),
                vec2(center_x + column_w, center_y),
                vec2(center_x, center_y + row_h),
            ]
        };

        let offsets = if p.stagger_x {
            &HEX_OFFSETS_STAGGER_X
        } else {
            &HEX_OFFSETS_STAGGER_Y
        };
        reference + offsets[nearest_center(&centers, rel)]
    }

    /// Diamond hit test on a `tile_width` by `tile_height` reference grid:
    /// the four corners of each reference cell belong to neighbours.
    fn staggered_screen_to_tile(&self, point: Vec2) -> IVec2 {
        let p = &self.params;
        let (mut x, mut y) = (point.x, point.y);
        if p.stagger_even {
            if p.stagger_x {
                x -= p.side_offset_x as f32;
            } else {
                y -= p.side_offset_y as f32;
            }
        }

        let (tw, th) = (p.tile_width as f32, p.tile_height as f32);
        let mut reference = ivec2(reference_cell(x / tw), reference_cell(y / th));
        let rel = vec2(x - reference.x as f32 * tw, y - reference.y as f32 * th);

        let even = p.stagger_even as i32;
        if p.stagger_x {
            reference.x = reference.x * 2 + even;
        } else {
            reference.y = reference.y * 2 + even;
        }

        let delta = rel.x * (th / tw);
        let side_offset_y = p.side_offset_y as f32;

        if side_offset_y - delta > rel.y {
            top_left(p, reference)
        } else if -side_offset_y + delta > rel.y {
            top_right(p, reference)
        } else if side_offset_y + delta < rel.y {
            bottom_left(p, reference)
        } else if side_offset_y * 3.0 - delta < rel.y {
            bottom_right(p, reference)
        } else {
            reference
        }
    }
}

/// Render space has y pointing up.
#[inline]
fn inverted_y(p: Vec2) -> Vec2 {
    vec2(p.x, -p.y)
}

/// Reference cells are clamped so that doubling and neighbour steps stay
/// inside `i32`; points beyond that snap to the outermost cells.
const REFERENCE_LIMIT: f32 = (i32::MAX / 4) as f32;

#[inline]
fn reference_cell(v: f32) -> i32 {
    if v.is_nan() {
        return 0;
    }
    v.floor().clamp(-REFERENCE_LIMIT, REFERENCE_LIMIT) as i32
}

/// Index of the center closest to `rel`; ties keep the earlier index.
fn nearest_center(centers: &[Vec2; 4], rel: Vec2) -> usize {
    let mut nearest = 0;
    let mut min_dist = f32::MAX;
    for (i, center) in centers.iter().enumerate() {
        let dist = (*center - rel).length_squared();
        if dist < min_dist {
            min_dist = dist;
            nearest = i;
        }
    }
    nearest
}

fn is_shifted(p: &RenderParams, c: IVec2) -> bool {
    if p.stagger_x {
        p.do_stagger_x(c.x)
    } else {
        p.do_stagger_y(c.y)
    }
}

fn top_left(p: &RenderParams, c: IVec2) -> IVec2 {
    match (p.stagger_x, is_shifted(p, c)) {
        (false, true) => ivec2(c.x, c.y - 1),
        (false, false) => ivec2(c.x - 1, c.y - 1),
        (true, true) => ivec2(c.x - 1, c.y),
        (true, false) => ivec2(c.x - 1, c.y - 1),
    }
}

fn top_right(p: &RenderParams, c: IVec2) -> IVec2 {
    match (p.stagger_x, is_shifted(p, c)) {
        (false, true) => ivec2(c.x + 1, c.y - 1),
        (false, false) => ivec2(c.x, c.y - 1),
        (true, true) => ivec2(c.x + 1, c.y),
        (true, false) => ivec2(c.x + 1, c.y - 1),
    }
}

fn bottom_left(p: &RenderParams, c: IVec2) -> IVec2 {
    match (p.stagger_x, is_shifted(p, c)) {
        (false, true) => ivec2(c.x, c.y + 1),
        (false, false) => ivec2(c.x - 1, c.y + 1),
        (true, true) => ivec2(c.x - 1, c.y + 1),
        (true, false) => ivec2(c.x - 1, c.y),
    }
}

fn bottom_right(p: &RenderParams, c: IVec2) -> IVec2 {
    match (p.stagger_x, is_shifted(p, c)) {
        (false, true) => ivec2(c.x + 1, c.y + 1),
        (false, false) => ivec2(c.x, c.y + 1),
        (true, true) => ivec2(c.x + 1, c.y + 1),
        (true, false) => ivec2(c.x + 1, c.y),
    }
}
