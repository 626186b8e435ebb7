// tests/map_tests.rs

use approx::assert_abs_diff_eq;
use macroquad::math::{ivec2, vec2};
use macroquad_tiled_grid::spatial::gid;
use macroquad_tiled_grid::{
    AnchorCorner, FlipTransform, MapDescriptor, MapError, Stagger, StaggerAxis, StaggerIndex,
    TileFlags, TileGid, TilesetEntry, TilesetRegistry,
};

#[test]
fn orthogonal_scenario() {
    let t = MapDescriptor::orthogonal(10, 8, 32, 32).transformer();
    assert_eq!(t.tile_to_screen(ivec2(3, 2)), vec2(96.0, 64.0));
    assert_eq!(t.point_for_coordinate(ivec2(3, 2), 0.0, 0.0), vec2(112.0, -80.0));
    assert_eq!(t.coordinate_for_point(vec2(112.0, -80.0)), ivec2(3, 2));
}

#[test]
fn horizontal_flip_scenario() {
    assert_eq!(gid::decode(0x8000_0005), (5, true, false, false));
    let g = TileGid::from(0x8000_0005);
    assert_eq!(g.id, 5);
    assert_eq!(g.flags, TileFlags::new(true, false, false));
    assert_eq!(gid::encode(5, true, false, false), 0x8000_0005);
}

#[test]
fn flip_transform_reference_rows() {
    let row = |h, v, d| {
        let t = FlipTransform::for_flags(TileFlags::new(h, v, d));
        (t.rotation_degrees, t.scale_x, t.scale_y, t.anchor)
    };
    assert_eq!(row(false, false, false), (0, 1, 1, AnchorCorner::BottomLeft));
    assert_eq!(row(true, false, false), (0, -1, 1, AnchorCorner::BottomRight));
    assert_eq!(row(false, false, true), (-90, 1, -1, AnchorCorner::TopRight));
}

#[test]
fn overlapping_tileset_scenario() {
    let mut reg = TilesetRegistry::new();
    reg.register(TilesetEntry::new("a", 1, 10, 32, 32)).expect("first range");
    let err = reg.register(TilesetEntry::new("b", 5, 10, 32, 32)).unwrap_err();
    assert!(matches!(err, MapError::OverlappingTilesets { ref existing, .. } if existing == "a"));
    assert_eq!(reg.len(), 1);
}

#[test]
fn isometric_inverse_within_tolerance() {
    let t = MapDescriptor::isometric(6, 6, 64, 32).transformer();
    for y in 0..6 {
        for x in 0..6 {
            let screen = t.tile_to_screen(ivec2(x, y));
            let back = t.screen_to_tile_coords(screen);
            assert_abs_diff_eq!(back.x, x as f32, epsilon = 1e-3);
            assert_abs_diff_eq!(back.y, y as f32, epsilon = 1e-3);
        }
    }
}

#[test]
fn hexagonal_lookup_is_deterministic() {
    let stagger = Stagger {
        axis: StaggerAxis::X,
        index: StaggerIndex::Even,
    };
    let t = MapDescriptor::hexagonal(8, 8, 16, 16, 8, stagger).transformer();
    let p = vec2(37.25, -19.5);
    assert_eq!(t.coordinate_for_point(p), t.coordinate_for_point(p));
    for y in 0..8 {
        for x in 0..8 {
            let c = ivec2(x, y);
            assert_eq!(t.coordinate_for_point(t.point_for_coordinate(c, 0.0, 0.0)), c);
        }
    }
}
