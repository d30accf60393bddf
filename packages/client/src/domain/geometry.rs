//! Hit testing for the select tool.
//!
//! All coordinates are room-local. Rectangles hit inside their axis-aligned
//! box, ellipses inside the circle centred on the start point through the end
//! point, and lines within `tolerance` of the segment.

use tegaki_shared::canvas::{Point, Shape, ShapeCollection, ShapeKind};

/// Distance from `point` to the segment `a`-`b`.
pub fn distance_to_segment(point: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return point.distance(&a);
    }
    let t = (((point.x - a.x) * dx + (point.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    point.distance(&Point::new(a.x + t * dx, a.y + t * dy))
}

pub fn contains_point(shape: &Shape, point: Point, tolerance: f64) -> bool {
    let (start, end) = (shape.start_point, shape.end_point);
    match shape.kind {
        ShapeKind::Rectangle => {
            point.x >= start.x.min(end.x)
                && point.x <= start.x.max(end.x)
                && point.y >= start.y.min(end.y)
                && point.y <= start.y.max(end.y)
        }
        ShapeKind::Ellipse => point.distance(&start) <= start.distance(&end),
        ShapeKind::Line => distance_to_segment(point, start, end) <= tolerance,
    }
}

/// Topmost shape under `point` (last painted wins).
pub fn topmost_at(shapes: &ShapeCollection, point: Point, tolerance: f64) -> Option<&Shape> {
    shapes
        .iter_topmost()
        .find(|shape| contains_point(shape, point, tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tegaki_shared::canvas::FillColor;

    fn shape(id: &str, kind: ShapeKind, start: (f64, f64), end: (f64, f64)) -> Shape {
        Shape {
            id: id.to_string(),
            kind,
            color: FillColor::Blue,
            start_point: Point::new(start.0, start.1),
            end_point: Point::new(end.0, end.1),
            user_id: "alice".to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_rectangle_hit_with_reversed_corners() {
        // テスト項目: 始点と終点が逆向きの矩形でも内側判定できる
        // given (前提条件):
        let rect = shape("r", ShapeKind::Rectangle, (50.0, 40.0), (10.0, 10.0));

        // when (操作):
        let inside = contains_point(&rect, Point::new(20.0, 20.0), 0.0);
        let outside = contains_point(&rect, Point::new(60.0, 20.0), 0.0);

        // then (期待する結果):
        assert!(inside);
        assert!(!outside);
    }

    #[test]
    fn test_ellipse_uses_radius_from_start() {
        // テスト項目: 楕円は始点を中心、終点までの距離を半径として判定する
        // given (前提条件):
        let circle = shape("c", ShapeKind::Ellipse, (0.0, 0.0), (10.0, 0.0));

        // when (操作):
        let on_edge = contains_point(&circle, Point::new(0.0, 10.0), 0.0);
        let beyond = contains_point(&circle, Point::new(8.0, 8.0), 0.0);

        // then (期待する結果):
        assert!(on_edge);
        assert!(!beyond);
    }

    #[test]
    fn test_line_hit_within_tolerance() {
        // テスト項目: 線分は許容距離以内なら当たりになる
        // given (前提条件):
        let line = shape("l", ShapeKind::Line, (0.0, 0.0), (100.0, 0.0));

        // when (操作):
        let near = contains_point(&line, Point::new(50.0, 4.0), 5.0);
        let far = contains_point(&line, Point::new(50.0, 6.0), 5.0);
        let past_end = contains_point(&line, Point::new(104.0, 3.0), 5.0);

        // then (期待する結果):
        assert!(near);
        assert!(!far);
        assert!(past_end);
    }

    #[test]
    fn test_topmost_shape_wins() {
        // テスト項目: 重なった図形では最後に描かれた図形が選ばれる
        // given (前提条件):
        let shapes = ShapeCollection::from_shapes([
            shape("bottom", ShapeKind::Rectangle, (0.0, 0.0), (100.0, 100.0)),
            shape("top", ShapeKind::Rectangle, (10.0, 10.0), (20.0, 20.0)),
        ]);

        // when (操作):
        let hit = topmost_at(&shapes, Point::new(15.0, 15.0), 5.0);
        let miss = topmost_at(&shapes, Point::new(500.0, 500.0), 5.0);

        // then (期待する結果):
        assert_eq!(hit.map(|s| s.id.as_str()), Some("top"));
        assert!(miss.is_none());
    }
}
