// Map geometry helpers.
//
// Spot-area polygons arrive as `"x1,y1;x2,y2;..."` strings.

/// Parse a `"x,y;x,y;..."` coordinate list. Malformed pairs are dropped.
pub fn parse_polygon(encoded: &str) -> Vec<(f64, f64)> {
    encoded
        .split(';')
        .filter_map(|pair| {
            let (x, y) = pair.split_once(',')?;
            Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
        })
        .collect()
}

/// Even-odd ray cast. Points exactly on an edge may land either way.
pub fn point_in_polygon(point: (f64, f64), polygon: &[(f64, f64)]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let (px, py) = point;
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for (i, &(xi, yi)) in polygon.iter().enumerate() {
        let (xj, yj) = polygon[j];
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "0,0;100,0;100,100;0,100";

    #[test]
    fn parses_pairs() {
        assert_eq!(
            parse_polygon("1,2;-3.5,4"),
            vec![(1.0, 2.0), (-3.5, 4.0)]
        );
        assert_eq!(parse_polygon("1,2;oops;3,4").len(), 2);
        assert!(parse_polygon("").is_empty());
    }

    #[test]
    fn inside_and_outside() {
        let square = parse_polygon(SQUARE);
        assert!(point_in_polygon((50.0, 50.0), &square));
        assert!(!point_in_polygon((150.0, 50.0), &square));
        assert!(!point_in_polygon((-1.0, -1.0), &square));
    }

    #[test]
    fn concave_polygon() {
        // L shape: the notch at the top right is outside
        let l_shape = parse_polygon("0,0;100,0;100,50;50,50;50,100;0,100");
        assert!(point_in_polygon((25.0, 75.0), &l_shape));
        assert!(!point_in_polygon((75.0, 75.0), &l_shape));
    }

    #[test]
    fn degenerate_polygon_contains_nothing() {
        assert!(!point_in_polygon((0.0, 0.0), &parse_polygon("0,0;1,1")));
    }
}
