use std::cell::RefCell;
use std::fs;
use std::path::Path;

use crate::error::HistoError;

/// An immutable ordered vertex sequence (implicitly closed) plus a
/// lazily-computed, cached bounding box.
#[derive(Debug, Clone)]
pub struct Polygon {
    vertices: Vec<(f64, f64)>,
    bounding_rect: RefCell<Option<(f64, f64, f64, f64)>>,
}

impl PartialEq for Polygon {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices
    }
}

impl Polygon {
    pub fn from_vertices(vertices: Vec<(f64, f64)>) -> Result<Self, HistoError> {
        if vertices.len() < 3 {
            return Err(HistoError::PolygonMalformed(format!(
                "polygon needs at least 3 vertices, found {}",
                vertices.len()
            )));
        }
        Ok(Self {
            vertices,
            bounding_rect: RefCell::new(None),
        })
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    /// `(xlow, ylow, xhigh, yhigh)`, computed once and cached.
    pub fn bounding_rect(&self) -> (f64, f64, f64, f64) {
        if let Some(rect) = *self.bounding_rect.borrow() {
            return rect;
        }
        let mut xlow = f64::INFINITY;
        let mut ylow = f64::INFINITY;
        let mut xhigh = f64::NEG_INFINITY;
        let mut yhigh = f64::NEG_INFINITY;
        for &(x, y) in &self.vertices {
            xlow = xlow.min(x);
            ylow = ylow.min(y);
            xhigh = xhigh.max(x);
            yhigh = yhigh.max(y);
        }
        let rect = (xlow, ylow, xhigh, yhigh);
        *self.bounding_rect.borrow_mut() = Some(rect);
        rect
    }

    /// Crossing-number point-in-polygon test with a half-open edge
    /// convention: a point exactly on a "north" edge (the edge's far
    /// endpoint strictly above the near one, in the winding direction
    /// tested here) counts inside; on a "south" edge it counts outside.
    /// This makes adjacent, non-overlapping polygons tile the plane without
    /// double-counting or gaps along shared edges.
    pub fn point_in(&self, x: f64, y: f64) -> bool {
        let n = self.vertices.len();
        let mut inside = false;
        for i in 0..n {
            let (x0, y0) = self.vertices[i];
            let (x1, y1) = self.vertices[(i + 1) % n];

            let crosses_ray = (y0 <= y && y1 > y) || (y1 <= y && y0 > y);
            if crosses_ray {
                let t = (y - y0) / (y1 - y0);
                let x_at_y = x0 + t * (x1 - x0);
                if x < x_at_y {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Parses the multi-polygon text format: blank lines and lines starting
    /// with `#` are skipped, `id: N` starts a new tagged polygon, and bare
    /// `x y` lines are vertices of the current (or an untagged) polygon.
    pub fn load(path: &Path, id: Option<i64>) -> Result<Self, HistoError> {
        let text = fs::read_to_string(path)?;

        let mut polygons: Vec<(Option<i64>, Vec<(f64, f64)>)> = Vec::new();
        let mut current: Option<(Option<i64>, Vec<(f64, f64)>)> = None;

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(tag) = line.strip_prefix("id:") {
                if let Some(poly) = current.take() {
                    polygons.push(poly);
                }
                let tag_id: i64 = tag.trim().parse().map_err(|_| {
                    HistoError::PolygonMalformed(format!("bad id tag: {raw_line}"))
                })?;
                current = Some((Some(tag_id), Vec::new()));
                continue;
            }
            let mut fields = line.split_whitespace();
            let x: f64 = fields
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| HistoError::PolygonMalformed(format!("bad vertex: {raw_line}")))?;
            let y: f64 = fields
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| HistoError::PolygonMalformed(format!("bad vertex: {raw_line}")))?;
            current
                .get_or_insert_with(|| (None, Vec::new()))
                .1
                .push((x, y));
        }
        if let Some(poly) = current.take() {
            polygons.push(poly);
        }

        if polygons.is_empty() {
            return Err(HistoError::PolygonMalformed(format!(
                "{}: no polygons found",
                path.display()
            )));
        }

        let selected = match id {
            None if polygons.len() == 1 => polygons.into_iter().next().unwrap().1,
            None => {
                return Err(HistoError::PolygonMalformed(format!(
                    "{}: file has {} polygons, an id is required",
                    path.display(),
                    polygons.len()
                )))
            }
            Some(wanted) => polygons
                .into_iter()
                .find(|(tag, _)| *tag == Some(wanted))
                .map(|(_, verts)| verts)
                .ok_or_else(|| {
                    HistoError::PolygonMalformed(format!(
                        "{}: no polygon tagged id {wanted}",
                        path.display()
                    ))
                })?,
        };

        Self::from_vertices(selected)
    }
}
