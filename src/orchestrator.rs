use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::Configuration;
use crate::error::HistoError;
use crate::format::{ListEntry, RenderedOutput};
use crate::header::HistogramHeader;
use crate::histogram::Histogram;
use crate::histogram1d::Histogram1D;
use crate::histogram2d::Histogram2D;
use crate::polygon::Polygon;
use crate::reader::DrrHisReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAxis {
    X,
    Y,
}

/// The mode dispatch the REDESIGN FLAGS ask for: resolved once from
/// `Configuration`, instead of a `dynamic_cast` chain inside one monolithic
/// `process()`.
#[derive(Debug, Clone)]
pub enum Mode {
    List { with_emptiness: bool },
    Info { id: i64 },
    OneD { id: i64 },
    TwoDSingleGate {
        id: i64,
        axis: GateAxis,
        range: (i64, i64),
    },
    TwoDPolygonGate {
        id: i64,
        axis: GateAxis,
        polygon_path: PathBuf,
        polygon_id: Option<i64>,
    },
    TwoDCrop {
        id: i64,
        gate_x: (i64, i64),
        gate_y: (i64, i64),
    },
    TwoDNoGate { id: i64 },
}

pub fn resolve_mode(config: &Configuration, reader: &DrrHisReader) -> Result<Mode, HistoError> {
    if config.list || config.list_empty {
        return Ok(Mode::List {
            with_emptiness: config.list_empty,
        });
    }

    let id = config.id.ok_or_else(|| {
        HistoError::BadConfig("--id is required unless --list/--list-empty is set".to_string())
    })?;

    if config.info {
        return Ok(Mode::Info { id });
    }

    let header = reader.header_of(id)?;
    if header.dim == 1 {
        return Ok(Mode::OneD { id });
    }

    let has_gate_x = config.gate_x.is_some();
    let has_gate_y = config.gate_y.is_some();

    if let Some((path, polygon_id)) = &config.polygon {
        if has_gate_x || has_gate_y {
            let axis = if has_gate_x { GateAxis::X } else { GateAxis::Y };
            return Ok(Mode::TwoDPolygonGate {
                id,
                axis,
                polygon_path: path.clone(),
                polygon_id: *polygon_id,
            });
        }
    }

    if let (Some(gate_x), Some(gate_y)) = (config.gate_x, config.gate_y) {
        return Ok(Mode::TwoDCrop { id, gate_x, gate_y });
    }
    if let Some(range) = config.gate_x {
        return Ok(Mode::TwoDSingleGate {
            id,
            axis: GateAxis::X,
            range,
        });
    }
    if let Some(range) = config.gate_y {
        return Ok(Mode::TwoDSingleGate {
            id,
            axis: GateAxis::Y,
            range,
        });
    }
    Ok(Mode::TwoDNoGate { id })
}

pub fn run(config: &Configuration, reader: &DrrHisReader) -> Result<RenderedOutput, HistoError> {
    let started = Instant::now();
    let mode = resolve_mode(config, reader)?;
    if config.verbose {
        eprintln!("mode resolved: {mode:?}");
    }

    let output = match &mode {
        Mode::List { with_emptiness } => run_list(reader, *with_emptiness),
        Mode::Info { id } => run_info(reader, *id),
        Mode::OneD { id } => run_1d(config, reader, *id),
        Mode::TwoDSingleGate { id, axis, range } => {
            run_2d_single_gate(config, reader, *id, *axis, *range)
        }
        Mode::TwoDPolygonGate {
            id,
            axis,
            polygon_path,
            polygon_id,
        } => run_2d_polygon_gate(config, reader, *id, *axis, polygon_path, *polygon_id),
        Mode::TwoDCrop { id, gate_x, gate_y } => run_2d_crop(config, reader, *id, *gate_x, *gate_y),
        Mode::TwoDNoGate { id } => run_2d_no_gate(config, reader, *id),
    }?;

    if config.verbose {
        eprintln!("done in {:.3}ms", started.elapsed().as_secs_f64() * 1e3);
    }
    Ok(output)
}

fn load_1d(reader: &DrrHisReader, id: i64) -> Result<Histogram1D, HistoError> {
    let header = reader.header_of(id)?;
    if header.dim != 1 {
        return Err(HistoError::UnsupportedDim(header.dim));
    }
    let x_min = f64::from(header.min_ch[0]);
    let x_max = f64::from(header.max_ch[0] + 1);
    let n_bin_x = header.scaled[0] as usize;

    let mut h = Histogram1D::new(x_min, x_max, n_bin_x, Some(id))?.with_label(label_of(header));
    let bins = reader.read_bins(id)?;
    h.set_data_raw(&bins)?;
    Ok(h)
}

fn load_2d(reader: &DrrHisReader, id: i64) -> Result<Histogram2D, HistoError> {
    let header = reader.header_of(id)?;
    if header.dim != 2 {
        return Err(HistoError::UnsupportedDim(header.dim));
    }
    let x_min = f64::from(header.min_ch[0]);
    let x_max = f64::from(header.max_ch[0] + 1);
    let y_min = f64::from(header.min_ch[1]);
    let y_max = f64::from(header.max_ch[1] + 1);
    let n_bin_x = header.scaled[0] as usize;
    let n_bin_y = header.scaled[1] as usize;

    let mut h = Histogram2D::new(x_min, x_max, y_min, y_max, n_bin_x, n_bin_y, Some(id))?
        .with_label(label_of(header));
    let bins = reader.read_bins(id)?;
    h.set_data_raw(&bins)?;
    Ok(h)
}

/// Loads a catalog entry without committing to a dimensionality up front —
/// used where the pipeline only needs the dimension-agnostic `HistogramOps`
/// surface (e.g. the emptiness check in `--list-empty`).
fn load_any(reader: &DrrHisReader, id: i64) -> Result<Histogram, HistoError> {
    let header = reader.header_of(id)?;
    match header.dim {
        1 => Ok(Histogram::Dim1(load_1d(reader, id)?)),
        2 => Ok(Histogram::Dim2(load_2d(reader, id)?)),
        other => Err(HistoError::UnsupportedDim(other)),
    }
}

fn label_of(header: &HistogramHeader) -> String {
    if header.title.is_empty() {
        header.xlabel.clone()
    } else {
        header.title.clone()
    }
}

fn run_list(reader: &DrrHisReader, with_emptiness: bool) -> Result<RenderedOutput, HistoError> {
    let mut entries = Vec::new();
    for id in reader.list_ids() {
        let header = reader.header_of(id)?;
        let empty = if with_emptiness {
            Some(load_any(reader, id)?.is_empty())
        } else {
            None
        };
        entries.push(ListEntry {
            id,
            dim: header.dim,
            empty,
        });
    }
    Ok(RenderedOutput::List(entries))
}

fn run_info(reader: &DrrHisReader, id: i64) -> Result<RenderedOutput, HistoError> {
    let header = reader.header_of(id)?;
    let dim = header.dim as usize;
    let fields = vec![
        ("id".to_string(), header.id.to_string()),
        ("dim".to_string(), header.dim.to_string()),
        ("halfWords".to_string(), header.half_words.to_string()),
        ("params".to_string(), format!("{:?}", &header.params[..dim])),
        ("raw".to_string(), format!("{:?}", &header.raw[..dim])),
        ("scaled".to_string(), format!("{:?}", &header.scaled[..dim])),
        ("minCh".to_string(), format!("{:?}", &header.min_ch[..dim])),
        ("maxCh".to_string(), format!("{:?}", &header.max_ch[..dim])),
        ("offset".to_string(), header.offset.to_string()),
        ("xlabel".to_string(), header.xlabel.clone()),
        ("ylabel".to_string(), header.ylabel.clone()),
        (
            "calibrationConstants".to_string(),
            format!("{:?}", header.calibration_constants),
        ),
        ("title".to_string(), header.title.clone()),
    ];
    Ok(RenderedOutput::Info(fields))
}

fn bin_factors(config: &Configuration) -> Result<[u32; 2], HistoError> {
    let factors = config.bin_factors().map_err(HistoError::BadConfig)?;
    if factors[0] == 0 || factors[1] == 0 {
        return Err(HistoError::BadConfig(
            "--bin factors must be >= 1".to_string(),
        ));
    }
    Ok(factors)
}

fn every_strides(config: &Configuration) -> Result<[u32; 2], HistoError> {
    let strides = config.every_strides().map_err(HistoError::BadConfig)?;
    if strides[0] == 0 || strides[1] == 0 {
        return Err(HistoError::BadConfig(
            "--every strides must be >= 1".to_string(),
        ));
    }
    Ok(strides)
}

fn run_1d(config: &Configuration, reader: &DrrHisReader, id: i64) -> Result<RenderedOutput, HistoError> {
    let mut h = load_1d(reader, id)?;
    let bin = bin_factors(config)?;
    let every = every_strides(config)?;

    if bin[0] != 1 {
        let new_n = (h.n_bin_x() / bin[0] as usize).max(1);
        h = h.rebin(h.x_min(), h.x_max(), new_n)?;
    }

    let mut rows = Vec::new();
    let mut i = 0usize;
    while i < h.n_bin_x() {
        let n = h.get(i);
        if !(config.zero_sup && n == 0) {
            rows.push((h.get_x(i), n, (n as f64).sqrt()));
        }
        i += every[0] as usize;
    }
    Ok(RenderedOutput::Columns1D(rows))
}

fn project(h2: &Histogram2D, axis: GateAxis, lo: i64, hi: i64) -> Histogram1D {
    match axis {
        GateAxis::X => h2.gate_x(lo, hi),
        GateAxis::Y => h2.gate_y(lo, hi),
    }
}

fn run_2d_single_gate(
    config: &Configuration,
    reader: &DrrHisReader,
    id: i64,
    axis: GateAxis,
    range: (i64, i64),
) -> Result<RenderedOutput, HistoError> {
    let h2 = load_2d(reader, id)?;
    let (lo, hi) = range;

    let mut signal = project(&h2, axis, lo, hi);
    let mut error_hist = signal.clone();

    if let Some(bg) = &config.bg_range {
        if config.sbg && bg.len() < 4 {
            return Err(HistoError::BadConfig(
                "--sbg requires a 4-entry --bg range (lo,hi,lo2,hi2)".to_string(),
            ));
        }

        let bg1 = project(&h2, axis, bg[0], bg[1]);
        signal.sub_assign(&bg1)?;
        error_hist.add_assign(&bg1)?;

        if config.sbg {
            let bg2 = project(&h2, axis, bg[2], bg[3]);
            signal.sub_assign(&bg2)?;
            error_hist.add_assign(&bg2)?;
        }
    } else if config.sbg {
        return Err(HistoError::BadConfig(
            "--sbg requires --bg to be set".to_string(),
        ));
    }

    let bin = bin_factors(config)?;
    let every = every_strides(config)?;
    if bin[0] != 1 {
        let new_n = (signal.n_bin_x() / bin[0] as usize).max(1);
        signal = signal.rebin(signal.x_min(), signal.x_max(), new_n)?;
        error_hist = error_hist.rebin(error_hist.x_min(), error_hist.x_max(), new_n)?;
    }

    let rows = columns_with_poisson_floor(&signal, &error_hist, every[0], config.zero_sup);
    Ok(RenderedOutput::Columns1D(rows))
}

fn columns_with_poisson_floor(
    signal: &Histogram1D,
    error_hist: &Histogram1D,
    stride: u32,
    zero_sup: bool,
) -> Vec<(f64, i64, f64)> {
    let mut rows = Vec::new();
    let mut i = 0usize;
    while i < signal.n_bin_x() {
        let n = signal.get(i);
        if !(zero_sup && n == 0) {
            let err = error_hist.get(i).max(1);
            rows.push((signal.get_x(i), n, (err as f64).sqrt()));
        }
        i += stride as usize;
    }
    rows
}

fn run_2d_polygon_gate(
    config: &Configuration,
    reader: &DrrHisReader,
    id: i64,
    axis: GateAxis,
    polygon_path: &Path,
    polygon_id: Option<i64>,
) -> Result<RenderedOutput, HistoError> {
    let h2 = load_2d(reader, id)?;
    let polygon = Polygon::load(polygon_path, polygon_id)?;
    let (xl, yl, xh, yh) = polygon.bounding_rect();

    let (non_gate_min, non_gate_max, non_gate_n) = match axis {
        GateAxis::X => (h2.y_min(), h2.y_max(), h2.n_bin_y()),
        GateAxis::Y => (h2.x_min(), h2.x_max(), h2.n_bin_x()),
    };
    let mut signal = Histogram1D::new(non_gate_min, non_gate_max, non_gate_n, Some(id))?;

    for iy in 0..h2.n_bin_y() {
        let cy = h2.get_y(iy);
        if cy < yl || cy > yh {
            continue;
        }
        for ix in 0..h2.n_bin_x() {
            let cx = h2.get_x(ix);
            if cx < xl || cx > xh {
                continue;
            }
            if !polygon.point_in(cx, cy) {
                continue;
            }
            let idx = match axis {
                GateAxis::X => iy,
                GateAxis::Y => ix,
            };
            let count = h2.get(ix, iy);
            signal.set(idx, signal.get(idx) + count);
        }
    }

    let mut error_hist = signal.clone();
    let bin = bin_factors(config)?;
    let every = every_strides(config)?;
    if bin[0] != 1 {
        let new_n = (signal.n_bin_x() / bin[0] as usize).max(1);
        signal = signal.rebin(signal.x_min(), signal.x_max(), new_n)?;
        error_hist = error_hist.rebin(error_hist.x_min(), error_hist.x_max(), new_n)?;
    }

    let rows = columns_with_poisson_floor(&signal, &error_hist, every[0], config.zero_sup);
    Ok(RenderedOutput::Columns1D(rows))
}

fn channel_range_to_coords(h2: &Histogram2D, lo: i64, hi: i64, axis: GateAxis) -> (f64, f64) {
    let n_bin = match axis {
        GateAxis::X => h2.n_bin_x(),
        GateAxis::Y => h2.n_bin_y(),
    };
    let lo = lo.clamp(0, n_bin as i64 - 1) as usize;
    let hi = hi.clamp(0, n_bin as i64 - 1) as usize;
    let (lo, hi) = (lo.min(hi), lo.max(hi));
    match axis {
        GateAxis::X => (h2.get_x_low(lo), h2.get_x_high(hi)),
        GateAxis::Y => (h2.get_y_low(lo), h2.get_y_high(hi)),
    }
}

fn run_2d_crop(
    config: &Configuration,
    reader: &DrrHisReader,
    id: i64,
    gate_x: (i64, i64),
    gate_y: (i64, i64),
) -> Result<RenderedOutput, HistoError> {
    let h2 = load_2d(reader, id)?;
    let (glo_x, ghi_x) = gate_x;
    let (glo_y, ghi_y) = gate_y;
    let (xl, xh) = channel_range_to_coords(&h2, glo_x, ghi_x, GateAxis::X);
    let (yl, yh) = channel_range_to_coords(&h2, glo_y, ghi_y, GateAxis::Y);

    let mut cropped = h2.crop(xl, xh, yl, yh)?;

    let bin = bin_factors(config)?;
    if bin[0] != 1 || bin[1] != 1 {
        let new_nx = (cropped.n_bin_x() / bin[0] as usize).max(1);
        let new_ny = (cropped.n_bin_y() / bin[1] as usize).max(1);
        cropped = cropped.rebin(
            cropped.x_min(),
            cropped.x_max(),
            cropped.y_min(),
            cropped.y_max(),
            new_nx,
            new_ny,
        )?;
    }

    Ok(RenderedOutput::Columns2D(emit_grid(
        &cropped,
        every_strides(config)?,
        config.zero_sup,
    )))
}

fn run_2d_no_gate(config: &Configuration, reader: &DrrHisReader, id: i64) -> Result<RenderedOutput, HistoError> {
    let mut h2 = load_2d(reader, id)?;
    let bin = bin_factors(config)?;
    if bin[0] != 1 || bin[1] != 1 {
        let new_nx = (h2.n_bin_x() / bin[0] as usize).max(1);
        let new_ny = (h2.n_bin_y() / bin[1] as usize).max(1);
        h2 = h2.rebin(h2.x_min(), h2.x_max(), h2.y_min(), h2.y_max(), new_nx, new_ny)?;
    }
    Ok(RenderedOutput::Columns2D(emit_grid(
        &h2,
        every_strides(config)?,
        config.zero_sup,
    )))
}

fn emit_grid(h2: &Histogram2D, every: [u32; 2], zero_sup: bool) -> Vec<Vec<(f64, f64, i64)>> {
    let mut columns = Vec::new();
    let mut ix = 0usize;
    while ix < h2.n_bin_x() {
        let mut column = Vec::new();
        let mut iy = 0usize;
        while iy < h2.n_bin_y() {
            let n = h2.get(ix, iy);
            if !(zero_sup && n == 0) {
                column.push((h2.get_x(ix), h2.get_y(iy), n));
            }
            iy += every[1] as usize;
        }
        columns.push(column);
        ix += every[0] as usize;
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{CATALOG_HEADER_SIZE, RECORD_SIZE};
    use std::fs::File;
    use std::io::Write;

    fn write_1d_catalog(dir: &Path, counts: &[u16]) -> PathBuf {
        let base = dir.join("t");
        let mut drr = vec![0u8; CATALOG_HEADER_SIZE];
        drr[0..4].copy_from_slice(b"HHIR");
        drr[8..12].copy_from_slice(&1u32.to_le_bytes());
        let mut rec = vec![0u8; RECORD_SIZE];
        rec[0..2].copy_from_slice(&1i16.to_le_bytes());
        rec[2..4].copy_from_slice(&1u16.to_le_bytes());
        rec[4..6].copy_from_slice(&1u16.to_le_bytes());
        rec[22..24].copy_from_slice(&(counts.len() as u16).to_le_bytes());
        rec[30..32].copy_from_slice(&0i16.to_le_bytes());
        rec[38..40].copy_from_slice(&(counts.len() as i16 - 1).to_le_bytes());
        drr.extend_from_slice(&rec);
        File::create(base.with_extension("drr")).unwrap().write_all(&drr).unwrap();

        let mut his = Vec::new();
        for v in counts {
            his.extend_from_slice(&v.to_le_bytes());
        }
        File::create(base.with_extension("his")).unwrap().write_all(&his).unwrap();
        base
    }

    #[test]
    fn s1_end_to_end_1d_mode() {
        let dir = tempfile::tempdir().unwrap();
        let counts: Vec<u16> = (1..=10).collect();
        let base = write_1d_catalog(dir.path(), &counts);
        let reader = DrrHisReader::open(&base).unwrap();
        let config = Configuration {
            base: base.clone(),
            id: Some(1),
            list: false,
            list_empty: false,
            info: false,
            gate_x: None,
            gate_y: None,
            bg_range: None,
            sbg: false,
            polygon: None,
            bin: vec![1, 1],
            every: vec![1, 1],
            zero_sup: false,
            verbose: false,
        };
        let output = run(&config, &reader).unwrap();
        match output {
            RenderedOutput::Columns1D(rows) => {
                assert_eq!(rows.len(), 10);
                assert_eq!(rows[0], (0.5, 1, 1.0));
                assert_eq!(rows[9].1, 10);
            }
            other => panic!("expected Columns1D, got {other:?}"),
        }
    }

    #[test]
    fn s2_end_to_end_rebin_by_two() {
        let dir = tempfile::tempdir().unwrap();
        let counts: Vec<u16> = (1..=10).collect();
        let base = write_1d_catalog(dir.path(), &counts);
        let reader = DrrHisReader::open(&base).unwrap();
        let config = Configuration {
            base,
            id: Some(1),
            list: false,
            list_empty: false,
            info: false,
            gate_x: None,
            gate_y: None,
            bg_range: None,
            sbg: false,
            polygon: None,
            bin: vec![2, 1],
            every: vec![1, 1],
            zero_sup: false,
            verbose: false,
        };
        let output = run(&config, &reader).unwrap();
        match output {
            RenderedOutput::Columns1D(rows) => {
                let counts: Vec<i64> = rows.iter().map(|&(_, n, _)| n).collect();
                assert_eq!(counts, vec![3, 7, 11, 15, 19]);
            }
            other => panic!("expected Columns1D, got {other:?}"),
        }
    }

    #[test]
    fn s6_list_mode() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("catalog");
        let mut drr = vec![0u8; CATALOG_HEADER_SIZE];
        drr[0..4].copy_from_slice(b"HHIR");
        drr[8..12].copy_from_slice(&3u32.to_le_bytes());
        for (id, dim) in [(100i16, 1u16), (200, 2), (300, 1)] {
            let mut rec = vec![0u8; RECORD_SIZE];
            rec[0..2].copy_from_slice(&id.to_le_bytes());
            rec[2..4].copy_from_slice(&dim.to_le_bytes());
            rec[4..6].copy_from_slice(&1u16.to_le_bytes());
            rec[22..24].copy_from_slice(&1u16.to_le_bytes());
            rec[38..40].copy_from_slice(&0i16.to_le_bytes());
            if dim == 2 {
                rec[24..26].copy_from_slice(&1u16.to_le_bytes());
                rec[40..42].copy_from_slice(&0i16.to_le_bytes());
            }
            drr.extend_from_slice(&rec);
        }
        File::create(base.with_extension("drr")).unwrap().write_all(&drr).unwrap();
        File::create(base.with_extension("his"))
            .unwrap()
            .write_all(&[0u8; 32])
            .unwrap();

        let reader = DrrHisReader::open(&base).unwrap();
        let config = Configuration {
            base,
            id: None,
            list: true,
            list_empty: false,
            info: false,
            gate_x: None,
            gate_y: None,
            bg_range: None,
            sbg: false,
            polygon: None,
            bin: vec![1, 1],
            every: vec![1, 1],
            zero_sup: false,
            verbose: false,
        };
        let output = run(&config, &reader).unwrap();
        match output {
            RenderedOutput::List(entries) => {
                assert_eq!(entries.len(), 3);
                assert_eq!(entries[1].id, 200);
                assert_eq!(entries[1].dim, 2);
            }
            other => panic!("expected List, got {other:?}"),
        }
    }
}
