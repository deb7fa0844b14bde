//! A minimal height-grid data object.
//!
//! `Heightmap` is the reference implementation of the [`Surface`] seam that
//! ships with the crate: enough to drive the batch harness end-to-end on
//! real files without pulling in a metrology library. It loads a
//! whitespace-separated ASCII grid (one scan line per row, `nan` marking a
//! non-measured point) and implements every operation as plain arithmetic
//! on the grid.
//!
//! The numbers it produces are faithful to their textbook definitions on a
//! unit-spaced grid, but instruments, units and calibrated filters stay out
//! of scope here.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;

use crate::core::error::{CapabilityError, LoadError};
use crate::core::types::CallArgs;
use crate::surface::catalog::{ParameterCatalog, ParameterSpec};
use crate::surface::{Measurement, Surface};

static CATALOG: Lazy<ParameterCatalog> = Lazy::new(|| {
    ParameterCatalog::from_specs(&[
        ParameterSpec::scalar("Sa", "arithmetic mean deviation from the mean plane"),
        ParameterSpec::scalar("Sq", "root mean square deviation from the mean plane"),
        ParameterSpec::scalar("Sz", "maximum height (peak to valley)"),
        ParameterSpec::scalar("Sp", "maximum peak height above the mean plane"),
        ParameterSpec::scalar("Sv", "maximum valley depth below the mean plane"),
        ParameterSpec::scalar("Ssk", "skewness of the height distribution"),
        ParameterSpec::scalar("Sku", "kurtosis of the height distribution"),
        ParameterSpec::scalar("Sdq", "root mean square surface gradient"),
        ParameterSpec::multi(
            "sk",
            &["Sk", "Spk", "Svk"],
            "core roughness depth with reduced peak and valley heights",
        ),
    ])
});

/// A rectangular grid of height values with unit point spacing.
///
/// Non-measured points are stored as NaN and are skipped by every
/// measurement; operations either preserve or produce them explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl Heightmap {
    /// Build a heightmap from rows of equal length.
    ///
    /// Panics if the rows are empty or ragged; file loading goes through
    /// [`Surface::load`], which reports those cases as errors instead.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        assert!(!rows.is_empty(), "heightmap needs at least one row");
        let width = rows[0].len();
        assert!(width > 0, "heightmap rows must not be empty");
        assert!(
            rows.iter().all(|r| r.len() == width),
            "heightmap rows must have equal length"
        );
        let height = rows.len();
        let data = rows.into_iter().flatten().collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Grid width in points.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in points.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major height values; NaN marks a non-measured point.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    fn parse(content: &str) -> Result<Self, String> {
        let mut rows: Vec<Vec<f64>> = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut row = Vec::new();
            for token in line.split_whitespace() {
                let value: f64 = token
                    .parse()
                    .map_err(|_| format!("line {}: '{}' is not a number", line_no + 1, token))?;
                row.push(value);
            }
            if let Some(first) = rows.first() {
                if row.len() != first.len() {
                    return Err(format!(
                        "line {}: {} values, expected {}",
                        line_no + 1,
                        row.len(),
                        first.len()
                    ));
                }
            }
            rows.push(row);
        }
        if rows.is_empty() {
            return Err("file contains no data rows".to_string());
        }
        Ok(Self::from_rows(rows))
    }

    fn at(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    fn measured(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied().filter(|v| !v.is_nan())
    }

    fn mean(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for v in self.measured() {
            sum += v;
            count += 1;
        }
        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    }

    fn median(&self) -> f64 {
        let mut values: Vec<f64> = self.measured().collect();
        if values.is_empty() {
            return f64::NAN;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        }
    }

    fn std_dev(&self) -> f64 {
        let mean = self.mean();
        let mut sum = 0.0;
        let mut count = 0usize;
        for v in self.measured() {
            sum += (v - mean).powi(2);
            count += 1;
        }
        if count == 0 {
            f64::NAN
        } else {
            (sum / count as f64).sqrt()
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    fn zero(&mut self) {
        let min = self.measured().fold(f64::INFINITY, f64::min);
        if min.is_finite() {
            for v in &mut self.data {
                *v -= min;
            }
        }
    }

    fn center(&mut self) {
        let mean = self.mean();
        if mean.is_finite() {
            for v in &mut self.data {
                *v -= mean;
            }
        }
    }

    /// Subtract the least-squares plane through all measured points.
    fn level(&mut self) {
        // Normal equations for z = a + b*x + c*y
        let (mut n, mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let (mut sz, mut sxz, mut syz) = (0.0, 0.0, 0.0);
        for y in 0..self.height {
            for x in 0..self.width {
                let z = self.at(x, y);
                if z.is_nan() {
                    continue;
                }
                let (xf, yf) = (x as f64, y as f64);
                n += 1.0;
                sx += xf;
                sy += yf;
                sxx += xf * xf;
                syy += yf * yf;
                sxy += xf * yf;
                sz += z;
                sxz += xf * z;
                syz += yf * z;
            }
        }
        let det = n * (sxx * syy - sxy * sxy) - sx * (sx * syy - sxy * sy)
            + sy * (sx * sxy - sxx * sy);
        if det.abs() < f64::EPSILON {
            // Degenerate grid (e.g. a single measured column); fall back to
            // removing the mean so the call still composes.
            self.center();
            return;
        }
        let a = (sz * (sxx * syy - sxy * sxy) - sx * (sxz * syy - sxy * syz)
            + sy * (sxz * sxy - sxx * syz))
            / det;
        let b = (n * (sxz * syy - sxy * syz) - sz * (sx * syy - sxy * sy)
            + sy * (sx * syz - sxz * sy))
            / det;
        let c = (n * (sxx * syz - sxz * sxy) - sx * (sx * syz - sxz * sy)
            + sz * (sx * sxy - sxx * sy))
            / det;
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                self.data[idx] -= a + b * x as f64 + c * y as f64;
            }
        }
    }

    /// Mark every point below the given material-ratio threshold of the
    /// height span as non-measured.
    fn threshold(&mut self, threshold: f64) {
        let min = self.measured().fold(f64::INFINITY, f64::min);
        let max = self.measured().fold(f64::NEG_INFINITY, f64::max);
        if !min.is_finite() || !max.is_finite() {
            return;
        }
        let cutoff = min + threshold * (max - min);
        for v in &mut self.data {
            if !v.is_nan() && *v < cutoff {
                *v = f64::NAN;
            }
        }
    }

    fn remove_outliers(&mut self, n: f64, use_median: bool) {
        let center = if use_median { self.median() } else { self.mean() };
        let sd = self.std_dev();
        if !center.is_finite() || !sd.is_finite() || sd == 0.0 {
            return;
        }
        for v in &mut self.data {
            if !v.is_nan() && (*v - center).abs() > n * sd {
                *v = f64::NAN;
            }
        }
    }

    fn fill_nonmeasured(&mut self, use_mean: bool) {
        if use_mean {
            let mean = self.mean();
            if !mean.is_finite() {
                return;
            }
            for v in &mut self.data {
                if v.is_nan() {
                    *v = mean;
                }
            }
            return;
        }
        // Nearest measured neighbour along each scan line: forward fill,
        // then backward fill whatever the forward pass could not reach.
        for y in 0..self.height {
            let row = &mut self.data[y * self.width..(y + 1) * self.width];
            let mut last = f64::NAN;
            for v in row.iter_mut() {
                if v.is_nan() {
                    *v = last;
                } else {
                    last = *v;
                }
            }
            let mut last = f64::NAN;
            for v in row.iter_mut().rev() {
                if v.is_nan() {
                    *v = last;
                } else {
                    last = *v;
                }
            }
        }
    }

    /// Separable box average with the given window, skipping non-measured
    /// points. Points with no measured neighbour in the window stay NaN.
    fn box_average(&self, window: usize) -> Vec<f64> {
        let half = window / 2;
        let mut horizontal = vec![f64::NAN; self.data.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                let lo = x.saturating_sub(half);
                let hi = (x + half).min(self.width - 1);
                let mut sum = 0.0;
                let mut count = 0usize;
                for xi in lo..=hi {
                    let v = self.at(xi, y);
                    if !v.is_nan() {
                        sum += v;
                        count += 1;
                    }
                }
                if count > 0 {
                    horizontal[y * self.width + x] = sum / count as f64;
                }
            }
        }
        let mut smoothed = vec![f64::NAN; self.data.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                let lo = y.saturating_sub(half);
                let hi = (y + half).min(self.height - 1);
                let mut sum = 0.0;
                let mut count = 0usize;
                for yi in lo..=hi {
                    let v = horizontal[yi * self.width + x];
                    if !v.is_nan() {
                        sum += v;
                        count += 1;
                    }
                }
                if count > 0 {
                    smoothed[y * self.width + x] = sum / count as f64;
                }
            }
        }
        smoothed
    }

    fn filter(
        &mut self,
        kind: &str,
        cutoff: f64,
        cutoff2: Option<f64>,
    ) -> Result<(), CapabilityError> {
        let invalid = |message: String| CapabilityError::InvalidArgument {
            identifier: "filter".to_string(),
            message,
        };
        if !cutoff.is_finite() || cutoff < 1.0 {
            return Err(invalid(format!(
                "cutoff must be a window of at least one point, got {cutoff}"
            )));
        }
        let window = cutoff.round() as usize;
        match kind {
            "lowpass" => {
                self.data = self.box_average(window);
            }
            "highpass" => {
                let smoothed = self.box_average(window);
                for (v, s) in self.data.iter_mut().zip(smoothed) {
                    *v -= s;
                }
            }
            "bandpass" => {
                let cutoff2 =
                    cutoff2.ok_or_else(|| invalid("bandpass requires cutoff2".to_string()))?;
                if cutoff2 <= cutoff {
                    return Err(invalid(format!(
                        "cutoff2 ({cutoff2}) must be greater than cutoff ({cutoff})"
                    )));
                }
                let narrow = self.box_average(window);
                let wide = self.box_average(cutoff2.round() as usize);
                for ((v, n), w) in self.data.iter_mut().zip(narrow).zip(wide) {
                    *v = n - w;
                }
            }
            other => {
                return Err(invalid(format!(
                    "unknown filter type '{other}' (expected lowpass, highpass or bandpass)"
                )))
            }
        }
        Ok(())
    }

    fn transpose(&mut self) {
        let mut out = vec![f64::NAN; self.data.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                out[x * self.height + y] = self.at(x, y);
            }
        }
        std::mem::swap(&mut self.width, &mut self.height);
        self.data = out;
    }

    fn rotate_quarter(&mut self) {
        // 90 degrees clockwise: transpose, then reverse each row.
        self.transpose();
        for y in 0..self.height {
            self.data[y * self.width..(y + 1) * self.width].reverse();
        }
    }

    fn rotate(&mut self, angle: f64) -> Result<(), CapabilityError> {
        let normalized = angle.rem_euclid(360.0);
        let quarters = normalized / 90.0;
        if (quarters - quarters.round()).abs() > 1e-9 {
            return Err(CapabilityError::InvalidArgument {
                identifier: "rotate".to_string(),
                message: format!("grid rotation is limited to 90 degree steps, got {angle}"),
            });
        }
        for _ in 0..(quarters.round() as usize % 4) {
            self.rotate_quarter();
        }
        Ok(())
    }

    /// Rotate in quarter turns so the lay (the direction of least height
    /// variation) runs along the requested axis.
    fn align(&mut self, axis: &str) -> Result<(), CapabilityError> {
        let along_x = self.directional_variation(true);
        let along_y = self.directional_variation(false);
        let lay_is_x = along_x <= along_y;
        let want_x = match axis {
            "x" => true,
            "y" => false,
            other => {
                return Err(CapabilityError::InvalidArgument {
                    identifier: "align".to_string(),
                    message: format!("unknown axis '{other}' (expected x or y)"),
                })
            }
        };
        if lay_is_x != want_x {
            self.rotate_quarter();
        }
        Ok(())
    }

    /// Mean absolute height difference between neighbours along one axis.
    fn directional_variation(&self, along_x: bool) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for y in 0..self.height {
            for x in 0..self.width {
                let v = self.at(x, y);
                let next = if along_x {
                    if x + 1 < self.width {
                        self.at(x + 1, y)
                    } else {
                        continue;
                    }
                } else if y + 1 < self.height {
                    self.at(x, y + 1)
                } else {
                    continue;
                };
                if !v.is_nan() && !next.is_nan() {
                    sum += (next - v).abs();
                    count += 1;
                }
            }
        }
        if count == 0 {
            f64::INFINITY
        } else {
            sum / count as f64
        }
    }

    /// Magnify by cropping the central `1/factor` region.
    fn zoom(&mut self, factor: f64) -> Result<(), CapabilityError> {
        if !factor.is_finite() || factor < 1.0 {
            return Err(CapabilityError::InvalidArgument {
                identifier: "zoom".to_string(),
                message: format!("zoom factor must be at least 1, got {factor}"),
            });
        }
        let new_width = ((self.width as f64 / factor).round() as usize).max(1);
        let new_height = ((self.height as f64 / factor).round() as usize).max(1);
        let x0 = (self.width - new_width) / 2;
        let y0 = (self.height - new_height) / 2;
        let mut out = Vec::with_capacity(new_width * new_height);
        for y in y0..y0 + new_height {
            for x in x0..x0 + new_width {
                out.push(self.at(x, y));
            }
        }
        self.width = new_width;
        self.height = new_height;
        self.data = out;
        Ok(())
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    fn deviations(&self) -> Vec<f64> {
        let mean = self.mean();
        self.measured().map(|v| v - mean).collect()
    }

    fn sa(&self) -> f64 {
        let dev = self.deviations();
        if dev.is_empty() {
            return f64::NAN;
        }
        dev.iter().map(|d| d.abs()).sum::<f64>() / dev.len() as f64
    }

    fn sq(&self) -> f64 {
        let dev = self.deviations();
        if dev.is_empty() {
            return f64::NAN;
        }
        (dev.iter().map(|d| d * d).sum::<f64>() / dev.len() as f64).sqrt()
    }

    fn sz(&self) -> f64 {
        let min = self.measured().fold(f64::INFINITY, f64::min);
        let max = self.measured().fold(f64::NEG_INFINITY, f64::max);
        if min.is_finite() && max.is_finite() {
            max - min
        } else {
            f64::NAN
        }
    }

    fn sp(&self) -> f64 {
        let max = self.measured().fold(f64::NEG_INFINITY, f64::max);
        if max.is_finite() {
            max - self.mean()
        } else {
            f64::NAN
        }
    }

    fn sv(&self) -> f64 {
        let min = self.measured().fold(f64::INFINITY, f64::min);
        if min.is_finite() {
            self.mean() - min
        } else {
            f64::NAN
        }
    }

    fn ssk(&self) -> f64 {
        let dev = self.deviations();
        let sq = self.sq();
        if dev.is_empty() || !sq.is_finite() || sq == 0.0 {
            return f64::NAN;
        }
        dev.iter().map(|d| d.powi(3)).sum::<f64>() / dev.len() as f64 / sq.powi(3)
    }

    fn sku(&self) -> f64 {
        let dev = self.deviations();
        let sq = self.sq();
        if dev.is_empty() || !sq.is_finite() || sq == 0.0 {
            return f64::NAN;
        }
        dev.iter().map(|d| d.powi(4)).sum::<f64>() / dev.len() as f64 / sq.powi(4)
    }

    fn sdq(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for y in 0..self.height {
            for x in 0..self.width {
                let v = self.at(x, y);
                if v.is_nan() {
                    continue;
                }
                if x + 1 < self.width {
                    let right = self.at(x + 1, y);
                    if !right.is_nan() {
                        sum += (right - v).powi(2);
                        count += 1;
                    }
                }
                if y + 1 < self.height {
                    let below = self.at(x, y + 1);
                    if !below.is_nan() {
                        sum += (below - v).powi(2);
                        count += 1;
                    }
                }
            }
        }
        if count == 0 {
            f64::NAN
        } else {
            (sum / count as f64).sqrt()
        }
    }

    /// Simplified Abbott-Firestone decomposition: fit the least-slope 40%
    /// secant of the material ratio curve, and split the profile into core
    /// (Sk), reduced peak (Spk) and reduced valley (Svk) contributions.
    fn sk_family(&self) -> (f64, f64, f64) {
        let mut zs: Vec<f64> = self.measured().collect();
        if zs.len() < 5 {
            return (f64::NAN, f64::NAN, f64::NAN);
        }
        zs.sort_by(|a, b| b.partial_cmp(a).unwrap());
        let n = zs.len();
        let window = ((n as f64 * 0.4).round() as usize).clamp(2, n);

        let mut best_start = 0;
        let mut best_drop = f64::INFINITY;
        for start in 0..=(n - window) {
            let drop = zs[start] - zs[start + window - 1];
            if drop < best_drop {
                best_drop = drop;
                best_start = start;
            }
        }
        let slope = -best_drop / (window - 1) as f64;
        let z_at = |index: f64| zs[best_start] + slope * (index - best_start as f64);
        let z_top = z_at(0.0);
        let z_bottom = z_at((n - 1) as f64);
        let sk = z_top - z_bottom;

        let peaks: Vec<f64> = zs.iter().copied().filter(|z| *z > z_top).collect();
        let spk = if peaks.is_empty() {
            0.0
        } else {
            peaks.iter().map(|z| z - z_top).sum::<f64>() / peaks.len() as f64
        };
        let valleys: Vec<f64> = zs.iter().copied().filter(|z| *z < z_bottom).collect();
        let svk = if valleys.is_empty() {
            0.0
        } else {
            valleys.iter().map(|z| z_bottom - z).sum::<f64>() / valleys.len() as f64
        };
        (sk, spk, svk)
    }
}

impl Surface for Heightmap {
    fn load(path: &Path) -> Result<Self, LoadError> {
        let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|message| LoadError::Malformed {
            path: path.to_path_buf(),
            message,
        })
    }

    fn apply(&mut self, identifier: &str, args: &CallArgs) -> Result<(), CapabilityError> {
        match identifier {
            "zero" => {
                self.zero();
                Ok(())
            }
            "center" => {
                self.center();
                Ok(())
            }
            "level" => {
                self.level();
                Ok(())
            }
            "threshold" => {
                let threshold = args.get_float("threshold").unwrap_or(0.5);
                self.threshold(threshold);
                Ok(())
            }
            "remove_outliers" => {
                let n = args.get_float("n").unwrap_or(3.0);
                let use_median = match args.get_str("method").unwrap_or("mean") {
                    "mean" => false,
                    "median" => true,
                    other => {
                        return Err(CapabilityError::InvalidArgument {
                            identifier: identifier.to_string(),
                            message: format!(
                                "unknown method '{other}' (expected mean or median)"
                            ),
                        })
                    }
                };
                self.remove_outliers(n, use_median);
                Ok(())
            }
            "fill_nonmeasured" => {
                let use_mean = match args.get_str("method").unwrap_or("nearest") {
                    "nearest" => false,
                    "mean" => true,
                    other => {
                        return Err(CapabilityError::InvalidArgument {
                            identifier: identifier.to_string(),
                            message: format!(
                                "unknown method '{other}' (expected nearest or mean)"
                            ),
                        })
                    }
                };
                self.fill_nonmeasured(use_mean);
                Ok(())
            }
            "filter" => {
                let kind = args
                    .str_at(0)
                    .or_else(|| args.get_str("filter_type"))
                    .ok_or_else(|| CapabilityError::InvalidArgument {
                        identifier: identifier.to_string(),
                        message: "missing filter type".to_string(),
                    })?
                    .to_string();
                let cutoff = args
                    .float_at(1)
                    .or_else(|| args.get_float("cutoff"))
                    .ok_or_else(|| CapabilityError::InvalidArgument {
                        identifier: identifier.to_string(),
                        message: "missing cutoff".to_string(),
                    })?;
                let cutoff2 = args.get_float("cutoff2");
                self.filter(&kind, cutoff, cutoff2)
            }
            "rotate" => {
                let angle = args
                    .float_at(0)
                    .or_else(|| args.get_float("angle"))
                    .ok_or_else(|| CapabilityError::InvalidArgument {
                        identifier: identifier.to_string(),
                        message: "missing angle".to_string(),
                    })?;
                self.rotate(angle)
            }
            "align" => {
                let axis = args.get_str("axis").unwrap_or("y").to_string();
                self.align(&axis)
            }
            "zoom" => {
                let factor = args
                    .float_at(0)
                    .or_else(|| args.get_float("factor"))
                    .ok_or_else(|| CapabilityError::InvalidArgument {
                        identifier: identifier.to_string(),
                        message: "missing factor".to_string(),
                    })?;
                self.zoom(factor)
            }
            other => Err(CapabilityError::Unknown {
                identifier: other.to_string(),
            }),
        }
    }

    fn measure(&self, identifier: &str, _args: &CallArgs) -> Result<Measurement, CapabilityError> {
        match identifier {
            "Sa" => Ok(Measurement::Scalar(self.sa())),
            "Sq" => Ok(Measurement::Scalar(self.sq())),
            "Sz" => Ok(Measurement::Scalar(self.sz())),
            "Sp" => Ok(Measurement::Scalar(self.sp())),
            "Sv" => Ok(Measurement::Scalar(self.sv())),
            "Ssk" => Ok(Measurement::Scalar(self.ssk())),
            "Sku" => Ok(Measurement::Scalar(self.sku())),
            "Sdq" => Ok(Measurement::Scalar(self.sdq())),
            "sk" => {
                let (sk, spk, svk) = self.sk_family();
                Ok(Measurement::Values(vec![sk, spk, svk]))
            }
            other => Err(CapabilityError::Unknown {
                identifier: other.to_string(),
            }),
        }
    }

    fn parameters() -> &'static ParameterCatalog {
        &CATALOG
    }
}
