#![cfg(feature = "web")]
use chrono::NaiveDate;
use plotters::prelude::*;
use std::io::Cursor;

use crate::chart::{Chart, XAxis};
use crate::error::{Error, Result};

/// Output size of a rendered chart
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Width of the graph in pixels
    pub width: u32,

    /// Height of the graph in pixels
    pub height: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            width: 950,
            height: 700,
        }
    }
}

/// Renders every trace of `chart` as a line on one pair of axes
///
/// # Arguments
/// * `chart` - Traces, labels and optional fixed y range
/// * `options` - Image size
///
/// # Returns
/// * PNG image bytes
///
/// # Implementation Notes
/// * Each trace gets its own palette colour and a legend entry
/// * Date axes label ticks as `YYYY-MM-DD`
/// * An empty chart is drawn with unit ranges
pub fn render_png(chart: &Chart, options: &GraphOptions) -> Result<Vec<u8>> {
    let (w, h) = (options.width, options.height);
    let mut raw = vec![0u8; (w as usize) * (h as usize) * 3];
    draw(chart, &mut raw, (w, h)).map_err(|e| Error::Chart(e.to_string()))?;

    let img = image::RgbImage::from_raw(w, h, raw)
        .ok_or_else(|| Error::Chart("bitmap size mismatch".to_string()))?;
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .map_err(|e| Error::Chart(e.to_string()))?;
    Ok(png)
}

fn draw(
    chart: &Chart,
    buffer: &mut [u8],
    size: (u32, u32),
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::with_buffer(buffer, size).into_drawing_area();
    root.fill(&WHITE)?;

    let (min_x, max_x) = padded(chart.x_bounds().unwrap_or((0.0, 1.0)));
    let (min_y, max_y) = padded(chart.y_bounds().unwrap_or((0.0, 1.0)));

    let mut ctx = ChartBuilder::on(&root)
        .caption(&chart.title, ("sans-serif", 24).into_font().color(&RGBColor(128, 128, 128)))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(min_x..max_x, min_y..max_y)?;

    let axis = chart.x_axis;
    let format_x = move |x: &f64| match axis {
        XAxis::Date => NaiveDate::from_num_days_from_ce_opt(x.round() as i32)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        XAxis::Numeric => format!("{}", x),
    };

    ctx.configure_mesh()
        .x_desc(&chart.x_label)
        .y_desc(&chart.y_label)
        .x_labels(6)
        .x_label_formatter(&format_x)
        .draw()?;

    for (idx, trace) in chart.traces.iter().enumerate() {
        let color = Palette99::pick(idx).mix(0.8);
        ctx.draw_series(LineSeries::new(trace.points.iter().copied(), color.stroke_width(2)))?
            .label(trace.name.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], Palette99::pick(idx).stroke_width(2))
            });
    }

    if !chart.traces.is_empty() {
        ctx.configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(RGBColor(128, 128, 128))
            .position(SeriesLabelPosition::UpperLeft)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

// plotters needs a non-empty range
fn padded((lo, hi): (f64, f64)) -> (f64, f64) {
    if (hi - lo).abs() < f64::EPSILON {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo, hi)
    }
}
