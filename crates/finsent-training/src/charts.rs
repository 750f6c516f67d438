//! SVG chart generation for evaluation results.
//!
//! Writes the confusion matrix heatmap and the one-vs-rest ROC and
//! precision-recall curves as standalone SVG files.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use finsent_core::curves::ClassCurves;

/// Chart styling constants
const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 600.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 200.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MARGIN_LEFT: f64 = 80.0;

const SERIES_COLORS: [&str; 6] = [
    "#e74c3c", "#95a5a6", "#2ecc71", "#3498db", "#9b59b6", "#f39c12",
];
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";
const COLOR_DIAGONAL: &str = "#bdc3c7";

/// One line of a curve chart
#[derive(Debug, Clone)]
pub struct CurveSeries {
    pub name: String,
    /// Points in data coordinates, both axes in [0, 1]
    pub points: Vec<(f64, f64)>,
}

fn series_color(index: usize) -> &'static str {
    SERIES_COLORS[index % SERIES_COLORS.len()]
}

fn svg_header(svg: &mut String, title: &str) {
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    );
    let _ = write!(
        svg,
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        CHART_WIDTH, CHART_HEIGHT
    );
    let _ = write!(
        svg,
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{}">{}</text>"#,
        (CHART_WIDTH - MARGIN_RIGHT + MARGIN_LEFT) / 2.0,
        COLOR_TEXT,
        escape_xml(title)
    );
}

/// Generate a line chart over the unit square
pub fn generate_curve_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[CurveSeries],
    diagonal: bool,
    output_path: &Path,
) -> std::io::Result<()> {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let to_x = |v: f64| MARGIN_LEFT + v.clamp(0.0, 1.0) * plot_width;
    let to_y = |v: f64| MARGIN_TOP + plot_height - v.clamp(0.0, 1.0) * plot_height;

    let mut svg = String::new();
    svg_header(&mut svg, title);

    // Grid lines and tick labels
    for i in 0..=5 {
        let value = i as f64 / 5.0;
        let _ = write!(
            svg,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            MARGIN_LEFT,
            to_y(value),
            MARGIN_LEFT + plot_width,
            to_y(value),
            COLOR_GRID
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{:.1}</text>"#,
            MARGIN_LEFT - 10.0,
            to_y(value) + 4.0,
            COLOR_TEXT,
            value
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="12" fill="{}">{:.1}</text>"#,
            to_x(value),
            MARGIN_TOP + plot_height + 20.0,
            COLOR_TEXT,
            value
        );
    }

    // Axes
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        MARGIN_LEFT + plot_width,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    );
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    );
    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        CHART_HEIGHT - 30.0,
        COLOR_TEXT,
        escape_xml(x_label)
    );
    let _ = write!(
        svg,
        r#"<text x="20" y="{y}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}" transform="rotate(-90 20 {y})">{}</text>"#,
        COLOR_TEXT,
        escape_xml(y_label),
        y = MARGIN_TOP + plot_height / 2.0
    );

    if diagonal {
        let _ = write!(
            svg,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1.5" stroke-dasharray="6,4"/>"#,
            to_x(0.0),
            to_y(0.0),
            to_x(1.0),
            to_y(1.0),
            COLOR_DIAGONAL
        );
    }

    for (index, series_data) in series.iter().enumerate() {
        if series_data.points.is_empty() {
            continue;
        }
        let path: Vec<String> = series_data
            .points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                let command = if i == 0 { "M" } else { "L" };
                format!("{command} {:.2} {:.2}", to_x(x), to_y(y))
            })
            .collect();
        let _ = write!(
            svg,
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="2.5"/>"#,
            path.join(" "),
            series_color(index)
        );
    }

    // Legend
    let mut legend_y = MARGIN_TOP + 10.0;
    for (index, series_data) in series.iter().enumerate() {
        let _ = write!(
            svg,
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}"/>"#,
            CHART_WIDTH - MARGIN_RIGHT + 20.0,
            legend_y,
            series_color(index)
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            CHART_WIDTH - MARGIN_RIGHT + 42.0,
            legend_y + 12.0,
            COLOR_TEXT,
            escape_xml(&series_data.name)
        );
        legend_y += 25.0;
    }

    svg.push_str("</svg>");
    fs::write(output_path, svg)
}

/// Generate a confusion matrix heatmap (rows actual, columns predicted)
pub fn generate_confusion_matrix(
    title: &str,
    class_names: &[String],
    matrix: &[Vec<usize>],
    output_path: &Path,
) -> std::io::Result<()> {
    let n = class_names.len().max(1);
    let plot_size =
        (CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM).min(CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT);
    let cell = plot_size / n as f64;
    let left = MARGIN_LEFT + 40.0;
    let max_count = matrix.iter().flatten().copied().max().unwrap_or(0).max(1);

    let mut svg = String::new();
    svg_header(&mut svg, title);

    for (row, counts) in matrix.iter().enumerate() {
        for (col, &count) in counts.iter().enumerate() {
            let intensity = count as f64 / max_count as f64;
            // white to #2c7fb8
            let r = (255.0 - intensity * (255.0 - 44.0)).round() as u8;
            let g = (255.0 - intensity * (255.0 - 127.0)).round() as u8;
            let b = (255.0 - intensity * (255.0 - 184.0)).round() as u8;
            let x = left + col as f64 * cell;
            let y = MARGIN_TOP + row as f64 * cell;
            let _ = write!(
                svg,
                r##"<rect x="{x}" y="{y}" width="{cell}" height="{cell}" fill="#{r:02x}{g:02x}{b:02x}" stroke="white" stroke-width="2"/>"##
            );
            let text_color = if intensity > 0.5 { "white" } else { COLOR_TEXT };
            let _ = write!(
                svg,
                r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="16" fill="{}">{}</text>"#,
                x + cell / 2.0,
                y + cell / 2.0 + 6.0,
                text_color,
                count
            );
        }
    }

    for (i, name) in class_names.iter().enumerate() {
        let center = i as f64 * cell + cell / 2.0;
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            left - 8.0,
            MARGIN_TOP + center + 4.0,
            COLOR_TEXT,
            escape_xml(name)
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            left + center,
            MARGIN_TOP + plot_size + 20.0,
            COLOR_TEXT,
            escape_xml(name)
        );
    }

    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">Predicted</text>"#,
        left + plot_size / 2.0,
        MARGIN_TOP + plot_size + 50.0,
        COLOR_TEXT
    );
    let _ = write!(
        svg,
        r#"<text x="20" y="{y}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}" transform="rotate(-90 20 {y})">Actual</text>"#,
        COLOR_TEXT,
        y = MARGIN_TOP + plot_size / 2.0
    );

    svg.push_str("</svg>");
    fs::write(output_path, svg)
}

/// ROC chart of every class with its AUC in the legend
pub fn generate_roc_chart(curves: &[ClassCurves], output_path: &Path) -> std::io::Result<()> {
    let series: Vec<CurveSeries> = curves
        .iter()
        .map(|c| CurveSeries {
            name: format!("{} (AUC = {:.2})", c.class_name, c.roc_auc),
            points: c.roc.fpr.iter().copied().zip(c.roc.tpr.iter().copied()).collect(),
        })
        .collect();
    generate_curve_chart(
        "ROC Curve (one-vs-rest)",
        "False Positive Rate",
        "True Positive Rate",
        &series,
        true,
        output_path,
    )
}

/// Precision-recall chart of every class with its average precision
pub fn generate_pr_chart(curves: &[ClassCurves], output_path: &Path) -> std::io::Result<()> {
    let series: Vec<CurveSeries> = curves
        .iter()
        .map(|c| CurveSeries {
            name: format!("{} (AP = {:.2})", c.class_name, c.average_precision),
            points: c.pr.recall.iter().copied().zip(c.pr.precision.iter().copied()).collect(),
        })
        .collect();
    generate_curve_chart(
        "Precision-Recall Curve (one-vs-rest)",
        "Recall",
        "Precision",
        &series,
        false,
        output_path,
    )
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsent_core::curves::one_vs_rest_curves;
    use tempfile::TempDir;

    fn names() -> Vec<String> {
        vec!["negative".into(), "neutral".into(), "positive".into()]
    }

    #[test]
    fn test_confusion_matrix_chart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("confusion_matrix.svg");
        let matrix = vec![vec![5, 1, 0], vec![0, 4, 2], vec![1, 0, 7]];
        generate_confusion_matrix("Confusion Matrix", &names(), &matrix, &path).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(">7</text>"));
        assert!(svg.contains("neutral"));
    }

    #[test]
    fn test_roc_and_pr_charts() {
        let dir = TempDir::new().unwrap();
        let probabilities = vec![
            vec![0.7, 0.2, 0.1],
            vec![0.2, 0.5, 0.3],
            vec![0.1, 0.3, 0.6],
        ];
        let curves = one_vs_rest_curves(&names(), &probabilities, &[0, 1, 2]);

        let roc = dir.path().join("roc_curve.svg");
        generate_roc_chart(&curves, &roc).unwrap();
        let svg = fs::read_to_string(&roc).unwrap();
        assert!(svg.contains("AUC = 1.00"));
        assert!(svg.contains("stroke-dasharray"));

        let pr = dir.path().join("precision_recall_curve.svg");
        generate_pr_chart(&curves, &pr).unwrap();
        assert!(fs::read_to_string(&pr).unwrap().contains("AP = 1.00"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & 'c'"), "a&lt;b &amp; &apos;c&apos;");
    }
}
