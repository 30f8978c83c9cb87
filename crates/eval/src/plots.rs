use anyhow::Result;
use plotters::prelude::*;

use crate::evaluator::EvaluationReport;
use crate::stratify::Dimension;

pub fn generate_plots(report: &EvaluationReport, output_dir: &str) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;

    plot_confusion_matrix(report, &format!("{}/confusion_matrix.png", output_dir))?;
    plot_metrics(report, &format!("{}/metrics.png", output_dir))?;
    plot_sector_errors(report, &format!("{}/sector_errors.png", output_dir))?;

    Ok(())
}

fn plot_confusion_matrix(report: &EvaluationReport, path: &str) -> Result<()> {
    let root = BitMapBackend::new(path, (600, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled("Confusion Matrix", ("sans-serif", 30))?;

    let c = &report.confusion;
    // Rows are actual (has coordinate, none), columns are predicted (found, not found).
    let cells = [
        ("TP", c.tp, GREEN),
        ("FN", c.fn_, RED),
        ("FP", c.fp, RED),
        ("TN", c.tn, GREEN),
    ];
    let largest = cells.iter().map(|(_, n, _)| *n).max().unwrap_or(0).max(1);

    for (area, (name, count, color)) in root.split_evenly((2, 2)).iter().zip(cells) {
        let intensity = 0.15 + 0.6 * count as f64 / largest as f64;
        area.fill(&color.mix(intensity))?;
        area.draw_text(
            &format!("{}: {}", name, count),
            &("sans-serif", 32).into_font().color(&BLACK),
            (20, 20),
        )?;
    }

    root.present()?;
    tracing::info!(path, "saved confusion matrix");
    Ok(())
}

fn plot_metrics(report: &EvaluationReport, path: &str) -> Result<()> {
    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    // Undefined metrics are left out rather than drawn as zero.
    let defined: Vec<(&str, f64)> = report
        .metrics
        .named()
        .into_iter()
        .filter_map(|(name, metric)| metric.value().map(|v| (name, v)))
        .collect();
    let names: Vec<&str> = defined.iter().map(|(name, _)| *name).collect();

    let mut chart = ChartBuilder::on(&root)
        .caption("Extraction Metrics", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..defined.len().max(1) as f64, 0f64..1.1f64)?;

    chart
        .configure_mesh()
        .y_desc("Score")
        .x_labels(defined.len().max(1) * 2 + 1)
        .x_label_formatter(&|x| slot_label(&names, *x))
        .draw()?;

    for (i, (name, value)) in defined.iter().enumerate() {
        chart.draw_series(std::iter::once(Rectangle::new(
            [(i as f64 + 0.2, 0.0), (i as f64 + 0.8, *value)],
            BLUE.filled(),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            format!("{:.2}", value),
            (i as f64 + 0.35, value + 0.04),
            ("sans-serif", 16),
        )))?;
        tracing::debug!(metric = *name, value, "plotted metric");
    }

    root.present()?;
    tracing::info!(path, "saved metrics plot");
    Ok(())
}

fn plot_sector_errors(report: &EvaluationReport, path: &str) -> Result<()> {
    let Some(by_sector) = report.stratification(Dimension::Sector) else {
        return Ok(());
    };
    if by_sector.strata.is_empty() {
        return Ok(());
    }

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let sectors: Vec<&str> = by_sector.strata.iter().map(|s| s.value.as_str()).collect();
    let most = by_sector
        .strata
        .iter()
        .map(|s| s.counts.fp.max(s.counts.fn_))
        .max()
        .unwrap_or(0)
        .max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption("Errors by Sector", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..sectors.len() as f64, 0f64..(most as f64 * 1.2))?;

    chart
        .configure_mesh()
        .y_desc("Cases")
        .x_labels(sectors.len() * 2 + 1)
        .x_label_formatter(&|x| slot_label(&sectors, *x))
        .draw()?;

    let fp_bars = by_sector.strata.iter().enumerate().map(|(i, s)| {
        Rectangle::new([(i as f64 + 0.1, 0.0), (i as f64 + 0.5, s.counts.fp as f64)], RED.filled())
    });
    chart
        .draw_series(fp_bars)?
        .label("FP")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], RED.filled()));

    let fn_bars = by_sector.strata.iter().enumerate().map(|(i, s)| {
        Rectangle::new([(i as f64 + 0.5, 0.0), (i as f64 + 0.9, s.counts.fn_ as f64)], BLUE.filled())
    });
    chart
        .draw_series(fn_bars)?
        .label("FN")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], BLUE.filled()));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    tracing::info!(path, "saved sector error plot");
    Ok(())
}

/// Category name for tick positions at the middle of a slot, blank elsewhere.
fn slot_label(names: &[&str], x: f64) -> String {
    let slot = x.floor();
    if (x - slot - 0.5).abs() > 1e-6 || slot < 0.0 {
        return String::new();
    }
    names.get(slot as usize).map(|n| n.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_labels_only_at_centers() {
        let names = ["Accuracy", "F1"];
        assert_eq!(slot_label(&names, 0.5), "Accuracy");
        assert_eq!(slot_label(&names, 1.5), "F1");
        assert_eq!(slot_label(&names, 1.0), "");
        assert_eq!(slot_label(&names, 2.5), "");
    }
}
