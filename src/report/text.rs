use crate::report::{LabelCount, SummaryData, format_f32_6};

const TOP_LABELS: usize = 15;

pub fn render_report_text(summary: &SummaryData) -> String {
    let mut out = String::new();

    out.push_str("Cell Type Annotation Report\n");
    out.push_str("===========================\n\n");

    let run = &summary.run;
    out.push_str("1. Run\n");
    out.push_str(&format!("Tool: {} {}\n", run.tool_name, run.tool_version));
    out.push_str(&format!("Query: {} ({} cells)\n", run.query, run.n_cells));
    out.push_str(&format!(
        "Method: {}, discriminating genes per node: {}, threshold: {}\n",
        run.method,
        run.n_genes,
        format_f32_6(run.threshold)
    ));
    out.push_str(&format!(
        "Library-size normalization: {}\n\n",
        if run.normalize { "CP10k" } else { "off" }
    ));

    for (idx, flat) in summary.flat.iter().enumerate() {
        out.push_str(&format!(
            "2.{} Flat calls against {}\n",
            idx + 1,
            flat.reference
        ));
        out.push_str(&format!(
            "Median top score: {}\n",
            format_f32_6(flat.score_median)
        ));
        push_labels(&mut out, &flat.labels);
        push_failures(&mut out, flat.failed_cells);
        out.push('\n');
    }

    if let Some(h) = &summary.hierarchical {
        out.push_str(&format!("3. Hierarchical calls against {}\n", h.reference));
        out.push_str(&format!(
            "Resolved to a cell type: {}\nStopped at an intermediate node: {}\nUnassigned: {}\n",
            format_f32_6(h.leaf_fraction),
            format_f32_6(h.intermediate_fraction),
            format_f32_6(h.unassigned_fraction)
        ));
        out.push_str(&format!(
            "|confidence| at stop node: median {}, p10 {}\n",
            format_f32_6(h.abs_confidence_median),
            format_f32_6(h.abs_confidence_p10)
        ));
        push_labels(&mut out, &h.labels);
        push_failures(&mut out, h.failed_cells);

        let flagged: Vec<_> = h.gene_loss.iter().filter(|l| l.flagged).collect();
        if !flagged.is_empty() {
            out.push_str("Nodes with high discriminating-gene loss:\n");
            for loss in flagged {
                out.push_str(&format!(
                    "  {}: {} of {} genes absent ({:.1}%)\n",
                    loss.node,
                    loss.missing,
                    loss.selected,
                    loss.fraction() * 100.0
                ));
            }
            out.push_str("Confidence at these nodes rests on fewer genes than configured.\n");
        }
    }

    out
}

fn push_labels(out: &mut String, labels: &[LabelCount]) {
    for entry in labels.iter().take(TOP_LABELS) {
        out.push_str(&format!(
            "  {:<32} {:>8} {}\n",
            entry.label,
            entry.count,
            format_f32_6(entry.fraction)
        ));
    }
    if labels.len() > TOP_LABELS {
        out.push_str(&format!("  ... {} more labels\n", labels.len() - TOP_LABELS));
    }
}

fn push_failures(out: &mut String, failed: usize) {
    if failed > 0 {
        out.push_str(&format!(
            "Cells not classified (too few genes shared with the reference): {failed}\n"
        ));
    }
}
