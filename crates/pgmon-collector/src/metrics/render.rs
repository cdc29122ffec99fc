use crate::metrics::types::Sample;

/// Renders samples in the Prometheus text exposition format.
///
/// Samples are grouped by family in first-seen order; each family gets one
/// `# HELP` and `# TYPE` header.
pub fn render_prometheus(samples: &[Sample]) -> String {
    let mut families: Vec<(&str, Vec<&Sample>)> = Vec::new();
    for sample in samples {
        let name = sample.desc().fq_name.as_str();
        match families.iter_mut().find(|(family, _)| *family == name) {
            Some((_, members)) => members.push(sample),
            None => families.push((name, vec![sample])),
        }
    }

    let mut output = String::new();
    for (name, members) in families {
        let first = members[0];

        output.push_str("# HELP ");
        output.push_str(name);
        output.push(' ');
        output.push_str(&escape_help(&first.desc().help));
        output.push('\n');

        output.push_str("# TYPE ");
        output.push_str(name);
        output.push(' ');
        output.push_str(first.value_type().as_prometheus_type());
        output.push('\n');

        for sample in members {
            output.push_str(&render_sample_line(name, &sample.labels(), sample.value()));
        }
    }

    output
}

fn render_sample_line(name: &str, labels: &[(String, String)], value: f64) -> String {
    let mut rendered = String::new();
    rendered.push_str(name);

    if !labels.is_empty() {
        rendered.push('{');
        for (index, (key, value)) in labels.iter().enumerate() {
            if index > 0 {
                rendered.push(',');
            }
            rendered.push_str(key);
            rendered.push_str("=\"");
            rendered.push_str(&escape_label_value(value));
            rendered.push('"');
        }
        rendered.push('}');
    }

    rendered.push(' ');
    rendered.push_str(&format_metric_value(value));
    rendered.push('\n');
    rendered
}

fn format_metric_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}
