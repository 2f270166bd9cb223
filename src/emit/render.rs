//! Prometheus text exposition rendering (spec §6): turns the samples
//! collected from every registered [`crate::exporter::Exporter`] into the
//! standard `# HELP`/`# TYPE` + `metric{labels...} value` wire format,
//! attaching the fixed labels `{project_id, service_id, hostname}` that the
//! descriptor catalog intentionally leaves out.

use crate::catalog::{MetricDescriptor, SampleKind};
use crate::exporter::Exporter;
use crate::projector::Sample;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// One Exporter's collected samples, paired with the Exporter they came from
/// (for fixed labels and its `describe()` schema).
pub type Collected = (Arc<Exporter>, Vec<Sample>);

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn type_name(kind: SampleKind) -> &'static str {
    match kind {
        SampleKind::Counter => "counter",
        SampleKind::Gauge => "gauge",
    }
}

/// Render every collected sample as Prometheus text exposition.
#[must_use]
pub fn render(project_id_label: Option<&str>, collected: &[Collected]) -> String {
    let mut descriptors: BTreeMap<String, MetricDescriptor> = BTreeMap::new();
    for (exporter, _) in collected {
        for descriptor in exporter.describe() {
            descriptors.entry(descriptor.name.clone()).or_insert_with(|| descriptor.clone());
        }
    }

    let mut out = String::new();
    for (name, descriptor) in &descriptors {
        let _ = writeln!(out, "# HELP {name} {name}");
        let _ = writeln!(out, "# TYPE {name} {}", type_name(descriptor.kind));

        for (exporter, samples) in collected {
            for sample in samples.iter().filter(|s| &s.metric_name == name) {
                let mut labels = Vec::new();
                if let Some(project_id) = project_id_label.or_else(|| exporter.project_id()) {
                    labels.push(format!(r#"project_id="{}""#, escape(project_id)));
                }
                labels.push(format!(r#"service_id="{}""#, escape(exporter.service_id())));
                labels.push(format!(r#"hostname="{}""#, escape(exporter.hostname())));

                for (label_name, label_value) in descriptor.variable_labels.iter().zip(&sample.label_values) {
                    labels.push(format!(r#"{label_name}="{}""#, escape(label_value)));
                }

                let _ = writeln!(out, "{name}{{{}}} {}", labels.join(","), sample.value);
            }
        }
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::ServiceKind;
    use crate::exporter::Exporter;

    #[test]
    fn renders_help_type_and_one_line_per_sample() {
        let exporter = Arc::new(Exporter::new(ServiceKind::System, "sys-1".into(), Some("proj-1".into()), "host-a".into()));
        let samples = vec![Sample {
            metric_name: "node_uptime_seconds_seconds".to_string(),
            kind: SampleKind::Gauge,
            value: 42.0,
            label_values: vec![],
        }];

        let text = render(None, &[(exporter, samples)]);
        assert!(text.contains("# HELP node_uptime_seconds_seconds"));
        assert!(text.contains("# TYPE node_uptime_seconds_seconds gauge"));
        assert!(text.contains(r#"service_id="sys-1""#));
        assert!(text.contains(r#"project_id="proj-1""#));
        assert!(text.contains(r#"hostname="host-a""#));
        assert!(text.contains(" 42"));
    }

    #[test]
    fn variable_labels_are_attached_by_name() {
        let exporter = Arc::new(Exporter::new(ServiceKind::System, "sys-1".into(), None, "host-a".into()));
        let samples = vec![Sample {
            metric_name: "node_cpu_seconds_total_seconds".to_string(),
            kind: SampleKind::Counter,
            value: 7.0,
            label_values: vec!["user".to_string()],
        }];

        let text = render(None, &[(exporter, samples)]);
        assert!(text.contains(r#"mode="user""#));
    }
}
