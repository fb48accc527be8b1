// Report rendering: fixed-width text tables for the terminal, or JSON.

use std::fmt::Write as _;

use serde::Serialize;

use crate::models::{
    DateWindow, NamespaceUsage, OwnerUsage, Resource, TimeseriesReport, UsageReport,
};

pub fn to_json<T: Serialize>(report: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn period(window: &DateWindow) -> String {
    format!("{}:{}", window.start_date(), window.end_date())
}

fn push_usage_table(out: &mut String, title: &str, usage: &NamespaceUsage) {
    let _ = writeln!(out, "{title}");
    for resource in Resource::ALL {
        let label = format!("{} hours", resource.label());
        let _ = writeln!(out, "  {label:>16}  {:>12}", resource.of(&usage.hours));
    }
    let _ = writeln!(out, "  {:>16}  {:>12}", "jobs", usage.jobs);
    let _ = writeln!(out, "  {:>16}  {:>12}", "active users", usage.active_users);
    out.push('\n');
}

fn push_owner_table(out: &mut String, title: &str, owners: &[OwnerUsage]) {
    let _ = writeln!(out, "{title}");
    let _ = write!(out, "  {:<40}", "owner");
    for resource in Resource::ALL {
        let _ = write!(out, "  {:>12}", resource.label());
    }
    out.push('\n');
    for owner in owners {
        let _ = write!(out, "  {:<40}", owner.owner);
        for resource in Resource::ALL {
            let _ = write!(out, "  {:>12.2}", resource.of_totals(&owner.days));
        }
        out.push('\n');
    }
    out.push('\n');
}

pub fn render_usage(report: &UsageReport) -> String {
    let period = period(&report.window);
    let mut out = String::new();
    for usage in &report.namespaces {
        let title = format!(
            "{} accounting for the period {period}",
            usage.namespace.to_uppercase()
        );
        push_usage_table(&mut out, &title, usage);
    }
    push_usage_table(
        &mut out,
        &format!("Aggregated accounting for the period {period}"),
        &report.total,
    );
    for ns in &report.owners {
        if ns.owners.is_empty() {
            continue;
        }
        let title = format!("{} usage per owner (resource-days)", ns.namespace.to_uppercase());
        push_owner_table(&mut out, &title, &ns.owners);
    }
    out
}

pub fn render_timeseries(report: &TimeseriesReport) -> String {
    let period = period(&report.window);
    let mut out = String::new();
    for series in &report.namespaces {
        let _ = writeln!(
            out,
            "{} daily usage for the period {period}",
            series.namespace.to_uppercase()
        );
        let _ = write!(out, "  {:<10}", "date");
        for resource in Resource::ALL {
            let _ = write!(out, "  {:>12}", resource.label());
        }
        let _ = writeln!(out, "  {:>8}  {:>8}", "running", "queued");
        for row in &series.daily {
            let _ = write!(out, "  {:<10}", row.date);
            for resource in Resource::ALL {
                let _ = write!(out, "  {:>12}", resource.of(&row.usage));
            }
            let _ = writeln!(out, "  {:>8}  {:>8}", row.running, row.queued);
        }
        out.push('\n');

        let title = format!(
            "{} usage per owner (resource-days)",
            series.namespace.to_uppercase()
        );
        push_owner_table(&mut out, &title, &series.owners);

        let _ = write!(out, "  {:<40}", "namespace total");
        for resource in Resource::ALL {
            let _ = write!(out, "  {:>12.2}", resource.of_totals(&series.total_days));
        }
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NamespaceOwners, ResourceTotals, ResourceVector};
    use chrono::NaiveDate;

    fn window() -> DateWindow {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        DateWindow::days(day, day)
    }

    fn usage(namespace: &str, cpu_hours: u64) -> NamespaceUsage {
        NamespaceUsage {
            namespace: namespace.to_string(),
            hours: ResourceVector {
                cpu_num: cpu_hours,
                ..Default::default()
            },
            jobs: 1,
            active_users: 1,
        }
    }

    #[test]
    fn render_usage_lists_namespaces_then_total() {
        let report = UsageReport {
            window: window(),
            namespaces: vec![usage("research", 18)],
            total: usage("total", 18),
            owners: vec![NamespaceOwners {
                namespace: "research".into(),
                owners: vec![OwnerUsage {
                    owner: "alice".into(),
                    days: ResourceTotals {
                        cpu_num: 0.75,
                        ..Default::default()
                    },
                }],
            }],
        };
        let text = render_usage(&report);
        let ns = text.find("RESEARCH accounting for the period 2024-03-01:2024-03-01");
        let total = text.find("Aggregated accounting");
        assert!(ns.is_some() && total.is_some());
        assert!(ns < total);
        assert!(text.contains("cpu_num hours"));
        assert!(text.contains("0.75"));
    }

    #[test]
    fn to_json_uses_wire_resource_names() {
        let json = to_json(&usage("research", 3)).unwrap();
        assert!(json.contains("\"cpu_MHz\""));
        assert!(json.contains("\"memory_MB\""));
    }
}
